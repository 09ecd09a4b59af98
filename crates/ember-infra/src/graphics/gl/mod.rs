// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Buffer backends for GL-style drivers, and the selection between them.

mod binding;
mod bound;
mod direct;

pub use self::bound::{target_for_usage, BoundBufferBackend};
pub use self::direct::DirectBufferBackend;

use ember_core::{CapabilitySet, GlDriver, RawBufferBackend};
use std::rc::Rc;

/// Picks the backend for `capabilities`.
///
/// The choice depends on nothing but the capability set, so probing the same
/// driver twice always yields the same kind of backend.
pub fn select_buffer_backend(
    capabilities: &CapabilitySet,
    driver: Rc<dyn GlDriver>,
) -> Rc<dyn RawBufferBackend> {
    let backend: Rc<dyn RawBufferBackend> = if capabilities.direct_state_access() {
        Rc::new(DirectBufferBackend::new(driver))
    } else {
        Rc::new(BoundBufferBackend::new(driver))
    };
    log::info!("Selected {} buffer backend", backend.kind());
    backend
}
