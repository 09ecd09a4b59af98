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

//! Graphics backends and device construction.

pub mod gl;
pub mod headless;

use ember_core::{CapabilitySet, GlDriver, GpuDevice, RenderSettings};
use std::rc::Rc;

/// Probes `driver`, selects a buffer backend and builds the device.
///
/// Must be called on the thread that owns the driver context; the device is
/// bound to it afterwards.
pub fn create_device(driver: Rc<dyn GlDriver>, settings: RenderSettings) -> GpuDevice {
    let extensions = driver.extensions();
    let capabilities = CapabilitySet::probe(&extensions, &settings);
    log::debug!(
        "Probed {} driver extension(s), using {:?}",
        extensions.len(),
        capabilities.used_capabilities()
    );
    let backend = gl::select_buffer_backend(&capabilities, Rc::clone(&driver));
    GpuDevice::new(driver, backend, capabilities, settings)
}
