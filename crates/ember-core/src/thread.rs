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

//! The single render context rule.
//!
//! Every type that touches the driver holds an `Rc`, so none of them is `Send` and
//! moving one to another thread does not compile. [`RenderThread`] additionally
//! records the thread that created the device so entry points can assert it.

use std::thread::{self, ThreadId};

/// The thread that owns the driver context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderThread {
    id: ThreadId,
}

impl RenderThread {
    /// Records the calling thread as the render thread.
    pub fn current() -> Self {
        Self {
            id: thread::current().id(),
        }
    }

    /// Returns `true` if the caller runs on the render thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.id
    }

    /// Panics (in debug builds) when called off the render thread.
    #[track_caller]
    pub fn assert_current(&self) {
        debug_assert!(
            self.is_current(),
            "GPU call issued from {:?}, but the render thread is {:?}",
            thread::current().id(),
            self.id
        );
    }
}
