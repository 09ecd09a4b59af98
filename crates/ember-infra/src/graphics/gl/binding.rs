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

//! Scoped driver bindings that put back whatever was bound before.

use ember_core::driver::{BufferHandle, BufferTarget, FramebufferHandle, FramebufferTarget};
use ember_core::GlDriver;

/// Binds a buffer to a target for the guard's lifetime.
pub(super) struct BufferBinding<'a> {
    driver: &'a dyn GlDriver,
    target: BufferTarget,
    previous: Option<BufferHandle>,
}

impl<'a> BufferBinding<'a> {
    pub(super) fn bind(driver: &'a dyn GlDriver, target: BufferTarget, buffer: BufferHandle) -> Self {
        let previous = driver.bound_buffer(target);
        driver.bind_buffer(target, Some(buffer));
        Self {
            driver,
            target,
            previous,
        }
    }

    pub(super) fn target(&self) -> BufferTarget {
        self.target
    }
}

impl Drop for BufferBinding<'_> {
    fn drop(&mut self) {
        self.driver.bind_buffer(self.target, self.previous);
    }
}

/// Binds a framebuffer to a target for the guard's lifetime.
pub(super) struct FramebufferBinding<'a> {
    driver: &'a dyn GlDriver,
    target: FramebufferTarget,
    previous: Option<FramebufferHandle>,
}

impl<'a> FramebufferBinding<'a> {
    pub(super) fn bind(
        driver: &'a dyn GlDriver,
        target: FramebufferTarget,
        framebuffer: FramebufferHandle,
    ) -> Self {
        let previous = driver.bound_framebuffer(target);
        driver.bind_framebuffer(target, Some(framebuffer));
        Self {
            driver,
            target,
            previous,
        }
    }

    pub(super) fn target(&self) -> FramebufferTarget {
        self.target
    }
}

impl Drop for FramebufferBinding<'_> {
    fn drop(&mut self) {
        self.driver.bind_framebuffer(self.target, self.previous);
    }
}
