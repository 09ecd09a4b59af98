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

//! The fallback backend for drivers without direct state access.
//!
//! Every operation binds its object to an implicit target, operates on the
//! target, and puts back whatever was bound there before. The guards in
//! [`binding`](super::binding) do the restoring, so an early return can't leak
//! a binding.

use super::binding::{BufferBinding, FramebufferBinding};
use ember_core::backend::{BufferBackendKind, RawBufferBackend};
use ember_core::driver::{
    AllocationFailure, Attachment, BufferHandle, BufferSource, BufferTarget, FramebufferHandle,
    FramebufferMask, FramebufferTarget, MapAccess, Rect, TextureHandle,
};
use ember_core::texture::FilterMode;
use ember_core::{BufferUsage, GlDriver};
use std::ptr::NonNull;
use std::rc::Rc;

/// The target a buffer of `usage` is bound to for bind-point calls.
pub fn target_for_usage(usage: BufferUsage) -> BufferTarget {
    if usage.contains(BufferUsage::VERTEX) {
        BufferTarget::Array
    } else if usage.contains(BufferUsage::INDEX) {
        BufferTarget::ElementArray
    } else if usage.contains(BufferUsage::UNIFORM) {
        BufferTarget::Uniform
    } else {
        BufferTarget::CopyWrite
    }
}

/// Issues every operation through a binding target and restores the target.
#[derive(Debug)]
pub struct BoundBufferBackend {
    driver: Rc<dyn GlDriver>,
}

impl BoundBufferBackend {
    /// Creates the backend over `driver`.
    pub fn new(driver: Rc<dyn GlDriver>) -> Self {
        Self { driver }
    }

    fn bind(&self, buffer: BufferHandle, usage: BufferUsage) -> BufferBinding<'_> {
        BufferBinding::bind(self.driver.as_ref(), target_for_usage(usage), buffer)
    }
}

impl RawBufferBackend for BoundBufferBackend {
    fn kind(&self) -> BufferBackendKind {
        BufferBackendKind::BindThenOperate
    }

    fn create_buffer(&self) -> BufferHandle {
        self.driver.gen_buffer()
    }

    fn delete_buffer(&self, buffer: BufferHandle) {
        self.driver.delete_buffer(buffer);
    }

    fn upload_full(
        &self,
        buffer: BufferHandle,
        source: BufferSource<'_>,
        usage: BufferUsage,
    ) -> Result<(), AllocationFailure> {
        let binding = self.bind(buffer, usage);
        self.driver
            .buffer_data(binding.target(), source, usage.usage_hint())
    }

    fn upload_sub(&self, buffer: BufferHandle, offset: u64, data: &[u8], usage: BufferUsage) {
        let binding = self.bind(buffer, usage);
        self.driver.buffer_sub_data(binding.target(), offset, data);
    }

    fn allocate_storage(
        &self,
        buffer: BufferHandle,
        source: BufferSource<'_>,
        usage: BufferUsage,
    ) -> Result<(), AllocationFailure> {
        let binding = self.bind(buffer, usage);
        self.driver
            .buffer_storage(binding.target(), source, usage.storage_flags())
    }

    fn map_range(
        &self,
        buffer: BufferHandle,
        offset: u64,
        length: u64,
        access: MapAccess,
        usage: BufferUsage,
    ) -> Option<NonNull<u8>> {
        let binding = self.bind(buffer, usage);
        self.driver
            .map_buffer_range(binding.target(), offset, length, access)
    }

    fn unmap(&self, buffer: BufferHandle, usage: BufferUsage) {
        let binding = self.bind(buffer, usage);
        self.driver.unmap_buffer(binding.target());
    }

    fn flush_mapped_range(&self, buffer: BufferHandle, offset: u64, length: u64, usage: BufferUsage) {
        let binding = self.bind(buffer, usage);
        self.driver
            .flush_mapped_buffer_range(binding.target(), offset, length);
    }

    fn copy_range(
        &self,
        src: BufferHandle,
        dst: BufferHandle,
        src_offset: u64,
        dst_offset: u64,
        length: u64,
    ) {
        let driver = self.driver.as_ref();
        let read = BufferBinding::bind(driver, BufferTarget::CopyRead, src);
        let write = BufferBinding::bind(driver, BufferTarget::CopyWrite, dst);
        driver.copy_buffer_sub_data(read.target(), write.target(), src_offset, dst_offset, length);
    }

    fn create_framebuffer(&self) -> FramebufferHandle {
        self.driver.gen_framebuffer()
    }

    fn delete_framebuffer(&self, framebuffer: FramebufferHandle) {
        self.driver.delete_framebuffer(framebuffer);
    }

    fn attach_to_framebuffer(
        &self,
        framebuffer: FramebufferHandle,
        color: Option<TextureHandle>,
        depth: Option<TextureHandle>,
        mip_level: u32,
        bind_target: Option<FramebufferTarget>,
    ) {
        let driver = self.driver.as_ref();
        let attach = |target: FramebufferTarget| {
            driver.framebuffer_texture(target, Attachment::Color0, color, mip_level);
            driver.framebuffer_texture(target, Attachment::Depth, depth, mip_level);
        };

        match bind_target {
            // The caller wants the framebuffer left bound.
            Some(target) => {
                driver.bind_framebuffer(target, Some(framebuffer));
                attach(target);
            }
            None => {
                let binding = FramebufferBinding::bind(driver, FramebufferTarget::Draw, framebuffer);
                attach(binding.target());
            }
        }
    }

    fn blit_framebuffer(
        &self,
        src: FramebufferHandle,
        dst: FramebufferHandle,
        src_rect: Rect,
        dst_rect: Rect,
        mask: FramebufferMask,
        filter: FilterMode,
    ) {
        let driver = self.driver.as_ref();
        let _read = FramebufferBinding::bind(driver, FramebufferTarget::Read, src);
        let _draw = FramebufferBinding::bind(driver, FramebufferTarget::Draw, dst);
        driver.blit_framebuffer(src_rect, dst_rect, mask, filter);
    }
}
