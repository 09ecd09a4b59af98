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

//! The backend used when the driver can address objects by name.

use ember_core::backend::{BufferBackendKind, RawBufferBackend};
use ember_core::driver::{
    AllocationFailure, Attachment, BufferHandle, BufferSource, FramebufferHandle,
    FramebufferMask, FramebufferTarget, MapAccess, Rect, TextureHandle,
};
use ember_core::texture::FilterMode;
use ember_core::{BufferUsage, GlDriver};
use std::ptr::NonNull;
use std::rc::Rc;

/// Issues every operation against the object's name. No binding is touched
/// unless the caller asks for one.
#[derive(Debug)]
pub struct DirectBufferBackend {
    driver: Rc<dyn GlDriver>,
}

impl DirectBufferBackend {
    /// Creates the backend over `driver`.
    pub fn new(driver: Rc<dyn GlDriver>) -> Self {
        Self { driver }
    }
}

impl RawBufferBackend for DirectBufferBackend {
    fn kind(&self) -> BufferBackendKind {
        BufferBackendKind::Direct
    }

    fn create_buffer(&self) -> BufferHandle {
        self.driver.create_buffer()
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
        self.driver
            .named_buffer_data(buffer, source, usage.usage_hint())
    }

    fn upload_sub(&self, buffer: BufferHandle, offset: u64, data: &[u8], _usage: BufferUsage) {
        self.driver.named_buffer_sub_data(buffer, offset, data);
    }

    fn allocate_storage(
        &self,
        buffer: BufferHandle,
        source: BufferSource<'_>,
        usage: BufferUsage,
    ) -> Result<(), AllocationFailure> {
        self.driver
            .named_buffer_storage(buffer, source, usage.storage_flags())
    }

    fn map_range(
        &self,
        buffer: BufferHandle,
        offset: u64,
        length: u64,
        access: MapAccess,
        _usage: BufferUsage,
    ) -> Option<NonNull<u8>> {
        self.driver
            .map_named_buffer_range(buffer, offset, length, access)
    }

    fn unmap(&self, buffer: BufferHandle, _usage: BufferUsage) {
        self.driver.unmap_named_buffer(buffer);
    }

    fn flush_mapped_range(&self, buffer: BufferHandle, offset: u64, length: u64, _usage: BufferUsage) {
        self.driver
            .flush_mapped_named_buffer_range(buffer, offset, length);
    }

    fn copy_range(
        &self,
        src: BufferHandle,
        dst: BufferHandle,
        src_offset: u64,
        dst_offset: u64,
        length: u64,
    ) {
        self.driver
            .copy_named_buffer_sub_data(src, dst, src_offset, dst_offset, length);
    }

    fn create_framebuffer(&self) -> FramebufferHandle {
        self.driver.create_framebuffer()
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
        self.driver
            .named_framebuffer_texture(framebuffer, Attachment::Color0, color, mip_level);
        self.driver
            .named_framebuffer_texture(framebuffer, Attachment::Depth, depth, mip_level);
        if let Some(target) = bind_target {
            self.driver.bind_framebuffer(target, Some(framebuffer));
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
        self.driver
            .blit_named_framebuffer(src, dst, src_rect, dst_rect, mask, filter);
    }
}
