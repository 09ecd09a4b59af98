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

//! Primitive buffer and framebuffer operations, independent of how the driver
//! wants them issued.
//!
//! Two implementations exist (see `ember-infra`): one that talks to objects
//! directly by name, and one that binds an object to an implicit target, operates,
//! and restores whatever was bound before. Exactly one of them is selected from the
//! [`CapabilitySet`](crate::CapabilitySet) when the device is created.

use crate::buffer::BufferUsage;
use crate::driver::{
    AllocationFailure, BufferHandle, BufferSource, FramebufferHandle, FramebufferMask,
    FramebufferTarget, MapAccess, Rect, TextureHandle,
};
use crate::texture::FilterMode;
use std::fmt;
use std::ptr::NonNull;

/// Identifies which strategy a [`RawBufferBackend`] implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferBackendKind {
    /// Operations address objects by name.
    Direct,
    /// Operations bind the object to a target, operate, then restore the target.
    BindThenOperate,
}

impl fmt::Display for BufferBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferBackendKind::Direct => write!(f, "direct"),
            BufferBackendKind::BindThenOperate => write!(f, "bind-then-operate"),
        }
    }
}

/// The lowest-level buffer and framebuffer operations.
///
/// Every buffer call carries the buffer's [`BufferUsage`] so that an implementation
/// that needs a binding target can derive one. Implementations must leave every
/// driver binding exactly as they found it.
pub trait RawBufferBackend: fmt::Debug {
    /// Which strategy this backend implements.
    fn kind(&self) -> BufferBackendKind;

    /// Creates a new buffer object with no storage.
    fn create_buffer(&self) -> BufferHandle;

    /// Deletes a buffer object.
    fn delete_buffer(&self, buffer: BufferHandle);

    /// Allocates (or reallocates) mutable storage for `buffer`.
    fn upload_full(
        &self,
        buffer: BufferHandle,
        source: BufferSource<'_>,
        usage: BufferUsage,
    ) -> Result<(), AllocationFailure>;

    /// Overwrites `data.len()` bytes of `buffer` at `offset`.
    fn upload_sub(&self, buffer: BufferHandle, offset: u64, data: &[u8], usage: BufferUsage);

    /// Allocates immutable-size storage for `buffer`, suitable for persistent mapping.
    fn allocate_storage(
        &self,
        buffer: BufferHandle,
        source: BufferSource<'_>,
        usage: BufferUsage,
    ) -> Result<(), AllocationFailure>;

    /// Maps a byte range of `buffer`. `None` is the failure sentinel.
    fn map_range(
        &self,
        buffer: BufferHandle,
        offset: u64,
        length: u64,
        access: MapAccess,
        usage: BufferUsage,
    ) -> Option<NonNull<u8>>;

    /// Releases the active mapping of `buffer`.
    fn unmap(&self, buffer: BufferHandle, usage: BufferUsage);

    /// Publishes CPU writes to a range of an explicitly flushed mapping.
    fn flush_mapped_range(&self, buffer: BufferHandle, offset: u64, length: u64, usage: BufferUsage);

    /// Copies `length` bytes between two buffers.
    fn copy_range(
        &self,
        src: BufferHandle,
        dst: BufferHandle,
        src_offset: u64,
        dst_offset: u64,
        length: u64,
    );

    /// Creates a framebuffer object.
    fn create_framebuffer(&self) -> FramebufferHandle;

    /// Deletes a framebuffer object.
    fn delete_framebuffer(&self, framebuffer: FramebufferHandle);

    /// Attaches color and depth textures to `framebuffer`.
    ///
    /// With `bind_target` set, the framebuffer is left bound to that target
    /// afterwards; otherwise all framebuffer bindings are unchanged.
    fn attach_to_framebuffer(
        &self,
        framebuffer: FramebufferHandle,
        color: Option<TextureHandle>,
        depth: Option<TextureHandle>,
        mip_level: u32,
        bind_target: Option<FramebufferTarget>,
    );

    /// Copies planes from `src` into `dst`.
    #[allow(clippy::too_many_arguments)]
    fn blit_framebuffer(
        &self,
        src: FramebufferHandle,
        dst: FramebufferHandle,
        src_rect: Rect,
        dst_rect: Rect,
        mask: FramebufferMask,
        filter: FilterMode,
    );
}
