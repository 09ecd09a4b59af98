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

//! The contract this layer consumes from the graphics driver.
//!
//! [`GlDriver`] mirrors the shape of a GL-style state machine: some calls act on
//! whatever object is bound to a target ("bind-point" calls), others act on a named
//! object directly. Which family is usable depends on the probed capabilities; the
//! choice between them is encapsulated in a [`RawBufferBackend`](crate::RawBufferBackend).

use crate::pipeline::{IndexType, PrimitiveTopology, RenderPipeline};
use crate::texture::{AddressMode, FilterMode, TextureDescriptor};
use bitflags::bitflags;
use std::fmt;
use std::ptr::NonNull;
use thiserror::Error;

/// An opaque driver handle to a buffer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u32);

/// An opaque driver handle to a framebuffer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferHandle(pub u32);

/// An opaque driver handle to a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

/// An opaque driver handle to a sampler object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SamplerHandle(pub u32);

/// An opaque driver handle to a linked shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub u32);

/// The implicit binding slots a bind-point call operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Vertex attribute data.
    Array,
    /// Index data.
    ElementArray,
    /// Uniform block data.
    Uniform,
    /// Source of a buffer-to-buffer copy.
    CopyRead,
    /// Destination of a buffer-to-buffer copy, and the default scratch target.
    CopyWrite,
}

/// Framebuffer binding slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferTarget {
    /// The framebuffer draws and clears go to.
    Draw,
    /// The framebuffer blits read from.
    Read,
}

/// A framebuffer attachment point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    /// The first color attachment.
    Color0,
    /// The depth attachment.
    Depth,
}

/// Usage hint passed with mutable buffer allocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsageHint {
    /// Written once, drawn many times.
    StaticDraw,
    /// Rewritten often by the CPU.
    DynamicDraw,
    /// Written by the GPU and read back by the CPU.
    StreamRead,
}

/// Either a size to allocate uninitialized, or bytes to initialize from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferSource<'a> {
    /// Allocate this many uninitialized bytes.
    Size(u64),
    /// Allocate and fill with these bytes.
    Data(&'a [u8]),
}

impl BufferSource<'_> {
    /// The number of bytes the allocation will have.
    pub fn len(&self) -> u64 {
        match self {
            BufferSource::Size(size) => *size,
            BufferSource::Data(data) => data.len() as u64,
        }
    }

    /// Returns `true` if the allocation would be empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

bitflags! {
    /// Access flags for a buffer mapping.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MapAccess: u32 {
        /// The CPU reads through the mapping.
        const READ = 1 << 0;
        /// The CPU writes through the mapping.
        const WRITE = 1 << 1;
        /// Written ranges are published with an explicit flush.
        const FLUSH_EXPLICIT = 1 << 4;
        /// The mapping stays valid while the GPU uses the buffer.
        const PERSISTENT = 1 << 6;
    }
}

bitflags! {
    /// Flags for immutable buffer storage allocations.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StorageFlags: u32 {
        /// The storage may be mapped for reading.
        const MAP_READ = 1 << 0;
        /// The storage may be mapped for writing.
        const MAP_WRITE = 1 << 1;
        /// The storage may stay mapped while in use.
        const PERSISTENT = 1 << 6;
        /// The contents may be updated with sub-uploads.
        const DYNAMIC_STORAGE = 1 << 8;
        /// Prefer host memory for the backing store.
        const CLIENT_STORAGE = 1 << 9;
    }
}

bitflags! {
    /// Which framebuffer planes a clear or blit touches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FramebufferMask: u32 {
        /// The color plane.
        const COLOR = 1 << 0;
        /// The depth plane.
        const DEPTH = 1 << 1;
    }
}

/// An integer rectangle in framebuffer pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Bottom edge.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Creates a rectangle.
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A rectangle anchored at the origin.
    pub const fn sized(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }
}

/// Why the driver refused to allocate memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocationFailure {
    /// The driver ran out of memory.
    #[error("out of memory")]
    OutOfMemory,
    /// The driver rejected the request for another reason.
    #[error("denied by the driver")]
    Denied,
}

/// The graphics driver this layer is built on.
///
/// All methods take `&self`: the driver is a global state machine, so
/// implementations track their state with interior mutability. Every method must
/// only be called from the render thread.
pub trait GlDriver: fmt::Debug {
    // --- Introspection ---

    /// The extension names the driver advertises.
    fn extensions(&self) -> Vec<String>;
    /// A human-readable renderer name, for diagnostics.
    fn renderer_name(&self) -> String;
    /// The largest texture dimension the driver accepts.
    fn max_texture_size(&self) -> u32;
    /// The alignment uniform buffer range offsets must respect.
    fn uniform_offset_alignment(&self) -> u32;

    // --- Bind-point buffer calls ---

    /// Generates an unbound buffer name.
    fn gen_buffer(&self) -> BufferHandle;
    /// The buffer currently bound to `target`, if any.
    fn bound_buffer(&self, target: BufferTarget) -> Option<BufferHandle>;
    /// Binds `buffer` (or nothing) to `target`.
    fn bind_buffer(&self, target: BufferTarget, buffer: Option<BufferHandle>);
    /// (Re)allocates the buffer bound to `target`.
    fn buffer_data(
        &self,
        target: BufferTarget,
        source: BufferSource<'_>,
        hint: UsageHint,
    ) -> Result<(), AllocationFailure>;
    /// Overwrites part of the buffer bound to `target`.
    fn buffer_sub_data(&self, target: BufferTarget, offset: u64, data: &[u8]);
    /// Allocates immutable storage for the buffer bound to `target`.
    fn buffer_storage(
        &self,
        target: BufferTarget,
        source: BufferSource<'_>,
        flags: StorageFlags,
    ) -> Result<(), AllocationFailure>;
    /// Maps a range of the buffer bound to `target`. `None` means denied.
    fn map_buffer_range(
        &self,
        target: BufferTarget,
        offset: u64,
        length: u64,
        access: MapAccess,
    ) -> Option<NonNull<u8>>;
    /// Unmaps the buffer bound to `target`.
    fn unmap_buffer(&self, target: BufferTarget);
    /// Publishes writes to a range of the mapping of the buffer bound to `target`.
    fn flush_mapped_buffer_range(&self, target: BufferTarget, offset: u64, length: u64);
    /// Copies between the buffers bound to two targets.
    fn copy_buffer_sub_data(
        &self,
        read: BufferTarget,
        write: BufferTarget,
        read_offset: u64,
        write_offset: u64,
        size: u64,
    );

    // --- Named buffer calls ---

    /// Creates a buffer object ready for named calls.
    fn create_buffer(&self) -> BufferHandle;
    /// (Re)allocates `buffer`.
    fn named_buffer_data(
        &self,
        buffer: BufferHandle,
        source: BufferSource<'_>,
        hint: UsageHint,
    ) -> Result<(), AllocationFailure>;
    /// Overwrites part of `buffer`.
    fn named_buffer_sub_data(&self, buffer: BufferHandle, offset: u64, data: &[u8]);
    /// Allocates immutable storage for `buffer`.
    fn named_buffer_storage(
        &self,
        buffer: BufferHandle,
        source: BufferSource<'_>,
        flags: StorageFlags,
    ) -> Result<(), AllocationFailure>;
    /// Maps a range of `buffer`. `None` means denied.
    fn map_named_buffer_range(
        &self,
        buffer: BufferHandle,
        offset: u64,
        length: u64,
        access: MapAccess,
    ) -> Option<NonNull<u8>>;
    /// Unmaps `buffer`.
    fn unmap_named_buffer(&self, buffer: BufferHandle);
    /// Publishes writes to a range of the mapping of `buffer`.
    fn flush_mapped_named_buffer_range(&self, buffer: BufferHandle, offset: u64, length: u64);
    /// Copies a range from `src` into `dst`.
    fn copy_named_buffer_sub_data(
        &self,
        src: BufferHandle,
        dst: BufferHandle,
        src_offset: u64,
        dst_offset: u64,
        size: u64,
    );
    /// Deletes a buffer. Unbinds it from every target it was bound to.
    fn delete_buffer(&self, buffer: BufferHandle);

    // --- Framebuffers ---

    /// Generates an unbound framebuffer name.
    fn gen_framebuffer(&self) -> FramebufferHandle;
    /// Creates a framebuffer object ready for named calls.
    fn create_framebuffer(&self) -> FramebufferHandle;
    /// The framebuffer currently bound to `target`, if any.
    fn bound_framebuffer(&self, target: FramebufferTarget) -> Option<FramebufferHandle>;
    /// Binds `framebuffer` (or the default framebuffer) to `target`.
    fn bind_framebuffer(&self, target: FramebufferTarget, framebuffer: Option<FramebufferHandle>);
    /// Attaches a texture level to the framebuffer bound to `target`.
    fn framebuffer_texture(
        &self,
        target: FramebufferTarget,
        attachment: Attachment,
        texture: Option<TextureHandle>,
        level: u32,
    );
    /// Attaches a texture level to `framebuffer`.
    fn named_framebuffer_texture(
        &self,
        framebuffer: FramebufferHandle,
        attachment: Attachment,
        texture: Option<TextureHandle>,
        level: u32,
    );
    /// Blits from the bound read framebuffer to the bound draw framebuffer.
    fn blit_framebuffer(&self, src: Rect, dst: Rect, mask: FramebufferMask, filter: FilterMode);
    /// Blits between two named framebuffers.
    #[allow(clippy::too_many_arguments)]
    fn blit_named_framebuffer(
        &self,
        read: FramebufferHandle,
        draw: FramebufferHandle,
        src: Rect,
        dst: Rect,
        mask: FramebufferMask,
        filter: FilterMode,
    );
    /// Deletes a framebuffer.
    fn delete_framebuffer(&self, framebuffer: FramebufferHandle);
    /// Sets the viewport of subsequent draws.
    fn viewport(&self, rect: Rect);
    /// Clears planes of the bound draw framebuffer.
    fn clear(&self, mask: FramebufferMask, color: [f32; 4], depth: f64);

    // --- Textures and samplers ---

    /// Allocates a texture.
    fn create_texture(&self, descriptor: &TextureDescriptor)
        -> Result<TextureHandle, AllocationFailure>;
    /// Deletes a texture.
    fn delete_texture(&self, texture: TextureHandle);
    /// Creates a sampler object.
    fn create_sampler(&self, filter: FilterMode, address: AddressMode) -> SamplerHandle;

    // --- Programs ---

    /// Links a program for `pipeline`. The error carries the driver's log.
    fn link_program(&self, pipeline: &RenderPipeline) -> Result<ProgramHandle, String>;
    /// Makes `program` current.
    fn use_program(&self, program: Option<ProgramHandle>);

    // --- Submission ---

    /// Binds a range of `buffer` to uniform block slot `slot`.
    fn bind_buffer_range(&self, slot: u32, buffer: BufferHandle, offset: u64, length: u64);
    /// Binds a texture and sampler to texture unit `unit`.
    fn bind_texture_unit(
        &self,
        unit: u32,
        texture: Option<TextureHandle>,
        sampler: Option<SamplerHandle>,
    );
    /// Binds the vertex source for subsequent draws.
    fn bind_vertex_buffer(&self, buffer: BufferHandle, offset: u64, stride: u32);
    /// Enables the scissor test with `rect`, or disables it.
    fn set_scissor(&self, rect: Option<Rect>);
    /// Draws non-indexed primitives.
    fn draw_arrays(&self, topology: PrimitiveTopology, first: u32, count: u32);
    /// Draws indexed primitives from `index_buffer`.
    #[allow(clippy::too_many_arguments)]
    fn draw_elements(
        &self,
        topology: PrimitiveTopology,
        index_buffer: BufferHandle,
        index_type: IndexType,
        first_index: u32,
        count: u32,
        base_vertex: i32,
        instances: u32,
    );
    /// Opens a labelled debug group.
    fn push_debug_group(&self, label: &str);
    /// Closes the innermost debug group.
    fn pop_debug_group(&self);
}
