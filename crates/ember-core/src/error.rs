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

//! Defines the hierarchy of error types for the GPU resource layer.
//!
//! Errors are split by who is at fault:
//!
//! - [`UsageError`]: a precondition was violated by the caller (closed resource,
//!   unbalanced debug groups, misaligned offsets, ...). These are bugs and must
//!   never be retried.
//! - [`DriverError`]: the driver refused a request (mapping denied, out of memory).
//!   This is an environment condition; the caller may abort the frame and report it.
//! - [`DimensionError`]: a texture or framebuffer size outside the device limits,
//!   rejected before any driver call.
//!
//! [`RenderError`] wraps all three and is what most public operations return.

use crate::buffer::BufferUsage;
use crate::driver::AllocationFailure;
use thiserror::Error;

/// A precondition violation. Always a programming error in the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    /// An operation was attempted on a resource that has already been closed.
    #[error("Resource '{label}' has been closed")]
    ResourceClosed {
        /// Label of the closed resource.
        label: String,
    },
    /// `close()` was called a second time on the same resource.
    #[error("Resource '{label}' was closed twice")]
    AlreadyClosed {
        /// Label of the resource.
        label: String,
    },
    /// An operation was attempted on a render pass after it was closed.
    #[error("Can't use closed render pass '{pass}'")]
    PassClosed {
        /// Label of the render pass.
        pass: String,
    },
    /// A command was issued while a render pass is still open on the device.
    #[error("Close the existing render pass before performing additional commands")]
    RenderPassOpen,
    /// A render pass was closed with debug groups still open.
    #[error("Render pass '{pass}' had {depth} debug group(s) left open")]
    UnbalancedDebugGroups {
        /// Label of the render pass.
        pass: String,
        /// The debug group depth at close time.
        depth: u32,
    },
    /// More debug groups were popped than were pushed.
    #[error("Can't pop more debug groups than were pushed in render pass '{pass}'")]
    DebugGroupUnderflow {
        /// Label of the render pass.
        pass: String,
    },
    /// A uniform buffer slice starts at an offset the driver can't bind.
    #[error("Uniform '{name}' offset {offset} must be aligned to {alignment}")]
    MisalignedUniformOffset {
        /// Name of the uniform binding.
        name: String,
        /// The offending offset in bytes.
        offset: u64,
        /// The driver-reported uniform offset alignment.
        alignment: u32,
    },
    /// A buffer was mapped while another mapping of it is still active.
    #[error("Buffer '{label}' is already mapped")]
    AlreadyMapped {
        /// Label of the buffer.
        label: String,
    },
    /// A buffer is missing a usage flag required by the operation.
    #[error("Buffer '{label}' is missing required usage {required:?}")]
    MissingUsage {
        /// Label of the buffer.
        label: String,
        /// The usage flags the operation requires.
        required: BufferUsage,
    },
    /// A byte range does not fit inside the buffer.
    #[error("Range {offset}..{offset}+{length} is out of bounds for buffer '{label}' of size {size}")]
    OutOfBounds {
        /// Label of the buffer.
        label: String,
        /// Start of the requested range.
        offset: u64,
        /// Length of the requested range.
        length: u64,
        /// Size of the buffer.
        size: u64,
    },
    /// A vertex buffer slot outside the supported range was used.
    #[error("Vertex buffer slot {slot} is out of range (max {max})")]
    VertexSlotOutOfRange {
        /// The requested slot.
        slot: usize,
        /// The number of supported slots.
        max: usize,
    },
    /// A draw was issued before a pipeline was set.
    #[error("Render pass '{pass}' has no pipeline set")]
    MissingPipeline {
        /// Label of the render pass.
        pass: String,
    },
    /// The pipeline requires a uniform that has not been set.
    #[error("Missing uniform '{name}' in render pass '{pass}'")]
    MissingUniform {
        /// Label of the render pass.
        pass: String,
        /// Name of the missing uniform.
        name: String,
    },
    /// The pipeline requires a sampler that has not been bound.
    #[error("Missing sampler '{name}' in render pass '{pass}'")]
    MissingSampler {
        /// Label of the render pass.
        pass: String,
        /// Name of the missing sampler.
        name: String,
    },
    /// The pipeline reads vertices but no vertex buffer is bound in slot 0.
    #[error("Missing vertex buffer at slot 0 in render pass '{pass}'")]
    MissingVertexBuffer {
        /// Label of the render pass.
        pass: String,
    },
    /// An indexed draw was issued without an index buffer.
    #[error("Missing index buffer in render pass '{pass}'")]
    MissingIndexBuffer {
        /// Label of the render pass.
        pass: String,
    },
    /// A depth operation was requested on a framebuffer without depth.
    #[error("Framebuffer '{framebuffer}' has no depth attachment")]
    MissingDepthAttachment {
        /// Name of the framebuffer.
        framebuffer: String,
    },
    /// A framebuffer was used before `initialize`.
    #[error("Framebuffer '{framebuffer}' is not initialized")]
    FramebufferNotInitialized {
        /// Name of the framebuffer.
        framebuffer: String,
    },
    /// `initialize` was called on a framebuffer that already has attachments.
    #[error("Framebuffer '{framebuffer}' is already initialized, use resize instead")]
    FramebufferInitialized {
        /// Name of the framebuffer.
        framebuffer: String,
    },
    /// A buffer was requested with a size of zero.
    #[error("Buffer '{label}' size must be greater than zero")]
    ZeroSizedBuffer {
        /// Label of the buffer.
        label: String,
    },
    /// A buffer was requested from an empty byte source.
    #[error("Buffer '{label}' source must not be empty")]
    EmptyBufferSource {
        /// Label of the buffer.
        label: String,
    },
    /// A mapping was requested with neither read nor write access.
    #[error("Mapping buffer '{label}' requires read or write access")]
    NoMapAccess {
        /// Label of the buffer.
        label: String,
    },
    /// Mutable access was requested on a mapping opened without write access.
    #[error("Mapping of buffer '{label}' is read-only")]
    ReadOnlyMapping {
        /// Label of the buffer.
        label: String,
    },
    /// A uniform block serialized to more bytes than its layout reserves.
    #[error("Uniform block '{label}' wrote {written} bytes into a {capacity}-byte layout")]
    UniformBlockOverflow {
        /// Label of the allocator.
        label: String,
        /// Number of bytes written.
        written: usize,
        /// Size of the pre-computed layout.
        capacity: usize,
    },
    /// A ring allocator was constructed with a depth of zero.
    #[error("Ring allocator '{label}' needs a ring depth of at least 1")]
    InvalidRingDepth {
        /// Label of the allocator.
        label: String,
    },
    /// A post effect referenced a target that was not provided.
    #[error("Missing post effect target '{name}'")]
    UnknownTarget {
        /// Name of the target.
        name: String,
    },
    /// A texture view asked for mip levels the texture does not have.
    #[error(
        "Texture '{label}' has {available} mip level(s); cannot view {mip_levels} from level {base_mip_level}"
    )]
    InvalidMipRange {
        /// Label of the texture.
        label: String,
        /// First requested level.
        base_mip_level: u32,
        /// Number of requested levels.
        mip_levels: u32,
        /// Levels the texture has.
        available: u32,
    },
    /// Two different pipeline descriptions were compiled under one label.
    #[error("Pipeline '{label}' was already compiled from a different description")]
    PipelineLabelConflict {
        /// The shared label.
        label: String,
    },
}

/// A request the driver refused. An environment condition, not a logic bug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// The driver returned no pointer for a map request.
    #[error("Driver denied mapping {length} bytes at offset {offset} of buffer '{label}'")]
    MapDenied {
        /// Label of the buffer.
        label: String,
        /// Start of the requested range.
        offset: u64,
        /// Length of the requested range.
        length: u64,
    },
    /// Allocating backing memory for a buffer failed.
    #[error("Could not allocate {size} bytes for buffer '{label}': {reason}")]
    BufferAllocation {
        /// Label of the buffer.
        label: String,
        /// Requested size.
        size: u64,
        /// Why the driver refused.
        reason: AllocationFailure,
    },
    /// Allocating a texture failed.
    #[error("Could not allocate texture '{label}' ({width}x{height}): {reason}")]
    TextureAllocation {
        /// Label of the texture.
        label: String,
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
        /// Why the driver refused.
        reason: AllocationFailure,
    },
    /// The driver failed to link a pipeline program.
    #[error("Failed to link pipeline '{pipeline}': {details}")]
    LinkFailed {
        /// Label of the pipeline.
        pipeline: String,
        /// The driver's log.
        details: String,
    },
}

/// A requested texture or framebuffer size is outside the device limits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Size {width}x{height} for '{label}' is outside the supported range 1..={max}")]
pub struct DimensionError {
    /// Label of the texture or framebuffer.
    pub label: String,
    /// Requested width.
    pub width: u32,
    /// Requested height.
    pub height: u32,
    /// The driver-reported maximum texture size.
    pub max: u32,
}

/// The top-level error type for the GPU resource layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// A precondition was violated.
    #[error(transparent)]
    Usage(#[from] UsageError),
    /// The driver refused a request.
    #[error(transparent)]
    Driver(#[from] DriverError),
    /// A size exceeded the device limits.
    #[error(transparent)]
    Dimension(#[from] DimensionError),
}

impl RenderError {
    /// Returns `true` if this error is a caller bug (precondition or dimension
    /// violation) rather than an environment failure.
    pub fn is_precondition(&self) -> bool {
        !matches!(self, RenderError::Driver(_))
    }
}

impl UsageError {
    /// Logs the error and hands it back, for use at the point it is raised.
    pub(crate) fn logged(self) -> Self {
        log::error!("{self}");
        self
    }
}

impl DriverError {
    pub(crate) fn logged(self) -> Self {
        log::error!("{self}");
        self
    }
}

impl DimensionError {
    pub(crate) fn logged(self) -> Self {
        log::error!("{self}");
        self
    }
}
