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

//! The call log recorded by the headless driver.

use ember_core::driver::{
    Attachment, BufferHandle, BufferTarget, FramebufferHandle, FramebufferMask,
    FramebufferTarget, MapAccess, ProgramHandle, Rect, SamplerHandle, StorageFlags,
    TextureHandle, UsageHint,
};
use ember_core::pipeline::IndexType;
use ember_core::texture::FilterMode;

/// One state-changing driver call.
///
/// Bind-point calls are recorded against the buffer or framebuffer bound to the
/// target at the time, so the log reads the same whichever backend issued them.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum DriverCall {
    GenBuffer(BufferHandle),
    CreateBuffer(BufferHandle),
    BindBuffer {
        target: BufferTarget,
        buffer: Option<BufferHandle>,
    },
    AllocateBuffer {
        buffer: BufferHandle,
        size: u64,
        hint: UsageHint,
    },
    AllocateStorage {
        buffer: BufferHandle,
        size: u64,
        flags: StorageFlags,
    },
    UploadSub {
        buffer: BufferHandle,
        offset: u64,
        length: u64,
    },
    MapBuffer {
        buffer: BufferHandle,
        offset: u64,
        length: u64,
        access: MapAccess,
    },
    UnmapBuffer(BufferHandle),
    FlushMappedRange {
        buffer: BufferHandle,
        offset: u64,
        length: u64,
    },
    CopyBuffer {
        src: BufferHandle,
        dst: BufferHandle,
        src_offset: u64,
        dst_offset: u64,
        size: u64,
    },
    DeleteBuffer(BufferHandle),
    GenFramebuffer(FramebufferHandle),
    CreateFramebuffer(FramebufferHandle),
    BindFramebuffer {
        target: FramebufferTarget,
        framebuffer: Option<FramebufferHandle>,
    },
    AttachTexture {
        framebuffer: FramebufferHandle,
        attachment: Attachment,
        texture: Option<TextureHandle>,
        level: u32,
    },
    BlitFramebuffer {
        read: FramebufferHandle,
        draw: FramebufferHandle,
        src: Rect,
        dst: Rect,
        mask: FramebufferMask,
        filter: FilterMode,
    },
    DeleteFramebuffer(FramebufferHandle),
    Viewport(Rect),
    Clear(FramebufferMask),
    CreateTexture {
        texture: TextureHandle,
        width: u32,
        height: u32,
    },
    DeleteTexture(TextureHandle),
    CreateSampler(SamplerHandle),
    LinkProgram {
        program: ProgramHandle,
        label: String,
    },
    UseProgram(Option<ProgramHandle>),
    BindBufferRange {
        slot: u32,
        buffer: BufferHandle,
        offset: u64,
        length: u64,
    },
    BindTextureUnit {
        unit: u32,
        texture: Option<TextureHandle>,
        sampler: Option<SamplerHandle>,
    },
    BindVertexBuffer {
        buffer: BufferHandle,
        offset: u64,
        stride: u32,
    },
    SetScissor(Option<Rect>),
    DrawArrays {
        first: u32,
        count: u32,
    },
    DrawElements {
        index_buffer: BufferHandle,
        index_type: IndexType,
        first_index: u32,
        count: u32,
        instances: u32,
    },
    PushDebugGroup(String),
    PopDebugGroup,
}

impl DriverCall {
    /// Returns `true` for calls that submit GPU work or bind resources for it.
    pub fn is_submission(&self) -> bool {
        matches!(
            self,
            DriverCall::UseProgram(_)
                | DriverCall::BindBufferRange { .. }
                | DriverCall::BindTextureUnit { .. }
                | DriverCall::BindVertexBuffer { .. }
                | DriverCall::SetScissor(_)
                | DriverCall::DrawArrays { .. }
                | DriverCall::DrawElements { .. }
        )
    }
}
