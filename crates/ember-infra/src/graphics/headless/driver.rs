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

//! A software [`GlDriver`] that keeps buffer memory on the heap and logs every
//! state-changing call.

use super::call::DriverCall;
use ember_core::capability::{ANISOTROPIC_FILTERING, BUFFER_STORAGE, DIRECT_STATE_ACCESS, KHR_DEBUG};
use ember_core::driver::{
    AllocationFailure, Attachment, BufferHandle, BufferSource, BufferTarget, FramebufferHandle,
    FramebufferMask, FramebufferTarget, MapAccess, ProgramHandle, Rect, SamplerHandle,
    StorageFlags, TextureHandle, UsageHint,
};
use ember_core::pipeline::{IndexType, PrimitiveTopology, RenderPipeline};
use ember_core::texture::{AddressMode, FilterMode, TextureDescriptor};
use ember_core::GlDriver;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ptr::NonNull;

/// Behavior of a [`HeadlessDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessConfig {
    /// Extensions reported to the capability probe.
    pub extensions: Vec<String>,
    /// Reported renderer name.
    pub renderer_name: String,
    /// Largest texture dimension accepted.
    pub max_texture_size: u32,
    /// Required alignment of uniform range offsets.
    pub uniform_offset_alignment: u32,
    /// Refuse every map request.
    pub deny_mapping: bool,
    /// Total bytes of buffer and texture memory before allocations fail.
    pub memory_limit: Option<u64>,
    /// Pipeline labels whose programs fail to link.
    pub rejected_programs: Vec<String>,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            extensions: [DIRECT_STATE_ACCESS, BUFFER_STORAGE, KHR_DEBUG, ANISOTROPIC_FILTERING]
                .into_iter()
                .map(String::from)
                .collect(),
            renderer_name: "Headless".to_owned(),
            max_texture_size: 8192,
            uniform_offset_alignment: 256,
            deny_mapping: false,
            memory_limit: None,
            rejected_programs: Vec::new(),
        }
    }
}

impl HeadlessConfig {
    /// A driver with no extensions: bind-point calls only, no persistent storage.
    pub fn legacy() -> Self {
        Self {
            extensions: Vec::new(),
            renderer_name: "Headless (legacy)".to_owned(),
            ..Self::default()
        }
    }
}

/// Buffer memory lives in cells so mapped pointers may write into it while the
/// driver holds shared references.
type Memory = Box<[Cell<u8>]>;

fn zeroed(size: u64) -> Memory {
    (0..size).map(|_| Cell::new(0)).collect()
}

fn memory_from(source: BufferSource<'_>) -> Memory {
    match source {
        BufferSource::Size(size) => zeroed(size),
        BufferSource::Data(data) => data.iter().copied().map(Cell::new).collect(),
    }
}

fn in_range(len: usize, offset: u64, length: u64) -> bool {
    offset
        .checked_add(length)
        .is_some_and(|end| end <= len as u64)
}

#[derive(Debug, Default)]
struct HeadlessBuffer {
    memory: Memory,
    storage: Option<StorageFlags>,
    mapping: Option<MapAccess>,
}

#[derive(Debug, Default, Clone, Copy)]
struct HeadlessFramebuffer {
    color: Option<TextureHandle>,
    depth: Option<TextureHandle>,
}

#[derive(Debug, Default)]
struct State {
    next_name: u32,
    buffers: HashMap<BufferHandle, HeadlessBuffer>,
    buffer_bindings: HashMap<BufferTarget, BufferHandle>,
    framebuffers: HashMap<FramebufferHandle, HeadlessFramebuffer>,
    framebuffer_bindings: HashMap<FramebufferTarget, FramebufferHandle>,
    textures: HashMap<TextureHandle, TextureDescriptor>,
    programs: HashMap<ProgramHandle, String>,
    debug_group_depth: u32,
    allocated: u64,
    calls: Vec<DriverCall>,
}

impl State {
    fn next_name(&mut self) -> u32 {
        self.next_name += 1;
        self.next_name
    }

    fn record(&mut self, call: DriverCall) {
        log::trace!("{call:?}");
        self.calls.push(call);
    }

    fn bound_buffer(&self, target: BufferTarget) -> Option<BufferHandle> {
        let bound = self.buffer_bindings.get(&target).copied();
        if bound.is_none() {
            log::error!("Headless driver: no buffer bound to {target:?}");
        }
        bound
    }

    fn bound_framebuffer(&self, target: FramebufferTarget) -> Option<FramebufferHandle> {
        let bound = self.framebuffer_bindings.get(&target).copied();
        if bound.is_none() {
            log::error!("Headless driver: no framebuffer bound to {target:?}");
        }
        bound
    }

    /// Accounts for a reallocation from `old` to `new` bytes.
    fn charge(&mut self, limit: Option<u64>, old: u64, new: u64) -> Result<(), AllocationFailure> {
        let total = self.allocated - old + new;
        if limit.is_some_and(|limit| total > limit) {
            log::warn!("Headless driver: out of memory ({total} bytes requested in total)");
            return Err(AllocationFailure::OutOfMemory);
        }
        self.allocated = total;
        Ok(())
    }

    fn buffer_len(&self, buffer: BufferHandle) -> Option<u64> {
        let len = self.buffers.get(&buffer).map(|b| b.memory.len() as u64);
        if len.is_none() {
            log::error!("Headless driver: unknown buffer {buffer:?}");
        }
        len
    }

    fn buffer_data(
        &mut self,
        limit: Option<u64>,
        buffer: BufferHandle,
        source: BufferSource<'_>,
        hint: UsageHint,
    ) -> Result<(), AllocationFailure> {
        let old = self.buffer_len(buffer).ok_or(AllocationFailure::Denied)?;
        if self.buffers.get(&buffer).is_some_and(|b| b.storage.is_some()) {
            log::error!("Headless driver: buffer {buffer:?} has immutable storage");
            return Err(AllocationFailure::Denied);
        }
        self.charge(limit, old, source.len())?;
        self.record(DriverCall::AllocateBuffer {
            buffer,
            size: source.len(),
            hint,
        });
        if let Some(entry) = self.buffers.get_mut(&buffer) {
            entry.memory = memory_from(source);
            entry.mapping = None;
        }
        Ok(())
    }

    fn buffer_storage(
        &mut self,
        limit: Option<u64>,
        buffer: BufferHandle,
        source: BufferSource<'_>,
        flags: StorageFlags,
    ) -> Result<(), AllocationFailure> {
        let old = self.buffer_len(buffer).ok_or(AllocationFailure::Denied)?;
        if self.buffers.get(&buffer).is_some_and(|b| b.storage.is_some()) {
            log::error!("Headless driver: buffer {buffer:?} storage is already allocated");
            return Err(AllocationFailure::Denied);
        }
        self.charge(limit, old, source.len())?;
        self.record(DriverCall::AllocateStorage {
            buffer,
            size: source.len(),
            flags,
        });
        if let Some(entry) = self.buffers.get_mut(&buffer) {
            entry.memory = memory_from(source);
            entry.storage = Some(flags);
            entry.mapping = None;
        }
        Ok(())
    }

    fn buffer_sub_data(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        let Some(entry) = self.buffers.get(&buffer) else {
            log::error!("Headless driver: unknown buffer {buffer:?}");
            return;
        };
        if entry
            .storage
            .is_some_and(|flags| !flags.contains(StorageFlags::DYNAMIC_STORAGE))
        {
            log::error!("Headless driver: buffer {buffer:?} storage is not dynamic");
            return;
        }
        if !in_range(entry.memory.len(), offset, data.len() as u64) {
            log::error!("Headless driver: sub-upload out of range for {buffer:?}");
            return;
        }
        let start = offset as usize;
        for (cell, byte) in entry.memory[start..start + data.len()].iter().zip(data) {
            cell.set(*byte);
        }
        self.record(DriverCall::UploadSub {
            buffer,
            offset,
            length: data.len() as u64,
        });
    }

    fn map_buffer_range(
        &mut self,
        deny: bool,
        buffer: BufferHandle,
        offset: u64,
        length: u64,
        access: MapAccess,
    ) -> Option<NonNull<u8>> {
        if deny {
            log::warn!("Headless driver: mapping of {buffer:?} denied");
            return None;
        }
        let entry = self.buffers.get_mut(&buffer)?;
        if entry.mapping.is_some() || !in_range(entry.memory.len(), offset, length) {
            log::error!("Headless driver: invalid map request for {buffer:?}");
            return None;
        }
        if let Some(flags) = entry.storage {
            let allowed = (!access.contains(MapAccess::READ) || flags.contains(StorageFlags::MAP_READ))
                && (!access.contains(MapAccess::WRITE) || flags.contains(StorageFlags::MAP_WRITE))
                && (!access.contains(MapAccess::PERSISTENT)
                    || flags.contains(StorageFlags::PERSISTENT));
            if !allowed {
                log::error!("Headless driver: {access:?} not allowed by storage flags {flags:?}");
                return None;
            }
        }
        entry.mapping = Some(access);
        let base = entry.memory.as_ptr().cast::<u8>().cast_mut();
        // `offset <= len` was checked above.
        let ptr = NonNull::new(base.wrapping_add(offset as usize));
        self.record(DriverCall::MapBuffer {
            buffer,
            offset,
            length,
            access,
        });
        ptr
    }

    fn unmap_buffer(&mut self, buffer: BufferHandle) {
        match self.buffers.get_mut(&buffer) {
            Some(entry) if entry.mapping.is_some() => {
                entry.mapping = None;
                self.record(DriverCall::UnmapBuffer(buffer));
            }
            _ => log::error!("Headless driver: unmap of unmapped buffer {buffer:?}"),
        }
    }

    fn flush_mapped_range(&mut self, buffer: BufferHandle, offset: u64, length: u64) {
        let flushable = self.buffers.get(&buffer).is_some_and(|entry| {
            entry
                .mapping
                .is_some_and(|access| access.contains(MapAccess::FLUSH_EXPLICIT))
        });
        if !flushable {
            log::error!("Headless driver: {buffer:?} has no explicitly flushed mapping");
            return;
        }
        self.record(DriverCall::FlushMappedRange {
            buffer,
            offset,
            length,
        });
    }

    fn copy_buffer(
        &mut self,
        src: BufferHandle,
        dst: BufferHandle,
        src_offset: u64,
        dst_offset: u64,
        size: u64,
    ) {
        let (Some(from), Some(to)) = (self.buffers.get(&src), self.buffers.get(&dst)) else {
            log::error!("Headless driver: copy between unknown buffers {src:?} -> {dst:?}");
            return;
        };
        if !in_range(from.memory.len(), src_offset, size) || !in_range(to.memory.len(), dst_offset, size) {
            log::error!("Headless driver: copy out of range {src:?} -> {dst:?}");
            return;
        }
        let (src_start, dst_start, len) = (src_offset as usize, dst_offset as usize, size as usize);
        let bytes: Vec<u8> = from.memory[src_start..src_start + len]
            .iter()
            .map(Cell::get)
            .collect();
        for (cell, byte) in to.memory[dst_start..dst_start + len].iter().zip(bytes) {
            cell.set(byte);
        }
        self.record(DriverCall::CopyBuffer {
            src,
            dst,
            src_offset,
            dst_offset,
            size,
        });
    }

    fn attach(
        &mut self,
        framebuffer: FramebufferHandle,
        attachment: Attachment,
        texture: Option<TextureHandle>,
        level: u32,
    ) {
        let Some(entry) = self.framebuffers.get_mut(&framebuffer) else {
            log::error!("Headless driver: unknown framebuffer {framebuffer:?}");
            return;
        };
        match attachment {
            Attachment::Color0 => entry.color = texture,
            Attachment::Depth => entry.depth = texture,
        }
        self.record(DriverCall::AttachTexture {
            framebuffer,
            attachment,
            texture,
            level,
        });
    }

    fn blit(
        &mut self,
        read: FramebufferHandle,
        draw: FramebufferHandle,
        src: Rect,
        dst: Rect,
        mask: FramebufferMask,
        filter: FilterMode,
    ) {
        self.record(DriverCall::BlitFramebuffer {
            read,
            draw,
            src,
            dst,
            mask,
            filter,
        });
    }
}

/// A driver that runs without a GPU.
///
/// Buffers are backed by host memory, so data written through uploads or
/// mappings can be read back with [`buffer_contents`](Self::buffer_contents).
/// Every state-changing call is appended to a log for inspection.
#[derive(Debug, Default)]
pub struct HeadlessDriver {
    config: HeadlessConfig,
    state: RefCell<State>,
}

impl HeadlessDriver {
    /// Creates a driver with `config`.
    pub fn new(config: HeadlessConfig) -> Self {
        Self {
            config,
            state: RefCell::new(State::default()),
        }
    }

    /// A driver with no extensions.
    pub fn legacy() -> Self {
        Self::new(HeadlessConfig::legacy())
    }

    /// The driver's configuration.
    pub fn config(&self) -> &HeadlessConfig {
        &self.config
    }

    /// Every call recorded since creation or the last [`clear_calls`](Self::clear_calls).
    pub fn calls(&self) -> Vec<DriverCall> {
        self.state.borrow().calls.clone()
    }

    /// Empties the call log.
    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// A copy of `buffer`'s memory, or `None` for an unknown buffer.
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<Vec<u8>> {
        let state = self.state.borrow();
        let entry = state.buffers.get(&buffer)?;
        Some(entry.memory.iter().map(Cell::get).collect())
    }

    /// `buffer`'s memory read as a sequence of `T`.
    pub fn read_buffer<T: bytemuck::Pod>(&self, buffer: BufferHandle) -> Option<Vec<T>> {
        let bytes = self.buffer_contents(buffer)?;
        Some(
            bytes
                .chunks_exact(std::mem::size_of::<T>())
                .map(bytemuck::pod_read_unaligned)
                .collect(),
        )
    }

    /// Returns `true` while `buffer` is mapped.
    pub fn is_mapped(&self, buffer: BufferHandle) -> bool {
        self.state
            .borrow()
            .buffers
            .get(&buffer)
            .is_some_and(|entry| entry.mapping.is_some())
    }

    /// Number of buffers not yet deleted.
    pub fn live_buffers(&self) -> usize {
        self.state.borrow().buffers.len()
    }

    /// Number of textures not yet deleted.
    pub fn live_textures(&self) -> usize {
        self.state.borrow().textures.len()
    }

    /// Number of framebuffers not yet deleted.
    pub fn live_framebuffers(&self) -> usize {
        self.state.borrow().framebuffers.len()
    }

    /// The color and depth textures attached to `framebuffer`.
    pub fn attachments(
        &self,
        framebuffer: FramebufferHandle,
    ) -> Option<(Option<TextureHandle>, Option<TextureHandle>)> {
        let state = self.state.borrow();
        let entry = state.framebuffers.get(&framebuffer)?;
        Some((entry.color, entry.depth))
    }

    /// Size of `texture`'s base level.
    pub fn texture_size(&self, texture: TextureHandle) -> Option<(u32, u32)> {
        let state = self.state.borrow();
        let descriptor = state.textures.get(&texture)?;
        Some((descriptor.width, descriptor.height))
    }

    /// The current debug group nesting depth.
    pub fn debug_group_depth(&self) -> u32 {
        self.state.borrow().debug_group_depth
    }

    /// Bytes of buffer and texture memory currently allocated.
    pub fn allocated_bytes(&self) -> u64 {
        self.state.borrow().allocated
    }
}

impl GlDriver for HeadlessDriver {
    fn extensions(&self) -> Vec<String> {
        self.config.extensions.clone()
    }

    fn renderer_name(&self) -> String {
        self.config.renderer_name.clone()
    }

    fn max_texture_size(&self) -> u32 {
        self.config.max_texture_size
    }

    fn uniform_offset_alignment(&self) -> u32 {
        self.config.uniform_offset_alignment
    }

    fn gen_buffer(&self) -> BufferHandle {
        let mut state = self.state.borrow_mut();
        let handle = BufferHandle(state.next_name());
        state.buffers.insert(handle, HeadlessBuffer::default());
        state.record(DriverCall::GenBuffer(handle));
        handle
    }

    fn bound_buffer(&self, target: BufferTarget) -> Option<BufferHandle> {
        self.state.borrow().buffer_bindings.get(&target).copied()
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<BufferHandle>) {
        let mut state = self.state.borrow_mut();
        match buffer {
            Some(handle) => state.buffer_bindings.insert(target, handle),
            None => state.buffer_bindings.remove(&target),
        };
        state.record(DriverCall::BindBuffer { target, buffer });
    }

    fn buffer_data(
        &self,
        target: BufferTarget,
        source: BufferSource<'_>,
        hint: UsageHint,
    ) -> Result<(), AllocationFailure> {
        let mut state = self.state.borrow_mut();
        let buffer = state.bound_buffer(target).ok_or(AllocationFailure::Denied)?;
        state.buffer_data(self.config.memory_limit, buffer, source, hint)
    }

    fn buffer_sub_data(&self, target: BufferTarget, offset: u64, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        if let Some(buffer) = state.bound_buffer(target) {
            state.buffer_sub_data(buffer, offset, data);
        }
    }

    fn buffer_storage(
        &self,
        target: BufferTarget,
        source: BufferSource<'_>,
        flags: StorageFlags,
    ) -> Result<(), AllocationFailure> {
        let mut state = self.state.borrow_mut();
        let buffer = state.bound_buffer(target).ok_or(AllocationFailure::Denied)?;
        state.buffer_storage(self.config.memory_limit, buffer, source, flags)
    }

    fn map_buffer_range(
        &self,
        target: BufferTarget,
        offset: u64,
        length: u64,
        access: MapAccess,
    ) -> Option<NonNull<u8>> {
        let mut state = self.state.borrow_mut();
        let buffer = state.bound_buffer(target)?;
        state.map_buffer_range(self.config.deny_mapping, buffer, offset, length, access)
    }

    fn unmap_buffer(&self, target: BufferTarget) {
        let mut state = self.state.borrow_mut();
        if let Some(buffer) = state.bound_buffer(target) {
            state.unmap_buffer(buffer);
        }
    }

    fn flush_mapped_buffer_range(&self, target: BufferTarget, offset: u64, length: u64) {
        let mut state = self.state.borrow_mut();
        if let Some(buffer) = state.bound_buffer(target) {
            state.flush_mapped_range(buffer, offset, length);
        }
    }

    fn copy_buffer_sub_data(
        &self,
        read: BufferTarget,
        write: BufferTarget,
        read_offset: u64,
        write_offset: u64,
        size: u64,
    ) {
        let mut state = self.state.borrow_mut();
        if let (Some(src), Some(dst)) = (state.bound_buffer(read), state.bound_buffer(write)) {
            state.copy_buffer(src, dst, read_offset, write_offset, size);
        }
    }

    fn create_buffer(&self) -> BufferHandle {
        let mut state = self.state.borrow_mut();
        let handle = BufferHandle(state.next_name());
        state.buffers.insert(handle, HeadlessBuffer::default());
        state.record(DriverCall::CreateBuffer(handle));
        handle
    }

    fn named_buffer_data(
        &self,
        buffer: BufferHandle,
        source: BufferSource<'_>,
        hint: UsageHint,
    ) -> Result<(), AllocationFailure> {
        self.state
            .borrow_mut()
            .buffer_data(self.config.memory_limit, buffer, source, hint)
    }

    fn named_buffer_sub_data(&self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        self.state.borrow_mut().buffer_sub_data(buffer, offset, data);
    }

    fn named_buffer_storage(
        &self,
        buffer: BufferHandle,
        source: BufferSource<'_>,
        flags: StorageFlags,
    ) -> Result<(), AllocationFailure> {
        self.state
            .borrow_mut()
            .buffer_storage(self.config.memory_limit, buffer, source, flags)
    }

    fn map_named_buffer_range(
        &self,
        buffer: BufferHandle,
        offset: u64,
        length: u64,
        access: MapAccess,
    ) -> Option<NonNull<u8>> {
        self.state.borrow_mut().map_buffer_range(
            self.config.deny_mapping,
            buffer,
            offset,
            length,
            access,
        )
    }

    fn unmap_named_buffer(&self, buffer: BufferHandle) {
        self.state.borrow_mut().unmap_buffer(buffer);
    }

    fn flush_mapped_named_buffer_range(&self, buffer: BufferHandle, offset: u64, length: u64) {
        self.state
            .borrow_mut()
            .flush_mapped_range(buffer, offset, length);
    }

    fn copy_named_buffer_sub_data(
        &self,
        src: BufferHandle,
        dst: BufferHandle,
        src_offset: u64,
        dst_offset: u64,
        size: u64,
    ) {
        self.state
            .borrow_mut()
            .copy_buffer(src, dst, src_offset, dst_offset, size);
    }

    fn delete_buffer(&self, buffer: BufferHandle) {
        let mut state = self.state.borrow_mut();
        let Some(entry) = state.buffers.remove(&buffer) else {
            log::error!("Headless driver: delete of unknown buffer {buffer:?}");
            return;
        };
        state.allocated -= entry.memory.len() as u64;
        state.buffer_bindings.retain(|_, bound| *bound != buffer);
        state.record(DriverCall::DeleteBuffer(buffer));
    }

    fn gen_framebuffer(&self) -> FramebufferHandle {
        let mut state = self.state.borrow_mut();
        let handle = FramebufferHandle(state.next_name());
        state.framebuffers.insert(handle, HeadlessFramebuffer::default());
        state.record(DriverCall::GenFramebuffer(handle));
        handle
    }

    fn create_framebuffer(&self) -> FramebufferHandle {
        let mut state = self.state.borrow_mut();
        let handle = FramebufferHandle(state.next_name());
        state.framebuffers.insert(handle, HeadlessFramebuffer::default());
        state.record(DriverCall::CreateFramebuffer(handle));
        handle
    }

    fn bound_framebuffer(&self, target: FramebufferTarget) -> Option<FramebufferHandle> {
        self.state.borrow().framebuffer_bindings.get(&target).copied()
    }

    fn bind_framebuffer(&self, target: FramebufferTarget, framebuffer: Option<FramebufferHandle>) {
        let mut state = self.state.borrow_mut();
        match framebuffer {
            Some(handle) => state.framebuffer_bindings.insert(target, handle),
            None => state.framebuffer_bindings.remove(&target),
        };
        state.record(DriverCall::BindFramebuffer {
            target,
            framebuffer,
        });
    }

    fn framebuffer_texture(
        &self,
        target: FramebufferTarget,
        attachment: Attachment,
        texture: Option<TextureHandle>,
        level: u32,
    ) {
        let mut state = self.state.borrow_mut();
        if let Some(framebuffer) = state.bound_framebuffer(target) {
            state.attach(framebuffer, attachment, texture, level);
        }
    }

    fn named_framebuffer_texture(
        &self,
        framebuffer: FramebufferHandle,
        attachment: Attachment,
        texture: Option<TextureHandle>,
        level: u32,
    ) {
        self.state
            .borrow_mut()
            .attach(framebuffer, attachment, texture, level);
    }

    fn blit_framebuffer(&self, src: Rect, dst: Rect, mask: FramebufferMask, filter: FilterMode) {
        let mut state = self.state.borrow_mut();
        let read = state.bound_framebuffer(FramebufferTarget::Read);
        let draw = state.bound_framebuffer(FramebufferTarget::Draw);
        if let (Some(read), Some(draw)) = (read, draw) {
            state.blit(read, draw, src, dst, mask, filter);
        }
    }

    fn blit_named_framebuffer(
        &self,
        read: FramebufferHandle,
        draw: FramebufferHandle,
        src: Rect,
        dst: Rect,
        mask: FramebufferMask,
        filter: FilterMode,
    ) {
        self.state
            .borrow_mut()
            .blit(read, draw, src, dst, mask, filter);
    }

    fn delete_framebuffer(&self, framebuffer: FramebufferHandle) {
        let mut state = self.state.borrow_mut();
        if state.framebuffers.remove(&framebuffer).is_none() {
            log::error!("Headless driver: delete of unknown framebuffer {framebuffer:?}");
            return;
        }
        state
            .framebuffer_bindings
            .retain(|_, bound| *bound != framebuffer);
        state.record(DriverCall::DeleteFramebuffer(framebuffer));
    }

    fn viewport(&self, rect: Rect) {
        self.state.borrow_mut().record(DriverCall::Viewport(rect));
    }

    fn clear(&self, mask: FramebufferMask, _color: [f32; 4], _depth: f64) {
        self.state.borrow_mut().record(DriverCall::Clear(mask));
    }

    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
    ) -> Result<TextureHandle, AllocationFailure> {
        let mut state = self.state.borrow_mut();
        let size = texture_bytes(descriptor);
        state.charge(self.config.memory_limit, 0, size)?;
        let texture = TextureHandle(state.next_name());
        state.textures.insert(texture, descriptor.clone());
        state.record(DriverCall::CreateTexture {
            texture,
            width: descriptor.width,
            height: descriptor.height,
        });
        Ok(texture)
    }

    fn delete_texture(&self, texture: TextureHandle) {
        let mut state = self.state.borrow_mut();
        let Some(descriptor) = state.textures.remove(&texture) else {
            log::error!("Headless driver: delete of unknown texture {texture:?}");
            return;
        };
        state.allocated -= texture_bytes(&descriptor);
        state.record(DriverCall::DeleteTexture(texture));
    }

    fn create_sampler(&self, _filter: FilterMode, _address: AddressMode) -> SamplerHandle {
        let mut state = self.state.borrow_mut();
        let sampler = SamplerHandle(state.next_name());
        state.record(DriverCall::CreateSampler(sampler));
        sampler
    }

    fn link_program(&self, pipeline: &RenderPipeline) -> Result<ProgramHandle, String> {
        if self.config.rejected_programs.contains(&pipeline.label) {
            return Err(format!("program '{}' failed to link", pipeline.label));
        }
        let mut state = self.state.borrow_mut();
        let program = ProgramHandle(state.next_name());
        state.programs.insert(program, pipeline.label.clone());
        state.record(DriverCall::LinkProgram {
            program,
            label: pipeline.label.clone(),
        });
        Ok(program)
    }

    fn use_program(&self, program: Option<ProgramHandle>) {
        let mut state = self.state.borrow_mut();
        if program.is_some_and(|p| !state.programs.contains_key(&p)) {
            log::error!("Headless driver: unknown program {program:?}");
        }
        state.record(DriverCall::UseProgram(program));
    }

    fn bind_buffer_range(&self, slot: u32, buffer: BufferHandle, offset: u64, length: u64) {
        let mut state = self.state.borrow_mut();
        let fits = state
            .buffers
            .get(&buffer)
            .is_some_and(|entry| in_range(entry.memory.len(), offset, length));
        if !fits {
            log::error!("Headless driver: uniform range out of bounds for {buffer:?}");
        }
        state.record(DriverCall::BindBufferRange {
            slot,
            buffer,
            offset,
            length,
        });
    }

    fn bind_texture_unit(
        &self,
        unit: u32,
        texture: Option<TextureHandle>,
        sampler: Option<SamplerHandle>,
    ) {
        self.state.borrow_mut().record(DriverCall::BindTextureUnit {
            unit,
            texture,
            sampler,
        });
    }

    fn bind_vertex_buffer(&self, buffer: BufferHandle, offset: u64, stride: u32) {
        self.state.borrow_mut().record(DriverCall::BindVertexBuffer {
            buffer,
            offset,
            stride,
        });
    }

    fn set_scissor(&self, rect: Option<Rect>) {
        self.state.borrow_mut().record(DriverCall::SetScissor(rect));
    }

    fn draw_arrays(&self, _topology: PrimitiveTopology, first: u32, count: u32) {
        self.state
            .borrow_mut()
            .record(DriverCall::DrawArrays { first, count });
    }

    fn draw_elements(
        &self,
        _topology: PrimitiveTopology,
        index_buffer: BufferHandle,
        index_type: IndexType,
        first_index: u32,
        count: u32,
        _base_vertex: i32,
        instances: u32,
    ) {
        self.state.borrow_mut().record(DriverCall::DrawElements {
            index_buffer,
            index_type,
            first_index,
            count,
            instances,
        });
    }

    fn push_debug_group(&self, label: &str) {
        let mut state = self.state.borrow_mut();
        state.debug_group_depth += 1;
        state.record(DriverCall::PushDebugGroup(label.to_owned()));
    }

    fn pop_debug_group(&self) {
        let mut state = self.state.borrow_mut();
        if state.debug_group_depth == 0 {
            log::error!("Headless driver: debug group stack underflow");
            return;
        }
        state.debug_group_depth -= 1;
        state.record(DriverCall::PopDebugGroup);
    }
}

fn texture_bytes(descriptor: &TextureDescriptor) -> u64 {
    u64::from(descriptor.width) * u64::from(descriptor.height) * 4
}
