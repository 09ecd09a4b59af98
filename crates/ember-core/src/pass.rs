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

//! Render pass recording.
//!
//! A [`RenderPass`] accumulates bindings in a table keyed by uniform name and only
//! transmits them to the driver when a draw is issued. Every `set_uniform` or
//! `bind_sampler` marks its name pending; switching to a different pipeline marks
//! every bound name pending. A draw then sends exactly the pending names the
//! current pipeline declares and clears the pending set.

use crate::buffer::{BufferSlice, BufferUsage};
use crate::device::GpuDevice;
use crate::driver::{Rect, SamplerHandle};
use crate::error::UsageError;
use crate::framebuffer::Framebuffer;
use crate::pipeline::{CompiledPipeline, IndexType};
use crate::texture::TextureView;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Number of vertex buffer slots a pass supports.
pub const MAX_VERTEX_BUFFERS: usize = 1;

/// A texture bound to a sampler name.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerBinding {
    /// The bound texture.
    pub view: TextureView,
    /// The sampler state.
    pub sampler: SamplerHandle,
}

/// One indexed draw of [`RenderPass::draw_multiple_indexed`].
#[derive(Debug, Clone)]
pub struct RenderObject {
    /// Vertex buffer slot the vertices are bound to.
    pub slot: usize,
    /// The vertices.
    pub vertex_buffer: BufferSlice,
    /// Index buffer for this object; falls back to the shared one.
    pub index_buffer: Option<BufferSlice>,
    /// Index width for this object; falls back to the shared one, then to 16-bit.
    pub index_type: Option<IndexType>,
    /// First index to draw.
    pub first_index: u32,
    /// Number of indices to draw.
    pub index_count: u32,
    /// Uniforms set before drawing this object.
    pub uniforms: Vec<(String, BufferSlice)>,
}

/// A single-threaded recording scope for draws into one framebuffer.
///
/// Opened with [`GpuDevice::begin_render_pass`]. After [`close`](RenderPass::close)
/// every operation, including a second `close`, fails. Dropping an open pass ends
/// it and logs any debug groups that were left open.
#[derive(Debug)]
pub struct RenderPass<'dev> {
    device: &'dev GpuDevice,
    label: String,
    target: &'dev Framebuffer,
    pipeline: Option<Rc<CompiledPipeline>>,
    vertex_buffers: [Option<BufferSlice>; MAX_VERTEX_BUFFERS],
    index_buffer: Option<BufferSlice>,
    index_type: IndexType,
    scissor: Option<Rect>,
    uniforms: HashMap<String, BufferSlice>,
    samplers: HashMap<String, SamplerBinding>,
    pending: HashSet<String>,
    debug_group_depth: u32,
    closed: bool,
}

impl<'dev> RenderPass<'dev> {
    pub(crate) fn new(device: &'dev GpuDevice, label: &str, target: &'dev Framebuffer) -> Self {
        Self {
            device,
            label: label.to_owned(),
            target,
            pipeline: None,
            vertex_buffers: Default::default(),
            index_buffer: None,
            index_type: IndexType::default(),
            scissor: None,
            uniforms: HashMap::new(),
            samplers: HashMap::new(),
            pending: HashSet::new(),
            debug_group_depth: 0,
            closed: false,
        }
    }

    /// The pass label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The framebuffer the pass draws into. It stays borrowed until the pass ends.
    pub fn target(&self) -> &'dev Framebuffer {
        self.target
    }

    /// Size of the target framebuffer.
    pub fn target_size(&self) -> (u32, u32) {
        (self.target.width(), self.target.height())
    }

    /// Returns `true` once the pass is closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The current debug group nesting depth.
    pub fn debug_group_depth(&self) -> u32 {
        self.debug_group_depth
    }

    /// Names waiting to be transmitted at the next draw.
    pub fn pending_uniforms(&self) -> &HashSet<String> {
        &self.pending
    }

    /// Sets the pipeline for subsequent draws.
    ///
    /// Switching to a different pipeline marks every bound uniform and sampler
    /// for re-transmission.
    pub fn set_pipeline(&mut self, pipeline: &Rc<CompiledPipeline>) -> Result<(), UsageError> {
        self.ensure_open()?;
        let changed = self
            .pipeline
            .as_ref()
            .map_or(true, |current| !Rc::ptr_eq(current, pipeline));
        if changed {
            self.pending.extend(self.uniforms.keys().cloned());
            self.pending.extend(self.samplers.keys().cloned());
            self.pipeline = Some(Rc::clone(pipeline));
        }
        Ok(())
    }

    /// Binds a texture and sampler to `name`, or removes the binding with `None`.
    pub fn bind_sampler(
        &mut self,
        name: &str,
        binding: Option<(&TextureView, SamplerHandle)>,
    ) -> Result<(), UsageError> {
        self.ensure_open()?;
        match binding {
            Some((view, sampler)) => {
                self.samplers.insert(
                    name.to_owned(),
                    SamplerBinding {
                        view: view.clone(),
                        sampler,
                    },
                );
            }
            None => {
                self.samplers.remove(name);
            }
        }
        self.pending.insert(name.to_owned());
        Ok(())
    }

    /// Binds a buffer slice to the uniform `name`.
    ///
    /// The slice offset must be a multiple of the device's uniform offset
    /// alignment; a misaligned slice is rejected before any driver call.
    pub fn set_uniform(&mut self, name: &str, slice: &BufferSlice) -> Result<(), UsageError> {
        self.ensure_open()?;
        let alignment = self.device.limits().uniform_offset_alignment;
        if alignment > 1 && slice.offset() % u64::from(alignment) != 0 {
            return Err(UsageError::MisalignedUniformOffset {
                name: name.to_owned(),
                offset: slice.offset(),
                alignment,
            }
            .logged());
        }
        self.uniforms.insert(name.to_owned(), slice.clone());
        self.pending.insert(name.to_owned());
        Ok(())
    }

    /// Binds a vertex buffer to `slot`.
    pub fn set_vertex_buffer(&mut self, slot: usize, slice: &BufferSlice) -> Result<(), UsageError> {
        self.ensure_open()?;
        let Some(entry) = self.vertex_buffers.get_mut(slot) else {
            return Err(UsageError::VertexSlotOutOfRange {
                slot,
                max: MAX_VERTEX_BUFFERS,
            }
            .logged());
        };
        *entry = Some(slice.clone());
        Ok(())
    }

    /// Binds the index buffer for indexed draws.
    pub fn set_index_buffer(
        &mut self,
        slice: &BufferSlice,
        index_type: IndexType,
    ) -> Result<(), UsageError> {
        self.ensure_open()?;
        self.index_buffer = Some(slice.clone());
        self.index_type = index_type;
        Ok(())
    }

    /// Restricts subsequent draws to a rectangle.
    pub fn enable_scissor(&mut self, x: i32, y: i32, width: u32, height: u32) -> Result<(), UsageError> {
        self.ensure_open()?;
        self.scissor = Some(Rect::new(x, y, width, height));
        Ok(())
    }

    /// Lifts the scissor restriction.
    pub fn disable_scissor(&mut self) -> Result<(), UsageError> {
        self.ensure_open()?;
        self.scissor = None;
        Ok(())
    }

    /// Opens a nested debug group.
    pub fn push_debug_group(&mut self, label: &str) -> Result<(), UsageError> {
        self.ensure_open()?;
        if self.device.capabilities().debug_labels() {
            self.device.driver().push_debug_group(label);
        }
        self.debug_group_depth += 1;
        Ok(())
    }

    /// Closes the innermost debug group.
    pub fn pop_debug_group(&mut self) -> Result<(), UsageError> {
        self.ensure_open()?;
        if self.debug_group_depth == 0 {
            return Err(UsageError::DebugGroupUnderflow {
                pass: self.label.clone(),
            }
            .logged());
        }
        if self.device.capabilities().debug_labels() {
            self.device.driver().pop_debug_group();
        }
        self.debug_group_depth -= 1;
        Ok(())
    }

    /// Draws `count` vertices starting at `first`.
    pub fn draw(&mut self, first: u32, count: u32) -> Result<(), UsageError> {
        self.ensure_open()?;
        let pipeline = self.prepare_draw(false)?;
        self.device
            .driver()
            .draw_arrays(pipeline.info().topology, first, count);
        Ok(())
    }

    /// Draws `index_count` indices of the bound index buffer, `instances` times.
    pub fn draw_indexed(
        &mut self,
        base_vertex: i32,
        first_index: u32,
        index_count: u32,
        instances: u32,
    ) -> Result<(), UsageError> {
        self.ensure_open()?;
        let pipeline = self.prepare_draw(true)?;
        self.submit_indexed(&pipeline, base_vertex, first_index, index_count, instances);
        Ok(())
    }

    /// Draws a batch of indexed objects.
    ///
    /// Each object binds its vertex buffer and uniforms before drawing. Objects
    /// without an index buffer use `index_buffer`; objects without an index type use
    /// `index_type`, or 16-bit indices when neither is given.
    pub fn draw_multiple_indexed(
        &mut self,
        objects: &[RenderObject],
        index_buffer: Option<&BufferSlice>,
        index_type: Option<IndexType>,
    ) -> Result<(), UsageError> {
        self.ensure_open()?;
        for object in objects {
            self.set_vertex_buffer(object.slot, &object.vertex_buffer)?;
            let indices = object.index_buffer.as_ref().or(index_buffer);
            let Some(indices) = indices else {
                return Err(UsageError::MissingIndexBuffer {
                    pass: self.label.clone(),
                }
                .logged());
            };
            let object_type = object.index_type.or(index_type).unwrap_or(IndexType::U16);
            self.index_buffer = Some(indices.clone());
            self.index_type = object_type;
            for (name, slice) in &object.uniforms {
                self.set_uniform(name, slice)?;
            }

            let pipeline = self.prepare_draw(true)?;
            self.submit_indexed(&pipeline, 0, object.first_index, object.index_count, 1);
        }
        Ok(())
    }

    /// Closes the pass. Fails if debug groups are still open.
    pub fn close(&mut self) -> Result<(), UsageError> {
        self.ensure_open()?;
        if self.debug_group_depth != 0 {
            return Err(UsageError::UnbalancedDebugGroups {
                pass: self.label.clone(),
                depth: self.debug_group_depth,
            }
            .logged());
        }
        self.finish();
        Ok(())
    }

    fn finish(&mut self) {
        self.closed = true;
        self.device.end_render_pass();
    }

    fn ensure_open(&self) -> Result<(), UsageError> {
        if self.closed {
            return Err(UsageError::PassClosed {
                pass: self.label.clone(),
            }
            .logged());
        }
        Ok(())
    }

    fn submit_indexed(
        &self,
        pipeline: &CompiledPipeline,
        base_vertex: i32,
        first_index: u32,
        index_count: u32,
        instances: u32,
    ) {
        // `prepare_draw(true)` guarantees an index buffer.
        if let Some(indices) = &self.index_buffer {
            self.device.driver().draw_elements(
                pipeline.info().topology,
                indices.handle(),
                self.index_type,
                first_index,
                index_count,
                base_vertex,
                instances,
            );
        }
    }

    /// Validates the draw state and transmits pending bindings.
    fn prepare_draw(&mut self, indexed: bool) -> Result<Rc<CompiledPipeline>, UsageError> {
        let Some(pipeline) = self.pipeline.clone() else {
            return Err(UsageError::MissingPipeline {
                pass: self.label.clone(),
            }
            .logged());
        };
        let info = pipeline.info();

        if indexed {
            let Some(indices) = &self.index_buffer else {
                return Err(UsageError::MissingIndexBuffer {
                    pass: self.label.clone(),
                }
                .logged());
            };
            check_slice(indices, BufferUsage::INDEX)?;
        }

        if !info.vertex_format.is_empty() {
            let Some(vertices) = &self.vertex_buffers[0] else {
                return Err(UsageError::MissingVertexBuffer {
                    pass: self.label.clone(),
                }
                .logged());
            };
            check_slice(vertices, BufferUsage::VERTEX)?;
        }

        for uniform in &info.uniforms {
            let Some(slice) = self.uniforms.get(&uniform.name) else {
                return Err(UsageError::MissingUniform {
                    pass: self.label.clone(),
                    name: uniform.name.clone(),
                }
                .logged());
            };
            check_slice(slice, uniform.kind.required_usage())?;
        }

        for name in &info.samplers {
            match self.samplers.get(name) {
                None => {
                    return Err(UsageError::MissingSampler {
                        pass: self.label.clone(),
                        name: name.clone(),
                    }
                    .logged())
                }
                Some(binding) if binding.view.is_closed() => {
                    return Err(UsageError::ResourceClosed {
                        label: binding.view.label().to_owned(),
                    }
                    .logged())
                }
                Some(_) => {}
            }
        }

        let device = self.device;
        let driver = device.driver();
        device.apply_program(pipeline.program());

        if let Some(vertices) = &self.vertex_buffers[0] {
            if !info.vertex_format.is_empty() {
                driver.bind_vertex_buffer(vertices.handle(), vertices.offset(), info.vertex_format.stride);
            }
        }

        for (slot, uniform) in info.uniforms.iter().enumerate() {
            if !self.pending.contains(&uniform.name) {
                continue;
            }
            if let Some(slice) = self.uniforms.get(&uniform.name) {
                driver.bind_buffer_range(slot as u32, slice.handle(), slice.offset(), slice.length());
            }
        }
        for (unit, name) in info.samplers.iter().enumerate() {
            if !self.pending.contains(name) {
                continue;
            }
            if let Some(binding) = self.samplers.get(name) {
                driver.bind_texture_unit(unit as u32, Some(binding.view.handle()), Some(binding.sampler));
            }
        }
        self.pending.clear();

        driver.set_scissor(self.scissor);
        Ok(pipeline)
    }
}

impl Drop for RenderPass<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if self.debug_group_depth > 0 {
            log::error!(
                "Render pass '{}' dropped with {} debug group(s) open",
                self.label,
                self.debug_group_depth
            );
            if self.device.capabilities().debug_labels() {
                for _ in 0..self.debug_group_depth {
                    self.device.driver().pop_debug_group();
                }
            }
            self.debug_group_depth = 0;
        }
        self.finish();
    }
}

fn check_slice(slice: &BufferSlice, required: BufferUsage) -> Result<(), UsageError> {
    if slice.is_closed() {
        return Err(UsageError::ResourceClosed {
            label: slice.label().to_owned(),
        }
        .logged());
    }
    if !slice.usage().contains(required) {
        return Err(UsageError::MissingUsage {
            label: slice.label().to_owned(),
            required,
        }
        .logged());
    }
    Ok(())
}
