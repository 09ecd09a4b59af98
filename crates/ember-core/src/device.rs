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

//! The device: the entry point that ties the driver, the selected backend and the
//! capability set together.

use crate::backend::RawBufferBackend;
use crate::buffer::BufferResourceFactory;
use crate::capability::CapabilitySet;
use crate::driver::{FramebufferMask, FramebufferTarget, GlDriver, ProgramHandle, Rect, SamplerHandle};
use crate::error::{DimensionError, DriverError, RenderError, UsageError};
use crate::framebuffer::Framebuffer;
use crate::pass::RenderPass;
use crate::pipeline::{CompiledPipeline, RenderPipeline};
use crate::settings::RenderSettings;
use crate::texture::{AddressMode, FilterMode, GpuTexture, SamplerCache, TextureDescriptor};
use crate::thread::RenderThread;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Limits reported by the driver at device creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    /// The largest texture width or height.
    pub max_texture_size: u32,
    /// The alignment of uniform buffer range offsets.
    pub uniform_offset_alignment: u32,
}

impl DeviceLimits {
    /// Rejects sizes outside `1..=max_texture_size`.
    pub fn check_texture_size(
        &self,
        label: &str,
        width: u32,
        height: u32,
    ) -> Result<(), DimensionError> {
        let in_range = |v: u32| v > 0 && v <= self.max_texture_size;
        if in_range(width) && in_range(height) {
            return Ok(());
        }
        Err(DimensionError {
            label: label.to_owned(),
            width,
            height,
            max: self.max_texture_size,
        }
        .logged())
    }

    /// Rounds `size` up to the uniform offset alignment.
    pub fn align_uniform(&self, size: u64) -> u64 {
        let align = u64::from(self.uniform_offset_alignment.max(1));
        size.div_ceil(align) * align
    }
}

/// The GPU device.
///
/// Holds the driver, the buffer backend chosen from the capability set, and the
/// render-context state shared by every resource. A device is not `Send`; all work
/// happens on the thread that created it.
#[derive(Debug)]
pub struct GpuDevice {
    driver: Rc<dyn GlDriver>,
    backend: Rc<dyn RawBufferBackend>,
    capabilities: CapabilitySet,
    limits: DeviceLimits,
    settings: RenderSettings,
    buffers: BufferResourceFactory,
    samplers: SamplerCache,
    pipelines: RefCell<HashMap<String, Rc<CompiledPipeline>>>,
    pass_open: Rc<Cell<bool>>,
    current_program: Cell<Option<ProgramHandle>>,
    thread: RenderThread,
}

impl GpuDevice {
    /// Builds a device around `driver` and the `backend` selected for `capabilities`.
    pub fn new(
        driver: Rc<dyn GlDriver>,
        backend: Rc<dyn RawBufferBackend>,
        capabilities: CapabilitySet,
        settings: RenderSettings,
    ) -> Self {
        let thread = RenderThread::current();
        let limits = DeviceLimits {
            max_texture_size: driver.max_texture_size(),
            uniform_offset_alignment: driver.uniform_offset_alignment().max(1),
        };
        let pass_open = Rc::new(Cell::new(false));
        let buffers = BufferResourceFactory::new(
            Rc::clone(&backend),
            &capabilities,
            Rc::clone(&pass_open),
            thread,
        );

        log::info!(
            "GPU device ready on '{}': {} buffer backend, persistent storage {}, max texture size {}, uniform alignment {}",
            driver.renderer_name(),
            backend.kind(),
            if capabilities.buffer_storage() { "on" } else { "off" },
            limits.max_texture_size,
            limits.uniform_offset_alignment,
        );
        log::debug!("Used driver capabilities: {:?}", capabilities.used_capabilities());

        Self {
            samplers: SamplerCache::new(Rc::clone(&driver)),
            driver,
            backend,
            capabilities,
            limits,
            settings,
            buffers,
            pipelines: RefCell::new(HashMap::new()),
            pass_open,
            current_program: Cell::new(None),
            thread,
        }
    }

    /// The driver.
    pub fn driver(&self) -> &Rc<dyn GlDriver> {
        &self.driver
    }

    /// The buffer backend selected at creation.
    pub fn backend(&self) -> &Rc<dyn RawBufferBackend> {
        &self.backend
    }

    /// The capability set probed at creation.
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// The driver-reported limits.
    pub fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    /// The settings the device was created with.
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// The buffer factory.
    pub fn buffers(&self) -> &BufferResourceFactory {
        &self.buffers
    }

    /// The thread that owns the driver context.
    pub fn render_thread(&self) -> RenderThread {
        self.thread
    }

    /// Returns `true` while a render pass is recording.
    pub fn is_render_pass_open(&self) -> bool {
        self.pass_open.get()
    }

    /// Creates a texture after checking its size against the device limits.
    pub fn create_texture(&self, descriptor: TextureDescriptor) -> Result<GpuTexture, RenderError> {
        self.thread.assert_current();
        self.limits
            .check_texture_size(&descriptor.label, descriptor.width, descriptor.height)?;

        let handle = self.driver.create_texture(&descriptor).map_err(|reason| {
            DriverError::TextureAllocation {
                label: descriptor.label.clone(),
                width: descriptor.width,
                height: descriptor.height,
                reason,
            }
            .logged()
        })?;
        Ok(GpuTexture::new(handle, descriptor, Rc::clone(&self.driver)))
    }

    /// The sampler for `filter` and `address`.
    pub fn sampler(&self, filter: FilterMode, address: AddressMode) -> SamplerHandle {
        self.samplers.get(filter, address)
    }

    /// Links `pipeline`, or returns the cached program linked for its label.
    ///
    /// A label already linked from a different description is rejected.
    pub fn compile_pipeline(
        &self,
        pipeline: &RenderPipeline,
    ) -> Result<Rc<CompiledPipeline>, RenderError> {
        self.thread.assert_current();
        if let Some(compiled) = self.pipelines.borrow().get(&pipeline.label) {
            if compiled.info() != pipeline {
                return Err(UsageError::PipelineLabelConflict {
                    label: pipeline.label.clone(),
                }
                .logged()
                .into());
            }
            return Ok(Rc::clone(compiled));
        }

        let program = self.driver.link_program(pipeline).map_err(|details| {
            DriverError::LinkFailed {
                pipeline: pipeline.label.clone(),
                details,
            }
            .logged()
        })?;
        let compiled = Rc::new(CompiledPipeline::new(pipeline.clone(), program));
        self.pipelines
            .borrow_mut()
            .insert(pipeline.label.clone(), Rc::clone(&compiled));
        log::debug!("Linked pipeline '{}' as {:?}", pipeline.label, program);
        Ok(compiled)
    }

    /// Opens a render pass drawing into `target`.
    ///
    /// Only one pass may record at a time, and buffer commands are refused until
    /// it closes. `target` stays borrowed until the pass is dropped, so it cannot
    /// be resized or deleted underneath the pass. `clear_depth` requires a depth
    /// attachment.
    pub fn begin_render_pass<'dev>(
        &'dev self,
        label: &str,
        target: &'dev Framebuffer,
        clear_color: Option<[f32; 4]>,
        clear_depth: Option<f64>,
    ) -> Result<RenderPass<'dev>, RenderError> {
        self.thread.assert_current();
        if self.pass_open.get() {
            return Err(UsageError::RenderPassOpen.logged().into());
        }
        let Some(handle) = target.handle() else {
            return Err(UsageError::FramebufferNotInitialized {
                framebuffer: target.name().to_owned(),
            }
            .logged()
            .into());
        };
        if clear_depth.is_some() && target.depth_view().is_none() {
            return Err(UsageError::MissingDepthAttachment {
                framebuffer: target.name().to_owned(),
            }
            .logged()
            .into());
        }

        if self.capabilities.debug_labels() {
            self.driver.push_debug_group(label);
        }
        self.driver
            .bind_framebuffer(FramebufferTarget::Draw, Some(handle));
        self.driver
            .viewport(Rect::sized(target.width(), target.height()));

        let mut mask = FramebufferMask::empty();
        if clear_color.is_some() {
            mask |= FramebufferMask::COLOR;
        }
        if clear_depth.is_some() {
            mask |= FramebufferMask::DEPTH;
        }
        if !mask.is_empty() {
            self.driver.clear(
                mask,
                clear_color.unwrap_or_default(),
                clear_depth.unwrap_or(1.0),
            );
        }

        self.pass_open.set(true);
        Ok(RenderPass::new(self, label, target))
    }

    /// Makes `program` current unless it already is.
    pub(crate) fn apply_program(&self, program: ProgramHandle) {
        if self.current_program.get() != Some(program) {
            self.driver.use_program(Some(program));
            self.current_program.set(Some(program));
        }
    }

    /// Releases the target of the open pass.
    pub(crate) fn end_render_pass(&self) {
        self.driver.set_scissor(None);
        self.driver.bind_framebuffer(FramebufferTarget::Draw, None);
        if self.capabilities.debug_labels() {
            self.driver.pop_debug_group();
        }
        self.pass_open.set(false);
    }

    pub(crate) fn ensure_no_render_pass(&self) -> Result<(), UsageError> {
        if self.pass_open.get() {
            return Err(UsageError::RenderPassOpen.logged());
        }
        Ok(())
    }
}
