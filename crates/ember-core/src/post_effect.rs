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

//! Full-screen shader effects.
//!
//! A [`PostEffectPass`] draws one full-screen triangle into an output framebuffer
//! with a fixed pipeline, a set of static uniform blocks and a set of samplers
//! reading other framebuffers or textures. The sizes of the output and of every
//! sampled texture are published in a `SamplerInfo` block that is ring-buffered
//! across frames.

use crate::buffer::{BufferResource, BufferSlice, BufferUsage};
use crate::device::GpuDevice;
use crate::error::{RenderError, UsageError};
use crate::framebuffer::Framebuffer;
use crate::pipeline::CompiledPipeline;
use crate::texture::{AddressMode, FilterMode, TextureView};
use crate::uniform::{RingUniformAllocator, Std140Layout, Std140Writer, UniformBlock, UniformValue};
use glam::Vec2;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

/// Uniform name of the projection block every post effect binds.
pub const PROJECTION: &str = "Projection";
/// Uniform name of the output/sampler size block.
pub const SAMPLER_INFO: &str = "SamplerInfo";

/// The framebuffers a post effect can read from and draw into, by name.
pub type PostEffectTargets = HashMap<String, Framebuffer>;

/// A texture a post effect samples. Bound as `<name>Sampler`.
#[derive(Debug, Clone)]
pub enum PostEffectSampler {
    /// The color or depth attachment of a named target.
    Target {
        /// Sampler name, without the `Sampler` suffix.
        name: String,
        /// Name of the target framebuffer.
        target: String,
        /// Sample the depth attachment instead of color.
        depth: bool,
        /// Use bilinear filtering.
        bilinear: bool,
    },
    /// A texture owned elsewhere.
    Texture {
        /// Sampler name, without the `Sampler` suffix.
        name: String,
        /// The texture.
        view: TextureView,
        /// Size published in `SamplerInfo`.
        width: u32,
        /// Size published in `SamplerInfo`.
        height: u32,
        /// Use bilinear filtering.
        bilinear: bool,
    },
}

impl PostEffectSampler {
    /// The sampler name, without the `Sampler` suffix.
    pub fn name(&self) -> &str {
        match self {
            PostEffectSampler::Target { name, .. } | PostEffectSampler::Texture { name, .. } => name,
        }
    }

    fn bilinear(&self) -> bool {
        match self {
            PostEffectSampler::Target { bilinear, .. }
            | PostEffectSampler::Texture { bilinear, .. } => *bilinear,
        }
    }

    fn resolve(&self, targets: &PostEffectTargets) -> Result<(TextureView, Vec2), UsageError> {
        match self {
            PostEffectSampler::Texture {
                view,
                width,
                height,
                ..
            } => Ok((view.clone(), Vec2::new(*width as f32, *height as f32))),
            PostEffectSampler::Target { target, depth, .. } => {
                let framebuffer = targets.get(target).ok_or_else(|| {
                    UsageError::UnknownTarget {
                        name: target.clone(),
                    }
                    .logged()
                })?;
                let view = if *depth {
                    framebuffer.depth_view().ok_or_else(|| {
                        UsageError::MissingDepthAttachment {
                            framebuffer: target.clone(),
                        }
                        .logged()
                    })?
                } else {
                    framebuffer.color_view().ok_or_else(|| {
                        UsageError::FramebufferNotInitialized {
                            framebuffer: target.clone(),
                        }
                        .logged()
                    })?
                };
                let size = Vec2::new(framebuffer.width() as f32, framebuffer.height() as f32);
                Ok((view.clone(), size))
            }
        }
    }
}

/// The `SamplerInfo` block: output size followed by each sampler's size.
struct SamplerInfo<'a> {
    output: Vec2,
    samplers: &'a [Vec2],
}

impl SamplerInfo<'_> {
    fn layout(sampler_count: usize) -> Std140Layout {
        let mut layout = Std140Layout::new();
        for _ in 0..=sampler_count {
            layout.put_vec2();
        }
        layout
    }
}

impl UniformBlock for SamplerInfo<'_> {
    fn write_std140(&self, writer: &mut Std140Writer) {
        writer.put_vec2(self.output);
        for size in self.samplers {
            writer.put_vec2(*size);
        }
    }
}

/// One full-screen shader effect.
#[derive(Debug)]
pub struct PostEffectPass {
    label: String,
    pipeline: Rc<CompiledPipeline>,
    output_target: String,
    uniform_buffers: BTreeMap<String, BufferResource>,
    sampler_info: RingUniformAllocator,
    samplers: Vec<PostEffectSampler>,
    closed: bool,
}

impl PostEffectPass {
    /// Creates the pass, uploading each named uniform block once.
    pub fn new(
        device: &GpuDevice,
        label: &str,
        pipeline: Rc<CompiledPipeline>,
        output_target: impl Into<String>,
        uniforms: BTreeMap<String, Vec<UniformValue>>,
        samplers: Vec<PostEffectSampler>,
    ) -> Result<Self, RenderError> {
        let mut uniform_buffers = BTreeMap::new();
        for (name, values) in &uniforms {
            let mut writer = Std140Writer::new();
            values.as_slice().write_std140(&mut writer);
            let created = device.buffers().create_init(
                &format!("{label} / {name}"),
                BufferUsage::UNIFORM,
                writer.as_bytes(),
            );
            match created {
                Ok(buffer) => {
                    uniform_buffers.insert(name.clone(), buffer);
                }
                Err(err) => {
                    close_all(&mut uniform_buffers)?;
                    return Err(err);
                }
            }
        }

        let sampler_info = match RingUniformAllocator::new(
            device,
            &format!("{label} / {SAMPLER_INFO}"),
            SamplerInfo::layout(samplers.len()),
            device.settings().ring_depth,
            1,
        ) {
            Ok(ring) => ring,
            Err(err) => {
                close_all(&mut uniform_buffers)?;
                return Err(err);
            }
        };

        Ok(Self {
            label: label.to_owned(),
            pipeline,
            output_target: output_target.into(),
            uniform_buffers,
            sampler_info,
            samplers,
            closed: false,
        })
    }

    /// The pass label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Name of the framebuffer the pass draws into.
    pub fn output_target(&self) -> &str {
        &self.output_target
    }

    /// The samplers the pass binds.
    pub fn samplers(&self) -> &[PostEffectSampler] {
        &self.samplers
    }

    /// Draws the effect into the output target.
    ///
    /// `projection` is bound as the [`PROJECTION`] uniform.
    pub fn render(
        &mut self,
        device: &GpuDevice,
        targets: &PostEffectTargets,
        projection: &BufferSlice,
    ) -> Result<(), RenderError> {
        if self.closed {
            return Err(UsageError::ResourceClosed {
                label: self.label.clone(),
            }
            .logged()
            .into());
        }

        let output = targets.get(&self.output_target).ok_or_else(|| {
            UsageError::UnknownTarget {
                name: self.output_target.clone(),
            }
            .logged()
        })?;

        let mut views = Vec::with_capacity(self.samplers.len());
        let mut sizes = Vec::with_capacity(self.samplers.len());
        for sampler in &self.samplers {
            let (view, size) = sampler.resolve(targets)?;
            views.push(view);
            sizes.push(size);
        }

        let info = self.sampler_info.write(
            device,
            &SamplerInfo {
                output: Vec2::new(output.width() as f32, output.height() as f32),
                samplers: &sizes,
            },
        )?;

        let mut pass = device.begin_render_pass(&self.label, output, None, None)?;
        pass.set_pipeline(&self.pipeline)?;
        pass.set_uniform(PROJECTION, projection)?;
        pass.set_uniform(SAMPLER_INFO, &info)?;
        for (name, buffer) in &self.uniform_buffers {
            pass.set_uniform(name, &buffer.slice_all()?)?;
        }
        for (sampler, view) in self.samplers.iter().zip(&views) {
            let filter = if sampler.bilinear() {
                FilterMode::Linear
            } else {
                FilterMode::Nearest
            };
            let handle = device.sampler(filter, AddressMode::ClampToEdge);
            pass.bind_sampler(&format!("{}Sampler", sampler.name()), Some((view, handle)))?;
        }
        pass.draw(0, 3)?;
        pass.close()?;
        drop(pass);

        self.sampler_info.rotate()
    }

    /// Releases the uniform buffers and the `SamplerInfo` ring.
    pub fn close(&mut self) -> Result<(), RenderError> {
        if self.closed {
            return Err(UsageError::AlreadyClosed {
                label: self.label.clone(),
            }
            .logged()
            .into());
        }
        self.closed = true;
        close_all(&mut self.uniform_buffers)?;
        self.sampler_info.close()
    }
}

fn close_all(buffers: &mut BTreeMap<String, BufferResource>) -> Result<(), UsageError> {
    for buffer in buffers.values_mut() {
        buffer.close()?;
    }
    buffers.clear();
    Ok(())
}
