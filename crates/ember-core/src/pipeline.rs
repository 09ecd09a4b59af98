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

//! Pipeline descriptions and their linked form.

use crate::buffer::BufferUsage;
use crate::driver::ProgramHandle;

/// How vertices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Every three vertices form a triangle.
    #[default]
    Triangles,
    /// Each vertex after the first two forms a triangle with the previous two.
    TriangleStrip,
    /// Every two vertices form a line.
    Lines,
}

/// Width of the indices in an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexType {
    /// 16-bit indices.
    U16,
    /// 32-bit indices.
    #[default]
    U32,
}

impl IndexType {
    /// Size of one index in bytes.
    pub fn size(self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// The layout of one vertex in slot 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VertexFormat {
    /// Bytes between consecutive vertices. Zero means the pipeline reads no vertices.
    pub stride: u32,
}

impl VertexFormat {
    /// A format with no vertex attributes; vertices come from the vertex index.
    pub const EMPTY: Self = Self { stride: 0 };

    /// A format with `stride` bytes per vertex.
    pub const fn new(stride: u32) -> Self {
        Self { stride }
    }

    /// Returns `true` if the pipeline reads no vertex buffer.
    pub fn is_empty(&self) -> bool {
        self.stride == 0
    }
}

/// How a uniform is backed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    /// A uniform block.
    UniformBuffer,
    /// A uniform texel buffer.
    TexelBuffer,
}

impl UniformKind {
    /// The buffer usage a slice bound to this uniform must have.
    pub fn required_usage(self) -> BufferUsage {
        match self {
            UniformKind::UniformBuffer => BufferUsage::UNIFORM,
            UniformKind::TexelBuffer => BufferUsage::UNIFORM_TEXEL_BUFFER,
        }
    }
}

/// A uniform declared by a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniformDescription {
    /// The uniform's name in the shader.
    pub name: String,
    /// How the uniform is backed.
    pub kind: UniformKind,
}

/// Describes a render pipeline: its label, declared uniforms and samplers, and
/// vertex input.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderPipeline {
    /// Debug label, also the cache key.
    pub label: String,
    /// Uniforms in binding-slot order.
    pub uniforms: Vec<UniformDescription>,
    /// Sampler names in texture-unit order.
    pub samplers: Vec<String>,
    /// The vertex input layout.
    pub vertex_format: VertexFormat,
    /// The primitive topology.
    pub topology: PrimitiveTopology,
}

impl RenderPipeline {
    /// A pipeline with no uniforms, samplers or vertex input.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Declares a uniform block.
    pub fn with_uniform(mut self, name: impl Into<String>, kind: UniformKind) -> Self {
        self.uniforms.push(UniformDescription {
            name: name.into(),
            kind,
        });
        self
    }

    /// Declares a sampler.
    pub fn with_sampler(mut self, name: impl Into<String>) -> Self {
        self.samplers.push(name.into());
        self
    }

    /// Sets the vertex input layout.
    pub fn with_vertex_format(mut self, vertex_format: VertexFormat) -> Self {
        self.vertex_format = vertex_format;
        self
    }

    /// Sets the primitive topology.
    pub fn with_topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }
}

/// A pipeline linked by the driver.
///
/// Uniform `i` of [`RenderPipeline::uniforms`] is bound to uniform block slot `i`;
/// sampler `i` of [`RenderPipeline::samplers`] to texture unit `i`.
#[derive(Debug)]
pub struct CompiledPipeline {
    pipeline: RenderPipeline,
    program: ProgramHandle,
}

impl CompiledPipeline {
    pub(crate) fn new(pipeline: RenderPipeline, program: ProgramHandle) -> Self {
        Self { pipeline, program }
    }

    /// The description the pipeline was linked from.
    pub fn info(&self) -> &RenderPipeline {
        &self.pipeline
    }

    /// The linked program.
    pub fn program(&self) -> ProgramHandle {
        self.program
    }
}
