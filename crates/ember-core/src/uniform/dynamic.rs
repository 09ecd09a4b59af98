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

//! Per-draw transform uniforms.

use super::ring::RingUniformAllocator;
use super::std140::{Std140Layout, Std140Writer, UniformBlock};
use crate::buffer::BufferSlice;
use crate::device::GpuDevice;
use crate::error::{RenderError, UsageError};
use glam::{Mat4, Vec3, Vec4};

/// The uniform name pipelines declare for [`DynamicTransforms`].
pub const DYNAMIC_TRANSFORMS: &str = "DynamicTransforms";

/// Number of blocks each backing buffer starts with.
const INITIAL_BLOCKS: u64 = 2;

/// The transform block most draws bind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicTransforms {
    /// Model-view matrix.
    pub model_view: Mat4,
    /// Color multiplied into the output.
    pub color_modulator: Vec4,
    /// Offset added to model positions.
    pub model_offset: Vec3,
    /// Texture coordinate transform.
    pub texture_matrix: Mat4,
}

impl DynamicTransforms {
    /// The std140 layout of the block.
    pub fn layout() -> Std140Layout {
        let mut layout = Std140Layout::new();
        layout.put_mat4().put_vec4().put_vec3().put_mat4();
        layout
    }
}

impl Default for DynamicTransforms {
    fn default() -> Self {
        Self {
            model_view: Mat4::IDENTITY,
            color_modulator: Vec4::ONE,
            model_offset: Vec3::ZERO,
            texture_matrix: Mat4::IDENTITY,
        }
    }
}

impl UniformBlock for DynamicTransforms {
    fn write_std140(&self, writer: &mut Std140Writer) {
        writer
            .put_mat4(self.model_view)
            .put_vec4(self.color_modulator)
            .put_vec3(self.model_offset)
            .put_mat4(self.texture_matrix);
    }
}

/// Ring-buffered storage for [`DynamicTransforms`] blocks.
#[derive(Debug)]
pub struct DynamicUniforms {
    ring: RingUniformAllocator,
}

impl DynamicUniforms {
    /// Creates the storage with the device's configured ring depth.
    pub fn new(device: &GpuDevice) -> Result<Self, RenderError> {
        let ring = RingUniformAllocator::new(
            device,
            "Dynamic Transforms UBO",
            DynamicTransforms::layout(),
            device.settings().ring_depth,
            INITIAL_BLOCKS,
        )?;
        Ok(Self { ring })
    }

    /// Writes one transform block.
    pub fn write(
        &mut self,
        device: &GpuDevice,
        model_view: Mat4,
        color_modulator: Vec4,
        model_offset: Vec3,
        texture_matrix: Mat4,
    ) -> Result<BufferSlice, RenderError> {
        self.ring.write(
            device,
            &DynamicTransforms {
                model_view,
                color_modulator,
                model_offset,
                texture_matrix,
            },
        )
    }

    /// Writes a batch of transform blocks.
    pub fn write_all(
        &mut self,
        device: &GpuDevice,
        transforms: &[DynamicTransforms],
    ) -> Result<Vec<BufferSlice>, RenderError> {
        self.ring.write_all(device, transforms)
    }

    /// Moves to the next backing buffer at a frame boundary.
    pub fn rotate(&mut self) -> Result<(), RenderError> {
        self.ring.rotate()
    }

    /// Resets every backing buffer's write position.
    pub fn clear(&mut self) -> Result<(), UsageError> {
        self.ring.clear()
    }

    /// Releases the backing buffers.
    pub fn close(&mut self) -> Result<(), RenderError> {
        self.ring.close()
    }

    /// The underlying allocator.
    pub fn allocator(&self) -> &RingUniformAllocator {
        &self.ring
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_block_layout() {
        // mat4 (64) + vec4 (16) + vec3 (12, padded to 16) + mat4 (64)
        assert_eq!(DynamicTransforms::layout().size(), 64 + 16 + 16 + 64);

        let mut writer = Std140Writer::new();
        DynamicTransforms::default().write_std140(&mut writer);
        assert_eq!(writer.len(), DynamicTransforms::layout().size());
    }
}
