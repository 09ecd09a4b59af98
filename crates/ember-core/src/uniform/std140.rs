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

//! std140 block layout: a size calculator and a matching writer.
//!
//! [`Std140Layout`] and [`Std140Writer`] expose the same `put_*` sequence, so a
//! block's shape can be measured once and then written many times.

use glam::{IVec3, Mat4, Vec2, Vec3, Vec4};

fn align_to(offset: usize, alignment: usize) -> usize {
    offset.div_ceil(alignment) * alignment
}

/// Computes the size of a std140 block from its member sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Std140Layout {
    size: usize,
}

impl Std140Layout {
    /// An empty layout.
    pub const fn new() -> Self {
        Self { size: 0 }
    }

    /// The block size in bytes.
    pub const fn size(&self) -> usize {
        self.size
    }

    fn put(&mut self, alignment: usize, size: usize) -> &mut Self {
        self.size = align_to(self.size, alignment) + size;
        self
    }

    /// Pads to `alignment`.
    pub fn align(&mut self, alignment: usize) -> &mut Self {
        self.size = align_to(self.size, alignment);
        self
    }

    /// A `float`.
    pub fn put_float(&mut self) -> &mut Self {
        self.put(4, 4)
    }

    /// An `int`.
    pub fn put_int(&mut self) -> &mut Self {
        self.put(4, 4)
    }

    /// A `vec2`.
    pub fn put_vec2(&mut self) -> &mut Self {
        self.put(8, 8)
    }

    /// A `vec3`.
    pub fn put_vec3(&mut self) -> &mut Self {
        self.put(16, 12)
    }

    /// An `ivec3`.
    pub fn put_ivec3(&mut self) -> &mut Self {
        self.put(16, 12)
    }

    /// A `vec4`.
    pub fn put_vec4(&mut self) -> &mut Self {
        self.put(16, 16)
    }

    /// A `mat4`.
    pub fn put_mat4(&mut self) -> &mut Self {
        self.put(16, 64)
    }
}

/// Serializes a std140 block into bytes.
#[derive(Debug, Clone, Default)]
pub struct Std140Writer {
    bytes: Vec<u8>,
}

impl Std140Writer {
    /// An empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// A writer that reuses `bytes`' allocation. Existing contents are discarded.
    pub fn with_buffer(mut bytes: Vec<u8>) -> Self {
        bytes.clear();
        Self { bytes }
    }

    fn put(&mut self, alignment: usize, data: &[u8]) -> &mut Self {
        self.align(alignment);
        self.bytes.extend_from_slice(data);
        self
    }

    /// Pads with zeros to `alignment`.
    pub fn align(&mut self, alignment: usize) -> &mut Self {
        let aligned = align_to(self.bytes.len(), alignment);
        self.bytes.resize(aligned, 0);
        self
    }

    /// A `float`.
    pub fn put_float(&mut self, value: f32) -> &mut Self {
        self.put(4, bytemuck::bytes_of(&value))
    }

    /// An `int`.
    pub fn put_int(&mut self, value: i32) -> &mut Self {
        self.put(4, bytemuck::bytes_of(&value))
    }

    /// A `vec2`.
    pub fn put_vec2(&mut self, value: Vec2) -> &mut Self {
        self.put(8, bytemuck::bytes_of(&value))
    }

    /// A `vec3`.
    pub fn put_vec3(&mut self, value: Vec3) -> &mut Self {
        self.put(16, bytemuck::bytes_of(&value))
    }

    /// An `ivec3`.
    pub fn put_ivec3(&mut self, value: IVec3) -> &mut Self {
        self.put(16, bytemuck::bytes_of(&value))
    }

    /// A `vec4`.
    pub fn put_vec4(&mut self, value: Vec4) -> &mut Self {
        self.put(16, bytemuck::bytes_of(&value))
    }

    /// A column-major `mat4`.
    pub fn put_mat4(&mut self, value: Mat4) -> &mut Self {
        self.put(16, bytemuck::bytes_of(&value.to_cols_array()))
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the writer and returns its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Values that serialize themselves as a std140 block.
pub trait UniformBlock {
    /// Writes the block's members in declaration order.
    fn write_std140(&self, writer: &mut Std140Writer);
}

/// A single uniform member value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// An `int`.
    Int(i32),
    /// A `float`.
    Float(f32),
    /// A `vec2`.
    Vec2(Vec2),
    /// A `vec3`.
    Vec3(Vec3),
    /// An `ivec3`.
    IVec3(IVec3),
    /// A `vec4`.
    Vec4(Vec4),
    /// A `mat4`.
    Mat4(Mat4),
}

impl UniformValue {
    /// Adds this value's member to `layout`.
    pub fn add_to_layout(&self, layout: &mut Std140Layout) {
        match self {
            UniformValue::Int(_) => layout.put_int(),
            UniformValue::Float(_) => layout.put_float(),
            UniformValue::Vec2(_) => layout.put_vec2(),
            UniformValue::Vec3(_) => layout.put_vec3(),
            UniformValue::IVec3(_) => layout.put_ivec3(),
            UniformValue::Vec4(_) => layout.put_vec4(),
            UniformValue::Mat4(_) => layout.put_mat4(),
        };
    }

    /// Writes this value's member.
    pub fn write(&self, writer: &mut Std140Writer) {
        match *self {
            UniformValue::Int(v) => writer.put_int(v),
            UniformValue::Float(v) => writer.put_float(v),
            UniformValue::Vec2(v) => writer.put_vec2(v),
            UniformValue::Vec3(v) => writer.put_vec3(v),
            UniformValue::IVec3(v) => writer.put_ivec3(v),
            UniformValue::Vec4(v) => writer.put_vec4(v),
            UniformValue::Mat4(v) => writer.put_mat4(v),
        };
    }

    /// The layout of a block made of `values` in order.
    pub fn layout_of(values: &[UniformValue]) -> Std140Layout {
        let mut layout = Std140Layout::new();
        for value in values {
            value.add_to_layout(&mut layout);
        }
        layout
    }
}

impl UniformBlock for [UniformValue] {
    fn write_std140(&self, writer: &mut Std140Writer) {
        for value in self {
            value.write(writer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn vec3_is_aligned_like_vec4() {
        let mut layout = Std140Layout::new();
        layout.put_float().put_vec3();
        assert_eq!(layout.size(), 28, "vec3 starts at 16 and takes 12 bytes");

        let mut layout = Std140Layout::new();
        layout.put_vec2().put_float().put_mat4();
        assert_eq!(layout.size(), 16 + 64);
    }

    #[test]
    fn writer_matches_layout() {
        let values = [
            UniformValue::Float(0.5),
            UniformValue::Vec3(Vec3::new(1.0, 2.0, 3.0)),
            UniformValue::Vec2(Vec2::new(4.0, 5.0)),
            UniformValue::Mat4(Mat4::IDENTITY),
        ];
        let layout = UniformValue::layout_of(&values);

        let mut writer = Std140Writer::new();
        values.as_slice().write_std140(&mut writer);

        assert_eq!(writer.len(), layout.size());
        let floats: Vec<f32> = writer
            .as_bytes()
            .chunks_exact(4)
            .map(bytemuck::pod_read_unaligned)
            .collect();
        assert_relative_eq!(floats[0], 0.5);
        assert_relative_eq!(floats[4], 1.0, epsilon = f32::EPSILON);
        assert_relative_eq!(floats[6], 3.0);
        assert_relative_eq!(floats[8], 4.0);
        assert_relative_eq!(floats[12], 1.0, epsilon = f32::EPSILON);
    }
}
