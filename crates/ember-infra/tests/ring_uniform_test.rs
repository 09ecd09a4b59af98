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

use ember_core::capability::BUFFER_STORAGE;
use ember_core::driver::{BufferHandle, BufferTarget};
use ember_core::uniform::{DynamicTransforms, Std140Layout, UniformValue};
use ember_core::{
    BufferBackendKind, BufferSlice, DynamicUniforms, GlDriver, GpuDevice, RenderError,
    RenderSettings, RingUniformAllocator, UsageError,
};
use ember_infra::{create_device, HeadlessConfig, HeadlessDriver};
use glam::{Mat4, Vec3, Vec4};
use std::rc::Rc;

fn device_with(config: HeadlessConfig, ring_depth: usize) -> (Rc<HeadlessDriver>, GpuDevice) {
    let driver = Rc::new(HeadlessDriver::new(config));
    let settings = RenderSettings {
        ring_depth,
        ..RenderSettings::default()
    };
    let device = create_device(driver.clone(), settings);
    (driver, device)
}

fn vec4_layout() -> Std140Layout {
    let mut layout = Std140Layout::new();
    layout.put_vec4();
    layout
}

fn vec4_block(value: f32) -> [UniformValue; 1] {
    [UniformValue::Vec4(Vec4::splat(value))]
}

#[test]
fn test_ring_cursor_wraps_after_depth_rotations() {
    // --- 1. ARRANGE ---
    let (_driver, device) = device_with(HeadlessConfig::default(), 2);
    let mut ring = RingUniformAllocator::new(&device, "Fog", vec4_layout(), 2, 4)
        .expect("Ring creation should succeed");

    // --- 2. ACT ---
    let mut handles = Vec::new();
    let mut cursors = Vec::new();
    for frame in 0..3 {
        let slice = ring
            .write(&device, vec4_block(frame as f32).as_slice())
            .expect("Write should succeed");
        handles.push(slice.handle());
        cursors.push(ring.current_slot());
        ring.rotate().expect("Rotate should succeed");
    }

    // --- 3. ASSERT ---
    assert_eq!(cursors, vec![0, 1, 0], "The cursor should advance modulo 2");
    assert_ne!(handles[0], handles[1], "Consecutive frames use different buffers");
    assert_eq!(
        handles[0], handles[2],
        "Frame N+2 should reuse frame N's buffer"
    );

    ring.close().expect("Close should succeed");
}

#[test]
fn test_ring_writes_append_at_aligned_offsets() {
    // --- 1. ARRANGE ---
    let (driver, device) = device_with(HeadlessConfig::legacy(), 2);
    let mut ring = RingUniformAllocator::new(&device, "Lights", vec4_layout(), 2, 4)
        .expect("Ring creation should succeed");
    assert_eq!(ring.block_size(), 16);
    assert_eq!(ring.block_stride(), 256);

    // --- 2. ACT ---
    let blocks = [vec4_block(1.0), vec4_block(2.0), vec4_block(3.0)];
    let slices: Vec<BufferSlice> = blocks
        .iter()
        .map(|block| ring.write(&device, block.as_slice()))
        .collect::<Result<_, _>>()
        .expect("Writes should succeed");

    // --- 3. ASSERT ---
    let offsets: Vec<u64> = slices.iter().map(BufferSlice::offset).collect();
    assert_eq!(offsets, vec![0, 256, 512]);
    assert!(slices.iter().all(|slice| slice.length() == 16));

    let floats: Vec<f32> = driver
        .read_buffer(slices[1].handle())
        .expect("The buffer should exist");
    assert_eq!(&floats[64..68], &[2.0; 4], "The second block starts at 256 bytes");

    ring.close().expect("Close should succeed");
}

#[test]
fn test_ring_grows_and_clear_resets_positions() {
    // --- 1. ARRANGE ---
    let (driver, device) = device_with(HeadlessConfig::default(), 2);
    let mut ring = RingUniformAllocator::new(&device, "Particles", vec4_layout(), 2, 1)
        .expect("Ring creation should succeed");
    let buffers_before = driver.live_buffers();

    // --- 2. ACT ---
    let first = ring
        .write(&device, vec4_block(1.0).as_slice())
        .expect("Write should succeed");
    let second = ring
        .write(&device, vec4_block(2.0).as_slice())
        .expect("Write past capacity should grow the slot");

    // --- 3. ASSERT ---
    assert_ne!(first.handle(), second.handle());
    assert!(!first.is_closed(), "The outgrown buffer stays alive this frame");
    assert_eq!(driver.live_buffers(), buffers_before + 1);

    ring.rotate().expect("Rotate should succeed");
    ring.rotate().expect("Rotate should succeed");
    assert!(
        first.is_closed(),
        "Coming back to the slot should release its outgrown buffer"
    );

    ring.clear().expect("Clear should succeed");
    let after_clear = ring
        .write(&device, vec4_block(3.0).as_slice())
        .expect("Write should succeed");
    assert_eq!(after_clear.offset(), 0);

    ring.close().expect("Close should succeed");
    assert!(matches!(
        ring.close(),
        Err(RenderError::Usage(UsageError::AlreadyClosed { .. }))
    ));
    assert!(matches!(
        ring.write(&device, vec4_block(4.0).as_slice()),
        Err(RenderError::Usage(UsageError::ResourceClosed { .. }))
    ));
    assert_eq!(driver.live_buffers(), 0);
}

#[test]
fn test_oversized_block_is_rejected() {
    let (_driver, device) = device_with(HeadlessConfig::default(), 2);
    let mut ring = RingUniformAllocator::new(&device, "Tiny", vec4_layout(), 2, 1)
        .expect("Ring creation should succeed");

    let too_big = [
        UniformValue::Vec4(Vec4::ONE),
        UniformValue::Float(1.0),
    ];
    let result = ring.write(&device, too_big.as_slice());

    assert!(matches!(
        result,
        Err(RenderError::Usage(UsageError::UniformBlockOverflow {
            written: 20,
            capacity: 16,
            ..
        }))
    ));
    ring.close().expect("Close should succeed");
}

#[test]
fn test_zero_ring_depth_is_rejected() {
    let (_driver, device) = device_with(HeadlessConfig::default(), 2);
    let result = RingUniformAllocator::new(&device, "Empty", vec4_layout(), 0, 1);
    assert!(matches!(
        result,
        Err(RenderError::Usage(UsageError::InvalidRingDepth { .. }))
    ));
}

#[test]
fn test_dynamic_uniforms_write_transform_blocks() {
    // --- 1. ARRANGE ---
    let (driver, device) = device_with(HeadlessConfig::default(), 2);
    let mut uniforms = DynamicUniforms::new(&device).expect("Creation should succeed");
    let model_view = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));

    // --- 2. ACT ---
    let slice = uniforms
        .write(
            &device,
            model_view,
            Vec4::new(0.5, 0.5, 0.5, 1.0),
            Vec3::new(4.0, 5.0, 6.0),
            Mat4::IDENTITY,
        )
        .expect("Write should succeed");
    let batch = uniforms
        .write_all(&device, &[DynamicTransforms::default(); 3])
        .expect("Batch write should succeed");

    // --- 3. ASSERT ---
    assert_eq!(slice.length(), DynamicTransforms::layout().size() as u64);
    assert_eq!(batch.len(), 3);
    assert_eq!(uniforms.allocator().ring_depth(), 2);

    let floats: Vec<f32> = driver
        .read_buffer(slice.handle())
        .expect("The buffer should exist");
    let base = (slice.offset() / 4) as usize;
    assert_eq!(&floats[base + 12..base + 15], &[1.0, 2.0, 3.0], "Translation column");
    assert_eq!(&floats[base + 20..base + 23], &[4.0, 5.0, 6.0], "Model offset");

    uniforms.rotate().expect("Rotate should succeed");
    uniforms.close().expect("Close should succeed");
}

#[test]
fn test_persistent_ring_through_bound_backend_keeps_bindings() {
    // --- 1. ARRANGE ---
    let config = HeadlessConfig {
        extensions: vec![BUFFER_STORAGE.to_owned()],
        ..HeadlessConfig::default()
    };
    let (driver, device) = device_with(config, 2);
    assert_eq!(device.buffers().backend_kind(), BufferBackendKind::BindThenOperate);
    assert!(device.buffers().uses_persistent_storage());

    let targets = [
        BufferTarget::Array,
        BufferTarget::ElementArray,
        BufferTarget::Uniform,
        BufferTarget::CopyRead,
        BufferTarget::CopyWrite,
    ];
    for target in targets {
        let foreign = driver.gen_buffer();
        driver.bind_buffer(target, Some(foreign));
    }
    let bindings = || -> Vec<Option<BufferHandle>> {
        targets.iter().map(|target| driver.bound_buffer(*target)).collect()
    };
    let before = bindings();

    // --- 2. ACT ---
    let mut ring = RingUniformAllocator::new(&device, "Decals", vec4_layout(), 2, 1)
        .expect("Ring creation should succeed");
    ring.write(&device, vec4_block(1.0).as_slice())
        .expect("Write should succeed");
    let grown = ring
        .write(&device, vec4_block(2.0).as_slice())
        .expect("Write past capacity should grow the slot");
    let floats: Vec<f32> = driver
        .read_buffer(grown.handle())
        .expect("The grown buffer should exist");
    let after_writes = bindings();

    ring.rotate().expect("Rotate should succeed");
    ring.rotate().expect("Rotate should succeed");
    let after_rotation = bindings();
    ring.close().expect("Close should succeed");

    // --- 3. ASSERT ---
    assert_eq!(&floats[0..4], &[2.0; 4], "The grown buffer starts with the new block");
    assert_eq!(after_writes, before, "Writes should restore the caller's bindings");
    assert_eq!(after_rotation, before, "Retiring buffers should restore bindings");
    assert_eq!(bindings(), before, "Close should restore bindings");
    assert_eq!(
        driver.live_buffers(),
        targets.len(),
        "Only the caller's own buffers should remain"
    );
}
