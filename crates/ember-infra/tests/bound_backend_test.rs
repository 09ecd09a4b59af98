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

use ember_core::driver::{
    BufferSource, BufferTarget, FramebufferMask, FramebufferTarget, MapAccess, Rect,
};
use ember_core::texture::FilterMode;
use ember_core::{BufferUsage, GlDriver, RawBufferBackend};
use ember_infra::graphics::gl::{target_for_usage, BoundBufferBackend};
use ember_infra::{DriverCall, HeadlessDriver};
use std::rc::Rc;

const ALL_BUFFER_TARGETS: [BufferTarget; 5] = [
    BufferTarget::Array,
    BufferTarget::ElementArray,
    BufferTarget::Uniform,
    BufferTarget::CopyRead,
    BufferTarget::CopyWrite,
];

fn buffer_bindings(driver: &HeadlessDriver) -> Vec<Option<ember_core::driver::BufferHandle>> {
    ALL_BUFFER_TARGETS
        .iter()
        .map(|target| driver.bound_buffer(*target))
        .collect()
}

#[test]
fn test_bound_backend_restores_previous_buffer_bindings() {
    // --- 1. ARRANGE ---
    let driver = Rc::new(HeadlessDriver::legacy());
    let backend = BoundBufferBackend::new(driver.clone());

    // Bind unrelated buffers to every target, as a caller would have left them.
    for target in ALL_BUFFER_TARGETS {
        let foreign = driver.gen_buffer();
        driver.bind_buffer(target, Some(foreign));
    }
    let before = buffer_bindings(&driver);

    // --- 2. ACT ---
    let usages = [
        BufferUsage::VERTEX | BufferUsage::COPY_DST,
        BufferUsage::INDEX | BufferUsage::COPY_DST,
        BufferUsage::UNIFORM | BufferUsage::MAP_WRITE | BufferUsage::COPY_DST,
        BufferUsage::MAP_READ | BufferUsage::COPY_SRC | BufferUsage::COPY_DST,
    ];
    let mut handles = Vec::new();
    for usage in usages {
        let buffer = backend.create_buffer();
        backend
            .upload_full(buffer, BufferSource::Size(16), usage)
            .expect("Allocation should succeed");
        backend.upload_sub(buffer, 0, &[7; 4], usage);
        let access = if usage.contains(BufferUsage::MAP_READ) {
            MapAccess::READ
        } else {
            MapAccess::WRITE | MapAccess::FLUSH_EXPLICIT
        };
        assert!(backend.map_range(buffer, 0, 16, access, usage).is_some());
        if access.contains(MapAccess::FLUSH_EXPLICIT) {
            backend.flush_mapped_range(buffer, 0, 16, usage);
        }
        backend.unmap(buffer, usage);
        handles.push(buffer);
    }
    backend.copy_range(handles[3], handles[0], 0, 8, 4);

    // --- 3. ASSERT ---
    assert_eq!(
        buffer_bindings(&driver),
        before,
        "Every target should hold the caller's buffer again"
    );
    assert_eq!(
        driver.buffer_contents(handles[0]).map(|bytes| bytes[8..12].to_vec()),
        Some(vec![7; 4]),
        "The copy should have reached the destination buffer"
    );
}

#[test]
fn test_bound_backend_uses_the_usage_target() {
    // --- 1. ARRANGE ---
    let driver = Rc::new(HeadlessDriver::legacy());
    let backend = BoundBufferBackend::new(driver.clone());
    let usage = BufferUsage::INDEX | BufferUsage::COPY_DST;
    let buffer = backend.create_buffer();
    driver.clear_calls();

    // --- 2. ACT ---
    backend
        .upload_full(buffer, BufferSource::Data(&[0; 12]), usage)
        .expect("Allocation should succeed");

    // --- 3. ASSERT ---
    let calls = driver.calls();
    let target = target_for_usage(usage);
    assert_eq!(target, BufferTarget::ElementArray);
    assert_eq!(
        calls.first(),
        Some(&DriverCall::BindBuffer {
            target,
            buffer: Some(buffer),
        })
    );
    assert_eq!(
        calls.last(),
        Some(&DriverCall::BindBuffer {
            target,
            buffer: None,
        }),
        "An empty target should be left empty"
    );
}

#[test]
fn test_bound_backend_restores_framebuffer_bindings() {
    // --- 1. ARRANGE ---
    let driver = Rc::new(HeadlessDriver::legacy());
    let backend = BoundBufferBackend::new(driver.clone());
    let caller_draw = driver.gen_framebuffer();
    let caller_read = driver.gen_framebuffer();
    driver.bind_framebuffer(FramebufferTarget::Draw, Some(caller_draw));
    driver.bind_framebuffer(FramebufferTarget::Read, Some(caller_read));

    let src = backend.create_framebuffer();
    let dst = backend.create_framebuffer();

    // --- 2. ACT ---
    backend.attach_to_framebuffer(src, None, None, 0, None);
    backend.attach_to_framebuffer(dst, None, None, 0, None);
    backend.blit_framebuffer(
        src,
        dst,
        Rect::sized(4, 4),
        Rect::sized(4, 4),
        FramebufferMask::DEPTH,
        FilterMode::Nearest,
    );

    // --- 3. ASSERT ---
    assert_eq!(driver.bound_framebuffer(FramebufferTarget::Draw), Some(caller_draw));
    assert_eq!(driver.bound_framebuffer(FramebufferTarget::Read), Some(caller_read));
    assert!(driver.calls().contains(&DriverCall::BlitFramebuffer {
        read: src,
        draw: dst,
        src: Rect::sized(4, 4),
        dst: Rect::sized(4, 4),
        mask: FramebufferMask::DEPTH,
        filter: FilterMode::Nearest,
    }));

    // An explicit bind target leaves the framebuffer bound.
    backend.attach_to_framebuffer(dst, None, None, 0, Some(FramebufferTarget::Draw));
    assert_eq!(driver.bound_framebuffer(FramebufferTarget::Draw), Some(dst));
}
