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
use ember_core::driver::{BufferHandle, BufferTarget, MapAccess};
use ember_core::{
    BufferBackendKind, BufferUsage, GlDriver, GpuDevice, RenderError, RenderSettings, UsageError,
};
use ember_infra::{create_device, DriverCall, HeadlessConfig, HeadlessDriver};
use std::rc::Rc;

fn headless_device(config: HeadlessConfig) -> (Rc<HeadlessDriver>, GpuDevice) {
    let driver = Rc::new(HeadlessDriver::new(config));
    let device = create_device(driver.clone(), RenderSettings::default());
    (driver, device)
}

#[test]
fn test_persistent_uniform_buffer_end_to_end() {
    // --- 1. ARRANGE ---
    let (driver, device) = headless_device(HeadlessConfig::default());
    let usage = BufferUsage::UNIFORM | BufferUsage::MAP_WRITE;

    // --- 2. ACT ---
    let mut buffer = device
        .buffers()
        .create("Camera UBO", usage, 64)
        .expect("Creating a 64-byte uniform buffer should succeed");
    let handle = buffer.handle();

    // --- 3. ASSERT ---
    assert!(buffer.is_persistently_mapped());
    assert_eq!(
        buffer.persistent_range(),
        Some(0..64),
        "The persistent mapping should cover exactly the whole buffer"
    );

    let payload: Vec<u8> = (0..64).collect();
    device
        .buffers()
        .write(&mut buffer, 0, &payload)
        .expect("Writing through the persistent mapping should succeed");
    assert_eq!(driver.buffer_contents(handle), Some(payload));

    driver.clear_calls();
    buffer
        .close()
        .expect("Closing should succeed without an explicit unmap");
    assert_eq!(
        driver.calls(),
        vec![DriverCall::UnmapBuffer(handle), DriverCall::DeleteBuffer(handle)],
        "Close should release the mapping before the handle"
    );
    assert_eq!(driver.live_buffers(), 0);
}

#[test]
fn test_close_after_close_is_a_precondition_violation() {
    // --- 1. ARRANGE ---
    let (_driver, device) = headless_device(HeadlessConfig::default());
    let mut buffer = device
        .buffers()
        .create("Scratch", BufferUsage::COPY_DST | BufferUsage::VERTEX, 32)
        .expect("Buffer creation should succeed");

    // --- 2. ACT ---
    buffer.close().expect("The first close should succeed");
    let second_close = buffer.close();
    let write = device.buffers().write(&mut buffer, 0, &[1, 2, 3]);
    let slice = buffer.slice(0, 4);
    let whole = buffer.slice_all();

    // --- 3. ASSERT ---
    assert!(matches!(second_close, Err(UsageError::AlreadyClosed { .. })));
    assert!(matches!(
        write,
        Err(RenderError::Usage(UsageError::ResourceClosed { .. }))
    ));
    assert!(matches!(slice, Err(UsageError::ResourceClosed { .. })));
    assert!(
        matches!(whole, Err(UsageError::ResourceClosed { .. })),
        "A closed buffer should not hand out a whole-buffer slice"
    );
}

#[test]
fn test_on_demand_mapping_flushes_then_unmaps() {
    // --- 1. ARRANGE ---
    let (driver, device) = headless_device(HeadlessConfig::legacy());
    let mut buffer = device
        .buffers()
        .create("Staging", BufferUsage::MAP_WRITE | BufferUsage::COPY_SRC, 16)
        .expect("Buffer creation should succeed");
    let handle = buffer.handle();
    assert!(!buffer.is_persistently_mapped());
    driver.clear_calls();

    // --- 2. ACT ---
    {
        let mut view = device
            .buffers()
            .map_range(&mut buffer, 8, 8, MapAccess::WRITE)
            .expect("Mapping should succeed");
        view.as_mut_slice()
            .expect("A write mapping should be writable")
            .copy_from_slice(&[9; 8]);
        view.close();
    }

    // --- 3. ASSERT ---
    let calls: Vec<DriverCall> = driver
        .calls()
        .into_iter()
        .filter(|call| !matches!(call, DriverCall::BindBuffer { .. }))
        .collect();
    assert_eq!(
        calls,
        vec![
            DriverCall::MapBuffer {
                buffer: handle,
                offset: 8,
                length: 8,
                access: MapAccess::WRITE | MapAccess::FLUSH_EXPLICIT,
            },
            DriverCall::FlushMappedRange {
                buffer: handle,
                offset: 0,
                length: 8,
            },
            DriverCall::UnmapBuffer(handle),
        ]
    );
    assert!(!buffer.is_mapped());
    assert_eq!(
        driver.buffer_contents(handle),
        Some([[0; 8], [9; 8]].concat())
    );

    buffer.close().expect("Close should succeed");
}

#[test]
fn test_mapping_requires_matching_usage_and_one_view_at_a_time() {
    let (_driver, device) = headless_device(HeadlessConfig::legacy());
    let mut buffer = device
        .buffers()
        .create("Readback", BufferUsage::MAP_READ | BufferUsage::COPY_DST, 16)
        .expect("Buffer creation should succeed");

    assert!(matches!(
        device.buffers().map_range(&mut buffer, 0, 16, MapAccess::WRITE),
        Err(RenderError::Usage(UsageError::MissingUsage { .. }))
    ));
    assert!(matches!(
        device.buffers().map_range(&mut buffer, 8, 16, MapAccess::READ),
        Err(RenderError::Usage(UsageError::OutOfBounds { .. }))
    ));

    let mut view = device
        .buffers()
        .map_range(&mut buffer, 0, 16, MapAccess::READ)
        .expect("A read mapping should succeed");
    assert_eq!(view.as_slice(), &[0; 16]);
    assert!(matches!(
        view.as_mut_slice(),
        Err(UsageError::ReadOnlyMapping { .. })
    ));
    drop(view);

    assert!(!buffer.is_mapped(), "Dropping the view should unmap");
    buffer.close().expect("Close should succeed");
}

#[test]
fn test_denied_mapping_is_a_driver_error() {
    // --- 1. ARRANGE ---
    let (driver, device) = headless_device(HeadlessConfig {
        deny_mapping: true,
        ..HeadlessConfig::default()
    });

    // --- 2. ACT ---
    let result = device.buffers().create(
        "Dynamic UBO",
        BufferUsage::UNIFORM | BufferUsage::MAP_WRITE,
        256,
    );

    // --- 3. ASSERT ---
    let err = result.expect_err("A denied persistent mapping should fail creation");
    assert!(
        !err.is_precondition(),
        "A driver refusal is an environment condition, not a caller bug"
    );
    assert_eq!(
        driver.live_buffers(),
        0,
        "The half-created buffer should be deleted"
    );
}

#[test]
fn test_copy_between_buffers_checks_usage() {
    let (driver, device) = headless_device(HeadlessConfig::default());
    let mut src = device
        .buffers()
        .create_init("Source", BufferUsage::COPY_SRC, &[1, 2, 3, 4])
        .expect("Buffer creation should succeed");
    let mut dst = device
        .buffers()
        .create("Destination", BufferUsage::COPY_DST, 8)
        .expect("Buffer creation should succeed");

    let backwards = device.buffers().copy(&dst, &src, 0, 0, 4);
    assert!(matches!(
        backwards,
        Err(RenderError::Usage(UsageError::MissingUsage { .. }))
    ));

    device
        .buffers()
        .copy(&src, &dst, 0, 4, 4)
        .expect("Copy should succeed");
    assert_eq!(
        driver.buffer_contents(dst.handle()),
        Some(vec![0, 0, 0, 0, 1, 2, 3, 4])
    );

    src.close().expect("Close should succeed");
    dst.close().expect("Close should succeed");
}

#[test]
fn test_zero_sized_and_empty_buffers_are_rejected() {
    let (driver, device) = headless_device(HeadlessConfig::default());

    let zero = device.buffers().create("Empty", BufferUsage::VERTEX, 0);
    let empty = device
        .buffers()
        .create_init("Empty", BufferUsage::VERTEX, &[]);

    assert!(matches!(
        zero,
        Err(RenderError::Usage(UsageError::ZeroSizedBuffer { .. }))
    ));
    assert!(matches!(
        empty,
        Err(RenderError::Usage(UsageError::EmptyBufferSource { .. }))
    ));
    assert!(driver.calls().is_empty(), "No driver call should be made");
}

/// Persistent storage is available but direct state access is not, so every
/// storage, flush and unmap call goes through the bind-then-operate backend.
fn storage_without_direct_access() -> HeadlessConfig {
    HeadlessConfig {
        extensions: vec![BUFFER_STORAGE.to_owned()],
        ..HeadlessConfig::default()
    }
}

fn bind_foreign_buffers(driver: &HeadlessDriver) -> Vec<Option<BufferHandle>> {
    for target in ALL_BUFFER_TARGETS {
        let foreign = driver.gen_buffer();
        driver.bind_buffer(target, Some(foreign));
    }
    buffer_bindings(driver)
}

const ALL_BUFFER_TARGETS: [BufferTarget; 5] = [
    BufferTarget::Array,
    BufferTarget::ElementArray,
    BufferTarget::Uniform,
    BufferTarget::CopyRead,
    BufferTarget::CopyWrite,
];

fn buffer_bindings(driver: &HeadlessDriver) -> Vec<Option<BufferHandle>> {
    ALL_BUFFER_TARGETS
        .iter()
        .map(|target| driver.bound_buffer(*target))
        .collect()
}

#[test]
fn test_persistent_storage_through_bound_backend_keeps_bindings() {
    // --- 1. ARRANGE ---
    let (driver, device) = headless_device(storage_without_direct_access());
    assert_eq!(device.buffers().backend_kind(), BufferBackendKind::BindThenOperate);
    assert!(device.buffers().uses_persistent_storage());
    let before = bind_foreign_buffers(&driver);

    // --- 2. ACT ---
    let mut buffer = device
        .buffers()
        .create(
            "Material UBO",
            BufferUsage::UNIFORM | BufferUsage::MAP_WRITE,
            64,
        )
        .expect("Buffer creation should succeed");
    let handle = buffer.handle();
    let after_create = buffer_bindings(&driver);

    device
        .buffers()
        .write(&mut buffer, 0, &[5; 16])
        .expect("Write should succeed");
    let after_write = buffer_bindings(&driver);

    {
        let mut view = device
            .buffers()
            .map_range(&mut buffer, 32, 8, MapAccess::WRITE)
            .expect("A persistent sub-view should be available");
        view.as_mut_slice()
            .expect("The view should be writable")
            .copy_from_slice(&[6; 8]);
        view.close();
    }
    let after_map = buffer_bindings(&driver);
    let contents = driver.buffer_contents(handle);

    buffer.close().expect("Close should succeed");

    // --- 3. ASSERT ---
    assert!(buffer.is_closed());
    for (step, bindings) in [
        ("create", after_create),
        ("write", after_write),
        ("map", after_map),
        ("close", buffer_bindings(&driver)),
    ] {
        assert_eq!(
            bindings, before,
            "The caller's bindings should survive {step}"
        );
    }
    let contents = contents.expect("The buffer should exist before close");
    assert_eq!(&contents[0..16], &[5; 16]);
    assert_eq!(&contents[32..40], &[6; 8]);
    assert!(
        driver.calls().contains(&DriverCall::UnmapBuffer(handle)),
        "The persistent mapping should be released on close"
    );
    assert_eq!(driver.buffer_contents(handle), None);
}
