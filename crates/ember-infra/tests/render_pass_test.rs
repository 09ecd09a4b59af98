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

use ember_core::pipeline::{IndexType, UniformKind, VertexFormat};
use ember_core::{
    BufferResource, BufferUsage, Framebuffer, GpuDevice, RenderError, RenderObject,
    RenderPipeline, RenderSettings, UsageError,
};
use ember_infra::{create_device, DriverCall, HeadlessConfig, HeadlessDriver};
use std::rc::Rc;

const OPEN: &str = "Buffer should be open";

struct Fixture {
    driver: Rc<HeadlessDriver>,
    device: GpuDevice,
    target: Framebuffer,
}

impl Fixture {
    fn new() -> Self {
        let driver = Rc::new(HeadlessDriver::new(HeadlessConfig::default()));
        let device = create_device(driver.clone(), RenderSettings::default());
        let mut target = Framebuffer::new("Main", true);
        target
            .initialize(&device, 64, 64)
            .expect("Framebuffer initialization should succeed");
        driver.clear_calls();
        Self {
            driver,
            device,
            target,
        }
    }

    fn uniform_buffer(&self, label: &str) -> BufferResource {
        self.device
            .buffers()
            .create(label, BufferUsage::UNIFORM | BufferUsage::COPY_DST, 512)
            .expect("Uniform buffer creation should succeed")
    }

    fn bind_range_count(&self) -> usize {
        self.driver
            .calls()
            .iter()
            .filter(|call| matches!(call, DriverCall::BindBufferRange { .. }))
            .count()
    }

    fn teardown(mut self, mut buffers: Vec<BufferResource>) {
        for buffer in &mut buffers {
            buffer.close().expect("Close should succeed");
        }
        self.target
            .delete(&self.device)
            .expect("Delete should succeed");
    }
}

#[test]
fn test_pipeline_switch_resends_uniforms() {
    // --- 1. ARRANGE ---
    let fixture = Fixture::new();
    let projection = fixture.uniform_buffer("Projection");
    let sky = fixture
        .device
        .compile_pipeline(
            &RenderPipeline::new("Sky").with_uniform("Projection", UniformKind::UniformBuffer),
        )
        .expect("Linking should succeed");
    let clouds = fixture
        .device
        .compile_pipeline(
            &RenderPipeline::new("Clouds").with_uniform("Projection", UniformKind::UniformBuffer),
        )
        .expect("Linking should succeed");

    // --- 2. ACT ---
    let mut counts = Vec::new();
    {
        let mut pass = fixture
            .device
            .begin_render_pass("Sky", &fixture.target, None, None)
            .expect("Pass should open");
        pass.set_pipeline(&sky).expect("Pipeline should be set");
        pass.set_uniform("Projection", &projection.slice_all().expect(OPEN))
            .expect("Uniform should be set");

        pass.draw(0, 3).expect("First draw should succeed");
        counts.push(fixture.bind_range_count());

        pass.draw(0, 3).expect("Second draw should succeed");
        counts.push(fixture.bind_range_count());

        pass.set_pipeline(&sky).expect("Same pipeline should be accepted");
        pass.draw(0, 3).expect("Third draw should succeed");
        counts.push(fixture.bind_range_count());

        pass.set_pipeline(&clouds).expect("Pipeline should be set");
        assert!(pass.pending_uniforms().contains("Projection"));
        pass.draw(0, 3).expect("Fourth draw should succeed");
        counts.push(fixture.bind_range_count());

        pass.close().expect("Pass should close");
    }

    // --- 3. ASSERT ---
    assert_eq!(
        counts,
        vec![1, 1, 1, 2],
        "Only the first draw and the draw after a pipeline switch should bind the uniform"
    );
    fixture.teardown(vec![projection]);
}

#[test]
fn test_misaligned_uniform_makes_no_driver_call() {
    // --- 1. ARRANGE ---
    let fixture = Fixture::new();
    let buffer = fixture.uniform_buffer("Lights");
    let misaligned = buffer.slice(16, 64).expect("Slice should be in bounds");
    let mut pass = fixture
        .device
        .begin_render_pass("Lights", &fixture.target, None, None)
        .expect("Pass should open");
    fixture.driver.clear_calls();

    // --- 2. ACT ---
    let result = pass.set_uniform("Lights", &misaligned);

    // --- 3. ASSERT ---
    assert_eq!(
        result,
        Err(UsageError::MisalignedUniformOffset {
            name: "Lights".to_owned(),
            offset: 16,
            alignment: 256,
        })
    );
    assert!(
        fixture.driver.calls().is_empty(),
        "The alignment check must come before any driver call"
    );
    assert!(pass.pending_uniforms().is_empty());

    pass.close().expect("Pass should close");
    drop(pass);
    fixture.teardown(vec![buffer]);
}

#[test]
fn test_debug_groups_must_balance() {
    // --- 1. ARRANGE ---
    let fixture = Fixture::new();
    let mut pass = fixture
        .device
        .begin_render_pass("Shadows", &fixture.target, None, Some(1.0))
        .expect("Pass should open");

    // --- 2. ACT ---
    pass.push_debug_group("Cascade 0").expect("Push should succeed");
    pass.push_debug_group("Cascade 1").expect("Push should succeed");
    pass.pop_debug_group().expect("Pop should succeed");
    let unbalanced = pass.close();

    // --- 3. ASSERT ---
    assert_eq!(
        unbalanced,
        Err(UsageError::UnbalancedDebugGroups {
            pass: "Shadows".to_owned(),
            depth: 1,
        })
    );
    assert!(!pass.is_closed(), "A failed close should leave the pass open");

    pass.pop_debug_group().expect("Pop should succeed");
    assert!(matches!(
        pass.pop_debug_group(),
        Err(UsageError::DebugGroupUnderflow { .. })
    ));
    pass.close().expect("A balanced pass should close");
    assert_eq!(
        fixture.driver.debug_group_depth(),
        0,
        "The pass's own group should be popped on close"
    );

    drop(pass);
    fixture.teardown(Vec::new());
}

#[test]
fn test_closed_pass_rejects_every_operation() {
    let fixture = Fixture::new();
    let buffer = fixture.uniform_buffer("Projection");
    let mut pass = fixture
        .device
        .begin_render_pass("Once", &fixture.target, Some([0.0; 4]), None)
        .expect("Pass should open");
    pass.close().expect("Pass should close");

    assert!(matches!(pass.close(), Err(UsageError::PassClosed { .. })));
    assert!(matches!(pass.draw(0, 3), Err(UsageError::PassClosed { .. })));
    assert!(matches!(
        pass.set_uniform("Projection", &buffer.slice_all().expect(OPEN)),
        Err(UsageError::PassClosed { .. })
    ));
    assert!(matches!(
        pass.push_debug_group("Late"),
        Err(UsageError::PassClosed { .. })
    ));
    assert!(!fixture.device.is_render_pass_open());

    drop(pass);
    fixture.teardown(vec![buffer]);
}

#[test]
fn test_open_pass_blocks_buffer_commands_and_second_pass() {
    let fixture = Fixture::new();
    let pass = fixture
        .device
        .begin_render_pass("Blocking", &fixture.target, None, None)
        .expect("Pass should open");

    let created = fixture
        .device
        .buffers()
        .create("Late", BufferUsage::VERTEX, 16);
    assert!(matches!(
        created,
        Err(RenderError::Usage(UsageError::RenderPassOpen))
    ));
    assert!(matches!(
        fixture
            .device
            .begin_render_pass("Second", &fixture.target, None, None),
        Err(RenderError::Usage(UsageError::RenderPassOpen))
    ));

    drop(pass);
    assert!(
        !fixture.device.is_render_pass_open(),
        "Dropping the pass should end it"
    );
    fixture.teardown(Vec::new());
}

#[test]
fn test_dropped_pass_pops_leftover_groups() {
    let fixture = Fixture::new();
    {
        let mut pass = fixture
            .device
            .begin_render_pass("Leaky", &fixture.target, None, None)
            .expect("Pass should open");
        pass.push_debug_group("Never popped")
            .expect("Push should succeed");
    }

    assert_eq!(fixture.driver.debug_group_depth(), 0);
    assert!(!fixture.device.is_render_pass_open());
    fixture.teardown(Vec::new());
}

#[test]
fn test_missing_bindings_fail_before_drawing() {
    let fixture = Fixture::new();
    let pipeline = fixture
        .device
        .compile_pipeline(
            &RenderPipeline::new("Textured")
                .with_uniform("Projection", UniformKind::UniformBuffer)
                .with_sampler("Sampler0"),
        )
        .expect("Linking should succeed");
    let mut pass = fixture
        .device
        .begin_render_pass("Textured", &fixture.target, None, None)
        .expect("Pass should open");

    assert!(matches!(
        pass.draw(0, 3),
        Err(UsageError::MissingPipeline { .. })
    ));
    pass.set_pipeline(&pipeline).expect("Pipeline should be set");
    assert!(matches!(
        pass.draw(0, 3),
        Err(UsageError::MissingUniform { .. })
    ));
    assert!(!fixture
        .driver
        .calls()
        .iter()
        .any(|call| matches!(call, DriverCall::DrawArrays { .. })));

    pass.close().expect("Pass should close");
    drop(pass);
    fixture.teardown(Vec::new());
}

#[test]
fn test_draw_multiple_indexed_defaults_to_16_bit_indices() {
    // --- 1. ARRANGE ---
    let fixture = Fixture::new();
    let buffers = fixture.device.buffers();
    let vertices = buffers
        .create_init("Quad vertices", BufferUsage::VERTEX, &[0; 48])
        .expect("Vertex buffer creation should succeed");
    let indices = buffers
        .create_init("Quad indices", BufferUsage::INDEX, &[0, 0, 1, 0, 2, 0, 2, 0, 3, 0, 0, 0])
        .expect("Index buffer creation should succeed");
    let projection = fixture.uniform_buffer("Projection");
    let pipeline = fixture
        .device
        .compile_pipeline(
            &RenderPipeline::new("Quads")
                .with_uniform("Projection", UniformKind::UniformBuffer)
                .with_vertex_format(VertexFormat::new(12)),
        )
        .expect("Linking should succeed");
    let objects = vec![
        RenderObject {
            slot: 0,
            vertex_buffer: vertices.slice_all().expect(OPEN),
            index_buffer: None,
            index_type: None,
            first_index: 0,
            index_count: 6,
            uniforms: vec![("Projection".to_owned(), projection.slice_all().expect(OPEN))],
        },
        RenderObject {
            slot: 0,
            vertex_buffer: vertices.slice_all().expect(OPEN),
            index_buffer: None,
            index_type: Some(IndexType::U32),
            first_index: 0,
            index_count: 3,
            uniforms: Vec::new(),
        },
    ];

    // --- 2. ACT ---
    let mut pass = fixture
        .device
        .begin_render_pass("Quads", &fixture.target, None, None)
        .expect("Pass should open");
    pass.set_pipeline(&pipeline).expect("Pipeline should be set");
    pass.draw_multiple_indexed(&objects, Some(&indices.slice_all().expect(OPEN)), None)
        .expect("Batch should draw");
    pass.close().expect("Pass should close");
    drop(pass);

    // --- 3. ASSERT ---
    let index_types: Vec<IndexType> = fixture
        .driver
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            DriverCall::DrawElements { index_type, .. } => Some(index_type),
            _ => None,
        })
        .collect();
    assert_eq!(index_types, vec![IndexType::U16, IndexType::U32]);

    fixture.teardown(vec![vertices, indices, projection]);
}

#[test]
fn test_pipeline_label_reuse_requires_identical_description() {
    // --- 1. ARRANGE ---
    let fixture = Fixture::new();
    let sky = RenderPipeline::new("Sky").with_uniform("Projection", UniformKind::UniformBuffer);
    let other_sky = RenderPipeline::new("Sky").with_uniform("Stars", UniformKind::TexelBuffer);

    // --- 2. ACT ---
    let first = fixture
        .device
        .compile_pipeline(&sky)
        .expect("First compile should succeed");
    let again = fixture
        .device
        .compile_pipeline(&sky.clone())
        .expect("Identical description should hit the cache");
    let conflict = fixture.device.compile_pipeline(&other_sky);

    // --- 3. ASSERT ---
    assert!(Rc::ptr_eq(&first, &again), "The cached program should be reused");
    assert!(
        matches!(
            conflict,
            Err(RenderError::Usage(UsageError::PipelineLabelConflict { ref label })) if label == "Sky"
        ),
        "A different description under the same label should be rejected"
    );
    let links = fixture
        .driver
        .calls()
        .into_iter()
        .filter(|call| matches!(call, DriverCall::LinkProgram { .. }))
        .count();
    assert_eq!(links, 1, "Only the first compile should link");
    assert_eq!(first.info(), &sky, "The cache should keep the first description");

    fixture.teardown(Vec::new());
}
