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

use ember_core::driver::BufferHandle;
use ember_core::pipeline::UniformKind;
use ember_core::uniform::UniformValue;
use ember_core::{
    BufferResource, BufferSlice, BufferUsage, Framebuffer, GpuDevice, PostEffectPass,
    PostEffectSampler, PostEffectTargets, RenderError, RenderPipeline, RenderSettings, UsageError,
};
use ember_infra::{create_device, DriverCall, HeadlessConfig, HeadlessDriver};
use glam::{Mat4, Vec2};
use std::collections::BTreeMap;
use std::rc::Rc;

struct Scene {
    driver: Rc<HeadlessDriver>,
    device: GpuDevice,
    targets: PostEffectTargets,
    projection: BufferResource,
}

impl Scene {
    fn new() -> Self {
        let driver = Rc::new(HeadlessDriver::new(HeadlessConfig::default()));
        let device = create_device(driver.clone(), RenderSettings::default());

        let mut targets = PostEffectTargets::new();
        for (name, width, height) in [("main", 320, 180), ("blur", 160, 90)] {
            let mut framebuffer = Framebuffer::new(name, true);
            framebuffer
                .initialize(&device, width, height)
                .expect("Framebuffer initialization should succeed");
            targets.insert(name.to_owned(), framebuffer);
        }

        let projection = device
            .buffers()
            .create_init(
                "Projection",
                BufferUsage::UNIFORM,
                bytemuck::cast_slice(&Mat4::IDENTITY.to_cols_array()),
            )
            .expect("Projection buffer creation should succeed");
        driver.clear_calls();

        Self {
            driver,
            device,
            targets,
            projection,
        }
    }

    fn blur_pass(&self) -> PostEffectPass {
        let pipeline = self
            .device
            .compile_pipeline(
                &RenderPipeline::new("Blur")
                    .with_uniform("Projection", UniformKind::UniformBuffer)
                    .with_uniform("SamplerInfo", UniformKind::UniformBuffer)
                    .with_uniform("BlurConfig", UniformKind::UniformBuffer)
                    .with_sampler("DiffuseSampler"),
            )
            .expect("Linking should succeed");

        let mut uniforms = BTreeMap::new();
        uniforms.insert(
            "BlurConfig".to_owned(),
            vec![
                UniformValue::Vec2(Vec2::new(1.0, 0.0)),
                UniformValue::Float(4.0),
            ],
        );

        PostEffectPass::new(
            &self.device,
            "Blur",
            pipeline,
            "blur",
            uniforms,
            vec![PostEffectSampler::Target {
                name: "Diffuse".to_owned(),
                target: "main".to_owned(),
                depth: false,
                bilinear: true,
            }],
        )
        .expect("Post effect creation should succeed")
    }

    fn projection_slice(&self) -> BufferSlice {
        self.projection
            .slice_all()
            .expect("Projection buffer should be open")
    }

    fn teardown(mut self) {
        self.projection.close().expect("Close should succeed");
        for framebuffer in self.targets.values_mut() {
            framebuffer
                .delete(&self.device)
                .expect("Delete should succeed");
        }
        assert_eq!(self.driver.live_buffers(), 0, "Every buffer should be released");
    }
}

#[test]
fn test_render_draws_full_screen_triangle() {
    // --- 1. ARRANGE ---
    let scene = Scene::new();
    let mut pass = scene.blur_pass();
    let main_color = scene.targets["main"]
        .color_view()
        .expect("Main color attachment")
        .handle();

    // --- 2. ACT ---
    let first_frame = render_frame(&scene, &mut pass);
    let second_frame = render_frame(&scene, &mut pass);

    // --- 3. ASSERT ---
    let range_binds: Vec<u32> = first_frame
        .iter()
        .filter_map(|call| match call {
            DriverCall::BindBufferRange { slot, .. } => Some(*slot),
            _ => None,
        })
        .collect();
    assert_eq!(range_binds, vec![0, 1, 2], "All three uniforms should be bound");
    assert!(first_frame.iter().any(|call| matches!(
        call,
        DriverCall::BindTextureUnit { unit: 0, texture: Some(texture), .. } if *texture == main_color
    )));
    assert!(first_frame.contains(&DriverCall::DrawArrays { first: 0, count: 3 }));
    assert!(!scene.device.is_render_pass_open());
    assert_ne!(
        sampler_info_binding(&first_frame).map(|(buffer, _)| buffer),
        sampler_info_binding(&second_frame).map(|(buffer, _)| buffer),
        "Consecutive frames should read SamplerInfo from different ring buffers"
    );

    pass.close().expect("Close should succeed");
    scene.teardown();
}

/// Renders the effect once and returns the driver calls it made.
fn render_frame(scene: &Scene, pass: &mut PostEffectPass) -> Vec<DriverCall> {
    scene.driver.clear_calls();
    pass.render(&scene.device, &scene.targets, &scene.projection_slice())
        .expect("Render should succeed");
    scene.driver.calls()
}

/// The buffer and offset the `SamplerInfo` block was bound from.
fn sampler_info_binding(calls: &[DriverCall]) -> Option<(BufferHandle, u64)> {
    calls.iter().find_map(|call| match call {
        DriverCall::BindBufferRange {
            slot: 1,
            buffer,
            offset,
            ..
        } => Some((*buffer, *offset)),
        _ => None,
    })
}

#[test]
fn test_sampler_info_publishes_sizes() {
    // --- 1. ARRANGE ---
    let scene = Scene::new();
    let mut pass = scene.blur_pass();

    // --- 2. ACT ---
    let calls = render_frame(&scene, &mut pass);

    // --- 3. ASSERT ---
    let (buffer, offset) = sampler_info_binding(&calls).expect("SamplerInfo should be bound");
    let offset = offset as usize;
    let bytes = scene
        .driver
        .buffer_contents(buffer)
        .expect("SamplerInfo buffer should exist");
    let floats: Vec<f32> = bytes[offset..offset + 16]
        .chunks_exact(4)
        .map(bytemuck::pod_read_unaligned)
        .collect();
    assert_eq!(floats, vec![160.0, 90.0, 320.0, 180.0], "Output size first, then each sampler");

    pass.close().expect("Close should succeed");
    scene.teardown();
}

#[test]
fn test_unknown_target_is_rejected() {
    let mut scene = Scene::new();
    let mut pass = scene.blur_pass();
    let mut main = scene.targets.remove("main").expect("Main target");

    let result = pass.render(&scene.device, &scene.targets, &scene.projection_slice());

    assert!(matches!(
        result,
        Err(RenderError::Usage(UsageError::UnknownTarget { ref name })) if name == "main"
    ));
    assert!(
        !scene
            .driver
            .calls()
            .iter()
            .any(DriverCall::is_submission),
        "Nothing should be submitted"
    );
    assert!(!scene.device.is_render_pass_open());

    main.delete(&scene.device).expect("Delete should succeed");
    pass.close().expect("Close should succeed");
    scene.teardown();
}

#[test]
fn test_closed_effect_rejects_render() {
    let scene = Scene::new();
    let mut pass = scene.blur_pass();

    pass.close().expect("Close should succeed");

    assert!(matches!(
        pass.render(&scene.device, &scene.targets, &scene.projection_slice()),
        Err(RenderError::Usage(UsageError::ResourceClosed { .. }))
    ));
    assert!(matches!(
        pass.close(),
        Err(RenderError::Usage(UsageError::AlreadyClosed { .. }))
    ));
    scene.teardown();
}
