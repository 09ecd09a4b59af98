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

// Ember Sandbox
// Drives the GPU layer against the headless driver for a few frames.
//
// Usage: sandbox [settings.json]

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use ember_core::pipeline::{UniformKind, VertexFormat};
use ember_core::uniform::{DynamicTransforms, DYNAMIC_TRANSFORMS};
use ember_core::{
    BufferUsage, DynamicUniforms, Framebuffer, GpuDevice, PostEffectPass, PostEffectSampler,
    PostEffectTargets, RenderObject, RenderPipeline, RenderSettings,
};
use ember_infra::{create_device, HeadlessConfig, HeadlessDriver};
use glam::{Mat4, Vec3, Vec4};
use std::rc::Rc;

const FRAMES: usize = 4;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    color: [f32; 3],
}

const VERTICES: &[Vertex] = &[
    Vertex {
        position: [0.0, 0.5, 0.0],
        color: [1.0, 0.0, 0.0],
    },
    Vertex {
        position: [-0.5, -0.5, 0.0],
        color: [0.0, 1.0, 0.0],
    },
    Vertex {
        position: [0.5, -0.5, 0.0],
        color: [0.0, 0.0, 1.0],
    },
];

const INDICES: &[u16] = &[0, 1, 2];

fn load_settings() -> Result<RenderSettings> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading settings from '{path}'"))?;
            serde_json::from_str(&text).with_context(|| format!("parsing settings in '{path}'"))
        }
        None => Ok(RenderSettings::default()),
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let settings = load_settings()?;
    let driver = Rc::new(HeadlessDriver::new(HeadlessConfig::default()));
    let device = create_device(driver.clone(), settings);
    log::info!(
        "Device ready: {} buffer backend, uniform alignment {}",
        device.buffers().backend_kind(),
        device.limits().uniform_offset_alignment
    );

    let mut targets = PostEffectTargets::new();
    for (name, use_depth) in [("main", true), ("blurred", false)] {
        let mut framebuffer = Framebuffer::new(name, use_depth);
        framebuffer.initialize(
            &device,
            device.settings().initial_width,
            device.settings().initial_height,
        )?;
        targets.insert(name.to_owned(), framebuffer);
    }

    let result = run_frames(&device, &targets);

    for framebuffer in targets.values_mut() {
        framebuffer.delete(&device)?;
    }
    result?;

    log::info!(
        "Shut down cleanly: {} live buffers, {} bytes allocated",
        driver.live_buffers(),
        driver.allocated_bytes()
    );
    Ok(())
}

fn run_frames(device: &GpuDevice, targets: &PostEffectTargets) -> Result<()> {
    let mut vertices = device.buffers().create_init(
        "Triangle Vertices",
        BufferUsage::VERTEX,
        bytemuck::cast_slice(VERTICES),
    )?;
    let mut indices = device.buffers().create_init(
        "Triangle Indices",
        BufferUsage::INDEX,
        bytemuck::cast_slice(INDICES),
    )?;
    let mut projection = device.buffers().create_init(
        "Projection",
        BufferUsage::UNIFORM,
        bytemuck::cast_slice(
            &Mat4::orthographic_rh(-1.0, 1.0, -1.0, 1.0, 0.1, 100.0).to_cols_array(),
        ),
    )?;

    let triangle = device.compile_pipeline(
        &RenderPipeline::new("Triangle")
            .with_uniform("Projection", UniformKind::UniformBuffer)
            .with_uniform(DYNAMIC_TRANSFORMS, UniformKind::UniformBuffer)
            .with_vertex_format(VertexFormat::new(std::mem::size_of::<Vertex>() as u32)),
    )?;
    let blur = device.compile_pipeline(
        &RenderPipeline::new("Blur")
            .with_uniform("Projection", UniformKind::UniformBuffer)
            .with_uniform("SamplerInfo", UniformKind::UniformBuffer)
            .with_sampler("InSampler"),
    )?;

    let mut transforms = DynamicUniforms::new(device)?;
    let mut post = PostEffectPass::new(
        device,
        "Blur",
        blur,
        "blurred",
        BTreeMap::new(),
        vec![PostEffectSampler::Target {
            name: "In".to_owned(),
            target: "main".to_owned(),
            depth: false,
            bilinear: true,
        }],
    )?;

    let main = targets.get("main").context("missing main target")?;
    for frame in 0..FRAMES {
        let angle = frame as f32 * 0.25;
        let blocks: Vec<DynamicTransforms> = (0..3)
            .map(|i| DynamicTransforms {
                model_view: Mat4::from_rotation_z(angle)
                    * Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)),
                color_modulator: Vec4::new(1.0, 1.0, 1.0, 0.5 + i as f32 * 0.25),
                model_offset: Vec3::new(i as f32 - 1.0, 0.0, 0.0),
                ..DynamicTransforms::default()
            })
            .collect();
        let slices = transforms.write_all(device, &blocks)?;

        let vertex_slice = vertices.slice_all()?;
        let objects: Vec<RenderObject> = slices
            .into_iter()
            .map(|slice| RenderObject {
                slot: 0,
                vertex_buffer: vertex_slice.clone(),
                index_buffer: None,
                index_type: None,
                first_index: 0,
                index_count: INDICES.len() as u32,
                uniforms: vec![(DYNAMIC_TRANSFORMS.to_owned(), slice)],
            })
            .collect();

        main.clear(device)?;
        let mut pass = device.begin_render_pass("Triangles", main, None, None)?;
        pass.set_pipeline(&triangle)?;
        pass.set_uniform("Projection", &projection.slice_all()?)?;
        pass.push_debug_group("Draw triangles")?;
        pass.draw_multiple_indexed(&objects, Some(&indices.slice_all()?), None)?;
        pass.pop_debug_group()?;
        pass.close()?;
        drop(pass);

        post.render(device, targets, &projection.slice_all()?)?;
        transforms.rotate()?;
        log::info!("Frame {frame} submitted");
    }

    post.close()?;
    transforms.close()?;
    projection.close()?;
    indices.close()?;
    vertices.close()?;
    Ok(())
}
