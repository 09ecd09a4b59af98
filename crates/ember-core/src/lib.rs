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

//! # Ember Core
//!
//! Driver-agnostic GPU resource and render-command layer: capability probing,
//! buffer resources and mappings, framebuffers, render pass recording, ring
//! buffered uniform storage and full-screen post effects.
//!
//! Concrete backends and drivers live in `ember-infra`.

#![warn(missing_docs)]

pub mod backend;
pub mod buffer;
pub mod capability;
pub mod device;
pub mod driver;
pub mod error;
pub mod framebuffer;
pub mod pass;
pub mod pipeline;
pub mod post_effect;
pub mod settings;
pub mod texture;
pub mod thread;
pub mod uniform;

pub use backend::{BufferBackendKind, RawBufferBackend};
pub use buffer::{BufferResource, BufferResourceFactory, BufferSlice, BufferUsage, MappedView};
pub use capability::CapabilitySet;
pub use device::{DeviceLimits, GpuDevice};
pub use driver::GlDriver;
pub use error::{DimensionError, DriverError, RenderError, UsageError};
pub use framebuffer::Framebuffer;
pub use pass::{RenderObject, RenderPass};
pub use pipeline::{CompiledPipeline, RenderPipeline};
pub use post_effect::{PostEffectPass, PostEffectSampler, PostEffectTargets};
pub use settings::RenderSettings;
pub use uniform::{DynamicUniforms, RingUniformAllocator};
