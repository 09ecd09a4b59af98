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

//! Global settings for the GPU resource layer.

use serde::{Deserialize, Serialize};

/// The number of frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Settings supplied by the owning subsystem when the device is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Number of backing buffers each ring uniform allocator rotates through.
    pub ring_depth: usize,
    /// Initial width of the main framebuffer.
    pub initial_width: u32,
    /// Initial height of the main framebuffer.
    pub initial_height: u32,
    /// If `false`, direct state access is treated as unsupported.
    pub allow_direct_access: bool,
    /// If `false`, persistent buffer storage is treated as unsupported.
    pub allow_buffer_storage: bool,
    /// If `false`, debug groups are not forwarded to the driver.
    pub debug_labels: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            ring_depth: MAX_FRAMES_IN_FLIGHT,
            initial_width: 854,
            initial_height: 480,
            allow_direct_access: true,
            allow_buffer_storage: true,
            debug_labels: true,
        }
    }
}
