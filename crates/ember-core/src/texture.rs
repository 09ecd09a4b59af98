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

//! Textures, texture views and samplers.

use crate::driver::{GlDriver, SamplerHandle, TextureHandle};
use crate::error::UsageError;
use bitflags::bitflags;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Pixel formats used by framebuffer attachments and sampled textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGBA color.
    Rgba8,
    /// 32-bit floating point depth.
    Depth32,
}

impl TextureFormat {
    /// Returns `true` for depth formats.
    pub fn is_depth(self) -> bool {
        matches!(self, TextureFormat::Depth32)
    }
}

bitflags! {
    /// How a texture will be used.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// The texture can be the destination of copies.
        const COPY_DST = 1 << 0;
        /// The texture can be the source of copies.
        const COPY_SRC = 1 << 1;
        /// The texture can be sampled in shaders.
        const TEXTURE_BINDING = 1 << 2;
        /// The texture can be a framebuffer attachment.
        const RENDER_ATTACHMENT = 1 << 3;
    }
}

/// Describes a texture to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDescriptor {
    /// Debug label.
    pub label: String,
    /// Pixel format.
    pub format: TextureFormat,
    /// Width of mip level 0.
    pub width: u32,
    /// Height of mip level 0.
    pub height: u32,
    /// Number of mip levels.
    pub mip_levels: u32,
    /// Allowed usages.
    pub usage: TextureUsage,
}

/// Texture sampling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// Nearest texel.
    Nearest,
    /// Bilinear interpolation.
    Linear,
}

/// Texture addressing outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    /// Clamp to the edge texel.
    ClampToEdge,
    /// Wrap around.
    Repeat,
}

#[derive(Debug)]
pub(crate) struct TextureInfo {
    pub(crate) handle: TextureHandle,
    pub(crate) descriptor: TextureDescriptor,
    pub(crate) closed: Cell<bool>,
}

/// A GPU texture, owned exclusively.
///
/// Created through [`GpuDevice::create_texture`](crate::GpuDevice::create_texture).
/// The owner must call [`close`](GpuTexture::close); dropping an open texture leaks
/// it and logs a warning.
#[derive(Debug)]
pub struct GpuTexture {
    info: Rc<TextureInfo>,
    driver: Rc<dyn GlDriver>,
}

impl GpuTexture {
    pub(crate) fn new(
        handle: TextureHandle,
        descriptor: TextureDescriptor,
        driver: Rc<dyn GlDriver>,
    ) -> Self {
        Self {
            info: Rc::new(TextureInfo {
                handle,
                descriptor,
                closed: Cell::new(false),
            }),
            driver,
        }
    }

    /// The driver handle.
    pub fn handle(&self) -> TextureHandle {
        self.info.handle
    }

    /// The descriptor the texture was created from.
    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.info.descriptor
    }

    /// Width of mip level 0.
    pub fn width(&self) -> u32 {
        self.info.descriptor.width
    }

    /// Height of mip level 0.
    pub fn height(&self) -> u32 {
        self.info.descriptor.height
    }

    /// Returns `true` once the texture has been closed.
    pub fn is_closed(&self) -> bool {
        self.info.closed.get()
    }

    /// A view of every mip level.
    pub fn full_view(&self) -> TextureView {
        TextureView {
            texture: Rc::clone(&self.info),
            base_mip_level: 0,
            mip_levels: self.info.descriptor.mip_levels,
        }
    }

    /// A view of `mip_levels` levels starting at `base_mip_level`.
    ///
    /// The count is clamped to the levels the texture has; a base level past the
    /// last one, or an empty range, is rejected.
    pub fn create_view(
        &self,
        base_mip_level: u32,
        mip_levels: u32,
    ) -> Result<TextureView, UsageError> {
        if self.is_closed() {
            return Err(UsageError::ResourceClosed {
                label: self.info.descriptor.label.clone(),
            }
            .logged());
        }
        let available = self.info.descriptor.mip_levels;
        if base_mip_level >= available || mip_levels == 0 {
            return Err(UsageError::InvalidMipRange {
                label: self.info.descriptor.label.clone(),
                base_mip_level,
                mip_levels,
                available,
            }
            .logged());
        }
        let mip_levels = mip_levels.min(available - base_mip_level);
        Ok(TextureView {
            texture: Rc::clone(&self.info),
            base_mip_level,
            mip_levels,
        })
    }

    /// Deletes the texture. Calling `close` twice is an error.
    pub fn close(&mut self) -> Result<(), UsageError> {
        if self.is_closed() {
            return Err(UsageError::AlreadyClosed {
                label: self.info.descriptor.label.clone(),
            }
            .logged());
        }
        self.driver.delete_texture(self.info.handle);
        self.info.closed.set(true);
        Ok(())
    }
}

impl Drop for GpuTexture {
    fn drop(&mut self) {
        if !self.is_closed() {
            log::warn!(
                "Texture '{}' ({:?}) dropped without close(); it is leaked",
                self.info.descriptor.label,
                self.info.handle
            );
        }
    }
}

/// A non-owning view of a range of a texture's mip levels.
#[derive(Debug, Clone)]
pub struct TextureView {
    texture: Rc<TextureInfo>,
    base_mip_level: u32,
    mip_levels: u32,
}

impl TextureView {
    /// The driver handle of the viewed texture.
    pub fn handle(&self) -> TextureHandle {
        self.texture.handle
    }

    /// The label of the viewed texture.
    pub fn label(&self) -> &str {
        &self.texture.descriptor.label
    }

    /// The pixel format of the viewed texture.
    pub fn format(&self) -> TextureFormat {
        self.texture.descriptor.format
    }

    /// The first mip level in the view.
    pub fn base_mip_level(&self) -> u32 {
        self.base_mip_level
    }

    /// The number of mip levels in the view.
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    /// Width of the base mip level.
    pub fn width(&self) -> u32 {
        (self.texture.descriptor.width >> self.base_mip_level).max(1)
    }

    /// Height of the base mip level.
    pub fn height(&self) -> u32 {
        (self.texture.descriptor.height >> self.base_mip_level).max(1)
    }

    /// Returns `true` if the viewed texture has been closed.
    pub fn is_closed(&self) -> bool {
        self.texture.closed.get()
    }
}

impl PartialEq for TextureView {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.texture, &other.texture)
            && self.base_mip_level == other.base_mip_level
            && self.mip_levels == other.mip_levels
    }
}

/// Hands out one driver sampler per filter/address combination.
#[derive(Debug)]
pub struct SamplerCache {
    driver: Rc<dyn GlDriver>,
    samplers: RefCell<HashMap<(FilterMode, AddressMode), SamplerHandle>>,
}

impl SamplerCache {
    /// Creates an empty cache.
    pub fn new(driver: Rc<dyn GlDriver>) -> Self {
        Self {
            driver,
            samplers: RefCell::new(HashMap::new()),
        }
    }

    /// Returns the sampler for `filter` and `address`, creating it on first use.
    pub fn get(&self, filter: FilterMode, address: AddressMode) -> SamplerHandle {
        *self
            .samplers
            .borrow_mut()
            .entry((filter, address))
            .or_insert_with(|| self.driver.create_sampler(filter, address))
    }
}
