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

//! Render targets made of a color attachment and an optional depth attachment.

use crate::device::GpuDevice;
use crate::driver::{FramebufferHandle, FramebufferMask, Rect};
use crate::error::{RenderError, UsageError};
use crate::texture::{FilterMode, GpuTexture, TextureDescriptor, TextureFormat, TextureUsage, TextureView};

#[derive(Debug)]
struct AttachmentTexture {
    texture: GpuTexture,
    view: TextureView,
}

impl AttachmentTexture {
    fn new(texture: GpuTexture) -> Self {
        let view = texture.full_view();
        Self { texture, view }
    }
}

/// A framebuffer owning its attachment textures.
///
/// Dimensions and attachments change together: [`resize`](Framebuffer::resize)
/// deletes everything and recreates it, never reallocating in place.
#[derive(Debug)]
pub struct Framebuffer {
    name: String,
    use_depth: bool,
    width: u32,
    height: u32,
    color: Option<AttachmentTexture>,
    depth: Option<AttachmentTexture>,
    handle: Option<FramebufferHandle>,
    clear_color: [f32; 4],
}

impl Framebuffer {
    /// Creates an uninitialized framebuffer.
    pub fn new(name: impl Into<String>, use_depth: bool) -> Self {
        Self {
            name: name.into(),
            use_depth,
            width: 0,
            height: 0,
            color: None,
            depth: None,
            handle: None,
            clear_color: [0.0, 0.0, 0.0, 0.0],
        }
    }

    /// The framebuffer's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Width of the attachments, or 0 when uninitialized.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of the attachments, or 0 when uninitialized.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns `true` if the framebuffer gets a depth attachment.
    pub fn uses_depth(&self) -> bool {
        self.use_depth
    }

    /// Returns `true` once attachments exist.
    pub fn is_initialized(&self) -> bool {
        self.handle.is_some()
    }

    /// The driver framebuffer object.
    pub fn handle(&self) -> Option<FramebufferHandle> {
        self.handle
    }

    /// A view of the color attachment.
    pub fn color_view(&self) -> Option<&TextureView> {
        self.color.as_ref().map(|a| &a.view)
    }

    /// A view of the depth attachment.
    pub fn depth_view(&self) -> Option<&TextureView> {
        self.depth.as_ref().map(|a| &a.view)
    }

    /// The color [`clear`](Self::clear) fills the color attachment with.
    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    /// Sets the color [`clear`](Self::clear) fills the color attachment with.
    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    /// Creates the attachments.
    ///
    /// Sizes outside `1..=max_texture_size` are rejected before any driver call.
    pub fn initialize(
        &mut self,
        device: &GpuDevice,
        width: u32,
        height: u32,
    ) -> Result<(), RenderError> {
        device.render_thread().assert_current();
        device.ensure_no_render_pass()?;
        if self.is_initialized() {
            return Err(UsageError::FramebufferInitialized {
                framebuffer: self.name.clone(),
            }
            .logged()
            .into());
        }
        device.limits().check_texture_size(&self.name, width, height)?;
        self.create_attachments(device, width, height)
    }

    /// Deletes the attachments and recreates them at the new size.
    ///
    /// An out-of-range size is rejected first and leaves the current attachments
    /// untouched.
    pub fn resize(
        &mut self,
        device: &GpuDevice,
        width: u32,
        height: u32,
    ) -> Result<(), RenderError> {
        device.render_thread().assert_current();
        device.ensure_no_render_pass()?;
        device.limits().check_texture_size(&self.name, width, height)?;
        self.delete(device)?;
        self.create_attachments(device, width, height)
    }

    fn create_attachments(
        &mut self,
        device: &GpuDevice,
        width: u32,
        height: u32,
    ) -> Result<(), RenderError> {
        let mut color = device.create_texture(TextureDescriptor {
            label: format!("{} / Color", self.name),
            format: TextureFormat::Rgba8,
            width,
            height,
            mip_levels: 1,
            usage: TextureUsage::RENDER_ATTACHMENT
                | TextureUsage::TEXTURE_BINDING
                | TextureUsage::COPY_SRC
                | TextureUsage::COPY_DST,
        })?;

        let depth = if self.use_depth {
            let created = device.create_texture(TextureDescriptor {
                label: format!("{} / Depth", self.name),
                format: TextureFormat::Depth32,
                width,
                height,
                mip_levels: 1,
                usage: TextureUsage::RENDER_ATTACHMENT
                    | TextureUsage::TEXTURE_BINDING
                    | TextureUsage::COPY_SRC,
            });
            match created {
                Ok(texture) => Some(texture),
                Err(err) => {
                    color.close()?;
                    return Err(err);
                }
            }
        } else {
            None
        };

        let backend = device.backend();
        let handle = backend.create_framebuffer();
        backend.attach_to_framebuffer(
            handle,
            Some(color.handle()),
            depth.as_ref().map(GpuTexture::handle),
            0,
            None,
        );

        self.width = width;
        self.height = height;
        self.color = Some(AttachmentTexture::new(color));
        self.depth = depth.map(AttachmentTexture::new);
        self.handle = Some(handle);
        log::debug!("Framebuffer '{}' created at {width}x{height}", self.name);
        Ok(())
    }

    /// Releases the attachments. Does nothing on an uninitialized framebuffer.
    ///
    /// Refused while any render pass is recording.
    pub fn delete(&mut self, device: &GpuDevice) -> Result<(), RenderError> {
        device.render_thread().assert_current();
        device.ensure_no_render_pass()?;
        if let Some(handle) = self.handle.take() {
            device.backend().delete_framebuffer(handle);
        }
        if let Some(mut depth) = self.depth.take() {
            depth.texture.close()?;
        }
        if let Some(mut color) = self.color.take() {
            color.texture.close()?;
        }
        self.width = 0;
        self.height = 0;
        Ok(())
    }

    /// Copies the depth attachment of `other` into this framebuffer's.
    pub fn copy_depth_from(
        &mut self,
        device: &GpuDevice,
        other: &Framebuffer,
    ) -> Result<(), RenderError> {
        device.render_thread().assert_current();
        device.ensure_no_render_pass()?;
        let (Some(src), true) = (other.handle, other.depth.is_some()) else {
            return Err(UsageError::MissingDepthAttachment {
                framebuffer: other.name.clone(),
            }
            .logged()
            .into());
        };
        let (Some(dst), true) = (self.handle, self.depth.is_some()) else {
            return Err(UsageError::MissingDepthAttachment {
                framebuffer: self.name.clone(),
            }
            .logged()
            .into());
        };

        device.backend().blit_framebuffer(
            src,
            dst,
            Rect::sized(other.width, other.height),
            Rect::sized(self.width, self.height),
            FramebufferMask::DEPTH,
            FilterMode::Nearest,
        );
        Ok(())
    }

    /// Clears color to [`clear_color`](Self::clear_color) and depth to 1.0.
    pub fn clear(&self, device: &GpuDevice) -> Result<(), RenderError> {
        let label = format!("Clear {}", self.name);
        let depth = self.depth.is_some().then_some(1.0);
        let mut pass = device.begin_render_pass(&label, self, Some(self.clear_color), depth)?;
        pass.close()?;
        Ok(())
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle {
            log::warn!(
                "Framebuffer '{}' ({:?}) dropped without delete(); its attachments are leaked",
                self.name,
                handle
            );
        }
    }
}
