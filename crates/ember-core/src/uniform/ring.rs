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

//! Ring-buffered allocator for per-frame uniform blocks.
//!
//! The [`RingUniformAllocator`] avoids rewriting memory the GPU may still read by
//! cycling through a fixed number of backing buffers, one per frame in flight.
//! Blocks written during a frame are appended to the current buffer; the owner
//! calls [`rotate`](RingUniformAllocator::rotate) once per frame boundary.
//!
//! ```text
//! Frame N:     [Slot 0: CPU appends blocks] → draws bind slices of slot 0
//! Frame N+1:   [Slot 1: CPU appends blocks]   GPU may still read slot 0
//! Frame N+2:   [Slot 0: cursor wraps, writes restart at offset 0]
//! ```
//!
//! The allocator cannot observe how far the GPU lags behind. With a ring depth of
//! `N`, the caller guarantees the GPU is never more than `N - 1` frames behind.

use super::std140::{Std140Layout, Std140Writer, UniformBlock};
use crate::buffer::{BufferResource, BufferSlice, BufferUsage};
use crate::device::GpuDevice;
use crate::error::{RenderError, UsageError};
use std::borrow::Cow;

/// Usage of every backing buffer.
const RING_USAGE: BufferUsage = BufferUsage::UNIFORM
    .union(BufferUsage::MAP_WRITE)
    .union(BufferUsage::COPY_DST);

/// One backing buffer of the ring.
#[derive(Debug)]
struct RingSlot {
    buffer: BufferResource,
    /// Capacity in blocks.
    capacity: u64,
    /// Blocks written since the slot became current.
    used: u64,
    /// Outgrown buffers that may still be read by in-flight frames.
    retired: Vec<BufferResource>,
}

/// Allocates fixed-layout uniform blocks from `N` rotating backing buffers.
#[derive(Debug)]
pub struct RingUniformAllocator {
    label: String,
    block_size: u64,
    stride: u64,
    slots: Vec<RingSlot>,
    cursor: usize,
    scratch: Vec<u8>,
    closed: bool,
}

fn slot_label(label: &str, index: usize) -> Cow<'_, str> {
    match index {
        0 => Cow::Borrowed(label),
        _ => Cow::Owned(format!("{label} [slot {index}]")),
    }
}

impl RingUniformAllocator {
    /// Creates `ring_depth` backing buffers, each holding `initial_blocks` blocks.
    ///
    /// The block size is `layout`'s size, rounded up to the device's uniform offset
    /// alignment so that every returned slice can be bound directly.
    pub fn new(
        device: &GpuDevice,
        label: &str,
        layout: Std140Layout,
        ring_depth: usize,
        initial_blocks: u64,
    ) -> Result<Self, RenderError> {
        if ring_depth == 0 {
            return Err(UsageError::InvalidRingDepth {
                label: label.to_owned(),
            }
            .logged()
            .into());
        }

        let block_size = layout.size() as u64;
        let stride = device.limits().align_uniform(block_size);
        let capacity = initial_blocks.max(1);

        let mut slots: Vec<RingSlot> = Vec::with_capacity(ring_depth);
        for index in 0..ring_depth {
            let created =
                device
                    .buffers()
                    .create(&slot_label(label, index), RING_USAGE, capacity * stride);
            match created {
                Ok(buffer) => slots.push(RingSlot {
                    buffer,
                    capacity,
                    used: 0,
                    retired: Vec::new(),
                }),
                Err(err) => {
                    for slot in &mut slots {
                        slot.buffer.close()?;
                    }
                    return Err(err);
                }
            }
        }

        log::debug!(
            "Ring allocator '{label}': {ring_depth} slots of {capacity} x {stride} bytes"
        );
        Ok(Self {
            label: label.to_owned(),
            block_size,
            stride,
            slots,
            cursor: 0,
            scratch: Vec::with_capacity(block_size as usize),
            closed: false,
        })
    }

    /// The allocator's label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The number of backing buffers.
    pub fn ring_depth(&self) -> usize {
        self.slots.len()
    }

    /// Index of the backing buffer writes currently go to.
    pub fn current_slot(&self) -> usize {
        self.cursor
    }

    /// The std140 size of one block.
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Distance in bytes between consecutive blocks.
    pub fn block_stride(&self) -> u64 {
        self.stride
    }

    /// The backing buffer writes currently go to.
    pub fn current_buffer(&self) -> &BufferResource {
        &self.slots[self.cursor].buffer
    }

    /// Serializes `value` into the current backing buffer.
    pub fn write<T: UniformBlock + ?Sized>(
        &mut self,
        device: &GpuDevice,
        value: &T,
    ) -> Result<BufferSlice, RenderError> {
        self.ensure_open()?;
        self.reserve(device, 1)?;
        self.write_block(device, value)
    }

    /// Serializes every value of `values` into the current backing buffer.
    pub fn write_all<T: UniformBlock>(
        &mut self,
        device: &GpuDevice,
        values: &[T],
    ) -> Result<Vec<BufferSlice>, RenderError> {
        self.ensure_open()?;
        self.reserve(device, values.len() as u64)?;
        values
            .iter()
            .map(|value| self.write_block(device, value))
            .collect()
    }

    /// Moves to the next backing buffer. Call once per frame, after the frame's
    /// draws have been submitted.
    pub fn rotate(&mut self) -> Result<(), RenderError> {
        self.ensure_open()?;
        self.cursor = (self.cursor + 1) % self.slots.len();

        let slot = &mut self.slots[self.cursor];
        slot.used = 0;
        for mut retired in slot.retired.drain(..) {
            retired.close()?;
        }
        Ok(())
    }

    /// Resets the write position of every backing buffer without releasing them.
    pub fn clear(&mut self) -> Result<(), UsageError> {
        self.ensure_open()?;
        for slot in &mut self.slots {
            slot.used = 0;
        }
        Ok(())
    }

    /// Releases every backing buffer.
    pub fn close(&mut self) -> Result<(), RenderError> {
        if self.closed {
            return Err(UsageError::AlreadyClosed {
                label: self.label.clone(),
            }
            .logged()
            .into());
        }
        self.closed = true;
        for slot in &mut self.slots {
            slot.buffer.close()?;
            for retired in &mut slot.retired {
                retired.close()?;
            }
            slot.retired.clear();
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), UsageError> {
        if self.closed {
            return Err(UsageError::ResourceClosed {
                label: self.label.clone(),
            }
            .logged());
        }
        Ok(())
    }

    /// Makes room for `blocks` more blocks in the current slot.
    ///
    /// When the slot is full a larger buffer replaces it. The outgrown buffer is
    /// retired rather than closed: slices handed out earlier this frame still
    /// point into it.
    fn reserve(&mut self, device: &GpuDevice, blocks: u64) -> Result<(), RenderError> {
        let slot = &mut self.slots[self.cursor];
        if slot.used + blocks <= slot.capacity {
            return Ok(());
        }

        let capacity = (slot.capacity * 2).max(blocks);
        let buffer = device.buffers().create(
            &slot_label(&self.label, self.cursor),
            RING_USAGE,
            capacity * self.stride,
        )?;
        log::debug!(
            "Ring allocator '{}' slot {} grew to {capacity} blocks",
            self.label,
            self.cursor
        );

        let outgrown = std::mem::replace(&mut slot.buffer, buffer);
        slot.retired.push(outgrown);
        slot.capacity = capacity;
        slot.used = 0;
        Ok(())
    }

    fn write_block<T: UniformBlock + ?Sized>(
        &mut self,
        device: &GpuDevice,
        value: &T,
    ) -> Result<BufferSlice, RenderError> {
        let mut writer = Std140Writer::with_buffer(std::mem::take(&mut self.scratch));
        value.write_std140(&mut writer);
        let mut bytes = writer.into_bytes();
        if bytes.len() as u64 > self.block_size {
            let written = bytes.len();
            self.scratch = bytes;
            return Err(UsageError::UniformBlockOverflow {
                label: self.label.clone(),
                written,
                capacity: self.block_size as usize,
            }
            .logged()
            .into());
        }
        bytes.resize(self.block_size as usize, 0);
        self.scratch = bytes;

        let slot = &mut self.slots[self.cursor];
        let offset = slot.used * self.stride;
        device
            .buffers()
            .write(&mut slot.buffer, offset, &self.scratch)?;
        slot.used += 1;
        Ok(slot.buffer.slice(offset, self.block_size)?)
    }
}

impl Drop for RingUniformAllocator {
    fn drop(&mut self) {
        if !self.closed {
            log::warn!(
                "Ring allocator '{}' dropped without close(); {} backing buffer(s) leaked",
                self.label,
                self.slots.len()
            );
        }
    }
}
