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

//! Owned GPU buffers and the non-owning slices used to bind them.

use super::BufferUsage;
use crate::backend::RawBufferBackend;
use crate::driver::{BufferHandle, MapAccess};
use crate::error::UsageError;
use std::cell::Cell;
use std::ops::Range;
use std::ptr::NonNull;
use std::rc::Rc;

/// Metadata shared between a [`BufferResource`] and the slices cut from it.
#[derive(Debug)]
pub(crate) struct BufferInfo {
    pub(crate) handle: BufferHandle,
    pub(crate) label: String,
    pub(crate) usage: BufferUsage,
    pub(crate) size: u64,
    pub(crate) closed: Cell<bool>,
}

/// A host pointer to the whole buffer, valid until the buffer is closed.
#[derive(Debug, Clone, Copy)]
pub(super) struct PersistentMapping {
    pub(super) ptr: NonNull<u8>,
    pub(super) access: MapAccess,
}

/// One GPU buffer, owned exclusively.
///
/// The owner must call [`close`](BufferResource::close) once all GPU work that
/// references the buffer is done. Dropping an open buffer leaks its driver storage
/// and logs a warning.
#[derive(Debug)]
pub struct BufferResource {
    pub(super) info: Rc<BufferInfo>,
    pub(super) backend: Rc<dyn RawBufferBackend>,
    pub(super) persistent: Option<PersistentMapping>,
    /// An on-demand mapping is active.
    pub(super) mapped: bool,
}

impl BufferResource {
    pub(super) fn new(
        info: BufferInfo,
        backend: Rc<dyn RawBufferBackend>,
        persistent: Option<PersistentMapping>,
    ) -> Self {
        Self {
            info: Rc::new(info),
            backend,
            persistent,
            mapped: false,
        }
    }

    /// The debug label given at creation.
    pub fn label(&self) -> &str {
        &self.info.label
    }

    /// The driver handle.
    pub fn handle(&self) -> BufferHandle {
        self.info.handle
    }

    /// The declared usage flags.
    pub fn usage(&self) -> BufferUsage {
        self.info.usage
    }

    /// The size in bytes.
    pub fn size(&self) -> u64 {
        self.info.size
    }

    /// Returns `true` once [`close`](Self::close) has succeeded.
    pub fn is_closed(&self) -> bool {
        self.info.closed.get()
    }

    /// Returns `true` if the buffer holds a persistent mapping.
    pub fn is_persistently_mapped(&self) -> bool {
        self.persistent.is_some()
    }

    /// The byte range covered by the persistent mapping, if any.
    pub fn persistent_range(&self) -> Option<Range<u64>> {
        self.persistent.map(|_| 0..self.info.size)
    }

    /// Returns `true` while an on-demand [`MappedView`](super::MappedView) is open.
    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    /// A non-owning reference to `length` bytes starting at `offset`.
    pub fn slice(&self, offset: u64, length: u64) -> Result<BufferSlice, UsageError> {
        self.ensure_open()?;
        self.check_range(offset, length)?;
        Ok(BufferSlice {
            buffer: Rc::clone(&self.info),
            offset,
            length,
        })
    }

    /// A non-owning reference to the whole buffer.
    pub fn slice_all(&self) -> Result<BufferSlice, UsageError> {
        self.ensure_open()?;
        Ok(BufferSlice {
            buffer: Rc::clone(&self.info),
            offset: 0,
            length: self.info.size,
        })
    }

    /// Releases the buffer.
    ///
    /// A persistent mapping is released before the handle. Calling `close` twice
    /// is an error.
    pub fn close(&mut self) -> Result<(), UsageError> {
        if self.is_closed() {
            return Err(UsageError::AlreadyClosed {
                label: self.info.label.clone(),
            }
            .logged());
        }

        if self.persistent.take().is_some() || self.mapped {
            self.backend.unmap(self.info.handle, self.info.usage);
            self.mapped = false;
        }
        self.backend.delete_buffer(self.info.handle);
        self.info.closed.set(true);

        log::debug!("Closed buffer '{}' ({:?})", self.info.label, self.info.handle);
        Ok(())
    }

    pub(super) fn ensure_open(&self) -> Result<(), UsageError> {
        if self.is_closed() {
            return Err(UsageError::ResourceClosed {
                label: self.info.label.clone(),
            }
            .logged());
        }
        Ok(())
    }

    pub(super) fn check_range(&self, offset: u64, length: u64) -> Result<(), UsageError> {
        match offset.checked_add(length) {
            Some(end) if end <= self.info.size => Ok(()),
            _ => Err(UsageError::OutOfBounds {
                label: self.info.label.clone(),
                offset,
                length,
                size: self.info.size,
            }
            .logged()),
        }
    }
}

impl Drop for BufferResource {
    fn drop(&mut self) {
        if !self.is_closed() {
            log::warn!(
                "Buffer '{}' ({:?}) dropped without close(); its driver storage is leaked",
                self.info.label,
                self.info.handle
            );
        }
    }
}

/// A byte range of a buffer, used to bind it to a render pass.
///
/// A slice does not own the buffer. Binding a slice whose buffer has since been
/// closed is reported when the pass validates its bindings.
#[derive(Debug, Clone)]
pub struct BufferSlice {
    buffer: Rc<BufferInfo>,
    offset: u64,
    length: u64,
}

impl BufferSlice {
    /// The driver handle of the underlying buffer.
    pub fn handle(&self) -> BufferHandle {
        self.buffer.handle
    }

    /// The label of the underlying buffer.
    pub fn label(&self) -> &str {
        &self.buffer.label
    }

    /// The usage flags of the underlying buffer.
    pub fn usage(&self) -> BufferUsage {
        self.buffer.usage
    }

    /// Start of the slice in bytes.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Length of the slice in bytes.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Returns `true` if the underlying buffer has been closed.
    pub fn is_closed(&self) -> bool {
        self.buffer.closed.get()
    }
}

impl PartialEq for BufferSlice {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.buffer, &other.buffer)
            && self.offset == other.offset
            && self.length == other.length
    }
}

impl Eq for BufferSlice {}
