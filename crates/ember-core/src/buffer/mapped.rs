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

//! Host views into buffer memory.

use super::BufferResource;
use crate::driver::MapAccess;
use crate::error::UsageError;
use std::ptr::NonNull;

/// A window of host memory backed by a buffer.
///
/// Obtained from [`BufferResourceFactory::map_range`](super::BufferResourceFactory::map_range).
/// The view borrows the buffer mutably, so the buffer can't be closed or mapped again
/// while it exists. [`close`](MappedView::close) consumes the view; dropping it has
/// the same effect.
#[derive(Debug)]
pub struct MappedView<'a> {
    resource: &'a mut BufferResource,
    ptr: NonNull<u8>,
    offset: u64,
    length: u64,
    access: MapAccess,
    persistent: bool,
    finished: bool,
}

impl<'a> MappedView<'a> {
    /// `ptr` must address `length` bytes that stay valid until the view finishes.
    pub(super) fn new(
        resource: &'a mut BufferResource,
        ptr: NonNull<u8>,
        offset: u64,
        length: u64,
        access: MapAccess,
        persistent: bool,
    ) -> Self {
        Self {
            resource,
            ptr,
            offset,
            length,
            access,
            persistent,
            finished: false,
        }
    }

    /// Offset of the view within the buffer.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Length of the view in bytes.
    pub fn len(&self) -> usize {
        self.length as usize
    }

    /// Returns `true` if the view covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns `true` if this is a sub-view of a persistent mapping.
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// The mapped bytes.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr` addresses `length` mapped bytes (constructor contract), and
        // the mutable borrow of the resource keeps the mapping alive and unaliased.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len()) }
    }

    /// The mapped bytes, writable. Fails if the view was opened read-only.
    pub fn as_mut_slice(&mut self) -> Result<&mut [u8], UsageError> {
        if !self.access.contains(MapAccess::WRITE) {
            return Err(UsageError::ReadOnlyMapping {
                label: self.resource.label().to_owned(),
            }
            .logged());
        }
        // SAFETY: see `as_slice`; `&mut self` makes this the only live reference.
        Ok(unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len()) })
    }

    /// Publishes pending writes and releases the view.
    pub fn close(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        let handle = self.resource.handle();
        let usage = self.resource.usage();
        let backend = &self.resource.backend;

        if self.access.contains(MapAccess::WRITE | MapAccess::FLUSH_EXPLICIT) {
            // Flush ranges are relative to the start of the driver mapping.
            let flush_offset = if self.persistent { self.offset } else { 0 };
            backend.flush_mapped_range(handle, flush_offset, self.length, usage);
        }
        if !self.persistent {
            backend.unmap(handle, usage);
            self.resource.mapped = false;
        }
    }
}

impl Drop for MappedView<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}
