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

//! Creation, mapping and transfer operations for [`BufferResource`]s.
//!
//! The factory decides once, from the capability set, whether CPU-visible buffers
//! get immutable storage with a persistent mapping or mutable storage that is
//! mapped on demand. There is no per-buffer fallback: if the driver denies the
//! persistent path, creation fails.

use super::resource::{BufferInfo, PersistentMapping};
use super::{BufferResource, BufferUsage, MappedView};
use crate::backend::{BufferBackendKind, RawBufferBackend};
use crate::capability::CapabilitySet;
use crate::driver::{BufferSource, MapAccess};
use crate::error::{DriverError, RenderError, UsageError};
use crate::thread::RenderThread;
use std::cell::Cell;
use std::rc::Rc;

/// Creates and operates on [`BufferResource`]s through the selected backend.
#[derive(Debug)]
pub struct BufferResourceFactory {
    backend: Rc<dyn RawBufferBackend>,
    persistent_storage: bool,
    pass_open: Rc<Cell<bool>>,
    thread: RenderThread,
}

impl BufferResourceFactory {
    /// Creates a factory. `pass_open` is the device's render-pass flag: buffer
    /// commands are refused while a pass is recording.
    pub fn new(
        backend: Rc<dyn RawBufferBackend>,
        capabilities: &CapabilitySet,
        pass_open: Rc<Cell<bool>>,
        thread: RenderThread,
    ) -> Self {
        Self {
            backend,
            persistent_storage: capabilities.buffer_storage(),
            pass_open,
            thread,
        }
    }

    /// Returns `true` if CPU-visible buffers get persistent mappings.
    pub fn uses_persistent_storage(&self) -> bool {
        self.persistent_storage
    }

    /// The strategy of the underlying backend.
    pub fn backend_kind(&self) -> BufferBackendKind {
        self.backend.kind()
    }

    /// Creates an uninitialized buffer of `size` bytes.
    pub fn create(
        &self,
        label: &str,
        usage: BufferUsage,
        size: u64,
    ) -> Result<BufferResource, RenderError> {
        if size == 0 {
            return Err(UsageError::ZeroSizedBuffer {
                label: label.to_owned(),
            }
            .logged()
            .into());
        }
        self.allocate(label, usage, BufferSource::Size(size))
    }

    /// Creates a buffer initialized with `data`.
    pub fn create_init(
        &self,
        label: &str,
        usage: BufferUsage,
        data: &[u8],
    ) -> Result<BufferResource, RenderError> {
        if data.is_empty() {
            return Err(UsageError::EmptyBufferSource {
                label: label.to_owned(),
            }
            .logged()
            .into());
        }
        self.allocate(label, usage, BufferSource::Data(data))
    }

    fn allocate(
        &self,
        label: &str,
        usage: BufferUsage,
        source: BufferSource<'_>,
    ) -> Result<BufferResource, RenderError> {
        self.thread.assert_current();
        self.ensure_no_pass()?;

        let size = source.len();
        let handle = self.backend.create_buffer();
        let info = BufferInfo {
            handle,
            label: label.to_owned(),
            usage,
            size,
            closed: Cell::new(false),
        };

        if !(self.persistent_storage && usage.is_cpu_visible()) {
            if let Err(reason) = self.backend.upload_full(handle, source, usage) {
                self.backend.delete_buffer(handle);
                return Err(DriverError::BufferAllocation {
                    label: label.to_owned(),
                    size,
                    reason,
                }
                .logged()
                .into());
            }
            log::trace!("Created buffer '{label}' ({size} bytes, {usage:?})");
            return Ok(BufferResource::new(info, Rc::clone(&self.backend), None));
        }

        if let Err(reason) = self.backend.allocate_storage(handle, source, usage) {
            self.backend.delete_buffer(handle);
            return Err(DriverError::BufferAllocation {
                label: label.to_owned(),
                size,
                reason,
            }
            .logged()
            .into());
        }

        let access = usage.persistent_map_access();
        let Some(ptr) = self.backend.map_range(handle, 0, size, access, usage) else {
            self.backend.delete_buffer(handle);
            return Err(DriverError::MapDenied {
                label: label.to_owned(),
                offset: 0,
                length: size,
            }
            .logged()
            .into());
        };

        log::trace!("Created persistently mapped buffer '{label}' ({size} bytes, {usage:?})");
        Ok(BufferResource::new(
            info,
            Rc::clone(&self.backend),
            Some(PersistentMapping { ptr, access }),
        ))
    }

    /// Maps `length` bytes of `resource` starting at `offset`.
    ///
    /// `access` must contain [`MapAccess::READ`], [`MapAccess::WRITE`] or both, and
    /// the buffer's usage must allow them. A persistently mapped buffer yields a
    /// sub-view of its existing mapping; any other buffer is mapped now and unmapped
    /// when the view closes.
    pub fn map_range<'a>(
        &self,
        resource: &'a mut BufferResource,
        offset: u64,
        length: u64,
        access: MapAccess,
    ) -> Result<MappedView<'a>, RenderError> {
        self.thread.assert_current();
        self.ensure_no_pass()?;
        resource.ensure_open()?;

        let wants_read = access.contains(MapAccess::READ);
        let wants_write = access.contains(MapAccess::WRITE);
        if !wants_read && !wants_write {
            return Err(UsageError::NoMapAccess {
                label: resource.label().to_owned(),
            }
            .logged()
            .into());
        }
        if wants_read {
            require_usage(resource, BufferUsage::MAP_READ)?;
        }
        if wants_write {
            require_usage(resource, BufferUsage::MAP_WRITE)?;
        }
        resource.check_range(offset, length)?;
        if resource.mapped {
            return Err(UsageError::AlreadyMapped {
                label: resource.label().to_owned(),
            }
            .logged()
            .into());
        }

        if let Some(mapping) = resource.persistent {
            // SAFETY: the persistent mapping covers the whole buffer and the range
            // was bounds-checked above.
            let ptr = unsafe { mapping.ptr.add(offset as usize) };
            let view_access = mapping.access & (access | MapAccess::FLUSH_EXPLICIT);
            return Ok(MappedView::new(resource, ptr, offset, length, view_access, true));
        }

        let mut map_access = MapAccess::empty();
        if wants_read {
            map_access |= MapAccess::READ;
        }
        if wants_write {
            map_access |= MapAccess::WRITE | MapAccess::FLUSH_EXPLICIT;
        }

        let handle = resource.handle();
        let usage = resource.usage();
        let Some(ptr) = self
            .backend
            .map_range(handle, offset, length, map_access, usage)
        else {
            return Err(DriverError::MapDenied {
                label: resource.label().to_owned(),
                offset,
                length,
            }
            .logged()
            .into());
        };

        resource.mapped = true;
        Ok(MappedView::new(resource, ptr, offset, length, map_access, false))
    }

    /// Writes `data` into `resource` at `offset`.
    ///
    /// Persistently mapped, CPU-writable buffers are written through their mapping;
    /// other buffers need [`BufferUsage::COPY_DST`] and take a sub-upload.
    pub fn write(
        &self,
        resource: &mut BufferResource,
        offset: u64,
        data: &[u8],
    ) -> Result<(), RenderError> {
        self.thread.assert_current();
        self.ensure_no_pass()?;
        resource.ensure_open()?;
        resource.check_range(offset, data.len() as u64)?;
        if data.is_empty() {
            return Ok(());
        }

        match resource.persistent {
            Some(mapping) if mapping.access.contains(MapAccess::WRITE) => {
                // SAFETY: the mapping covers the whole buffer, the range was checked
                // above, and `&mut resource` rules out a concurrent view.
                unsafe {
                    std::ptr::copy_nonoverlapping(
                        data.as_ptr(),
                        mapping.ptr.as_ptr().add(offset as usize),
                        data.len(),
                    );
                }
                self.backend.flush_mapped_range(
                    resource.handle(),
                    offset,
                    data.len() as u64,
                    resource.usage(),
                );
            }
            _ => {
                require_usage(resource, BufferUsage::COPY_DST)?;
                self.backend
                    .upload_sub(resource.handle(), offset, data, resource.usage());
            }
        }
        Ok(())
    }

    /// Copies `length` bytes from `src` to `dst`.
    pub fn copy(
        &self,
        src: &BufferResource,
        dst: &BufferResource,
        src_offset: u64,
        dst_offset: u64,
        length: u64,
    ) -> Result<(), RenderError> {
        self.thread.assert_current();
        self.ensure_no_pass()?;
        src.ensure_open()?;
        dst.ensure_open()?;
        require_usage(src, BufferUsage::COPY_SRC)?;
        require_usage(dst, BufferUsage::COPY_DST)?;
        src.check_range(src_offset, length)?;
        dst.check_range(dst_offset, length)?;

        self.backend
            .copy_range(src.handle(), dst.handle(), src_offset, dst_offset, length);
        Ok(())
    }

    fn ensure_no_pass(&self) -> Result<(), UsageError> {
        if self.pass_open.get() {
            return Err(UsageError::RenderPassOpen.logged());
        }
        Ok(())
    }
}

fn require_usage(resource: &BufferResource, required: BufferUsage) -> Result<(), UsageError> {
    if !resource.usage().contains(required) {
        return Err(UsageError::MissingUsage {
            label: resource.label().to_owned(),
            required,
        }
        .logged());
    }
    Ok(())
}
