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

//! Buffer usage flags and the driver parameters derived from them.

use crate::driver::{MapAccess, StorageFlags, UsageHint};
use bitflags::bitflags;

bitflags! {
    /// A set of flags describing how a buffer will be used.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// The buffer can be mapped for reading.
        const MAP_READ = 1 << 0;
        /// The buffer can be mapped for writing.
        const MAP_WRITE = 1 << 1;
        /// Prefer host memory for the backing store.
        const HINT_CLIENT_STORAGE = 1 << 2;
        /// The buffer can be the destination of writes and copies.
        const COPY_DST = 1 << 3;
        /// The buffer can be the source of copies.
        const COPY_SRC = 1 << 4;
        /// The buffer can be used as a vertex buffer.
        const VERTEX = 1 << 5;
        /// The buffer can be used as an index buffer.
        const INDEX = 1 << 6;
        /// The buffer can be bound as a uniform block.
        const UNIFORM = 1 << 7;
        /// The buffer can be bound as a uniform texel buffer.
        const UNIFORM_TEXEL_BUFFER = 1 << 8;
    }
}

impl BufferUsage {
    /// Returns `true` if the CPU needs access to the buffer's memory.
    ///
    /// These are the buffers that get persistent mappings when the driver
    /// supports persistent storage.
    pub fn is_cpu_visible(self) -> bool {
        self.intersects(BufferUsage::MAP_READ | BufferUsage::MAP_WRITE)
    }

    /// The hint passed with mutable allocations.
    pub fn usage_hint(self) -> UsageHint {
        if self.contains(BufferUsage::MAP_READ) {
            UsageHint::StreamRead
        } else if self.intersects(BufferUsage::MAP_WRITE | BufferUsage::HINT_CLIENT_STORAGE) {
            UsageHint::DynamicDraw
        } else {
            UsageHint::StaticDraw
        }
    }

    /// The flags passed with immutable storage allocations.
    pub fn storage_flags(self) -> StorageFlags {
        let mut flags = StorageFlags::empty();
        if self.contains(BufferUsage::MAP_READ) {
            flags |= StorageFlags::MAP_READ | StorageFlags::PERSISTENT;
        }
        if self.contains(BufferUsage::MAP_WRITE) {
            flags |= StorageFlags::MAP_WRITE | StorageFlags::PERSISTENT;
        }
        if self.contains(BufferUsage::COPY_DST) {
            flags |= StorageFlags::DYNAMIC_STORAGE;
        }
        if self.contains(BufferUsage::HINT_CLIENT_STORAGE) {
            flags |= StorageFlags::CLIENT_STORAGE;
        }
        flags
    }

    /// The access used for a persistent mapping of a buffer with this usage.
    pub fn persistent_map_access(self) -> MapAccess {
        let mut access = MapAccess::PERSISTENT;
        if self.contains(BufferUsage::MAP_READ) {
            access |= MapAccess::READ;
        }
        if self.contains(BufferUsage::MAP_WRITE) {
            access |= MapAccess::WRITE | MapAccess::FLUSH_EXPLICIT;
        }
        access
    }
}
