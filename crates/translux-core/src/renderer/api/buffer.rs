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

//! Defines data structures related to device buffer resources.

use crate::translux_flags;
use std::borrow::Cow;

translux_flags! {
    /// A set of flags describing the allowed usages of a [`BufferId`].
    ///
    /// Backends validate every operation against these flags: a buffer bound
    /// to a kernel needs `STORAGE` (or `UNIFORM` for read-only parameters),
    /// a host read-back needs `MAP_READ`, and a queued write needs `COPY_DST`.
    pub struct BufferUsage: u32 {
        /// The buffer can be mapped for reading on the host.
        const MAP_READ = 1 << 0;
        /// The buffer can be mapped for writing on the host.
        const MAP_WRITE = 1 << 1;
        /// The buffer can be the destination of a queued write.
        const COPY_DST = 1 << 2;
        /// The buffer can be bound as a vertex source.
        const VERTEX = 1 << 3;
        /// The buffer can be bound as a read-only uniform block.
        const UNIFORM = 1 << 4;
        /// The buffer can be bound as a storage buffer (read/write from kernels).
        const STORAGE = 1 << 5;
    }
}

/// A descriptor used to create a [`BufferId`].
#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    /// An optional debug label for the buffer.
    pub label: Option<Cow<'a, str>>,
    /// The total size of the buffer in bytes.
    pub size: u64,
    /// A bitmask of [`BufferUsage`] flags describing how the buffer will be used.
    pub usage: BufferUsage,
}

impl<'a> BufferDescriptor<'a> {
    /// Shorthand for a labelled descriptor.
    pub fn new(label: &'a str, size: u64, usage: BufferUsage) -> Self {
        Self {
            label: Some(Cow::Borrowed(label)),
            size,
            usage,
        }
    }

    /// The label, or `"unnamed"`.
    pub fn label_or_default(&self) -> &str {
        self.label.as_deref().unwrap_or("unnamed")
    }
}

/// An opaque handle to a device buffer.
///
/// Returned by [`ComputeDevice::create_buffer`](crate::renderer::ComputeDevice::create_buffer)
/// and used to reference the buffer in all subsequent operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub usize);

/// Host access requested when mapping a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    /// Read the device's results.
    Read,
    /// Fill the buffer from the host.
    Write,
}

impl MapMode {
    /// The usage flag a buffer needs to be mapped in this mode.
    pub const fn required_usage(self) -> BufferUsage {
        match self {
            MapMode::Read => BufferUsage::MAP_READ,
            MapMode::Write => BufferUsage::MAP_WRITE,
        }
    }
}
