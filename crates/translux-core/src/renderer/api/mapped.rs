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

//! Scoped host access to a device buffer.
//!
//! [`MappedBuffer`] is the only way to read results back on the host. The
//! buffer stays mapped exactly as long as the guard lives; dropping it (on
//! any exit path, including early returns and `?`) unmaps the buffer.

use crate::renderer::api::buffer::{BufferId, BufferUsage, MapMode};
use crate::renderer::error::ResourceError;
use bytemuck::Pod;
use std::fmt;

/// Backend side of a mapping. Implementations unmap the buffer in `Drop`.
pub trait MappedRange {
    /// The mapped bytes.
    fn bytes(&self) -> &[u8];
    /// The mapped bytes, writable.
    fn bytes_mut(&mut self) -> &mut [u8];
}

/// A live mapping of a buffer. Unmaps on drop.
pub struct MappedBuffer<'a> {
    id: BufferId,
    mode: MapMode,
    range: Box<dyn MappedRange + 'a>,
}

impl<'a> MappedBuffer<'a> {
    /// Wraps a backend mapping. Called by device implementations.
    pub fn new(id: BufferId, mode: MapMode, range: Box<dyn MappedRange + 'a>) -> Self {
        Self { id, mode, range }
    }

    /// The mapped buffer.
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// The access mode of the mapping.
    pub fn mode(&self) -> MapMode {
        self.mode
    }

    /// Mapped size in bytes.
    pub fn len(&self) -> usize {
        self.range.bytes().len()
    }

    /// `true` for a zero-sized mapping.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw mapped bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.range.bytes()
    }

    /// Views the mapping as a slice of `T`.
    pub fn as_slice<T: Pod>(&self) -> Result<&[T], ResourceError> {
        let bytes = self.range.bytes();
        bytemuck::try_cast_slice(bytes).map_err(|_| ResourceError::SizeMismatch {
            expected: round_down(bytes.len(), std::mem::size_of::<T>()),
            actual: bytes.len() as u64,
        })
    }

    /// Views the mapping as a mutable slice of `T`. Requires [`MapMode::Write`].
    pub fn as_slice_mut<T: Pod>(&mut self) -> Result<&mut [T], ResourceError> {
        if self.mode != MapMode::Write {
            return Err(ResourceError::UsageViolation {
                label: format!("{:?}", self.id),
                required: BufferUsage::MAP_WRITE,
            });
        }
        let bytes = self.range.bytes_mut();
        let len = bytes.len();
        bytemuck::try_cast_slice_mut(bytes).map_err(|_| ResourceError::SizeMismatch {
            expected: round_down(len, std::mem::size_of::<T>()),
            actual: len as u64,
        })
    }

    /// Copies the mapping out as a `Vec<T>`.
    pub fn to_vec<T: Pod>(&self) -> Result<Vec<T>, ResourceError> {
        self.as_slice::<T>().map(<[T]>::to_vec)
    }
}

fn round_down(len: usize, elem: usize) -> u64 {
    if elem == 0 {
        return len as u64;
    }
    (len / elem * elem) as u64
}

impl fmt::Debug for MappedBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedBuffer")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("len", &self.len())
            .finish()
    }
}
