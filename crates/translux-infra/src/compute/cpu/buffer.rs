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

//! Host storage of a buffer and its mapping guard.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use translux_core::renderer::api::{BufferUsage, MappedRange};

/// Storage is kept in `u64` words so every `Pod` type up to 8-byte alignment
/// can be viewed in place.
#[derive(Debug)]
pub(crate) struct CpuBufferEntry {
    pub(crate) label: String,
    pub(crate) size: u64,
    pub(crate) usage: BufferUsage,
    data: Mutex<Vec<u64>>,
    mapped: AtomicBool,
    /// Written by a dispatch since the last barrier.
    pending_writes: AtomicBool,
}

impl CpuBufferEntry {
    pub(crate) fn new(label: String, size: u64, usage: BufferUsage) -> Self {
        let words = (size as usize).div_ceil(std::mem::size_of::<u64>());
        Self {
            label,
            size,
            usage,
            data: Mutex::new(vec![0u64; words]),
            mapped: AtomicBool::new(false),
            pending_writes: AtomicBool::new(false),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Vec<u64>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_mapped(&self) -> bool {
        self.mapped.load(Ordering::Acquire)
    }

    /// Marks the buffer mapped; returns `false` if it already was.
    pub(crate) fn try_begin_map(&self) -> bool {
        !self.mapped.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn has_pending_writes(&self) -> bool {
        self.pending_writes.load(Ordering::Acquire)
    }

    pub(crate) fn mark_written(&self) {
        self.pending_writes.store(true, Ordering::Release);
    }

    pub(crate) fn make_visible(&self) {
        self.pending_writes.store(false, Ordering::Release);
    }
}

/// The `size`-byte prefix of a word vector.
pub(crate) fn bytes_of(words: &[u64], size: u64) -> &[u8] {
    &bytemuck::cast_slice::<u64, u8>(words)[..size as usize]
}

/// The writable `size`-byte prefix of a word vector.
pub(crate) fn bytes_of_mut(words: &mut [u64], size: u64) -> &mut [u8] {
    &mut bytemuck::cast_slice_mut::<u64, u8>(words)[..size as usize]
}

/// Holds the buffer's words while mapped and hands them back on drop.
pub(crate) struct CpuMappedRange {
    entry: Arc<CpuBufferEntry>,
    words: Vec<u64>,
}

impl CpuMappedRange {
    /// Moves the storage out of `entry`. The caller has already flagged it mapped.
    pub(crate) fn take(entry: Arc<CpuBufferEntry>) -> Self {
        let words = std::mem::take(&mut *entry.lock());
        Self { entry, words }
    }
}

impl MappedRange for CpuMappedRange {
    fn bytes(&self) -> &[u8] {
        bytes_of(&self.words, self.entry.size)
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        bytes_of_mut(&mut self.words, self.entry.size)
    }
}

impl Drop for CpuMappedRange {
    fn drop(&mut self) {
        *self.entry.lock() = std::mem::take(&mut self.words);
        self.entry.mapped.store(false, Ordering::Release);
        log::trace!("CpuComputeDevice: Unmapped buffer '{}'", self.entry.label);
    }
}
