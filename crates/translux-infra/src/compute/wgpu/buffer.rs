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

//! Device buffers and their host mappings.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use translux_core::renderer::api::{BufferUsage, MappedRange};

/// Every allocation is a multiple of this many bytes.
const ALLOCATION_ALIGNMENT: u64 = 16;

/// Smallest allocation. Empty buffers are bound with this many zeroed bytes,
/// enough for one element of any program's runtime array.
const MIN_ALLOCATION: u64 = 64;

#[derive(Debug)]
pub(crate) struct WgpuBufferEntry {
    pub(crate) label: String,
    /// Size requested by the caller. The allocation may be larger.
    pub(crate) size: u64,
    pub(crate) usage: BufferUsage,
    pub(crate) buffer: wgpu::Buffer,
    mapped: AtomicBool,
    pending_writes: AtomicBool,
}

impl WgpuBufferEntry {
    pub(crate) fn new(label: String, size: u64, usage: BufferUsage, buffer: wgpu::Buffer) -> Self {
        Self {
            label,
            size,
            usage,
            buffer,
            mapped: AtomicBool::new(false),
            pending_writes: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_mapped(&self) -> bool {
        self.mapped.load(Ordering::Acquire)
    }

    /// Marks the buffer mapped; returns `false` if it already was.
    pub(crate) fn try_begin_map(&self) -> bool {
        !self.mapped.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn end_map(&self) {
        self.mapped.store(false, Ordering::Release);
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

    /// Range bound to shaders: the logical size rounded up to a word, so
    /// `arrayLength` sees the same element count as the host.
    pub(crate) fn binding_size(&self) -> NonZeroU64 {
        NonZeroU64::new(self.size.next_multiple_of(4))
            .unwrap_or(NonZeroU64::new(MIN_ALLOCATION).unwrap_or(NonZeroU64::MIN))
    }
}

/// Bytes actually allocated for a buffer of `size` bytes.
pub(crate) fn allocation_size(size: u64) -> u64 {
    size.max(MIN_ALLOCATION).next_multiple_of(ALLOCATION_ALIGNMENT)
}

/// A host copy of a buffer. Write mappings upload the copy when dropped.
pub(crate) struct WgpuMappedRange {
    entry: Arc<WgpuBufferEntry>,
    words: Vec<u64>,
    writeback: Option<wgpu::Queue>,
}

impl WgpuMappedRange {
    /// `words` holds the buffer's whole allocation. The caller has already
    /// flagged the entry mapped.
    pub(crate) fn new(
        entry: Arc<WgpuBufferEntry>,
        words: Vec<u64>,
        writeback: Option<wgpu::Queue>,
    ) -> Self {
        Self {
            entry,
            words,
            writeback,
        }
    }
}

impl MappedRange for WgpuMappedRange {
    fn bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u64, u8>(&self.words)[..self.entry.size as usize]
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<u64, u8>(&mut self.words)[..self.entry.size as usize]
    }
}

impl Drop for WgpuMappedRange {
    fn drop(&mut self) {
        if let Some(queue) = self.writeback.take() {
            let len = self.entry.size.next_multiple_of(4) as usize;
            queue.write_buffer(
                &self.entry.buffer,
                0,
                &bytemuck::cast_slice::<u64, u8>(&self.words)[..len],
            );
        }
        self.entry.end_map();
        log::trace!("WgpuComputeDevice: Unmapped buffer '{}'", self.entry.label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_size_is_padded() {
        assert_eq!(allocation_size(0), 64);
        assert_eq!(allocation_size(4), 64);
        assert_eq!(allocation_size(64), 64);
        assert_eq!(allocation_size(65), 80);
        assert_eq!(allocation_size(1031), 1040);
    }
}
