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

//! Defines the `ComputeDevice` trait, the execution-context abstraction.

use crate::renderer::api::{
    BufferDescriptor, BufferId, ComputeDispatch, MapMode, MappedBuffer, TimerQueryId,
};
use crate::renderer::error::ResourceError;
use std::fmt::Debug;
use std::time::Duration;

/// A trait representing an abstract device that owns buffers, runs compute
/// kernels and measures elapsed time on its own timeline.
///
/// Submission is single-threaded: the caller records one operation at a time.
/// Results of a [`dispatch`](Self::dispatch) only become visible to later
/// dispatches and to host mappings after a [`memory_barrier`](Self::memory_barrier).
/// Backends must reject reads of buffers written since the last barrier with
/// [`ResourceError::MissingBarrier`].
pub trait ComputeDevice: Send + Sync + Debug + 'static {
    // --- Buffer Management ---

    /// Creates a zero-initialized buffer.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Creates a buffer and fills it with `data`.
    ///
    /// `data` must be exactly `descriptor.size` bytes long.
    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError>;

    /// Destroys a buffer and releases its memory.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Size of a buffer in bytes.
    fn buffer_size(&self, id: BufferId) -> Result<u64, ResourceError>;

    /// Queues a host write of `data` at `offset` bytes. Requires `COPY_DST`.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Maps a buffer for host access. The returned guard unmaps on drop.
    fn map_buffer(&self, id: BufferId, mode: MapMode) -> Result<MappedBuffer<'_>, ResourceError>;

    // --- Execution ---

    /// Runs a kernel over the dispatch grid.
    fn dispatch(&self, dispatch: &ComputeDispatch<'_>) -> Result<(), ResourceError>;

    /// Makes every write of previous dispatches visible to subsequent work.
    fn memory_barrier(&self);

    // --- Timing ---

    /// Opens an elapsed-time query.
    fn begin_timer_query(&self, label: &str) -> TimerQueryId;

    /// Closes an elapsed-time query.
    fn end_timer_query(&self, id: TimerQueryId) -> Result<(), ResourceError>;

    /// Returns the measured duration once available, `None` while pending.
    fn poll_timer_query(&self, id: TimerQueryId) -> Result<Option<Duration>, ResourceError>;

    /// Blocks by polling until the query result is available.
    ///
    /// There is no timeout; a query that was never ended spins forever on a
    /// real device, so callers must pair it with [`end_timer_query`](Self::end_timer_query).
    fn wait_timer_query(&self, id: TimerQueryId) -> Result<Duration, ResourceError> {
        loop {
            if let Some(elapsed) = self.poll_timer_query(id)? {
                return Ok(elapsed);
            }
            std::hint::spin_loop();
        }
    }

    // --- Introspection ---

    /// Human-readable backend name.
    fn adapter_name(&self) -> String;
}
