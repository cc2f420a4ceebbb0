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

//! Small helpers shared by the lanes for buffer bookkeeping.

use bytemuck::Pod;
use std::sync::Arc;
use translux_core::lane::{LaneContext, LaneError};
use translux_core::renderer::{
    BufferDescriptor, BufferId, BufferUsage, ComputeDevice, MapMode, ResourceError,
};

/// Fetches the device from the context.
pub(crate) fn device(ctx: &LaneContext) -> Result<Arc<dyn ComputeDevice>, LaneError> {
    ctx.require::<Arc<dyn ComputeDevice>>("Arc<dyn ComputeDevice>")
        .cloned()
}

/// Creates a buffer holding `count` elements of `T`. Zero-sized requests
/// still allocate one element so the handle can be bound.
pub(crate) fn create_array<T: Pod>(
    device: &dyn ComputeDevice,
    label: &str,
    count: usize,
    usage: BufferUsage,
) -> Result<BufferId, ResourceError> {
    let size = (count.max(1) * std::mem::size_of::<T>()) as u64;
    device.create_buffer(&BufferDescriptor::new(label, size, usage))
}

/// Creates a buffer initialized with `data`.
pub(crate) fn create_with_data<T: Pod>(
    device: &dyn ComputeDevice,
    label: &str,
    data: &[T],
    usage: BufferUsage,
) -> Result<BufferId, ResourceError> {
    let bytes: &[u8] = bytemuck::cast_slice(data);
    device.create_buffer_with_data(
        &BufferDescriptor::new(label, bytes.len() as u64, usage),
        bytes,
    )
}

/// Makes sure `slot` holds a buffer with room for `count` elements,
/// recreating it when it is too small. Returns the handle.
pub(crate) fn ensure_array<T: Pod>(
    device: &dyn ComputeDevice,
    slot: &mut Option<BufferId>,
    label: &str,
    count: usize,
    usage: BufferUsage,
) -> Result<BufferId, ResourceError> {
    let needed = (count.max(1) * std::mem::size_of::<T>()) as u64;
    if let Some(id) = slot.take() {
        if device.buffer_size(id)? >= needed {
            *slot = Some(id);
            return Ok(id);
        }
        device.destroy_buffer(id)?;
        log::debug!("Growing buffer '{label}' to {needed} bytes");
    }
    let id = create_array::<T>(device, label, count, usage)?;
    *slot = Some(id);
    Ok(id)
}

/// Destroys the buffer in `slot`, if any, logging failures.
pub(crate) fn release(device: &dyn ComputeDevice, slot: &mut Option<BufferId>) {
    if let Some(id) = slot.take() {
        if let Err(e) = device.destroy_buffer(id) {
            log::warn!("Failed to destroy buffer {id:?}: {e}");
        }
    }
}

/// Copies a buffer back to the host. The buffer must have been created
/// with `MAP_READ` and every write to it must be followed by a barrier.
pub fn read_back<T: Pod>(device: &dyn ComputeDevice, id: BufferId) -> Result<Vec<T>, ResourceError> {
    let mapped = device.map_buffer(id, MapMode::Read)?;
    mapped.to_vec::<T>()
}
