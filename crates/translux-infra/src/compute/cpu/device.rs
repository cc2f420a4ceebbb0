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

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use translux_core::renderer::api::{
    BindingAccess, BufferBinding, BufferDescriptor, BufferId, BufferUsage, ComputeDispatch,
    KernelResources, MapMode, MappedBuffer, TimerQueryId, WorkgroupId,
};
use translux_core::renderer::{ComputeDevice, KernelError, ResourceError};

use rayon::prelude::*;

use super::buffer::{bytes_of, bytes_of_mut, CpuBufferEntry, CpuMappedRange};
use crate::compute::timer::TimerQueries;
use crate::compute::validation::{validate_bindings, BindingState};

/// The internal, non-clonable state of the [`CpuComputeDevice`].
#[derive(Debug, Default)]
pub struct CpuDeviceInternal {
    buffers: Mutex<HashMap<BufferId, Arc<CpuBufferEntry>>>,
    next_buffer_id: AtomicUsize,
    timers: TimerQueries,
    max_buffer_size: Option<u64>,

    // Memory tracking
    allocated_bytes: AtomicU64,
    peak_bytes: AtomicU64,
    dispatch_count: AtomicU64,
}

/// A clonable, thread-safe handle to the host reference device.
///
/// Workgroups are split into contiguous chunks that run on the current rayon
/// pool. Each chunk writes into private copies of the writable buffers; the
/// bytes a chunk changed are merged back in chunk order once every chunk is
/// done. Kernels that keep to their own output region therefore give the
/// same result as a sequential run.
#[derive(Clone, Debug, Default)]
pub struct CpuComputeDevice {
    internal: Arc<CpuDeviceInternal>,
}

impl CpuComputeDevice {
    /// Creates a device with no resources.
    pub fn new() -> Self {
        log::info!("CpuComputeDevice: created");
        Self::default()
    }

    /// Creates a device that refuses buffers larger than `limit` bytes,
    /// like a GPU adapter with a bounded allocation size.
    pub fn with_max_buffer_size(limit: u64) -> Self {
        log::info!("CpuComputeDevice: created (max buffer size {limit} bytes)");
        Self {
            internal: Arc::new(CpuDeviceInternal {
                max_buffer_size: Some(limit),
                ..CpuDeviceInternal::default()
            }),
        }
    }

    /// Bytes currently allocated by live buffers.
    pub fn allocated_bytes(&self) -> u64 {
        self.internal.allocated_bytes.load(Ordering::Relaxed)
    }

    /// Highest value [`allocated_bytes`](Self::allocated_bytes) has reached.
    pub fn peak_bytes(&self) -> u64 {
        self.internal.peak_bytes.load(Ordering::Relaxed)
    }

    /// Number of live buffers.
    pub fn buffer_count(&self) -> usize {
        self.buffers().len()
    }

    /// Number of dispatches executed so far.
    pub fn dispatch_count(&self) -> u64 {
        self.internal.dispatch_count.load(Ordering::Relaxed)
    }

    /// Timer queries begun but not yet resolved by a poll.
    pub fn pending_timer_queries(&self) -> usize {
        self.internal.timers.pending()
    }

    fn buffers(&self) -> MutexGuard<'_, HashMap<BufferId, Arc<CpuBufferEntry>>> {
        self.internal
            .buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn entry(&self, id: BufferId) -> Result<Arc<CpuBufferEntry>, ResourceError> {
        self.buffers()
            .get(&id)
            .cloned()
            .ok_or(ResourceError::NotFound { id })
    }

    fn generate_buffer_id(&self) -> BufferId {
        BufferId(self.internal.next_buffer_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Validates every binding of a dispatch and resolves it to its storage.
    fn resolve_bindings(
        &self,
        bindings: &[BufferBinding],
    ) -> Result<Vec<(BufferBinding, Arc<CpuBufferEntry>)>, ResourceError> {
        let buffers = self.buffers();
        validate_bindings(
            bindings,
            |binding| {
                buffers
                    .get(&binding.buffer)
                    .cloned()
                    .ok_or(ResourceError::NotFound { id: binding.buffer })
            },
            |entry| BindingState {
                label: &entry.label,
                usage: entry.usage,
                mapped: entry.is_mapped(),
                pending_writes: entry.has_pending_writes(),
            },
        )
    }

    fn track_allocation(&self, size: u64) {
        let current = self
            .internal
            .allocated_bytes
            .fetch_add(size, Ordering::Relaxed)
            + size;
        self.internal
            .peak_bytes
            .fetch_max(current, Ordering::Relaxed);
    }
}

impl ComputeDevice for CpuComputeDevice {
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        if let Some(limit) = self.internal.max_buffer_size {
            if descriptor.size > limit {
                return Err(ResourceError::TooLarge {
                    size: descriptor.size,
                    limit,
                });
            }
        }
        let id = self.generate_buffer_id();
        let entry = CpuBufferEntry::new(
            descriptor.label_or_default().to_owned(),
            descriptor.size,
            descriptor.usage,
        );
        self.buffers().insert(id, Arc::new(entry));
        self.track_allocation(descriptor.size);

        log::debug!(
            "CpuComputeDevice: Created buffer '{}' with ID: {:?}, size: {} bytes",
            descriptor.label_or_default(),
            id,
            descriptor.size
        );
        Ok(id)
    }

    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError> {
        if data.len() as u64 != descriptor.size {
            return Err(ResourceError::SizeMismatch {
                expected: descriptor.size,
                actual: data.len() as u64,
            });
        }
        let id = self.create_buffer(descriptor)?;
        let entry = self.entry(id)?;
        bytes_of_mut(&mut entry.lock(), entry.size).copy_from_slice(data);
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let entry = self
            .buffers()
            .remove(&id)
            .ok_or(ResourceError::NotFound { id })?;
        self.internal
            .allocated_bytes
            .fetch_sub(entry.size, Ordering::Relaxed);
        log::debug!(
            "CpuComputeDevice: Destroyed buffer '{}' ({:?})",
            entry.label,
            id
        );
        Ok(())
    }

    fn buffer_size(&self, id: BufferId) -> Result<u64, ResourceError> {
        Ok(self.entry(id)?.size)
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let entry = self.entry(id)?;
        if !entry.usage.contains(BufferUsage::COPY_DST) {
            return Err(ResourceError::UsageViolation {
                label: entry.label.clone(),
                required: BufferUsage::COPY_DST,
            });
        }
        if entry.is_mapped() {
            return Err(ResourceError::AlreadyMapped {
                label: entry.label.clone(),
            });
        }
        let len = data.len() as u64;
        let end = offset.checked_add(len).filter(|&end| end <= entry.size);
        let Some(end) = end else {
            return Err(ResourceError::OutOfBounds {
                offset,
                len,
                size: entry.size,
            });
        };
        bytes_of_mut(&mut entry.lock(), entry.size)[offset as usize..end as usize]
            .copy_from_slice(data);
        Ok(())
    }

    fn map_buffer(&self, id: BufferId, mode: MapMode) -> Result<MappedBuffer<'_>, ResourceError> {
        let entry = self.entry(id)?;
        if !entry.usage.contains(mode.required_usage()) {
            return Err(ResourceError::UsageViolation {
                label: entry.label.clone(),
                required: mode.required_usage(),
            });
        }
        if mode == MapMode::Read && entry.has_pending_writes() {
            return Err(ResourceError::MissingBarrier {
                label: entry.label.clone(),
            });
        }
        if !entry.try_begin_map() {
            return Err(ResourceError::AlreadyMapped {
                label: entry.label.clone(),
            });
        }
        log::trace!("CpuComputeDevice: Mapped buffer '{}' ({:?})", entry.label, mode);
        Ok(MappedBuffer::new(
            id,
            mode,
            Box::new(CpuMappedRange::take(entry)),
        ))
    }

    fn dispatch(&self, dispatch: &ComputeDispatch<'_>) -> Result<(), ResourceError> {
        let resolved = self.resolve_bindings(dispatch.bindings)?;
        for (binding, entry) in &resolved {
            if binding.access == BindingAccess::ReadWrite {
                entry.mark_written();
            }
        }

        let mut storage: Vec<MutexGuard<'_, Vec<u64>>> =
            resolved.iter().map(|(_, entry)| entry.lock()).collect();
        let [groups_x, groups_y, groups_z] = dispatch.workgroups;
        let ids: Vec<WorkgroupId> = (0..groups_z)
            .flat_map(|z| {
                (0..groups_y).flat_map(move |y| (0..groups_x).map(move |x| WorkgroupId::new(x, y, z)))
            })
            .collect();
        let chunks = rayon::current_num_threads().min(ids.len());

        log::trace!(
            "CpuComputeDevice: Dispatch '{}' ({}x{}x{} workgroups, {} chunks)",
            dispatch.label,
            groups_x,
            groups_y,
            groups_z,
            chunks
        );

        let outcome = if chunks <= 1 {
            run_in_place(dispatch, &resolved, &mut storage, &ids)
        } else {
            run_chunked(dispatch, &resolved, &mut storage, &ids, chunks)
        };
        outcome.map_err(|source| ResourceError::Kernel {
            label: dispatch.kernel.label().to_owned(),
            source,
        })?;

        self.internal.dispatch_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn memory_barrier(&self) {
        for entry in self.buffers().values() {
            entry.make_visible();
        }
    }

    fn begin_timer_query(&self, label: &str) -> TimerQueryId {
        self.internal.timers.begin(label)
    }

    fn end_timer_query(&self, id: TimerQueryId) -> Result<(), ResourceError> {
        self.internal.timers.end(id)
    }

    fn poll_timer_query(&self, id: TimerQueryId) -> Result<Option<Duration>, ResourceError> {
        self.internal.timers.poll(id)
    }

    fn adapter_name(&self) -> String {
        "CPU reference device".to_owned()
    }
}

type Resolved = [(BufferBinding, Arc<CpuBufferEntry>)];

/// Bytes one chunk changed in one buffer: word index, new word, byte mask.
type WordPatch = Vec<(usize, u64, u64)>;

/// Runs every workgroup directly on the device storage.
fn run_in_place(
    dispatch: &ComputeDispatch<'_>,
    resolved: &Resolved,
    storage: &mut [MutexGuard<'_, Vec<u64>>],
    ids: &[WorkgroupId],
) -> Result<(), KernelError> {
    for &id in ids {
        let mut resources = KernelResources::new();
        for ((binding, entry), words) in resolved.iter().zip(storage.iter_mut()) {
            match binding.access {
                BindingAccess::ReadOnly => {
                    resources.bind_read(binding.binding, bytes_of(words, entry.size))
                }
                BindingAccess::ReadWrite => {
                    resources.bind_write(binding.binding, bytes_of_mut(words, entry.size))
                }
            }
        }
        dispatch.kernel.run_workgroup(id, &mut resources)?;
    }
    Ok(())
}

/// Runs the workgroups in parallel chunks and merges what each chunk wrote.
fn run_chunked(
    dispatch: &ComputeDispatch<'_>,
    resolved: &Resolved,
    storage: &mut [MutexGuard<'_, Vec<u64>>],
    ids: &[WorkgroupId],
    chunks: usize,
) -> Result<(), KernelError> {
    let chunk_len = ids.len().div_ceil(chunks);
    let patches: Vec<Vec<Option<WordPatch>>> = {
        let pristine: Vec<&[u64]> = storage.iter().map(|words| words.as_slice()).collect();
        ids.par_chunks(chunk_len)
            .map(|chunk| {
                let mut copies: Vec<Option<Vec<u64>>> = resolved
                    .iter()
                    .zip(&pristine)
                    .map(|((binding, _), words)| {
                        (binding.access == BindingAccess::ReadWrite).then(|| words.to_vec())
                    })
                    .collect();
                for &id in chunk {
                    let mut resources = KernelResources::new();
                    for (((binding, entry), words), copy) in
                        resolved.iter().zip(&pristine).zip(copies.iter_mut())
                    {
                        match copy {
                            Some(copy) => resources
                                .bind_write(binding.binding, bytes_of_mut(copy, entry.size)),
                            None => resources.bind_read(binding.binding, bytes_of(words, entry.size)),
                        }
                    }
                    dispatch.kernel.run_workgroup(id, &mut resources)?;
                }
                Ok(copies
                    .iter()
                    .zip(&pristine)
                    .map(|(copy, words)| copy.as_ref().map(|copy| diff_words(words, copy)))
                    .collect())
            })
            .collect::<Result<_, KernelError>>()?
    };

    for chunk in patches {
        for (patch, words) in chunk.into_iter().zip(storage.iter_mut()) {
            for (index, value, mask) in patch.into_iter().flatten() {
                words[index] = (words[index] & !mask) | (value & mask);
            }
        }
    }
    Ok(())
}

/// Lists the words of `after` that differ from `before`, with a mask of the
/// bytes that changed.
fn diff_words(before: &[u64], after: &[u64]) -> WordPatch {
    before
        .iter()
        .zip(after)
        .enumerate()
        .filter(|(_, (old, new))| old != new)
        .map(|(index, (old, new))| {
            let changed = old ^ new;
            let mask = (0..8)
                .map(|byte| 0xffu64 << (byte * 8))
                .filter(|lane| changed & lane != 0)
                .fold(0, |mask, lane| mask | lane);
            (index, *new, mask)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use translux_core::renderer::api::ComputeKernel;

    /// out[i] = in[i] * factor, one element per workgroup.
    struct Scale;

    impl ComputeKernel for Scale {
        fn label(&self) -> &str {
            "scale"
        }

        fn run_workgroup(
            &self,
            id: WorkgroupId,
            resources: &mut KernelResources<'_>,
        ) -> Result<(), KernelError> {
            let factor: &f32 = resources.uniform(0)?;
            let input: &[f32] = resources.read(1)?;
            let output: &mut [f32] = resources.write(2)?;
            let i = id.x as usize;
            if i >= input.len() {
                return Err(KernelError::Failed(format!("workgroup {i} out of range")));
            }
            output[i] = input[i] * factor;
            Ok(())
        }
    }

    fn storage(device: &CpuComputeDevice, label: &str, data: &[f32]) -> BufferId {
        device
            .create_buffer_with_data(
                &BufferDescriptor::new(
                    label,
                    std::mem::size_of_val(data) as u64,
                    BufferUsage::STORAGE | BufferUsage::COPY_DST | BufferUsage::MAP_READ,
                ),
                bytemuck::cast_slice(data),
            )
            .unwrap()
    }

    fn uniform(device: &CpuComputeDevice, value: f32) -> BufferId {
        device
            .create_buffer_with_data(
                &BufferDescriptor::new("factor", 4, BufferUsage::UNIFORM | BufferUsage::COPY_DST),
                bytemuck::bytes_of(&value),
            )
            .unwrap()
    }

    #[test]
    fn test_write_then_map_roundtrip() {
        let device = CpuComputeDevice::new();
        let id = storage(&device, "data", &[0.0; 4]);
        device
            .write_buffer(id, 4, bytemuck::cast_slice(&[1.5f32, 2.5]))
            .unwrap();
        let mapped = device.map_buffer(id, MapMode::Read).unwrap();
        assert_eq!(mapped.as_slice::<f32>().unwrap(), &[0.0, 1.5, 2.5, 0.0]);
    }

    #[test]
    fn test_write_out_of_bounds_is_rejected() {
        let device = CpuComputeDevice::new();
        let id = storage(&device, "data", &[0.0; 2]);
        let err = device.write_buffer(id, 4, &[0u8; 8]).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::OutOfBounds {
                offset: 4,
                len: 8,
                size: 8
            }
        ));
    }

    #[test]
    fn test_dispatch_requires_barrier_before_read() {
        let device = CpuComputeDevice::new();
        let factor = uniform(&device, 3.0);
        let input = storage(&device, "in", &[1.0, 2.0, 3.0]);
        let output = storage(&device, "out", &[0.0; 3]);
        let bindings = [
            BufferBinding::read(0, factor),
            BufferBinding::read(1, input),
            BufferBinding::read_write(2, output),
        ];
        device
            .dispatch(&ComputeDispatch::new_2d("scale", &Scale, &bindings, 3, 1))
            .unwrap();

        assert!(matches!(
            device.map_buffer(output, MapMode::Read),
            Err(ResourceError::MissingBarrier { .. })
        ));
        let reuse = [BufferBinding::read(0, factor), BufferBinding::read(1, output)];
        assert!(matches!(
            device.dispatch(&ComputeDispatch::new_2d("scale", &Scale, &reuse, 1, 1)),
            Err(ResourceError::MissingBarrier { .. })
        ));

        device.memory_barrier();
        let mapped = device.map_buffer(output, MapMode::Read).unwrap();
        assert_eq!(mapped.as_slice::<f32>().unwrap(), &[3.0, 6.0, 9.0]);
        assert_eq!(device.dispatch_count(), 1);
    }

    #[test]
    fn test_mapping_is_exclusive_and_scoped() {
        let device = CpuComputeDevice::new();
        let id = storage(&device, "data", &[7.0]);
        {
            let _mapped = device.map_buffer(id, MapMode::Read).unwrap();
            assert!(matches!(
                device.map_buffer(id, MapMode::Read),
                Err(ResourceError::AlreadyMapped { .. })
            ));
            assert!(matches!(
                device.write_buffer(id, 0, &[0; 4]),
                Err(ResourceError::AlreadyMapped { .. })
            ));
        }
        let mapped = device.map_buffer(id, MapMode::Read).unwrap();
        assert_eq!(mapped.as_slice::<f32>().unwrap(), &[7.0]);
    }

    #[test]
    fn test_usage_is_validated() {
        let device = CpuComputeDevice::new();
        let factor = uniform(&device, 1.0);
        assert!(matches!(
            device.map_buffer(factor, MapMode::Read),
            Err(ResourceError::UsageViolation { .. })
        ));
        let output = storage(&device, "out", &[0.0]);
        let bindings = [BufferBinding::read_write(0, factor), BufferBinding::read(1, output)];
        assert!(matches!(
            device.dispatch(&ComputeDispatch::new_2d("scale", &Scale, &bindings, 1, 1)),
            Err(ResourceError::UsageViolation { .. })
        ));
    }

    #[test]
    fn test_duplicate_bindings_are_rejected() {
        let device = CpuComputeDevice::new();
        let data = storage(&device, "data", &[1.0]);
        let bindings = [BufferBinding::read(1, data), BufferBinding::read_write(2, data)];
        assert!(matches!(
            device.dispatch(&ComputeDispatch::new_2d("scale", &Scale, &bindings, 1, 1)),
            Err(ResourceError::DuplicateBinding { binding: 2 })
        ));
    }

    #[test]
    fn test_kernel_errors_carry_the_kernel_label() {
        let device = CpuComputeDevice::new();
        let factor = uniform(&device, 1.0);
        let input = storage(&device, "in", &[1.0]);
        let output = storage(&device, "out", &[0.0]);
        let bindings = [
            BufferBinding::read(0, factor),
            BufferBinding::read(1, input),
            BufferBinding::read_write(2, output),
        ];
        let err = device
            .dispatch(&ComputeDispatch::new_2d("scale", &Scale, &bindings, 2, 1))
            .unwrap_err();
        match err {
            ResourceError::Kernel { label, source } => {
                assert_eq!(label, "scale");
                assert!(matches!(source, KernelError::Failed(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    /// out[x] = x + 1 as a single byte, so neighbouring workgroups share words.
    struct Stamp;

    impl ComputeKernel for Stamp {
        fn label(&self) -> &str {
            "stamp"
        }

        fn run_workgroup(
            &self,
            id: WorkgroupId,
            resources: &mut KernelResources<'_>,
        ) -> Result<(), KernelError> {
            let output: &mut [u8] = resources.write(0)?;
            output[id.x as usize] = (id.x % 255) as u8 + 1;
            Ok(())
        }
    }

    #[test]
    fn test_parallel_chunks_merge_byte_writes() {
        let device = CpuComputeDevice::new();
        let count = 1031u32;
        let output = device
            .create_buffer(&BufferDescriptor::new(
                "bytes",
                count as u64,
                BufferUsage::STORAGE | BufferUsage::MAP_READ,
            ))
            .unwrap();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(4)
            .build()
            .unwrap();
        let bindings = [BufferBinding::read_write(0, output)];
        pool.install(|| {
            device.dispatch(&ComputeDispatch::new_2d("stamp", &Stamp, &bindings, count, 1))
        })
        .unwrap();
        device.memory_barrier();

        let bytes = device.map_buffer(output, MapMode::Read).unwrap().to_vec::<u8>().unwrap();
        let expected: Vec<u8> = (0..count).map(|x| (x % 255) as u8 + 1).collect();
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_parallel_kernel_error_is_reported() {
        let device = CpuComputeDevice::new();
        let factor = uniform(&device, 2.0);
        let input = storage(&device, "in", &[1.0; 8]);
        let output = storage(&device, "out", &[0.0; 8]);
        let bindings = [
            BufferBinding::read(0, factor),
            BufferBinding::read(1, input),
            BufferBinding::read_write(2, output),
        ];
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(3)
            .build()
            .unwrap();
        let err = pool
            .install(|| device.dispatch(&ComputeDispatch::new_2d("scale", &Scale, &bindings, 9, 1)))
            .unwrap_err();
        assert!(matches!(err, ResourceError::Kernel { .. }));

        device.memory_barrier();
        pool.install(|| device.dispatch(&ComputeDispatch::new_2d("scale", &Scale, &bindings, 8, 1)))
            .unwrap();
        device.memory_barrier();
        let mapped = device.map_buffer(output, MapMode::Read).unwrap();
        assert_eq!(mapped.as_slice::<f32>().unwrap(), &[2.0; 8]);
    }

    #[test]
    fn test_buffers_above_the_limit_are_refused() {
        let device = CpuComputeDevice::with_max_buffer_size(64);
        assert!(device
            .create_buffer(&BufferDescriptor::new("fits", 64, BufferUsage::STORAGE))
            .is_ok());
        let err = device
            .create_buffer(&BufferDescriptor::new("big", 65, BufferUsage::STORAGE))
            .unwrap_err();
        assert!(matches!(err, ResourceError::TooLarge { size: 65, limit: 64 }));
        assert_eq!(device.buffer_count(), 1);
    }

    #[test]
    fn test_memory_tracking() {
        let device = CpuComputeDevice::new();
        let a = storage(&device, "a", &[0.0; 4]);
        let b = storage(&device, "b", &[0.0; 2]);
        assert_eq!(device.allocated_bytes(), 24);
        device.destroy_buffer(a).unwrap();
        assert_eq!(device.allocated_bytes(), 8);
        assert_eq!(device.peak_bytes(), 24);
        assert_eq!(device.buffer_count(), 1);
        assert!(matches!(
            device.destroy_buffer(a),
            Err(ResourceError::NotFound { .. })
        ));
        assert_eq!(device.buffer_size(b).unwrap(), 8);
    }

    #[test]
    fn test_timer_query_resolves_once() {
        let device = CpuComputeDevice::new();
        let query = device.begin_timer_query("work");
        assert_eq!(device.poll_timer_query(query).unwrap(), None);
        device.end_timer_query(query).unwrap();
        let elapsed = device.wait_timer_query(query).unwrap();
        assert!(elapsed <= Duration::from_secs(1));
        assert!(matches!(
            device.poll_timer_query(query),
            Err(ResourceError::InvalidHandle)
        ));
        assert_eq!(device.pending_timer_queries(), 0);
    }
}
