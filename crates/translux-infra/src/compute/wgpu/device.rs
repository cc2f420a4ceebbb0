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
    BindingAccess, BufferDescriptor, BufferId, BufferUsage, ComputeDispatch, MapMode,
    MappedBuffer, TimerQueryId,
};
use translux_core::renderer::{ComputeDevice, ResourceError};

use super::buffer::{allocation_size, WgpuBufferEntry, WgpuMappedRange};
use super::pipeline::PipelineCache;
use crate::compute::timer::TimerQueries;
use crate::compute::validation::{validate_bindings, BindingState};

/// The internal, non-clonable state of the [`WgpuComputeDevice`].
#[derive(Debug)]
pub struct WgpuDeviceInternal {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_info: wgpu::AdapterInfo,
    limits: wgpu::Limits,
    buffers: Mutex<HashMap<BufferId, Arc<WgpuBufferEntry>>>,
    pipelines: PipelineCache,
    next_buffer_id: AtomicUsize,
    timers: TimerQueries,
    /// Validation errors reported by wgpu since they were last collected.
    errors: Arc<Mutex<Vec<String>>>,
    dispatch_count: AtomicU64,
}

/// A clonable, thread-safe handle to a GPU compute device.
#[derive(Clone, Debug)]
pub struct WgpuComputeDevice {
    internal: Arc<WgpuDeviceInternal>,
}

impl WgpuComputeDevice {
    /// Opens the highest-performance adapter available, without a surface.
    pub fn new() -> Result<Self, ResourceError> {
        pollster::block_on(Self::new_async())
    }

    async fn new_async() -> Result<Self, ResourceError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::new_without_display_handle());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| ResourceError::BackendError(format!("No compute adapter: {e}")))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "WgpuComputeDevice: Using adapter \"{}\" (Backend: {:?})",
            adapter_info.name,
            adapter_info.backend
        );

        // Kernel buffers can be large; ask for everything the adapter offers.
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Translux Compute Device"),
                required_limits: adapter.limits(),
                ..Default::default()
            })
            .await
            .map_err(|e| {
                ResourceError::BackendError(format!("Failed to create logical device: {e}"))
            })?;

        let errors: Arc<Mutex<Vec<String>>> = Arc::default();
        let sink = Arc::clone(&errors);
        device.on_uncaptured_error(Arc::new(move |e: wgpu::Error| {
            log::error!("WGPU Uncaptured Error: {e:?}");
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(e.to_string());
        }));

        let limits = device.limits();
        log::debug!("WgpuComputeDevice: Device limits: {limits:?}");

        Ok(Self {
            internal: Arc::new(WgpuDeviceInternal {
                device,
                queue,
                adapter_info,
                limits,
                buffers: Mutex::new(HashMap::new()),
                pipelines: PipelineCache::default(),
                next_buffer_id: AtomicUsize::new(0),
                timers: TimerQueries::default(),
                errors,
                dispatch_count: AtomicU64::new(0),
            }),
        })
    }

    /// Number of live buffers.
    pub fn buffer_count(&self) -> usize {
        self.buffers().len()
    }

    /// Number of dispatches submitted so far.
    pub fn dispatch_count(&self) -> u64 {
        self.internal.dispatch_count.load(Ordering::Relaxed)
    }

    /// Number of compiled pipelines.
    pub fn pipeline_count(&self) -> usize {
        self.internal.pipelines.len()
    }

    /// Largest buffer this device accepts, in bytes.
    pub fn max_buffer_size(&self) -> u64 {
        let limits = &self.internal.limits;
        limits
            .max_buffer_size
            .min(u64::from(limits.max_storage_buffer_binding_size))
    }

    fn buffers(&self) -> MutexGuard<'_, HashMap<BufferId, Arc<WgpuBufferEntry>>> {
        self.internal
            .buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn entry(&self, id: BufferId) -> Result<Arc<WgpuBufferEntry>, ResourceError> {
        self.buffers()
            .get(&id)
            .cloned()
            .ok_or(ResourceError::NotFound { id })
    }

    fn generate_buffer_id(&self) -> BufferId {
        BufferId(self.internal.next_buffer_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Turns the errors wgpu reported since the last call into a result.
    fn take_errors(&self, context: &str) -> Result<(), ResourceError> {
        let mut errors = self
            .internal
            .errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if errors.is_empty() {
            return Ok(());
        }
        let message = errors.join("; ");
        errors.clear();
        Err(ResourceError::BackendError(format!("{context}: {message}")))
    }

    /// Blocks until the queue is idle.
    fn wait_idle(&self) -> Result<(), ResourceError> {
        self.internal
            .device
            .poll(wgpu::PollType::wait_indefinitely())
            .map(|_| ())
            .map_err(|e| ResourceError::BackendError(format!("Device poll failed: {e:?}")))
    }

    /// Copies a whole allocation back to the host.
    fn read_back(&self, entry: &WgpuBufferEntry) -> Result<Vec<u64>, ResourceError> {
        let device = &self.internal.device;
        let size = entry.buffer.size();
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Translux Readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Translux Readback Encoder"),
        });
        encoder.copy_buffer_to_buffer(&entry.buffer, 0, &staging, 0, size);
        self.internal.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let status: Arc<Mutex<Option<Result<(), wgpu::BufferAsyncError>>>> = Arc::default();
        let status_for_callback = Arc::clone(&status);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            *status_for_callback
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(result);
        });
        self.wait_idle()?;

        let outcome = status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match outcome {
            Some(Ok(())) => {}
            Some(Err(e)) => {
                return Err(ResourceError::BackendError(format!(
                    "Failed to map '{}': {e:?}",
                    entry.label
                )))
            }
            None => {
                return Err(ResourceError::BackendError(format!(
                    "Mapping '{}' did not complete",
                    entry.label
                )))
            }
        }

        let mut words = vec![0u64; (size as usize).div_ceil(std::mem::size_of::<u64>())];
        {
            let view = slice.get_mapped_range();
            bytemuck::cast_slice_mut::<u64, u8>(&mut words)[..view.len()].copy_from_slice(&view);
        }
        staging.unmap();
        staging.destroy();
        Ok(words)
    }
}

impl ComputeDevice for WgpuComputeDevice {
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let limit = self.max_buffer_size();
        if descriptor.size > limit {
            return Err(ResourceError::TooLarge {
                size: descriptor.size,
                limit,
            });
        }
        let label = descriptor.label_or_default();
        // Every buffer can be bound, uploaded to and read back; the
        // requested usage is still enforced by the checks below.
        let buffer = self.internal.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: allocation_size(descriptor.size),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        self.take_errors(label)?;

        let id = self.generate_buffer_id();
        let entry = WgpuBufferEntry::new(label.to_owned(), descriptor.size, descriptor.usage, buffer);
        self.buffers().insert(id, Arc::new(entry));
        log::debug!(
            "WgpuComputeDevice: Created buffer '{}' with ID: {:?}, size: {} bytes",
            label,
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
        if data.len() % 4 == 0 {
            self.internal.queue.write_buffer(&entry.buffer, 0, data);
        } else {
            let mut padded = data.to_vec();
            padded.resize(data.len().next_multiple_of(4), 0);
            self.internal.queue.write_buffer(&entry.buffer, 0, &padded);
        }
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let entry = self
            .buffers()
            .remove(&id)
            .ok_or(ResourceError::NotFound { id })?;
        entry.buffer.destroy();
        log::debug!(
            "WgpuComputeDevice: Destroyed buffer '{}' ({:?})",
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
        if offset.checked_add(len).is_none_or(|end| end > entry.size) {
            return Err(ResourceError::OutOfBounds {
                offset,
                len,
                size: entry.size,
            });
        }
        if offset % 4 != 0 || len % 4 != 0 {
            return Err(ResourceError::BackendError(format!(
                "Write of {len} bytes at offset {offset} into '{}' is not 4-byte aligned",
                entry.label
            )));
        }
        self.internal.queue.write_buffer(&entry.buffer, offset, data);
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
        let words = match self.read_back(&entry) {
            Ok(words) => words,
            Err(e) => {
                entry.end_map();
                return Err(e);
            }
        };
        log::trace!("WgpuComputeDevice: Mapped buffer '{}' ({:?})", entry.label, mode);
        let writeback = (mode == MapMode::Write).then(|| self.internal.queue.clone());
        Ok(MappedBuffer::new(
            id,
            mode,
            Box::new(WgpuMappedRange::new(entry, words, writeback)),
        ))
    }

    fn dispatch(&self, dispatch: &ComputeDispatch<'_>) -> Result<(), ResourceError> {
        let source = dispatch.kernel.source().ok_or_else(|| {
            ResourceError::BackendError(format!(
                "Kernel '{}' has no WGSL program",
                dispatch.kernel.label()
            ))
        })?;
        let resolved = {
            let buffers = self.buffers();
            validate_bindings(
                dispatch.bindings,
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
            )?
        };

        let max_groups = self.internal.limits.max_compute_workgroups_per_dimension;
        if dispatch.workgroups.iter().any(|&n| n > max_groups) {
            return Err(ResourceError::BackendError(format!(
                "Dispatch '{}' of {:?} workgroups exceeds the device limit of {}",
                dispatch.label, dispatch.workgroups, max_groups
            )));
        }

        let device = &self.internal.device;
        let pipeline = self
            .internal
            .pipelines
            .get_or_create(device, dispatch.kernel.label(), source);
        if let Err(e) = self.take_errors(dispatch.kernel.label()) {
            self.internal.pipelines.evict(&source);
            return Err(e);
        }

        let layout = pipeline.get_bind_group_layout(0);
        let entries: Vec<wgpu::BindGroupEntry<'_>> = resolved
            .iter()
            .map(|(binding, entry)| wgpu::BindGroupEntry {
                binding: binding.binding,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &entry.buffer,
                    offset: 0,
                    size: Some(entry.binding_size()),
                }),
            })
            .collect();
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(dispatch.label),
            layout: &layout,
            entries: &entries,
        });

        let [groups_x, groups_y, groups_z] = dispatch.workgroups;
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(dispatch.label),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(dispatch.label),
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups_x, groups_y, groups_z);
        }
        self.internal.queue.submit(Some(encoder.finish()));
        self.take_errors(dispatch.label)?;

        log::trace!(
            "WgpuComputeDevice: Dispatch '{}' ({}x{}x{} workgroups)",
            dispatch.label,
            groups_x,
            groups_y,
            groups_z
        );
        for (binding, entry) in &resolved {
            if binding.access == BindingAccess::ReadWrite {
                entry.mark_written();
            }
        }
        self.internal.dispatch_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn memory_barrier(&self) {
        // Passes of one queue already observe each other's writes.
        for entry in self.buffers().values() {
            entry.make_visible();
        }
    }

    fn begin_timer_query(&self, label: &str) -> TimerQueryId {
        self.internal.timers.begin(label)
    }

    fn end_timer_query(&self, id: TimerQueryId) -> Result<(), ResourceError> {
        self.wait_idle()?;
        self.internal.timers.end(id)
    }

    fn poll_timer_query(&self, id: TimerQueryId) -> Result<Option<Duration>, ResourceError> {
        self.internal.timers.poll(id)
    }

    fn adapter_name(&self) -> String {
        format!(
            "{} ({:?})",
            self.internal.adapter_info.name, self.internal.adapter_info.backend
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use translux_core::renderer::api::{
        BufferBinding, ComputeKernel, KernelResources, KernelSource, WorkgroupId,
    };
    use translux_core::renderer::KernelError;

    const SCALE_WGSL: &str = r#"
@group(0) @binding(0) var<storage, read> factor: f32;
@group(0) @binding(1) var<storage, read> input: array<f32>;
@group(0) @binding(2) var<storage, read_write> output: array<f32>;

@compute @workgroup_size(1)
fn main(@builtin(workgroup_id) id: vec3<u32>) {
    if (id.x < arrayLength(&input)) {
        output[id.x] = input[id.x] * factor;
    }
}
"#;

    /// out[i] = in[i] * factor, one element per workgroup.
    struct Scale {
        with_program: bool,
    }

    impl ComputeKernel for Scale {
        fn label(&self) -> &str {
            "scale"
        }

        fn source(&self) -> Option<KernelSource> {
            self.with_program.then_some(KernelSource {
                wgsl: SCALE_WGSL,
                entry_point: "main",
            })
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
            output[i] = input[i] * factor;
            Ok(())
        }
    }

    /// Devices are only available on machines with an adapter.
    fn test_device() -> Option<WgpuComputeDevice> {
        match WgpuComputeDevice::new() {
            Ok(device) => Some(device),
            Err(e) => {
                println!("Skipping wgpu test: {e}");
                None
            }
        }
    }

    fn storage(device: &WgpuComputeDevice, label: &str, data: &[f32]) -> BufferId {
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

    #[test]
    fn test_write_then_map_roundtrip() {
        let Some(device) = test_device() else {
            return;
        };
        let id = storage(&device, "data", &[0.0; 4]);
        device
            .write_buffer(id, 4, bytemuck::cast_slice(&[1.5f32, 2.5]))
            .unwrap();
        let mapped = device.map_buffer(id, MapMode::Read).unwrap();
        assert_eq!(mapped.as_slice::<f32>().unwrap(), &[0.0, 1.5, 2.5, 0.0]);
    }

    #[test]
    fn test_write_mapping_uploads_on_drop() {
        let Some(device) = test_device() else {
            return;
        };
        let id = device
            .create_buffer(&BufferDescriptor::new(
                "staged",
                12,
                BufferUsage::STORAGE | BufferUsage::MAP_READ | BufferUsage::MAP_WRITE,
            ))
            .unwrap();
        {
            let mut mapped = device.map_buffer(id, MapMode::Write).unwrap();
            mapped.as_slice_mut::<u32>().unwrap()[1] = 7;
        }
        let mapped = device.map_buffer(id, MapMode::Read).unwrap();
        assert_eq!(mapped.as_slice::<u32>().unwrap(), &[0, 7, 0]);
    }

    #[test]
    fn test_dispatch_runs_the_program() {
        let Some(device) = test_device() else {
            return;
        };
        let factor = device
            .create_buffer_with_data(
                &BufferDescriptor::new("factor", 4, BufferUsage::UNIFORM | BufferUsage::COPY_DST),
                bytemuck::bytes_of(&3.0f32),
            )
            .unwrap();
        let input = storage(&device, "in", &[1.0, 2.0, 3.0]);
        let output = storage(&device, "out", &[0.0; 3]);
        let kernel = Scale { with_program: true };
        let bindings = [
            BufferBinding::read(0, factor),
            BufferBinding::read(1, input),
            BufferBinding::read_write(2, output),
        ];
        let dispatch = ComputeDispatch {
            label: "scale",
            kernel: &kernel,
            bindings: &bindings,
            workgroups: [3, 1, 1],
        };
        device.dispatch(&dispatch).unwrap();
        assert!(matches!(
            device.map_buffer(output, MapMode::Read),
            Err(ResourceError::MissingBarrier { .. })
        ));
        device.memory_barrier();
        {
            let mapped = device.map_buffer(output, MapMode::Read).unwrap();
            assert_eq!(mapped.as_slice::<f32>().unwrap(), &[3.0, 6.0, 9.0]);
        }

        // A second dispatch reuses the compiled pipeline.
        device.dispatch(&dispatch).unwrap();
        assert_eq!(device.pipeline_count(), 1);
        assert_eq!(device.dispatch_count(), 2);
    }

    #[test]
    fn test_kernel_without_program_is_refused() {
        let Some(device) = test_device() else {
            return;
        };
        let output = storage(&device, "out", &[0.0; 1]);
        let kernel = Scale {
            with_program: false,
        };
        let bindings = [BufferBinding::read_write(2, output)];
        let err = device
            .dispatch(&ComputeDispatch {
                label: "scale",
                kernel: &kernel,
                bindings: &bindings,
                workgroups: [1, 1, 1],
            })
            .unwrap_err();
        assert!(matches!(err, ResourceError::BackendError(_)));
    }

    #[test]
    fn test_oversized_buffer_is_refused() {
        let Some(device) = test_device() else {
            return;
        };
        let limit = device.max_buffer_size();
        let err = device
            .create_buffer(&BufferDescriptor::new(
                "huge",
                limit + 1,
                BufferUsage::STORAGE,
            ))
            .unwrap_err();
        assert!(matches!(err, ResourceError::TooLarge { .. }));
        assert_eq!(device.buffer_count(), 0);
    }

    #[test]
    fn test_unaligned_write_is_refused() {
        let Some(device) = test_device() else {
            return;
        };
        let id = storage(&device, "data", &[0.0; 2]);
        assert!(matches!(
            device.write_buffer(id, 2, &[0u8; 4]),
            Err(ResourceError::BackendError(_))
        ));
        assert!(device.adapter_name().contains('('));
    }
}
