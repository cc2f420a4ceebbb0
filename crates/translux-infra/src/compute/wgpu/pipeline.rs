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

//! Compute pipelines compiled on first use.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use translux_core::renderer::api::KernelSource;

/// Pipelines keyed by program and entry point.
///
/// Layouts are derived from the program, so every binding a dispatch
/// passes must be used by the entry point it runs.
#[derive(Debug, Default)]
pub(crate) struct PipelineCache {
    pipelines: Mutex<HashMap<KernelSource, wgpu::ComputePipeline>>,
}

impl PipelineCache {
    pub(crate) fn get_or_create(
        &self,
        device: &wgpu::Device,
        label: &str,
        source: KernelSource,
    ) -> wgpu::ComputePipeline {
        let mut pipelines = self
            .pipelines
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        pipelines
            .entry(source)
            .or_insert_with(|| {
                log::debug!(
                    "WgpuComputeDevice: Compiling '{}' (entry point '{}')",
                    label,
                    source.entry_point
                );
                let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(label),
                    source: wgpu::ShaderSource::Wgsl(source.wgsl.into()),
                });
                device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(label),
                    layout: None,
                    module: &module,
                    entry_point: Some(source.entry_point),
                    compilation_options: Default::default(),
                    cache: None,
                })
            })
            .clone()
    }

    /// Forgets a pipeline that failed to compile.
    pub(crate) fn evict(&self, source: &KernelSource) {
        self.pipelines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(source);
    }

    pub(crate) fn len(&self) -> usize {
        self.pipelines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
