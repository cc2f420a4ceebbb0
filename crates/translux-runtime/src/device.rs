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

//! Compute device selection.

use anyhow::{Context, Result};
use std::sync::Arc;
use translux_agents::ComputeBackend;
use translux_core::renderer::{ComputeDevice, ResourceError};
use translux_infra::{CpuComputeDevice, WgpuComputeDevice};

/// Opens the device `backend` asks for.
pub fn open_device(backend: ComputeBackend) -> Result<Arc<dyn ComputeDevice>> {
    select_device(backend, || {
        WgpuComputeDevice::new().map(|device| Arc::new(device) as Arc<dyn ComputeDevice>)
    })
}

fn select_device(
    backend: ComputeBackend,
    open_gpu: impl FnOnce() -> Result<Arc<dyn ComputeDevice>, ResourceError>,
) -> Result<Arc<dyn ComputeDevice>> {
    let device = match backend {
        ComputeBackend::Cpu => host_device(),
        ComputeBackend::Gpu => open_gpu().context("no GPU device for the 'gpu' backend")?,
        ComputeBackend::Auto => match open_gpu() {
            Ok(device) => device,
            Err(e) => {
                log::warn!("GPU unavailable ({e}), falling back to the host device");
                host_device()
            }
        },
    };
    log::info!("Compute backend '{backend}' runs on {}", device.adapter_name());
    Ok(device)
}

fn host_device() -> Arc<dyn ComputeDevice> {
    Arc::new(CpuComputeDevice::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unavailable() -> Result<Arc<dyn ComputeDevice>, ResourceError> {
        Err(ResourceError::BackendError("no adapter".into()))
    }

    #[test]
    fn test_cpu_backend_never_opens_a_gpu() {
        let device = select_device(ComputeBackend::Cpu, || panic!("GPU opened")).unwrap();
        assert_eq!(device.adapter_name(), CpuComputeDevice::new().adapter_name());
    }

    #[test]
    fn test_auto_falls_back_to_the_host() {
        let device = select_device(ComputeBackend::Auto, unavailable).unwrap();
        assert_eq!(device.adapter_name(), CpuComputeDevice::new().adapter_name());
    }

    #[test]
    fn test_gpu_backend_requires_an_adapter() {
        let err = select_device(ComputeBackend::Gpu, unavailable).unwrap_err();
        assert!(format!("{err:#}").contains("no adapter"));
    }
}
