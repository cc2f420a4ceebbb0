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

//! The WGSL programs reproduce the host kernels. Each test is skipped when
//! no GPU adapter is available.

use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use translux_agents::{RenderAgent, RenderMode, RenderSettings, SssSettings};
use translux_core::renderer::ComputeDevice;
use translux_infra::{CpuComputeDevice, WgpuComputeDevice};

fn gpu() -> Option<Arc<dyn ComputeDevice>> {
    match WgpuComputeDevice::new() {
        Ok(device) => Some(Arc::new(device)),
        Err(e) => {
            eprintln!("skipping: {e}");
            None
        }
    }
}

fn cpu() -> Arc<dyn ComputeDevice> {
    Arc::new(CpuComputeDevice::new())
}

fn render(settings: RenderSettings, device: Arc<dyn ComputeDevice>) -> Vec<[f32; 4]> {
    let mut agent = RenderAgent::new(settings, device).unwrap();
    agent.initialize().unwrap();
    agent.render_frame().unwrap();
    let color = agent.read_color_target().unwrap();
    agent.shutdown();
    color
}

/// Share of pixels whose channels differ by more than `tolerance`.
fn mismatch_ratio(a: &[[f32; 4]], b: &[[f32; 4]], tolerance: f32) -> f32 {
    assert_eq!(a.len(), b.len());
    let bad = a
        .iter()
        .zip(b)
        .filter(|(x, y)| x.iter().zip(y.iter()).any(|(p, q)| (p - q).abs() > tolerance))
        .count();
    bad as f32 / a.len() as f32
}

fn tiled(mode: RenderMode) -> RenderSettings {
    RenderSettings {
        mode,
        width: 96,
        height: 64,
        light_count: 128,
        camera_position: [0.0, 3.0, 10.0],
        ..RenderSettings::default()
    }
}

#[test]
fn test_deferred_frame_matches_the_host_device() {
    let Some(gpu) = gpu() else { return };
    let host = render(tiled(RenderMode::Deferred), cpu());
    let device = render(tiled(RenderMode::Deferred), gpu);
    // Silhouette pixels may flip between hit and miss.
    assert!(mismatch_ratio(&host, &device, 1e-3) < 0.02);
}

#[test]
fn test_forward_frame_matches_the_host_device() {
    let Some(gpu) = gpu() else { return };
    let host = render(tiled(RenderMode::Forward), cpu());
    let device = render(tiled(RenderMode::Forward), gpu);
    assert!(mismatch_ratio(&host, &device, 1e-3) < 0.02);
}

fn sss(mode: RenderMode, kernel: &Path) -> RenderSettings {
    RenderSettings {
        mode,
        width: 48,
        height: 32,
        sss: SssSettings {
            tex_width: 16,
            tex_height: 16,
            coef_width: 4,
            coef_height: 4,
            kernel_path: kernel.to_path_buf(),
            light_count: 4,
            ..SssSettings::default()
        },
        ..RenderSettings::default()
    }
}

fn bake(settings: RenderSettings, device: Arc<dyn ComputeDevice>) {
    let mut agent = RenderAgent::new(settings, device).unwrap();
    agent.initialize().unwrap();
    agent.bake(None).unwrap();
    agent.shutdown();
}

fn read_floats(path: &Path) -> Vec<f32> {
    std::fs::read(path)
        .unwrap()
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[test]
fn test_bake_and_reconstruction_match_the_host_device() {
    let Some(gpu) = gpu() else { return };
    let dir = tempdir().unwrap();
    let host_kernel = dir.path().join("host.bin");
    let device_kernel = dir.path().join("device.bin");
    bake(sss(RenderMode::SssBake, &host_kernel), cpu());
    bake(sss(RenderMode::SssBake, &device_kernel), gpu.clone());

    let host = read_floats(&host_kernel);
    let device = read_floats(&device_kernel);
    assert_eq!(host.len(), device.len());
    for (h, d) in host.iter().zip(&device) {
        approx::assert_abs_diff_eq!(h, d, epsilon = 1e-4);
    }

    let host = render(sss(RenderMode::SssRuntime, &host_kernel), cpu());
    let device = render(sss(RenderMode::SssRuntime, &host_kernel), gpu);
    assert!(mismatch_ratio(&host, &device, 1e-3) < 0.02);
}
