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

//! Offline bake followed by runtime reconstruction, through the agent.

use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;
use translux_agents::{RenderAgent, RenderMode, RenderSettings, SssSettings};
use translux_core::lane::BakeProgressSink;
use translux_core::renderer::ComputeDevice;
use translux_infra::CpuComputeDevice;

const WIDTH: u32 = 48;
const HEIGHT: u32 = 32;

fn settings(mode: RenderMode, kernel: &Path) -> RenderSettings {
    RenderSettings {
        mode,
        width: WIDTH,
        height: HEIGHT,
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

fn agent(settings: RenderSettings) -> RenderAgent {
    let device: Arc<dyn ComputeDevice> = Arc::new(CpuComputeDevice::new());
    RenderAgent::new(settings, device).unwrap()
}

fn bake(settings: RenderSettings) -> Vec<u32> {
    let rows = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let rows = rows.clone();
        BakeProgressSink::new(move |p| rows.lock().unwrap().push(p.rows_completed))
    };
    let mut agent = agent(settings);
    agent.initialize().unwrap();
    agent.bake(Some(sink)).unwrap();
    agent.shutdown();
    let rows = rows.lock().unwrap().clone();
    rows
}

#[test]
fn test_bake_then_render_the_subject() {
    let dir = tempdir().unwrap();
    let kernel = dir.path().join("kernel.bin");
    let baking = settings(RenderMode::SssBake, &kernel);
    let dims = baking.sss.dimensions().unwrap();

    let rows = bake(baking);
    assert_eq!(rows, (1..=16).collect::<Vec<_>>());
    let size = std::fs::metadata(&kernel).unwrap().len();
    assert_eq!(size, dims.file_size_bytes());

    let mut runtime = agent(settings(RenderMode::SssRuntime, &kernel));
    runtime.initialize().unwrap();
    runtime.render_frame().unwrap();
    let color = runtime.read_color_target().unwrap();
    assert_eq!(color.len(), (WIDTH * HEIGHT) as usize);

    let center = color[((HEIGHT / 2) * WIDTH + WIDTH / 2) as usize];
    assert!(center[..3].iter().any(|&c| c > 0.0), "center {center:?}");
    assert!(center.iter().all(|c| c.is_finite()));
    assert_eq!(color[0], [0.0, 0.0, 0.0, 1.0]);
    assert_eq!(color[color.len() - 1], [0.0, 0.0, 0.0, 1.0]);
    runtime.shutdown();
}

#[test]
fn test_resumed_bake_matches_a_full_bake() {
    let dir = tempdir().unwrap();
    let full = dir.path().join("full.bin");
    bake(settings(RenderMode::SssBake, &full));

    // Seed the resumed file with the first rows only, then finish it.
    let resumed = dir.path().join("resumed.bin");
    let mut partial = settings(RenderMode::SssBake, &resumed);
    let dims = partial.sss.dimensions().unwrap();
    let bytes = std::fs::read(&full).unwrap();
    let row_bytes = dims.coefficients_per_row() * std::mem::size_of::<f32>();
    std::fs::write(&resumed, &bytes[..row_bytes * 5]).unwrap();
    partial.sss.resume_row = 5;

    let rows = bake(partial);
    assert_eq!(rows.first(), Some(&6));
    assert_eq!(rows.len(), 11);
    assert_eq!(std::fs::read(&resumed).unwrap(), bytes);
}

#[test]
fn test_runtime_rejects_a_truncated_kernel_file() {
    let dir = tempdir().unwrap();
    let kernel = dir.path().join("kernel.bin");
    bake(settings(RenderMode::SssBake, &kernel));
    let bytes = std::fs::read(&kernel).unwrap();
    std::fs::write(&kernel, &bytes[..bytes.len() - 4]).unwrap();

    let mut runtime = agent(settings(RenderMode::SssRuntime, &kernel));
    let err = runtime.initialize().unwrap_err();
    assert!(format!("{err:#}").contains("HaarScattering"));
    runtime.shutdown();
}

#[test]
fn test_runtime_without_a_kernel_file_fails() {
    let dir = tempdir().unwrap();
    let mut runtime = agent(settings(RenderMode::SssRuntime, &dir.path().join("missing.bin")));
    assert!(runtime.initialize().is_err());
}

#[test]
fn test_bake_mode_has_no_frames() {
    let dir = tempdir().unwrap();
    let mut agent = agent(settings(RenderMode::SssBake, &dir.path().join("k.bin")));
    agent.initialize().unwrap();
    assert!(agent.render_frame().is_err());
}
