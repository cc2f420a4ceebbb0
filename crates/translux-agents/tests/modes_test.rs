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

//! The two tiled shading paths agree with each other.

use std::sync::Arc;
use translux_agents::{RenderAgent, RenderMode, RenderSettings};
use translux_core::renderer::ComputeDevice;
use translux_infra::CpuComputeDevice;

fn render(mode: RenderMode) -> Vec<[f32; 4]> {
    let settings = RenderSettings {
        mode,
        width: 80,
        height: 48,
        light_count: 256,
        camera_position: [0.0, 3.0, 10.0],
        ..RenderSettings::default()
    };
    let device: Arc<dyn ComputeDevice> = Arc::new(CpuComputeDevice::new());
    let mut agent = RenderAgent::new(settings, device).unwrap();
    agent.app_mut().camera.process_mouse_movement(0.0, -150.0, true);
    agent.initialize().unwrap();
    agent.render_frame().unwrap();
    let color = agent.read_color_target().unwrap();
    agent.shutdown();
    color
}

#[test]
fn test_deferred_and_forward_produce_the_same_image() {
    let deferred = render(RenderMode::Deferred);
    let forward = render(RenderMode::Forward);
    assert_eq!(deferred.len(), forward.len());
    for (i, (d, f)) in deferred.iter().zip(&forward).enumerate() {
        for c in 0..4 {
            approx::assert_abs_diff_eq!(d[c], f[c], epsilon = 1e-4);
        }
        assert!(d.iter().all(|v| v.is_finite()), "pixel {i}");
    }
}

#[test]
fn test_command_line_flag_overrides_the_configured_mode() {
    let mut settings: RenderSettings = toml::from_str("mode = \"deferred\"").unwrap();
    if let Some(mode) = RenderMode::from_args(["translux", "-forward"]) {
        settings.mode = mode;
    }
    assert_eq!(settings.mode, RenderMode::Forward);

    let device: Arc<dyn ComputeDevice> = Arc::new(CpuComputeDevice::new());
    let agent = RenderAgent::new(settings, device).unwrap();
    let names: Vec<_> = agent.lanes().all().iter().map(|l| l.strategy_name()).collect();
    assert_eq!(names, ["DepthPrepass", "LightCulling", "TiledForwardShading", "LightBoxes"]);
}

#[test]
fn test_frames_accumulate_timings() {
    let settings = RenderSettings {
        width: 32,
        height: 32,
        light_count: 16,
        ..RenderSettings::default()
    };
    let device: Arc<dyn ComputeDevice> = Arc::new(CpuComputeDevice::new());
    let mut agent = RenderAgent::new(settings, device).unwrap();
    assert!(agent.render_frame().is_err());
    agent.initialize().unwrap();
    for _ in 0..3 {
        let timings = agent.render_frame().unwrap();
        assert!(timings.total() >= timings.culling);
    }
    assert_eq!(agent.frame_count(), 3);
}

#[test]
fn test_replaced_world_is_culled_next_frame() {
    let settings = RenderSettings {
        width: 48,
        height: 32,
        light_count: 64,
        ..RenderSettings::default()
    };
    let device: Arc<dyn ComputeDevice> = Arc::new(CpuComputeDevice::new());
    let mut agent = RenderAgent::new(settings, device).unwrap();
    agent.initialize().unwrap();
    agent.render_frame().unwrap();

    let mut world = agent.world().clone();
    world.lights.clear();
    agent.set_world(world);
    agent.render_frame().unwrap();
    assert_eq!(agent.culling_report().unwrap().total_references, 0);
}
