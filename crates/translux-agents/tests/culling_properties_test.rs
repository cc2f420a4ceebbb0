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

//! End-to-end properties of the tiled light culling, driven through the agent.

use std::sync::Arc;
use translux_agents::{RenderAgent, RenderMode, RenderSettings};
use translux_core::renderer::{ComputeDevice, TiledCullingConfig};
use translux_infra::CpuComputeDevice;
use translux_lanes::render_lane::{pixel_center_ndc, primary_ray, trace_spheres, LightCullingLane};

fn settings(mode: RenderMode, width: u32, height: u32, lights: u32) -> RenderSettings {
    RenderSettings {
        mode,
        width,
        height,
        light_count: lights,
        camera_position: [0.0, 4.0, 12.0],
        ..RenderSettings::default()
    }
}

fn agent(settings: RenderSettings) -> RenderAgent {
    let device: Arc<dyn ComputeDevice> = Arc::new(CpuComputeDevice::new());
    let mut agent = RenderAgent::new(settings, device).unwrap();
    agent.app_mut().camera.process_mouse_movement(0.0, -200.0, true);
    agent.initialize().unwrap();
    agent
}

#[test]
fn test_every_light_touching_a_visible_surface_is_listed() {
    let settings = settings(RenderMode::Forward, 96, 64, 300);
    let mut agent = agent(settings.clone());
    agent.render_frame().unwrap();

    let culling = agent
        .lanes()
        .get_as::<LightCullingLane>("LightCulling")
        .unwrap();
    let grid = culling.read_tile_grid(agent.device().as_ref()).unwrap();
    let report = agent.culling_report().unwrap();
    assert!(!report.has_overflow(), "test scene must stay below capacity");

    let view = agent.app().camera.view_info(settings.width, settings.height);
    let inverse = view.view_projection().inverse().unwrap();
    let world = agent.world();
    let tile = settings.culling.tile_size;
    let mut checked = 0;
    for py in 0..settings.height {
        for px in 0..settings.width {
            let (nx, ny) = pixel_center_ndc(px, py, settings.width, settings.height);
            let (origin, dir) = primary_ray(&inverse, nx, ny);
            let Some(hit) = trace_spheres(&world.spheres, origin, dir) else {
                continue;
            };
            let listed = grid.lights_in_tile(px / tile, py / tile);
            for (index, light) in world.lights.iter().enumerate() {
                if light.position().distance(hit.position) < light.radius * 0.999 {
                    assert!(
                        listed.contains(&(index as u32)),
                        "light {index} reaches pixel ({px}, {py}) but is not in its tile"
                    );
                    checked += 1;
                }
            }
        }
    }
    assert!(checked > 0, "the scene should light some visible surface");
}

#[test]
fn test_counts_never_exceed_capacity() {
    let mut settings = settings(RenderMode::Deferred, 64, 48, 400);
    settings.culling = TiledCullingConfig::new(16, 8);
    let mut agent = agent(settings);
    agent.render_frame().unwrap();

    let report = agent.culling_report().unwrap();
    assert!(report.max_lights_in_tile <= 8);
    assert!(report.has_overflow());
    assert!(report.dropped_lights > 0);

    let culling = agent
        .lanes()
        .get_as::<LightCullingLane>("LightCulling")
        .unwrap();
    let grid = culling.read_tile_grid(agent.device().as_ref()).unwrap();
    for ty in 0..grid.tiles_y {
        for tx in 0..grid.tiles_x {
            assert!(grid.lights_in_tile(tx, ty).len() <= 8);
        }
    }
}

#[test]
fn test_strict_capacity_fails_the_frame() {
    let mut settings = settings(RenderMode::Forward, 64, 48, 400);
    settings.culling = TiledCullingConfig {
        strict_capacity: true,
        ..TiledCullingConfig::new(16, 4)
    };
    let mut agent = agent(settings);
    let err = agent.render_frame().unwrap_err();
    assert!(format!("{err:#}").contains("exceeded their light capacity"));
    agent.shutdown();
}

#[test]
fn test_full_resolution_grid_with_zero_lights() {
    let settings = settings(RenderMode::Forward, 800, 600, 0);
    assert_eq!(settings.culling.tile_dimensions(800, 600), (50, 38));
    let mut agent = agent(settings);
    agent.render_frame().unwrap();

    let report = agent.culling_report().unwrap();
    assert_eq!((report.tiles_x, report.tiles_y), (50, 38));
    assert_eq!(report.total_references, 0);
    assert_eq!(report.max_lights_in_tile, 0);

    // Ambient-only shading: every covered pixel is ambient * albedo.
    let color = agent.read_color_target().unwrap();
    assert_eq!(color.len(), 800 * 600);
    let ambient = 0.1 * 0.8;
    let covered: Vec<_> = color.iter().filter(|c| c[0] > 0.0).collect();
    assert!(!covered.is_empty());
    for c in covered {
        assert!((c[0] - ambient).abs() < 1e-6, "pixel {c:?}");
    }
}
