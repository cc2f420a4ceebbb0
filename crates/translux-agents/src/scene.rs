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

//! Deterministic scene content: the object grid, the scattered lights and
//! the subsurface subject.

use crate::mode::RenderMode;
use crate::settings::RenderSettings;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use translux_core::math::Vec3;
use translux_core::renderer::{PointLight, SceneSphere};
use translux_lanes::render_lane::RenderWorld;

/// Seed of the light scattering.
pub const DEFAULT_LIGHT_SEED: u64 = 400;
/// Lights in the tiled-lighting scene.
pub const DEFAULT_LIGHT_COUNT: u32 = 2048;
/// Radius of influence of every light.
pub const DEFAULT_LIGHT_RADIUS: f32 = 2.0;
/// Objects per side of the grid.
pub const DEFAULT_GRID_SIZE: u32 = 5;
/// Distance between grid objects.
pub const DEFAULT_GRID_SPACING: f32 = 3.0;
/// Height of the object grid.
pub const GRID_HEIGHT: f32 = -0.5;
/// Radius of a grid object.
pub const OBJECT_RADIUS: f32 = 1.0;

const OBJECT_ALBEDO: [f32; 3] = [0.8, 0.8, 0.8];
const SUBJECT_ALBEDO: [f32; 3] = [0.9, 0.6, 0.5];

/// `count` lights spread over a `grid_size x grid_size` grid of the given spacing.
///
/// Positions cover `[-s n / 2, s n / 2)` horizontally and `[-1.5, 1.5)`
/// vertically in steps of 1/100; each color channel lies in `[0.1, 0.6)`.
pub fn scatter_lights(count: u32, seed: u64, grid_size: u32, spacing: f32, radius: f32) -> Vec<PointLight> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut unit = move || rng.gen_range(0..100u32) as f32 / 100.0;
    let span = grid_size as f32 * spacing;
    (0..count)
        .map(|_| {
            let x = unit() * span - 0.5 * span;
            let y = unit() * 3.0 - 1.5;
            let z = unit() * span - 0.5 * span;
            let color = [unit(), unit(), unit()].map(|c| c * 0.5 + 0.1);
            PointLight::new(Vec3::new(x, y, z), color, radius)
        })
        .collect()
}

/// A `size x size` grid of spheres centered on the origin at [`GRID_HEIGHT`].
pub fn object_grid(size: u32, spacing: f32) -> Vec<SceneSphere> {
    let offset = -spacing * (size as f32 - 1.0) / 2.0;
    (0..size)
        .flat_map(|i| (0..size).map(move |j| (i, j)))
        .map(|(i, j)| {
            let center = Vec3::new(
                offset + i as f32 * spacing,
                GRID_HEIGHT,
                offset + j as f32 * spacing,
            );
            SceneSphere::new(center, OBJECT_RADIUS, OBJECT_ALBEDO)
        })
        .collect()
}

/// The unit sphere at the origin the scattering modes work on.
pub fn sss_subject() -> SceneSphere {
    SceneSphere::new(Vec3::ZERO, 1.0, SUBJECT_ALBEDO)
}

/// Builds the scene of the configured mode.
pub fn build_world(settings: &RenderSettings) -> RenderWorld {
    let mut world = RenderWorld {
        ambient: settings.ambient,
        ..RenderWorld::default()
    };
    match settings.mode {
        RenderMode::Deferred | RenderMode::Forward => {
            world.spheres = object_grid(settings.grid_size, settings.grid_spacing);
            world.lights = scatter_lights(
                settings.light_count,
                settings.light_seed,
                settings.grid_size,
                settings.grid_spacing,
                settings.light_radius,
            );
        }
        RenderMode::SssBake | RenderMode::SssRuntime => {
            world.sss_subject = Some(sss_subject());
            world.lights = scatter_lights(
                settings.sss.light_count,
                settings.light_seed,
                1,
                settings.grid_spacing,
                settings.light_radius,
            );
        }
    }
    log::info!(
        "Scene for {} mode: {} objects, {} lights",
        settings.mode,
        world.spheres.len() + usize::from(world.sss_subject.is_some()),
        world.lights.len()
    );
    world
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_lights_are_deterministic_and_in_range() {
        let a = scatter_lights(256, DEFAULT_LIGHT_SEED, 5, 3.0, 2.0);
        let b = scatter_lights(256, DEFAULT_LIGHT_SEED, 5, 3.0, 2.0);
        assert_eq!(a, b);
        assert_ne!(a, scatter_lights(256, 401, 5, 3.0, 2.0));
        for light in &a {
            let p = light.position();
            assert!((-7.5..7.5).contains(&p.x));
            assert!((-1.5..1.5).contains(&p.y));
            assert!((-7.5..7.5).contains(&p.z));
            for c in light.rgb().to_array() {
                assert!((0.1..0.6).contains(&c), "channel {c}");
            }
            assert_eq!(light.radius, 2.0);
        }
    }

    #[test]
    fn test_object_grid_layout() {
        let grid = object_grid(5, 3.0);
        assert_eq!(grid.len(), 25);
        assert_eq!(grid[0].center, [-6.0, GRID_HEIGHT, -6.0]);
        assert_eq!(grid[24].center, [6.0, GRID_HEIGHT, 6.0]);
        let mean_x: f32 = grid.iter().map(|s| s.center[0]).sum::<f32>() / 25.0;
        assert_relative_eq!(mean_x, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_world_per_mode() {
        let mut settings = RenderSettings {
            light_count: 10,
            ..RenderSettings::default()
        };
        let tiled = build_world(&settings);
        assert_eq!(tiled.lights.len(), 10);
        assert_eq!(tiled.spheres.len(), 25);
        assert!(tiled.sss_subject.is_none());

        settings.mode = RenderMode::SssRuntime;
        let sss = build_world(&settings);
        assert!(sss.spheres.is_empty());
        assert_eq!(sss.sss_subject, Some(sss_subject()));
        assert_eq!(sss.lights.len(), settings.sss.light_count as usize);
    }
}
