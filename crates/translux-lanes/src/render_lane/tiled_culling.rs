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

//! Per-tile light culling: tile frusta, depth bounds and the culling kernel.
//!
//! For each tile the four side planes pass through the eye and the tile's
//! corners on the far plane; the near and far planes come from the minimum
//! and maximum depth found in the tile. A light is kept unless its bounding
//! sphere lies strictly outside one of the six planes.
//!
//! One min/max pair per tile is used, so a tile that spans two separate depth
//! clusters keeps lights floating in the gap between them.

use super::screen::{pixel_index, screen_to_ndc, CLEAR_DEPTH};
use super::shaders;
use translux_core::math::{BoundingSphere, Frustum, Mat4, Plane, Vec3};
use translux_core::renderer::{
    ComputeKernel, KernelError, KernelResources, KernelSource, LightCullingUniforms, PointLight,
    TileBounds, TileLightGrid, TileStats, TiledCullingConfig, ViewInfo, WorkgroupId,
};

/// Binding indices of [`LightCullingKernel`].
pub mod culling_bindings {
    /// [`LightCullingUniforms`](translux_core::renderer::LightCullingUniforms).
    pub const UNIFORMS: u32 = 0;
    /// `[PointLight]`.
    pub const LIGHTS: u32 = 1;
    /// Depth target, one `f32` per pixel.
    pub const DEPTH: u32 = 2;
    /// Light index lists, `max_lights_per_tile` slots per tile.
    pub const LIGHT_INDICES: u32 = 3;
    /// One `TileStats` per tile.
    pub const TILE_STATS: u32 = 4;
}

/// Plane that rejects nothing, used when a tile edge degenerates.
const PERMISSIVE_PLANE: Plane = Plane {
    normal: Vec3::ZERO,
    distance: 0.0,
};

/// Returns `(min, max)` depth over the tile's pixels.
///
/// An empty tile, or one whose pixels are missing from `depth`, reports the
/// cleared depth for the missing part.
pub fn tile_depth_range(depth: &[f32], bounds: &TileBounds, screen_width: u32) -> (f32, f32) {
    let mut min_depth = f32::MAX;
    let mut max_depth = f32::MIN;
    for y in bounds.y0..bounds.y1 {
        for x in bounds.x0..bounds.x1 {
            let d = depth
                .get(pixel_index(x, y, screen_width))
                .copied()
                .unwrap_or(CLEAR_DEPTH);
            min_depth = min_depth.min(d);
            max_depth = max_depth.max(d);
        }
    }
    if min_depth > max_depth {
        return (CLEAR_DEPTH, CLEAR_DEPTH);
    }
    (min_depth, max_depth)
}

fn unproject(inverse_projection: &Mat4, x: f32, y: f32, depth: f32) -> Vec3 {
    inverse_projection.project_point3(Vec3::new(x, y, depth))
}

/// Builds the view-space frustum of a tile bounded by `[min_depth, max_depth]`.
pub fn tile_frustum(
    inverse_projection: &Mat4,
    bounds: &TileBounds,
    screen_width: u32,
    screen_height: u32,
    min_depth: f32,
    max_depth: f32,
) -> Frustum {
    let (left, top) = screen_to_ndc(bounds.x0 as f32, bounds.y0 as f32, screen_width, screen_height);
    let (right, bottom) =
        screen_to_ndc(bounds.x1 as f32, bounds.y1 as f32, screen_width, screen_height);

    let top_left = unproject(inverse_projection, left, top, 1.0);
    let top_right = unproject(inverse_projection, right, top, 1.0);
    let bottom_left = unproject(inverse_projection, left, bottom, 1.0);
    let bottom_right = unproject(inverse_projection, right, bottom, 1.0);
    let center = unproject(
        inverse_projection,
        (left + right) * 0.5,
        (top + bottom) * 0.5,
        1.0,
    );

    let side = |a: Vec3, b: Vec3| Plane::through_origin(a, b, center).unwrap_or(PERMISSIVE_PLANE);

    let near_z = unproject(inverse_projection, 0.0, 0.0, min_depth).z;
    let far_z = unproject(inverse_projection, 0.0, 0.0, max_depth).z;

    Frustum {
        planes: [
            side(top_left, bottom_left),
            side(top_right, bottom_right),
            side(bottom_left, bottom_right),
            side(top_left, top_right),
            // View space looks down -Z: "behind the near plane" is z < near_z.
            Plane::from_normal_and_point(-Vec3::Z, Vec3::new(0.0, 0.0, near_z)),
            Plane::from_normal_and_point(Vec3::Z, Vec3::new(0.0, 0.0, far_z)),
        ],
    }
}

/// Appends to `out` every light intersecting `frustum`.
///
/// Returns `(written, dropped)`: lights accepted once `out` is full are
/// counted in `dropped` instead of being written.
pub fn cull_tile(frustum: &Frustum, view: &Mat4, lights: &[PointLight], out: &mut [u32]) -> (u32, u32) {
    let mut written = 0usize;
    let mut dropped = 0u32;
    for (index, light) in lights.iter().enumerate() {
        let sphere = BoundingSphere::new(view.transform_point3(light.position()), light.radius);
        if !frustum.intersects_sphere(&sphere) {
            continue;
        }
        match out.get_mut(written) {
            Some(slot) => {
                *slot = index as u32;
                written += 1;
            }
            None => dropped += 1,
        }
    }
    (written as u32, dropped)
}

/// The per-frame inputs of the culling algorithm.
#[derive(Debug, Clone, Copy)]
pub struct CullingInputs<'a> {
    /// World-to-view matrix.
    pub view: Mat4,
    /// Inverse of the projection.
    pub inverse_projection: Mat4,
    /// Tile size and per-tile capacity.
    pub config: TiledCullingConfig,
    /// Screen width in pixels.
    pub width: u32,
    /// Screen height in pixels.
    pub height: u32,
    /// Depth target.
    pub depth: &'a [f32],
    /// Lights to cull.
    pub lights: &'a [PointLight],
}

impl CullingInputs<'_> {
    /// Culls one tile into `out` (its `max_lights_per_tile` slots).
    pub fn cull(&self, tile_x: u32, tile_y: u32, out: &mut [u32]) -> TileStats {
        let bounds = self
            .config
            .tile_bounds(tile_x, tile_y, self.width, self.height);
        let (min_depth, max_depth) = tile_depth_range(self.depth, &bounds, self.width);
        let frustum = tile_frustum(
            &self.inverse_projection,
            &bounds,
            self.width,
            self.height,
            min_depth,
            max_depth,
        );
        let (light_count, overflow) = cull_tile(&frustum, &self.view, self.lights, out);
        TileStats {
            light_count,
            min_depth,
            max_depth,
            overflow,
        }
    }
}

/// Culls every tile on the host. Returns `None` if the projection is singular.
pub fn cull_lights_reference(
    depth: &[f32],
    view: &ViewInfo,
    lights: &[PointLight],
    config: &TiledCullingConfig,
    width: u32,
    height: u32,
) -> Option<TileLightGrid> {
    let inputs = CullingInputs {
        view: view.view,
        inverse_projection: view.projection.inverse()?,
        config: *config,
        width,
        height,
        depth,
        lights,
    };
    let (tiles_x, tiles_y) = config.tile_dimensions(width, height);
    let capacity = config.max_lights_per_tile as usize;
    let mut indices = vec![0u32; tiles_x as usize * tiles_y as usize * capacity];
    let mut stats = Vec::with_capacity(tiles_x as usize * tiles_y as usize);
    for (tile, chunk) in indices.chunks_mut(capacity.max(1)).enumerate() {
        let tile = tile as u32;
        stats.push(inputs.cull(tile % tiles_x, tile / tiles_x, chunk));
    }
    Some(TileLightGrid {
        tiles_x,
        tiles_y,
        capacity: config.max_lights_per_tile,
        stats,
        indices,
    })
}

/// The culling compute kernel: one workgroup per tile.
#[derive(Debug, Default, Clone, Copy)]
pub struct LightCullingKernel;

impl ComputeKernel for LightCullingKernel {
    fn label(&self) -> &str {
        "tile_light_culling"
    }

    fn source(&self) -> Option<KernelSource> {
        Some(KernelSource {
            wgsl: shaders::LIGHT_CULLING_WGSL,
            entry_point: "main",
        })
    }

    fn run_workgroup(
        &self,
        id: WorkgroupId,
        resources: &mut KernelResources<'_>,
    ) -> Result<(), KernelError> {
        let uniforms: &LightCullingUniforms = resources.uniform(culling_bindings::UNIFORMS)?;
        let [tiles_x, tiles_y] = uniforms.tile_count;
        if id.x >= tiles_x || id.y >= tiles_y {
            return Ok(());
        }
        let [width, height] = uniforms.screen_size;
        let lights: &[PointLight] = resources.read(culling_bindings::LIGHTS)?;
        let depth: &[f32] = resources.read(culling_bindings::DEPTH)?;
        if depth.len() < width as usize * height as usize {
            return Err(KernelError::Layout {
                binding: culling_bindings::DEPTH,
                reason: format!("{} depth samples for a {width}x{height} target", depth.len()),
            });
        }
        let num_lights = (uniforms.num_lights as usize).min(lights.len());

        let inputs = CullingInputs {
            view: Mat4::from_cols_array_2d(&uniforms.view),
            inverse_projection: Mat4::from_cols_array_2d(&uniforms.inverse_projection),
            config: TiledCullingConfig::new(uniforms.tile_size, uniforms.max_lights_per_tile),
            width,
            height,
            depth,
            lights: &lights[..num_lights],
        };

        let tile = (id.y * tiles_x + id.x) as usize;
        let capacity = uniforms.max_lights_per_tile as usize;
        let indices: &mut [u32] = resources.write(culling_bindings::LIGHT_INDICES)?;
        let out = indices
            .get_mut(tile * capacity..(tile + 1) * capacity)
            .ok_or_else(|| KernelError::Layout {
                binding: culling_bindings::LIGHT_INDICES,
                reason: format!("no room for tile {tile}"),
            })?;
        let stats = inputs.cull(id.x, id.y, out);

        let all_stats: &mut [TileStats] = resources.write(culling_bindings::TILE_STATS)?;
        let slot = all_stats.get_mut(tile).ok_or_else(|| KernelError::Layout {
            binding: culling_bindings::TILE_STATS,
            reason: format!("no stats slot for tile {tile}"),
        })?;
        *slot = stats;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use translux_core::math::degrees_to_radians;

    const W: u32 = 64;
    const H: u32 = 48;

    fn view_info() -> ViewInfo {
        ViewInfo::new(
            Mat4::IDENTITY,
            Mat4::perspective_rh_zo(degrees_to_radians(60.0), W as f32 / H as f32, 0.1, 100.0),
            Vec3::ZERO,
        )
    }

    /// Depth of a plane at view distance `z` over the whole screen.
    fn flat_depth(view: &ViewInfo, distance: f32) -> Vec<f32> {
        let d = view
            .projection
            .project_point3(Vec3::new(0.0, 0.0, -distance))
            .z;
        vec![d; (W * H) as usize]
    }

    #[test]
    fn test_depth_range_of_partial_tile() {
        let config = TiledCullingConfig::new(16, 8);
        let mut depth = vec![0.5f32; 20 * 20];
        depth[19 * 20 + 19] = 0.25;
        let bounds = config.tile_bounds(1, 1, 20, 20);
        assert_eq!((bounds.width(), bounds.height()), (4, 4));
        assert_eq!(tile_depth_range(&depth, &bounds, 20), (0.25, 0.5));
    }

    #[test]
    fn test_empty_tile_reports_cleared_depth() {
        let bounds = TileBounds {
            x0: 4,
            y0: 4,
            x1: 4,
            y1: 4,
        };
        assert_eq!(tile_depth_range(&[], &bounds, 4), (1.0, 1.0));
    }

    #[test]
    fn test_tile_frustum_contains_its_own_center_ray() {
        let view = view_info();
        let inv = view.projection.inverse().unwrap();
        let config = TiledCullingConfig::new(16, 8);
        let bounds = config.tile_bounds(1, 1, W, H);
        let frustum = tile_frustum(&inv, &bounds, W, H, 0.0, 1.0);
        let (cx, cy) = screen_to_ndc(24.0, 24.0, W, H);
        let p = inv.project_point3(Vec3::new(cx, cy, 0.5));
        assert!(frustum.planes.iter().all(|pl| pl.signed_distance(p) >= -1e-4));
    }

    #[test]
    fn test_light_near_surface_is_kept_and_far_light_culled() {
        let view = view_info();
        let depth = flat_depth(&view, 10.0);
        let lights = [
            PointLight::new(Vec3::new(0.0, 0.0, -10.5), [1.0; 3], 1.0),
            PointLight::new(Vec3::new(0.0, 0.0, -30.0), [1.0; 3], 1.0),
            PointLight::new(Vec3::new(0.0, 0.0, -2.0), [1.0; 3], 1.0),
        ];
        let config = TiledCullingConfig::new(16, 8);
        let grid = cull_lights_reference(&depth, &view, &lights, &config, W, H).unwrap();
        let (cx, cy) = config.tile_of_pixel(W / 2, H / 2);
        assert_eq!(grid.lights_in_tile(cx, cy), &[0]);
        assert_relative_eq!(grid.stats_at(cx, cy).min_depth, depth[0]);
        assert_eq!(grid.dropped_lights(), 0);
    }

    #[test]
    fn test_light_behind_surface_within_radius_is_kept() {
        let view = view_info();
        let depth = flat_depth(&view, 10.0);
        let lights = [PointLight::new(Vec3::new(0.0, 0.0, -11.9), [1.0; 3], 2.0)];
        let config = TiledCullingConfig::new(16, 8);
        let grid = cull_lights_reference(&depth, &view, &lights, &config, W, H).unwrap();
        let (cx, cy) = config.tile_of_pixel(W / 2, H / 2);
        assert_eq!(grid.lights_in_tile(cx, cy), &[0]);
    }

    #[test]
    fn test_zero_lights_gives_empty_lists() {
        let view = view_info();
        let depth = flat_depth(&view, 5.0);
        let config = TiledCullingConfig::new(16, 4);
        let grid = cull_lights_reference(&depth, &view, &[], &config, W, H).unwrap();
        assert_eq!(grid.stats.len(), 12);
        assert_eq!(grid.total_references(), 0);
    }

    #[test]
    fn test_capacity_truncation_is_counted() {
        let view = view_info();
        let depth = flat_depth(&view, 10.0);
        let lights: Vec<PointLight> = (0..5)
            .map(|i| PointLight::new(Vec3::new(0.0, 0.0, -10.0 - i as f32 * 0.1), [1.0; 3], 1.0))
            .collect();
        let config = TiledCullingConfig::new(16, 3);
        let grid = cull_lights_reference(&depth, &view, &lights, &config, W, H).unwrap();
        let (cx, cy) = config.tile_of_pixel(W / 2, H / 2);
        assert_eq!(grid.lights_in_tile(cx, cy), &[0, 1, 2]);
        assert_eq!(grid.stats_at(cx, cy).overflow, 2);
        assert!(grid.stats.iter().all(|s| s.light_count <= 3));
    }

    #[test]
    fn test_kernel_matches_reference_on_host_resources() {
        let view = view_info();
        let depth = flat_depth(&view, 8.0);
        let lights = [
            PointLight::new(Vec3::new(1.0, 0.5, -8.0), [1.0; 3], 1.5),
            PointLight::new(Vec3::new(-3.0, -2.0, -9.0), [1.0; 3], 0.5),
        ];
        let config = TiledCullingConfig::new(16, 4);
        let reference = cull_lights_reference(&depth, &view, &lights, &config, W, H).unwrap();

        let uniforms = LightCullingUniforms::new(&view, &config, W, H, 2).unwrap();
        let mut indices = vec![0u32; reference.indices.len()];
        let mut stats = vec![TileStats::default(); reference.stats.len()];
        let (tiles_x, tiles_y) = config.tile_dimensions(W, H);
        for y in 0..tiles_y {
            for x in 0..tiles_x {
                let mut res = KernelResources::new();
                res.bind_read(culling_bindings::UNIFORMS, bytemuck::bytes_of(&uniforms));
                res.bind_read(culling_bindings::LIGHTS, bytemuck::cast_slice(&lights));
                res.bind_read(culling_bindings::DEPTH, bytemuck::cast_slice(&depth));
                res.bind_write(culling_bindings::LIGHT_INDICES, bytemuck::cast_slice_mut(&mut indices));
                res.bind_write(culling_bindings::TILE_STATS, bytemuck::cast_slice_mut(&mut stats));
                LightCullingKernel
                    .run_workgroup(WorkgroupId::new(x, y, 0), &mut res)
                    .unwrap();
            }
        }
        assert_eq!(stats, reference.stats);
        assert_eq!(indices, reference.indices);
    }

    #[test]
    fn test_program_matches_binding_table() {
        let source = LightCullingKernel.source().unwrap();
        assert_eq!(source.entry_point, "main");
        for (binding, name) in [
            (culling_bindings::LIGHTS, "lights"),
            (culling_bindings::DEPTH, "depth"),
            (culling_bindings::LIGHT_INDICES, "light_indices"),
        ] {
            assert!(source.wgsl.contains(&format!("@binding({binding}) var<storage")));
            assert!(source.wgsl.contains(&format!("> {name}:")));
        }
    }
}
