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

//! Tiled shading: deferred (full-screen quad over the G-buffer) and forward
//! (geometry re-intersected with a depth-equal test against the pre-pass).
//!
//! Both paths evaluate only the lights listed for the pixel's tile. Debug
//! views replace the lit color with the tile heatmap, linear depth or normals.

use super::geometry_pass_lane::trace_spheres;
use super::screen::{
    linearize_depth, pixel_center_ndc, pixel_index, primary_ray, CLEAR_COLOR, CLEAR_DEPTH,
};
use super::shading::{heatmap_color, normal_color, shade_surface, SurfaceSample};
use super::{shaders, RenderWorld};
use crate::device_util;
use bytemuck::{Pod, Zeroable};
use std::sync::{Arc, Mutex, PoisonError};
use translux_core::lane::{
    ColorTarget, DebugViewMode, DepthTarget, GBufferTargets, Lane, LaneContext, LaneError,
    LaneKind, QuadMesh, ScreenExtent, TileLightLists,
};
use translux_core::math::{Mat4, Vec3};
use translux_core::renderer::{
    BufferBinding, BufferId, BufferUsage, ComputeDevice, ComputeDispatch, ComputeKernel,
    DebugView, KernelError, KernelResources, KernelSource, MeshVertex, PointLight, RenderError,
    ResourceError,
    SceneSphere, TileStats, TiledCullingConfig, ViewInfo, WorkgroupId,
};

/// Maximum difference between the pre-pass depth and the re-intersected
/// depth for a forward fragment to pass the depth-equal test.
pub const DEPTH_EQUAL_TOLERANCE: f32 = 1e-6;

/// Binding indices of [`TiledShadingKernel`].
pub mod shading_bindings {
    /// [`ShadingUniforms`](super::ShadingUniforms).
    pub const UNIFORMS: u32 = 0;
    /// `[PointLight]`.
    pub const LIGHTS: u32 = 1;
    /// Per-tile light index lists.
    pub const LIGHT_INDICES: u32 = 2;
    /// Per-tile statistics.
    pub const TILE_STATS: u32 = 3;
    /// G-buffer positions (deferred).
    pub const GBUFFER_POSITION: u32 = 4;
    /// G-buffer normals (deferred).
    pub const GBUFFER_NORMAL: u32 = 5;
    /// G-buffer albedo (deferred).
    pub const GBUFFER_ALBEDO: u32 = 6;
    /// Depth target.
    pub const DEPTH: u32 = 7;
    /// Full-screen quad vertices (deferred).
    pub const QUAD: u32 = 8;
    /// Color target.
    pub const COLOR: u32 = 9;
    /// Scene spheres (forward).
    pub const SPHERES: u32 = 10;
}

/// Which tiled shading variant runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadingPath {
    /// Reads surfaces from the G-buffer.
    Deferred,
    /// Re-intersects the scene and depth-tests against the pre-pass.
    Forward,
}

/// Uniform block of the shading kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ShadingUniforms {
    /// World to clip.
    pub view_projection: [[f32; 4]; 4],
    /// Clip to world.
    pub inverse_view_projection: [[f32; 4]; 4],
    /// View to clip, for depth linearization.
    pub projection: [[f32; 4]; 4],
    /// Eye position, `w` unused.
    pub camera_position: [f32; 4],
    /// Ambient radiance, `w` unused.
    pub ambient: [f32; 4],
    /// Target size in pixels.
    pub screen_size: [u32; 2],
    /// Tile grid size.
    pub tile_count: [u32; 2],
    /// Tile side in pixels.
    pub tile_size: u32,
    /// Slots per tile in the index lists.
    pub max_lights_per_tile: u32,
    /// [`DebugView::index`].
    pub debug_view: u32,
    /// Number of valid spheres (forward).
    pub sphere_count: u32,
}

impl ShadingUniforms {
    /// Returns `None` if the view-projection matrix is singular.
    pub fn new(
        view: &ViewInfo,
        extent: ScreenExtent,
        lists: &TileLightLists,
        ambient: Vec3,
        debug_view: DebugView,
        sphere_count: u32,
    ) -> Option<Self> {
        let view_projection = view.view_projection();
        Some(Self {
            view_projection: view_projection.to_cols_array_2d(),
            inverse_view_projection: view_projection.inverse()?.to_cols_array_2d(),
            projection: view.projection.to_cols_array_2d(),
            camera_position: [view.position.x, view.position.y, view.position.z, 1.0],
            ambient: [ambient.x, ambient.y, ambient.z, 0.0],
            screen_size: [extent.width, extent.height],
            tile_count: [lists.tiles_x, lists.tiles_y],
            tile_size: lists.tile_size,
            max_lights_per_tile: lists.capacity,
            debug_view: debug_view.index(),
            sphere_count,
        })
    }
}

/// NDC rectangle covered by a vertex list, as `(min_x, min_y, max_x, max_y)`.
fn ndc_bounds(vertices: &[MeshVertex]) -> (f32, f32, f32, f32) {
    vertices.iter().fold(
        (f32::MAX, f32::MAX, f32::MIN, f32::MIN),
        |(x0, y0, x1, y1), v| {
            (
                x0.min(v.position[0]),
                y0.min(v.position[1]),
                x1.max(v.position[0]),
                y1.max(v.position[1]),
            )
        },
    )
}

fn vec3(v: [f32; 4]) -> Vec3 {
    Vec3::new(v[0], v[1], v[2])
}

fn layout_error(binding: u32, what: &str) -> KernelError {
    KernelError::Layout {
        binding,
        reason: format!("{what} is smaller than the screen"),
    }
}

/// Shades one tile per workgroup.
#[derive(Debug, Clone, Copy)]
pub struct TiledShadingKernel {
    path: ShadingPath,
}

impl TiledShadingKernel {
    /// Creates the kernel for `path`.
    pub const fn new(path: ShadingPath) -> Self {
        Self { path }
    }
}

impl ComputeKernel for TiledShadingKernel {
    fn label(&self) -> &str {
        match self.path {
            ShadingPath::Deferred => "tiled_deferred_shading",
            ShadingPath::Forward => "tiled_forward_shading",
        }
    }

    fn source(&self) -> Option<KernelSource> {
        let entry_point = match self.path {
            ShadingPath::Deferred => "deferred",
            ShadingPath::Forward => "forward",
        };
        Some(KernelSource {
            wgsl: shaders::TILED_SHADING_WGSL,
            entry_point,
        })
    }

    fn run_workgroup(
        &self,
        id: WorkgroupId,
        resources: &mut KernelResources<'_>,
    ) -> Result<(), KernelError> {
        let u: &ShadingUniforms = resources.uniform(shading_bindings::UNIFORMS)?;
        let [tiles_x, tiles_y] = u.tile_count;
        if id.x >= tiles_x || id.y >= tiles_y {
            return Ok(());
        }
        let [width, height] = u.screen_size;
        let lights: &[PointLight] = resources.read(shading_bindings::LIGHTS)?;
        let all_indices: &[u32] = resources.read(shading_bindings::LIGHT_INDICES)?;
        let stats: &[TileStats] = resources.read(shading_bindings::TILE_STATS)?;
        let depth: &[f32] = resources.read(shading_bindings::DEPTH)?;

        let tile = (id.y * tiles_x + id.x) as usize;
        let capacity = u.max_lights_per_tile as usize;
        let count = stats
            .get(tile)
            .map_or(0, |s| s.light_count.min(u.max_lights_per_tile)) as usize;
        let start = tile * capacity;
        let tile_lights = all_indices
            .get(start..start + count)
            .ok_or_else(|| layout_error(shading_bindings::LIGHT_INDICES, "light index buffer"))?;

        let debug_view = DebugView::from_index(u.debug_view).unwrap_or_default();
        let camera = vec3(u.camera_position);
        let ambient = vec3(u.ambient);
        let projection = Mat4::from_cols_array_2d(&u.projection);

        // Path-specific surface sources.
        let (gbuffer, quad_rect, spheres) = match self.path {
            ShadingPath::Deferred => {
                let position: &[[f32; 4]] = resources.read(shading_bindings::GBUFFER_POSITION)?;
                let normal: &[[f32; 4]] = resources.read(shading_bindings::GBUFFER_NORMAL)?;
                let albedo: &[[f32; 4]] = resources.read(shading_bindings::GBUFFER_ALBEDO)?;
                let quad: &[MeshVertex] = resources.read(shading_bindings::QUAD)?;
                (Some((position, normal, albedo)), Some(ndc_bounds(quad)), None)
            }
            ShadingPath::Forward => {
                let spheres: &[SceneSphere] = resources.read(shading_bindings::SPHERES)?;
                let n = (u.sphere_count as usize).min(spheres.len());
                (None, None, Some(&spheres[..n]))
            }
        };
        let view_projection = Mat4::from_cols_array_2d(&u.view_projection);
        let inverse_vp = Mat4::from_cols_array_2d(&u.inverse_view_projection);

        let color: &mut [[f32; 4]] = resources.write(shading_bindings::COLOR)?;

        let bounds = TiledCullingConfig::new(u.tile_size, u.max_lights_per_tile)
            .tile_bounds(id.x, id.y, width, height);
        for py in bounds.y0..bounds.y1 {
            for px in bounds.x0..bounds.x1 {
                let index = pixel_index(px, py, width);
                let stored_depth = *depth
                    .get(index)
                    .ok_or_else(|| layout_error(shading_bindings::DEPTH, "depth target"))?;
                let (nx, ny) = pixel_center_ndc(px, py, width, height);

                let surface = match (gbuffer, quad_rect, spheres) {
                    (Some((position, normal, albedo)), Some((x0, y0, x1, y1)), _) => {
                        let covered = nx >= x0 && nx <= x1 && ny >= y0 && ny <= y1;
                        let p = position
                            .get(index)
                            .ok_or_else(|| layout_error(shading_bindings::GBUFFER_POSITION, "G-buffer"))?;
                        match (covered && p[3] > 0.0, normal.get(index), albedo.get(index)) {
                            (true, Some(n), Some(a)) => Some(SurfaceSample {
                                position: vec3(*p),
                                normal: vec3(*n),
                                albedo: vec3(*a),
                            }),
                            _ => None,
                        }
                    }
                    (_, _, Some(spheres)) => {
                        let (origin, dir) = primary_ray(&inverse_vp, nx, ny);
                        trace_spheres(spheres, origin, dir).and_then(|hit| {
                            let d = view_projection.project_point3(hit.position).z;
                            ((d - stored_depth).abs() <= DEPTH_EQUAL_TOLERANCE).then_some(
                                SurfaceSample {
                                    position: hit.position,
                                    normal: hit.normal,
                                    albedo: hit.albedo,
                                },
                            )
                        })
                    }
                    _ => None,
                };

                let rgb = match (debug_view, surface) {
                    (DebugView::TileHeatmap, _) => Some(heatmap_color(count as u32)),
                    (DebugView::Depth, _) => {
                        let l = if stored_depth >= CLEAR_DEPTH {
                            1.0
                        } else {
                            linearize_depth(stored_depth, &projection)
                        };
                        Some([l, l, l])
                    }
                    (DebugView::Normals, Some(s)) => Some(normal_color(s.normal)),
                    (DebugView::Lit, Some(s)) => {
                        let c = shade_surface(&s, camera, ambient, lights, tile_lights);
                        Some([c.x, c.y, c.z])
                    }
                    (_, None) => None,
                };

                *color
                    .get_mut(index)
                    .ok_or_else(|| layout_error(shading_bindings::COLOR, "color target"))? = match rgb {
                    Some([r, g, b]) => [r, g, b, 1.0],
                    None => CLEAR_COLOR,
                };
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ShadingResources {
    uniforms: Option<BufferId>,
    spheres: Option<BufferId>,
    color: Option<BufferId>,
}

/// Resolves the lit color of every pixel using the per-tile light lists.
#[derive(Debug)]
pub struct TiledShadingLane {
    kernel: TiledShadingKernel,
    resources: Mutex<ShadingResources>,
}

impl TiledShadingLane {
    /// Creates a shading lane for `path`.
    pub fn new(path: ShadingPath) -> Self {
        Self {
            kernel: TiledShadingKernel::new(path),
            resources: Mutex::new(ShadingResources::default()),
        }
    }

    /// Tiled deferred shading.
    pub fn deferred() -> Self {
        Self::new(ShadingPath::Deferred)
    }

    /// Tiled forward shading.
    pub fn forward() -> Self {
        Self::new(ShadingPath::Forward)
    }

    /// The configured path.
    pub fn path(&self) -> ShadingPath {
        self.kernel.path
    }

    fn create_buffers(&self, device: &dyn ComputeDevice, extent: ScreenExtent) -> Result<BufferId, ResourceError> {
        let mut res = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
        res.uniforms = Some(device_util::create_array::<ShadingUniforms>(
            device,
            "shading_uniforms",
            1,
            BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        )?);
        let color = device_util::create_array::<[f32; 4]>(
            device,
            "color_target",
            extent.pixel_count(),
            BufferUsage::STORAGE | BufferUsage::MAP_READ,
        )?;
        res.color = Some(color);
        Ok(color)
    }
}

impl Lane for TiledShadingLane {
    fn strategy_name(&self) -> &'static str {
        match self.kernel.path {
            ShadingPath::Deferred => "TiledDeferredShading",
            ShadingPath::Forward => "TiledForwardShading",
        }
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Shading
    }

    fn on_initialize(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let device = device_util::device(ctx)?;
        let extent = *ctx.require::<ScreenExtent>("ScreenExtent")?;
        let color = self
            .create_buffers(device.as_ref(), extent)
            .map_err(LaneError::initialization)?;
        ctx.insert(ColorTarget(color));
        Ok(())
    }

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let device = device_util::device(ctx)?;
        let extent = *ctx.require::<ScreenExtent>("ScreenExtent")?;
        let view = *ctx.require::<ViewInfo>("ViewInfo")?;
        let world = ctx.require::<Arc<RenderWorld>>("Arc<RenderWorld>")?.clone();
        let depth = ctx.require::<DepthTarget>("DepthTarget")?.0;
        let lists = *ctx.require::<TileLightLists>("TileLightLists")?;
        let debug_view = ctx.get::<DebugViewMode>().map(|m| m.0).unwrap_or_default();

        let mut res = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
        let (Some(uniform_buffer), Some(color)) = (res.uniforms, res.color) else {
            return Err(LaneError::NotInitialized);
        };

        let uniforms = ShadingUniforms::new(
            &view,
            extent,
            &lists,
            world.ambient(),
            debug_view,
            world.spheres.len() as u32,
        )
        .ok_or_else(|| {
            LaneError::execution(RenderError::Internal(
                "view-projection matrix is not invertible".into(),
            ))
        })?;
        device
            .write_buffer(uniform_buffer, 0, bytemuck::bytes_of(&uniforms))
            .map_err(LaneError::execution)?;

        let mut binds = vec![
            BufferBinding::read(shading_bindings::UNIFORMS, uniform_buffer),
            BufferBinding::read(shading_bindings::LIGHTS, lists.light_buffer),
            BufferBinding::read(shading_bindings::LIGHT_INDICES, lists.index_buffer),
            BufferBinding::read(shading_bindings::TILE_STATS, lists.stats_buffer),
            BufferBinding::read(shading_bindings::DEPTH, depth),
            BufferBinding::read_write(shading_bindings::COLOR, color),
        ];
        match self.kernel.path {
            ShadingPath::Deferred => {
                let gbuffer = *ctx.require::<GBufferTargets>("GBufferTargets")?;
                let quad = ctx.require::<QuadMesh>("QuadMesh")?.0;
                binds.extend([
                    BufferBinding::read(shading_bindings::GBUFFER_POSITION, gbuffer.position),
                    BufferBinding::read(shading_bindings::GBUFFER_NORMAL, gbuffer.normal),
                    BufferBinding::read(shading_bindings::GBUFFER_ALBEDO, gbuffer.albedo),
                    BufferBinding::read(shading_bindings::QUAD, quad),
                ]);
            }
            ShadingPath::Forward => {
                let spheres = device_util::ensure_array::<SceneSphere>(
                    device.as_ref(),
                    &mut res.spheres,
                    "forward_spheres",
                    world.spheres.len(),
                    BufferUsage::STORAGE | BufferUsage::COPY_DST,
                )
                .map_err(LaneError::execution)?;
                if !world.spheres.is_empty() {
                    device
                        .write_buffer(spheres, 0, bytemuck::cast_slice(&world.spheres))
                        .map_err(LaneError::execution)?;
                }
                binds.push(BufferBinding::read(shading_bindings::SPHERES, spheres));
            }
        }
        drop(res);

        device
            .dispatch(&ComputeDispatch::new_2d(
                self.kernel.label(),
                &self.kernel,
                &binds,
                lists.tiles_x,
                lists.tiles_y,
            ))
            .map_err(LaneError::execution)?;
        device.memory_barrier();

        ctx.insert(ColorTarget(color));
        Ok(())
    }

    fn on_shutdown(&self, ctx: &mut LaneContext) {
        let Ok(device) = device_util::device(ctx) else {
            return;
        };
        let mut guard = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
        let res = &mut *guard;
        for slot in [&mut res.uniforms, &mut res.spheres, &mut res.color] {
            device_util::release(device.as_ref(), slot);
        }
        ctx.remove::<ColorTarget>();
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_back;
    use crate::render_lane::{GeometryPassLane, LightCullingLane};
    use translux_core::math::degrees_to_radians;
    use translux_core::renderer::QUAD_VERTICES;
    use translux_infra::CpuComputeDevice;

    const W: u32 = 48;
    const H: u32 = 32;

    fn world(lights: Vec<PointLight>) -> RenderWorld {
        let mut world = RenderWorld::new();
        world.spheres.push(SceneSphere::new(Vec3::ZERO, 1.0, [1.0, 1.0, 1.0]));
        world.lights = lights;
        world.ambient = [0.1, 0.1, 0.1];
        world
    }

    fn frame(path: ShadingPath, world: RenderWorld, debug: DebugView) -> Vec<[f32; 4]> {
        let dyn_device: Arc<dyn ComputeDevice> = Arc::new(CpuComputeDevice::new());
        let eye = Vec3::new(0.0, 0.0, 4.0);
        let mut ctx = LaneContext::new();
        ctx.insert(dyn_device.clone());
        ctx.insert(ScreenExtent { width: W, height: H });
        ctx.insert(ViewInfo::new(
            Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y).unwrap(),
            Mat4::perspective_rh_zo(degrees_to_radians(45.0), W as f32 / H as f32, 0.1, 100.0),
            eye,
        ));
        ctx.insert(Arc::new(world));
        ctx.insert(DebugViewMode(debug));
        let quad = device_util::create_with_data(
            dyn_device.as_ref(),
            "quad",
            &QUAD_VERTICES,
            BufferUsage::STORAGE | BufferUsage::VERTEX,
        )
        .unwrap();
        ctx.insert(QuadMesh(quad));

        let geometry = match path {
            ShadingPath::Deferred => GeometryPassLane::gbuffer(),
            ShadingPath::Forward => GeometryPassLane::depth_prepass(),
        };
        let culling = LightCullingLane::new(TiledCullingConfig::new(16, 64));
        let shading = TiledShadingLane::new(path);
        let lanes: [&dyn Lane; 3] = [&geometry, &culling, &shading];
        for lane in lanes {
            lane.on_initialize(&mut ctx).unwrap();
        }
        for lane in lanes {
            lane.execute(&mut ctx).unwrap();
        }
        read_back(dyn_device.as_ref(), ctx.get::<ColorTarget>().unwrap().0).unwrap()
    }

    fn center() -> usize {
        pixel_index(W / 2, H / 2, W)
    }

    #[test]
    fn test_shutdown_releases_the_color_target() {
        let device: Arc<dyn ComputeDevice> = Arc::new(CpuComputeDevice::new());
        let mut ctx = LaneContext::new();
        ctx.insert(device.clone());
        ctx.insert(ScreenExtent { width: W, height: H });
        let lane = TiledShadingLane::new(ShadingPath::Forward);
        lane.on_initialize(&mut ctx).unwrap();
        let color = ctx.get::<ColorTarget>().unwrap().0;

        lane.on_shutdown(&mut ctx);
        assert!(!ctx.contains::<ColorTarget>());
        assert!(device.buffer_size(color).is_err());
    }

    #[test]
    fn test_paths_select_their_program() {
        let deferred = TiledShadingKernel::new(ShadingPath::Deferred).source().unwrap();
        let forward = TiledShadingKernel::new(ShadingPath::Forward).source().unwrap();
        assert_eq!(deferred.entry_point, "deferred");
        assert_eq!(forward.entry_point, "forward");
        assert!(forward.wgsl.contains("@binding(10) var<storage, read> spheres"));
    }

    #[test]
    fn test_ambient_only_without_lights() {
        for path in [ShadingPath::Deferred, ShadingPath::Forward] {
            let color = frame(path, world(Vec::new()), DebugView::Lit);
            let c = color[center()];
            assert!((c[0] - 0.1).abs() < 1e-5, "{path:?}: {c:?}");
            assert_eq!(color[0], CLEAR_COLOR);
        }
    }

    #[test]
    fn test_deferred_and_forward_agree() {
        let lights = vec![
            PointLight::new(Vec3::new(0.5, 0.5, 1.5), [1.0, 0.5, 0.25], 3.0),
            PointLight::new(Vec3::new(-1.0, 0.0, 1.0), [0.2, 0.2, 1.0], 2.0),
        ];
        let deferred = frame(ShadingPath::Deferred, world(lights.clone()), DebugView::Lit);
        let forward = frame(ShadingPath::Forward, world(lights), DebugView::Lit);
        for (d, f) in deferred.iter().zip(&forward) {
            for ch in 0..4 {
                assert!((d[ch] - f[ch]).abs() < 1e-5);
            }
        }
        assert!(deferred[center()][0] > 0.1);
    }

    #[test]
    fn test_heatmap_covers_background() {
        let lights = vec![PointLight::new(Vec3::new(0.0, 0.0, 1.5), [1.0; 3], 3.0)];
        let color = frame(ShadingPath::Forward, world(lights), DebugView::TileHeatmap);
        assert_ne!(color[center()], CLEAR_COLOR);
        assert!(color.iter().all(|c| c[3] == 1.0));
    }

    #[test]
    fn test_normals_view_faces_camera() {
        let color = frame(ShadingPath::Deferred, world(Vec::new()), DebugView::Normals);
        let c = color[center()];
        assert!(c[2] > 0.95, "{c:?}");
    }

    #[test]
    fn test_depth_view_is_white_for_background() {
        let color = frame(ShadingPath::Forward, world(Vec::new()), DebugView::Depth);
        assert_eq!(color[0], [1.0, 1.0, 1.0, 1.0]);
        assert!(color[center()][0] < 0.1);
    }
}
