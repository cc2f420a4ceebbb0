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

//! Geometry pass: ray-casts the analytic scene into the depth target and,
//! for the deferred path, the G-buffer.
//!
//! The forward path runs the same lane with [`GeometryOutput::DepthOnly`] as
//! its depth pre-pass.

use super::screen::{pixel_center_ndc, pixel_index, primary_ray, CLEAR_DEPTH, RASTER_BLOCK_SIZE};
use super::{shaders, RenderWorld};
use crate::device_util;
use bytemuck::{Pod, Zeroable};
use std::sync::{Arc, Mutex, PoisonError};
use translux_core::lane::{
    DepthTarget, GBufferTargets, Lane, LaneContext, LaneError, LaneKind, ScreenExtent,
};
use translux_core::math::{Mat4, Vec3};
use translux_core::renderer::{
    BufferBinding, BufferId, BufferUsage, ComputeDevice, ComputeDispatch, ComputeKernel, KernelError,
    KernelResources, KernelSource, RenderError, ResourceError, SceneSphere, ViewInfo, WorkgroupId,
};

/// Binding indices of [`SphereRaycastKernel`].
pub mod geometry_bindings {
    /// [`GeometryUniforms`](super::GeometryUniforms).
    pub const UNIFORMS: u32 = 0;
    /// `[SceneSphere]`.
    pub const SPHERES: u32 = 1;
    /// Depth target, one `f32` per pixel.
    pub const DEPTH: u32 = 2;
    /// World positions, `w = 1` where geometry was hit.
    pub const POSITION: u32 = 3;
    /// World normals.
    pub const NORMAL: u32 = 4;
    /// Albedo.
    pub const ALBEDO: u32 = 5;
}

/// What the geometry pass writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryOutput {
    /// Depth plus position, normal and albedo.
    GBuffer,
    /// Depth only (forward pre-pass).
    DepthOnly,
}

/// Uniform block of the ray-cast kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GeometryUniforms {
    /// World to clip.
    pub view_projection: [[f32; 4]; 4],
    /// Clip to world.
    pub inverse_view_projection: [[f32; 4]; 4],
    /// Target size in pixels.
    pub screen_size: [u32; 2],
    /// Number of valid spheres.
    pub sphere_count: u32,
    /// Non-zero when the G-buffer bindings are present.
    pub write_gbuffer: u32,
}

impl GeometryUniforms {
    /// Returns `None` if the view-projection matrix is singular.
    pub fn new(view: &ViewInfo, extent: ScreenExtent, sphere_count: u32, output: GeometryOutput) -> Option<Self> {
        let view_projection = view.view_projection();
        Some(Self {
            view_projection: view_projection.to_cols_array_2d(),
            inverse_view_projection: view_projection.inverse()?.to_cols_array_2d(),
            screen_size: [extent.width, extent.height],
            sphere_count,
            write_gbuffer: (output == GeometryOutput::GBuffer) as u32,
        })
    }
}

/// The closest surface along a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereHit {
    /// Ray parameter of the hit.
    pub t: f32,
    /// Index of the sphere that was hit.
    pub sphere: usize,
    /// World-space hit point.
    pub position: Vec3,
    /// Unit outward normal.
    pub normal: Vec3,
    /// Albedo of the sphere.
    pub albedo: Vec3,
}

/// Finds the nearest sphere hit along `origin + t * dir`.
pub fn trace_spheres(spheres: &[SceneSphere], origin: Vec3, dir: Vec3) -> Option<SphereHit> {
    let (sphere, t) = spheres
        .iter()
        .enumerate()
        .filter_map(|(i, s)| s.intersect_ray(origin, dir).map(|t| (i, t)))
        .min_by(|a, b| a.1.total_cmp(&b.1))?;
    let hit = &spheres[sphere];
    let position = origin + dir * t;
    Some(SphereHit {
        t,
        sphere,
        position,
        normal: (position - hit.center()).normalize(),
        albedo: Vec3::from_array(hit.albedo),
    })
}

/// Ray-casts one `RASTER_BLOCK_SIZE` square of pixels per workgroup.
#[derive(Debug, Clone, Copy)]
pub struct SphereRaycastKernel {
    output: GeometryOutput,
}

impl SphereRaycastKernel {
    /// Creates the kernel writing `output`.
    pub const fn new(output: GeometryOutput) -> Self {
        Self { output }
    }
}

impl ComputeKernel for SphereRaycastKernel {
    fn label(&self) -> &str {
        "sphere_raycast"
    }

    fn source(&self) -> Option<KernelSource> {
        let entry_point = match self.output {
            GeometryOutput::GBuffer => "gbuffer",
            GeometryOutput::DepthOnly => "depth_only",
        };
        Some(KernelSource {
            wgsl: shaders::GEOMETRY_WGSL,
            entry_point,
        })
    }

    fn run_workgroup(
        &self,
        id: WorkgroupId,
        resources: &mut KernelResources<'_>,
    ) -> Result<(), KernelError> {
        let uniforms: &GeometryUniforms = resources.uniform(geometry_bindings::UNIFORMS)?;
        let spheres: &[SceneSphere] = resources.read(geometry_bindings::SPHERES)?;
        let spheres = &spheres[..(uniforms.sphere_count as usize).min(spheres.len())];
        let [width, height] = uniforms.screen_size;
        let view_projection = Mat4::from_cols_array_2d(&uniforms.view_projection);
        let inverse_vp = Mat4::from_cols_array_2d(&uniforms.inverse_view_projection);

        let depth: &mut [f32] = resources.write(geometry_bindings::DEPTH)?;
        let mut gbuffer = if uniforms.write_gbuffer != 0 {
            let position: &mut [[f32; 4]] = resources.write(geometry_bindings::POSITION)?;
            let normal: &mut [[f32; 4]] = resources.write(geometry_bindings::NORMAL)?;
            let albedo: &mut [[f32; 4]] = resources.write(geometry_bindings::ALBEDO)?;
            Some((position, normal, albedo))
        } else {
            None
        };

        let x0 = id.x * RASTER_BLOCK_SIZE;
        let y0 = id.y * RASTER_BLOCK_SIZE;
        for py in y0..(y0 + RASTER_BLOCK_SIZE).min(height) {
            for px in x0..(x0 + RASTER_BLOCK_SIZE).min(width) {
                let index = pixel_index(px, py, width);
                let (nx, ny) = pixel_center_ndc(px, py, width, height);
                let (origin, dir) = primary_ray(&inverse_vp, nx, ny);
                let hit = trace_spheres(spheres, origin, dir);

                let sample = hit.map_or(CLEAR_DEPTH, |h| view_projection.project_point3(h.position).z);
                *depth.get_mut(index).ok_or_else(|| KernelError::Layout {
                    binding: geometry_bindings::DEPTH,
                    reason: "depth target smaller than the screen".into(),
                })? = sample;

                if let Some((position, normal, albedo)) = gbuffer.as_mut() {
                    let (p, n, a) = match hit {
                        Some(h) => (
                            [h.position.x, h.position.y, h.position.z, 1.0],
                            [h.normal.x, h.normal.y, h.normal.z, 0.0],
                            [h.albedo.x, h.albedo.y, h.albedo.z, 1.0],
                        ),
                        None => ([0.0; 4], [0.0; 4], [0.0; 4]),
                    };
                    let out_of_range = || KernelError::Layout {
                        binding: geometry_bindings::POSITION,
                        reason: "G-buffer smaller than the screen".into(),
                    };
                    *position.get_mut(index).ok_or_else(out_of_range)? = p;
                    *normal.get_mut(index).ok_or_else(out_of_range)? = n;
                    *albedo.get_mut(index).ok_or_else(out_of_range)? = a;
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct GeometryResources {
    uniforms: Option<BufferId>,
    spheres: Option<BufferId>,
    depth: Option<BufferId>,
    position: Option<BufferId>,
    normal: Option<BufferId>,
    albedo: Option<BufferId>,
}

/// Writes the depth target (and optionally the G-buffer) for the frame.
#[derive(Debug)]
pub struct GeometryPassLane {
    output: GeometryOutput,
    kernel: SphereRaycastKernel,
    resources: Mutex<GeometryResources>,
}

impl GeometryPassLane {
    /// Creates a lane producing `output`.
    pub fn new(output: GeometryOutput) -> Self {
        Self {
            output,
            kernel: SphereRaycastKernel::new(output),
            resources: Mutex::new(GeometryResources::default()),
        }
    }

    /// A deferred geometry pass.
    pub fn gbuffer() -> Self {
        Self::new(GeometryOutput::GBuffer)
    }

    /// A forward depth pre-pass.
    pub fn depth_prepass() -> Self {
        Self::new(GeometryOutput::DepthOnly)
    }

    /// The configured output.
    pub fn output(&self) -> GeometryOutput {
        self.output
    }

    fn create_targets(
        &self,
        device: &dyn ComputeDevice,
        extent: ScreenExtent,
    ) -> Result<(DepthTarget, Option<GBufferTargets>), ResourceError> {
        let mut res = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
        let pixels = extent.pixel_count();
        let target = BufferUsage::STORAGE | BufferUsage::MAP_READ;

        res.uniforms = Some(device_util::create_array::<GeometryUniforms>(
            device,
            "geometry_uniforms",
            1,
            BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        )?);
        let depth = device_util::create_array::<f32>(device, "depth_target", pixels, target)?;
        res.depth = Some(depth);

        let gbuffer = if self.output == GeometryOutput::GBuffer {
            let position = device_util::create_array::<[f32; 4]>(device, "gbuffer_position", pixels, target)?;
            let normal = device_util::create_array::<[f32; 4]>(device, "gbuffer_normal", pixels, target)?;
            let albedo = device_util::create_array::<[f32; 4]>(device, "gbuffer_albedo", pixels, target)?;
            res.position = Some(position);
            res.normal = Some(normal);
            res.albedo = Some(albedo);
            Some(GBufferTargets {
                position,
                normal,
                albedo,
            })
        } else {
            None
        };

        log::debug!(
            "GeometryPassLane: created {:?} targets for {}x{}",
            self.output,
            extent.width,
            extent.height
        );
        Ok((DepthTarget(depth), gbuffer))
    }

    fn publish(&self, ctx: &mut LaneContext) {
        let res = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(depth) = res.depth {
            ctx.insert(DepthTarget(depth));
        }
        if let (Some(position), Some(normal), Some(albedo)) = (res.position, res.normal, res.albedo) {
            ctx.insert(GBufferTargets {
                position,
                normal,
                albedo,
            });
        }
    }
}

impl Default for GeometryPassLane {
    fn default() -> Self {
        Self::gbuffer()
    }
}

impl Lane for GeometryPassLane {
    fn strategy_name(&self) -> &'static str {
        match self.output {
            GeometryOutput::GBuffer => "GeometryPass",
            GeometryOutput::DepthOnly => "DepthPrepass",
        }
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Geometry
    }

    fn on_initialize(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let device = device_util::device(ctx)?;
        let extent = *ctx.require::<ScreenExtent>("ScreenExtent")?;
        self.create_targets(device.as_ref(), extent)
            .map_err(LaneError::initialization)?;
        self.publish(ctx);
        Ok(())
    }

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let device = device_util::device(ctx)?;
        let extent = *ctx.require::<ScreenExtent>("ScreenExtent")?;
        let view = *ctx.require::<ViewInfo>("ViewInfo")?;
        let world = ctx.require::<Arc<RenderWorld>>("Arc<RenderWorld>")?.clone();

        let mut res = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
        let (Some(uniform_buffer), Some(depth)) = (res.uniforms, res.depth) else {
            return Err(LaneError::NotInitialized);
        };

        let uniforms = GeometryUniforms::new(&view, extent, world.spheres.len() as u32, self.output)
            .ok_or_else(|| {
                LaneError::execution(RenderError::Internal(
                    "view-projection matrix is not invertible".into(),
                ))
            })?;
        let spheres = device_util::ensure_array::<SceneSphere>(
            device.as_ref(),
            &mut res.spheres,
            "scene_spheres",
            world.spheres.len(),
            BufferUsage::STORAGE | BufferUsage::COPY_DST,
        )
        .map_err(LaneError::execution)?;

        device
            .write_buffer(uniform_buffer, 0, bytemuck::bytes_of(&uniforms))
            .map_err(LaneError::execution)?;
        if !world.spheres.is_empty() {
            device
                .write_buffer(spheres, 0, bytemuck::cast_slice(&world.spheres))
                .map_err(LaneError::execution)?;
        }

        let mut binds = vec![
            BufferBinding::read(geometry_bindings::UNIFORMS, uniform_buffer),
            BufferBinding::read(geometry_bindings::SPHERES, spheres),
            BufferBinding::read_write(geometry_bindings::DEPTH, depth),
        ];
        if let (Some(position), Some(normal), Some(albedo)) = (res.position, res.normal, res.albedo) {
            binds.push(BufferBinding::read_write(geometry_bindings::POSITION, position));
            binds.push(BufferBinding::read_write(geometry_bindings::NORMAL, normal));
            binds.push(BufferBinding::read_write(geometry_bindings::ALBEDO, albedo));
        }
        drop(res);

        device
            .dispatch(&ComputeDispatch::new_2d(
                self.strategy_name(),
                &self.kernel,
                &binds,
                extent.width.div_ceil(RASTER_BLOCK_SIZE),
                extent.height.div_ceil(RASTER_BLOCK_SIZE),
            ))
            .map_err(LaneError::execution)?;
        device.memory_barrier();

        self.publish(ctx);
        Ok(())
    }

    fn on_shutdown(&self, ctx: &mut LaneContext) {
        let Ok(device) = device_util::device(ctx) else {
            return;
        };
        let mut guard = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
        let res = &mut *guard;
        for slot in [
            &mut res.uniforms,
            &mut res.spheres,
            &mut res.depth,
            &mut res.position,
            &mut res.normal,
            &mut res.albedo,
        ] {
            device_util::release(device.as_ref(), slot);
        }
        ctx.remove::<DepthTarget>();
        ctx.remove::<GBufferTargets>();
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
