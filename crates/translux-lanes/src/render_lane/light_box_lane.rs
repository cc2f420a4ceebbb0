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

//! Light-box overlay: draws a small emissive cube at every light position,
//! depth-tested against the scene.

use super::screen::{ndc_to_screen, pixel_index};
use super::{shaders, RenderWorld};
use crate::device_util;
use bytemuck::{Pod, Zeroable};
use std::sync::{Arc, Mutex, PoisonError};
use translux_core::lane::{
    ColorTarget, CubeMesh, DepthTarget, Lane, LaneContext, LaneError, LaneKind, ScreenExtent,
    TileLightLists,
};
use translux_core::math::{Mat4, Vec3, Vec4};
use translux_core::renderer::{
    BufferBinding, BufferId, BufferUsage, ComputeDispatch, ComputeKernel, KernelError,
    KernelResources, KernelSource, MeshVertex, PointLight, ViewInfo, WorkgroupId,
};

/// Half-extent of a light box relative to the unit cube.
pub const LIGHT_BOX_SCALE: f32 = 0.0125;

/// Binding indices of [`LightBoxKernel`].
pub mod light_box_bindings {
    /// [`LightBoxUniforms`](super::LightBoxUniforms).
    pub const UNIFORMS: u32 = 0;
    /// `[PointLight]`.
    pub const LIGHTS: u32 = 1;
    /// Cube triangle list.
    pub const CUBE: u32 = 2;
    /// Depth target, tested and updated.
    pub const DEPTH: u32 = 3;
    /// Color target.
    pub const COLOR: u32 = 4;
}

/// Uniform block of the light-box kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightBoxUniforms {
    /// World to clip.
    pub view_projection: [[f32; 4]; 4],
    /// Target size in pixels.
    pub screen_size: [u32; 2],
    /// Number of lights to draw.
    pub light_count: u32,
    /// Cube scale.
    pub box_scale: f32,
}

fn edge(a: (f32, f32), b: (f32, f32), p: (f32, f32)) -> f32 {
    (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
}

/// Calls `plot(px, py, depth)` for every pixel center covered by the
/// clip-space triangle. Triangles crossing `w <= 0` are skipped.
pub fn rasterize_triangle(
    clip: [Vec4; 3],
    width: u32,
    height: u32,
    mut plot: impl FnMut(u32, u32, f32),
) {
    if clip.iter().any(|v| v.w <= f32::EPSILON) {
        return;
    }
    let ndc = clip.map(|v| v.project());
    let screen = ndc.map(|v| ndc_to_screen(v.x, v.y, width, height));
    let area = edge(screen[0], screen[1], screen[2]);
    if area.abs() <= f32::EPSILON {
        return;
    }

    let min_x = screen.iter().map(|s| s.0).fold(f32::MAX, f32::min).floor().max(0.0) as u32;
    let min_y = screen.iter().map(|s| s.1).fold(f32::MAX, f32::min).floor().max(0.0) as u32;
    let max_x = (screen.iter().map(|s| s.0).fold(f32::MIN, f32::max).ceil().max(0.0) as u32).min(width);
    let max_y = (screen.iter().map(|s| s.1).fold(f32::MIN, f32::max).ceil().max(0.0) as u32).min(height);

    for py in min_y..max_y {
        for px in min_x..max_x {
            let p = (px as f32 + 0.5, py as f32 + 0.5);
            let b0 = edge(screen[1], screen[2], p) / area;
            let b1 = edge(screen[2], screen[0], p) / area;
            let b2 = edge(screen[0], screen[1], p) / area;
            if b0 < 0.0 || b1 < 0.0 || b2 < 0.0 {
                continue;
            }
            let z = b0 * ndc[0].z + b1 * ndc[1].z + b2 * ndc[2].z;
            if (0.0..=1.0).contains(&z) {
                plot(px, py, z);
            }
        }
    }
}

/// Draws all light boxes in a single workgroup.
#[derive(Debug, Default, Clone, Copy)]
pub struct LightBoxKernel;

impl ComputeKernel for LightBoxKernel {
    fn label(&self) -> &str {
        "light_boxes"
    }

    fn source(&self) -> Option<KernelSource> {
        Some(KernelSource {
            wgsl: shaders::LIGHT_BOXES_WGSL,
            entry_point: "main",
        })
    }

    fn run_workgroup(
        &self,
        _id: WorkgroupId,
        resources: &mut KernelResources<'_>,
    ) -> Result<(), KernelError> {
        let u: &LightBoxUniforms = resources.uniform(light_box_bindings::UNIFORMS)?;
        let lights: &[PointLight] = resources.read(light_box_bindings::LIGHTS)?;
        let cube: &[MeshVertex] = resources.read(light_box_bindings::CUBE)?;
        let depth: &mut [f32] = resources.write(light_box_bindings::DEPTH)?;
        let color: &mut [[f32; 4]] = resources.write(light_box_bindings::COLOR)?;
        let [width, height] = u.screen_size;
        let pixels = width as usize * height as usize;
        if depth.len() < pixels || color.len() < pixels {
            return Err(KernelError::Layout {
                binding: light_box_bindings::COLOR,
                reason: "targets are smaller than the screen".into(),
            });
        }

        let view_projection = Mat4::from_cols_array_2d(&u.view_projection);
        let scale = Mat4::from_scale(Vec3::ONE * u.box_scale);
        for light in lights.iter().take(u.light_count as usize) {
            let mvp = view_projection * Mat4::from_translation(light.position()) * scale;
            let rgb = light.rgb();
            for tri in cube.chunks_exact(3) {
                let clip = [0, 1, 2].map(|i| mvp * Vec4::from_vec3(Vec3::from_array(tri[i].position), 1.0));
                rasterize_triangle(clip, width, height, |px, py, z| {
                    let index = pixel_index(px, py, width);
                    if z < depth[index] {
                        depth[index] = z;
                        color[index] = [rgb.x, rgb.y, rgb.z, 1.0];
                    }
                });
            }
        }
        Ok(())
    }
}

/// Draws the light boxes over the shaded frame.
#[derive(Debug)]
pub struct LightBoxLane {
    box_scale: f32,
    kernel: LightBoxKernel,
    uniforms: Mutex<Option<BufferId>>,
}

impl Default for LightBoxLane {
    fn default() -> Self {
        Self::new(LIGHT_BOX_SCALE)
    }
}

impl LightBoxLane {
    /// Creates the lane with a custom box scale.
    pub fn new(box_scale: f32) -> Self {
        Self {
            box_scale,
            kernel: LightBoxKernel,
            uniforms: Mutex::new(None),
        }
    }
}

impl Lane for LightBoxLane {
    fn strategy_name(&self) -> &'static str {
        "LightBoxes"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Overlay
    }

    fn on_initialize(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let device = device_util::device(ctx)?;
        let id = device_util::create_array::<LightBoxUniforms>(
            device.as_ref(),
            "light_box_uniforms",
            1,
            BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        )
        .map_err(LaneError::initialization)?;
        *self.uniforms.lock().unwrap_or_else(PoisonError::into_inner) = Some(id);
        Ok(())
    }

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let device = device_util::device(ctx)?;
        let extent = *ctx.require::<ScreenExtent>("ScreenExtent")?;
        let view = *ctx.require::<ViewInfo>("ViewInfo")?;
        let world = ctx.require::<Arc<RenderWorld>>("Arc<RenderWorld>")?.clone();
        let depth = ctx.require::<DepthTarget>("DepthTarget")?.0;
        let color = ctx.require::<ColorTarget>("ColorTarget")?.0;
        let cube = ctx.require::<CubeMesh>("CubeMesh")?.0;
        let lists = *ctx.require::<TileLightLists>("TileLightLists")?;
        let uniform_buffer = self
            .uniforms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ok_or(LaneError::NotInitialized)?;

        if world.lights.is_empty() {
            return Ok(());
        }
        let uniforms = LightBoxUniforms {
            view_projection: view.view_projection().to_cols_array_2d(),
            screen_size: [extent.width, extent.height],
            light_count: world.lights.len() as u32,
            box_scale: self.box_scale,
        };
        device
            .write_buffer(uniform_buffer, 0, bytemuck::bytes_of(&uniforms))
            .map_err(LaneError::execution)?;

        let binds = [
            BufferBinding::read(light_box_bindings::UNIFORMS, uniform_buffer),
            BufferBinding::read(light_box_bindings::LIGHTS, lists.light_buffer),
            BufferBinding::read(light_box_bindings::CUBE, cube),
            BufferBinding::read_write(light_box_bindings::DEPTH, depth),
            BufferBinding::read_write(light_box_bindings::COLOR, color),
        ];
        device
            .dispatch(&ComputeDispatch::new_2d("light_boxes", &self.kernel, &binds, 1, 1))
            .map_err(LaneError::execution)?;
        device.memory_barrier();
        Ok(())
    }

    fn on_shutdown(&self, ctx: &mut LaneContext) {
        let Ok(device) = device_util::device(ctx) else {
            return;
        };
        device_util::release(
            device.as_ref(),
            &mut self.uniforms.lock().unwrap_or_else(PoisonError::into_inner),
        );
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
    use translux_core::math::degrees_to_radians;
    use translux_core::renderer::cube_vertices;

    const W: u32 = 32;
    const H: u32 = 32;

    fn draw(lights: &[PointLight], depth: &mut [f32], color: &mut [[f32; 4]]) {
        let eye = Vec3::new(0.0, 0.0, 0.2);
        let view = ViewInfo::new(
            Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y).unwrap(),
            Mat4::perspective_rh_zo(degrees_to_radians(45.0), 1.0, 0.1, 100.0),
            eye,
        );
        let uniforms = LightBoxUniforms {
            view_projection: view.view_projection().to_cols_array_2d(),
            screen_size: [W, H],
            light_count: lights.len() as u32,
            box_scale: LIGHT_BOX_SCALE,
        };
        let cube = cube_vertices();
        let mut res = KernelResources::new();
        res.bind_read(light_box_bindings::UNIFORMS, bytemuck::bytes_of(&uniforms));
        res.bind_read(light_box_bindings::LIGHTS, bytemuck::cast_slice(lights));
        res.bind_read(light_box_bindings::CUBE, bytemuck::cast_slice(&cube));
        res.bind_write(light_box_bindings::DEPTH, bytemuck::cast_slice_mut(depth));
        res.bind_write(light_box_bindings::COLOR, bytemuck::cast_slice_mut(color));
        LightBoxKernel
            .run_workgroup(WorkgroupId::new(0, 0, 0), &mut res)
            .unwrap();
    }

    #[test]
    fn test_program_is_a_single_workgroup() {
        let source = LightBoxKernel.source().unwrap();
        assert_eq!(source.entry_point, "main");
        assert!(source.wgsl.contains("@workgroup_size(256)"));
    }

    #[test]
    fn test_box_drawn_at_light_position() {
        let light = PointLight::new(Vec3::ZERO, [1.0, 0.5, 0.25], 2.0);
        let mut depth = vec![1.0f32; (W * H) as usize];
        let mut color = vec![[0.0f32; 4]; (W * H) as usize];
        draw(&[light], &mut depth, &mut color);
        let center = pixel_index(W / 2, H / 2, W);
        assert_eq!(color[center], [1.0, 0.5, 0.25, 1.0]);
        assert!(depth[center] < 1.0);
        assert_eq!(color[0], [0.0; 4]);
    }

    #[test]
    fn test_box_hidden_behind_closer_geometry() {
        let light = PointLight::new(Vec3::ZERO, [1.0, 1.0, 1.0], 2.0);
        let mut depth = vec![0.0f32; (W * H) as usize];
        let mut color = vec![[0.0f32; 4]; (W * H) as usize];
        draw(&[light], &mut depth, &mut color);
        assert!(color.iter().all(|c| *c == [0.0; 4]));
    }

    #[test]
    fn test_rasterize_skips_triangles_behind_the_eye() {
        let mut hits = 0;
        let clip = [
            Vec4::new(0.0, 0.0, 0.5, -1.0),
            Vec4::new(1.0, 0.0, 0.5, 1.0),
            Vec4::new(0.0, 1.0, 0.5, 1.0),
        ];
        rasterize_triangle(clip, W, H, |_, _, _| hits += 1);
        assert_eq!(hits, 0);
    }

    #[test]
    fn test_rasterize_full_screen_triangle_covers_pixels_once() {
        let mut hits = vec![0u32; (W * H) as usize];
        let clip = [
            Vec4::new(-1.0, -1.0, 0.5, 1.0),
            Vec4::new(3.0, -1.0, 0.5, 1.0),
            Vec4::new(-1.0, 3.0, 0.5, 1.0),
        ];
        rasterize_triangle(clip, W, H, |px, py, z| {
            assert!((z - 0.5).abs() < 1e-6);
            hits[pixel_index(px, py, W)] += 1;
        });
        assert!(hits.iter().all(|&h| h == 1));
    }
}
