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

//! Screen display of the subsurface subject, textured with the composite
//! radiance map.

use super::shaders;
use super::texture_space_lane::sphere_texel_of;
use crate::device_util;
use crate::render_lane::{pixel_center_ndc, primary_ray, RenderWorld, CLEAR_COLOR, RASTER_BLOCK_SIZE};
use bytemuck::{Pod, Zeroable};
use std::sync::{Arc, Mutex, PoisonError};
use translux_core::lane::{
    ColorTarget, CompositeRadianceMap, Lane, LaneContext, LaneError, LaneKind, ScreenExtent,
};
use translux_core::math::Mat4;
use translux_core::renderer::{
    BufferBinding, BufferId, BufferUsage, ComputeDispatch, ComputeKernel, KernelDimensions,
    KernelError, KernelResources, KernelSource, RenderError, SceneSphere, ViewInfo, WorkgroupId,
};

/// Binding indices of [`SssDisplayKernel`].
pub mod display_bindings {
    /// [`SssDisplayUniforms`](super::SssDisplayUniforms).
    pub const UNIFORMS: u32 = 0;
    /// Composite radiance map.
    pub const COMPOSITE: u32 = 1;
    /// Color target.
    pub const COLOR: u32 = 2;
}

/// Uniform block of the display kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SssDisplayUniforms {
    /// Clip to world.
    pub inverse_view_projection: [[f32; 4]; 4],
    /// The displayed subject.
    pub subject: SceneSphere,
    /// Target size in pixels.
    pub screen_size: [u32; 2],
    /// Texture size of the composite map.
    pub tex_size: [u32; 2],
}

impl SssDisplayUniforms {
    /// `None` if the view-projection is singular.
    pub fn new(
        view: &ViewInfo,
        extent: ScreenExtent,
        subject: SceneSphere,
        dims: &KernelDimensions,
    ) -> Option<Self> {
        let inverse = view.view_projection().inverse()?;
        Some(Self {
            inverse_view_projection: inverse.to_cols_array_2d(),
            subject,
            screen_size: [extent.width, extent.height],
            tex_size: [dims.tex_width(), dims.tex_height()],
        })
    }
}

/// Ray-casts the subject and samples the composite map at the hit texel.
#[derive(Debug, Default, Clone, Copy)]
pub struct SssDisplayKernel;

impl ComputeKernel for SssDisplayKernel {
    fn label(&self) -> &str {
        "sss_display"
    }

    fn source(&self) -> Option<KernelSource> {
        Some(KernelSource {
            wgsl: shaders::SSS_DISPLAY_WGSL,
            entry_point: "main",
        })
    }

    fn run_workgroup(
        &self,
        id: WorkgroupId,
        resources: &mut KernelResources<'_>,
    ) -> Result<(), KernelError> {
        let u: &SssDisplayUniforms = resources.uniform(display_bindings::UNIFORMS)?;
        let composite: &[[f32; 4]] = resources.read(display_bindings::COMPOSITE)?;
        let color: &mut [[f32; 4]] = resources.write(display_bindings::COLOR)?;

        let [width, height] = u.screen_size;
        let [tex_w, tex_h] = u.tex_size;
        if color.len() < width as usize * height as usize {
            return Err(KernelError::Layout {
                binding: display_bindings::COLOR,
                reason: format!("color target is smaller than {width}x{height}"),
            });
        }
        if tex_w == 0 || tex_h == 0 || composite.len() < tex_w as usize * tex_h as usize {
            return Err(KernelError::Layout {
                binding: display_bindings::COMPOSITE,
                reason: format!("composite map is smaller than {tex_w}x{tex_h}"),
            });
        }
        let inverse = Mat4::from_cols_array_2d(&u.inverse_view_projection);
        let center = u.subject.center();

        let x0 = id.x * RASTER_BLOCK_SIZE;
        let y0 = id.y * RASTER_BLOCK_SIZE;
        for py in y0..(y0 + RASTER_BLOCK_SIZE).min(height) {
            for px in x0..(x0 + RASTER_BLOCK_SIZE).min(width) {
                let (nx, ny) = pixel_center_ndc(px, py, width, height);
                let (origin, dir) = primary_ray(&inverse, nx, ny);
                let index = py as usize * width as usize + px as usize;
                color[index] = match u.subject.intersect_ray(origin, dir) {
                    Some(t) => {
                        let normal = (origin + dir * t - center).normalize();
                        let (tx, ty) = sphere_texel_of(normal, tex_w, tex_h);
                        let texel = composite[ty as usize * tex_w as usize + tx as usize];
                        [texel[0], texel[1], texel[2], 1.0]
                    }
                    None => CLEAR_COLOR,
                };
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct DisplayResources {
    uniforms: Option<BufferId>,
    color: Option<BufferId>,
}

/// Draws the scattered subject into [`ColorTarget`].
#[derive(Debug)]
pub struct SssDisplayLane {
    dims: KernelDimensions,
    kernel: SssDisplayKernel,
    resources: Mutex<DisplayResources>,
}

impl SssDisplayLane {
    /// Creates the lane for composite maps of the given dimensions.
    pub fn new(dims: KernelDimensions) -> Self {
        Self {
            dims,
            kernel: SssDisplayKernel,
            resources: Mutex::new(DisplayResources::default()),
        }
    }
}

impl Lane for SssDisplayLane {
    fn strategy_name(&self) -> &'static str {
        "SssDisplay"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Shading
    }

    fn on_initialize(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let device = device_util::device(ctx)?;
        let extent = *ctx.require::<ScreenExtent>("ScreenExtent")?;
        let mut res = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
        let uniforms = device_util::create_array::<SssDisplayUniforms>(
            device.as_ref(),
            "sss_display_uniforms",
            1,
            BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        )
        .map_err(LaneError::initialization)?;
        let color = device_util::create_array::<[f32; 4]>(
            device.as_ref(),
            "sss_color_target",
            extent.pixel_count(),
            BufferUsage::STORAGE | BufferUsage::MAP_READ,
        )
        .map_err(LaneError::initialization)?;
        res.uniforms = Some(uniforms);
        res.color = Some(color);
        ctx.insert(ColorTarget(color));
        Ok(())
    }

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let device = device_util::device(ctx)?;
        let extent = *ctx.require::<ScreenExtent>("ScreenExtent")?;
        let view = *ctx.require::<ViewInfo>("ViewInfo")?;
        let world = ctx.require::<Arc<RenderWorld>>("Arc<RenderWorld>")?.clone();
        let composite = ctx.require::<CompositeRadianceMap>("CompositeRadianceMap")?.0;
        let (Some(uniform_buffer), Some(color)) = ({
            let res = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
            (res.uniforms, res.color)
        }) else {
            return Err(LaneError::NotInitialized);
        };
        let Some(subject) = world.sss_subject else {
            return Err(LaneError::execution(super::SssError::MissingSubject));
        };

        let uniforms =
            SssDisplayUniforms::new(&view, extent, subject, &self.dims)
                .ok_or_else(|| {
                    LaneError::execution(RenderError::Internal(
                        "view-projection matrix is not invertible".to_owned(),
                    ))
                })?;
        device
            .write_buffer(uniform_buffer, 0, bytemuck::bytes_of(&uniforms))
            .map_err(LaneError::execution)?;

        let binds = [
            BufferBinding::read(display_bindings::UNIFORMS, uniform_buffer),
            BufferBinding::read(display_bindings::COMPOSITE, composite),
            BufferBinding::read_write(display_bindings::COLOR, color),
        ];
        device
            .dispatch(&ComputeDispatch::new_2d(
                "sss_display",
                &self.kernel,
                &binds,
                extent.width.div_ceil(RASTER_BLOCK_SIZE),
                extent.height.div_ceil(RASTER_BLOCK_SIZE),
            ))
            .map_err(LaneError::execution)?;
        device.memory_barrier();
        Ok(())
    }

    fn on_shutdown(&self, ctx: &mut LaneContext) {
        ctx.remove::<ColorTarget>();
        let Ok(device) = device_util::device(ctx) else {
            return;
        };
        let mut res = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
        device_util::release(device.as_ref(), &mut res.uniforms);
        device_util::release(device.as_ref(), &mut res.color);
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
