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

//! Texture-space pass: lays the subsurface subject out on a latitude/longitude
//! grid and writes its world positions and direct radiance per texel.
//!
//! Texel `(x, y)` maps to longitude `2π (x + 0.5) / w` and colatitude
//! `π (y + 0.5) / h`. Every texel of a sphere is covered, so the position map
//! carries `w = 1` throughout; other layouts may leave texels empty (`w = 0`).

use super::{shaders, SssError};
use crate::device_util;
use crate::render_lane::{attenuation, RenderWorld};
use bytemuck::{Pod, Zeroable};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use translux_core::lane::{Lane, LaneContext, LaneError, LaneKind, RadianceMap, WorldPositionMap};
use translux_core::math::{Vec3, PI, TAU};
use translux_core::renderer::{
    BufferBinding, BufferId, BufferUsage, ComputeDevice, ComputeDispatch, ComputeKernel,
    KernelDimensions, KernelError, KernelResources, KernelSource, PointLight, WorkgroupId,
};
use translux_io::decode_image;

/// Side of the square texel block handled by one workgroup.
pub const TEXEL_BLOCK_SIZE: u32 = 8;

/// Binding indices of [`TextureSpaceKernel`].
pub mod texture_space_bindings {
    /// [`TextureSpaceUniforms`](super::TextureSpaceUniforms).
    pub const UNIFORMS: u32 = 0;
    /// `[PointLight]`.
    pub const LIGHTS: u32 = 1;
    /// Albedo modulation, one RGBA texel each.
    pub const ALBEDO_MAP: u32 = 2;
    /// World position map.
    pub const POSITIONS: u32 = 3;
    /// Direct radiance map.
    pub const RADIANCE: u32 = 4;
}

/// Uniform block of the texture-space kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TextureSpaceUniforms {
    /// Subject center (xyz) and radius (w).
    pub sphere: [f32; 4],
    /// Subject albedo, `w` unused.
    pub albedo: [f32; 4],
    /// Ambient radiance, `w` unused.
    pub ambient: [f32; 4],
    /// Texture size.
    pub tex_size: [u32; 2],
    /// Number of lights.
    pub light_count: u32,
    /// Padding for 16-byte alignment.
    pub _padding: u32,
}

/// Surface point and outward normal of texel `(x, y)` on a `width x height`
/// latitude/longitude layout of the unit sphere.
pub fn sphere_texel_normal(x: u32, y: u32, width: u32, height: u32) -> Vec3 {
    let phi = TAU * (x as f32 + 0.5) / width as f32;
    let theta = PI * (y as f32 + 0.5) / height as f32;
    Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin())
}

/// Texel of the latitude/longitude layout containing unit direction `normal`.
pub fn sphere_texel_of(normal: Vec3, width: u32, height: u32) -> (u32, u32) {
    let theta = normal.y.clamp(-1.0, 1.0).acos();
    let phi = normal.z.atan2(normal.x).rem_euclid(TAU);
    let x = ((phi / TAU) * width as f32) as u32;
    let y = ((theta / PI) * height as f32) as u32;
    (x.min(width - 1), y.min(height - 1))
}

/// Diffuse direct lighting of a surface point by every light.
pub fn direct_radiance(
    position: Vec3,
    normal: Vec3,
    albedo: Vec3,
    ambient: Vec3,
    lights: &[PointLight],
) -> Vec3 {
    let mut radiance = ambient * albedo;
    for light in lights {
        let to_light = light.position() - position;
        let distance = to_light.length();
        let falloff = attenuation(distance, light.radius);
        if falloff <= 0.0 {
            continue;
        }
        let n_dot_l = normal.dot(to_light / distance.max(f32::EPSILON)).max(0.0);
        radiance += albedo * light.rgb() * (n_dot_l * falloff);
    }
    radiance
}

/// Writes positions and radiance for one `TEXEL_BLOCK_SIZE` block per workgroup.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextureSpaceKernel;

impl ComputeKernel for TextureSpaceKernel {
    fn label(&self) -> &str {
        "texture_space"
    }

    fn source(&self) -> Option<KernelSource> {
        Some(KernelSource {
            wgsl: shaders::TEXTURE_SPACE_WGSL,
            entry_point: "main",
        })
    }

    fn run_workgroup(
        &self,
        id: WorkgroupId,
        resources: &mut KernelResources<'_>,
    ) -> Result<(), KernelError> {
        let u: &TextureSpaceUniforms = resources.uniform(texture_space_bindings::UNIFORMS)?;
        let lights: &[PointLight] = resources.read(texture_space_bindings::LIGHTS)?;
        let lights = &lights[..(u.light_count as usize).min(lights.len())];
        let albedo_map: &[[f32; 4]] = resources.read(texture_space_bindings::ALBEDO_MAP)?;
        let positions: &mut [[f32; 4]] = resources.write(texture_space_bindings::POSITIONS)?;
        let radiance: &mut [[f32; 4]] = resources.write(texture_space_bindings::RADIANCE)?;

        let [width, height] = u.tex_size;
        let texels = width as usize * height as usize;
        if positions.len() < texels || radiance.len() < texels || albedo_map.len() < texels {
            return Err(KernelError::Layout {
                binding: texture_space_bindings::POSITIONS,
                reason: format!("texture-space maps hold fewer than {texels} texels"),
            });
        }
        let center = Vec3::new(u.sphere[0], u.sphere[1], u.sphere[2]);
        let base_albedo = Vec3::new(u.albedo[0], u.albedo[1], u.albedo[2]);
        let ambient = Vec3::new(u.ambient[0], u.ambient[1], u.ambient[2]);

        let x0 = id.x * TEXEL_BLOCK_SIZE;
        let y0 = id.y * TEXEL_BLOCK_SIZE;
        for y in y0..(y0 + TEXEL_BLOCK_SIZE).min(height) {
            for x in x0..(x0 + TEXEL_BLOCK_SIZE).min(width) {
                let index = y as usize * width as usize + x as usize;
                let normal = sphere_texel_normal(x, y, width, height);
                let position = center + normal * u.sphere[3];
                let tint = albedo_map[index];
                let albedo = base_albedo * Vec3::new(tint[0], tint[1], tint[2]);
                let e = direct_radiance(position, normal, albedo, ambient, lights);
                positions[index] = [position.x, position.y, position.z, 1.0];
                radiance[index] = [e.x, e.y, e.z, 1.0];
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct TextureSpaceResources {
    uniforms: Option<BufferId>,
    lights: Option<BufferId>,
    albedo_map: Option<BufferId>,
    positions: Option<BufferId>,
    radiance: Option<BufferId>,
}

/// Produces the world-position and radiance maps of the subsurface subject.
#[derive(Debug)]
pub struct TextureSpaceLane {
    dims: KernelDimensions,
    albedo_texture: Option<PathBuf>,
    kernel: TextureSpaceKernel,
    resources: Mutex<TextureSpaceResources>,
}

impl TextureSpaceLane {
    /// Creates the lane for the texture size in `dims`.
    pub fn new(dims: KernelDimensions) -> Self {
        Self {
            dims,
            albedo_texture: None,
            kernel: TextureSpaceKernel,
            resources: Mutex::new(TextureSpaceResources::default()),
        }
    }

    /// Modulates the subject's albedo with an image, resampled to the texture size.
    pub fn with_albedo_texture(mut self, path: impl Into<PathBuf>) -> Self {
        self.albedo_texture = Some(path.into());
        self
    }

    /// Albedo modulation: the decoded texture, or white when there is none
    /// or it fails to load.
    fn albedo_texels(&self) -> Vec<[f32; 4]> {
        let (w, h) = (self.dims.tex_width(), self.dims.tex_height());
        self.albedo_texture
            .as_ref()
            .and_then(|path| decode_image(path, true, false))
            .map(|image| image.resample_rgba_f32(w, h))
            .unwrap_or_else(|| vec![[1.0; 4]; self.dims.texel_count()])
    }

    fn create_maps(&self, device: &dyn ComputeDevice) -> Result<(BufferId, BufferId), SssError> {
        let mut res = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
        let texels = self.dims.texel_count();
        let readable = BufferUsage::STORAGE | BufferUsage::MAP_READ;
        res.uniforms = Some(device_util::create_array::<TextureSpaceUniforms>(
            device,
            "texture_space_uniforms",
            1,
            BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        )?);
        res.albedo_map = Some(device_util::create_with_data(
            device,
            "albedo_map",
            &self.albedo_texels(),
            BufferUsage::STORAGE,
        )?);
        let positions = device_util::create_array::<[f32; 4]>(device, "world_position_map", texels, readable)?;
        let radiance = device_util::create_array::<[f32; 4]>(device, "radiance_map", texels, readable)?;
        res.positions = Some(positions);
        res.radiance = Some(radiance);
        log::debug!(
            "TextureSpaceLane: {}x{} maps created",
            self.dims.tex_width(),
            self.dims.tex_height()
        );
        Ok((positions, radiance))
    }

    fn render(&self, device: &dyn ComputeDevice, world: &RenderWorld) -> Result<(), LaneError> {
        let subject = world
            .sss_subject
            .ok_or_else(|| LaneError::execution(SssError::MissingSubject))?;
        let mut res = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
        let (Some(uniform_buffer), Some(albedo_map), Some(positions), Some(radiance)) =
            (res.uniforms, res.albedo_map, res.positions, res.radiance)
        else {
            return Err(LaneError::NotInitialized);
        };

        let lights = device_util::ensure_array::<PointLight>(
            device,
            &mut res.lights,
            "sss_lights",
            world.lights.len(),
            BufferUsage::STORAGE | BufferUsage::COPY_DST,
        )
        .map_err(LaneError::execution)?;
        drop(res);
        if !world.lights.is_empty() {
            device
                .write_buffer(lights, 0, bytemuck::cast_slice(&world.lights))
                .map_err(LaneError::execution)?;
        }
        let uniforms = TextureSpaceUniforms {
            sphere: [subject.center[0], subject.center[1], subject.center[2], subject.radius],
            albedo: [subject.albedo[0], subject.albedo[1], subject.albedo[2], 1.0],
            ambient: [world.ambient[0], world.ambient[1], world.ambient[2], 0.0],
            tex_size: [self.dims.tex_width(), self.dims.tex_height()],
            light_count: world.lights.len() as u32,
            _padding: 0,
        };
        device
            .write_buffer(uniform_buffer, 0, bytemuck::bytes_of(&uniforms))
            .map_err(LaneError::execution)?;

        let binds = [
            BufferBinding::read(texture_space_bindings::UNIFORMS, uniform_buffer),
            BufferBinding::read(texture_space_bindings::LIGHTS, lights),
            BufferBinding::read(texture_space_bindings::ALBEDO_MAP, albedo_map),
            BufferBinding::read_write(texture_space_bindings::POSITIONS, positions),
            BufferBinding::read_write(texture_space_bindings::RADIANCE, radiance),
        ];
        device
            .dispatch(&ComputeDispatch::new_2d(
                "texture_space",
                &self.kernel,
                &binds,
                self.dims.tex_width().div_ceil(TEXEL_BLOCK_SIZE),
                self.dims.tex_height().div_ceil(TEXEL_BLOCK_SIZE),
            ))
            .map_err(LaneError::execution)?;
        device.memory_barrier();
        Ok(())
    }

    /// Texture size and coefficient layout the maps are built for.
    pub fn dimensions(&self) -> KernelDimensions {
        self.dims
    }
}

impl Lane for TextureSpaceLane {
    fn strategy_name(&self) -> &'static str {
        "TextureSpace"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Geometry
    }

    fn on_initialize(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let device = device_util::device(ctx)?;
        let (positions, radiance) = self
            .create_maps(device.as_ref())
            .map_err(LaneError::initialization)?;
        ctx.insert(WorldPositionMap(positions));
        ctx.insert(RadianceMap(radiance));
        Ok(())
    }

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let device = device_util::device(ctx)?;
        let world = ctx.require::<Arc<RenderWorld>>("Arc<RenderWorld>")?.clone();
        self.render(device.as_ref(), &world)
    }

    fn on_shutdown(&self, ctx: &mut LaneContext) {
        ctx.remove::<WorldPositionMap>();
        ctx.remove::<RadianceMap>();
        let Ok(device) = device_util::device(ctx) else {
            return;
        };
        let mut res = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
        let device = device.as_ref();
        device_util::release(device, &mut res.uniforms);
        device_util::release(device, &mut res.lights);
        device_util::release(device, &mut res.albedo_map);
        device_util::release(device, &mut res.positions);
        device_util::release(device, &mut res.radiance);
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
