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

//! Runtime reconstruction of the subsurface-scattered radiance.
//!
//! The radiance map is first box-downsampled to the coefficient resolution.
//! Every texel then inverse-transforms its coefficient block, which yields
//! its kernel averaged over each coefficient cell, and convolves it with the
//! downsampled radiance. The result is blended with the direct radiance.

use super::texture_space_lane::TEXEL_BLOCK_SIZE;
use super::{haar, shaders, SssError};
use crate::device_util;
use std::sync::{Mutex, PoisonError};
use translux_core::lane::{
    CoefficientBuffer, CompositeRadianceMap, KernelFilePath, Lane, LaneContext, LaneError,
    LaneKind, RadianceMap, ScatteredRadianceTarget, WorldPositionMap,
};
use translux_core::renderer::{
    BufferBinding, BufferId, BufferUsage, ComputeDevice, ComputeDispatch, ComputeKernel,
    KernelCoefficient, KernelDimensions, KernelError, KernelResources, KernelSource,
    ScatteringUniforms,
    WorkgroupId,
};
use translux_io::KernelFileReader;

/// Default blend weight of the scattered radiance.
pub const DEFAULT_SSS_MIX: f32 = 0.75;

/// Binding indices of [`DownsampleKernel`] and [`ReconstructKernel`].
pub mod scattering_bindings {
    /// [`ScatteringUniforms`](translux_core::renderer::ScatteringUniforms).
    pub const UNIFORMS: u32 = 0;
    /// Direct radiance map.
    pub const RADIANCE: u32 = 1;
    /// Radiance at coefficient resolution.
    pub const DOWNSAMPLED: u32 = 2;
    /// `[KernelCoefficient]`, one block per texel.
    pub const COEFFICIENTS: u32 = 3;
    /// World position map, for coverage.
    pub const POSITIONS: u32 = 4;
    /// Scattered radiance output.
    pub const SCATTERED: u32 = 5;
    /// Composite output.
    pub const COMPOSITE: u32 = 6;
}

fn dimensions_of(u: &ScatteringUniforms) -> Result<KernelDimensions, KernelError> {
    KernelDimensions::new(u.tex_size[0], u.tex_size[1], u.coef_size[0], u.coef_size[1]).map_err(
        |e| KernelError::Layout {
            binding: scattering_bindings::UNIFORMS,
            reason: e.to_string(),
        },
    )
}

/// Scattered radiance of one texel from its coefficient block and the
/// downsampled radiance.
pub fn reconstruct_texel(block: &[f32], downsampled: &[[f32; 4]], dims: &KernelDimensions) -> [f32; 3] {
    let mut kernel = block.to_vec();
    haar::inverse_2d(&mut kernel, dims.coef_width() as usize, dims.coef_height() as usize);
    let cell_area = dims.cell_area() as f32;
    let mut sum = [0.0; 3];
    for (k, e) in kernel.iter().zip(downsampled) {
        let weight = k * cell_area;
        for c in 0..3 {
            sum[c] += weight * e[c];
        }
    }
    sum
}

/// `mix(radiance, scattered, sss_mix)` per channel.
pub fn composite(radiance: [f32; 3], scattered: [f32; 3], sss_mix: f32) -> [f32; 3] {
    std::array::from_fn(|c| radiance[c] + (scattered[c] - radiance[c]) * sss_mix)
}

/// Streams the kernel file into `buffer` one texel row at a time, widening
/// each coefficient to a [`KernelCoefficient`].
fn upload_coefficients(
    device: &dyn ComputeDevice,
    buffer: BufferId,
    path: &std::path::Path,
    dims: KernelDimensions,
) -> Result<(), SssError> {
    let mut rows = KernelFileReader::open(path, dims)?;
    let row_len = dims.coefficients_per_row();
    let row_bytes = (row_len * std::mem::size_of::<KernelCoefficient>()) as u64;
    let mut values = vec![0.0f32; row_len];
    let mut entries = Vec::with_capacity(row_len);
    while rows.rows_read() < dims.tex_height() {
        let offset = rows.rows_read() as u64 * row_bytes;
        rows.read_row(&mut values)?;
        entries.clear();
        entries.extend(values.iter().copied().map(KernelCoefficient::new));
        device.write_buffer(buffer, offset, bytemuck::cast_slice(&entries))?;
    }
    rows.finish()?;
    device.memory_barrier();
    log::info!(
        "Uploaded {} kernel coefficients from {}",
        dims.total_coefficients(),
        path.display()
    );
    Ok(())
}

/// Averages the radiance map down to the coefficient resolution.
#[derive(Debug, Default, Clone, Copy)]
pub struct DownsampleKernel;

impl ComputeKernel for DownsampleKernel {
    fn label(&self) -> &str {
        "radiance_downsample"
    }

    fn source(&self) -> Option<KernelSource> {
        Some(KernelSource {
            wgsl: shaders::SCATTERING_WGSL,
            entry_point: "downsample",
        })
    }

    fn run_workgroup(
        &self,
        _id: WorkgroupId,
        resources: &mut KernelResources<'_>,
    ) -> Result<(), KernelError> {
        let u: &ScatteringUniforms = resources.uniform(scattering_bindings::UNIFORMS)?;
        let dims = dimensions_of(u)?;
        let radiance: &[[f32; 4]] = resources.read(scattering_bindings::RADIANCE)?;
        let downsampled: &mut [[f32; 4]] = resources.write(scattering_bindings::DOWNSAMPLED)?;
        if radiance.len() < dims.texel_count() || downsampled.len() < dims.coefficients_per_texel() {
            return Err(KernelError::Layout {
                binding: scattering_bindings::DOWNSAMPLED,
                reason: "radiance buffers are smaller than the kernel domain".to_owned(),
            });
        }
        let cells = haar::box_downsample_rgba(
            &radiance[..dims.texel_count()],
            dims.tex_width() as usize,
            dims.tex_height() as usize,
            dims.coef_width() as usize,
            dims.coef_height() as usize,
        );
        downsampled[..cells.len()].copy_from_slice(&cells);
        Ok(())
    }
}

/// Reconstructs and composites one `TEXEL_BLOCK_SIZE` block of texels per workgroup.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReconstructKernel;

impl ComputeKernel for ReconstructKernel {
    fn label(&self) -> &str {
        "haar_reconstruct"
    }

    fn source(&self) -> Option<KernelSource> {
        Some(KernelSource {
            wgsl: shaders::SCATTERING_WGSL,
            entry_point: "reconstruct",
        })
    }

    fn run_workgroup(
        &self,
        id: WorkgroupId,
        resources: &mut KernelResources<'_>,
    ) -> Result<(), KernelError> {
        let u: &ScatteringUniforms = resources.uniform(scattering_bindings::UNIFORMS)?;
        let dims = dimensions_of(u)?;
        let downsampled: &[[f32; 4]] = resources.read(scattering_bindings::DOWNSAMPLED)?;
        let coefficients: &[KernelCoefficient] = resources.read(scattering_bindings::COEFFICIENTS)?;
        let radiance: &[[f32; 4]] = resources.read(scattering_bindings::RADIANCE)?;
        let positions: &[[f32; 4]] = resources.read(scattering_bindings::POSITIONS)?;
        let scattered: &mut [[f32; 4]] = resources.write(scattering_bindings::SCATTERED)?;
        let composited: &mut [[f32; 4]] = resources.write(scattering_bindings::COMPOSITE)?;

        let texels = dims.texel_count();
        if coefficients.len() < texels * dims.coefficients_per_texel() {
            return Err(KernelError::Layout {
                binding: scattering_bindings::COEFFICIENTS,
                reason: format!(
                    "expected {} coefficients, found {}",
                    texels * dims.coefficients_per_texel(),
                    coefficients.len()
                ),
            });
        }
        if [radiance.len(), positions.len(), scattered.len(), composited.len()]
            .iter()
            .any(|&len| len < texels)
        {
            return Err(KernelError::Layout {
                binding: scattering_bindings::SCATTERED,
                reason: format!("texture-space buffers hold fewer than {texels} texels"),
            });
        }

        let mut block = Vec::with_capacity(dims.coefficients_per_texel());
        let x0 = id.x * TEXEL_BLOCK_SIZE;
        let y0 = id.y * TEXEL_BLOCK_SIZE;
        for y in y0..(y0 + TEXEL_BLOCK_SIZE).min(dims.tex_height()) {
            for x in x0..(x0 + TEXEL_BLOCK_SIZE).min(dims.tex_width()) {
                let index = dims.texel_index(x, y);
                let direct = [radiance[index][0], radiance[index][1], radiance[index][2]];
                if positions[index][3] <= 0.0 {
                    scattered[index] = [0.0, 0.0, 0.0, 0.0];
                    composited[index] = radiance[index];
                    continue;
                }
                block.clear();
                block.extend(coefficients[dims.block_range(index)].iter().map(|c| c.value));
                let s = reconstruct_texel(&block, downsampled, &dims);
                let c = composite(direct, s, u.sss_mix);
                scattered[index] = [s[0], s[1], s[2], 1.0];
                composited[index] = [c[0], c[1], c[2], 1.0];
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ScatteringResources {
    uniforms: Option<BufferId>,
    coefficients: Option<BufferId>,
    downsampled: Option<BufferId>,
    scattered: Option<BufferId>,
    composite: Option<BufferId>,
}

/// Loads the coefficient file and applies the scattering every frame.
///
/// Needs [`KernelFilePath`] at initialization and the texture-space maps at
/// execution. Publishes [`CoefficientBuffer`], [`ScatteredRadianceTarget`]
/// and [`CompositeRadianceMap`].
#[derive(Debug)]
pub struct ScatteringLane {
    dims: KernelDimensions,
    sss_mix: f32,
    downsample: DownsampleKernel,
    reconstruct: ReconstructKernel,
    resources: Mutex<ScatteringResources>,
}

impl ScatteringLane {
    /// Creates the lane. `sss_mix` is clamped to `[0, 1]`.
    pub fn new(dims: KernelDimensions, sss_mix: f32) -> Self {
        Self {
            dims,
            sss_mix: sss_mix.clamp(0.0, 1.0),
            downsample: DownsampleKernel,
            reconstruct: ReconstructKernel,
            resources: Mutex::new(ScatteringResources::default()),
        }
    }

    /// The blend weight of the scattered radiance.
    pub fn sss_mix(&self) -> f32 {
        self.sss_mix
    }

    fn create_resources(
        &self,
        device: &dyn ComputeDevice,
        path: &std::path::Path,
    ) -> Result<(), SssError> {
        let mut res = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
        let texels = self.dims.texel_count();
        let readable = BufferUsage::STORAGE | BufferUsage::MAP_READ;
        device_util::release(device, &mut res.coefficients);
        let coefficients = device_util::create_array::<KernelCoefficient>(
            device,
            "kernel_coefficients",
            self.dims.total_coefficients() as usize,
            readable | BufferUsage::COPY_DST,
        )?;
        if let Err(e) = upload_coefficients(device, coefficients, path, self.dims) {
            if let Err(destroy) = device.destroy_buffer(coefficients) {
                log::warn!("Failed to destroy buffer {coefficients:?}: {destroy}");
            }
            return Err(e);
        }
        res.coefficients = Some(coefficients);
        res.uniforms = Some(device_util::create_with_data(
            device,
            "scattering_uniforms",
            &[ScatteringUniforms::new(&self.dims, self.sss_mix)],
            BufferUsage::UNIFORM,
        )?);
        res.downsampled = Some(device_util::create_array::<[f32; 4]>(
            device,
            "radiance_downsampled",
            self.dims.coefficients_per_texel(),
            BufferUsage::STORAGE,
        )?);
        res.scattered = Some(device_util::create_array::<[f32; 4]>(
            device,
            "scattered_radiance",
            texels,
            readable,
        )?);
        res.composite = Some(device_util::create_array::<[f32; 4]>(
            device,
            "composite_radiance",
            texels,
            readable,
        )?);
        Ok(())
    }
}

impl Lane for ScatteringLane {
    fn strategy_name(&self) -> &'static str {
        "HaarScattering"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Scattering
    }

    fn on_initialize(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let device = device_util::device(ctx)?;
        let path = ctx.require::<KernelFilePath>("KernelFilePath")?.0.clone();
        if let Err(e) = self.create_resources(device.as_ref(), &path) {
            log::error!("Failed to load kernel coefficients from {}: {e}", path.display());
            return Err(LaneError::initialization(e));
        }

        let res = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
        if let (Some(coefficients), Some(scattered), Some(composite)) =
            (res.coefficients, res.scattered, res.composite)
        {
            ctx.insert(CoefficientBuffer(coefficients));
            ctx.insert(ScatteredRadianceTarget(scattered));
            ctx.insert(CompositeRadianceMap(composite));
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let device = device_util::device(ctx)?;
        let radiance = ctx.require::<RadianceMap>("RadianceMap")?.0;
        let positions = ctx.require::<WorldPositionMap>("WorldPositionMap")?.0;
        let res = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
        let (Some(uniforms), Some(coefficients), Some(downsampled), Some(scattered), Some(composite)) = (
            res.uniforms,
            res.coefficients,
            res.downsampled,
            res.scattered,
            res.composite,
        ) else {
            return Err(LaneError::NotInitialized);
        };
        drop(res);

        let binds = [
            BufferBinding::read(scattering_bindings::UNIFORMS, uniforms),
            BufferBinding::read(scattering_bindings::RADIANCE, radiance),
            BufferBinding::read_write(scattering_bindings::DOWNSAMPLED, downsampled),
        ];
        device
            .dispatch(&ComputeDispatch::new_2d("radiance_downsample", &self.downsample, &binds, 1, 1))
            .map_err(LaneError::execution)?;
        device.memory_barrier();

        let binds = [
            BufferBinding::read(scattering_bindings::UNIFORMS, uniforms),
            BufferBinding::read(scattering_bindings::RADIANCE, radiance),
            BufferBinding::read(scattering_bindings::DOWNSAMPLED, downsampled),
            BufferBinding::read(scattering_bindings::COEFFICIENTS, coefficients),
            BufferBinding::read(scattering_bindings::POSITIONS, positions),
            BufferBinding::read_write(scattering_bindings::SCATTERED, scattered),
            BufferBinding::read_write(scattering_bindings::COMPOSITE, composite),
        ];
        device
            .dispatch(&ComputeDispatch::new_2d(
                "haar_reconstruct",
                &self.reconstruct,
                &binds,
                self.dims.tex_width().div_ceil(TEXEL_BLOCK_SIZE),
                self.dims.tex_height().div_ceil(TEXEL_BLOCK_SIZE),
            ))
            .map_err(LaneError::execution)?;
        device.memory_barrier();
        Ok(())
    }

    fn on_shutdown(&self, ctx: &mut LaneContext) {
        ctx.remove::<CoefficientBuffer>();
        ctx.remove::<ScatteredRadianceTarget>();
        ctx.remove::<CompositeRadianceMap>();
        let Ok(device) = device_util::device(ctx) else {
            return;
        };
        let device = device.as_ref();
        let mut res = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
        device_util::release(device, &mut res.uniforms);
        device_util::release(device, &mut res.coefficients);
        device_util::release(device, &mut res.downsampled);
        device_util::release(device, &mut res.scattered);
        device_util::release(device, &mut res.composite);
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
    use crate::render_lane::RenderWorld;
    use crate::read_back;
    use crate::sss_lane::{HaarBakeLane, TextureSpaceLane};
    use approx::assert_relative_eq;
    use std::path::Path;
    use std::sync::Arc;
    use translux_core::math::Vec3;
    use translux_core::renderer::{DiffusionProfile, PointLight, SceneSphere};
    use translux_infra::CpuComputeDevice;
    use translux_io::write_kernel_file;

    fn dims() -> KernelDimensions {
        KernelDimensions::new(8, 8, 4, 4).unwrap()
    }

    fn context(dir: &Path, lights: Vec<PointLight>) -> LaneContext {
        let device: Arc<dyn ComputeDevice> = Arc::new(CpuComputeDevice::new());
        let mut ctx = LaneContext::new();
        ctx.insert(device);
        ctx.insert(Arc::new(RenderWorld {
            lights,
            sss_subject: Some(SceneSphere::new(Vec3::ZERO, 1.0, [0.9, 0.5, 0.3])),
            ..RenderWorld::default()
        }));
        ctx.insert(KernelFilePath(dir.join("kernel.bin")));
        ctx
    }

    fn read(ctx: &LaneContext, id: BufferId) -> Vec<[f32; 4]> {
        let device = device_util::device(ctx).unwrap();
        read_back(device.as_ref(), id).unwrap()
    }

    /// Runs texture space, bake and scattering lanes once; returns the lanes
    /// so their resources outlive the checks.
    fn run_pipeline(ctx: &mut LaneContext, sss_mix: f32) -> (TextureSpaceLane, ScatteringLane) {
        let texture_space = TextureSpaceLane::new(dims());
        texture_space.on_initialize(ctx).unwrap();
        texture_space.execute(ctx).unwrap();
        let bake = HaarBakeLane::new(dims(), DiffusionProfile::default());
        bake.on_initialize(ctx).unwrap();
        bake.execute(ctx).unwrap();
        bake.on_shutdown(ctx);

        let scattering = ScatteringLane::new(dims(), sss_mix);
        scattering.on_initialize(ctx).unwrap();
        scattering.execute(ctx).unwrap();
        (texture_space, scattering)
    }

    #[test]
    fn test_constant_radiance_is_preserved() {
        let full = KernelDimensions::new(4, 4, 4, 4).unwrap();
        let mut kernel: Vec<f32> = (0..16).map(|i| 1.0 + i as f32).collect();
        let sum: f32 = kernel.iter().sum();
        kernel.iter_mut().for_each(|k| *k /= sum);
        haar::forward_2d(&mut kernel, 4, 4);

        let downsampled = vec![[0.5, 0.25, 2.0, 1.0]; 16];
        let s = reconstruct_texel(&kernel, &downsampled, &full);
        assert_relative_eq!(s[0], 0.5, epsilon = 1e-5);
        assert_relative_eq!(s[1], 0.25, epsilon = 1e-5);
        assert_relative_eq!(s[2], 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_composite_blends() {
        assert_eq!(composite([1.0, 0.0, 0.5], [0.0, 1.0, 0.5], 0.0), [1.0, 0.0, 0.5]);
        assert_eq!(composite([1.0, 0.0, 0.5], [0.0, 1.0, 0.5], 1.0), [0.0, 1.0, 0.5]);
        assert_eq!(composite([1.0, 0.0, 0.5], [0.0, 1.0, 0.5], 0.5), [0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_ambient_only_scattering_matches_direct() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path(), Vec::new());
        let _lanes = run_pipeline(&mut ctx, 1.0);

        let radiance = read(&ctx, ctx.get::<RadianceMap>().unwrap().0);
        let scattered = read(&ctx, ctx.get::<ScatteredRadianceTarget>().unwrap().0);
        for (e, s) in radiance.iter().zip(&scattered) {
            for c in 0..3 {
                assert_relative_eq!(s[c], e[c], epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_scattering_spreads_light_into_shadow() {
        let dir = tempfile::tempdir().unwrap();
        let light = PointLight::new(Vec3::new(0.0, 1.5, 0.0), [4.0, 4.0, 4.0], 2.0);
        let mut ctx = context(dir.path(), vec![light]);
        let _lanes = run_pipeline(&mut ctx, 1.0);

        let radiance = read(&ctx, ctx.get::<RadianceMap>().unwrap().0);
        let composite = read(&ctx, ctx.get::<CompositeRadianceMap>().unwrap().0);
        let total = |m: &[[f32; 4]]| m.iter().map(|t| t[0]).sum::<f32>();
        // The unlit pole receives light, the lit pole loses some.
        let lit = dims().texel_index(0, 0);
        let dark = dims().texel_index(0, 7);
        assert!(composite[dark][0] > radiance[dark][0]);
        assert!(composite[lit][0] < radiance[lit][0]);
        assert!(total(&composite) > 0.0);
    }

    #[test]
    fn test_zero_mix_keeps_direct_radiance() {
        let dir = tempfile::tempdir().unwrap();
        let light = PointLight::new(Vec3::new(0.0, 1.5, 0.0), [1.0, 1.0, 1.0], 2.0);
        let mut ctx = context(dir.path(), vec![light]);
        let _lanes = run_pipeline(&mut ctx, 0.0);

        let radiance = read(&ctx, ctx.get::<RadianceMap>().unwrap().0);
        let composite = read(&ctx, ctx.get::<CompositeRadianceMap>().unwrap().0);
        assert_eq!(radiance, composite);
    }

    #[test]
    fn test_coefficients_are_expanded_with_zero_channels() {
        let dir = tempfile::tempdir().unwrap();
        let small = KernelDimensions::new(2, 2, 1, 1).unwrap();
        let mut ctx = context(dir.path(), Vec::new());
        write_kernel_file(dir.path().join("kernel.bin"), small, &[1.0, 2.0, 3.0, 4.0]).unwrap();

        let lane = ScatteringLane::new(small, 0.5);
        lane.on_initialize(&mut ctx).unwrap();
        let entries: Vec<KernelCoefficient> = {
            let device = device_util::device(&ctx).unwrap();
            read_back(device.as_ref(), ctx.get::<CoefficientBuffer>().unwrap().0).unwrap()
        };
        let values: Vec<f32> = entries.iter().map(|c| c.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);
        assert!(entries.iter().all(|c| c._reserved == [0.0; 3]));
    }

    #[test]
    fn test_truncated_file_fails_initialization() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path(), Vec::new());
        std::fs::write(dir.path().join("kernel.bin"), [0u8; 10]).unwrap();
        let lane = ScatteringLane::new(dims(), DEFAULT_SSS_MIX);
        assert!(matches!(
            lane.on_initialize(&mut ctx),
            Err(LaneError::InitializationFailed(_))
        ));
        assert!(!ctx.contains::<CoefficientBuffer>());
    }

    #[test]
    fn test_rejected_file_leaves_no_coefficient_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let small = KernelDimensions::new(2, 2, 1, 1).unwrap();
        let path = dir.path().join("kernel.bin");
        write_kernel_file(&path, small, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.extend_from_slice(&[0; 4]);
        std::fs::write(&path, bytes).unwrap();

        let host = Arc::new(CpuComputeDevice::new());
        let device: Arc<dyn ComputeDevice> = host.clone();
        let mut ctx = LaneContext::new();
        ctx.insert(device);
        ctx.insert(KernelFilePath(path));

        let lane = ScatteringLane::new(small, 0.5);
        assert!(lane.on_initialize(&mut ctx).is_err());
        assert_eq!(host.buffer_count(), 0);
    }

    #[test]
    fn test_rows_land_at_their_texel_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let dims = KernelDimensions::new(4, 3, 2, 2).unwrap();
        let values: Vec<f32> = (0..dims.total_coefficients()).map(|i| i as f32 * 0.5).collect();
        let path = dir.path().join("kernel.bin");
        write_kernel_file(&path, dims, &values).unwrap();

        let device = CpuComputeDevice::new();
        let buffer = device_util::create_array::<KernelCoefficient>(
            &device,
            "kernel_coefficients",
            values.len(),
            BufferUsage::STORAGE | BufferUsage::MAP_READ | BufferUsage::COPY_DST,
        )
        .unwrap();
        upload_coefficients(&device, buffer, &path, dims).unwrap();

        let entries: Vec<KernelCoefficient> = read_back(&device, buffer).unwrap();
        let uploaded: Vec<f32> = entries.iter().map(|c| c.value).collect();
        assert_eq!(uploaded, values);
    }

    #[test]
    fn test_missing_file_fails_initialization() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path(), Vec::new());
        let lane = ScatteringLane::new(dims(), DEFAULT_SSS_MIX);
        assert!(lane.on_initialize(&mut ctx).is_err());
    }

    #[test]
    fn test_passes_share_one_program() {
        let downsample = DownsampleKernel.source().unwrap();
        let reconstruct = ReconstructKernel.source().unwrap();
        assert_eq!(downsample.wgsl, reconstruct.wgsl);
        assert_eq!(downsample.entry_point, "downsample");
        assert_eq!(reconstruct.entry_point, "reconstruct");
    }
}
