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

//! Offline bake of the per-texel Haar-compressed diffusion kernels.
//!
//! For every texel `s`, the kernel image `K_s(t) = R(|p_s - p_t|)` is built
//! over the whole texture from the world-position map, normalized to sum to
//! one, decomposed with [`haar::forward_2d`] and truncated to the retained
//! coefficient block. One dispatch per texel writes its block into a row
//! staging buffer; after every row the staging buffer is read back and
//! appended to the coefficient file.

use super::{haar, shaders, SssError};
use crate::device_util;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use translux_core::lane::{
    BakeProgressSink, BakeResume, KernelFilePath, Lane, LaneContext, LaneError, LaneKind,
    WorldPositionMap,
};
use translux_core::math::Vec3;
use translux_core::utils::timer::Stopwatch;
use translux_core::renderer::{
    evaluate_lobes, BakeProgress, BufferBinding, BufferId, BufferUsage, ComputeDevice,
    ComputeDispatch, ComputeKernel, DiffusionProfile, HaarBakeUniforms, KernelDimensions,
    KernelError, KernelResources, KernelSource, MapMode, WorkgroupId, MAX_PROFILE_GAUSSIANS,
};
use translux_io::KernelFileWriter;

/// Binding indices of [`HaarForwardKernel`].
pub mod bake_bindings {
    /// [`HaarBakeUniforms`](translux_core::renderer::HaarBakeUniforms).
    pub const UNIFORMS: u32 = 0;
    /// World position map.
    pub const POSITIONS: u32 = 1;
    /// Row staging buffer, one coefficient block per texel of the row.
    pub const BLOCKS: u32 = 2;
}

/// Fills `out` with the kernel of texel `source`: the profile evaluated at
/// the distance to every covered texel, normalized to sum to one.
///
/// Uncovered texels get zero. An uncovered source, or a kernel that is zero
/// everywhere, leaves `out` all zero.
pub fn texel_kernel(
    positions: &[[f32; 4]],
    source: usize,
    profile: impl Fn(f32) -> f32,
    out: &mut [f32],
) {
    out.fill(0.0);
    let Some(origin) = positions.get(source).filter(|p| p[3] > 0.0) else {
        return;
    };
    let origin = Vec3::new(origin[0], origin[1], origin[2]);

    let mut sum = 0.0;
    for (value, p) in out.iter_mut().zip(positions) {
        if p[3] <= 0.0 {
            continue;
        }
        *value = profile(Vec3::new(p[0], p[1], p[2]).distance(origin));
        sum += *value;
    }
    if sum > 0.0 {
        out.iter_mut().for_each(|v| *v /= sum);
    }
}

/// Kernel of texel `source`, decomposed and truncated to the retained block.
pub fn bake_texel(
    positions: &[[f32; 4]],
    source: usize,
    dims: &KernelDimensions,
    profile: impl Fn(f32) -> f32,
) -> Vec<f32> {
    let width = dims.tex_width() as usize;
    let height = dims.tex_height() as usize;
    let mut image = vec![0.0; width * height];
    texel_kernel(positions, source, profile, &mut image);
    haar::forward_2d(&mut image, width, height);
    haar::truncate(
        &image,
        width,
        dims.coef_width() as usize,
        dims.coef_height() as usize,
    )
}

/// Builds the compressed kernel of one texel per dispatch.
#[derive(Debug, Default, Clone, Copy)]
pub struct HaarForwardKernel;

impl ComputeKernel for HaarForwardKernel {
    fn label(&self) -> &str {
        "haar_forward"
    }

    fn source(&self) -> Option<KernelSource> {
        Some(KernelSource {
            wgsl: shaders::HAAR_BAKE_WGSL,
            entry_point: "main",
        })
    }

    fn run_workgroup(
        &self,
        _id: WorkgroupId,
        resources: &mut KernelResources<'_>,
    ) -> Result<(), KernelError> {
        let u: &HaarBakeUniforms = resources.uniform(bake_bindings::UNIFORMS)?;
        let positions: &[[f32; 4]] = resources.read(bake_bindings::POSITIONS)?;
        let blocks: &mut [f32] = resources.write(bake_bindings::BLOCKS)?;

        let dims = KernelDimensions::new(u.tex_size[0], u.tex_size[1], u.coef_size[0], u.coef_size[1])
            .map_err(|e| KernelError::Layout {
                binding: bake_bindings::UNIFORMS,
                reason: e.to_string(),
            })?;
        if positions.len() < dims.texel_count() {
            return Err(KernelError::Layout {
                binding: bake_bindings::POSITIONS,
                reason: format!("expected {} texels, found {}", dims.texel_count(), positions.len()),
            });
        }

        let lobe_count = (u.lobe_count as usize).min(MAX_PROFILE_GAUSSIANS);
        let lobes: Vec<(f32, f32)> = u
            .variances
            .iter()
            .copied()
            .zip(u.weights.iter().copied())
            .take(lobe_count)
            .collect();
        let distance_scale = u.distance_scale;
        let source = dims.texel_index(u.texel[0], u.texel[1]);
        let block = bake_texel(positions, source, &dims, |d| {
            evaluate_lobes(lobes.iter().copied(), d * distance_scale)
        });

        let start = u.slot as usize * block.len();
        let target = blocks
            .get_mut(start..start + block.len())
            .ok_or_else(|| KernelError::Layout {
                binding: bake_bindings::BLOCKS,
                reason: format!("slot {} is outside the staging buffer", u.slot),
            })?;
        target.copy_from_slice(&block);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct BakeResources {
    uniforms: Option<BufferId>,
    blocks: Option<BufferId>,
}

/// Bakes the coefficient file from the world-position map.
///
/// Reads [`KernelFilePath`] and [`WorldPositionMap`] from the context, and
/// optionally [`BakeResume`] and [`BakeProgressSink`].
#[derive(Debug)]
pub struct HaarBakeLane {
    dims: KernelDimensions,
    profile: DiffusionProfile,
    kernel: HaarForwardKernel,
    resources: Mutex<BakeResources>,
}

impl HaarBakeLane {
    /// Creates a bake lane for `dims` with the given diffusion profile.
    pub fn new(dims: KernelDimensions, profile: DiffusionProfile) -> Self {
        Self {
            dims,
            profile,
            kernel: HaarForwardKernel,
            resources: Mutex::new(BakeResources::default()),
        }
    }

    /// Dimensions of the baked file.
    pub fn dimensions(&self) -> KernelDimensions {
        self.dims
    }

    /// The diffusion profile.
    pub fn profile(&self) -> &DiffusionProfile {
        &self.profile
    }

    /// Runs the bake from texel row `resume` to the end and finishes the file.
    pub fn bake(
        &self,
        device: &dyn ComputeDevice,
        positions: BufferId,
        path: &Path,
        resume: u32,
        progress: Option<&BakeProgressSink>,
    ) -> Result<PathBuf, SssError> {
        let res = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
        let (Some(uniforms), Some(blocks)) = (res.uniforms, res.blocks) else {
            return Err(SssError::NotInitialized);
        };
        drop(res);

        let dims = self.dims;
        let mut writer = if resume == 0 {
            KernelFileWriter::create(path, dims)?
        } else {
            KernelFileWriter::resume_at_row(path, dims, resume)?
        };

        let row_len = dims.coefficients_per_row();
        let binds = [
            BufferBinding::read(bake_bindings::UNIFORMS, uniforms),
            BufferBinding::read(bake_bindings::POSITIONS, positions),
            BufferBinding::read_write(bake_bindings::BLOCKS, blocks),
        ];
        let total = Stopwatch::new();
        let mut row_watch = Stopwatch::new();
        for y in resume..dims.tex_height() {
            let query = device.begin_timer_query("haar_bake_row");
            for x in 0..dims.tex_width() {
                let params = HaarBakeUniforms::new(&dims, &self.profile, x, y, x);
                device.write_buffer(uniforms, 0, bytemuck::bytes_of(&params))?;
                device.dispatch(&ComputeDispatch::new_2d("haar_forward", &self.kernel, &binds, 1, 1))?;
            }
            device.memory_barrier();
            device.end_timer_query(query)?;
            let device_time = device.wait_timer_query(query)?;

            {
                let mapped = device.map_buffer(blocks, MapMode::Read)?;
                let row: &[f32] = mapped.as_slice()?;
                writer.write_row(&row[..row_len])?;
            }

            let report = BakeProgress {
                rows_completed: y + 1,
                total_rows: dims.tex_height(),
                last_row_time: row_watch.lap(),
                elapsed: total.elapsed(),
            };
            log::info!(
                "Baked row {}/{} in {:.2} ms (device {:.2} ms)",
                report.rows_completed,
                report.total_rows,
                report.last_row_time.as_secs_f64() * 1000.0,
                device_time.as_secs_f64() * 1000.0
            );
            if let Some(sink) = progress {
                sink.report(&report);
            }
        }

        let path = writer.finish()?;
        log::info!(
            "Bake finished in {:.2} s",
            total.elapsed_secs_f64()
        );
        Ok(path)
    }
}

impl Lane for HaarBakeLane {
    fn strategy_name(&self) -> &'static str {
        "HaarBake"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Bake
    }

    fn on_initialize(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let device = device_util::device(ctx)?;
        let mut res = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
        res.uniforms = Some(
            device_util::create_array::<HaarBakeUniforms>(
                device.as_ref(),
                "haar_bake_uniforms",
                1,
                BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            )
            .map_err(LaneError::initialization)?,
        );
        res.blocks = Some(
            device_util::create_array::<f32>(
                device.as_ref(),
                "haar_bake_row_blocks",
                self.dims.coefficients_per_row(),
                BufferUsage::STORAGE | BufferUsage::MAP_READ,
            )
            .map_err(LaneError::initialization)?,
        );
        log::debug!(
            "HaarBakeLane: {}x{} texels, {}x{} coefficients per texel",
            self.dims.tex_width(),
            self.dims.tex_height(),
            self.dims.coef_width(),
            self.dims.coef_height()
        );
        Ok(())
    }

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let device = device_util::device(ctx)?;
        let path = ctx.require::<KernelFilePath>("KernelFilePath")?.0.clone();
        let positions = ctx.require::<WorldPositionMap>("WorldPositionMap")?.0;
        let resume = ctx.get::<BakeResume>().map_or(0, |r| r.0);
        let progress = ctx.get::<BakeProgressSink>().cloned();
        self.bake(device.as_ref(), positions, &path, resume, progress.as_ref())
            .map(|_| ())
            .map_err(LaneError::execution)
    }

    fn on_shutdown(&self, ctx: &mut LaneContext) {
        let Ok(device) = device_util::device(ctx) else {
            return;
        };
        let mut res = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
        device_util::release(device.as_ref(), &mut res.uniforms);
        device_util::release(device.as_ref(), &mut res.blocks);
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
