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

//! Data layouts for the Haar-compressed scattering kernels.
//!
//! Every texel `s` of a `tex_w x tex_h` texture-space domain owns a kernel
//! image over the whole domain. The bake compresses it to the lowest
//! `coef_w x coef_h` Haar coefficients; the block of texel `s` starts at
//! `s * coef_w * coef_h`, coefficients row-major inside the block, texels
//! row-major across blocks.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::time::Duration;

/// Maximum number of Gaussian lobes a profile can pass to the bake kernel.
pub const MAX_PROFILE_GAUSSIANS: usize = 4;

/// Largest coefficient count per axis. The WGSL bake transforms one block
/// row or column at a time in private arrays of this length.
pub const MAX_COEFFICIENT_EDGE: u32 = 256;

/// An invalid set of kernel dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelDimensionError {
    /// A dimension is zero or not a power of two.
    NotPowerOfTwo {
        /// Which dimension.
        axis: &'static str,
        /// The rejected value.
        value: u32,
    },
    /// More coefficients on one axis than [`MAX_COEFFICIENT_EDGE`].
    CoefficientsExceedLimit {
        /// Which axis.
        axis: &'static str,
        /// Coefficient count on that axis.
        coef: u32,
    },
    /// The coefficient block is larger than the texture on one axis.
    CoefficientsExceedTexture {
        /// Which axis.
        axis: &'static str,
        /// Coefficient count on that axis.
        coef: u32,
        /// Texture size on that axis.
        tex: u32,
    },
}

impl fmt::Display for KernelDimensionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelDimensionError::NotPowerOfTwo { axis, value } => {
                write!(f, "{axis} must be a non-zero power of two, got {value}")
            }
            KernelDimensionError::CoefficientsExceedLimit { axis, coef } => write!(
                f,
                "{axis}: {coef} coefficients exceed the limit of {MAX_COEFFICIENT_EDGE}"
            ),
            KernelDimensionError::CoefficientsExceedTexture { axis, coef, tex } => write!(
                f,
                "{axis}: {coef} coefficients exceed the texture size {tex}"
            ),
        }
    }
}

impl std::error::Error for KernelDimensionError {}

/// Validated dimensions shared by the bake, the file format and the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelDimensions {
    tex_width: u32,
    tex_height: u32,
    coef_width: u32,
    coef_height: u32,
}

impl KernelDimensions {
    /// Validates and creates a set of dimensions.
    pub fn new(
        tex_width: u32,
        tex_height: u32,
        coef_width: u32,
        coef_height: u32,
    ) -> Result<Self, KernelDimensionError> {
        for (axis, value) in [
            ("tex_width", tex_width),
            ("tex_height", tex_height),
            ("coef_width", coef_width),
            ("coef_height", coef_height),
        ] {
            if !value.is_power_of_two() {
                return Err(KernelDimensionError::NotPowerOfTwo { axis, value });
            }
        }
        for (axis, coef) in [("width", coef_width), ("height", coef_height)] {
            if coef > MAX_COEFFICIENT_EDGE {
                return Err(KernelDimensionError::CoefficientsExceedLimit { axis, coef });
            }
        }
        if coef_width > tex_width {
            return Err(KernelDimensionError::CoefficientsExceedTexture {
                axis: "width",
                coef: coef_width,
                tex: tex_width,
            });
        }
        if coef_height > tex_height {
            return Err(KernelDimensionError::CoefficientsExceedTexture {
                axis: "height",
                coef: coef_height,
                tex: tex_height,
            });
        }
        Ok(Self {
            tex_width,
            tex_height,
            coef_width,
            coef_height,
        })
    }

    /// Texture width in texels.
    pub const fn tex_width(&self) -> u32 {
        self.tex_width
    }

    /// Texture height in texels.
    pub const fn tex_height(&self) -> u32 {
        self.tex_height
    }

    /// Retained coefficients per row of a block.
    pub const fn coef_width(&self) -> u32 {
        self.coef_width
    }

    /// Retained coefficient rows per block.
    pub const fn coef_height(&self) -> u32 {
        self.coef_height
    }

    /// Number of texels in the domain.
    pub const fn texel_count(&self) -> usize {
        self.tex_width as usize * self.tex_height as usize
    }

    /// Coefficients stored per texel.
    pub const fn coefficients_per_texel(&self) -> usize {
        self.coef_width as usize * self.coef_height as usize
    }

    /// Coefficients stored per texel row.
    pub const fn coefficients_per_row(&self) -> usize {
        self.tex_width as usize * self.coefficients_per_texel()
    }

    /// Coefficients in the whole domain.
    pub const fn total_coefficients(&self) -> u64 {
        self.texel_count() as u64 * self.coefficients_per_texel() as u64
    }

    /// Exact size of a kernel file in bytes.
    pub const fn file_size_bytes(&self) -> u64 {
        self.total_coefficients() * std::mem::size_of::<f32>() as u64
    }

    /// Row-major index of texel `(x, y)`.
    #[inline]
    pub const fn texel_index(&self, x: u32, y: u32) -> usize {
        y as usize * self.tex_width as usize + x as usize
    }

    /// Offset of coefficient `(row, col)` of texel `texel_index`'s block.
    #[inline]
    pub const fn coefficient_offset(&self, texel_index: usize, row: u32, col: u32) -> usize {
        texel_index * self.coefficients_per_texel()
            + row as usize * self.coef_width as usize
            + col as usize
    }

    /// Range of the block of texel `texel_index`.
    #[inline]
    pub fn block_range(&self, texel_index: usize) -> Range<usize> {
        let start = texel_index * self.coefficients_per_texel();
        start..start + self.coefficients_per_texel()
    }

    /// Texels covered by one coefficient cell, per axis.
    pub const fn cell_size(&self) -> (u32, u32) {
        (
            self.tex_width / self.coef_width,
            self.tex_height / self.coef_height,
        )
    }

    /// Texels covered by one coefficient cell.
    pub const fn cell_area(&self) -> u32 {
        let (w, h) = self.cell_size();
        w * h
    }
}

/// One stored coefficient in the device-resident coefficient buffer.
///
/// Channel 0 holds the coefficient; the three remaining channels are
/// reserved and always zero.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct KernelCoefficient {
    /// The Haar coefficient.
    pub value: f32,
    /// Unused channels.
    pub _reserved: [f32; 3],
}

impl KernelCoefficient {
    /// Wraps a coefficient with zeroed reserved channels.
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self {
            value,
            _reserved: [0.0; 3],
        }
    }
}

/// One Gaussian lobe of a diffusion profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianLobe {
    /// Variance, in squared profile units.
    pub variance: f32,
    /// Weight of the lobe.
    pub weight: f32,
}

/// Radial diffusion profile `R(r)` expressed as a sum of Gaussians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffusionProfile {
    /// The lobes. At most [`MAX_PROFILE_GAUSSIANS`] reach the bake kernel.
    pub lobes: Vec<GaussianLobe>,
    /// Profile units per world unit.
    pub distance_scale: f32,
}

impl Default for DiffusionProfile {
    /// A skin-like red-channel profile.
    fn default() -> Self {
        Self {
            lobes: vec![
                GaussianLobe {
                    variance: 0.0064,
                    weight: 0.233,
                },
                GaussianLobe {
                    variance: 0.0484,
                    weight: 0.100,
                },
                GaussianLobe {
                    variance: 0.187,
                    weight: 0.118,
                },
                GaussianLobe {
                    variance: 0.567,
                    weight: 0.113,
                },
            ],
            distance_scale: 1.0,
        }
    }
}

impl DiffusionProfile {
    /// Evaluates the profile at world-space distance `distance`.
    pub fn evaluate(&self, distance: f32) -> f32 {
        evaluate_lobes(
            self.lobes
                .iter()
                .take(MAX_PROFILE_GAUSSIANS)
                .map(|l| (l.variance, l.weight)),
            distance * self.distance_scale,
        )
    }

    /// Packs the profile for [`HaarBakeUniforms`], dropping extra lobes.
    pub fn pack(&self) -> ([f32; 4], [f32; 4], u32) {
        if self.lobes.len() > MAX_PROFILE_GAUSSIANS {
            log::warn!(
                "Diffusion profile has {} lobes, only the first {} are baked",
                self.lobes.len(),
                MAX_PROFILE_GAUSSIANS
            );
        }
        let mut variances = [0.0; 4];
        let mut weights = [0.0; 4];
        let count = self.lobes.len().min(MAX_PROFILE_GAUSSIANS);
        for (i, lobe) in self.lobes.iter().take(count).enumerate() {
            variances[i] = lobe.variance;
            weights[i] = lobe.weight;
        }
        (variances, weights, count as u32)
    }
}

/// Sum of normalized 2D Gaussians at radius `r` (profile units).
pub fn evaluate_lobes(lobes: impl IntoIterator<Item = (f32, f32)>, r: f32) -> f32 {
    let r2 = r * r;
    lobes
        .into_iter()
        .filter(|(variance, _)| *variance > 0.0)
        .map(|(variance, weight)| {
            weight * (-r2 / (2.0 * variance)).exp() / (std::f32::consts::TAU * variance)
        })
        .sum()
}

/// Parameters of one per-texel bake dispatch.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct HaarBakeUniforms {
    /// Texture size (width, height).
    pub tex_size: [u32; 2],
    /// Retained coefficients (width, height).
    pub coef_size: [u32; 2],
    /// Source texel `(x, y)` whose kernel is built.
    pub texel: [u32; 2],
    /// Block slot in the row staging buffer.
    pub slot: u32,
    /// Number of valid profile lobes.
    pub lobe_count: u32,
    /// Lobe variances.
    pub variances: [f32; 4],
    /// Lobe weights.
    pub weights: [f32; 4],
    /// Profile units per world unit.
    pub distance_scale: f32,
    /// Padding for 16-byte alignment.
    pub _padding: [f32; 3],
}

impl HaarBakeUniforms {
    /// Builds the parameters for texel `(x, y)` written into block `slot`.
    pub fn new(dims: &KernelDimensions, profile: &DiffusionProfile, x: u32, y: u32, slot: u32) -> Self {
        let (variances, weights, lobe_count) = profile.pack();
        Self {
            tex_size: [dims.tex_width(), dims.tex_height()],
            coef_size: [dims.coef_width(), dims.coef_height()],
            texel: [x, y],
            slot,
            lobe_count,
            variances,
            weights,
            distance_scale: profile.distance_scale,
            _padding: [0.0; 3],
        }
    }
}

/// Parameters of the runtime reconstruction passes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ScatteringUniforms {
    /// Texture size (width, height).
    pub tex_size: [u32; 2],
    /// Retained coefficients (width, height).
    pub coef_size: [u32; 2],
    /// Texels per coefficient cell.
    pub cell_area: f32,
    /// Blend weight of the scattered radiance in the composite.
    pub sss_mix: f32,
    /// Padding for 16-byte alignment.
    pub _padding: [f32; 2],
}

impl ScatteringUniforms {
    /// Builds the uniforms.
    pub fn new(dims: &KernelDimensions, sss_mix: f32) -> Self {
        Self {
            tex_size: [dims.tex_width(), dims.tex_height()],
            coef_size: [dims.coef_width(), dims.coef_height()],
            cell_area: dims.cell_area() as f32,
            sss_mix,
            _padding: [0.0; 2],
        }
    }
}

/// Progress of an offline bake, reported after every texel row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BakeProgress {
    /// Rows written to the coefficient file so far, including resumed rows.
    pub rows_completed: u32,
    /// Rows in the domain.
    pub total_rows: u32,
    /// Time spent on the last row.
    pub last_row_time: Duration,
    /// Time since this bake invocation started.
    pub elapsed: Duration,
}

impl BakeProgress {
    /// Completed fraction in `[0, 1]`.
    pub fn fraction(&self) -> f32 {
        if self.total_rows == 0 {
            return 1.0;
        }
        self.rows_completed as f32 / self.total_rows as f32
    }

    /// `true` once every row is written.
    pub fn is_complete(&self) -> bool {
        self.rows_completed >= self.total_rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_dimensions_validation() {
        assert!(KernelDimensions::new(512, 512, 16, 16).is_ok());
        assert_eq!(
            KernelDimensions::new(500, 512, 16, 16),
            Err(KernelDimensionError::NotPowerOfTwo {
                axis: "tex_width",
                value: 500
            })
        );
        assert!(matches!(
            KernelDimensions::new(8, 8, 0, 8),
            Err(KernelDimensionError::NotPowerOfTwo { value: 0, .. })
        ));
        assert!(matches!(
            KernelDimensions::new(8, 4, 8, 8),
            Err(KernelDimensionError::CoefficientsExceedTexture { axis: "height", .. })
        ));
        assert!(KernelDimensions::new(1024, 1024, 256, 256).is_ok());
        assert_eq!(
            KernelDimensions::new(1024, 1024, 512, 16),
            Err(KernelDimensionError::CoefficientsExceedLimit {
                axis: "width",
                coef: 512
            })
        );
    }

    #[test]
    fn test_coefficient_offset_layout() {
        let dims = KernelDimensions::new(4, 4, 2, 2).unwrap();
        assert_eq!(dims.coefficients_per_texel(), 4);
        assert_eq!(dims.texel_index(1, 2), 9);
        assert_eq!(dims.coefficient_offset(9, 1, 0), 9 * 4 + 2);
        assert_eq!(dims.block_range(3), 12..16);
        assert_eq!(dims.file_size_bytes(), 16 * 4 * 4);
        assert_eq!(dims.cell_size(), (2, 2));
        assert_eq!(dims.cell_area(), 4);
    }

    #[test]
    fn test_default_scale_file_size() {
        // 512x512 texels with 16x16 coefficients each.
        let dims = KernelDimensions::new(512, 512, 16, 16).unwrap();
        assert_eq!(dims.total_coefficients(), 512 * 512 * 256);
        assert_eq!(dims.file_size_bytes(), 512 * 512 * 256 * 4);
    }

    #[test]
    fn test_gpu_struct_sizes() {
        assert_eq!(std::mem::size_of::<KernelCoefficient>(), 16);
        assert_eq!(std::mem::size_of::<HaarBakeUniforms>() % 16, 0);
        assert_eq!(std::mem::size_of::<ScatteringUniforms>() % 16, 0);
    }

    #[test]
    fn test_profile_is_monotonic_decreasing() {
        let profile = DiffusionProfile::default();
        let near = profile.evaluate(0.0);
        let mid = profile.evaluate(0.2);
        let far = profile.evaluate(2.0);
        assert!(near > mid && mid > far && far >= 0.0);
    }

    #[test]
    fn test_single_lobe_peak() {
        let value = evaluate_lobes([(0.5, 1.0)], 0.0);
        assert_relative_eq!(value, 1.0 / (std::f32::consts::TAU * 0.5), epsilon = 1e-6);
    }

    #[test]
    fn test_profile_pack_truncates() {
        let mut profile = DiffusionProfile::default();
        profile.lobes.push(GaussianLobe {
            variance: 1.99,
            weight: 0.358,
        });
        let (variances, _, count) = profile.pack();
        assert_eq!(count, 4);
        assert_eq!(variances[0], 0.0064);
    }

    #[test]
    fn test_bake_progress_fraction() {
        let progress = BakeProgress {
            rows_completed: 128,
            total_rows: 512,
            last_row_time: Duration::from_millis(5),
            elapsed: Duration::from_secs(1),
        };
        assert_relative_eq!(progress.fraction(), 0.25);
        assert!(!progress.is_complete());
    }
}
