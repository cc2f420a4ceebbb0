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

//! Global settings for a translux run.
//!
//! Every field has a default, so a configuration file only needs the keys it
//! changes.

use crate::backend::ComputeBackend;
use crate::mode::RenderMode;
use crate::scene::{
    DEFAULT_GRID_SIZE, DEFAULT_GRID_SPACING, DEFAULT_LIGHT_COUNT, DEFAULT_LIGHT_RADIUS,
    DEFAULT_LIGHT_SEED,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use translux_core::lane::ScreenExtent;
use translux_core::renderer::{
    DebugView, DiffusionProfile, KernelDimensionError, KernelDimensions, TiledCullingConfig,
};

/// Settings of the texture-space scattering modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SssSettings {
    /// Texture width in texels.
    pub tex_width: u32,
    /// Texture height in texels.
    pub tex_height: u32,
    /// Retained Haar coefficients per row.
    pub coef_width: u32,
    /// Retained Haar coefficient rows.
    pub coef_height: u32,
    /// The diffusion profile baked into the kernels.
    pub profile: DiffusionProfile,
    /// Where the bake writes, and the runtime reads, the coefficients.
    pub kernel_path: PathBuf,
    /// Blend weight of the scattered radiance.
    pub mix: f32,
    /// First texel row to bake; earlier rows are kept from the existing file.
    pub resume_row: u32,
    /// Optional albedo texture of the subject.
    pub albedo_texture: Option<PathBuf>,
    /// Number of lights around the subject.
    pub light_count: u32,
}

impl Default for SssSettings {
    fn default() -> Self {
        Self {
            tex_width: 64,
            tex_height: 64,
            coef_width: 16,
            coef_height: 16,
            profile: DiffusionProfile::default(),
            kernel_path: PathBuf::from("sss_kernel.bin"),
            mix: 0.75,
            resume_row: 0,
            albedo_texture: None,
            light_count: 8,
        }
    }
}

impl SssSettings {
    /// Validated kernel dimensions.
    pub fn dimensions(&self) -> Result<KernelDimensions, KernelDimensionError> {
        KernelDimensions::new(
            self.tex_width,
            self.tex_height,
            self.coef_width,
            self.coef_height,
        )
    }
}

/// A collection of settings selecting and tuning a render mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Render mode; a command-line flag overrides it.
    pub mode: RenderMode,
    /// Device the kernels run on; a command-line flag overrides it.
    pub backend: ComputeBackend,
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Tile size and per-tile light capacity.
    pub culling: TiledCullingConfig,
    /// Number of scattered point lights.
    pub light_count: u32,
    /// Seed of the light scattering.
    pub light_seed: u64,
    /// Radius of every light.
    pub light_radius: f32,
    /// Objects per side of the object grid.
    pub grid_size: u32,
    /// Distance between neighboring objects.
    pub grid_spacing: f32,
    /// Ambient radiance.
    pub ambient: [f32; 3],
    /// What the shading pass shows.
    pub debug_view: DebugView,
    /// Camera start position.
    pub camera_position: [f32; 3],
    /// Frames rendered by the headless runtime.
    pub frames: u32,
    /// Where the last frame is saved as PNG, if anywhere.
    pub output: Option<PathBuf>,
    /// Subsurface scattering settings.
    pub sss: SssSettings,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            mode: RenderMode::default(),
            backend: ComputeBackend::default(),
            width: 800,
            height: 600,
            culling: TiledCullingConfig::default(),
            light_count: DEFAULT_LIGHT_COUNT,
            light_seed: DEFAULT_LIGHT_SEED,
            light_radius: DEFAULT_LIGHT_RADIUS,
            grid_size: DEFAULT_GRID_SIZE,
            grid_spacing: DEFAULT_GRID_SPACING,
            ambient: [0.1; 3],
            debug_view: DebugView::Lit,
            camera_position: [0.0, 0.0, 5.0],
            frames: 1,
            output: None,
            sss: SssSettings::default(),
        }
    }
}

impl RenderSettings {
    /// Size of the screen-space targets.
    pub fn extent(&self) -> ScreenExtent {
        ScreenExtent {
            width: self.width,
            height: self.height,
        }
    }
}
