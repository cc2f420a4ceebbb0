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

//! WGSL programs of the texture-space scattering kernels.
//!
//! Each program is prefixed with the render lanes' common declarations, so
//! lights, spheres and the screen conversions match the tiled pipeline.
//!
//! # Available Programs
//!
//! - [`TEXTURE_SPACE_WGSL`] - Position and direct radiance maps
//! - [`HAAR_BAKE_WGSL`] - Per-texel kernel decomposition
//! - [`SCATTERING_WGSL`] - Radiance downsampling and kernel reconstruction
//! - [`SSS_DISPLAY_WGSL`] - On-screen display of the composite map

/// Texture-space layout of the subject, entry point `main`, 8x8 texels per
/// workgroup.
pub const TEXTURE_SPACE_WGSL: &str = concat!(
    include_str!("../../render_lane/shaders/common.wgsl"),
    include_str!("texture_space.wgsl")
);

/// Kernel bake of one texel per dispatch, entry point `main`.
///
/// Builds the kernel directly at coefficient resolution, so each block row
/// and column fits the private arrays of
/// [`MAX_COEFFICIENT_EDGE`](translux_core::renderer::MAX_COEFFICIENT_EDGE)
/// values.
pub const HAAR_BAKE_WGSL: &str = concat!(
    include_str!("../../render_lane/shaders/common.wgsl"),
    include_str!("haar_bake.wgsl")
);

/// Runtime scattering with entry points `downsample` and `reconstruct`.
pub const SCATTERING_WGSL: &str = concat!(
    include_str!("../../render_lane/shaders/common.wgsl"),
    include_str!("scattering.wgsl")
);

/// Subject display, entry point `main`.
pub const SSS_DISPLAY_WGSL: &str = concat!(
    include_str!("../../render_lane/shaders/common.wgsl"),
    include_str!("display.wgsl")
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::shaders::COMMON_WGSL;
    use translux_core::renderer::MAX_COEFFICIENT_EDGE;

    #[test]
    fn test_programs_share_common_declarations() {
        for program in [TEXTURE_SPACE_WGSL, HAAR_BAKE_WGSL, SCATTERING_WGSL, SSS_DISPLAY_WGSL] {
            assert!(program.starts_with(COMMON_WGSL));
        }
    }

    #[test]
    fn test_bake_arrays_match_coefficient_limit() {
        assert!(HAAR_BAKE_WGSL.contains(&format!("const MAX_EDGE: u32 = {MAX_COEFFICIENT_EDGE}u;")));
        assert!(HAAR_BAKE_WGSL.contains(&format!("array<f32, {MAX_COEFFICIENT_EDGE}>")));
    }

    #[test]
    fn test_scattering_shader_valid() {
        assert!(SCATTERING_WGSL.contains("fn downsample("));
        assert!(SCATTERING_WGSL.contains("fn reconstruct("));
    }

    #[test]
    fn test_texture_space_and_display_shaders_valid() {
        assert!(TEXTURE_SPACE_WGSL.contains("@workgroup_size(8, 8)"));
        assert!(SSS_DISPLAY_WGSL.contains("@workgroup_size(16, 16)"));
    }
}
