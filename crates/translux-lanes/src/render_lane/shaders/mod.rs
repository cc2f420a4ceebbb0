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

//! WGSL programs of the tiled lighting kernels.
//!
//! Every program is prefixed with `common.wgsl`, which holds the shared
//! structs (`PointLight`, `SceneSphere`, `TileStats`), the screen/NDC
//! conversions and the sphere intersection used by the host kernels. All
//! bindings live in group 0 at the indices of the matching `*_bindings`
//! module.
//!
//! # Available Programs
//!
//! - [`GEOMETRY_WGSL`] - Sphere ray casting into depth and the G-buffer
//! - [`LIGHT_CULLING_WGSL`] - Per-tile depth bounds, frusta and light lists
//! - [`TILED_SHADING_WGSL`] - Deferred and forward tiled shading
//! - [`LIGHT_BOXES_WGSL`] - Depth-tested light-box overlay

/// Declarations shared by every program, and by the scattering programs.
pub const COMMON_WGSL: &str = include_str!("common.wgsl");

/// Sphere ray casting.
///
/// Entry points `depth_only` (bindings 0-2) and `gbuffer` (bindings 0-5),
/// one 16x16 workgroup per pixel block.
pub const GEOMETRY_WGSL: &str = concat!(include_str!("common.wgsl"), include_str!("geometry.wgsl"));

/// Tile light culling, entry point `main`, one workgroup per tile.
///
/// The threads reduce the tile's depth range with atomics on the depth bits,
/// then test the lights in batches and append them in ascending order.
pub const LIGHT_CULLING_WGSL: &str =
    concat!(include_str!("common.wgsl"), include_str!("light_culling.wgsl"));

/// Tiled shading with entry points `deferred` and `forward`.
pub const TILED_SHADING_WGSL: &str =
    concat!(include_str!("common.wgsl"), include_str!("tiled_shading.wgsl"));

/// Light-box overlay, entry point `main`, dispatched as a single workgroup.
pub const LIGHT_BOXES_WGSL: &str =
    concat!(include_str!("common.wgsl"), include_str!("light_boxes.wgsl"));
