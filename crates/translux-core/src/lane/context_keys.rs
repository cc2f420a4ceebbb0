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

//! Context key types for [`LaneContext`](super::LaneContext).
//!
//! These newtypes are inserted into a `LaneContext` by agents and by lanes
//! publishing their outputs. Placing them in `translux-core` avoids a cyclic
//! dependency between `translux-lanes` and `translux-agents`.
//!
//! Besides these keys, the context carries the device as
//! `Arc<dyn ComputeDevice>` and the frame's [`ViewInfo`](crate::renderer::ViewInfo).
//!
//! # Tiled rendering
//!
//! | Key                   | Meaning                                         |
//! |-----------------------|-------------------------------------------------|
//! | [`ScreenExtent`]      | Size of every screen-space target in pixels     |
//! | [`DepthTarget`]       | Depth written by the geometry pass              |
//! | [`GBufferTargets`]    | Position, normal and albedo targets             |
//! | [`ColorTarget`]       | Final color written by the shading pass         |
//! | [`TileLightLists`]    | Per-tile light lists built by the culling pass  |
//! | [`DebugViewMode`]     | Active debug visualization                      |
//!
//! # Subsurface scattering
//!
//! | Key                         | Meaning                                   |
//! |-----------------------------|-------------------------------------------|
//! | [`WorldPositionMap`]        | Texture-space world positions             |
//! | [`RadianceMap`]             | Texture-space direct radiance             |
//! | [`CoefficientBuffer`]       | Device-resident Haar coefficients         |
//! | [`ScatteredRadianceTarget`] | Texture-space scattered radiance          |
//! | [`KernelFilePath`]          | Coefficient file written or loaded        |
//! | [`BakeResume`]              | First texel row the bake has to compute   |
//! | [`BakeProgressSink`]        | Callback invoked after every baked row    |

use crate::renderer::api::BufferId;
use crate::renderer::kernel::BakeProgress;
use crate::renderer::DebugView;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────────────────────
// Tiled rendering
// ─────────────────────────────────────────────────────────────────────────────

/// Size of the screen-space targets for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenExtent {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl ScreenExtent {
    /// Number of pixels.
    pub const fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Depth target: one `f32` per pixel, cleared to `1.0` (far plane).
#[derive(Debug, Clone, Copy)]
pub struct DepthTarget(pub BufferId);

/// G-buffer targets written by the geometry pass. One `Vec4` per pixel each.
#[derive(Debug, Clone, Copy)]
pub struct GBufferTargets {
    /// World-space position, `w = 1` where geometry was hit.
    pub position: BufferId,
    /// World-space normal.
    pub normal: BufferId,
    /// Surface albedo.
    pub albedo: BufferId,
}

/// Final color target: one `[f32; 4]` per pixel.
#[derive(Debug, Clone, Copy)]
pub struct ColorTarget(pub BufferId);

/// Buffers produced by the light culling pass.
#[derive(Debug, Clone, Copy)]
pub struct TileLightLists {
    /// The scene's lights.
    pub light_buffer: BufferId,
    /// Flat per-tile index lists, `capacity` entries per tile.
    pub index_buffer: BufferId,
    /// One `TileStats` per tile.
    pub stats_buffer: BufferId,
    /// Tile columns.
    pub tiles_x: u32,
    /// Tile rows.
    pub tiles_y: u32,
    /// Tile edge in pixels.
    pub tile_size: u32,
    /// Per-tile capacity.
    pub capacity: u32,
}

/// Active debug visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugViewMode(pub DebugView);

/// Unit quad mesh, created on first use.
#[derive(Debug, Clone, Copy)]
pub struct QuadMesh(pub BufferId);

/// Unit cube mesh, created on first use.
#[derive(Debug, Clone, Copy)]
pub struct CubeMesh(pub BufferId);

// ─────────────────────────────────────────────────────────────────────────────
// Subsurface scattering
// ─────────────────────────────────────────────────────────────────────────────

/// Texture-space world position map: one `Vec4` per texel, `w = 0` where
/// the texel is not covered by the surface.
#[derive(Debug, Clone, Copy)]
pub struct WorldPositionMap(pub BufferId);

/// Texture-space direct radiance: one `Vec4` per texel.
#[derive(Debug, Clone, Copy)]
pub struct RadianceMap(pub BufferId);

/// Device-resident coefficient buffer of `KernelCoefficient`s.
#[derive(Debug, Clone, Copy)]
pub struct CoefficientBuffer(pub BufferId);

/// Texture-space scattered radiance produced by the reconstruction.
#[derive(Debug, Clone, Copy)]
pub struct ScatteredRadianceTarget(pub BufferId);

/// Texture-space composite of direct and scattered radiance.
#[derive(Debug, Clone, Copy)]
pub struct CompositeRadianceMap(pub BufferId);

/// Location of the coefficient file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelFilePath(pub PathBuf);

/// First texel row the bake has to compute. Rows before it are already
/// present in the coefficient file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BakeResume(pub u32);

/// Callback invoked after every baked row.
#[derive(Clone)]
pub struct BakeProgressSink(pub Arc<dyn Fn(&BakeProgress) + Send + Sync>);

impl BakeProgressSink {
    /// Wraps a callback.
    pub fn new(f: impl Fn(&BakeProgress) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Invokes the callback.
    pub fn report(&self, progress: &BakeProgress) {
        (self.0)(progress)
    }
}

impl fmt::Debug for BakeProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BakeProgressSink(..)")
    }
}
