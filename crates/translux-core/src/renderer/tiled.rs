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

//! Defines data structures for tiled light culling.
//!
//! The screen is divided into square tiles. A compute pass builds, for each
//! tile, the list of lights whose bounding sphere intersects the tile's
//! view-frustum slice, bounded in depth by the tile's min/max depth. The
//! shading passes then evaluate only the lights of the pixel's tile.
//!
//! # Memory
//!
//! - Light index buffer: `tiles * max_lights_per_tile` `u32` entries, each
//!   tile owning a fixed-size region starting at `tile_index * capacity`.
//! - Tile stats buffer: one [`TileStats`] per tile, carrying the written
//!   count, the depth range and the number of lights dropped on overflow.

use crate::renderer::ViewInfo;
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default tile edge in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 16;

/// Default per-tile light list capacity.
pub const DEFAULT_MAX_LIGHTS_PER_TILE: u32 = 2048;

/// Configuration for tiled light culling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TiledCullingConfig {
    /// Tile edge in pixels.
    pub tile_size: u32,
    /// Capacity of each tile's light list. Lights past it are dropped.
    pub max_lights_per_tile: u32,
    /// Treat any overflow as a frame error instead of silent truncation.
    pub strict_capacity: bool,
}

impl Default for TiledCullingConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_SIZE, DEFAULT_MAX_LIGHTS_PER_TILE)
    }
}

impl TiledCullingConfig {
    /// Creates a non-strict configuration.
    pub const fn new(tile_size: u32, max_lights_per_tile: u32) -> Self {
        Self {
            tile_size,
            max_lights_per_tile,
            strict_capacity: false,
        }
    }

    /// `true` when both the tile size and the capacity are non-zero.
    pub const fn is_valid(&self) -> bool {
        self.tile_size > 0 && self.max_lights_per_tile > 0
    }

    /// Calculates the tile grid dimensions for a given screen size.
    #[inline]
    pub const fn tile_dimensions(&self, screen_width: u32, screen_height: u32) -> (u32, u32) {
        (
            screen_width.div_ceil(self.tile_size),
            screen_height.div_ceil(self.tile_size),
        )
    }

    /// Calculates the total number of tiles for a given screen size.
    #[inline]
    pub fn total_tiles(&self, screen_width: u32, screen_height: u32) -> u32 {
        let (tiles_x, tiles_y) = self.tile_dimensions(screen_width, screen_height);
        tiles_x * tiles_y
    }

    /// Pixel rectangle covered by tile `(tile_x, tile_y)`, clamped to the screen.
    #[inline]
    pub fn tile_bounds(
        &self,
        tile_x: u32,
        tile_y: u32,
        screen_width: u32,
        screen_height: u32,
    ) -> TileBounds {
        let x0 = (tile_x * self.tile_size).min(screen_width);
        let y0 = (tile_y * self.tile_size).min(screen_height);
        TileBounds {
            x0,
            y0,
            x1: (x0 + self.tile_size).min(screen_width),
            y1: (y0 + self.tile_size).min(screen_height),
        }
    }

    /// Tile containing pixel `(x, y)`.
    #[inline]
    pub const fn tile_of_pixel(&self, x: u32, y: u32) -> (u32, u32) {
        (x / self.tile_size, y / self.tile_size)
    }

    /// Calculates the required light index buffer size in bytes.
    pub fn light_index_buffer_size(&self, screen_width: u32, screen_height: u32) -> u64 {
        let total_tiles = self.total_tiles(screen_width, screen_height) as u64;
        total_tiles * self.max_lights_per_tile as u64 * std::mem::size_of::<u32>() as u64
    }

    /// Calculates the required tile stats buffer size in bytes.
    pub fn tile_stats_buffer_size(&self, screen_width: u32, screen_height: u32) -> u64 {
        let total_tiles = self.total_tiles(screen_width, screen_height) as u64;
        total_tiles * std::mem::size_of::<TileStats>() as u64
    }
}

/// Half-open pixel rectangle `[x0, x1) x [y0, y1)` of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileBounds {
    /// First column.
    pub x0: u32,
    /// First row.
    pub y0: u32,
    /// One past the last column.
    pub x1: u32,
    /// One past the last row.
    pub y1: u32,
}

impl TileBounds {
    /// Width in pixels.
    pub const fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    /// Height in pixels.
    pub const fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    /// `true` for a tile with no pixels.
    pub const fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// Uniforms for the light culling kernel.
///
/// Uploaded every frame with the current camera and screen state.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightCullingUniforms {
    /// World-to-view matrix.
    pub view: [[f32; 4]; 4],
    /// View-to-clip matrix.
    pub projection: [[f32; 4]; 4],
    /// Inverse projection for reconstructing view-space positions.
    pub inverse_projection: [[f32; 4]; 4],
    /// Screen dimensions in pixels (width, height).
    pub screen_size: [u32; 2],
    /// Tile grid dimensions (tiles_x, tiles_y).
    pub tile_count: [u32; 2],
    /// Number of active lights in the light buffer.
    pub num_lights: u32,
    /// Tile size in pixels.
    pub tile_size: u32,
    /// Capacity of each tile's light list.
    pub max_lights_per_tile: u32,
    /// Padding for 16-byte alignment.
    pub _padding: u32,
}

impl LightCullingUniforms {
    /// Builds the uniforms for one frame.
    ///
    /// Returns `None` if the projection is singular.
    pub fn new(
        view: &ViewInfo,
        config: &TiledCullingConfig,
        screen_width: u32,
        screen_height: u32,
        num_lights: u32,
    ) -> Option<Self> {
        let inverse_projection = view.projection.inverse()?;
        let (tiles_x, tiles_y) = config.tile_dimensions(screen_width, screen_height);
        Some(Self {
            view: view.view.to_cols_array_2d(),
            projection: view.projection.to_cols_array_2d(),
            inverse_projection: inverse_projection.to_cols_array_2d(),
            screen_size: [screen_width, screen_height],
            tile_count: [tiles_x, tiles_y],
            num_lights,
            tile_size: config.tile_size,
            max_lights_per_tile: config.max_lights_per_tile,
            _padding: 0,
        })
    }
}

/// Per-tile debug record written by the culling kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct TileStats {
    /// Number of light indices written for the tile (never above capacity).
    pub light_count: u32,
    /// Minimum device depth sampled in the tile.
    pub min_depth: f32,
    /// Maximum device depth sampled in the tile.
    pub max_depth: f32,
    /// Number of intersecting lights dropped because the list was full.
    pub overflow: u32,
}

/// Host-side copy of a culling result, read back through a mapped view.
#[derive(Debug, Clone, PartialEq)]
pub struct TileLightGrid {
    /// Tiles per row.
    pub tiles_x: u32,
    /// Tiles per column.
    pub tiles_y: u32,
    /// Capacity of each tile's list.
    pub capacity: u32,
    /// One record per tile, row-major.
    pub stats: Vec<TileStats>,
    /// `tiles * capacity` light indices; only the first `light_count` of each
    /// tile's region are meaningful.
    pub indices: Vec<u32>,
}

impl TileLightGrid {
    /// Row-major index of tile `(tile_x, tile_y)`.
    #[inline]
    pub fn tile_index(&self, tile_x: u32, tile_y: u32) -> usize {
        (tile_y * self.tiles_x + tile_x) as usize
    }

    /// Statistics of one tile.
    pub fn stats_at(&self, tile_x: u32, tile_y: u32) -> &TileStats {
        &self.stats[self.tile_index(tile_x, tile_y)]
    }

    /// The light indices written for one tile.
    pub fn lights_in_tile(&self, tile_x: u32, tile_y: u32) -> &[u32] {
        let tile = self.tile_index(tile_x, tile_y);
        let start = tile * self.capacity as usize;
        let count = (self.stats[tile].light_count.min(self.capacity)) as usize;
        &self.indices[start..start + count]
    }

    /// Largest list length over all tiles.
    pub fn max_lights_in_tile(&self) -> u32 {
        self.stats.iter().map(|s| s.light_count).max().unwrap_or(0)
    }

    /// Sum of all list lengths.
    pub fn total_references(&self) -> u64 {
        self.stats.iter().map(|s| s.light_count as u64).sum()
    }

    /// Number of tiles that dropped at least one light.
    pub fn overflowed_tiles(&self) -> u32 {
        self.stats.iter().filter(|s| s.overflow > 0).count() as u32
    }

    /// Total number of dropped light references.
    pub fn dropped_lights(&self) -> u64 {
        self.stats.iter().map(|s| s.overflow as u64).sum()
    }

    /// Summarizes the grid.
    pub fn report(&self, gpu_time: Option<Duration>) -> CullingReport {
        CullingReport::from_stats(self.tiles_x, self.tiles_y, &self.stats, gpu_time)
    }
}

/// Summary of one culling pass, published by the culling lane every frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CullingReport {
    /// Tiles per row.
    pub tiles_x: u32,
    /// Tiles per column.
    pub tiles_y: u32,
    /// Sum of all list lengths.
    pub total_references: u64,
    /// Largest list length.
    pub max_lights_in_tile: u32,
    /// Tiles that dropped at least one light.
    pub overflowed_tiles: u32,
    /// Total dropped light references.
    pub dropped_lights: u64,
    /// Device time of the culling dispatch, when measured.
    pub gpu_time: Option<Duration>,
}

impl CullingReport {
    /// Summarizes the per-tile records of a `tiles_x x tiles_y` grid.
    pub fn from_stats(
        tiles_x: u32,
        tiles_y: u32,
        stats: &[TileStats],
        gpu_time: Option<Duration>,
    ) -> Self {
        Self {
            tiles_x,
            tiles_y,
            total_references: stats.iter().map(|s| s.light_count as u64).sum(),
            max_lights_in_tile: stats.iter().map(|s| s.light_count).max().unwrap_or(0),
            overflowed_tiles: stats.iter().filter(|s| s.overflow > 0).count() as u32,
            dropped_lights: stats.iter().map(|s| s.overflow as u64).sum(),
            gpu_time,
        }
    }

    /// `true` if any tile dropped a light.
    pub fn has_overflow(&self) -> bool {
        self.dropped_lights > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_count_calculation() {
        let config = TiledCullingConfig::default();
        assert_eq!(config.tile_dimensions(800, 600), (50, 38));
        assert_eq!(config.tile_dimensions(1920, 1080), (120, 68));
        assert_eq!(config.total_tiles(800, 600), 1900);
    }

    #[test]
    fn test_partial_edge_tiles_are_clamped() {
        let config = TiledCullingConfig::default();
        // 600 = 37 * 16 + 8, so the last row of tiles is 8 pixels tall.
        let bottom = config.tile_bounds(0, 37, 800, 600);
        assert_eq!(bottom.y0, 592);
        assert_eq!(bottom.y1, 600);
        assert_eq!(bottom.height(), 8);
        assert_eq!(bottom.width(), 16);

        let corner = config.tile_bounds(49, 37, 800, 600);
        assert_eq!(corner.x1, 800);
        assert!(!corner.is_empty());
    }

    #[test]
    fn test_tiled_config_default() {
        let config = TiledCullingConfig::default();
        assert_eq!(config.tile_size, 16);
        assert_eq!(config.max_lights_per_tile, 2048);
        assert!(!config.strict_capacity);
        assert!(config.is_valid());
        assert!(!TiledCullingConfig::new(0, 8).is_valid());
    }

    #[test]
    fn test_buffer_size_calculation() {
        let config = TiledCullingConfig::new(16, 128);
        assert_eq!(config.light_index_buffer_size(1920, 1080), 8160 * 128 * 4);
        assert_eq!(config.tile_stats_buffer_size(1920, 1080), 8160 * 16);
    }

    #[test]
    fn test_light_culling_uniforms_size() {
        let size = std::mem::size_of::<LightCullingUniforms>();
        assert_eq!(size % 16, 0, "LightCullingUniforms should be 16-byte aligned");
        assert_eq!(std::mem::size_of::<TileStats>(), 16);
    }

    #[test]
    fn test_grid_queries() {
        let mut stats = vec![TileStats::default(); 4];
        stats[1].light_count = 2;
        stats[3].light_count = 2;
        stats[3].overflow = 3;
        let mut indices = vec![0u32; 8];
        indices[2] = 5;
        indices[3] = 9;
        let grid = TileLightGrid {
            tiles_x: 2,
            tiles_y: 2,
            capacity: 2,
            stats,
            indices,
        };
        assert_eq!(grid.lights_in_tile(1, 0), &[5, 9]);
        assert!(grid.lights_in_tile(0, 0).is_empty());
        let report = grid.report(None);
        assert_eq!(report.total_references, 4);
        assert_eq!(report.max_lights_in_tile, 2);
        assert_eq!(report.overflowed_tiles, 1);
        assert_eq!(report.dropped_lights, 3);
    }
}
