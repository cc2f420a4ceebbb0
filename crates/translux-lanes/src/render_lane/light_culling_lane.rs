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

//! Tile light culling lane.
//!
//! Each frame the lane uploads the culling uniforms and the light array,
//! dispatches [`LightCullingKernel`] over the tile grid, issues a barrier and
//! reads the per-tile statistics back into a [`CullingReport`]. The light
//! lists stay on the device and are published as [`TileLightLists`] for the
//! shading lanes.

use super::tiled_culling::{culling_bindings, LightCullingKernel};
use super::RenderWorld;
use crate::device_util;
use std::sync::{Arc, Mutex, PoisonError};
use translux_core::lane::{
    DepthTarget, Lane, LaneContext, LaneError, LaneKind, ScreenExtent, TileLightLists,
};
use translux_core::renderer::{
    BufferBinding, BufferId, BufferUsage, ComputeDevice, ComputeDispatch, CullingReport,
    LightCullingUniforms, PointLight, RenderError, ResourceError, TileLightGrid, TileStats,
    TiledCullingConfig, ViewInfo,
};

#[derive(Debug, Default)]
struct CullingResources {
    uniforms: Option<BufferId>,
    lights: Option<BufferId>,
    light_indices: Option<BufferId>,
    tile_stats: Option<BufferId>,
    tiles: (u32, u32),
    last_report: Option<CullingReport>,
}

/// Builds the per-tile light lists.
#[derive(Debug)]
pub struct LightCullingLane {
    config: TiledCullingConfig,
    kernel: LightCullingKernel,
    resources: Mutex<CullingResources>,
}

impl Default for LightCullingLane {
    fn default() -> Self {
        Self::new(TiledCullingConfig::default())
    }
}

impl LightCullingLane {
    /// Creates a culling lane with the given tile configuration.
    pub fn new(config: TiledCullingConfig) -> Self {
        Self {
            config,
            kernel: LightCullingKernel,
            resources: Mutex::new(CullingResources::default()),
        }
    }

    /// The tile configuration.
    pub fn config(&self) -> &TiledCullingConfig {
        &self.config
    }

    /// Report of the most recent frame, if any.
    pub fn last_report(&self) -> Option<CullingReport> {
        self.resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_report
    }

    /// Reads the full light lists back to the host.
    pub fn read_tile_grid(&self, device: &dyn ComputeDevice) -> Result<TileLightGrid, ResourceError> {
        let res = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
        let (Some(indices), Some(stats)) = (res.light_indices, res.tile_stats) else {
            return Err(ResourceError::InvalidHandle);
        };
        Ok(TileLightGrid {
            tiles_x: res.tiles.0,
            tiles_y: res.tiles.1,
            capacity: self.config.max_lights_per_tile,
            stats: device_util::read_back::<TileStats>(device, stats)?,
            indices: device_util::read_back::<u32>(device, indices)?,
        })
    }

    fn create_buffers(&self, device: &dyn ComputeDevice, extent: ScreenExtent) -> Result<(), ResourceError> {
        let mut res = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
        let (tiles_x, tiles_y) = self.config.tile_dimensions(extent.width, extent.height);
        let tiles = (tiles_x * tiles_y) as usize;
        let readable = BufferUsage::STORAGE | BufferUsage::MAP_READ;

        res.uniforms = Some(device_util::create_array::<LightCullingUniforms>(
            device,
            "light_culling_uniforms",
            1,
            BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        )?);
        res.light_indices = Some(device_util::create_array::<u32>(
            device,
            "tile_light_indices",
            tiles * self.config.max_lights_per_tile as usize,
            readable,
        )?);
        res.tile_stats = Some(device_util::create_array::<TileStats>(device, "tile_stats", tiles, readable)?);
        res.tiles = (tiles_x, tiles_y);

        log::info!(
            "LightCullingLane: {}x{} tiles of {}px, {} lights per tile ({} KiB of light lists)",
            tiles_x,
            tiles_y,
            self.config.tile_size,
            self.config.max_lights_per_tile,
            self.config.light_index_buffer_size(extent.width, extent.height) / 1024
        );
        Ok(())
    }
}

impl Lane for LightCullingLane {
    fn strategy_name(&self) -> &'static str {
        "LightCulling"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Culling
    }

    fn on_initialize(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        if !self.config.is_valid() {
            return Err(LaneError::initialization(RenderError::InitializationFailed(
                format!("invalid tile configuration {:?}", self.config),
            )));
        }
        let device = device_util::device(ctx)?;
        let extent = *ctx.require::<ScreenExtent>("ScreenExtent")?;
        self.create_buffers(device.as_ref(), extent)
            .map_err(LaneError::initialization)
    }

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let device = device_util::device(ctx)?;
        let extent = *ctx.require::<ScreenExtent>("ScreenExtent")?;
        let view = *ctx.require::<ViewInfo>("ViewInfo")?;
        let depth = ctx.require::<DepthTarget>("DepthTarget")?.0;
        let world = ctx.require::<Arc<RenderWorld>>("Arc<RenderWorld>")?.clone();

        let mut res = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
        let (Some(uniform_buffer), Some(indices), Some(stats)) =
            (res.uniforms, res.light_indices, res.tile_stats)
        else {
            return Err(LaneError::NotInitialized);
        };
        let (tiles_x, tiles_y) = res.tiles;

        let uniforms = LightCullingUniforms::new(
            &view,
            &self.config,
            extent.width,
            extent.height,
            world.lights.len() as u32,
        )
        .ok_or_else(|| {
            LaneError::execution(RenderError::Internal("projection matrix is not invertible".into()))
        })?;
        let lights = device_util::ensure_array::<PointLight>(
            device.as_ref(),
            &mut res.lights,
            "lights",
            world.lights.len(),
            BufferUsage::STORAGE | BufferUsage::COPY_DST,
        )
        .map_err(LaneError::execution)?;

        device
            .write_buffer(uniform_buffer, 0, bytemuck::bytes_of(&uniforms))
            .map_err(LaneError::execution)?;
        if !world.lights.is_empty() {
            device
                .write_buffer(lights, 0, bytemuck::cast_slice(&world.lights))
                .map_err(LaneError::execution)?;
        }

        let binds = [
            BufferBinding::read(culling_bindings::UNIFORMS, uniform_buffer),
            BufferBinding::read(culling_bindings::LIGHTS, lights),
            BufferBinding::read(culling_bindings::DEPTH, depth),
            BufferBinding::read_write(culling_bindings::LIGHT_INDICES, indices),
            BufferBinding::read_write(culling_bindings::TILE_STATS, stats),
        ];
        let query = device.begin_timer_query("light_culling");
        device
            .dispatch(&ComputeDispatch::new_2d(
                "light_culling",
                &self.kernel,
                &binds,
                tiles_x,
                tiles_y,
            ))
            .map_err(LaneError::execution)?;
        device.memory_barrier();
        device.end_timer_query(query).map_err(LaneError::execution)?;

        let tile_stats = device_util::read_back::<TileStats>(device.as_ref(), stats)
            .map_err(LaneError::execution)?;
        let gpu_time = device.poll_timer_query(query).map_err(LaneError::execution)?;
        let report = CullingReport::from_stats(tiles_x, tiles_y, &tile_stats, gpu_time);
        res.last_report = Some(report);
        drop(res);

        ctx.insert(TileLightLists {
            light_buffer: lights,
            index_buffer: indices,
            stats_buffer: stats,
            tiles_x,
            tiles_y,
            tile_size: self.config.tile_size,
            capacity: self.config.max_lights_per_tile,
        });
        ctx.insert(report);

        if report.has_overflow() {
            log::debug!(
                "LightCullingLane: {} lights dropped in {} tiles (capacity {})",
                report.dropped_lights,
                report.overflowed_tiles,
                self.config.max_lights_per_tile
            );
            if self.config.strict_capacity {
                return Err(LaneError::execution(RenderError::CapacityOverflow {
                    tiles: report.overflowed_tiles,
                    dropped: report.dropped_lights,
                }));
            }
        }
        Ok(())
    }

    fn on_shutdown(&self, ctx: &mut LaneContext) {
        let Ok(device) = device_util::device(ctx) else {
            return;
        };
        let mut guard = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
        let res = &mut *guard;
        for slot in [
            &mut res.uniforms,
            &mut res.lights,
            &mut res.light_indices,
            &mut res.tile_stats,
        ] {
            device_util::release(device.as_ref(), slot);
        }
        ctx.remove::<TileLightLists>();
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
