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

//! Pass sequence of each render mode.

use crate::mode::RenderMode;
use crate::settings::RenderSettings;
use translux_core::lane::LaneRegistry;
use translux_core::renderer::{KernelDimensionError, KernelDimensions};
use translux_lanes::render_lane::{
    GeometryPassLane, LightBoxLane, LightCullingLane, TiledShadingLane,
};
use translux_lanes::sss_lane::{HaarBakeLane, ScatteringLane, SssDisplayLane, TextureSpaceLane};

/// Registers the lanes of `settings.mode`, in execution order.
pub fn build_lanes(settings: &RenderSettings) -> Result<LaneRegistry, KernelDimensionError> {
    let mut lanes = LaneRegistry::new();
    match settings.mode {
        RenderMode::Deferred => {
            lanes.register(Box::new(GeometryPassLane::gbuffer()));
            lanes.register(Box::new(LightCullingLane::new(settings.culling)));
            lanes.register(Box::new(TiledShadingLane::deferred()));
            lanes.register(Box::new(LightBoxLane::default()));
        }
        RenderMode::Forward => {
            lanes.register(Box::new(GeometryPassLane::depth_prepass()));
            lanes.register(Box::new(LightCullingLane::new(settings.culling)));
            lanes.register(Box::new(TiledShadingLane::forward()));
            lanes.register(Box::new(LightBoxLane::default()));
        }
        RenderMode::SssBake => {
            let dims = settings.sss.dimensions()?;
            lanes.register(Box::new(texture_space(settings, dims)));
            lanes.register(Box::new(HaarBakeLane::new(dims, settings.sss.profile.clone())));
        }
        RenderMode::SssRuntime => {
            let dims = settings.sss.dimensions()?;
            lanes.register(Box::new(texture_space(settings, dims)));
            lanes.register(Box::new(ScatteringLane::new(dims, settings.sss.mix)));
            lanes.register(Box::new(SssDisplayLane::new(dims)));
        }
    }
    Ok(lanes)
}

fn texture_space(settings: &RenderSettings, dims: KernelDimensions) -> TextureSpaceLane {
    let lane = TextureSpaceLane::new(dims);
    match &settings.sss.albedo_texture {
        Some(path) => lane.with_albedo_texture(path),
        None => lane,
    }
}
