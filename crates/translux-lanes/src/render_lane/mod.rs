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

//! Rendering lanes - the tiled lighting pipeline.
//!
//! A Deferred frame runs [`GeometryPassLane`] (full G-buffer), then
//! [`LightCullingLane`], then [`TiledShadingLane`] over a full-screen quad and
//! finally [`LightBoxLane`]. A Forward frame swaps the G-buffer for a depth
//! pre-pass and re-intersects the geometry in the shading pass.

mod geometry_pass_lane;
mod light_box_lane;
mod light_culling_lane;
mod screen;
pub mod shaders;
mod shading;
mod tiled_culling;
mod tiled_shading_lane;
mod world;

pub use geometry_pass_lane::*;
pub use light_box_lane::*;
pub use light_culling_lane::*;
pub use screen::*;
pub use shading::*;
pub use tiled_culling::*;
pub use tiled_shading_lane::*;
pub use world::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_tables_are_reachable_per_lane() {
        assert_eq!(culling_bindings::TILE_STATS, shading_bindings::TILE_STATS + 1);
        assert_eq!(geometry_bindings::UNIFORMS, 0);
        assert_eq!(light_box_bindings::UNIFORMS, 0);
        let culling = [
            culling_bindings::UNIFORMS,
            culling_bindings::LIGHTS,
            culling_bindings::DEPTH,
            culling_bindings::LIGHT_INDICES,
            culling_bindings::TILE_STATS,
        ];
        assert_eq!(culling, [0, 1, 2, 3, 4]);
    }
}
