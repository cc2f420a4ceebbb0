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

//! Defines the `RenderWorld`, the scene as seen by the rendering lanes.

use translux_core::math::Vec3;
use translux_core::renderer::{PointLight, SceneSphere};

/// Ambient term used when none is configured.
pub const DEFAULT_AMBIENT: [f32; 3] = [0.1, 0.1, 0.1];

/// Everything the lanes draw for a frame.
///
/// The agent builds it once from the scene generator and shares it with the
/// lanes through the [`LaneContext`](translux_core::lane::LaneContext) as an
/// `Arc<RenderWorld>`.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderWorld {
    /// Point lights, in upload order. Light indices in the tile lists refer
    /// to positions in this vector.
    pub lights: Vec<PointLight>,
    /// Opaque geometry.
    pub spheres: Vec<SceneSphere>,
    /// Object rendered in texture space by the scattering pipeline.
    pub sss_subject: Option<SceneSphere>,
    /// Ambient radiance added to every lit surface.
    pub ambient: [f32; 3],
}

impl Default for RenderWorld {
    fn default() -> Self {
        Self {
            lights: Vec::new(),
            spheres: Vec::new(),
            sss_subject: None,
            ambient: DEFAULT_AMBIENT,
        }
    }
}

impl RenderWorld {
    /// Creates an empty world with the default ambient term.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ambient term as a vector.
    pub fn ambient(&self) -> Vec3 {
        Vec3::from_array(self.ambient)
    }

    /// Clears all the data, keeping the ambient term.
    pub fn clear(&mut self) {
        self.lights.clear();
        self.spheres.clear();
        self.sss_subject = None;
    }
}
