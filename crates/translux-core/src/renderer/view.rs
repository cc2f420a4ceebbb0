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

//! Per-frame camera state and debug visualization selection.

use crate::math::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Camera matrices for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewInfo {
    /// World-to-view matrix.
    pub view: Mat4,
    /// View-to-clip matrix (right-handed, depth in `[0, 1]`).
    pub projection: Mat4,
    /// Eye position in world space.
    pub position: Vec3,
}

impl ViewInfo {
    /// Bundles the camera state.
    pub fn new(view: Mat4, projection: Mat4, position: Vec3) -> Self {
        Self {
            view,
            projection,
            position,
        }
    }

    /// Combined world-to-clip matrix.
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

impl Default for ViewInfo {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec3::ZERO)
    }
}

/// What the final shading pass writes to the color target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DebugView {
    /// Lit output.
    #[default]
    Lit,
    /// Per-tile light count as a heatmap.
    TileHeatmap,
    /// Linear scene depth.
    Depth,
    /// World-space normals.
    Normals,
}

impl DebugView {
    /// All views, in index order.
    pub const ALL: [DebugView; 4] = [
        DebugView::Lit,
        DebugView::TileHeatmap,
        DebugView::Depth,
        DebugView::Normals,
    ];

    /// Maps the integer selector `0..=3` to a view.
    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Integer selector of this view.
    pub fn index(self) -> u32 {
        self as u32
    }

    /// The next view, wrapping around.
    pub fn next(self) -> Self {
        Self::ALL[(self.index() as usize + 1) % Self::ALL.len()]
    }
}
