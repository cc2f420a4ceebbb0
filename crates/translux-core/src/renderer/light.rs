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

//! GPU layout of a point light.

use crate::math::{BoundingSphere, Vec3};
use bytemuck::{Pod, Zeroable};

/// A point light as stored in the light storage buffer.
///
/// # Memory Layout
///
/// 48 bytes, std430-compatible: two 16-byte vectors, the radius and
/// three floats of padding. The `w` of `position` is 1, the alpha of
/// `color` is unused.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PointLight {
    /// Homogeneous world-space position.
    pub position: [f32; 4],
    /// Linear RGB color; alpha unused.
    pub color: [f32; 4],
    /// Influence radius in world units. Contribution is zero beyond it.
    pub radius: f32,
    /// Padding to a 16-byte stride.
    pub _padding: [f32; 3],
}

impl PointLight {
    /// Creates a light at `position` with the given color and radius.
    pub fn new(position: Vec3, color: [f32; 3], radius: f32) -> Self {
        Self {
            position: [position.x, position.y, position.z, 1.0],
            color: [color[0], color[1], color[2], 1.0],
            radius,
            _padding: [0.0; 3],
        }
    }

    /// World-space position.
    #[inline]
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.position[0], self.position[1], self.position[2])
    }

    /// RGB color.
    #[inline]
    pub fn rgb(&self) -> Vec3 {
        Vec3::new(self.color[0], self.color[1], self.color[2])
    }

    /// The sphere bounding the light's influence.
    #[inline]
    pub fn bounding_sphere(&self) -> BoundingSphere {
        BoundingSphere::new(self.position(), self.radius)
    }
}

impl Default for PointLight {
    fn default() -> Self {
        Self::new(Vec3::ZERO, [1.0, 1.0, 1.0], 2.0)
    }
}
