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

//! Analytic scene geometry and the small built-in meshes.

use crate::math::{BoundingSphere, Vec3};
use bytemuck::{Pod, Zeroable};

/// A sphere primitive, rendered by ray casting in the geometry pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneSphere {
    /// World-space center.
    pub center: [f32; 3],
    /// Radius.
    pub radius: f32,
    /// Diffuse albedo.
    pub albedo: [f32; 3],
    /// Padding to a 32-byte stride.
    pub _padding: f32,
}

impl SceneSphere {
    /// Creates a sphere.
    pub fn new(center: Vec3, radius: f32, albedo: [f32; 3]) -> Self {
        Self {
            center: center.to_array(),
            radius,
            albedo,
            _padding: 0.0,
        }
    }

    /// World-space center.
    #[inline]
    pub fn center(&self) -> Vec3 {
        Vec3::from_array(self.center)
    }

    /// Bounding volume of the sphere.
    pub fn bounds(&self) -> BoundingSphere {
        BoundingSphere::new(self.center(), self.radius)
    }

    /// Distance along the unit ray `(origin, dir)` to the nearest hit in
    /// front of the origin.
    pub fn intersect_ray(&self, origin: Vec3, dir: Vec3) -> Option<f32> {
        let oc = origin - self.center();
        let b = oc.dot(dir);
        let c = oc.length_squared() - self.radius * self.radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let sqrt_disc = disc.sqrt();
        let near = -b - sqrt_disc;
        if near > 0.0 {
            return Some(near);
        }
        let far = -b + sqrt_disc;
        (far > 0.0).then_some(far)
    }
}

/// Interleaved vertex: position, normal, texture coordinates.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    /// Object-space position.
    pub position: [f32; 3],
    /// Object-space normal.
    pub normal: [f32; 3],
    /// Texture coordinates.
    pub uv: [f32; 2],
}

impl MeshVertex {
    const fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// Screen-filling quad in NDC, as a four-vertex triangle strip.
pub const QUAD_VERTICES: [MeshVertex; 4] = [
    MeshVertex::new([-1.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
    MeshVertex::new([-1.0, -1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
    MeshVertex::new([1.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 1.0]),
    MeshVertex::new([1.0, -1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
];

/// Vertices in [`cube_vertices`].
pub const CUBE_VERTEX_COUNT: usize = 36;

/// The `[-1, 1]^3` cube as a triangle list, counter-clockwise from outside.
pub fn cube_vertices() -> Vec<MeshVertex> {
    // (normal, tangent u, tangent v) with u x v == normal.
    const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
    ];
    const CORNERS: [[f32; 2]; 6] = [
        [-1.0, -1.0],
        [1.0, -1.0],
        [1.0, 1.0],
        [1.0, 1.0],
        [-1.0, 1.0],
        [-1.0, -1.0],
    ];

    let mut vertices = Vec::with_capacity(CUBE_VERTEX_COUNT);
    for (normal, u, v) in FACES {
        let (n, u, v) = (
            Vec3::from_array(normal),
            Vec3::from_array(u),
            Vec3::from_array(v),
        );
        for [s, t] in CORNERS {
            let p = n + u * s + v * t;
            vertices.push(MeshVertex::new(
                p.to_array(),
                normal,
                [(s + 1.0) * 0.5, (t + 1.0) * 0.5],
            ));
        }
    }
    vertices
}
