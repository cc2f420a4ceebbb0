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

//! Planes, spheres and convex frusta used by the per-tile culling test.

use super::vector::Vec3;

/// An oriented plane `dot(normal, p) + distance = 0`.
///
/// The positive half-space (`signed_distance > 0`) is considered "inside".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal pointing into the inside half-space.
    pub normal: Vec3,
    /// Signed offset from the origin along `normal`.
    pub distance: f32,
}

impl Plane {
    /// Creates a plane from a normal (normalized here) and a point on it.
    #[inline]
    pub fn from_normal_and_point(normal: Vec3, point: Vec3) -> Self {
        let n = normal.normalize();
        Self {
            normal: n,
            distance: -n.dot(point),
        }
    }

    /// Creates the plane through the origin and the two points `a` and `b`,
    /// oriented so that `inside` lies in the positive half-space.
    ///
    /// Returns `None` if `a` and `b` are collinear with the origin.
    pub fn through_origin(a: Vec3, b: Vec3, inside: Vec3) -> Option<Self> {
        let n = a.cross(b);
        if n.length_squared() < crate::math::EPSILON * crate::math::EPSILON {
            return None;
        }
        let mut plane = Self::from_normal_and_point(n, Vec3::ZERO);
        if plane.signed_distance(inside) < 0.0 {
            plane = plane.flipped();
        }
        Some(plane)
    }

    /// Signed distance from `point` to the plane.
    #[inline]
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }

    /// The same plane with the opposite orientation.
    #[inline]
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            distance: -self.distance,
        }
    }
}

/// A sphere used as the bounding volume of a point light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    /// Center of the sphere.
    pub center: Vec3,
    /// Radius of the sphere.
    pub radius: f32,
}

impl BoundingSphere {
    /// Creates a new sphere.
    #[inline]
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// `true` unless the sphere lies strictly outside `plane`.
    ///
    /// A sphere touching the plane (distance exactly `-radius`) is kept.
    #[inline]
    pub fn intersects_plane(&self, plane: &Plane) -> bool {
        plane.signed_distance(self.center) >= -self.radius
    }
}

/// A convex volume bounded by six inward-facing planes.
///
/// Plane order: left, right, bottom, top, near, far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    /// The bounding planes.
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Conservative sphere test: returns `false` only if the sphere is
    /// completely outside at least one plane.
    #[inline]
    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.planes.iter().all(|p| sphere.intersects_plane(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::approx_eq;

    fn unit_box() -> Frustum {
        // Axis-aligned box [-1, 1]^3 expressed as six inward planes.
        Frustum {
            planes: [
                Plane::from_normal_and_point(Vec3::X, Vec3::new(-1.0, 0.0, 0.0)),
                Plane::from_normal_and_point(-Vec3::X, Vec3::new(1.0, 0.0, 0.0)),
                Plane::from_normal_and_point(Vec3::Y, Vec3::new(0.0, -1.0, 0.0)),
                Plane::from_normal_and_point(-Vec3::Y, Vec3::new(0.0, 1.0, 0.0)),
                Plane::from_normal_and_point(Vec3::Z, Vec3::new(0.0, 0.0, -1.0)),
                Plane::from_normal_and_point(-Vec3::Z, Vec3::new(0.0, 0.0, 1.0)),
            ],
        }
    }

    #[test]
    fn test_signed_distance() {
        let p = Plane::from_normal_and_point(Vec3::new(0.0, 2.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
        assert!(approx_eq(p.signed_distance(Vec3::new(5.0, 3.0, 0.0)), 2.0));
        assert!(approx_eq(p.flipped().signed_distance(Vec3::ZERO), 1.0));
    }

    #[test]
    fn test_through_origin_orientation() {
        let plane = Plane::through_origin(Vec3::X, Vec3::Z, Vec3::new(0.0, -1.0, 0.0))
            .expect("non-degenerate plane");
        assert!(plane.signed_distance(Vec3::new(0.0, -3.0, 0.0)) > 0.0);
        assert!(approx_eq(plane.distance, 0.0));
        assert!(Plane::through_origin(Vec3::X, Vec3::X * 2.0, Vec3::Y).is_none());
    }

    #[test]
    fn test_sphere_inside_and_outside() {
        let f = unit_box();
        assert!(f.intersects_sphere(&BoundingSphere::new(Vec3::ZERO, 0.1)));
        assert!(f.intersects_sphere(&BoundingSphere::new(Vec3::new(1.5, 0.0, 0.0), 1.0)));
        assert!(!f.intersects_sphere(&BoundingSphere::new(Vec3::new(3.0, 0.0, 0.0), 1.0)));
    }

    #[test]
    fn test_sphere_touching_boundary_is_kept() {
        let f = unit_box();
        // Signed distance to the +X plane is exactly -radius.
        let touching = BoundingSphere::new(Vec3::new(2.0, 0.0, 0.0), 1.0);
        assert!(f.intersects_sphere(&touching));
    }
}
