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

//! Column-major 4x4 matrix for view, projection and model transforms.

use super::vector::{Vec3, Vec4};
use std::ops::Mul;

/// A 4x4 column-major matrix.
///
/// Used for camera view and projection matrices as well as the inverse
/// projection consumed by the tile frustum construction.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Mat4 {
    /// The columns of the matrix. `cols[0]` is the first column, and so on.
    pub cols: [Vec4; 4],
}

impl Mat4 {
    /// The 4x4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [Vec4::X, Vec4::Y, Vec4::Z, Vec4::W],
    };

    /// Creates a new matrix from four column vectors.
    #[inline]
    pub fn from_cols(c0: Vec4, c1: Vec4, c2: Vec4, c3: Vec4) -> Self {
        Self {
            cols: [c0, c1, c2, c3],
        }
    }

    /// Returns a row of the matrix as a `Vec4`.
    #[inline]
    pub fn get_row(&self, index: usize) -> Vec4 {
        Vec4::new(
            self.cols[0].get(index),
            self.cols[1].get(index),
            self.cols[2].get(index),
            self.cols[3].get(index),
        )
    }

    /// Creates a translation matrix.
    #[inline]
    pub fn from_translation(v: Vec3) -> Self {
        Self::from_cols(Vec4::X, Vec4::Y, Vec4::Z, Vec4::from_vec3(v, 1.0))
    }

    /// Creates a non-uniform scale matrix.
    #[inline]
    pub fn from_scale(scale: Vec3) -> Self {
        Self::from_cols(
            Vec4::new(scale.x, 0.0, 0.0, 0.0),
            Vec4::new(0.0, scale.y, 0.0, 0.0),
            Vec4::new(0.0, 0.0, scale.z, 0.0),
            Vec4::W,
        )
    }

    /// Creates a right-handed perspective projection with a `[0, 1]` depth range (ZO).
    ///
    /// # Arguments
    ///
    /// * `fov_y_radians`: Vertical field of view in radians.
    /// * `aspect_ratio`: Width divided by height of the viewport.
    /// * `z_near`: Distance to the near clipping plane (must be positive).
    /// * `z_far`: Distance to the far clipping plane (must be > `z_near`).
    #[inline]
    pub fn perspective_rh_zo(
        fov_y_radians: f32,
        aspect_ratio: f32,
        z_near: f32,
        z_far: f32,
    ) -> Self {
        assert!(z_near > 0.0 && z_far > z_near);
        let f = 1.0 / (fov_y_radians / 2.0).tan();
        let cc = z_far / (z_near - z_far);
        let dd = (z_near * z_far) / (z_near - z_far);

        Self::from_cols(
            Vec4::new(f / aspect_ratio, 0.0, 0.0, 0.0),
            Vec4::new(0.0, f, 0.0, 0.0),
            Vec4::new(0.0, 0.0, cc, -1.0),
            Vec4::new(0.0, 0.0, dd, 0.0),
        )
    }

    /// Creates a right-handed view matrix looking from `eye` towards `target`.
    ///
    /// Returns `None` if `eye` and `target` coincide or `up` is parallel to
    /// the view direction.
    #[inline]
    pub fn look_at_rh(eye: Vec3, target: Vec3, up: Vec3) -> Option<Self> {
        let eps2 = crate::math::EPSILON * crate::math::EPSILON;
        let forward = target - eye;
        if forward.length_squared() < eps2 {
            return None;
        }
        let f = forward.normalize();
        let s = f.cross(up);
        if s.length_squared() < eps2 {
            return None;
        }
        let s = s.normalize();
        let u = s.cross(f);

        Some(Self::from_cols(
            Vec4::new(s.x, u.x, -f.x, 0.0),
            Vec4::new(s.y, u.y, -f.y, 0.0),
            Vec4::new(s.z, u.z, -f.z, 0.0),
            Vec4::new(-eye.dot(s), -eye.dot(u), eye.dot(f), 1.0),
        ))
    }

    /// Returns the transpose of the matrix.
    #[inline]
    pub fn transpose(&self) -> Self {
        Self::from_cols(
            self.get_row(0),
            self.get_row(1),
            self.get_row(2),
            self.get_row(3),
        )
    }

    /// Computes the inverse of the matrix by cofactor expansion.
    /// Returns `None` if the matrix is not invertible.
    pub fn inverse(&self) -> Option<Self> {
        let [c0, c1, c2, c3] = self.cols;

        // 2x2 sub-determinants of the lower two rows (z, w).
        let s0 = c2.z * c3.w - c3.z * c2.w;
        let s1 = c1.z * c3.w - c3.z * c1.w;
        let s2 = c1.z * c2.w - c2.z * c1.w;
        let s3 = c0.z * c3.w - c3.z * c0.w;
        let s4 = c0.z * c2.w - c2.z * c0.w;
        let s5 = c0.z * c1.w - c1.z * c0.w;
        // 2x2 sub-determinants mixing y with z/w.
        let t0 = c2.y * c3.w - c3.y * c2.w;
        let t1 = c1.y * c3.w - c3.y * c1.w;
        let t2 = c1.y * c2.w - c2.y * c1.w;
        let t3 = c0.y * c3.w - c3.y * c0.w;
        let t4 = c0.y * c2.w - c2.y * c0.w;
        let t5 = c0.y * c1.w - c1.y * c0.w;
        let u0 = c2.y * c3.z - c3.y * c2.z;
        let u1 = c1.y * c3.z - c3.y * c1.z;
        let u2 = c1.y * c2.z - c2.y * c1.z;
        let u3 = c0.y * c3.z - c3.y * c0.z;
        let u4 = c0.y * c2.z - c2.y * c0.z;
        let u5 = c0.y * c1.z - c1.y * c0.z;

        let a00 = c1.y * s0 - c2.y * s1 + c3.y * s2;
        let a01 = -(c1.x * s0 - c2.x * s1 + c3.x * s2);
        let a02 = c1.x * t0 - c2.x * t1 + c3.x * t2;
        let a03 = -(c1.x * u0 - c2.x * u1 + c3.x * u2);

        let a10 = -(c0.y * s0 - c2.y * s3 + c3.y * s4);
        let a11 = c0.x * s0 - c2.x * s3 + c3.x * s4;
        let a12 = -(c0.x * t0 - c2.x * t3 + c3.x * t4);
        let a13 = c0.x * u0 - c2.x * u3 + c3.x * u4;

        let a20 = c0.y * s1 - c1.y * s3 + c3.y * s5;
        let a21 = -(c0.x * s1 - c1.x * s3 + c3.x * s5);
        let a22 = c0.x * t1 - c1.x * t3 + c3.x * t5;
        let a23 = -(c0.x * u1 - c1.x * u3 + c3.x * u5);

        let a30 = -(c0.y * s2 - c1.y * s4 + c2.y * s5);
        let a31 = c0.x * s2 - c1.x * s4 + c2.x * s5;
        let a32 = -(c0.x * t2 - c1.x * t4 + c2.x * t5);
        let a33 = c0.x * u2 - c1.x * u4 + c2.x * u5;

        let det = c0.x * a00 + c1.x * a10 + c2.x * a20 + c3.x * a30;
        if det.abs() < crate::math::EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;

        Some(Self::from_cols(
            Vec4::new(a00, a10, a20, a30) * inv_det,
            Vec4::new(a01, a11, a21, a31) * inv_det,
            Vec4::new(a02, a12, a22, a32) * inv_det,
            Vec4::new(a03, a13, a23, a33) * inv_det,
        ))
    }

    /// Transforms a point (`w = 1`) and applies the perspective divide.
    #[inline]
    pub fn project_point3(&self, p: Vec3) -> Vec3 {
        (*self * Vec4::from_vec3(p, 1.0)).project()
    }

    /// Transforms a point (`w = 1`) by an affine matrix, ignoring `w`.
    #[inline]
    pub fn transform_point3(&self, p: Vec3) -> Vec3 {
        (*self * Vec4::from_vec3(p, 1.0)).truncate()
    }

    /// Returns the columns as nested arrays, the layout expected by GPU uniforms.
    #[inline]
    pub fn to_cols_array_2d(&self) -> [[f32; 4]; 4] {
        [
            self.cols[0].to_array(),
            self.cols[1].to_array(),
            self.cols[2].to_array(),
            self.cols[3].to_array(),
        ]
    }

    /// Rebuilds a matrix from the nested-array uniform layout.
    #[inline]
    pub fn from_cols_array_2d(m: &[[f32; 4]; 4]) -> Self {
        Self::from_cols(
            Vec4::from_array(m[0]),
            Vec4::from_array(m[1]),
            Vec4::from_array(m[2]),
            Vec4::from_array(m[3]),
        )
    }
}

// --- Operators Overloading ---

impl Default for Mat4 {
    /// Returns the 4x4 identity matrix.
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul<Mat4> for Mat4 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Mat4) -> Self {
        Self::from_cols(
            self * rhs.cols[0],
            self * rhs.cols[1],
            self * rhs.cols[2],
            self * rhs.cols[3],
        )
    }
}

impl Mul<Vec4> for Mat4 {
    type Output = Vec4;
    #[inline]
    fn mul(self, rhs: Vec4) -> Vec4 {
        self.cols[0] * rhs.x + self.cols[1] * rhs.y + self.cols[2] * rhs.z + self.cols[3] * rhs.w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{approx_eq, degrees_to_radians, PI};

    fn mat4_approx_eq(a: Mat4, b: Mat4) -> bool {
        (0..4).all(|c| (0..4).all(|r| approx_eq(a.cols[c].get(r), b.cols[c].get(r))))
    }

    #[test]
    fn test_identity() {
        assert_eq!(Mat4::default(), Mat4::IDENTITY);
        let p = Vec4::new(1.0, 2.0, 3.0, 1.0);
        assert_eq!(Mat4::IDENTITY * p, p);
    }

    #[test]
    fn test_translation_and_scale() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0))
            * Mat4::from_scale(Vec3::new(2.0, 2.0, 2.0));
        assert_eq!(m.transform_point3(Vec3::ONE), Vec3::new(3.0, 4.0, 5.0));
    }

    #[test]
    fn test_transpose_twice_is_identity_op() {
        let m = Mat4::from_translation(Vec3::new(4.0, 5.0, 6.0));
        assert_eq!(m.transpose().transpose(), m);
        assert_eq!(m.transpose().cols[0].w, 4.0);
    }

    #[test]
    fn test_inverse() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0))
            * Mat4::from_scale(Vec3::new(1.0, 2.0, 0.5));
        let inv = m.inverse().expect("Matrix should be invertible");
        assert!(mat4_approx_eq(m * inv, Mat4::IDENTITY));

        let singular = Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0));
        assert!(singular.inverse().is_none());
    }

    #[test]
    fn test_perspective_inverse_round_trip() {
        let proj = Mat4::perspective_rh_zo(degrees_to_radians(45.0), 800.0 / 600.0, 0.1, 100.0);
        let inv = proj.inverse().expect("Projection should be invertible");
        let view_point = Vec3::new(0.3, -0.2, -7.5);
        let ndc = proj.project_point3(view_point);
        let back = inv.project_point3(ndc);
        assert!(approx_eq_loose(back.x, view_point.x));
        assert!(approx_eq_loose(back.y, view_point.y));
        assert!(approx_eq_loose(back.z, view_point.z));
    }

    fn approx_eq_loose(a: f32, b: f32) -> bool {
        crate::math::approx_eq_eps(a, b, 1e-3)
    }

    #[test]
    fn test_perspective_rh_zo_depth_range() {
        let proj = Mat4::perspective_rh_zo(PI / 4.0, 1.0, 0.1, 100.0);
        let near = proj.project_point3(Vec3::new(0.0, 0.0, -0.1));
        let far = proj.project_point3(Vec3::new(0.0, 0.0, -100.0));
        assert!(approx_eq(near.z, 0.0));
        assert!(approx_eq_loose(far.z, 1.0));
    }

    #[test]
    fn test_look_at_rh() {
        let m = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y)
            .expect("look_at_rh should return Some(Mat4)");
        assert!(approx_eq(m.cols[2].z, 1.0));
        assert!(approx_eq(m.cols[3].z, -5.0));
        // The origin ends up five units in front of the camera.
        assert!(approx_eq(m.transform_point3(Vec3::ZERO).z, -5.0));
    }

    #[test]
    fn test_look_at_rh_invalid() {
        let eye = Vec3::new(0.0, 0.0, 5.0);
        assert!(Mat4::look_at_rh(eye, eye, Vec3::Y).is_none());
        assert!(Mat4::look_at_rh(eye, Vec3::new(0.0, 10.0, 5.0), Vec3::Y).is_none());
    }

    #[test]
    fn test_cols_array_round_trip() {
        let m = Mat4::from_translation(Vec3::new(7.0, 8.0, 9.0));
        assert_eq!(Mat4::from_cols_array_2d(&m.to_cols_array_2d()), m);
    }
}
