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

//! Pixel/NDC conventions shared by the screen-space kernels.
//!
//! Pixel row 0 is the top of the screen. NDC `y` points up and depth is in
//! `[0, 1]` with `1.0` at the far plane.

use translux_core::math::{Mat4, Vec3};

/// Value the depth target is cleared to.
pub const CLEAR_DEPTH: f32 = 1.0;

/// Color written where nothing is drawn.
pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Side of the square pixel block handled by one raster workgroup.
pub const RASTER_BLOCK_SIZE: u32 = 16;

/// NDC coordinates of the pixel edge `(x, y)`, both measured in pixels.
#[inline]
pub fn screen_to_ndc(x: f32, y: f32, width: u32, height: u32) -> (f32, f32) {
    (
        2.0 * x / width as f32 - 1.0,
        1.0 - 2.0 * y / height as f32,
    )
}

/// NDC coordinates of the center of pixel `(px, py)`.
#[inline]
pub fn pixel_center_ndc(px: u32, py: u32, width: u32, height: u32) -> (f32, f32) {
    screen_to_ndc(px as f32 + 0.5, py as f32 + 0.5, width, height)
}

/// Maps NDC `(x, y)` to continuous screen coordinates.
#[inline]
pub fn ndc_to_screen(x: f32, y: f32, width: u32, height: u32) -> (f32, f32) {
    (
        (x + 1.0) * 0.5 * width as f32,
        (1.0 - y) * 0.5 * height as f32,
    )
}

/// The ray leaving the near plane through NDC `(x, y)`.
///
/// Returns the origin on the near plane and the unit direction.
#[inline]
pub fn primary_ray(inverse_view_projection: &Mat4, x: f32, y: f32) -> (Vec3, Vec3) {
    let near = inverse_view_projection.project_point3(Vec3::new(x, y, 0.0));
    let far = inverse_view_projection.project_point3(Vec3::new(x, y, 1.0));
    (near, (far - near).normalize())
}

/// Linear view distance of a stored depth, normalized so the far plane maps to `1.0`.
///
/// Uses the `(2, 2)` and `(3, 2)` entries of a `[0, 1]` depth perspective projection.
#[inline]
pub fn linearize_depth(depth: f32, projection: &Mat4) -> f32 {
    let a = projection.cols[2].z;
    let denom = depth + a;
    if denom.abs() < f32::EPSILON {
        return 1.0;
    }
    ((1.0 + a) / denom).clamp(0.0, 1.0)
}

/// Row-major index of pixel `(px, py)`.
#[inline]
pub const fn pixel_index(px: u32, py: u32, width: u32) -> usize {
    py as usize * width as usize + px as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use translux_core::math::degrees_to_radians;

    #[test]
    fn test_pixel_center_convention() {
        let (x, y) = pixel_center_ndc(0, 0, 4, 2);
        assert_relative_eq!(x, -0.75);
        assert_relative_eq!(y, 0.5);
        let (sx, sy) = ndc_to_screen(x, y, 4, 2);
        assert_relative_eq!(sx, 0.5);
        assert_relative_eq!(sy, 0.5);
    }

    #[test]
    fn test_primary_ray_points_down_view_axis() {
        let proj = Mat4::perspective_rh_zo(degrees_to_radians(60.0), 1.0, 0.1, 100.0);
        let inv = proj.inverse().unwrap();
        let (origin, dir) = primary_ray(&inv, 0.0, 0.0);
        assert_relative_eq!(origin.z, -0.1, epsilon = 1e-4);
        assert_relative_eq!(dir.z, -1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_linearize_depth_endpoints() {
        let proj = Mat4::perspective_rh_zo(degrees_to_radians(45.0), 1.0, 0.1, 100.0);
        assert_relative_eq!(linearize_depth(1.0, &proj), 1.0, epsilon = 1e-4);
        assert_relative_eq!(linearize_depth(0.0, &proj), 0.001, epsilon = 1e-4);
    }
}
