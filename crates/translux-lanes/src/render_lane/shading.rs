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

//! Surface lighting shared by the deferred and forward shading kernels.

use translux_core::math::{saturate, Vec3};
use translux_core::renderer::PointLight;

/// Blinn-Phong exponent.
pub const SPECULAR_POWER: f32 = 16.0;

/// Specular intensity relative to the light color.
pub const SPECULAR_STRENGTH: f32 = 0.5;

/// Light count at which the heatmap reaches its hottest color.
pub const HEATMAP_SATURATION: u32 = 32;

/// The inputs of the lighting equation at one pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSample {
    /// World-space position.
    pub position: Vec3,
    /// Unit world-space normal.
    pub normal: Vec3,
    /// Diffuse reflectance.
    pub albedo: Vec3,
}

/// Smooth windowed falloff: `(1 - (d/r)^2)^2`, zero at and beyond `radius`.
#[inline]
pub fn attenuation(distance: f32, radius: f32) -> f32 {
    if radius <= 0.0 || distance >= radius {
        return 0.0;
    }
    let ratio = distance / radius;
    let window = saturate(1.0 - ratio * ratio);
    window * window
}

/// Shades `surface` with the ambient term plus every light in `indices`.
///
/// Indices outside `lights` are ignored.
pub fn shade_surface(
    surface: &SurfaceSample,
    camera_position: Vec3,
    ambient: Vec3,
    lights: &[PointLight],
    indices: &[u32],
) -> Vec3 {
    let mut color = ambient * surface.albedo;
    let view_dir = (camera_position - surface.position).normalize();
    for &index in indices {
        let Some(light) = lights.get(index as usize) else {
            continue;
        };
        let to_light = light.position() - surface.position;
        let distance = to_light.length();
        let falloff = attenuation(distance, light.radius);
        if falloff <= 0.0 {
            continue;
        }
        let light_dir = to_light / distance.max(f32::EPSILON);
        let n_dot_l = surface.normal.dot(light_dir).max(0.0);
        let half = (light_dir + view_dir).normalize();
        let spec = if n_dot_l > 0.0 {
            surface.normal.dot(half).max(0.0).powf(SPECULAR_POWER) * SPECULAR_STRENGTH
        } else {
            0.0
        };
        let diffuse = surface.albedo * n_dot_l;
        color += (diffuse + Vec3::ONE * spec) * light.rgb() * falloff;
    }
    color
}

/// Blue-green-red ramp over `count / HEATMAP_SATURATION`.
pub fn heatmap_color(count: u32) -> [f32; 3] {
    let t = saturate(count as f32 / HEATMAP_SATURATION as f32);
    if count == 0 {
        return [0.0, 0.0, 0.0];
    }
    if t < 0.5 {
        let k = t * 2.0;
        [0.0, k, 1.0 - k]
    } else {
        let k = (t - 0.5) * 2.0;
        [k, 1.0 - k, 0.0]
    }
}

/// Encodes a unit normal into `[0, 1]` colors.
#[inline]
pub fn normal_color(normal: Vec3) -> [f32; 3] {
    [
        normal.x * 0.5 + 0.5,
        normal.y * 0.5 + 0.5,
        normal.z * 0.5 + 0.5,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn surface() -> SurfaceSample {
        SurfaceSample {
            position: Vec3::ZERO,
            normal: Vec3::Y,
            albedo: Vec3::new(0.5, 0.5, 0.5),
        }
    }

    #[test]
    fn test_attenuation_window() {
        assert_relative_eq!(attenuation(0.0, 2.0), 1.0);
        assert_relative_eq!(attenuation(1.0, 2.0), 0.5625);
        assert_eq!(attenuation(2.0, 2.0), 0.0);
        assert_eq!(attenuation(5.0, 2.0), 0.0);
    }

    #[test]
    fn test_no_lights_is_ambient_only() {
        let ambient = Vec3::new(0.1, 0.2, 0.3);
        let color = shade_surface(&surface(), Vec3::new(0.0, 5.0, 0.0), ambient, &[], &[]);
        assert_relative_eq!(color.x, 0.05);
        assert_relative_eq!(color.y, 0.1);
        assert_relative_eq!(color.z, 0.15);
    }

    #[test]
    fn test_light_above_adds_diffuse_and_specular() {
        let light = PointLight::new(Vec3::new(0.0, 1.0, 0.0), [1.0, 1.0, 1.0], 2.0);
        let color = shade_surface(
            &surface(),
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::ZERO,
            &[light],
            &[0],
        );
        // Diffuse 0.5, specular 0.5, falloff 0.5625.
        assert_relative_eq!(color.x, 0.5625, epsilon = 1e-5);
    }

    #[test]
    fn test_out_of_range_and_unknown_lights_are_skipped() {
        let far = PointLight::new(Vec3::new(0.0, 10.0, 0.0), [1.0, 1.0, 1.0], 2.0);
        let color = shade_surface(&surface(), Vec3::Y, Vec3::ZERO, &[far], &[0, 7]);
        assert_eq!(color, Vec3::ZERO);
    }

    #[test]
    fn test_heatmap_ramp() {
        assert_eq!(heatmap_color(0), [0.0, 0.0, 0.0]);
        assert_eq!(heatmap_color(HEATMAP_SATURATION / 2), [0.0, 1.0, 0.0]);
        assert_eq!(heatmap_color(HEATMAP_SATURATION * 4), [1.0, 0.0, 0.0]);
    }
}
