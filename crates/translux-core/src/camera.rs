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

//! A yaw/pitch fly camera producing view and projection matrices.

use crate::math::{degrees_to_radians, Mat4, Vec3};
use crate::renderer::ViewInfo;

/// Default yaw, looking down -Z.
pub const DEFAULT_YAW: f32 = -90.0;
/// Default pitch.
pub const DEFAULT_PITCH: f32 = 0.0;
/// Default movement speed in world units per second.
pub const DEFAULT_SPEED: f32 = 2.5;
/// Default mouse sensitivity in degrees per pixel.
pub const DEFAULT_SENSITIVITY: f32 = 0.1;
/// Default vertical field of view in degrees.
pub const DEFAULT_ZOOM: f32 = 45.0;
/// Near clipping distance.
pub const Z_NEAR: f32 = 0.1;
/// Far clipping distance.
pub const Z_FAR: f32 = 100.0;

/// Discrete movement directions driven by keyboard input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMovement {
    /// Along the view direction.
    Forward,
    /// Against the view direction.
    Backward,
    /// Strafe left.
    Left,
    /// Strafe right.
    Right,
}

/// A first-person camera with Euler angles in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// World-space eye position.
    pub position: Vec3,
    /// World up used to rebuild the basis.
    pub world_up: Vec3,
    /// Yaw in degrees.
    pub yaw: f32,
    /// Pitch in degrees.
    pub pitch: f32,
    /// Movement speed in units per second.
    pub movement_speed: f32,
    /// Mouse sensitivity in degrees per pixel.
    pub mouse_sensitivity: f32,
    /// Vertical field of view in degrees, adjusted by the scroll wheel.
    pub zoom: f32,
    front: Vec3,
    right: Vec3,
    up: Vec3,
}

impl Camera {
    /// Creates a camera at `position` with default orientation and tuning.
    pub fn new(position: Vec3) -> Self {
        let mut camera = Self {
            position,
            world_up: Vec3::Y,
            yaw: DEFAULT_YAW,
            pitch: DEFAULT_PITCH,
            movement_speed: DEFAULT_SPEED,
            mouse_sensitivity: DEFAULT_SENSITIVITY,
            zoom: DEFAULT_ZOOM,
            front: -Vec3::Z,
            right: Vec3::X,
            up: Vec3::Y,
        };
        camera.update_vectors();
        camera
    }

    /// Unit view direction.
    pub fn front(&self) -> Vec3 {
        self.front
    }

    /// World-to-view matrix.
    pub fn view_matrix(&self) -> Mat4 {
        // The basis is orthonormal by construction, so `look_at_rh` cannot fail.
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
            .unwrap_or(Mat4::IDENTITY)
    }

    /// Perspective projection for the given aspect ratio.
    pub fn projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
        Mat4::perspective_rh_zo(degrees_to_radians(self.zoom), aspect_ratio, Z_NEAR, Z_FAR)
    }

    /// Bundles the matrices for a `width x height` target.
    pub fn view_info(&self, width: u32, height: u32) -> ViewInfo {
        let aspect = width as f32 / height.max(1) as f32;
        ViewInfo::new(self.view_matrix(), self.projection_matrix(aspect), self.position)
    }

    /// Moves the camera; `delta_time` is in seconds.
    pub fn process_keyboard(&mut self, direction: CameraMovement, delta_time: f32) {
        let velocity = self.movement_speed * delta_time;
        match direction {
            CameraMovement::Forward => self.position += self.front * velocity,
            CameraMovement::Backward => self.position += -(self.front * velocity),
            CameraMovement::Left => self.position += -(self.right * velocity),
            CameraMovement::Right => self.position += self.right * velocity,
        }
    }

    /// Rotates the camera by a cursor delta in pixels.
    pub fn process_mouse_movement(&mut self, x_offset: f32, y_offset: f32, constrain_pitch: bool) {
        self.yaw += x_offset * self.mouse_sensitivity;
        self.pitch += y_offset * self.mouse_sensitivity;
        if constrain_pitch {
            self.pitch = self.pitch.clamp(-89.0, 89.0);
        }
        self.update_vectors();
    }

    /// Zooms by a scroll delta; the field of view stays within `[1, 45]` degrees.
    pub fn process_mouse_scroll(&mut self, y_offset: f32) {
        self.zoom = (self.zoom - y_offset).clamp(1.0, DEFAULT_ZOOM);
    }

    fn update_vectors(&mut self) {
        let yaw = degrees_to_radians(self.yaw);
        let pitch = degrees_to_radians(self.pitch);
        self.front = Vec3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        )
        .normalize();
        self.right = self.front.cross(self.world_up).normalize();
        self.up = self.right.cross(self.front).normalize();
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, 5.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::approx_eq;

    #[test]
    fn test_default_camera_looks_down_negative_z() {
        let camera = Camera::default();
        let front = camera.front();
        assert!(approx_eq(front.x, 0.0));
        assert!(approx_eq(front.z, -1.0));
        let origin_in_view = camera.view_matrix().transform_point3(Vec3::ZERO);
        assert!(approx_eq(origin_in_view.z, -5.0));
    }

    #[test]
    fn test_keyboard_moves_along_front() {
        let mut camera = Camera::default();
        camera.process_keyboard(CameraMovement::Forward, 2.0);
        assert!(approx_eq(camera.position.z, 0.0));
        camera.process_keyboard(CameraMovement::Right, 1.0);
        assert!(approx_eq(camera.position.x, DEFAULT_SPEED));
    }

    #[test]
    fn test_pitch_is_constrained() {
        let mut camera = Camera::default();
        camera.process_mouse_movement(0.0, 10_000.0, true);
        assert_eq!(camera.pitch, 89.0);
        camera.process_mouse_movement(0.0, -20_000.0, false);
        assert!(camera.pitch < -89.0);
    }

    #[test]
    fn test_scroll_clamps_zoom() {
        let mut camera = Camera::default();
        camera.process_mouse_scroll(100.0);
        assert_eq!(camera.zoom, 1.0);
        camera.process_mouse_scroll(-100.0);
        assert_eq!(camera.zoom, DEFAULT_ZOOM);
    }
}
