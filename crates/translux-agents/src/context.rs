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

//! Application state shared by the frames of a run: the camera, the cursor
//! tracking that steers it, the debug view selection and cached meshes.

use translux_core::camera::{Camera, CameraMovement};
use translux_core::renderer::{
    cube_vertices, BufferDescriptor, BufferId, BufferUsage, ComputeDevice, DebugView, MeshVertex,
    ResourceError, QUAD_VERTICES,
};

/// Tracks the previous cursor position to turn absolute positions into deltas.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CursorState {
    last: Option<(f32, f32)>,
}

impl CursorState {
    /// Offset since the previous position, with `y` pointing up.
    ///
    /// The first call only records the position and yields no movement.
    pub fn offset(&mut self, x: f32, y: f32) -> (f32, f32) {
        let (last_x, last_y) = self.last.unwrap_or((x, y));
        self.last = Some((x, y));
        (x - last_x, last_y - y)
    }
}

/// Lazily created vertex buffers shared by the lanes of one mode.
#[derive(Debug, Default)]
pub struct GeometryCache {
    quad: Option<BufferId>,
    cube: Option<BufferId>,
}

impl GeometryCache {
    /// The full-screen quad, created on first use.
    pub fn get_or_create_quad(&mut self, device: &dyn ComputeDevice) -> Result<BufferId, ResourceError> {
        Self::get_or_create(&mut self.quad, device, "quad_vertices", &QUAD_VERTICES)
    }

    /// The unit cube triangle list, created on first use.
    pub fn get_or_create_cube(&mut self, device: &dyn ComputeDevice) -> Result<BufferId, ResourceError> {
        Self::get_or_create(&mut self.cube, device, "cube_vertices", &cube_vertices())
    }

    fn get_or_create(
        slot: &mut Option<BufferId>,
        device: &dyn ComputeDevice,
        label: &str,
        vertices: &[MeshVertex],
    ) -> Result<BufferId, ResourceError> {
        if let Some(id) = *slot {
            return Ok(id);
        }
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        let id = device.create_buffer_with_data(
            &BufferDescriptor::new(label, bytes.len() as u64, BufferUsage::STORAGE),
            bytes,
        )?;
        log::debug!("Created {label} ({} vertices)", vertices.len());
        *slot = Some(id);
        Ok(id)
    }

    /// Destroys every cached buffer.
    pub fn release(&mut self, device: &dyn ComputeDevice) {
        for id in [self.quad.take(), self.cube.take()].into_iter().flatten() {
            if let Err(e) = device.destroy_buffer(id) {
                log::warn!("Failed to destroy cached mesh {id:?}: {e}");
            }
        }
    }
}

/// Per-run application state.
#[derive(Debug)]
pub struct AppContext {
    /// The fly camera.
    pub camera: Camera,
    /// Cursor tracking for mouse look.
    pub cursor: CursorState,
    /// Shared meshes.
    pub geometry: GeometryCache,
    /// Output of the shading pass.
    pub debug_view: DebugView,
}

impl AppContext {
    /// Creates the state around `camera`.
    pub fn new(camera: Camera, debug_view: DebugView) -> Self {
        Self {
            camera,
            cursor: CursorState::default(),
            geometry: GeometryCache::default(),
            debug_view,
        }
    }

    /// Mouse look from an absolute cursor position.
    pub fn on_cursor_moved(&mut self, x: f32, y: f32) {
        let (dx, dy) = self.cursor.offset(x, y);
        self.camera.process_mouse_movement(dx, dy, true);
    }

    /// Zoom from a scroll delta.
    pub fn on_scroll(&mut self, delta: f32) {
        self.camera.process_mouse_scroll(delta);
    }

    /// Moves the camera for `delta_time` seconds.
    pub fn on_move(&mut self, direction: CameraMovement, delta_time: f32) {
        self.camera.process_keyboard(direction, delta_time);
    }

    /// Selects a debug view by its `0..=3` index; other indices are ignored.
    pub fn select_debug_view(&mut self, index: u32) {
        match DebugView::from_index(index) {
            Some(view) => self.debug_view = view,
            None => log::warn!("No debug view with index {index}"),
        }
    }

    /// Advances to the next debug view, wrapping around.
    pub fn cycle_debug_view(&mut self) {
        let next = (self.debug_view.index() + 1) % DebugView::ALL.len() as u32;
        self.select_debug_view(next);
    }
}
