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

//! # Translux Agents
//!
//! The orchestration layer. A [`RenderAgent`] owns the lanes of one
//! [`RenderMode`], the shared [`LaneContext`](translux_core::lane::LaneContext)
//! they communicate through, and the application state (camera, cursor,
//! cached meshes) that drives them frame after frame.

pub mod backend;
pub mod context;
pub mod mode;
pub mod render_agent;
pub mod scene;
pub mod settings;
pub mod timings;

pub use backend::ComputeBackend;
pub use context::{AppContext, CursorState, GeometryCache};
pub use mode::RenderMode;
pub use render_agent::RenderAgent;
pub use settings::{RenderSettings, SssSettings};
pub use timings::{FpsCounter, FpsReport, FrameTimings};
