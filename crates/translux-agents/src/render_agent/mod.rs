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

//! Acts as the **[A]gent** for rendering.
//!
//! The agent decides *which* lanes run and in what order for the selected
//! [`RenderMode`](crate::RenderMode), publishes the per-frame inputs (view,
//! scene, debug view, shared meshes) into the lane context, and collects the
//! pass timings. The work itself is delegated to the lanes.

mod agent;
mod pipeline;

pub use agent::*;
pub use pipeline::build_lanes;
