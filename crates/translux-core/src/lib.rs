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

//! # Translux Core
//!
//! Foundational crate containing the math primitives, lane contracts, compute
//! device traits and GPU data layouts shared by the tiled light culling engine
//! and the Haar kernel compression pipeline.

#![warn(missing_docs)]

pub mod camera;
pub mod lane;
pub mod math;
pub mod renderer;
pub mod utils;

pub use camera::{Camera, CameraMovement};
pub use utils::timer::Stopwatch;
