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

//! Compute passes ("lanes") for the two rendering pipelines.
//!
//! - [`render_lane`]: geometry, tile light culling, tiled shading and the
//!   light-box overlay.
//! - [`sss_lane`]: texture-space maps, the Haar kernel bake and the runtime
//!   scattering reconstruction.

pub mod render_lane;
pub mod sss_lane;

mod device_util;

pub use device_util::read_back;
