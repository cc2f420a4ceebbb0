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

//! Texture-space subsurface scattering lanes.
//!
//! Offline, [`TextureSpaceLane`] lays the subject out in texture space and
//! [`HaarBakeLane`] writes one truncated Haar-compressed diffusion kernel per
//! texel to the coefficient file. At runtime, [`ScatteringLane`] loads the
//! file, convolves the radiance map with every texel's reconstructed kernel
//! and composites the result, and [`SssDisplayLane`] shows it on screen.

mod bake_lane;
mod display_lane;
pub mod haar;
pub mod shaders;
mod scattering_lane;
mod texture_space_lane;

pub use bake_lane::*;
pub use display_lane::*;
pub use scattering_lane::*;
pub use texture_space_lane::*;

use translux_core::renderer::ResourceError;
use translux_io::KernelFileError;

/// Errors raised by the scattering lanes.
#[derive(Debug, thiserror::Error)]
pub enum SssError {
    /// A device operation failed.
    #[error(transparent)]
    Resource(#[from] ResourceError),
    /// Reading or writing the coefficient file failed.
    #[error(transparent)]
    KernelFile(#[from] KernelFileError),
    /// The render world has no object to scatter light through.
    #[error("the render world has no subsurface subject")]
    MissingSubject,
    /// The lane was executed before `on_initialize`.
    #[error("lane resources have not been created")]
    NotInitialized,
}
