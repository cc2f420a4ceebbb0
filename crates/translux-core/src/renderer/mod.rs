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

//! Provides the public, backend-agnostic compute contracts for Translux.
//!
//! This module defines the "common language" shared by every pass. It
//! contains the abstract [`ComputeDevice`] trait, resource descriptors (like
//! [`BufferDescriptor`]), the GPU data layouts of lights, tiles and kernel
//! coefficients, and the error types of the rendering API.
//!
//! This module defines the 'what' of rendering, while the 'how' is handled by
//! a concrete backend in the `translux-infra` crate which implements these
//! traits. The `translux-lanes` and `translux-agents` crates use them without
//! knowing the specifics of the underlying device.

pub mod api;
pub mod error;
pub mod kernel;
pub mod light;
pub mod scene;
pub mod tiled;
pub mod traits;
pub mod view;

// Re-export the most important traits and types for easier use.
pub use self::api::*;
pub use self::error::{KernelError, RenderError, ResourceError};
pub use self::kernel::{
    evaluate_lobes, BakeProgress, DiffusionProfile, GaussianLobe, HaarBakeUniforms,
    KernelCoefficient, KernelDimensionError, KernelDimensions, ScatteringUniforms,
    MAX_COEFFICIENT_EDGE, MAX_PROFILE_GAUSSIANS,
};
pub use self::light::PointLight;
pub use self::scene::{cube_vertices, MeshVertex, SceneSphere, CUBE_VERTEX_COUNT, QUAD_VERTICES};
pub use self::tiled::{
    CullingReport, LightCullingUniforms, TileBounds, TileLightGrid, TileStats,
    TiledCullingConfig,
};
pub use self::traits::ComputeDevice;
pub use self::view::{DebugView, ViewInfo};
