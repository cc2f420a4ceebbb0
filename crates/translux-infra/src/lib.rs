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

//! # Translux Infra
//!
//! Concrete backends for the contracts defined in `translux-core`.
//!
//! Two implementations of
//! [`ComputeDevice`](translux_core::renderer::ComputeDevice) live here:
//!
//! - [`WgpuComputeDevice`] compiles each kernel's WGSL program and runs it
//!   on a GPU adapter.
//! - [`CpuComputeDevice`] runs the kernels' host implementation, spreading
//!   workgroups over a rayon pool. It is the reference the GPU path is
//!   checked against and the device the test suites use.
//!
//! Both enforce buffer usages, mapping rules and memory barriers the same
//! way, and both measure work with wall-clock timer queries.

#![warn(missing_docs)]

pub mod compute;

pub use compute::cpu::CpuComputeDevice;
pub use compute::wgpu::WgpuComputeDevice;
