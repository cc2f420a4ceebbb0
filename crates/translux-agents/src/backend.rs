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

//! Startup selection of the compute backend.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which device runs the kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComputeBackend {
    /// The GPU if an adapter opens, otherwise the host device.
    #[default]
    Auto,
    /// The GPU only; startup fails without an adapter.
    Gpu,
    /// The host device, running every workgroup on the CPU.
    Cpu,
}

impl ComputeBackend {
    /// Scans command-line arguments for `-gpu` / `-cpu`.
    ///
    /// The last recognized flag wins. Returns `None` when no flag was given.
    pub fn from_args<I, S>(args: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        args.into_iter().fold(None, |backend, arg| match arg.as_ref() {
            "-gpu" => Some(ComputeBackend::Gpu),
            "-cpu" => Some(ComputeBackend::Cpu),
            _ => backend,
        })
    }

    /// `true` when the host device may be used in place of a missing GPU.
    pub fn allows_fallback(&self) -> bool {
        *self == ComputeBackend::Auto
    }
}

impl fmt::Display for ComputeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ComputeBackend::Auto => "auto",
            ComputeBackend::Gpu => "gpu",
            ComputeBackend::Cpu => "cpu",
        })
    }
}
