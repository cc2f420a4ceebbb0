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

//! Startup selection of the rendering mode.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four mutually exclusive ways the program can run.
///
/// A mode is chosen once at startup; every mode owns its lanes and buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderMode {
    /// G-buffer pass, tiled light culling, deferred shading over a full-screen quad.
    Deferred,
    /// Depth pre-pass, tiled light culling, forward shading with a depth-equal test.
    #[default]
    Forward,
    /// Offline bake of the Haar-compressed scattering kernels.
    SssBake,
    /// Per-frame reconstruction of texture-space subsurface scattering.
    SssRuntime,
}

impl RenderMode {
    /// Scans command-line arguments for `-deferred` / `-forward`.
    ///
    /// The last recognized flag wins. Anything else is ignored. Returns
    /// `None` when no flag was given.
    pub fn from_args<I, S>(args: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut mode = None;
        for arg in args {
            match arg.as_ref() {
                "-deferred" => mode = Some(RenderMode::Deferred),
                "-forward" => mode = Some(RenderMode::Forward),
                // Backend flags, see `ComputeBackend::from_args`.
                "-gpu" | "-cpu" => {}
                other => log::debug!("Ignoring unrecognized argument '{other}'"),
            }
        }
        mode
    }

    /// `true` for the two tiled-lighting modes.
    pub fn is_tiled(&self) -> bool {
        matches!(self, RenderMode::Deferred | RenderMode::Forward)
    }

    /// `true` for the two subsurface-scattering modes.
    pub fn is_sss(&self) -> bool {
        !self.is_tiled()
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RenderMode::Deferred => "deferred",
            RenderMode::Forward => "forward",
            RenderMode::SssBake => "sss-bake",
            RenderMode::SssRuntime => "sss-runtime",
        })
    }
}
