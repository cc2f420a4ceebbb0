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

//! `translux`: renders the tiled-lighting scene, or bakes and displays the
//! Haar-compressed scattering kernels.
//!
//! Settings come from `translux.toml` (or `$TRANSLUX_CONFIG`); `-deferred`
//! and `-forward` on the command line override the configured mode, `-gpu`
//! and `-cpu` the compute backend.

mod config;
mod device;

use anyhow::{Context, Result};
use std::process::ExitCode;
use std::time::Duration;
use translux_agents::{ComputeBackend, RenderAgent, RenderMode, RenderSettings};
use translux_core::lane::BakeProgressSink;
use translux_core::renderer::BakeProgress;

fn main() -> ExitCode {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let mut settings = config::load_settings_from(&config::config_path())?;
    if let Some(mode) = RenderMode::from_args(std::env::args().skip(1)) {
        settings.mode = mode;
    }
    if let Some(backend) = ComputeBackend::from_args(std::env::args().skip(1)) {
        settings.backend = backend;
    }

    let device = device::open_device(settings.backend)?;
    let mut agent = RenderAgent::new(settings.clone(), device)?;
    let result = drive(&mut agent, &settings);
    agent.shutdown();
    result
}

fn drive(agent: &mut RenderAgent, settings: &RenderSettings) -> Result<()> {
    agent.initialize()?;

    if settings.mode == RenderMode::SssBake {
        let resumed = settings.sss.resume_row;
        let sink = BakeProgressSink::new(move |p| {
            if let Some(percent) = milestone(p) {
                log::info!(
                    "Bake {percent}% complete, about {:.0} s left",
                    remaining(p, resumed).as_secs_f64()
                );
            }
        });
        let path = agent.bake(Some(sink))?;
        log::info!("Kernel coefficients written to {}", path.display());
        return Ok(());
    }

    for _ in 0..settings.frames.max(1) {
        let timings = agent.render_frame()?;
        log::debug!(
            "Frame {}: {:.2} ms total",
            agent.frame_count(),
            timings.total().as_secs_f64() * 1000.0
        );
    }
    if let Some(report) = agent.culling_report() {
        log::info!(
            "{}x{} tiles, {} light references, busiest tile holds {}",
            report.tiles_x,
            report.tiles_y,
            report.total_references,
            report.max_lights_in_tile
        );
        if report.has_overflow() {
            log::warn!(
                "{} tiles overflowed, {} lights dropped",
                report.overflowed_tiles,
                report.dropped_lights
            );
        }
    }

    if let Some(output) = &settings.output {
        let pixels = agent.read_color_target()?;
        translux_io::save_rgba_png(output, settings.width, settings.height, &pixels)
            .with_context(|| format!("failed to save {}", output.display()))?;
    }
    Ok(())
}

/// The tens-of-percent mark `p` crossed, if any.
fn milestone(p: &BakeProgress) -> Option<u32> {
    if p.total_rows == 0 || p.rows_completed == 0 {
        return None;
    }
    let tenth = |rows: u32| rows * 10 / p.total_rows;
    let now = tenth(p.rows_completed);
    (now != tenth(p.rows_completed - 1)).then_some(now * 10)
}

/// Time left at the average row time of this invocation.
fn remaining(p: &BakeProgress, resumed: u32) -> Duration {
    let baked = p.rows_completed.saturating_sub(resumed).max(1);
    let left = p.total_rows.saturating_sub(p.rows_completed);
    p.elapsed / baked * left
}
