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

//! Defines the RenderAgent, the orchestrator of one render mode.

use super::pipeline::build_lanes;
use crate::context::AppContext;
use crate::mode::RenderMode;
use crate::scene::build_world;
use crate::settings::RenderSettings;
use crate::timings::{FpsCounter, FrameTimings};
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use translux_core::camera::Camera;
use translux_core::lane::{
    BakeProgressSink, BakeResume, ColorTarget, CubeMesh, DebugViewMode, KernelFilePath,
    LaneContext, LaneRegistry, QuadMesh, ScreenExtent,
};
use translux_core::math::Vec3;
use translux_core::renderer::{ComputeDevice, CullingReport, ViewInfo};
use translux_core::Stopwatch;
use translux_lanes::read_back;
use translux_lanes::render_lane::RenderWorld;

/// Owns the lanes of one [`RenderMode`] and drives them.
pub struct RenderAgent {
    settings: RenderSettings,
    device: Arc<dyn ComputeDevice>,
    // Lanes of the mode, in execution order.
    lanes: LaneRegistry,
    // Blackboard shared by the lanes.
    ctx: LaneContext,
    app: AppContext,
    world: Arc<RenderWorld>,
    fps: FpsCounter,
    last_timings: FrameTimings,
    frame_count: u64,
    initialized: bool,
}

impl RenderAgent {
    /// Builds the scene and the lanes of `settings.mode`.
    pub fn new(settings: RenderSettings, device: Arc<dyn ComputeDevice>) -> Result<Self> {
        let lanes = build_lanes(&settings)
            .with_context(|| format!("invalid settings for {} mode", settings.mode))?;
        let world = Arc::new(build_world(&settings));
        let camera = Camera::new(Vec3::from_array(settings.camera_position));
        let app = AppContext::new(camera, settings.debug_view);
        Ok(Self {
            settings,
            device,
            lanes,
            ctx: LaneContext::new(),
            app,
            world,
            fps: FpsCounter::new(Instant::now()),
            last_timings: FrameTimings::default(),
            frame_count: 0,
            initialized: false,
        })
    }

    /// The mode this agent runs.
    pub fn mode(&self) -> RenderMode {
        self.settings.mode
    }

    /// The device the lanes dispatch on.
    pub fn device(&self) -> &Arc<dyn ComputeDevice> {
        &self.device
    }

    /// The scene being rendered.
    pub fn world(&self) -> &RenderWorld {
        &self.world
    }

    /// Camera, cursor and debug view state.
    pub fn app(&self) -> &AppContext {
        &self.app
    }

    /// Mutable access to the application state, for input handling.
    pub fn app_mut(&mut self) -> &mut AppContext {
        &mut self.app
    }

    /// Lanes of the mode, in execution order.
    pub fn lanes(&self) -> &LaneRegistry {
        &self.lanes
    }

    /// Frames rendered so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Pass timings of the last frame.
    pub fn last_timings(&self) -> FrameTimings {
        self.last_timings
    }

    /// Summary of the last light culling pass, in the tiled modes.
    pub fn culling_report(&self) -> Option<CullingReport> {
        self.ctx.get::<CullingReport>().copied()
    }

    /// Replaces the scene. Lights and objects are re-uploaded next frame.
    pub fn set_world(&mut self, world: RenderWorld) {
        self.world = Arc::new(world);
        self.ctx.insert(self.world.clone());
    }

    /// Publishes the frame inputs and initializes every lane in order.
    ///
    /// A lane failing to initialize is fatal; lanes initialized before it
    /// are released by [`shutdown`](Self::shutdown).
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        log::info!(
            "RenderAgent: initializing {} mode on '{}' ({}x{})",
            self.settings.mode,
            self.device.adapter_name(),
            self.settings.width,
            self.settings.height
        );
        self.ctx.insert(self.device.clone());
        self.ctx.insert(self.settings.extent());
        self.ctx.insert(self.world.clone());
        self.publish_frame_inputs();

        if self.settings.mode.is_tiled() {
            let quad = self
                .app
                .geometry
                .get_or_create_quad(self.device.as_ref())
                .context("failed to create the full-screen quad")?;
            let cube = self
                .app
                .geometry
                .get_or_create_cube(self.device.as_ref())
                .context("failed to create the light-box cube")?;
            self.ctx.insert(QuadMesh(quad));
            self.ctx.insert(CubeMesh(cube));
        } else {
            self.ctx
                .insert(KernelFilePath(self.settings.sss.kernel_path.clone()));
        }

        self.initialized = true;
        for lane in self.lanes.all() {
            lane.on_initialize(&mut self.ctx)
                .with_context(|| format!("lane '{}' failed to initialize", lane.strategy_name()))?;
            log::debug!("RenderAgent: lane '{}' ready", lane.strategy_name());
        }
        Ok(())
    }

    fn publish_frame_inputs(&mut self) {
        let ScreenExtent { width, height } = self.settings.extent();
        let view: ViewInfo = self.app.camera.view_info(width, height);
        self.ctx.insert(view);
        self.ctx.insert(DebugViewMode(self.app.debug_view));
    }

    /// Renders one frame through every lane and returns its pass timings.
    pub fn render_frame(&mut self) -> Result<FrameTimings> {
        if !self.initialized {
            bail!("render_frame called before initialize");
        }
        if self.settings.mode == RenderMode::SssBake {
            bail!("the bake mode has no frames to render; use bake()");
        }
        self.publish_frame_inputs();

        let mut timings = FrameTimings::default();
        for lane in self.lanes.all() {
            let watch = Stopwatch::new();
            lane.execute(&mut self.ctx)
                .with_context(|| format!("lane '{}' failed", lane.strategy_name()))?;
            timings.record(lane.lane_kind(), watch.elapsed());
        }

        self.frame_count += 1;
        self.last_timings = timings;
        if let Some(report) = self.fps.tick(Instant::now(), timings) {
            log::info!("{report}");
        }
        if let Some(culling) = self.ctx.get::<CullingReport>() {
            log::trace!(
                "Frame {}: {} light references, busiest tile {}",
                self.frame_count,
                culling.total_references,
                culling.max_lights_in_tile
            );
        }
        Ok(timings)
    }

    /// Runs the offline bake and returns the path of the finished file.
    pub fn bake(&mut self, progress: Option<BakeProgressSink>) -> Result<PathBuf> {
        if self.settings.mode != RenderMode::SssBake {
            bail!("bake() requires the sss-bake mode, not {}", self.settings.mode);
        }
        if !self.initialized {
            bail!("bake called before initialize");
        }
        self.ctx.insert(BakeResume(self.settings.sss.resume_row));
        if let Some(sink) = progress {
            self.ctx.insert(sink);
        }
        let watch = Stopwatch::new();
        for lane in self.lanes.all() {
            lane.execute(&mut self.ctx)
                .with_context(|| format!("lane '{}' failed", lane.strategy_name()))?;
        }
        log::info!(
            "RenderAgent: bake of {} done in {:.2} s",
            self.settings.sss.kernel_path.display(),
            watch.elapsed_secs_f64()
        );
        Ok(self.settings.sss.kernel_path.clone())
    }

    /// Copies the color target back to the host, row 0 at the top.
    pub fn read_color_target(&self) -> Result<Vec<[f32; 4]>> {
        let target = self
            .ctx
            .get::<ColorTarget>()
            .context("this mode has no color target")?;
        read_back(self.device.as_ref(), target.0).context("failed to read the color target")
    }

    /// Shuts every initialized lane down, in reverse order, and releases
    /// the cached meshes.
    pub fn shutdown(&mut self) {
        if !self.initialized {
            return;
        }
        for lane in self.lanes.all().iter().rev() {
            lane.on_shutdown(&mut self.ctx);
        }
        self.app.geometry.release(self.device.as_ref());
        self.ctx.remove::<QuadMesh>();
        self.ctx.remove::<CubeMesh>();
        self.initialized = false;
        log::info!(
            "RenderAgent: {} mode shut down after {} frames",
            self.settings.mode,
            self.frame_count
        );
    }
}

impl Drop for RenderAgent {
    fn drop(&mut self) {
        self.shutdown();
    }
}
