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

//! Per-pass frame timings and the once-per-second frame counter.

use std::fmt;
use std::time::{Duration, Instant};
use translux_core::lane::LaneKind;

/// Wall-clock time spent in each pass of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameTimings {
    /// Geometry or depth pre-pass.
    pub geometry: Duration,
    /// Light culling.
    pub culling: Duration,
    /// Tiled shading or scattered display.
    pub shading: Duration,
    /// Light-box overlay.
    pub overlay: Duration,
    /// Texture-space, bake and reconstruction passes.
    pub scattering: Duration,
}

impl FrameTimings {
    /// Adds `elapsed` to the bucket of a lane of kind `kind`.
    pub fn record(&mut self, kind: LaneKind, elapsed: Duration) {
        let slot = match kind {
            LaneKind::Geometry => &mut self.geometry,
            LaneKind::Culling => &mut self.culling,
            LaneKind::Shading => &mut self.shading,
            LaneKind::Overlay => &mut self.overlay,
            LaneKind::Bake | LaneKind::Scattering => &mut self.scattering,
        };
        *slot += elapsed;
    }

    /// Sum of every pass.
    pub fn total(&self) -> Duration {
        self.geometry + self.culling + self.shading + self.overlay + self.scattering
    }
}

/// Frames counted over the last second, with the pass times of the last frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsReport {
    /// Frames rendered during the window.
    pub frames: u32,
    /// Length of the window.
    pub window: Duration,
    /// Timings of the most recent frame.
    pub last: FrameTimings,
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

impl fmt::Display for FpsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames | geometry {:.3}ms culling {:.3}ms shading {:.3}ms",
            self.frames,
            ms(self.last.geometry),
            ms(self.last.culling),
            ms(self.last.shading + self.last.scattering),
        )
    }
}

/// Counts frames and emits a report once at least a second has passed.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    window_start: Instant,
    frames: u32,
}

impl FpsCounter {
    /// Length of a reporting window.
    pub const WINDOW: Duration = Duration::from_secs(1);

    /// Starts counting at `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
        }
    }

    /// Registers a frame finished at `now`.
    pub fn tick(&mut self, now: Instant, last: FrameTimings) -> Option<FpsReport> {
        self.frames += 1;
        let window = now.saturating_duration_since(self.window_start);
        if window < Self::WINDOW {
            return None;
        }
        let report = FpsReport {
            frames: self.frames,
            window,
            last,
        };
        self.frames = 0;
        self.window_start = now;
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_buckets() {
        let mut t = FrameTimings::default();
        t.record(LaneKind::Geometry, Duration::from_millis(2));
        t.record(LaneKind::Bake, Duration::from_millis(3));
        t.record(LaneKind::Scattering, Duration::from_millis(4));
        t.record(LaneKind::Overlay, Duration::from_millis(1));
        assert_eq!(t.geometry, Duration::from_millis(2));
        assert_eq!(t.scattering, Duration::from_millis(7));
        assert_eq!(t.total(), Duration::from_millis(10));
    }

    #[test]
    fn test_counter_reports_once_per_window() {
        let start = Instant::now();
        let mut counter = FpsCounter::new(start);
        let frame = FrameTimings::default();
        for i in 1..=9 {
            assert!(counter.tick(start + Duration::from_millis(100 * i), frame).is_none());
        }
        let report = counter.tick(start + Duration::from_millis(1000), frame).unwrap();
        assert_eq!(report.frames, 10);
        assert!(counter.tick(start + Duration::from_millis(1500), frame).is_none());
        let report = counter.tick(start + Duration::from_millis(2100), frame).unwrap();
        assert_eq!(report.frames, 2);
    }
}
