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

//! Wall-clock stopwatch used for per-pass CPU timings and bake progress.

use std::time::{Duration, Instant};

/// A monotonic stopwatch that starts running on creation.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start_time: Instant,
}

impl Stopwatch {
    /// Creates a stopwatch started now.
    #[inline]
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    /// Time elapsed since the stopwatch was started or last restarted.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Elapsed time in fractional milliseconds.
    #[inline]
    pub fn elapsed_ms_f64(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }

    /// Elapsed time in fractional seconds.
    #[inline]
    pub fn elapsed_secs_f64(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }

    /// Returns the elapsed time and restarts the stopwatch (a "lap").
    #[inline]
    pub fn lap(&mut self) -> Duration {
        let now = Instant::now();
        let lap = now.duration_since(self.start_time);
        self.start_time = now;
        lap
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const SLEEP_MS: u64 = 20;

    #[test]
    fn test_stopwatch_measures_sleep() {
        let watch = Stopwatch::new();
        thread::sleep(Duration::from_millis(SLEEP_MS));
        assert!(watch.elapsed() >= Duration::from_millis(SLEEP_MS));
        assert!(watch.elapsed_ms_f64() >= SLEEP_MS as f64);
        assert!(watch.elapsed_secs_f64() > 0.0);
    }

    #[test]
    fn test_lap_restarts_the_clock() {
        let mut watch = Stopwatch::new();
        thread::sleep(Duration::from_millis(SLEEP_MS));
        let first = watch.lap();
        assert!(first >= Duration::from_millis(SLEEP_MS));
        // Right after a lap the clock is close to zero again.
        assert!(watch.elapsed() < first);
    }
}
