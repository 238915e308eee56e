// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Knobs for the renderer.  Once a coordinator is built with a
//! configuration, the configuration does not change.

use std::ops::RangeInclusive;
use std::time::Duration;

use crate::errors::RenderError;

/// Edge length of a tile, in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 64;
/// Fewest iterations the detail setting allows.
pub const MIN_ITERATIONS: u32 = 50;
/// Most iterations the detail setting allows.
pub const MAX_ITERATIONS: u32 = 500;
/// Quiet time after the last view change before a pass starts.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Renderer configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderConfig {
    /// Edge length of a full tile.
    pub tile_size: u32,
    /// The bounds the iteration count is clamped to.
    pub iterations: RangeInclusive<u32>,
    /// How long the view must be still before a pass starts.
    pub debounce: Duration,
    /// Number of worker threads.
    pub workers: usize,
    /// Most jobs handed to the workers and not yet returned.
    pub in_flight: usize,
    /// Blur radius for the transition between passes; zero disables it.
    pub blur_radius: u32,
    /// Give a failed tile a second chance before leaving it blank.
    pub retry_failed: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            tile_size: DEFAULT_TILE_SIZE,
            iterations: MIN_ITERATIONS..=MAX_ITERATIONS,
            debounce: DEFAULT_DEBOUNCE,
            workers: 1,
            in_flight: 2,
            blur_radius: 4,
            retry_failed: true,
        }
    }
}

impl RenderConfig {
    /// A default configuration with `workers` threads, keeping two
    /// jobs queued per thread.
    pub fn with_workers(workers: usize) -> Self {
        RenderConfig {
            workers,
            in_flight: workers * 2,
            ..RenderConfig::default()
        }
    }

    /// Check the configuration for values the renderer cannot work
    /// with.
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.tile_size == 0 {
            return Err(RenderError::InvalidConfig(
                "tile size must be at least one pixel".to_string(),
            ));
        }
        if *self.iterations.start() == 0 || self.iterations.start() > self.iterations.end() {
            return Err(RenderError::InvalidConfig(format!(
                "iteration range {}..={} is empty or starts at zero",
                self.iterations.start(),
                self.iterations.end()
            )));
        }
        if self.workers == 0 {
            return Err(RenderError::InvalidConfig(
                "at least one worker thread is required".to_string(),
            ));
        }
        if self.in_flight == 0 {
            return Err(RenderError::InvalidConfig(
                "at least one job must be allowed in flight".to_string(),
            ));
        }
        Ok(())
    }

    /// Clamp an iteration count to the configured range.
    pub fn clamp_iterations(&self, iterations: u32) -> u32 {
        iterations
            .max(*self.iterations.start())
            .min(*self.iterations.end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RenderConfig::default().validate().is_ok());
        assert!(RenderConfig::with_workers(4).validate().is_ok());
    }

    #[test]
    fn zero_tile_size_is_rejected() {
        let config = RenderConfig {
            tile_size: 0,
            ..RenderConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_iteration_range_is_rejected() {
        let config = RenderConfig {
            iterations: 300..=100,
            ..RenderConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_workers_are_rejected() {
        assert!(RenderConfig::with_workers(0).validate().is_err());
    }

    #[test]
    fn iterations_are_clamped() {
        let config = RenderConfig::default();
        assert_eq!(config.clamp_iterations(10), 50);
        assert_eq!(config.clamp_iterations(100), 100);
        assert_eq!(config.clamp_iterations(10_000), 500);
    }
}
