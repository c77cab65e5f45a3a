//! Real-time pacing of the emulation loop
//!
//! The emulation thread calls [`Throttle::wait_for_next_quantum`] once per
//! quantum of emulated work (one 60 Hz frame by default). The throttle sleeps
//! to an absolute deadline when it is ahead of schedule, and otherwise reports
//! the speed actually achieved.

pub mod controller;

pub use controller::Throttle;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default quantum: one 60 Hz frame, in microseconds
pub const DEFAULT_QUANTUM_US: u64 = 16_667;

/// Default poll interval while paused (speed 0), in milliseconds
pub const DEFAULT_PAUSE_POLL_MS: u64 = 10;

/// Speed percentage meaning real time
pub const REAL_TIME_SPEED: u32 = 100;

/// Throttle configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Real-time length of one quantum at 100% speed, in microseconds
    pub quantum_us: u64,
    /// Poll interval while paused, in milliseconds
    pub pause_poll_ms: u64,
    /// Speed percentage at start-up
    pub initial_speed: u32,
    /// Whether pacing is enabled at start-up
    pub throttle_enabled: bool,
}

impl ThrottleConfig {
    /// Quantum as a duration
    pub fn quantum(&self) -> Duration {
        Duration::from_micros(self.quantum_us)
    }

    /// Pause poll interval as a duration
    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms)
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        ThrottleConfig {
            quantum_us: DEFAULT_QUANTUM_US,
            pause_poll_ms: DEFAULT_PAUSE_POLL_MS,
            initial_speed: REAL_TIME_SPEED,
            throttle_enabled: true,
        }
    }
}

/// Real-time length of one quantum at `speed` percent
///
/// A speed of 0 is treated as 1%.
pub fn quantum_interval(quantum: Duration, speed: u32) -> Duration {
    let nanos = quantum.as_nanos() * u128::from(REAL_TIME_SPEED) / u128::from(speed.max(1));
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// Speed percentage achieved when one quantum took `elapsed` real time
///
/// `elapsed` must be non-zero.
pub fn achieved_speed(quantum: Duration, elapsed: Duration) -> u32 {
    let percent = quantum.as_nanos() * u128::from(REAL_TIME_SPEED) / elapsed.as_nanos();
    u32::try_from(percent).unwrap_or(u32::MAX)
}
