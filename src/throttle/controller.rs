//! Throttle controller
//!
//! `speed`, the enable flag and the reporting flag are plain atomics any
//! thread may write. `last_deadline` belongs to the emulation thread; the
//! mutex around it only exists so the controller can be shared.

use super::{achieved_speed, quantum_interval, ThrottleConfig, REAL_TIME_SPEED};
use crate::cancel::CancelToken;
use crate::events::{HostEvent, HostEvents, NullEvents};
use crate::{EmuHostError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Paces the emulation loop to a speed percentage
pub struct Throttle {
    quantum: Duration,
    pause_poll: Duration,
    /// Requested speed percent (0 = paused)
    speed: AtomicU32,
    enabled: AtomicBool,
    /// Cleared while the emulated device is powered off
    reporting: AtomicBool,
    /// Last reported achieved speed
    actual_speed: AtomicU32,
    /// End of the most recently completed or skipped quantum
    last_deadline: Mutex<Instant>,
    events: Arc<dyn HostEvents>,
    cancel: Arc<CancelToken>,
}

impl Throttle {
    /// Create a throttle that emits no notifications
    ///
    /// # Errors
    ///
    /// Returns an error if the quantum is zero.
    pub fn new(config: ThrottleConfig) -> Result<Self> {
        Self::with_events(config, Arc::new(NullEvents))
    }

    /// Create a throttle that emits [`HostEvent::ActualSpeedChanged`]
    ///
    /// # Errors
    ///
    /// Returns an error if the quantum is zero.
    pub fn with_events(config: ThrottleConfig, events: Arc<dyn HostEvents>) -> Result<Self> {
        Self::with_parts(config, events, Arc::new(CancelToken::new()))
    }

    pub(crate) fn with_parts(
        config: ThrottleConfig,
        events: Arc<dyn HostEvents>,
        cancel: Arc<CancelToken>,
    ) -> Result<Self> {
        if config.quantum_us == 0 {
            return Err(EmuHostError::config("throttle quantum must be greater than 0"));
        }

        Ok(Throttle {
            quantum: config.quantum(),
            pause_poll: config.pause_poll(),
            speed: AtomicU32::new(config.initial_speed),
            enabled: AtomicBool::new(config.throttle_enabled),
            reporting: AtomicBool::new(true),
            actual_speed: AtomicU32::new(REAL_TIME_SPEED),
            last_deadline: Mutex::new(Instant::now()),
            events,
            cancel,
        })
    }

    /// Set the requested speed percent (0 pauses the loop)
    pub fn set_speed(&self, speed: u32) {
        self.speed.store(speed, Ordering::Release);
    }

    /// Requested speed percent
    pub fn speed(&self) -> u32 {
        self.speed.load(Ordering::Acquire)
    }

    /// Enable or disable pacing
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Whether pacing is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Last reported achieved speed percent
    pub fn actual_speed(&self) -> u32 {
        self.actual_speed.load(Ordering::Acquire)
    }

    /// Drop speed reports while `false` (the emulated device is off)
    pub fn set_reporting(&self, enabled: bool) {
        self.reporting.store(enabled, Ordering::Release);
    }

    /// Length of one quantum at 100% speed
    pub fn quantum(&self) -> Duration {
        self.quantum
    }

    /// Wait out the rest of the current quantum
    ///
    /// Called once per quantum from the emulation thread. Sleeps to an
    /// absolute deadline when pacing is on and the loop is ahead; otherwise
    /// reports the achieved speed and returns after a yield. With speed 0
    /// this blocks until the speed becomes non-zero. Always a forced
    /// termination point, even when pacing is off.
    pub fn wait_for_next_quantum(&self) {
        self.cancel.check();
        let speed = self.speed();
        if speed == 0 {
            self.report(0);
            while self.speed() == 0 {
                self.cancel.sleep(self.pause_poll);
            }
            return;
        }

        let now = Instant::now();
        let mut last = self.last_deadline.lock();
        let deadline = *last + quantum_interval(self.quantum, speed);

        if self.is_enabled() && now < deadline {
            self.report(speed);
            *last = deadline;
            drop(last);
            self.cancel.sleep_until(deadline);
        } else {
            let elapsed = now.saturating_duration_since(*last);
            if !elapsed.is_zero() {
                self.report(achieved_speed(self.quantum, elapsed));
                *last = now;
            }
            drop(last);
            std::thread::yield_now();
        }
    }

    /// Restart the schedule from now
    pub(crate) fn restart_clock(&self) {
        *self.last_deadline.lock() = Instant::now();
    }

    /// Push the schedule back by time spent outside emulation
    pub(crate) fn compensate(&self, stalled: Duration) {
        *self.last_deadline.lock() += stalled;
    }

    fn report(&self, value: u32) {
        if !self.reporting.load(Ordering::Acquire) {
            return;
        }
        if self.actual_speed.swap(value, Ordering::AcqRel) != value {
            tracing::trace!(actual_speed = value, "actual speed changed");
            self.events.emit(HostEvent::ActualSpeedChanged(value));
        }
    }
}

impl std::fmt::Debug for Throttle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttle")
            .field("quantum", &self.quantum)
            .field("speed", &self.speed())
            .field("enabled", &self.is_enabled())
            .field("actual_speed", &self.actual_speed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventLog;
    use approx::assert_abs_diff_eq;
    use std::thread;

    fn config(quantum_us: u64) -> ThrottleConfig {
        ThrottleConfig {
            quantum_us,
            pause_poll_ms: 2,
            ..ThrottleConfig::default()
        }
    }

    fn throttle_with_log(quantum_us: u64) -> (Arc<Throttle>, Arc<EventLog>) {
        let log = Arc::new(EventLog::new());
        let throttle = Throttle::with_events(config(quantum_us), log.clone()).unwrap();
        (Arc::new(throttle), log)
    }

    #[test]
    fn test_zero_quantum_error() {
        assert!(Throttle::new(config(0)).is_err());
    }

    #[test]
    fn test_real_time_pacing() {
        let (throttle, _log) = throttle_with_log(5_000);
        let start = Instant::now();
        for _ in 0..20 {
            throttle.wait_for_next_quantum();
        }
        let per_call_ms = start.elapsed().as_secs_f64() * 1000.0 / 20.0;

        assert!(start.elapsed() >= Duration::from_millis(95));
        assert_abs_diff_eq!(per_call_ms, 5.0, epsilon = 3.0);
    }

    #[test]
    fn test_double_speed_halves_interval() {
        let (throttle, _log) = throttle_with_log(10_000);
        throttle.set_speed(200);
        let start = Instant::now();
        for _ in 0..10 {
            throttle.wait_for_next_quantum();
        }
        let per_call_ms = start.elapsed().as_secs_f64() * 1000.0 / 10.0;
        assert_abs_diff_eq!(per_call_ms, 5.0, epsilon = 2.5);
    }

    #[test]
    fn test_disabled_throttle_reports_achieved_speed() {
        let (throttle, log) = throttle_with_log(1_000_000);
        throttle.set_enabled(false);
        thread::sleep(Duration::from_millis(20));

        let start = Instant::now();
        throttle.wait_for_next_quantum();
        throttle.wait_for_next_quantum();
        assert!(start.elapsed() < Duration::from_millis(500));

        let actual = throttle.actual_speed();
        assert!(actual > 100, "actual speed {actual}");
        assert!(log
            .snapshot()
            .iter()
            .any(|e| matches!(e, HostEvent::ActualSpeedChanged(v) if *v > 100)));
    }

    #[test]
    fn test_paused_blocks_until_speed_set() {
        let (throttle, log) = throttle_with_log(10_000);
        throttle.set_speed(0);

        let waiter = Arc::clone(&throttle);
        let handle = thread::spawn(move || waiter.wait_for_next_quantum());

        thread::sleep(Duration::from_millis(30));
        assert!(!handle.is_finished());
        assert_eq!(throttle.actual_speed(), 0);

        throttle.set_speed(100);
        handle.join().unwrap();
        assert_eq!(log.count(&HostEvent::ActualSpeedChanged(0)), 1);

        // Running again: the stale deadline is far behind, so a low speed is reported
        throttle.wait_for_next_quantum();
        assert_ne!(throttle.actual_speed(), 0);

        throttle.set_speed(0);
        let waiter = Arc::clone(&throttle);
        let handle = thread::spawn(move || waiter.wait_for_next_quantum());
        thread::sleep(Duration::from_millis(10));
        throttle.set_speed(100);
        handle.join().unwrap();

        assert_eq!(log.count(&HostEvent::ActualSpeedChanged(0)), 2);
    }

    #[test]
    fn test_reporting_suppressed_while_powered_off() {
        let (throttle, log) = throttle_with_log(1_000_000);
        throttle.set_enabled(false);
        throttle.set_reporting(false);
        thread::sleep(Duration::from_millis(5));
        throttle.wait_for_next_quantum();

        assert!(log.snapshot().is_empty());
        assert_eq!(throttle.actual_speed(), 100);
    }

    #[test]
    fn test_speed_toggled_during_wait_never_panics() {
        let (throttle, _log) = throttle_with_log(1_000);
        throttle.set_enabled(false);

        let toggler = Arc::clone(&throttle);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                toggler.set_speed(0);
                thread::yield_now();
                toggler.set_speed(100);
                thread::yield_now();
            }
        });

        let start = Instant::now();
        while start.elapsed() < Duration::from_millis(200) {
            throttle.wait_for_next_quantum();
        }
        stop.store(true, Ordering::Relaxed);
        handle.join().unwrap();
        throttle.set_speed(100);
        throttle.wait_for_next_quantum();
    }

    #[test]
    fn test_compensate_moves_deadline() {
        let (throttle, _log) = throttle_with_log(10_000);
        let before = *throttle.last_deadline.lock();
        throttle.compensate(Duration::from_millis(40));
        assert_eq!(*throttle.last_deadline.lock(), before + Duration::from_millis(40));
    }
}
