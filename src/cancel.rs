//! Forced-termination token
//!
//! Threads cannot be killed from the outside, so forced termination of the
//! emulation thread is delivered through this token instead. Every blocking
//! point owned by the host layer (throttle sleeps, the pause poll, console
//! backpressure, the receive handshake) checks it and unwinds the emulation
//! thread with a private payload once it is triggered. The thread wrapper in
//! [`lifecycle`](crate::host::lifecycle) catches that payload.
//!
//! A core that spins without ever reaching one of these points cannot be
//! terminated; the lifecycle manager reports that as a failed stop.

use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Interval at which bounded waits re-check the token
pub(crate) const CANCEL_POLL: Duration = Duration::from_millis(10);

/// Unwind payload carried by a terminated emulation thread
#[derive(Debug)]
pub(crate) struct Terminated;

/// Returns true if a caught panic payload came from [`CancelToken::check`]
pub(crate) fn is_termination(payload: &(dyn Any + Send)) -> bool {
    payload.is::<Terminated>()
}

/// Shared kill switch for the emulation thread
#[derive(Debug, Default)]
pub(crate) struct CancelToken {
    triggered: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

impl CancelToken {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Trigger termination and wake any sleeper parked on the token
    pub(crate) fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        let _guard = self.lock.lock();
        self.wake.notify_all();
    }

    /// Re-arm the token for the next emulation thread
    pub(crate) fn reset(&self) {
        self.triggered.store(false, Ordering::SeqCst);
    }

    pub(crate) fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Unwind the calling thread if termination was requested
    pub(crate) fn check(&self) {
        if self.is_triggered() {
            std::panic::resume_unwind(Box::new(Terminated));
        }
    }

    /// Sleep until an absolute deadline, unwinding early on termination
    pub(crate) fn sleep_until(&self, deadline: Instant) {
        let mut guard = self.lock.lock();
        loop {
            self.check();
            if Instant::now() >= deadline {
                return;
            }
            self.wake.wait_until(&mut guard, deadline);
        }
    }

    /// Relative-duration variant of [`sleep_until`](Self::sleep_until)
    pub(crate) fn sleep(&self, duration: Duration) {
        self.sleep_until(Instant::now() + duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_untriggered_check_is_noop() {
        let token = CancelToken::new();
        token.check();
        assert!(!token.is_triggered());
    }

    #[test]
    fn test_check_unwinds_with_termination_payload() {
        let token = CancelToken::new();
        token.trigger();
        let result = panic::catch_unwind(AssertUnwindSafe(|| token.check()));
        let payload = result.unwrap_err();
        assert!(is_termination(&*payload));

        token.reset();
        token.check();
    }

    #[test]
    fn test_sleep_until_reaches_deadline() {
        let token = CancelToken::new();
        let start = Instant::now();
        token.sleep(Duration::from_millis(20));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_trigger_wakes_sleeper() {
        let token = Arc::new(CancelToken::new());
        let sleeper = Arc::clone(&token);
        let start = Instant::now();
        let handle = thread::spawn(move || {
            panic::catch_unwind(AssertUnwindSafe(|| {
                sleeper.sleep(Duration::from_secs(30));
            }))
            .is_err()
        });

        thread::sleep(Duration::from_millis(20));
        token.trigger();
        assert!(handle.join().unwrap());
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
