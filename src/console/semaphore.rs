//! Counting semaphore used for the console's free and filled byte counts

use crate::cancel::{CancelToken, CANCEL_POLL};
use parking_lot::{Condvar, Mutex};
use std::time::Instant;

/// Counting semaphore built on a parking_lot mutex and condition variable
#[derive(Debug)]
pub(crate) struct Semaphore {
    count: Mutex<usize>,
    cond: Condvar,
}

impl Semaphore {
    pub(crate) fn new(initial: usize) -> Self {
        Semaphore {
            count: Mutex::new(initial),
            cond: Condvar::new(),
        }
    }

    /// Number of permits currently available
    pub(crate) fn available(&self) -> usize {
        *self.count.lock()
    }

    /// Take `n` permits, blocking until they exist.
    ///
    /// The wait re-checks `cancel` so a terminated producer never stays
    /// parked here. Nothing is taken if the thread unwinds.
    pub(crate) fn acquire(&self, n: usize, cancel: &CancelToken) {
        let mut count = self.count.lock();
        while *count < n {
            cancel.check();
            self.cond.wait_for(&mut count, CANCEL_POLL);
        }
        *count -= n;
    }

    /// Take every available permit once at least `min` exist
    pub(crate) fn acquire_all(&self, min: usize) -> usize {
        let mut count = self.count.lock();
        while *count < min {
            self.cond.wait(&mut count);
        }
        std::mem::take(&mut *count)
    }

    /// Take every available permit once at least `min` exist, giving up at `deadline`
    pub(crate) fn acquire_all_until(&self, min: usize, deadline: Instant) -> usize {
        let mut count = self.count.lock();
        while *count < min {
            if self.cond.wait_until(&mut count, deadline).timed_out() && *count < min {
                return 0;
            }
        }
        std::mem::take(&mut *count)
    }

    /// Take every available permit without blocking
    pub(crate) fn try_acquire_all(&self) -> usize {
        std::mem::take(&mut *self.count.lock())
    }

    /// Return `n` permits and wake waiters
    pub(crate) fn release(&self, n: usize) {
        let mut count = self.count.lock();
        *count += n;
        self.cond.notify_all();
    }
}
