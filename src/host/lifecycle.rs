//! Emulation thread lifecycle
//!
//! ```text
//! Idle -> Running -> StopRequested -> Stopped     (loop exited on its own)
//!                                  -> Terminated  (forced termination)
//!                                  -> Indeterminate (could not be stopped)
//! ```
//!
//! `Stopped` and `Terminated` are idle states: the thread has been joined and
//! [`EmuThread::start`] may run the core again. `Indeterminate` keeps the old
//! thread's handle until it is observed to exit.

use super::context::EmuContext;
use super::emulator::{EmulatorCore, LoadRequest, LoadStatus};
use super::EmuHost;
use crate::cancel;
use crate::config::HostConfig;
use crate::events::{HostEvent, HostEvents};
use crate::{EmuHostError, Result};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Lifecycle state of the emulation thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Never started
    Idle,
    /// The emulation loop is running
    Running,
    /// A stop was requested and has not been observed yet
    StopRequested,
    /// The loop exited and the thread was joined
    Stopped,
    /// The thread was torn down by forced termination
    Terminated,
    /// Forced termination failed; the thread may still be running
    Indeterminate,
}

impl ThreadState {
    /// Whether [`EmuThread::start`] may be called
    pub fn is_idle(self) -> bool {
        matches!(
            self,
            ThreadState::Idle | ThreadState::Stopped | ThreadState::Terminated
        )
    }
}

/// Running flag with a bounded wait for it to clear
#[derive(Debug, Default)]
struct ExitSignal {
    running: Mutex<bool>,
    cond: Condvar,
}

impl ExitSignal {
    fn set_running(&self) {
        *self.running.lock() = true;
    }

    fn is_running(&self) -> bool {
        *self.running.lock()
    }

    fn mark_exited(&self) {
        *self.running.lock() = false;
        self.cond.notify_all();
    }

    /// Wait up to `timeout` for the thread to exit; true if it did
    fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut running = self.running.lock();
        while *running {
            if self.cond.wait_until(&mut running, deadline).timed_out() {
                return !*running;
            }
        }
        true
    }
}

/// Marks the thread exited when dropped, including during unwinding
struct ExitGuard(Arc<ExitSignal>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.0.mark_exited();
    }
}

/// Owner of the emulation thread and its core
pub struct EmuThread<C: EmulatorCore> {
    host: EmuHost,
    core: Arc<Mutex<C>>,
    exit: Arc<ExitSignal>,
    handle: Option<JoinHandle<()>>,
    state: ThreadState,
    stop_timeout: Duration,
    terminate_timeout: Duration,
}

impl<C: EmulatorCore> EmuThread<C> {
    /// Wrap `core` with a freshly built host
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(core: C, config: &HostConfig, events: Arc<dyn HostEvents>) -> Result<Self> {
        let host = EmuHost::new(config, events)?;
        Ok(EmuThread {
            host,
            core: Arc::new(Mutex::new(core)),
            exit: Arc::new(ExitSignal::default()),
            handle: None,
            state: ThreadState::Idle,
            stop_timeout: config.stop_timeout(),
            terminate_timeout: config.terminate_timeout(),
        })
    }

    /// Handle shared with the UI
    pub fn host(&self) -> &EmuHost {
        &self.host
    }

    /// Current lifecycle state
    pub fn state(&self) -> ThreadState {
        match self.state {
            ThreadState::Running | ThreadState::StopRequested if !self.exit.is_running() => {
                ThreadState::Stopped
            }
            state => state,
        }
    }

    /// Whether the emulation thread is alive
    pub fn is_running(&self) -> bool {
        self.exit.is_running()
    }

    /// Access the core while the emulation thread is not holding it
    pub fn try_core(&self) -> Option<MutexGuard<'_, C>> {
        self.core.try_lock()
    }

    /// Start the emulation thread
    ///
    /// # Errors
    ///
    /// Fails if the thread is already running, if an earlier forced
    /// termination left a thread alive, or if the thread cannot be spawned.
    pub fn start(&mut self) -> Result<()> {
        self.reap();
        match self.state {
            ThreadState::Running | ThreadState::StopRequested => {
                return Err(EmuHostError::AlreadyRunning)
            }
            ThreadState::Indeterminate => return Err(EmuHostError::ThreadStuck),
            _ => {}
        }

        self.host.shared.control.set_exiting(false);
        self.host.shared.cancel.reset();
        self.host.throttle().restart_clock();
        self.exit.set_running();

        let core = Arc::clone(&self.core);
        let host = self.host.clone();
        let exit = Arc::clone(&self.exit);
        let spawned = thread::Builder::new()
            .name("emulation".into())
            .spawn(move || run_emulation(core, host, exit));

        match spawned {
            Ok(handle) => {
                tracing::debug!("emulation thread started");
                self.handle = Some(handle);
                self.state = ThreadState::Running;
                Ok(())
            }
            Err(err) => {
                self.exit.mark_exited();
                Err(EmuHostError::Spawn(err))
            }
        }
    }

    /// Stop the emulation thread, forcing termination if it does not exit
    ///
    /// Waits up to the stop timeout for the loop to notice
    /// [`EmuContext::should_exit`]. If it does not, forced termination is
    /// triggered and the wait repeats with the terminate timeout. Returns
    /// whether the thread is confirmed stopped; `false` leaves the state
    /// [`ThreadState::Indeterminate`].
    pub fn request_stop(&mut self) -> bool {
        if !self.exit.is_running() {
            self.reap();
            return true;
        }

        tracing::debug!("requesting emulation stop");
        if self.state != ThreadState::Indeterminate {
            self.state = ThreadState::StopRequested;
        }
        self.host.shared.control.set_exiting(true);

        if self.exit.wait(self.stop_timeout) {
            self.finish(ThreadState::Stopped);
            return true;
        }

        tracing::warn!(
            timeout_ms = self.stop_timeout.as_millis() as u64,
            "emulation loop ignored stop request, forcing termination"
        );
        self.host.shared.cancel.trigger();

        if self.exit.wait(self.terminate_timeout) {
            self.finish(ThreadState::Terminated);
            return true;
        }

        tracing::error!("emulation thread could not be stopped");
        self.state = ThreadState::Indeterminate;
        false
    }

    /// Stop the thread, then load a ROM or state image into the core
    ///
    /// Returns [`LoadStatus::Fail`] without touching the core if the thread
    /// cannot be stopped.
    pub fn load(&mut self, request: LoadRequest) -> LoadStatus {
        if !self.request_stop() {
            return LoadStatus::Fail;
        }
        tracing::debug!(path = %request.path().display(), "loading");
        self.core.lock().load(&request)
    }

    /// Join a thread that has already exited
    fn reap(&mut self) {
        if self.handle.is_some() && !self.exit.is_running() {
            let outcome = match self.state {
                ThreadState::Indeterminate => ThreadState::Terminated,
                _ => ThreadState::Stopped,
            };
            self.finish(outcome);
        }
    }

    fn finish(&mut self, outcome: ThreadState) {
        if let Some(handle) = self.handle.take() {
            // The loop's own panics are caught inside the thread
            let _ = handle.join();
        }
        self.host.shared.cancel.reset();
        self.host.shared.control.set_exiting(false);
        self.host.shared.control.receive.reset();
        self.state = outcome;
        tracing::debug!(state = ?outcome, "emulation thread finished");
    }
}

impl<C: EmulatorCore> Drop for EmuThread<C> {
    fn drop(&mut self) {
        if self.exit.is_running() && !self.request_stop() {
            tracing::error!("dropping emulation host with its thread still running");
        }
    }
}

impl<C: EmulatorCore> std::fmt::Debug for EmuThread<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmuThread")
            .field("state", &self.state())
            .field("host", &self.host)
            .finish()
    }
}

/// Body of the emulation thread
fn run_emulation<C: EmulatorCore>(core: Arc<Mutex<C>>, host: EmuHost, exit: Arc<ExitSignal>) {
    let _exit = ExitGuard(exit);
    let ctx = EmuContext::new(host.clone());

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut core = core.lock();
        core.run(&ctx);
    }));

    match outcome {
        Ok(()) => {
            tracing::debug!("emulation loop exited");
            host.emit(HostEvent::Stopped);
        }
        Err(payload) if cancel::is_termination(&*payload) => {
            tracing::warn!("emulation thread terminated");
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(%message, "emulation loop panicked");
            host.emit(HostEvent::Stopped);
        }
    }
}
