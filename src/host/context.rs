//! View of the host handed to the core on the emulation thread

use super::control::Pending;
use super::{EmuHost, EmulatorCore};
use crate::console::{ConsoleChannel, ConsoleDest};
use crate::events::HostEvent;
use std::fmt;
use std::time::{Duration, Instant};

/// Emulation-thread side of an [`EmuHost`]
///
/// Only the lifecycle manager creates contexts, one per emulation thread
/// run. The blocking calls here ([`throttle_wait`](Self::throttle_wait),
/// [`sleep`](Self::sleep), console writes under backpressure and the receive
/// handshake inside [`checkpoint`](Self::checkpoint)) are the points where a
/// forced termination takes effect.
pub struct EmuContext {
    host: EmuHost,
}

impl EmuContext {
    pub(crate) fn new(host: EmuHost) -> Self {
        EmuContext { host }
    }

    /// The host this context belongs to
    pub fn host(&self) -> &EmuHost {
        &self.host
    }

    /// Console channel (producer side)
    pub fn console(&self) -> &ConsoleChannel {
        self.host.console()
    }

    /// Write formatted text to the normal console stream
    pub fn print(&self, args: fmt::Arguments<'_>) {
        self.console().write_args(ConsoleDest::Normal, args);
    }

    /// Write formatted text to the error console stream
    pub fn eprint(&self, args: fmt::Arguments<'_>) {
        self.console().write_args(ConsoleDest::Error, args);
    }

    /// Pace the loop; call once per quantum
    pub fn throttle_wait(&self) {
        self.host.throttle().wait_for_next_quantum();
    }

    /// Whether the loop has been asked to exit
    pub fn should_exit(&self) -> bool {
        self.host.shared.control.is_exiting()
    }

    /// Sleep without blocking forced termination
    pub fn sleep(&self, duration: Duration) {
        self.host.shared.cancel.sleep(duration);
    }

    /// Service pending controller requests
    ///
    /// Each pending flag is taken and serviced once, in order: reset, save,
    /// send, receive, debugger. A receive parks the loop until
    /// [`EmuHost::unlock`]. Time spent here is not counted against the
    /// throttle schedule.
    pub fn checkpoint<C: EmulatorCore + ?Sized>(&self, core: &mut C) {
        let control = &self.host.shared.control;
        if control.pending().is_empty() {
            return;
        }
        let started = Instant::now();

        if control.take(Pending::RESET) {
            tracing::debug!("servicing reset");
            core.reset();
        }

        if control.take(Pending::SAVE) {
            if let Some(request) = control.take_save() {
                tracing::debug!(path = %request.path.display(), kind = ?request.kind, "servicing save");
                let success = core.save_state(request.kind, &request.path);
                self.host.emit(HostEvent::Saved(success));
            }
        }

        if control.take(Pending::SEND) {
            if let Some(request) = control.take_send() {
                tracing::debug!(files = request.files.len(), "servicing send");
                for file in &request.files {
                    let status = core.send_variable(file, request.location);
                    self.host.emit(HostEvent::SentFile {
                        name: Some(file.display().to_string()),
                        status,
                    });
                }
                self.host.emit(HostEvent::SentFile {
                    name: None,
                    status: super::LinkStatus::Good,
                });
            }
        }

        if control.take(Pending::RECEIVE) {
            tracing::debug!("parking for receive");
            control.receive.arm();
            self.host.emit(HostEvent::ReceiveReady);
            control.receive.wait(&self.host.shared.cancel);
        }

        if control.take(Pending::DEBUG) {
            tracing::debug!("entering debugger");
            core.enter_debugger(self);
        }

        self.host.throttle().compensate(started.elapsed());
    }

    /// Report that the core entered (`true`) or left its debugger
    pub fn set_debugger_active(&self, active: bool) {
        self.host.shared.control.set_in_debugger(active);
        self.host.emit(if active {
            HostEvent::DebuggerRaised
        } else {
            HostEvent::DebuggerDisabled
        });
    }

    /// Forward a debugger command to the UI
    pub fn send_debug_command(&self, reason: i32, addr: u32) {
        self.host.emit(HostEvent::DebugCommand { reason, addr });
    }

    /// One-shot request from the controller to close the debugger
    pub fn debugger_exit_requested(&self) -> bool {
        self.host.shared.control.take_leave_debugger()
    }

    /// Tell the throttle whether the emulated device is powered
    ///
    /// Speed reports are dropped while it is off.
    pub fn set_device_powered(&self, powered: bool) {
        self.host.throttle().set_reporting(powered);
    }
}

impl fmt::Debug for EmuContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmuContext").finish_non_exhaustive()
    }
}
