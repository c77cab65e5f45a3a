//! Emulation host: the shared handle, the core interface and the thread
//! lifecycle
//!
//! An [`EmuHost`] bundles the console channel, the throttle and the control
//! flags of one emulation thread. It is cheap to clone and is the only way
//! the UI and the core reach each other; there is no process-wide instance.
//!
//! - [`EmuThread`] starts, stops and force-terminates the emulation thread
//! - [`EmuContext`] is the core's view of the host on the emulation thread
//! - [`EmulatorCore`] is implemented by the emulator being hosted

mod context;
mod control;
pub mod emulator;
pub mod lifecycle;

pub use emulator::{EmulatorCore, LinkStatus, LoadRequest, LoadStatus, SaveKind};
pub use context::EmuContext;
pub use control::{Pending, ReceiveState};
pub use lifecycle::{EmuThread, ThreadState};

use crate::cancel::CancelToken;
use crate::config::HostConfig;
use crate::console::ConsoleChannel;
use crate::events::{HostEvent, HostEvents};
use crate::throttle::Throttle;
use crate::Result;
use control::{Control, SaveRequest, SendRequest};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

pub(crate) struct Shared {
    console: ConsoleChannel,
    throttle: Throttle,
    pub(crate) control: Control,
    pub(crate) cancel: Arc<CancelToken>,
    events: Arc<dyn HostEvents>,
}

/// Shared handle to one emulation thread's channel, throttle and flags
#[derive(Clone)]
pub struct EmuHost {
    pub(crate) shared: Arc<Shared>,
}

impl EmuHost {
    /// Build a host from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &HostConfig, events: Arc<dyn HostEvents>) -> Result<Self> {
        config.validate()?;
        let cancel = Arc::new(CancelToken::new());
        let console =
            ConsoleChannel::with_parts(config.console_capacity, events.clone(), cancel.clone())?;
        let throttle = Throttle::with_parts(config.throttle, events.clone(), cancel.clone())?;

        Ok(EmuHost {
            shared: Arc::new(Shared {
                console,
                throttle,
                control: Control::default(),
                cancel,
                events,
            }),
        })
    }

    /// Console channel; the UI reads from it
    pub fn console(&self) -> &ConsoleChannel {
        &self.shared.console
    }

    /// Throttle controller
    pub fn throttle(&self) -> &Throttle {
        &self.shared.throttle
    }

    /// Set the emulation speed percent (0 pauses)
    pub fn set_speed(&self, speed: u32) {
        self.shared.throttle.set_speed(speed);
    }

    /// Enable or disable real-time pacing
    pub fn set_throttle_mode(&self, throttled: bool) {
        self.shared.throttle.set_enabled(throttled);
    }

    /// Reset the machine at the next checkpoint
    pub fn reset(&self) {
        self.shared.control.request(Pending::RESET);
    }

    /// Save state at the next checkpoint; completion is reported as
    /// [`HostEvent::Saved`]
    pub fn save(&self, kind: SaveKind, path: impl Into<PathBuf>) {
        self.shared.control.request_save(SaveRequest {
            kind,
            path: path.into(),
        });
    }

    /// Send files into the machine at the next checkpoint
    ///
    /// Each file is reported as [`HostEvent::SentFile`], followed by a
    /// sentinel with no name.
    pub fn send(&self, files: Vec<PathBuf>, location: u32) {
        self.shared
            .control
            .request_send(SendRequest { files, location });
    }

    /// Park the emulation loop at its next checkpoint until [`unlock`](Self::unlock)
    pub fn receive(&self) {
        self.shared.control.request(Pending::RECEIVE);
    }

    /// Release a loop parked by [`receive`](Self::receive)
    ///
    /// Returns false if no receive was waiting.
    pub fn unlock(&self) -> bool {
        self.shared.control.receive.unlock()
    }

    /// Current receive handshake state
    pub fn receive_state(&self) -> ReceiveState {
        self.shared.control.receive.state()
    }

    /// Open (`true`) or close the core's debugger
    pub fn debug(&self, open: bool) {
        let control = &self.shared.control;
        if open {
            control.request(Pending::DEBUG);
        } else {
            control.withdraw(Pending::DEBUG);
            if control.in_debugger() {
                control.request_leave_debugger();
            }
        }
    }

    /// Whether the core reported being inside its debugger
    pub fn in_debugger(&self) -> bool {
        self.shared.control.in_debugger()
    }

    /// Requests not yet taken by a checkpoint
    pub fn pending(&self) -> Pending {
        self.shared.control.pending()
    }

    pub(crate) fn emit(&self, event: HostEvent) {
        self.shared.events.emit(event);
    }
}

impl fmt::Debug for EmuHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmuHost")
            .field("console", &self.shared.console)
            .field("throttle", &self.shared.throttle)
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventLog;

    fn host() -> EmuHost {
        EmuHost::new(&HostConfig::low_latency(), Arc::new(EventLog::new())).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = HostConfig {
            console_capacity: 0,
            ..HostConfig::default()
        };
        assert!(EmuHost::new(&config, Arc::new(EventLog::new())).is_err());
    }

    #[test]
    fn test_requests_set_pending_flags() {
        let host = host();
        host.reset();
        host.save(SaveKind::Image, "state.img");
        host.send(vec!["prog.8xp".into()], 0);
        host.receive();
        host.debug(true);
        assert_eq!(host.pending(), Pending::all());

        host.debug(false);
        assert!(!host.pending().contains(Pending::DEBUG));
        assert!(!host.shared.control.take_leave_debugger());
    }

    #[test]
    fn test_close_debugger_while_inside_requests_exit() {
        let host = host();
        host.shared.control.set_in_debugger(true);
        host.debug(false);
        assert!(host.shared.control.take_leave_debugger());
    }

    #[test]
    fn test_speed_controls_reach_throttle() {
        let host = host();
        host.set_speed(300);
        host.set_throttle_mode(false);
        assert_eq!(host.throttle().speed(), 300);
        assert!(!host.throttle().is_enabled());
    }
}
