//! Notifications sent from the host layer to the display/UI side
//!
//! The emulation thread never calls into the UI directly. Every observable
//! change is emitted as a [`HostEvent`] through a [`HostEvents`] sink that the
//! UI supplies at construction time.

use crate::console::ConsoleDest;
use crate::host::LinkStatus;
use parking_lot::Mutex;
use std::sync::mpsc::Sender;

/// Notification emitted by the host layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// A contiguous run of console bytes became readable
    ConsoleReady(ConsoleDest),
    /// A pending save finished (success flag)
    Saved(bool),
    /// One item of a send batch finished.
    ///
    /// Every batch ends with a sentinel carrying `name: None` and
    /// [`LinkStatus::Good`].
    SentFile {
        /// Item that was sent, `None` for the end-of-batch sentinel
        name: Option<String>,
        /// Transfer status reported by the core
        status: LinkStatus,
    },
    /// The emulation loop is parked waiting for [`EmuHost::unlock`](crate::EmuHost::unlock)
    ReceiveReady,
    /// The emulation loop returned on its own
    Stopped,
    /// Achieved emulation speed changed (percent)
    ActualSpeedChanged(u32),
    /// The core entered its debugger
    DebuggerRaised,
    /// The core left its debugger
    DebuggerDisabled,
    /// The core forwarded a debugger command to the UI
    DebugCommand {
        /// Core-defined reason code
        reason: i32,
        /// Address the command refers to
        addr: u32,
    },
}

/// Sink for [`HostEvent`]s
///
/// Implementations are called from the emulation thread and must not block
/// for long.
pub trait HostEvents: Send + Sync {
    /// Deliver one event
    fn emit(&self, event: HostEvent);
}

/// Sink that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEvents;

impl HostEvents for NullEvents {
    fn emit(&self, _event: HostEvent) {}
}

impl HostEvents for Sender<HostEvent> {
    fn emit(&self, event: HostEvent) {
        // A dropped receiver just means nobody is listening any more
        let _ = self.send(event);
    }
}

/// Sink that records every event in order
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<HostEvent>>,
}

impl EventLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every event recorded so far
    pub fn snapshot(&self) -> Vec<HostEvent> {
        self.events.lock().clone()
    }

    /// Number of recorded events equal to `event`
    pub fn count(&self, event: &HostEvent) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }

    /// Remove and return every recorded event
    pub fn drain(&self) -> Vec<HostEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl HostEvents for EventLog {
    fn emit(&self, event: HostEvent) {
        self.events.lock().push(event);
    }
}
