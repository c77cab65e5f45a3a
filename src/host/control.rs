//! Pending requests polled by the emulation loop
//!
//! The controller thread only ever sets flags here. The emulation thread
//! takes them at its next checkpoint, so each request is serviced exactly
//! once and on the emulation thread.

use crate::cancel::{CancelToken, CANCEL_POLL};
use bitflags::bitflags;
use parking_lot::{Condvar, Mutex};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use super::SaveKind;

bitflags! {
    /// Requests waiting for the next checkpoint
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Pending: u8 {
        /// Reset the machine
        const RESET = 0x01;
        /// Save state
        const SAVE = 0x02;
        /// Send files into the machine
        const SEND = 0x04;
        /// Park the loop for an external receive
        const RECEIVE = 0x08;
        /// Enter the debugger
        const DEBUG = 0x10;
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SaveRequest {
    pub(crate) kind: SaveKind,
    pub(crate) path: PathBuf,
}

#[derive(Debug, Clone)]
pub(crate) struct SendRequest {
    pub(crate) files: Vec<PathBuf>,
    pub(crate) location: u32,
}

/// Flags and payloads shared between the controller and emulation threads
#[derive(Debug, Default)]
pub(crate) struct Control {
    pending: AtomicU8,
    save: Mutex<Option<SaveRequest>>,
    send: Mutex<Option<SendRequest>>,
    /// Cooperative stop request
    exiting: AtomicBool,
    in_debugger: AtomicBool,
    leave_debugger: AtomicBool,
    pub(crate) receive: Handshake,
}

impl Control {
    pub(crate) fn request(&self, flags: Pending) {
        self.pending.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    pub(crate) fn withdraw(&self, flags: Pending) {
        self.pending.fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    /// Clear `flag`, returning whether it was set
    pub(crate) fn take(&self, flag: Pending) -> bool {
        let previous = self.pending.fetch_and(!flag.bits(), Ordering::AcqRel);
        Pending::from_bits_truncate(previous).contains(flag)
    }

    pub(crate) fn pending(&self) -> Pending {
        Pending::from_bits_truncate(self.pending.load(Ordering::Acquire))
    }

    pub(crate) fn request_save(&self, request: SaveRequest) {
        *self.save.lock() = Some(request);
        self.request(Pending::SAVE);
    }

    pub(crate) fn take_save(&self) -> Option<SaveRequest> {
        self.save.lock().take()
    }

    pub(crate) fn request_send(&self, request: SendRequest) {
        *self.send.lock() = Some(request);
        self.request(Pending::SEND);
    }

    pub(crate) fn take_send(&self) -> Option<SendRequest> {
        self.send.lock().take()
    }

    pub(crate) fn set_exiting(&self, exiting: bool) {
        self.exiting.store(exiting, Ordering::Release);
    }

    pub(crate) fn is_exiting(&self) -> bool {
        self.exiting.load(Ordering::Acquire)
    }

    pub(crate) fn set_in_debugger(&self, inside: bool) {
        self.in_debugger.store(inside, Ordering::Release);
        if !inside {
            self.leave_debugger.store(false, Ordering::Release);
        }
    }

    pub(crate) fn in_debugger(&self) -> bool {
        self.in_debugger.load(Ordering::Acquire)
    }

    pub(crate) fn request_leave_debugger(&self) {
        self.leave_debugger.store(true, Ordering::Release);
    }

    pub(crate) fn take_leave_debugger(&self) -> bool {
        self.leave_debugger.swap(false, Ordering::AcqRel)
    }
}

/// State of the receive handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiveState {
    /// No receive in progress
    #[default]
    Idle,
    /// The emulation loop is parked until the controller unlocks it
    AwaitingExternalUnlock,
    /// Unlocked; the loop is about to resume
    Unlocked,
}

/// Block-until-signalled suspension point of the emulation loop
#[derive(Debug, Default)]
pub(crate) struct Handshake {
    state: Mutex<ReceiveState>,
    cond: Condvar,
}

impl Handshake {
    pub(crate) fn state(&self) -> ReceiveState {
        *self.state.lock()
    }

    /// Enter the awaiting state; must precede announcing the wait
    pub(crate) fn arm(&self) {
        *self.state.lock() = ReceiveState::AwaitingExternalUnlock;
    }

    /// Park until [`unlock`](Self::unlock). There is no timeout; only
    /// forced termination ends the wait early.
    pub(crate) fn wait(&self, cancel: &CancelToken) {
        let mut state = self.state.lock();
        while *state == ReceiveState::AwaitingExternalUnlock {
            cancel.check();
            self.cond.wait_for(&mut state, CANCEL_POLL);
        }
        *state = ReceiveState::Idle;
    }

    /// Drop a wait abandoned by forced termination
    pub(crate) fn reset(&self) {
        *self.state.lock() = ReceiveState::Idle;
    }

    /// Release a parked loop; ignored unless a wait is armed
    pub(crate) fn unlock(&self) -> bool {
        let mut state = self.state.lock();
        if *state != ReceiveState::AwaitingExternalUnlock {
            return false;
        }
        *state = ReceiveState::Unlocked;
        self.cond.notify_all();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_take_clears_only_requested_flag() {
        let control = Control::default();
        control.request(Pending::RESET | Pending::DEBUG);
        assert!(control.take(Pending::RESET));
        assert!(!control.take(Pending::RESET));
        assert_eq!(control.pending(), Pending::DEBUG);

        control.withdraw(Pending::DEBUG);
        assert!(control.pending().is_empty());
    }

    #[test]
    fn test_latest_save_request_wins() {
        let control = Control::default();
        control.request_save(SaveRequest {
            kind: SaveKind::Image,
            path: "first.img".into(),
        });
        control.request_save(SaveRequest {
            kind: SaveKind::Rom,
            path: "second.rom".into(),
        });

        assert!(control.take(Pending::SAVE));
        let request = control.take_save().unwrap();
        assert_eq!(request.kind, SaveKind::Rom);
        assert_eq!(request.path, PathBuf::from("second.rom"));
        assert!(control.take_save().is_none());
    }

    #[test]
    fn test_leaving_debugger_clears_exit_request() {
        let control = Control::default();
        control.set_in_debugger(true);
        control.request_leave_debugger();
        control.set_in_debugger(false);
        assert!(!control.take_leave_debugger());
    }

    #[test]
    fn test_unlock_without_wait_is_ignored() {
        let handshake = Handshake::default();
        assert!(!handshake.unlock());
        assert_eq!(handshake.state(), ReceiveState::Idle);
    }

    #[test]
    fn test_unlock_releases_waiter() {
        let handshake = Arc::new(Handshake::default());
        handshake.arm();

        let waiter = Arc::clone(&handshake);
        let handle = thread::spawn(move || waiter.wait(&CancelToken::new()));

        thread::sleep(Duration::from_millis(30));
        assert!(!handle.is_finished());
        assert_eq!(handshake.state(), ReceiveState::AwaitingExternalUnlock);

        assert!(handshake.unlock());
        handle.join().unwrap();
        assert_eq!(handshake.state(), ReceiveState::Idle);
    }

    #[test]
    fn test_unlock_before_wait_is_not_lost() {
        let handshake = Handshake::default();
        handshake.arm();
        assert!(handshake.unlock());
        handshake.wait(&CancelToken::new());
        assert_eq!(handshake.state(), ReceiveState::Idle);
    }
}
