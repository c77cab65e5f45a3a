//! Interface to the emulator core driven by the host

use super::EmuContext;
use std::path::{Path, PathBuf};

/// Result of loading a ROM or state image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// Loaded successfully
    Okay,
    /// Load failed, or the emulation thread could not be stopped first
    Fail,
    /// The file is not a state image this core understands
    NotAnImage,
}

/// Result of one link transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Transfer completed
    Good,
    /// Transfer completed with a warning
    Warning,
    /// Transfer failed
    Error,
}

/// What a save writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveKind {
    /// Full emulator state image
    Image,
    /// ROM dump
    Rom,
}

/// What a load restores
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadRequest {
    /// Boot from a ROM file
    Rom(PathBuf),
    /// Restore a saved state image
    Image(PathBuf),
}

impl LoadRequest {
    /// File the request refers to
    pub fn path(&self) -> &Path {
        match self {
            LoadRequest::Rom(path) | LoadRequest::Image(path) => path,
        }
    }
}

/// Emulator core run on the emulation thread
///
/// `run` owns the emulation loop. It is expected to call
/// [`EmuContext::checkpoint`] and [`EmuContext::throttle_wait`] once per
/// quantum and to return once [`EmuContext::should_exit`] turns true.
/// Every other method is invoked either from a checkpoint on the emulation
/// thread or, for [`load`](Self::load), from the controller thread while the
/// emulation thread is stopped.
pub trait EmulatorCore: Send + 'static {
    /// Run the emulation loop until asked to exit
    fn run(&mut self, ctx: &EmuContext);

    /// Reset the emulated machine
    fn reset(&mut self);

    /// Persist state to `path`, returning success
    fn save_state(&mut self, kind: SaveKind, path: &Path) -> bool;

    /// Load a ROM or restore a state image
    fn load(&mut self, request: &LoadRequest) -> LoadStatus;

    /// Transfer one file into the emulated machine
    fn send_variable(&mut self, file: &Path, location: u32) -> LinkStatus;

    /// Enter the core's debugger; may block until the debugger closes
    fn enter_debugger(&mut self, ctx: &EmuContext) {
        let _ = ctx;
    }
}
