//! Emulation thread host layer
//!
//! Runs an emulator core on a dedicated thread and keeps it in step with the
//! UI thread that owns it. Three pieces do the work:
//!
//! - [`ConsoleChannel`]: a fixed-capacity byte ring carrying console text from
//!   the emulation thread to the UI, with blocking backpressure
//! - [`Throttle`]: paces the emulation loop to a speed percentage using
//!   absolute deadlines, and reports the speed actually achieved
//! - [`EmuThread`]: starts the emulation thread, stops it cooperatively,
//!   forces termination when it does not stop in time, and gates loads on a
//!   successful stop
//!
//! Everything is reached through an explicitly constructed [`EmuHost`]
//! handle. Notifications for the UI are delivered through a [`HostEvents`]
//! sink.
//!
//! # Quick start
//! ```no_run
//! use std::sync::{mpsc, Arc};
//! use emu_host::{console_print, EmuContext, EmuThread, EmulatorCore, HostConfig};
//! use emu_host::{LinkStatus, LoadRequest, LoadStatus, SaveKind};
//!
//! struct Counter(u64);
//!
//! impl EmulatorCore for Counter {
//!     fn run(&mut self, ctx: &EmuContext) {
//!         while !ctx.should_exit() {
//!             self.0 += 1;
//!             console_print!(ctx, "frame {}\n", self.0);
//!             ctx.checkpoint(self);
//!             ctx.throttle_wait();
//!         }
//!     }
//!     fn reset(&mut self) { self.0 = 0; }
//!     fn save_state(&mut self, _: SaveKind, _: &std::path::Path) -> bool { true }
//!     fn load(&mut self, _: &LoadRequest) -> LoadStatus { LoadStatus::Okay }
//!     fn send_variable(&mut self, _: &std::path::Path, _: u32) -> LinkStatus { LinkStatus::Good }
//! }
//!
//! let (tx, rx) = mpsc::channel::<emu_host::HostEvent>();
//! let mut emu = EmuThread::new(Counter(0), &HostConfig::default(), Arc::new(tx)).unwrap();
//! emu.start().unwrap();
//! let text = emu.host().console().read();
//! print!("{}", String::from_utf8_lossy(&text));
//! assert!(emu.request_stop());
//! # drop(rx);
//! ```

#![warn(missing_docs)]

mod cancel;
pub mod config;
pub mod console;
mod error;
pub mod events;
pub mod host;
pub mod throttle;

pub use config::HostConfig;
pub use console::{ConsoleChannel, ConsoleDest};
pub use error::{EmuHostError, Result};
pub use events::{EventLog, HostEvent, HostEvents, NullEvents};
pub use host::{
    EmuContext, EmuHost, EmuThread, EmulatorCore, LinkStatus, LoadRequest, LoadStatus, Pending,
    ReceiveState, SaveKind, ThreadState,
};
pub use throttle::{Throttle, ThrottleConfig};

/// Write formatted text to the normal console stream of an [`EmuContext`]
#[macro_export]
macro_rules! console_print {
    ($ctx:expr, $($arg:tt)*) => {
        $ctx.print(::std::format_args!($($arg)*))
    };
}

/// Write formatted text to the error console stream of an [`EmuContext`]
#[macro_export]
macro_rules! console_eprint {
    ($ctx:expr, $($arg:tt)*) => {
        $ctx.eprint(::std::format_args!($($arg)*))
    };
}
