//! Bounded console channel between the emulation thread and the UI
//!
//! The emulation thread produces console text; the UI thread drains it. The
//! channel is a fixed-size byte ring with two counting semaphores (free bytes
//! and filled bytes), so a producer blocks only for space and a consumer only
//! for data. Memory use is fixed at the configured capacity.

mod bounded;
pub mod channel;
mod semaphore;

pub use channel::ConsoleChannel;

/// Default console capacity in bytes
pub const DEFAULT_CONSOLE_CAPACITY: usize = 4096;

/// Destination stream of a console write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsoleDest {
    /// Regular output
    Normal,
    /// Error output
    Error,
}
