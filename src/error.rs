//! Error types for the emulation host layer
//!
//! Only construction, configuration and thread start-up report errors
//! through [`EmuHostError`]. Runtime outcomes (load status, stop failure,
//! send status) are plain values handed back to the caller or emitted as
//! [`HostEvent`](crate::HostEvent)s.

use thiserror::Error;

/// The main error type for emulation host operations
#[derive(Error, Debug)]
pub enum EmuHostError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error while reading configuration
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON configuration
    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The emulation thread is already running
    #[error("Emulation thread is already running")]
    AlreadyRunning,

    /// A forced termination failed and the old emulation thread is still alive
    #[error("Emulation thread could not be stopped and is still alive")]
    ThreadStuck,

    /// The operating system refused to spawn the emulation thread
    #[error("Failed to spawn emulation thread: {0}")]
    Spawn(#[source] std::io::Error),
}

impl EmuHostError {
    /// Creates a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        EmuHostError::Config(reason.into())
    }
}

/// Type alias for Result using EmuHostError
pub type Result<T> = std::result::Result<T, EmuHostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EmuHostError::config("console capacity must be greater than 0");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: console capacity must be greater than 0"
        );
        assert_eq!(
            EmuHostError::ThreadStuck.to_string(),
            "Emulation thread could not be stopped and is still alive"
        );
    }
}
