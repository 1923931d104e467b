//! Error types for the chromesweep-core library.

use thiserror::Error;

/// Result type alias for cleanup operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during process enumeration and termination.
///
/// Most of these never escape a cleanup stage: a vanished process counts
/// as a success, a permission failure leaves the PID in the residual set,
/// and a missing host tool skips the stage that needed it.
#[derive(Error, Debug)]
pub enum Error {
    /// A target process disappeared between enumeration and action.
    #[error("Process {0} vanished before it could be acted on")]
    ProcessVanished(u32),

    /// Termination call rejected by the OS.
    #[error("Permission denied acting on process {0}")]
    PermissionDenied(u32),

    /// A required enumeration/termination capability is missing on the host.
    #[error("Required tool unavailable: {0}")]
    ToolUnavailable(String),

    /// Failed to execute a system command.
    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    /// Failed to parse command output.
    #[error("Failed to parse output: {0}")]
    ParseError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::ProcessVanished(1234);
        assert!(err.to_string().contains("1234"));

        let err = Error::PermissionDenied(5678);
        assert!(err.to_string().contains("5678"));

        let err = Error::ToolUnavailable("ss".to_string());
        assert!(err.to_string().contains("ss"));
    }
}
