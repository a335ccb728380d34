//! Error types for the Eiger interface.
//!
//! Collaborator traits (camera, stream, file writer) use `anyhow::Result` at
//! the seam, matching the capability-trait convention used across the driver
//! crates. The interface itself surfaces a typed [`EigerError`] so callers can
//! distinguish a stream-arm timeout from a camera command failure without
//! string matching.

use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results returned by the interface.
pub type EigerResult<T> = std::result::Result<T, EigerError>;

/// Errors surfaced by [`crate::interface::EigerInterface`].
#[derive(Error, Debug)]
pub enum EigerError {
    /// Interface construction failed; no partial capability list is exposed.
    #[error("Interface construction failed: {0}")]
    Construction(String),

    /// Configuration values parsed but failed semantic validation.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A detector control command failed (communication or firmware fault).
    #[error("Camera command failed: {0}")]
    Camera(String),

    /// The on-detector file writer rejected a command.
    #[error("File writer error: {0}")]
    Saving(String),

    /// The live stream transport rejected a command.
    #[error("Stream transport error: {0}")]
    Stream(String),

    /// The stream transport did not report armed within the configured
    /// timeout during prepare. Fatal for that prepare call.
    #[error("Stream transport failed to arm within {timeout:?}: {reason}")]
    StreamArmTimeout {
        /// Timeout that elapsed.
        timeout: Duration,
        /// Transport-reported reason.
        reason: String,
    },
}
