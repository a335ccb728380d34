//! On-detector saving sessions.
//!
//! When the FileWriter data path is active the detector firmware writes
//! frames to DCU-internal storage and the host later transfers the finished
//! files; the live stream and host-side decompression stay disabled for the
//! whole acquisition.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// State of the on-detector saving session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavingStatus {
    /// No transfer in progress.
    Idle,
    /// Files are being written or transferred.
    Running,
    /// The writer or a transfer failed.
    Error,
}

/// Capability: on-detector file saving.
///
/// # Contract
/// - `is_active` reflects prior configuration, not a command issued by the
///   interface; it selects the data path at prepare time.
/// - `start`/`stop` bracket one saving session; `stop` is idempotent.
/// - `set_serie_id` tags the session with the detector-side acquisition id so
///   transferred files correlate with the acquisition that produced them.
#[async_trait]
pub trait FileWriter: Send + Sync {
    /// Whether on-detector saving is configured active.
    async fn is_active(&self) -> bool;

    /// Start a saving session.
    async fn start(&self) -> Result<()>;

    /// Stop the saving session. Safe to call when no session is running.
    async fn stop(&self) -> Result<()>;

    /// Current session state.
    async fn status(&self) -> SavingStatus;

    /// Tag the session with the detector serie id.
    async fn set_serie_id(&self, serie_id: i64) -> Result<()>;
}
