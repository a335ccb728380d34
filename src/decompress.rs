//! Host-side decompression stage.
//!
//! Decompression runs as a reconstruction task downstream of the stream
//! transport. The interface only toggles it: active exactly when the live
//! stream path is selected, inactive when the detector saves to its own
//! storage. The two flags are always set together at prepare time.

use async_trait::async_trait;

/// Capability: frame decompression toggle.
#[async_trait]
pub trait FrameDecompressor: Send + Sync {
    /// Enable or disable the decompression task for the next acquisition.
    async fn set_active(&self, active: bool);

    /// Whether the decompression task is enabled.
    async fn is_active(&self) -> bool;
}
