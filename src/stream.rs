//! Live stream transport contract.
//!
//! The transport receives the detector's compressed frame stream over a
//! network or memory-mapped channel and hands frames to the host-side buffer
//! and decompression stages. The wire format is the transport's business; the
//! interface only sequences activation, start/stop and the armed handshake.

use crate::capability::BufferControl;
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Shape of the last frame seen on the stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamInfo {
    /// Acquisition-relative frame index.
    pub frame_idx: u64,
    /// Compression/encoding tag as announced in the stream header
    /// (e.g. "bs16-lz4<").
    pub encoding: String,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Compressed payload size in bytes.
    pub packed_size: usize,
}

/// Transfer counters for the current acquisition.
///
/// Reset at every prepare; latched (optionally with reset) by the host for
/// monitoring.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StreamStatistics {
    /// Frames received since the last reset.
    pub nb_frames: u64,
    /// Compressed bytes received since the last reset.
    pub nb_bytes: u64,
    /// Wall time covered by the counters.
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

impl StreamStatistics {
    /// Mean compressed frame size in bytes, 0.0 when no frames were seen.
    pub fn avg_frame_size(&self) -> f64 {
        if self.nb_frames == 0 {
            0.0
        } else {
            self.nb_bytes as f64 / self.nb_frames as f64
        }
    }

    /// Mean transfer rate in MiB/s, 0.0 when no time has elapsed.
    pub fn bandwidth_mib(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.nb_bytes as f64 / (1024.0 * 1024.0) / secs
        }
    }
}

/// Capability: compressed frame stream reception.
///
/// # Contract
/// - `set_active(false)` makes `start` a no-op; the activation flag is set at
///   prepare time and selects the data path together with the decompressor.
/// - `wait_armed` blocks until the detector-side stream endpoint confirms it
///   is publishing, failing with an error when the timeout elapses.
/// - `is_running` must be cheap; it is polled from status queries that may
///   run concurrently with an acquisition.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Enable or disable the transport for the next acquisition.
    async fn set_active(&self, active: bool);

    /// Whether the transport is enabled.
    async fn is_active(&self) -> bool;

    /// Start receiving. No-op when inactive.
    async fn start(&self) -> Result<()>;

    /// Stop receiving and drop the connection. Safe to call when stopped.
    async fn stop(&self) -> Result<()>;

    /// Whether a receive loop is currently running.
    async fn is_running(&self) -> bool;

    /// Wait for the detector stream endpoint to report armed.
    async fn wait_armed(&self, timeout: Duration) -> Result<()>;

    /// Zero the transfer counters.
    async fn reset_statistics(&self);

    /// Shape of the most recently received frame.
    async fn last_info(&self) -> Result<StreamInfo>;

    /// Read the transfer counters, optionally resetting them.
    async fn latch_statistics(&self, reset: bool) -> Result<StreamStatistics>;

    /// Host-side frame buffer owned by the transport, exposed to the host
    /// framework as the Buffer capability.
    fn buffer_ctrl(&self) -> Arc<dyn BufferControl>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistics_averages() {
        let stats = StreamStatistics {
            nb_frames: 4,
            nb_bytes: 8 * 1024 * 1024,
            elapsed: Duration::from_secs(2),
        };
        assert_eq!(stats.avg_frame_size(), 2.0 * 1024.0 * 1024.0);
        assert_eq!(stats.bandwidth_mib(), 4.0);
    }

    #[test]
    fn test_statistics_empty_is_zero() {
        let stats = StreamStatistics::default();
        assert_eq!(stats.avg_frame_size(), 0.0);
        assert_eq!(stats.bandwidth_mib(), 0.0);
    }
}
