//! Detector control contract.
//!
//! The camera object owns the HTTP-like command channel to the detector
//! control unit (DCU). The interface never speaks the wire protocol itself;
//! it consumes this trait and sequences the calls.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Low-level detector state as reported by the control unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorStatus {
    /// Idle and accepting configuration.
    Ready,
    /// Integrating photons.
    Exposure,
    /// Armed, waiting for a trigger.
    Armed,
    /// Hardware or firmware fault.
    Fault,
    /// Booting or reconfiguring.
    Initializing,
}

/// Trigger source and sequencing mode.
///
/// `InternalMulti` is the distinguished mode where one prepared acquisition
/// spans several software triggers, each contributing a subset of the total
/// frame count. Data-retrieval subsystems must keep running across the
/// sub-triggers of such a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Single internal trigger for the whole sequence.
    Internal,
    /// One internal trigger per frame group; the sequence stays armed between
    /// triggers.
    InternalMulti,
    /// External trigger signal starts the sequence.
    External,
    /// External gate signal defines each exposure window.
    ExternalGate,
}

impl TriggerMode {
    /// True for the internal multi-trigger sequencing mode.
    pub fn is_internal_multi(&self) -> bool {
        matches!(self, TriggerMode::InternalMulti)
    }
}

/// Capability: detector command and state access.
///
/// # Contract
/// - `arm`/`disarm` change the armed state; `disarm` on an acquisition that
///   used on-detector saving finalizes the open file on the DCU.
/// - `nb_triggered_frames() <= nb_frames()` at all times.
/// - `serie_id` is only meaningful after `prepare_acq` and identifies the
///   detector-side acquisition instance for file tagging.
/// - `delete_memory_files` clears image files left on DCU-internal storage.
#[async_trait]
pub trait CameraControl: Send + Sync {
    /// Current detector state.
    async fn status(&self) -> Result<DetectorStatus>;

    /// Arm the detector for triggering.
    async fn arm(&self) -> Result<()>;

    /// Disarm the detector. Finalizes the open DCU file when on-detector
    /// saving was in use.
    async fn disarm(&self) -> Result<()>;

    /// Detector-level prepare: uploads the acquisition settings and arms the
    /// internal sequencer.
    async fn prepare_acq(&self) -> Result<()>;

    /// Issue the start command.
    async fn start_acq(&self) -> Result<()>;

    /// Issue the stop command.
    async fn stop_acq(&self) -> Result<()>;

    /// Currently configured trigger mode.
    async fn trig_mode(&self) -> Result<TriggerMode>;

    /// Total frames in the prepared sequence.
    async fn nb_frames(&self) -> Result<usize>;

    /// Frames already covered by triggers in the current multi-trigger
    /// sequence.
    async fn nb_triggered_frames(&self) -> Result<usize>;

    /// Frames the hardware has acquired so far.
    async fn nb_hw_acquired_frames(&self) -> Result<usize>;

    /// Serie/session identifier of the prepared acquisition.
    async fn serie_id(&self) -> Result<i64>;

    /// Delete image files from the DCU's internal storage.
    async fn delete_memory_files(&self) -> Result<()>;
}
