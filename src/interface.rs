//! Acquisition interface for the Eiger detector.
//!
//! [`EigerInterface`] composes the detector sub-objects into the lifecycle the
//! host acquisition engine drives: prepare, start, run, stop. Its real work is
//! arbitration between the detector's two mutually exclusive data paths:
//!
//! - **On-detector saving**: firmware writes frames to DCU-internal storage;
//!   the live stream and host decompression stay off.
//! - **Live stream**: compressed frames are pushed to the host transport and
//!   decompressed there; on-detector saving stays off.
//!
//! The path is chosen once per prepared acquisition from the file writer's
//! activation flag, and the composite status reported to the host is derived
//! fresh on every query from the sub-component states.

use std::sync::Arc;
use tokio::time::sleep;

use crate::camera::{CameraControl, DetectorStatus, TriggerMode};
use crate::capability::{
    Capability, DetectorInfo, EventSource, HwCap, HwRoiControl, RoiPattern, SyncControl,
};
use crate::config::EigerConfig;
use crate::decompress::FrameDecompressor;
use crate::error::{EigerError, EigerResult};
use crate::saving::{FileWriter, SavingStatus};
use crate::stream::{StreamInfo, StreamStatistics, StreamTransport};

/// Composite acquisition state reported to the host framework.
///
/// Never persisted; recomputed from the sub-component states on every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeStatus {
    /// Idle, armed, or between the sub-triggers of a multi-trigger sequence.
    Ready,
    /// The detector is integrating.
    Exposure,
    /// Frames are still being saved or streamed after the last exposure.
    Readout,
    /// The detector, or the saving path, reported a fault.
    Fault,
    /// The detector is initializing or reconfiguring.
    Config,
}

/// Point-in-time view of the sub-component states that feed the composite
/// status decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Raw detector state.
    pub detector: DetectorStatus,
    /// Configured trigger mode.
    pub trig_mode: TriggerMode,
    /// Total frames in the prepared sequence.
    pub nb_frames: usize,
    /// Frames already covered by triggers.
    pub nb_triggered_frames: usize,
    /// Whether on-detector saving is the active data path.
    pub saving_active: bool,
    /// File writer session state.
    pub saving_status: SavingStatus,
    /// Whether the stream transport receive loop is running.
    pub stream_running: bool,
}

/// Derive the composite status from a snapshot of sub-component states.
///
/// Pure function; the decision order matters. A `Ready` detector inside an
/// unfinished multi-trigger sequence is reported `Ready` regardless of the
/// data-path state, because the host must be free to issue the next trigger.
pub fn derive_status(s: &StatusSnapshot) -> CompositeStatus {
    match s.detector {
        DetectorStatus::Exposure => CompositeStatus::Exposure,
        DetectorStatus::Armed => CompositeStatus::Ready,
        DetectorStatus::Fault => CompositeStatus::Fault,
        DetectorStatus::Initializing => CompositeStatus::Config,
        DetectorStatus::Ready => {
            let mult_trig_in_progress =
                s.trig_mode.is_internal_multi() && s.nb_triggered_frames != s.nb_frames;
            if mult_trig_in_progress {
                CompositeStatus::Ready
            } else if s.saving_active {
                match s.saving_status {
                    SavingStatus::Idle => CompositeStatus::Ready,
                    SavingStatus::Running => CompositeStatus::Readout,
                    SavingStatus::Error => CompositeStatus::Fault,
                }
            } else if s.stream_running {
                CompositeStatus::Readout
            } else {
                CompositeStatus::Ready
            }
        }
    }
}

/// Collaborator trait objects the interface is built from.
///
/// Same capability-bag shape the device registry uses: each sub-system is a
/// separately owned `Arc` so a single backend object may serve several roles.
#[derive(Clone)]
pub struct EigerComponents {
    /// Detector command channel.
    pub camera: Arc<dyn CameraControl>,
    /// Detector identity and geometry.
    pub det_info: Arc<dyn DetectorInfo>,
    /// Hardware ROI control; probed once for support.
    pub roi: Arc<dyn HwRoiControl>,
    /// Exposure/timing control.
    pub sync: Arc<dyn SyncControl>,
    /// On-detector file saving.
    pub saving: Arc<dyn FileWriter>,
    /// Asynchronous detector events.
    pub event: Arc<dyn EventSource>,
    /// Compressed frame stream transport.
    pub stream: Arc<dyn StreamTransport>,
    /// Host-side decompression stage.
    pub decompress: Arc<dyn FrameDecompressor>,
}

/// The acquisition interface object.
///
/// Invoked serially by the host's acquisition engine; [`status`] may also be
/// polled concurrently from a monitoring thread and only performs short reads
/// of collaborator state.
///
/// [`status`]: EigerInterface::status
pub struct EigerInterface {
    camera: Arc<dyn CameraControl>,
    roi: Arc<dyn HwRoiControl>,
    saving: Arc<dyn FileWriter>,
    stream: Arc<dyn StreamTransport>,
    decompress: Arc<dyn FrameDecompressor>,
    cap_list: Vec<HwCap>,
    has_hw_roi: bool,
    config: EigerConfig,
}

impl EigerInterface {
    /// Build the interface and its capability list.
    ///
    /// Probes hardware-ROI support exactly once and assembles the handles in
    /// the fixed discovery order: detector info, ROI (only when supported),
    /// sync, saving, event, buffer, decompression. All-or-nothing: any probe
    /// or validation failure yields an error and no partial registry.
    pub async fn new(components: EigerComponents, config: EigerConfig) -> EigerResult<Self> {
        config.validate()?;

        let has_hw_roi = components
            .roi
            .has_hw_roi_support()
            .await
            .map_err(|e| EigerError::Construction(format!("hardware-ROI probe failed: {e}")))?;

        let mut cap_list = Vec::with_capacity(7);
        cap_list.push(HwCap::DetectorInfo(components.det_info.clone()));
        if has_hw_roi {
            cap_list.push(HwCap::HwRoi(components.roi.clone()));
        }
        cap_list.push(HwCap::Sync(components.sync.clone()));
        cap_list.push(HwCap::Saving(components.saving.clone()));
        cap_list.push(HwCap::Event(components.event.clone()));
        cap_list.push(HwCap::Buffer(components.stream.buffer_ctrl()));
        cap_list.push(HwCap::Decompression(components.decompress.clone()));

        tracing::info!(
            has_hw_roi,
            nb_caps = cap_list.len(),
            "EigerInterface: capability list built"
        );

        Ok(Self {
            camera: components.camera,
            roi: components.roi,
            saving: components.saving,
            stream: components.stream,
            decompress: components.decompress,
            cap_list,
            has_hw_roi,
            config,
        })
    }

    /// Ordered capability handles for host discovery.
    pub fn cap_list(&self) -> &[HwCap] {
        &self.cap_list
    }

    /// Capability tags, in registry order.
    pub fn capabilities(&self) -> Vec<Capability> {
        self.cap_list.iter().map(HwCap::kind).collect()
    }

    /// Prepare the next acquisition: select the data path, clean up after any
    /// previous run, and arm the selected path.
    ///
    /// On failure past the point where the camera has been prepared, the
    /// saving session and the stream transport are stopped best-effort before
    /// the original error is returned.
    pub async fn prepare_acq(&self) -> EigerResult<()> {
        let use_filewriter = self.saving.is_active().await;
        tracing::debug!(use_filewriter, "EigerInterface: preparing acquisition");

        let status = self
            .camera
            .status()
            .await
            .map_err(|e| EigerError::Camera(e.to_string()))?;
        if status == DetectorStatus::Armed {
            self.camera
                .disarm()
                .await
                .map_err(|e| EigerError::Camera(e.to_string()))?;
            // Disarm finalizes the open DCU file when hw saving was in use;
            // the storage clear below must not run before finalization
            // completes or it truncates that file.
            if use_filewriter {
                tracing::debug!(
                    guard = ?self.config.disarm_guard,
                    "EigerInterface: waiting out file finalization after disarm"
                );
                sleep(self.config.disarm_guard).await;
            }
        }

        // A previously aborted acquisition can leave its last file on the
        // DCU; with an identical prefix the new acquisition would transfer
        // the stale file again.
        if use_filewriter {
            self.camera
                .delete_memory_files()
                .await
                .map_err(|e| EigerError::Camera(e.to_string()))?;
        }

        // The live-stream path and decompression are enabled exactly when
        // on-detector saving is not; the two flags never diverge.
        self.stream.set_active(!use_filewriter).await;
        self.decompress.set_active(!use_filewriter).await;

        self.stream.reset_statistics().await;

        match self.prepare_camera_and_arm(use_filewriter).await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "EigerInterface: prepare failed, rolling back data-path state"
                );
                if let Err(e) = self.saving.stop().await {
                    tracing::warn!("EigerInterface: rollback saving stop failed: {e}");
                }
                if let Err(e) = self.stream.stop().await {
                    tracing::warn!("EigerInterface: rollback stream stop failed: {e}");
                }
                Err(err)
            }
        }
    }

    /// Fallible tail of prepare: camera-level prepare, serie-id propagation
    /// and, on the stream path, the armed handshake.
    async fn prepare_camera_and_arm(&self, use_filewriter: bool) -> EigerResult<()> {
        self.camera
            .prepare_acq()
            .await
            .map_err(|e| EigerError::Camera(e.to_string()))?;

        let serie_id = self
            .camera
            .serie_id()
            .await
            .map_err(|e| EigerError::Camera(e.to_string()))?;
        self.saving
            .set_serie_id(serie_id)
            .await
            .map_err(|e| EigerError::Saving(e.to_string()))?;

        if !use_filewriter {
            let timeout = self.config.stream_arm_timeout;
            self.stream
                .wait_armed(timeout)
                .await
                .map_err(|e| EigerError::StreamArmTimeout {
                    timeout,
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }

    /// Start the acquisition.
    ///
    /// Data retrieval (saving session or stream reception) is launched only on
    /// the first call of a multi-trigger sequence; subsequent sub-trigger
    /// calls leave it running. Exactly one of the two paths is started, then
    /// the camera-level start is always issued.
    pub async fn start_acq(&self) -> EigerResult<()> {
        let trig_mode = self
            .camera
            .trig_mode()
            .await
            .map_err(|e| EigerError::Camera(e.to_string()))?;
        let nb_trig_frames = self
            .camera
            .nb_triggered_frames()
            .await
            .map_err(|e| EigerError::Camera(e.to_string()))?;

        let first_start = !trig_mode.is_internal_multi() || nb_trig_frames == 0;
        if first_start {
            if self.saving.is_active().await {
                tracing::debug!("EigerInterface: starting saving session");
                self.saving
                    .start()
                    .await
                    .map_err(|e| EigerError::Saving(e.to_string()))?;
            } else {
                tracing::debug!("EigerInterface: starting stream reception");
                self.stream
                    .start()
                    .await
                    .map_err(|e| EigerError::Stream(e.to_string()))?;
            }
        } else {
            tracing::debug!(
                nb_trig_frames,
                "EigerInterface: sub-trigger start, data retrieval already running"
            );
        }

        self.camera
            .start_acq()
            .await
            .map_err(|e| EigerError::Camera(e.to_string()))
    }

    /// Stop the acquisition: camera, saving session, stream, in that order.
    ///
    /// Best-effort and idempotent; each stop is issued regardless of earlier
    /// failures, which are logged and swallowed.
    pub async fn stop_acq(&self) {
        if let Err(e) = self.camera.stop_acq().await {
            tracing::warn!("EigerInterface: camera stop failed: {e}");
        }
        if let Err(e) = self.saving.stop().await {
            tracing::warn!("EigerInterface: saving stop failed: {e}");
        }
        if let Err(e) = self.stream.stop().await {
            tracing::warn!("EigerInterface: stream stop failed: {e}");
        }
    }

    /// Reset the interface to a safe idle state by stopping the acquisition.
    pub async fn reset(&self) {
        self.stop_acq().await;
    }

    /// Composite acquisition status, derived fresh from the sub-component
    /// states on every call.
    pub async fn status(&self) -> EigerResult<CompositeStatus> {
        let snapshot = self.snapshot().await?;
        let status = derive_status(&snapshot);
        tracing::trace!(?snapshot, ?status, "EigerInterface: status derived");
        Ok(status)
    }

    /// Gather the current sub-component states. Only short reads; never holds
    /// a lock the acquisition path needs for long.
    async fn snapshot(&self) -> EigerResult<StatusSnapshot> {
        let detector = self
            .camera
            .status()
            .await
            .map_err(|e| EigerError::Camera(e.to_string()))?;
        let trig_mode = self
            .camera
            .trig_mode()
            .await
            .map_err(|e| EigerError::Camera(e.to_string()))?;
        let nb_frames = self
            .camera
            .nb_frames()
            .await
            .map_err(|e| EigerError::Camera(e.to_string()))?;
        let nb_triggered_frames = self
            .camera
            .nb_triggered_frames()
            .await
            .map_err(|e| EigerError::Camera(e.to_string()))?;

        Ok(StatusSnapshot {
            detector,
            trig_mode,
            nb_frames,
            nb_triggered_frames,
            saving_active: self.saving.is_active().await,
            saving_status: self.saving.status().await,
            stream_running: self.stream.is_running().await,
        })
    }

    // =========================================================================
    // Query passthroughs
    // =========================================================================

    /// Frames the hardware has acquired in the current acquisition.
    pub async fn nb_hw_acquired_frames(&self) -> EigerResult<usize> {
        self.camera
            .nb_hw_acquired_frames()
            .await
            .map_err(|e| EigerError::Camera(e.to_string()))
    }

    /// Shape of the most recently streamed frame.
    pub async fn last_stream_info(&self) -> EigerResult<StreamInfo> {
        self.stream
            .last_info()
            .await
            .map_err(|e| EigerError::Stream(e.to_string()))
    }

    /// Latch the stream transfer counters, optionally resetting them.
    pub async fn latch_stream_statistics(&self, reset: bool) -> EigerResult<StreamStatistics> {
        self.stream
            .latch_statistics(reset)
            .await
            .map_err(|e| EigerError::Stream(e.to_string()))
    }

    /// Whether the attached model supports hardware ROI (probed once at
    /// construction).
    pub fn has_hw_roi_support(&self) -> bool {
        self.has_hw_roi
    }

    /// Hardware ROI patterns the firmware offers.
    pub async fn supported_hw_rois(&self) -> EigerResult<Vec<RoiPattern>> {
        self.roi
            .supported_hw_rois()
            .await
            .map_err(|e| EigerError::Camera(e.to_string()))
    }

    /// Model size designation ("1M", "4M", "9M", "16M", ...).
    pub async fn model_size(&self) -> EigerResult<String> {
        self.roi
            .model_size()
            .await
            .map_err(|e| EigerError::Camera(e.to_string()))
    }

    /// Guard/timeout configuration in effect.
    pub fn config(&self) -> &EigerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_snapshot() -> StatusSnapshot {
        StatusSnapshot {
            detector: DetectorStatus::Ready,
            trig_mode: TriggerMode::Internal,
            nb_frames: 10,
            nb_triggered_frames: 10,
            saving_active: false,
            saving_status: SavingStatus::Idle,
            stream_running: false,
        }
    }

    #[test]
    fn test_raw_states_map_directly() {
        let mut s = ready_snapshot();

        s.detector = DetectorStatus::Exposure;
        assert_eq!(derive_status(&s), CompositeStatus::Exposure);

        s.detector = DetectorStatus::Armed;
        assert_eq!(derive_status(&s), CompositeStatus::Ready);

        s.detector = DetectorStatus::Fault;
        assert_eq!(derive_status(&s), CompositeStatus::Fault);

        s.detector = DetectorStatus::Initializing;
        assert_eq!(derive_status(&s), CompositeStatus::Config);
    }

    #[test]
    fn test_ready_multi_trigger_in_progress_wins_over_data_path() {
        let mut s = ready_snapshot();
        s.trig_mode = TriggerMode::InternalMulti;
        s.nb_triggered_frames = 3;

        // Even a running saving session or stream reports Ready while the
        // sequence waits for its next trigger.
        s.saving_active = true;
        s.saving_status = SavingStatus::Running;
        assert_eq!(derive_status(&s), CompositeStatus::Ready);

        s.saving_active = false;
        s.stream_running = true;
        assert_eq!(derive_status(&s), CompositeStatus::Ready);
    }

    #[test]
    fn test_ready_multi_trigger_complete_falls_through() {
        let mut s = ready_snapshot();
        s.trig_mode = TriggerMode::InternalMulti;
        s.nb_triggered_frames = s.nb_frames;
        s.saving_active = true;
        s.saving_status = SavingStatus::Running;
        assert_eq!(derive_status(&s), CompositeStatus::Readout);
    }

    #[test]
    fn test_ready_saving_active_substatus_mapping() {
        let mut s = ready_snapshot();
        s.saving_active = true;

        s.saving_status = SavingStatus::Idle;
        assert_eq!(derive_status(&s), CompositeStatus::Ready);

        s.saving_status = SavingStatus::Running;
        assert_eq!(derive_status(&s), CompositeStatus::Readout);

        s.saving_status = SavingStatus::Error;
        assert_eq!(derive_status(&s), CompositeStatus::Fault);
    }

    #[test]
    fn test_ready_stream_path_mapping() {
        let mut s = ready_snapshot();

        s.stream_running = true;
        assert_eq!(derive_status(&s), CompositeStatus::Readout);

        s.stream_running = false;
        assert_eq!(derive_status(&s), CompositeStatus::Ready);
    }

    #[test]
    fn test_saving_active_ignores_stream_state() {
        let mut s = ready_snapshot();
        s.saving_active = true;
        s.saving_status = SavingStatus::Idle;
        // Stream flag must be irrelevant on the saving path.
        s.stream_running = true;
        assert_eq!(derive_status(&s), CompositeStatus::Ready);
    }

    #[test]
    fn test_non_multi_modes_never_report_in_progress() {
        for mode in [
            TriggerMode::Internal,
            TriggerMode::External,
            TriggerMode::ExternalGate,
        ] {
            let mut s = ready_snapshot();
            s.trig_mode = mode;
            s.nb_triggered_frames = 0; // would be "in progress" under InternalMulti
            s.stream_running = true;
            assert_eq!(
                derive_status(&s),
                CompositeStatus::Readout,
                "mode {mode:?} must not gate on triggered-frame count"
            );
        }
    }
}
