//! Lifecycle tests for the Eiger interface over the mock collaborators.
//!
//! Covers data-path selection, the disarm guard ordering, rollback on prepare
//! failure, multi-trigger start gating, best-effort stop and the composite
//! status decision table as seen through the public API.

use std::time::Duration;

use daq_driver_eiger::capability::Capability;
use daq_driver_eiger::config::EigerConfig;
use daq_driver_eiger::interface::{CompositeStatus, EigerInterface};
use daq_driver_eiger::mock::MockRig;
use daq_driver_eiger::saving::{FileWriter, SavingStatus};
use daq_driver_eiger::stream::{StreamInfo, StreamStatistics, StreamTransport};
use daq_driver_eiger::{DetectorStatus, EigerError, FrameDecompressor, TriggerMode};
use tokio_test::assert_ok;

async fn build(rig: &MockRig) -> EigerInterface {
    EigerInterface::new(rig.components(), EigerConfig::default())
        .await
        .expect("interface construction")
}

// =============================================================================
// prepare_acq: data-path selection
// =============================================================================

#[tokio::test]
async fn test_prepare_stream_path_enables_stream_and_decompress() {
    let rig = MockRig::new();
    let interface = build(&rig).await;

    assert_ok!(interface.prepare_acq().await);

    assert!(rig.stream.is_active().await);
    assert!(rig.decompress.is_active().await);
    assert_eq!(rig.stream.stats_reset_count(), 1);
    // Stream path performs the armed handshake.
    assert_eq!(rig.log.count("stream.wait_armed").await, 1);
    // Serie id propagated to the file writer even on the stream path.
    rig.camera.set_serie_id(7);
    assert_ok!(interface.prepare_acq().await);
    assert_eq!(rig.saving.serie_id(), 7);
}

#[tokio::test]
async fn test_prepare_saving_path_disables_stream_and_decompress() {
    let rig = MockRig::new();
    rig.saving.set_active(true);
    // Flags left over from a previous stream-path acquisition.
    rig.stream.set_active(true).await;
    rig.decompress.set_active(true).await;
    let interface = build(&rig).await;

    assert_ok!(interface.prepare_acq().await);

    assert!(!rig.stream.is_active().await);
    assert!(!rig.decompress.is_active().await);
    // Stale DCU files are cleared, no armed handshake on this path.
    assert_eq!(rig.log.count("camera.delete_files").await, 1);
    assert_eq!(rig.log.count("stream.wait_armed").await, 0);
    // Statistics are reset regardless of the path.
    assert_eq!(rig.stream.stats_reset_count(), 1);
}

#[tokio::test]
async fn test_prepare_flags_never_diverge() {
    let rig = MockRig::new();
    let interface = build(&rig).await;

    for saving_active in [true, false, true, false] {
        rig.saving.set_active(saving_active);
        assert_ok!(interface.prepare_acq().await);
        assert_eq!(
            rig.stream.is_active().await,
            rig.decompress.is_active().await,
            "stream and decompress activation must always match"
        );
        assert_eq!(rig.stream.is_active().await, !saving_active);
    }
}

// =============================================================================
// prepare_acq: disarm guard
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_prepare_guard_elapses_between_disarm_and_storage_clear() {
    let rig = MockRig::new();
    rig.saving.set_active(true);
    rig.camera.set_status(DetectorStatus::Armed).await;
    let interface = build(&rig).await;

    assert_ok!(interface.prepare_acq().await);

    let disarm_at = rig.log.time_of("camera.disarm").await.expect("disarm");
    let delete_at = rig
        .log
        .time_of("camera.delete_files")
        .await
        .expect("delete");
    assert!(
        rig.log.index_of("camera.disarm").await < rig.log.index_of("camera.delete_files").await
    );
    assert!(
        delete_at - disarm_at >= Duration::from_secs(2),
        "finalize guard must elapse before the storage clear, got {:?}",
        delete_at - disarm_at
    );
}

#[tokio::test(start_paused = true)]
async fn test_prepare_armed_without_saving_skips_guard_and_clear() {
    let rig = MockRig::new();
    rig.camera.set_status(DetectorStatus::Armed).await;
    let interface = build(&rig).await;

    let before = tokio::time::Instant::now();
    assert_ok!(interface.prepare_acq().await);

    assert_eq!(rig.log.count("camera.disarm").await, 1);
    assert_eq!(rig.log.count("camera.delete_files").await, 0);
    assert_eq!(
        tokio::time::Instant::now() - before,
        Duration::ZERO,
        "stream path must not pay the finalize guard"
    );
}

#[tokio::test]
async fn test_prepare_ready_detector_is_not_disarmed() {
    let rig = MockRig::new();
    let interface = build(&rig).await;

    assert_ok!(interface.prepare_acq().await);
    assert_eq!(rig.log.count("camera.disarm").await, 0);
}

// =============================================================================
// prepare_acq: rollback
// =============================================================================

#[tokio::test]
async fn test_prepare_rollback_on_camera_failure() {
    let rig = MockRig::new();
    rig.camera.set_fail_prepare(true);
    let interface = build(&rig).await;

    let err = interface.prepare_acq().await.unwrap_err();
    assert!(matches!(err, EigerError::Camera(_)), "got {err:?}");

    let ops = rig.log.ops().await;
    let prepare_idx = ops.iter().position(|op| *op == "camera.prepare").unwrap();
    let saving_stop_idx = ops.iter().position(|op| *op == "saving.stop").unwrap();
    let stream_stop_idx = ops.iter().position(|op| *op == "stream.stop").unwrap();
    assert!(saving_stop_idx > prepare_idx);
    assert!(stream_stop_idx > saving_stop_idx, "saving stops before stream");
}

#[tokio::test]
async fn test_prepare_rollback_does_not_mask_original_error() {
    let rig = MockRig::new();
    rig.camera.set_fail_prepare(true);
    rig.saving.set_fail_stop(true);
    rig.stream.set_fail_stop(true);
    let interface = build(&rig).await;

    let err = interface.prepare_acq().await.unwrap_err();
    // Rollback failures are logged, the camera failure surfaces unchanged.
    assert!(err.to_string().contains("injected prepare failure"), "got {err}");
    assert_eq!(rig.log.count("saving.stop").await, 1);
    assert_eq!(rig.log.count("stream.stop").await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_prepare_stream_arm_timeout_is_fatal_and_rolled_back() {
    let rig = MockRig::new();
    rig.stream.set_arm_ok(false);
    let interface = build(&rig).await;

    let err = interface.prepare_acq().await.unwrap_err();
    assert!(
        matches!(
            err,
            EigerError::StreamArmTimeout {
                timeout: t,
                ..
            } if t == Duration::from_secs(5)
        ),
        "got {err:?}"
    );
    assert_eq!(rig.log.count("saving.stop").await, 1);
    assert_eq!(rig.log.count("stream.stop").await, 1);
}

// =============================================================================
// start_acq
// =============================================================================

#[tokio::test]
async fn test_start_stream_path_starts_exactly_the_stream() {
    let rig = MockRig::new();
    let interface = build(&rig).await;

    assert_ok!(interface.prepare_acq().await);
    assert_ok!(interface.start_acq().await);

    assert_eq!(rig.log.count("stream.start").await, 1);
    assert_eq!(rig.log.count("saving.start").await, 0);
    assert_eq!(rig.log.count("camera.start").await, 1);
    assert!(rig.stream.is_running().await);
}

#[tokio::test]
async fn test_start_saving_path_starts_exactly_the_writer() {
    let rig = MockRig::new();
    rig.saving.set_active(true);
    let interface = build(&rig).await;

    assert_ok!(interface.prepare_acq().await);
    assert_ok!(interface.start_acq().await);

    assert_eq!(rig.log.count("saving.start").await, 1);
    assert_eq!(rig.log.count("stream.start").await, 0);
    assert_eq!(rig.log.count("camera.start").await, 1);
    assert_eq!(rig.saving.status().await, SavingStatus::Running);
}

#[tokio::test]
async fn test_start_multi_trigger_only_first_call_starts_retrieval() {
    let rig = MockRig::new();
    rig.camera.set_trig_mode(TriggerMode::InternalMulti).await;
    rig.camera.set_nb_frames(4);
    rig.camera.set_nb_triggered_frames(0);
    let interface = build(&rig).await;

    assert_ok!(interface.prepare_acq().await);
    assert_ok!(interface.start_acq().await);
    assert_eq!(rig.log.count("stream.start").await, 1);

    // Sub-triggers: retrieval keeps running, camera start is still issued.
    for triggered in [1, 2, 3] {
        rig.camera.set_nb_triggered_frames(triggered);
        assert_ok!(interface.start_acq().await);
    }
    assert_eq!(rig.log.count("stream.start").await, 1);
    assert_eq!(rig.log.count("camera.start").await, 4);
}

#[tokio::test]
async fn test_start_non_multi_mode_restarts_retrieval_every_call() {
    let rig = MockRig::new();
    // Non-zero triggered count must not gate outside InternalMulti.
    rig.camera.set_nb_triggered_frames(3);
    let interface = build(&rig).await;

    assert_ok!(interface.prepare_acq().await);
    assert_ok!(interface.start_acq().await);
    assert_ok!(interface.start_acq().await);

    assert_eq!(rig.log.count("stream.start").await, 2);
}

// =============================================================================
// stop_acq / reset
// =============================================================================

#[tokio::test]
async fn test_stop_issues_all_three_stops_in_order() {
    let rig = MockRig::new();
    let interface = build(&rig).await;

    interface.stop_acq().await;

    assert_eq!(
        rig.log.ops().await,
        vec!["camera.stop", "saving.stop", "stream.stop"]
    );
}

#[tokio::test]
async fn test_stop_is_best_effort_when_stops_fail() {
    let rig = MockRig::new();
    rig.camera.set_fail_stop(true);
    rig.saving.set_fail_stop(true);
    let interface = build(&rig).await;

    // Does not propagate errors; later stops still run.
    interface.stop_acq().await;

    assert_eq!(rig.log.count("camera.stop").await, 1);
    assert_eq!(rig.log.count("saving.stop").await, 1);
    assert_eq!(rig.log.count("stream.stop").await, 1);
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let rig = MockRig::new();
    let interface = build(&rig).await;

    assert_ok!(interface.prepare_acq().await);
    assert_ok!(interface.start_acq().await);
    interface.stop_acq().await;
    interface.stop_acq().await;

    assert!(!rig.stream.is_running().await);
    assert_eq!(rig.log.count("stream.stop").await, 2);
}

#[tokio::test]
async fn test_reset_stops_the_acquisition() {
    let rig = MockRig::new();
    let interface = build(&rig).await;

    assert_ok!(interface.prepare_acq().await);
    assert_ok!(interface.start_acq().await);
    interface.reset().await;

    assert!(!rig.stream.is_running().await);
    assert_eq!(rig.log.count("camera.stop").await, 1);
}

// =============================================================================
// Composite status through the public API
// =============================================================================

#[tokio::test]
async fn test_status_stream_running_reports_readout() {
    let rig = MockRig::new();
    rig.stream.set_running(true);
    let interface = build(&rig).await;

    assert_eq!(interface.status().await.unwrap(), CompositeStatus::Readout);
}

#[tokio::test]
async fn test_status_saving_idle_reports_ready() {
    let rig = MockRig::new();
    rig.saving.set_active(true);
    let interface = build(&rig).await;

    assert_eq!(interface.status().await.unwrap(), CompositeStatus::Ready);
}

#[tokio::test]
async fn test_status_saving_running_reports_readout() {
    let rig = MockRig::new();
    rig.saving.set_active(true);
    rig.saving.set_status(SavingStatus::Running).await;
    let interface = build(&rig).await;

    assert_eq!(interface.status().await.unwrap(), CompositeStatus::Readout);
}

#[tokio::test]
async fn test_status_saving_error_reports_fault() {
    let rig = MockRig::new();
    rig.saving.set_active(true);
    rig.saving.set_status(SavingStatus::Error).await;
    let interface = build(&rig).await;

    assert_eq!(interface.status().await.unwrap(), CompositeStatus::Fault);
}

#[tokio::test]
async fn test_status_multi_trigger_in_progress_reports_ready() {
    let rig = MockRig::new();
    rig.camera.set_trig_mode(TriggerMode::InternalMulti).await;
    rig.camera.set_nb_frames(4);
    rig.camera.set_nb_triggered_frames(2);
    rig.stream.set_running(true); // would otherwise be Readout
    let interface = build(&rig).await;

    assert_eq!(interface.status().await.unwrap(), CompositeStatus::Ready);
}

#[tokio::test]
async fn test_status_follows_detector_state() {
    let rig = MockRig::new();
    let interface = build(&rig).await;

    for (detector, expected) in [
        (DetectorStatus::Exposure, CompositeStatus::Exposure),
        (DetectorStatus::Armed, CompositeStatus::Ready),
        (DetectorStatus::Fault, CompositeStatus::Fault),
        (DetectorStatus::Initializing, CompositeStatus::Config),
        (DetectorStatus::Ready, CompositeStatus::Ready),
    ] {
        rig.camera.set_status(detector).await;
        assert_eq!(interface.status().await.unwrap(), expected, "{detector:?}");
    }
}

// =============================================================================
// Capability registry
// =============================================================================

#[tokio::test]
async fn test_registry_order_with_hw_roi() {
    let rig = MockRig::new();
    let interface = build(&rig).await;

    assert!(interface.has_hw_roi_support());
    assert_eq!(
        interface.capabilities(),
        vec![
            Capability::DetectorInfo,
            Capability::HwRoi,
            Capability::Sync,
            Capability::Saving,
            Capability::Event,
            Capability::Buffer,
            Capability::Decompression,
        ]
    );
}

#[tokio::test]
async fn test_registry_omits_roi_when_unsupported() {
    let rig = MockRig::without_hw_roi();
    let interface = build(&rig).await;

    assert!(!interface.has_hw_roi_support());
    assert_eq!(
        interface.capabilities(),
        vec![
            Capability::DetectorInfo,
            Capability::Sync,
            Capability::Saving,
            Capability::Event,
            Capability::Buffer,
            Capability::Decompression,
        ]
    );
}

// =============================================================================
// Query passthroughs
// =============================================================================

#[tokio::test]
async fn test_query_passthroughs_forward_to_sub_objects() {
    let rig = MockRig::new();
    rig.camera.set_nb_hw_acquired_frames(128);
    rig.stream
        .set_last_info(StreamInfo {
            frame_idx: 127,
            encoding: "bs16-lz4<".to_string(),
            width: 2068,
            height: 2162,
            packed_size: 512 * 1024,
        })
        .await;
    rig.stream
        .set_statistics(StreamStatistics {
            nb_frames: 128,
            nb_bytes: 64 * 1024 * 1024,
            elapsed: Duration::from_secs(4),
        })
        .await;
    let interface = build(&rig).await;

    assert_eq!(interface.nb_hw_acquired_frames().await.unwrap(), 128);

    let info = interface.last_stream_info().await.unwrap();
    assert_eq!(info.frame_idx, 127);
    assert_eq!(info.encoding, "bs16-lz4<");

    let stats = interface.latch_stream_statistics(true).await.unwrap();
    assert_eq!(stats.nb_frames, 128);
    // Latch with reset zeroes the counters for the next read.
    let stats = interface.latch_stream_statistics(false).await.unwrap();
    assert_eq!(stats.nb_frames, 0);

    assert_eq!(interface.model_size().await.unwrap(), "16M");
    let rois = interface.supported_hw_rois().await.unwrap();
    assert_eq!(rois.len(), 1);
    assert_eq!(rois[0].name, "4M-L");
}
