//! Mock detector collaborators for testing and simulation.
//!
//! Deterministic in-memory stand-ins for the camera, file writer, stream
//! transport and the smaller capability objects. Every mutating call is
//! appended to a shared [`OpLog`] with its (possibly paused) tokio timestamp,
//! so tests can assert ordering and guard delays without real hardware.
//! Failure injection is per-operation via `fail_*` flags.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::time::{sleep, Instant};

use crate::camera::{CameraControl, DetectorStatus, TriggerMode};
use crate::capability::{
    BufferControl, DetectorEvent, DetectorInfo, EventSource, HwRoiControl, Roi, RoiPattern,
    SyncControl,
};
use crate::decompress::FrameDecompressor;
use crate::interface::EigerComponents;
use crate::saving::{FileWriter, SavingStatus};
use crate::stream::{StreamInfo, StreamStatistics, StreamTransport};

// =============================================================================
// Operation Log
// =============================================================================

/// One recorded collaborator operation.
#[derive(Debug, Clone)]
pub struct OpRecord {
    /// Operation name, e.g. `"camera.disarm"`.
    pub op: &'static str,
    /// Tokio clock timestamp at the time of the call.
    pub at: Instant,
}

/// Shared, ordered log of collaborator operations.
#[derive(Clone, Default)]
pub struct OpLog {
    inner: Arc<Mutex<Vec<OpRecord>>>,
}

impl OpLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operation with the current tokio timestamp.
    pub async fn record(&self, op: &'static str) {
        self.inner.lock().await.push(OpRecord {
            op,
            at: Instant::now(),
        });
    }

    /// All recorded operation names, in call order.
    pub async fn ops(&self) -> Vec<&'static str> {
        self.inner.lock().await.iter().map(|r| r.op).collect()
    }

    /// Full records, in call order.
    pub async fn records(&self) -> Vec<OpRecord> {
        self.inner.lock().await.clone()
    }

    /// Timestamp of the first occurrence of `op`.
    pub async fn time_of(&self, op: &str) -> Option<Instant> {
        self.inner
            .lock()
            .await
            .iter()
            .find(|r| r.op == op)
            .map(|r| r.at)
    }

    /// Position of the first occurrence of `op`.
    pub async fn index_of(&self, op: &str) -> Option<usize> {
        self.inner.lock().await.iter().position(|r| r.op == op)
    }

    /// Number of occurrences of `op`.
    pub async fn count(&self, op: &str) -> usize {
        self.inner.lock().await.iter().filter(|r| r.op == op).count()
    }

    /// Drop all records.
    pub async fn clear(&self) {
        self.inner.lock().await.clear();
    }
}

// =============================================================================
// MockCamera
// =============================================================================

/// Simulated detector control channel.
pub struct MockCamera {
    status: Mutex<DetectorStatus>,
    trig_mode: Mutex<TriggerMode>,
    nb_frames: AtomicUsize,
    nb_triggered: AtomicUsize,
    nb_acquired: AtomicUsize,
    serie_id: AtomicI64,
    fail_prepare: AtomicBool,
    fail_stop: AtomicBool,
    log: OpLog,
}

impl MockCamera {
    /// New camera in `Ready` state with internal triggering.
    pub fn new(log: OpLog) -> Self {
        Self {
            status: Mutex::new(DetectorStatus::Ready),
            trig_mode: Mutex::new(TriggerMode::Internal),
            nb_frames: AtomicUsize::new(1),
            nb_triggered: AtomicUsize::new(0),
            nb_acquired: AtomicUsize::new(0),
            serie_id: AtomicI64::new(1),
            fail_prepare: AtomicBool::new(false),
            fail_stop: AtomicBool::new(false),
            log,
        }
    }

    /// Force the reported detector state.
    pub async fn set_status(&self, status: DetectorStatus) {
        *self.status.lock().await = status;
    }

    /// Configure the trigger mode.
    pub async fn set_trig_mode(&self, mode: TriggerMode) {
        *self.trig_mode.lock().await = mode;
    }

    /// Configure the total frame count.
    pub fn set_nb_frames(&self, nb: usize) {
        self.nb_frames.store(nb, Ordering::SeqCst);
    }

    /// Configure the triggered-frame counter.
    pub fn set_nb_triggered_frames(&self, nb: usize) {
        self.nb_triggered.store(nb, Ordering::SeqCst);
    }

    /// Configure the hardware-acquired frame counter.
    pub fn set_nb_hw_acquired_frames(&self, nb: usize) {
        self.nb_acquired.store(nb, Ordering::SeqCst);
    }

    /// Configure the serie id returned after prepare.
    pub fn set_serie_id(&self, id: i64) {
        self.serie_id.store(id, Ordering::SeqCst);
    }

    /// Make `prepare_acq` fail.
    pub fn set_fail_prepare(&self, fail: bool) {
        self.fail_prepare.store(fail, Ordering::SeqCst);
    }

    /// Make `stop_acq` fail.
    pub fn set_fail_stop(&self, fail: bool) {
        self.fail_stop.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CameraControl for MockCamera {
    async fn status(&self) -> Result<DetectorStatus> {
        Ok(*self.status.lock().await)
    }

    async fn arm(&self) -> Result<()> {
        self.log.record("camera.arm").await;
        *self.status.lock().await = DetectorStatus::Armed;
        Ok(())
    }

    async fn disarm(&self) -> Result<()> {
        self.log.record("camera.disarm").await;
        *self.status.lock().await = DetectorStatus::Ready;
        Ok(())
    }

    async fn prepare_acq(&self) -> Result<()> {
        self.log.record("camera.prepare").await;
        if self.fail_prepare.load(Ordering::SeqCst) {
            bail!("MockCamera: injected prepare failure");
        }
        Ok(())
    }

    async fn start_acq(&self) -> Result<()> {
        self.log.record("camera.start").await;
        Ok(())
    }

    async fn stop_acq(&self) -> Result<()> {
        self.log.record("camera.stop").await;
        if self.fail_stop.load(Ordering::SeqCst) {
            bail!("MockCamera: injected stop failure");
        }
        Ok(())
    }

    async fn trig_mode(&self) -> Result<TriggerMode> {
        Ok(*self.trig_mode.lock().await)
    }

    async fn nb_frames(&self) -> Result<usize> {
        Ok(self.nb_frames.load(Ordering::SeqCst))
    }

    async fn nb_triggered_frames(&self) -> Result<usize> {
        Ok(self.nb_triggered.load(Ordering::SeqCst))
    }

    async fn nb_hw_acquired_frames(&self) -> Result<usize> {
        Ok(self.nb_acquired.load(Ordering::SeqCst))
    }

    async fn serie_id(&self) -> Result<i64> {
        Ok(self.serie_id.load(Ordering::SeqCst))
    }

    async fn delete_memory_files(&self) -> Result<()> {
        self.log.record("camera.delete_files").await;
        Ok(())
    }
}

// =============================================================================
// MockFileWriter
// =============================================================================

/// Simulated on-detector saving session.
pub struct MockFileWriter {
    active: AtomicBool,
    status: Mutex<SavingStatus>,
    serie_id: AtomicI64,
    fail_start: AtomicBool,
    fail_stop: AtomicBool,
    log: OpLog,
}

impl MockFileWriter {
    /// New inactive writer in `Idle` state.
    pub fn new(log: OpLog) -> Self {
        Self {
            active: AtomicBool::new(false),
            status: Mutex::new(SavingStatus::Idle),
            serie_id: AtomicI64::new(0),
            fail_start: AtomicBool::new(false),
            fail_stop: AtomicBool::new(false),
            log,
        }
    }

    /// Configure on-detector saving active (selects the data path).
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    /// Force the reported session state.
    pub async fn set_status(&self, status: SavingStatus) {
        *self.status.lock().await = status;
    }

    /// Serie id most recently pushed by the interface.
    pub fn serie_id(&self) -> i64 {
        self.serie_id.load(Ordering::SeqCst)
    }

    /// Make `start` fail.
    pub fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Make `stop` fail (after being recorded).
    pub fn set_fail_stop(&self, fail: bool) {
        self.fail_stop.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl FileWriter for MockFileWriter {
    async fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn start(&self) -> Result<()> {
        self.log.record("saving.start").await;
        if self.fail_start.load(Ordering::SeqCst) {
            bail!("MockFileWriter: injected start failure");
        }
        *self.status.lock().await = SavingStatus::Running;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.log.record("saving.stop").await;
        if self.fail_stop.load(Ordering::SeqCst) {
            bail!("MockFileWriter: injected stop failure");
        }
        *self.status.lock().await = SavingStatus::Idle;
        Ok(())
    }

    async fn status(&self) -> SavingStatus {
        *self.status.lock().await
    }

    async fn set_serie_id(&self, serie_id: i64) -> Result<()> {
        self.log.record("saving.set_serie_id").await;
        self.serie_id.store(serie_id, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// MockStream
// =============================================================================

/// Simulated compressed-stream transport.
pub struct MockStream {
    active: AtomicBool,
    running: AtomicBool,
    arm_ok: AtomicBool,
    fail_start: AtomicBool,
    fail_stop: AtomicBool,
    stats_resets: AtomicUsize,
    last_info: Mutex<StreamInfo>,
    stats: Mutex<StreamStatistics>,
    buffer: Arc<MockBufferControl>,
    log: OpLog,
}

impl MockStream {
    /// New inactive transport whose armed handshake succeeds immediately.
    pub fn new(log: OpLog) -> Self {
        Self {
            active: AtomicBool::new(false),
            running: AtomicBool::new(false),
            arm_ok: AtomicBool::new(true),
            fail_start: AtomicBool::new(false),
            fail_stop: AtomicBool::new(false),
            stats_resets: AtomicUsize::new(0),
            last_info: Mutex::new(StreamInfo::default()),
            stats: Mutex::new(StreamStatistics::default()),
            buffer: Arc::new(MockBufferControl::new()),
            log,
        }
    }

    /// Make `wait_armed` time out instead of succeeding.
    pub fn set_arm_ok(&self, ok: bool) {
        self.arm_ok.store(ok, Ordering::SeqCst);
    }

    /// Make `start` fail.
    pub fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Make `stop` fail (after being recorded).
    pub fn set_fail_stop(&self, fail: bool) {
        self.fail_stop.store(fail, Ordering::SeqCst);
    }

    /// Force the running flag (e.g. to simulate readout in progress).
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    /// Seed the last-frame info returned to queries.
    pub async fn set_last_info(&self, info: StreamInfo) {
        *self.last_info.lock().await = info;
    }

    /// Seed the transfer counters.
    pub async fn set_statistics(&self, stats: StreamStatistics) {
        *self.stats.lock().await = stats;
    }

    /// Number of `reset_statistics` calls seen.
    pub fn stats_reset_count(&self) -> usize {
        self.stats_resets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamTransport for MockStream {
    async fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    async fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn start(&self) -> Result<()> {
        self.log.record("stream.start").await;
        if self.fail_start.load(Ordering::SeqCst) {
            bail!("MockStream: injected start failure");
        }
        // Inactive transport ignores start, mirroring the real transport.
        if self.active.load(Ordering::SeqCst) {
            self.running.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.log.record("stream.stop").await;
        self.running.store(false, Ordering::SeqCst);
        if self.fail_stop.load(Ordering::SeqCst) {
            bail!("MockStream: injected stop failure");
        }
        Ok(())
    }

    async fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn wait_armed(&self, timeout: Duration) -> Result<()> {
        self.log.record("stream.wait_armed").await;
        if self.arm_ok.load(Ordering::SeqCst) {
            Ok(())
        } else {
            sleep(timeout).await;
            bail!("MockStream: armed event not received");
        }
    }

    async fn reset_statistics(&self) {
        self.log.record("stream.reset_stats").await;
        self.stats_resets.fetch_add(1, Ordering::SeqCst);
        *self.stats.lock().await = StreamStatistics::default();
    }

    async fn last_info(&self) -> Result<StreamInfo> {
        Ok(self.last_info.lock().await.clone())
    }

    async fn latch_statistics(&self, reset: bool) -> Result<StreamStatistics> {
        let mut stats = self.stats.lock().await;
        let latched = *stats;
        if reset {
            *stats = StreamStatistics::default();
        }
        Ok(latched)
    }

    fn buffer_ctrl(&self) -> Arc<dyn BufferControl> {
        self.buffer.clone()
    }
}

// =============================================================================
// Small capability mocks
// =============================================================================

/// Simulated decompression stage: just the activation flag.
#[derive(Default)]
pub struct MockDecompressor {
    active: AtomicBool,
}

impl MockDecompressor {
    /// New inactive decompressor.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FrameDecompressor for MockDecompressor {
    async fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    async fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Static detector identity for tests.
pub struct MockDetectorInfo {
    model: String,
    size: (u32, u32),
    pixel_um: (f64, f64),
    bit_depth: u32,
}

impl MockDetectorInfo {
    /// A 4M-geometry detector.
    pub fn new() -> Self {
        Self {
            model: "Eiger2 4M".to_string(),
            size: (2068, 2162),
            pixel_um: (75.0, 75.0),
            bit_depth: 16,
        }
    }
}

impl Default for MockDetectorInfo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DetectorInfo for MockDetectorInfo {
    async fn model(&self) -> Result<String> {
        Ok(self.model.clone())
    }

    async fn detector_size(&self) -> Result<(u32, u32)> {
        Ok(self.size)
    }

    async fn pixel_size_um(&self) -> Result<(f64, f64)> {
        Ok(self.pixel_um)
    }

    async fn bit_depth(&self) -> Result<u32> {
        Ok(self.bit_depth)
    }
}

/// Exposure store for the sync capability.
#[derive(Default)]
pub struct MockSyncControl {
    exposure_s: Mutex<f64>,
}

impl MockSyncControl {
    /// New sync object with zero exposure.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncControl for MockSyncControl {
    async fn set_exposure(&self, seconds: f64) -> Result<()> {
        if seconds <= 0.0 {
            bail!("MockSyncControl: exposure must be positive");
        }
        *self.exposure_s.lock().await = seconds;
        Ok(())
    }

    async fn exposure(&self) -> Result<f64> {
        Ok(*self.exposure_s.lock().await)
    }
}

/// Broadcast-backed detector event source.
pub struct MockEventSource {
    tx: broadcast::Sender<DetectorEvent>,
}

impl MockEventSource {
    /// New source with a small event buffer.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Publish an event to all subscribers.
    pub fn emit(&self, event: DetectorEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for MockEventSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSource for MockEventSource {
    async fn subscribe(&self) -> broadcast::Receiver<DetectorEvent> {
        self.tx.subscribe()
    }
}

/// Frame buffer pool stand-in.
pub struct MockBufferControl {
    nb: AtomicUsize,
}

impl MockBufferControl {
    /// New pool with a default of 16 buffers.
    pub fn new() -> Self {
        Self {
            nb: AtomicUsize::new(16),
        }
    }
}

impl Default for MockBufferControl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BufferControl for MockBufferControl {
    async fn nb_buffers(&self) -> Result<usize> {
        Ok(self.nb.load(Ordering::SeqCst))
    }

    async fn set_nb_buffers(&self, nb: usize) -> Result<()> {
        if nb == 0 {
            bail!("MockBufferControl: at least one buffer is required");
        }
        self.nb.store(nb, Ordering::SeqCst);
        Ok(())
    }
}

/// Hardware-ROI capability with configurable support.
pub struct MockRoiControl {
    supported: bool,
    patterns: Vec<RoiPattern>,
    model_size: String,
}

impl MockRoiControl {
    /// A model with hardware-ROI support and one 4M pattern.
    pub fn with_support() -> Self {
        Self {
            supported: true,
            patterns: vec![RoiPattern {
                name: "4M-L".to_string(),
                roi: Roi {
                    x: 0,
                    y: 0,
                    width: 2068,
                    height: 2162,
                },
            }],
            model_size: "16M".to_string(),
        }
    }

    /// A model without hardware-ROI support.
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            patterns: Vec::new(),
            model_size: "4M".to_string(),
        }
    }
}

#[async_trait]
impl HwRoiControl for MockRoiControl {
    async fn has_hw_roi_support(&self) -> Result<bool> {
        Ok(self.supported)
    }

    async fn supported_hw_rois(&self) -> Result<Vec<RoiPattern>> {
        Ok(self.patterns.clone())
    }

    async fn model_size(&self) -> Result<String> {
        Ok(self.model_size.clone())
    }
}

// =============================================================================
// MockRig
// =============================================================================

/// A full set of mock collaborators sharing one [`OpLog`].
pub struct MockRig {
    /// Detector control channel.
    pub camera: Arc<MockCamera>,
    /// On-detector saving session.
    pub saving: Arc<MockFileWriter>,
    /// Stream transport.
    pub stream: Arc<MockStream>,
    /// Decompression stage.
    pub decompress: Arc<MockDecompressor>,
    /// Hardware-ROI control.
    pub roi: Arc<MockRoiControl>,
    /// Detector identity.
    pub det_info: Arc<MockDetectorInfo>,
    /// Exposure/timing control.
    pub sync: Arc<MockSyncControl>,
    /// Detector event source.
    pub event: Arc<MockEventSource>,
    /// Shared operation log.
    pub log: OpLog,
}

impl MockRig {
    /// Rig against a model with hardware-ROI support.
    pub fn new() -> Self {
        Self::with_roi(MockRoiControl::with_support())
    }

    /// Rig against a model without hardware-ROI support.
    pub fn without_hw_roi() -> Self {
        Self::with_roi(MockRoiControl::unsupported())
    }

    fn with_roi(roi: MockRoiControl) -> Self {
        let log = OpLog::new();
        Self {
            camera: Arc::new(MockCamera::new(log.clone())),
            saving: Arc::new(MockFileWriter::new(log.clone())),
            stream: Arc::new(MockStream::new(log.clone())),
            decompress: Arc::new(MockDecompressor::new()),
            roi: Arc::new(roi),
            det_info: Arc::new(MockDetectorInfo::new()),
            sync: Arc::new(MockSyncControl::new()),
            event: Arc::new(MockEventSource::new()),
            log,
        }
    }

    /// Capability bag for constructing an interface over this rig.
    pub fn components(&self) -> EigerComponents {
        EigerComponents {
            camera: self.camera.clone(),
            det_info: self.det_info.clone(),
            roi: self.roi.clone(),
            sync: self.sync.clone(),
            saving: self.saving.clone(),
            event: self.event.clone(),
            stream: self.stream.clone(),
            decompress: self.decompress.clone(),
        }
    }
}

impl Default for MockRig {
    fn default() -> Self {
        Self::new()
    }
}
