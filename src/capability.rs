//! Capability handles exposed to the host framework.
//!
//! The interface owns one sub-object per detector subsystem and publishes
//! them as an ordered list of [`HwCap`] handles built once at construction.
//! The host discovers what the detector supports by walking the list; the
//! hardware-ROI handle is present only on models that support it.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::decompress::FrameDecompressor;
use crate::saving::FileWriter;

/// Rectangular region of interest in sensor pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// A named hardware-ROI pattern supported by the detector firmware
/// (e.g. "4M-L" on a 16M model).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoiPattern {
    /// Firmware name of the pattern.
    pub name: String,
    /// Readout region the pattern selects.
    pub roi: Roi,
}

/// Capability: static detector identity and geometry.
#[async_trait]
pub trait DetectorInfo: Send + Sync {
    /// Detector model string as reported by the control unit.
    async fn model(&self) -> Result<String>;

    /// Full sensor size in pixels (width, height).
    async fn detector_size(&self) -> Result<(u32, u32)>;

    /// Pixel pitch in micrometers (x, y).
    async fn pixel_size_um(&self) -> Result<(f64, f64)>;

    /// Bits per pixel of the readout.
    async fn bit_depth(&self) -> Result<u32>;
}

/// Capability: exposure and frame timing, driven by the host's sync engine.
#[async_trait]
pub trait SyncControl: Send + Sync {
    /// Set the per-frame exposure time in seconds.
    async fn set_exposure(&self, seconds: f64) -> Result<()>;

    /// Current per-frame exposure time in seconds.
    async fn exposure(&self) -> Result<f64>;
}

/// Severity of an asynchronous detector event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSeverity {
    /// Informational, acquisition continues.
    Info,
    /// Acquisition is compromised.
    Error,
}

/// Asynchronous event published by the detector (link loss, firmware error).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectorEvent {
    /// Event severity.
    pub severity: EventSeverity,
    /// Human-readable description.
    pub message: String,
}

/// Capability: asynchronous detector event reporting.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Subscribe to detector events.
    async fn subscribe(&self) -> broadcast::Receiver<DetectorEvent>;
}

/// Capability: host-side frame buffer management, owned by the stream
/// transport.
#[async_trait]
pub trait BufferControl: Send + Sync {
    /// Number of frame buffers currently allocated.
    async fn nb_buffers(&self) -> Result<usize>;

    /// Resize the buffer pool. Rejected while an acquisition is running.
    async fn set_nb_buffers(&self, nb: usize) -> Result<()>;
}

/// Capability: hardware region-of-interest selection.
///
/// Support depends on the detector model; the interface probes it exactly
/// once at construction and omits the capability handle when unsupported.
#[async_trait]
pub trait HwRoiControl: Send + Sync {
    /// Whether the attached model supports hardware ROI.
    async fn has_hw_roi_support(&self) -> Result<bool>;

    /// Hardware ROI patterns the firmware offers.
    async fn supported_hw_rois(&self) -> Result<Vec<RoiPattern>>;

    /// Model size designation ("1M", "4M", "9M", "16M", ...).
    async fn model_size(&self) -> Result<String>;
}

// =============================================================================
// Capability Enum (Runtime Introspection)
// =============================================================================

/// Runtime capability tags, used to inspect the registry without matching on
/// the handle variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Detector identity and geometry ([`DetectorInfo`])
    DetectorInfo,
    /// Hardware ROI selection ([`HwRoiControl`]); absent on unsupported models
    HwRoi,
    /// Exposure/timing control ([`SyncControl`])
    Sync,
    /// On-detector file saving ([`FileWriter`])
    Saving,
    /// Asynchronous detector events ([`EventSource`])
    Event,
    /// Host-side frame buffers ([`BufferControl`])
    Buffer,
    /// Stream decompression toggle ([`FrameDecompressor`])
    Decompression,
}

impl Capability {
    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::DetectorInfo => "Detector Info",
            Self::HwRoi => "Hardware ROI",
            Self::Sync => "Sync",
            Self::Saving => "Saving",
            Self::Event => "Event",
            Self::Buffer => "Buffer",
            Self::Decompression => "Decompression",
        }
    }
}

// =============================================================================
// Capability Handles
// =============================================================================

/// A single capability handle in the registry.
///
/// Each variant wraps the trait object for one sub-system. The host must not
/// assume any capability beyond [`HwCap::DetectorInfo`] is present except by
/// querying the list; a missing `HwRoi` entry signals that the attached model
/// has no hardware-ROI support.
#[derive(Clone)]
pub enum HwCap {
    /// Detector identity and geometry.
    DetectorInfo(Arc<dyn DetectorInfo>),
    /// Hardware ROI selection.
    HwRoi(Arc<dyn HwRoiControl>),
    /// Exposure/timing control.
    Sync(Arc<dyn SyncControl>),
    /// On-detector file saving.
    Saving(Arc<dyn FileWriter>),
    /// Asynchronous detector events.
    Event(Arc<dyn EventSource>),
    /// Host-side frame buffers.
    Buffer(Arc<dyn BufferControl>),
    /// Stream decompression toggle.
    Decompression(Arc<dyn FrameDecompressor>),
}

impl HwCap {
    /// Tag identifying which capability this handle carries.
    pub fn kind(&self) -> Capability {
        match self {
            Self::DetectorInfo(_) => Capability::DetectorInfo,
            Self::HwRoi(_) => Capability::HwRoi,
            Self::Sync(_) => Capability::Sync,
            Self::Saving(_) => Capability::Saving,
            Self::Event(_) => Capability::Event,
            Self::Buffer(_) => Capability::Buffer,
            Self::Decompression(_) => Capability::Decompression,
        }
    }
}

impl std::fmt::Debug for HwCap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("HwCap").field(&self.kind()).finish()
    }
}
