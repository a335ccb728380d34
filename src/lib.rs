//! Dectris Eiger detector driver.
//!
//! This crate is the hardware-abstraction plugin between a generic
//! acquisition framework and the Eiger family of photon-counting pixel
//! detectors. The detector exposes an HTTP-like control API plus a compressed
//! binary image stream, and offers two mutually exclusive data paths per
//! acquisition:
//!
//! - **on-detector saving** — firmware writes frames to DCU-internal storage,
//! - **live stream** — compressed frames are pushed to the host transport and
//!   decompressed host-side.
//!
//! [`interface::EigerInterface`] is the core: it translates the generic verbs
//! (prepare/start/stop/status) into the detector's control sequence, selects
//! the data path at prepare time, derives the composite acquisition status on
//! every query, and exposes the detector subsystems through an ordered list
//! of capability handles built once at construction.
//!
//! Collaborators (camera protocol, stream wire format, decompression, saving
//! internals) are consumed as capability traits — small, async, `Send + Sync`
//! contracts in the style of the rest of the driver crates — so the interface
//! logic is testable against the in-crate mocks.
//!
//! # Example
//!
//! ```rust,ignore
//! use daq_driver_eiger::config::EigerConfig;
//! use daq_driver_eiger::interface::EigerInterface;
//! use daq_driver_eiger::mock::MockRig;
//!
//! let rig = MockRig::new();
//! let interface = EigerInterface::new(rig.components(), EigerConfig::default()).await?;
//!
//! interface.prepare_acq().await?;
//! interface.start_acq().await?;
//! let status = interface.status().await?;
//! interface.stop_acq().await;
//! ```

pub mod camera;
pub mod capability;
pub mod config;
pub mod decompress;
pub mod error;
pub mod interface;
pub mod saving;
pub mod stream;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use camera::{CameraControl, DetectorStatus, TriggerMode};
pub use capability::{Capability, HwCap, Roi, RoiPattern};
pub use config::EigerConfig;
pub use decompress::FrameDecompressor;
pub use error::{EigerError, EigerResult};
pub use interface::{derive_status, CompositeStatus, EigerComponents, EigerInterface, StatusSnapshot};
pub use saving::{FileWriter, SavingStatus};
pub use stream::{StreamInfo, StreamStatistics, StreamTransport};
