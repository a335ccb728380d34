//! Interface configuration.
//!
//! Deserializable from the `[devices.driver]` TOML section the same way the
//! other driver configs are; all fields have defaults so an empty table is a
//! valid configuration.

use crate::error::{EigerError, EigerResult};
use serde::Deserialize;
use std::time::Duration;

/// Configuration for the Eiger acquisition interface.
#[derive(Debug, Clone, Deserialize)]
pub struct EigerConfig {
    /// Guard delay after disarming an armed detector while on-detector saving
    /// is active. Disarm triggers file finalization on the detector control
    /// unit; clearing storage before finalization completes truncates the
    /// just-written file. Uncancellable plain sleep on the prepare path.
    #[serde(default = "default_disarm_guard", with = "humantime_serde")]
    pub disarm_guard: Duration,

    /// Maximum time to wait for the stream transport to report armed during
    /// prepare when the live-stream path is selected.
    #[serde(default = "default_stream_arm_timeout", with = "humantime_serde")]
    pub stream_arm_timeout: Duration,
}

fn default_disarm_guard() -> Duration {
    Duration::from_secs(2)
}

fn default_stream_arm_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Default for EigerConfig {
    fn default() -> Self {
        Self {
            disarm_guard: default_disarm_guard(),
            stream_arm_timeout: default_stream_arm_timeout(),
        }
    }
}

impl EigerConfig {
    /// Validate semantic constraints that pass deserialization.
    pub fn validate(&self) -> EigerResult<()> {
        if self.stream_arm_timeout.is_zero() {
            return Err(EigerError::Configuration(
                "stream_arm_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
