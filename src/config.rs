//! System configuration parameters
//!
//! All tunable parameters for the thermnode sensor node. The values ship as
//! compile-time defaults; `validate()` is the single place where ranges are
//! checked before the node starts a duty cycle with them.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Fixed upper bound on bound temperature channels. Channel indices are
/// dense and stable for the node's lifetime, so this also sizes the
/// retained-state arrays.
pub const MAX_CHANNELS: usize = 2;

/// Core node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    // --- Reporting ---
    /// Minimum absolute temperature change (Celsius) required before a
    /// reading is transmitted.
    pub report_threshold_c: f32,
    /// Minimum value the measurement cluster advertises (Celsius).
    pub min_measured_c: f32,
    /// Maximum value the measurement cluster advertises (Celsius).
    pub max_measured_c: f32,

    // --- Duty cycle ---
    /// Deep-sleep duration between duty cycles (seconds).
    pub wake_period_secs: u32,
    /// Whether a cycle in which every channel read failed retries once
    /// before sleeping. Off by default: bounding awake time matters more
    /// on battery than catching one missed interval.
    pub retry_all_failed_once: bool,

    // --- Commissioning ---
    /// Fixed backoff between network-steering retries (milliseconds).
    pub steering_retry_ms: u32,

    // --- Bus ---
    /// Worst-case wait for a probe temperature conversion (milliseconds).
    /// 12-bit DS18B20 conversions complete within 750 ms.
    pub conversion_wait_ms: u32,
    /// Upper bound on any single bus transaction (milliseconds); reads
    /// exceeding this surface as `ReadError::Timeout`.
    pub bus_timeout_ms: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            // Reporting
            report_threshold_c: 0.5,
            min_measured_c: -10.0,
            max_measured_c: 80.0,

            // Duty cycle
            wake_period_secs: 30,
            retry_all_failed_once: false,

            // Commissioning
            steering_retry_ms: 1000,

            // Bus
            conversion_wait_ms: 750,
            bus_timeout_ms: 1000,
        }
    }
}

impl NodeConfig {
    /// Range-check every field. Called once at boot before the config is
    /// handed to the node controller.
    pub fn validate(&self) -> Result<(), Error> {
        if !(0.0..=10.0).contains(&self.report_threshold_c) {
            return Err(Error::Config("report_threshold_c must be 0.0-10.0"));
        }
        if self.min_measured_c >= self.max_measured_c {
            return Err(Error::Config("min_measured_c must be < max_measured_c"));
        }
        if !(5..=3600).contains(&self.wake_period_secs) {
            return Err(Error::Config("wake_period_secs must be 5-3600"));
        }
        if !(100..=60_000).contains(&self.steering_retry_ms) {
            return Err(Error::Config("steering_retry_ms must be 100-60000"));
        }
        if self.bus_timeout_ms < self.conversion_wait_ms {
            return Err(Error::Config("bus_timeout_ms must cover conversion_wait_ms"));
        }
        Ok(())
    }

    /// Deep-sleep duration in microseconds, as the power port expects it.
    pub fn wake_period_us(&self) -> u64 {
        u64::from(self.wake_period_secs) * 1_000_000
    }
}
