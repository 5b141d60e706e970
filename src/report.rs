//! Delta-based report suppression.
//!
//! [`ReportFilter`] decides, per channel, whether a fresh reading differs
//! enough from the last *reported* value to justify a transmission. The
//! last-reported values live in [`RetainedState`], the one struct that
//! survives deep sleep; the filter is constructed around it at boot and
//! hands it back for storage at sleep entry.
//!
//! `evaluate` is pure (no mutation); `commit` is the only mutator and is
//! called exactly when a report was actually transmitted. That split keeps
//! the filtering logic assertable in tests without side effects.

use serde::{Deserialize, Serialize};

use crate::config::MAX_CHANNELS;

// ---------------------------------------------------------------------------
// Retained state
// ---------------------------------------------------------------------------

/// Node state that survives the deep-sleep/wake boundary.
///
/// Persisted layout: per-channel probe addresses (so a timer wake can
/// rebuild the bank without a bus scan) and per-channel last-reported
/// temperatures. Everything else in the firmware re-initialises from
/// defaults on wake.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetainedState {
    /// Number of channels bound at cold-boot discovery.
    pub channel_count: u8,
    /// 64-bit 1-Wire ROM codes, by channel index.
    pub addresses: [u64; MAX_CHANNELS],
    /// Last temperature actually transmitted, by channel index (Celsius).
    /// Initialised to 0.0 at cold boot, so a channel that has never
    /// reported transmits its first plausible reading.
    pub last_reported: [f32; MAX_CHANNELS],
    /// Whether the channel has transmitted at least once since cold boot.
    /// Diagnostic only; does not alter filter semantics.
    pub has_reported: [bool; MAX_CHANNELS],
}

impl RetainedState {
    /// Fresh state for a cold boot, before discovery fills in addresses.
    pub fn cold_boot() -> Self {
        Self {
            channel_count: 0,
            addresses: [0; MAX_CHANNELS],
            last_reported: [0.0; MAX_CHANNELS],
            has_reported: [false; MAX_CHANNELS],
        }
    }

    /// Sanity check for state loaded from retained memory. Rejects blobs
    /// whose channel count exceeds the arena bound or that carry no bound
    /// channels (nothing to resume).
    pub fn is_plausible(&self) -> bool {
        let n = self.channel_count as usize;
        if n == 0 || n > MAX_CHANNELS {
            return false;
        }
        self.addresses[..n].iter().all(|&a| a != 0)
    }
}

// ---------------------------------------------------------------------------
// Sample report
// ---------------------------------------------------------------------------

/// The outcome of evaluating one successful channel read. Constructed,
/// acted on, and discarded within a single duty cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleReport {
    pub channel_index: u8,
    /// The fresh reading (Celsius).
    pub raw_value: f32,
    /// `raw_value - last_reported` for this channel.
    pub delta: f32,
    /// True iff `|delta|` exceeds the report threshold.
    pub should_transmit: bool,
}

// ---------------------------------------------------------------------------
// Report filter
// ---------------------------------------------------------------------------

/// Per-channel delta gate around the retained last-reported values.
pub struct ReportFilter {
    threshold_c: f32,
    retained: RetainedState,
}

impl ReportFilter {
    /// Build the filter around state loaded at boot (cold-boot fresh state
    /// or the blob recovered from retained memory on a timer wake).
    pub fn new(threshold_c: f32, retained: RetainedState) -> Self {
        Self {
            threshold_c,
            retained,
        }
    }

    /// Evaluate a fresh reading against the channel's last-reported value.
    /// Pure: repeated calls without `commit` always see the same baseline.
    pub fn evaluate(&self, channel_index: u8, value: f32) -> SampleReport {
        let last = self
            .retained
            .last_reported
            .get(channel_index as usize)
            .copied()
            .unwrap_or(0.0);
        let delta = value - last;
        SampleReport {
            channel_index,
            raw_value: value,
            delta,
            should_transmit: delta.abs() > self.threshold_c,
        }
    }

    /// Record a transmitted report: the channel's baseline becomes the
    /// transmitted value. Only called when `should_transmit` was true and
    /// the transport write succeeded.
    pub fn commit(&mut self, report: &SampleReport) {
        let idx = report.channel_index as usize;
        if idx < MAX_CHANNELS {
            self.retained.last_reported[idx] = report.raw_value;
            self.retained.has_reported[idx] = true;
        }
    }

    /// The retained state to store at sleep entry.
    pub fn retained(&self) -> &RetainedState {
        &self.retained
    }

    pub fn threshold_c(&self) -> f32 {
        self.threshold_c
    }
}
