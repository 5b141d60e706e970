//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured node events to the
//! ESP-IDF logger (UART / USB-CDC in production). There is no user-facing
//! UI on this device; the log is the whole observability surface.

use log::{info, warn};

use crate::app::events::NodeEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`NodeEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &NodeEvent) {
        match event {
            NodeEvent::Started(wake) => {
                info!("BOOT  | cause={:?}", wake);
            }
            NodeEvent::ChannelsDiscovered { count } => {
                info!("BANK  | discovered {} channel(s)", count);
            }
            NodeEvent::ChannelsRestored { count } => {
                info!("BANK  | restored {} channel(s) from retained state", count);
            }
            NodeEvent::CommissioningChanged { from, to } => {
                info!("COMM  | {:?} -> {:?}", from, to);
            }
            NodeEvent::NetworkJoined(net) => {
                info!(
                    "COMM  | joined PAN 0x{:04x} channel {} short 0x{:04x}",
                    net.pan_id, net.channel, net.short_address
                );
            }
            NodeEvent::SampleEvaluated {
                channel,
                celsius,
                delta,
                transmitted,
            } => {
                info!(
                    "TEMP  | ch{} {:.2} C (delta {:+.2} C) {}",
                    channel,
                    celsius,
                    delta,
                    if *transmitted { "sent" } else { "suppressed" }
                );
            }
            NodeEvent::ReadFailed { channel, error } => {
                warn!("TEMP  | ch{} read failed: {}", channel, error);
            }
            NodeEvent::EnteringSleep { duration_secs } => {
                info!("SLEEP | entering deep sleep for {} s", duration_secs);
            }
        }
    }
}
