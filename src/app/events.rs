//! Outbound application events.
//!
//! The node core emits these through the [`EventSink`](super::ports::EventSink)
//! port. The production adapter logs them to serial; tests collect them to
//! assert on the cycle's observable behaviour.

use crate::app::ports::{NetworkInfo, WakeContext};
use crate::commissioning::CommissioningState;
use crate::error::ReadError;

/// Structured events emitted by the node core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeEvent {
    /// The node booted (carries the wake cause).
    Started(WakeContext),

    /// Cold-boot discovery bound this many channels.
    ChannelsDiscovered { count: u8 },

    /// Timer wake rebuilt this many channels from retained addresses.
    ChannelsRestored { count: u8 },

    /// The commissioning state machine moved.
    CommissioningChanged {
        from: CommissioningState,
        to: CommissioningState,
    },

    /// The node joined a network.
    NetworkJoined(NetworkInfo),

    /// One channel was sampled and evaluated.
    SampleEvaluated {
        channel: u8,
        celsius: f32,
        delta: f32,
        transmitted: bool,
    },

    /// One channel's read failed this cycle (channel skipped, cycle continues).
    ReadFailed { channel: u8, error: ReadError },

    /// The duty cycle finished and the node is powering down.
    EnteringSleep { duration_secs: u32 },
}
