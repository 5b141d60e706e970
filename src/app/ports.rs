//! Port traits — the hexagonal boundary between node logic and its
//! external collaborators.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ NodeController (domain)
//! ```
//!
//! Driven adapters (1-Wire bus, Zigbee stack, RTC retained memory, power
//! management) implement these traits. The domain core consumes them via
//! generics and never touches hardware or stack FFI directly, which is what
//! lets every duty-cycle and commissioning path run on the host under test.

use heapless::Vec;

use crate::app::events::NodeEvent;
use crate::error::{DiscoveryError, ReadError, TransportError};
use crate::report::RetainedState;

// ───────────────────────────────────────────────────────────────
// Sensor bus port (driven adapter: 1-Wire hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Upper bound on devices returned by one enumeration pass. The bank binds
/// at most `MAX_CHANNELS` of them; the rest are ignored with a warning.
pub const MAX_BUS_DEVICES: usize = 8;

/// One device answering on the shared bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusDevice {
    /// 64-bit ROM code, unique per device.
    pub address: u64,
    /// Family code (low byte of the ROM code).
    pub family: u8,
}

/// The physical bus transaction protocol. Discovery enumerates addresses;
/// a read is a start-conversion command followed by a scratchpad fetch,
/// and both may fail independently.
pub trait SensorBus {
    /// Enumerate every device on the bus, in bus-search order.
    fn enumerate(&mut self) -> Result<Vec<BusDevice, MAX_BUS_DEVICES>, DiscoveryError>;

    /// Issue a start-conversion command to one device and wait out the
    /// conversion time (bounded by the configured bus timeout).
    fn start_conversion(&mut self, address: u64) -> Result<(), ReadError>;

    /// Fetch the conversion result: raw temperature in 1/16 °C steps.
    fn read_scratchpad(&mut self, address: u64) -> Result<i16, ReadError>;
}

// ───────────────────────────────────────────────────────────────
// Mesh stack port (driven adapter: domain → Zigbee stack)
// ───────────────────────────────────────────────────────────────

/// Commissioning modes the controller can request from the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommissioningMode {
    /// Initialise the stack's base device behaviour machinery.
    Initialization,
    /// Scan for and join an open network.
    NetworkSteering,
}

/// Network identity, valid once joined. Logged for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkInfo {
    pub extended_pan_id: [u8; 8],
    pub pan_id: u16,
    pub channel: u8,
    pub short_address: u16,
}

/// Calls the commissioning controller issues back into the network stack.
/// The stack delivers signals asynchronously from its own dispatch task;
/// this port only covers the outbound direction.
pub trait MeshStack {
    /// Ask the stack to start commissioning in the given mode.
    fn start_commissioning(&mut self, mode: CommissioningMode) -> Result<(), TransportError>;

    /// Schedule a one-shot callback into the stack's scheduler; when it
    /// fires, the caller re-drives the controller via its retry entry point.
    fn schedule_retry(&mut self, delay_ms: u32);

    /// Identity of the joined network. Contents are undefined before join.
    fn network_info(&self) -> NetworkInfo;
}

// ───────────────────────────────────────────────────────────────
// Attribute transport port (driven adapter: domain → cluster attributes)
// ───────────────────────────────────────────────────────────────

/// Accepts scaled temperature writes for the measurement cluster.
///
/// Scaling contract: `scaled = round(celsius * 100)`. Implementations must
/// treat each write as an exclusive critical section against the stack's
/// own attribute access (acquire/release the stack lock around the write).
pub trait AttributeTransport {
    fn write_temperature(
        &mut self,
        channel_index: u8,
        scaled_centi_c: i16,
    ) -> Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Power port (driven adapter: domain → sleep controller)
// ───────────────────────────────────────────────────────────────

/// Why the node is running: first power-up or a timer wake from deep sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeContext {
    /// Cold boot: run discovery, start commissioning from scratch.
    ColdBoot,
    /// Timer wake: reuse retained channel addresses, no bus scan.
    TimerWake,
}

/// Power state transitions. Sleep entry is unconditional once issued; the
/// only way out is the hardware wake timer.
pub trait PowerControl {
    /// Boot cause, read once at startup.
    fn last_wake_cause(&self) -> WakeContext;

    /// Enter timed deep sleep. On real hardware this does not return.
    fn enter_sleep(&mut self, duration_us: u64);
}

// ───────────────────────────────────────────────────────────────
// Retained store port (driven adapter: domain ↔ RTC memory)
// ───────────────────────────────────────────────────────────────

/// Load-at-boot / store-at-sleep-entry access to the retained-state blob.
pub trait RetainedStore {
    /// The state stored before the last sleep, if the blob is present and
    /// passes its validity check. `None` on cold boot or corruption.
    fn load(&self) -> Option<RetainedState>;

    /// Persist state for the next wake. Called once, at sleep entry.
    fn store(&mut self, state: &RetainedState);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`NodeEvent`]s through this port. Adapters
/// decide where they go (serial log in production, a Vec in tests).
pub trait EventSink {
    fn emit(&mut self, event: &NodeEvent);
}
