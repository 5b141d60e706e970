//! Mock port adapters for integration tests.
//!
//! Every driven port gets a recording implementation so tests can assert
//! on the full call history without real hardware or a live Zigbee stack.

use std::collections::HashMap;

use thermnode::app::events::NodeEvent;
use thermnode::app::ports::{
    AttributeTransport, BusDevice, CommissioningMode, EventSink, MAX_BUS_DEVICES, MeshStack,
    NetworkInfo, PowerControl, RetainedStore, SensorBus, WakeContext,
};
use thermnode::error::{DiscoveryError, ReadError, TransportError};
use thermnode::report::RetainedState;
use thermnode::sensors::ds18b20;

// ── Sensor bus ────────────────────────────────────────────────

pub struct MockBus {
    pub devices: Vec<BusDevice>,
    pub raw: HashMap<u64, i16>,
    pub fail_all_reads: bool,
    pub enumerate_calls: usize,
}

#[allow(dead_code)]
impl MockBus {
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
            raw: HashMap::new(),
            fail_all_reads: false,
            enumerate_calls: 0,
        }
    }

    /// Bus with `n` probes at addresses 0xA1, 0xA2, ... reading `celsius`.
    pub fn with_probes(n: usize, celsius: f32) -> Self {
        let mut bus = Self::new();
        for i in 0..n {
            let address = 0xA1 + i as u64;
            bus.devices.push(BusDevice {
                address,
                family: ds18b20::FAMILY_CODE,
            });
            bus.set_celsius(address, celsius);
        }
        bus
    }

    /// Script a probe reading, quantised to the sensor's 1/16 °C grid.
    pub fn set_celsius(&mut self, address: u64, celsius: f32) {
        self.raw.insert(address, (celsius * 16.0).round() as i16);
    }
}

impl SensorBus for MockBus {
    fn enumerate(
        &mut self,
    ) -> Result<heapless::Vec<BusDevice, MAX_BUS_DEVICES>, DiscoveryError> {
        self.enumerate_calls += 1;
        let mut out = heapless::Vec::new();
        for d in &self.devices {
            let _ = out.push(*d);
        }
        Ok(out)
    }

    fn start_conversion(&mut self, _address: u64) -> Result<(), ReadError> {
        if self.fail_all_reads {
            Err(ReadError::Timeout)
        } else {
            Ok(())
        }
    }

    fn read_scratchpad(&mut self, address: u64) -> Result<i16, ReadError> {
        if self.fail_all_reads {
            return Err(ReadError::Timeout);
        }
        self.raw.get(&address).copied().ok_or(ReadError::BusFault)
    }
}

// ── Mesh stack ────────────────────────────────────────────────

pub struct MockStack {
    pub commissioning_requests: Vec<CommissioningMode>,
    pub retry_delays: Vec<u32>,
    pub network_info: NetworkInfo,
}

#[allow(dead_code)]
impl MockStack {
    pub fn new() -> Self {
        Self {
            commissioning_requests: Vec::new(),
            retry_delays: Vec::new(),
            network_info: NetworkInfo {
                extended_pan_id: [0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x11, 0x22, 0x33],
                pan_id: 0x1A2B,
                channel: 15,
                short_address: 0x4001,
            },
        }
    }
}

impl MeshStack for MockStack {
    fn start_commissioning(&mut self, mode: CommissioningMode) -> Result<(), TransportError> {
        self.commissioning_requests.push(mode);
        Ok(())
    }

    fn schedule_retry(&mut self, delay_ms: u32) {
        self.retry_delays.push(delay_ms);
    }

    fn network_info(&self) -> NetworkInfo {
        self.network_info
    }
}

// ── Attribute transport ───────────────────────────────────────

#[derive(Default)]
pub struct MockTransport {
    pub writes: Vec<(u8, i16)>,
    pub fail_writes: bool,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AttributeTransport for MockTransport {
    fn write_temperature(
        &mut self,
        channel_index: u8,
        scaled_centi_c: i16,
    ) -> Result<(), TransportError> {
        if self.fail_writes {
            return Err(TransportError::WriteFailed);
        }
        self.writes.push((channel_index, scaled_centi_c));
        Ok(())
    }
}

// ── Power ─────────────────────────────────────────────────────

pub struct MockPower {
    pub wake_cause: WakeContext,
    pub sleep_requests: Vec<u64>,
}

#[allow(dead_code)]
impl MockPower {
    pub fn cold_boot() -> Self {
        Self {
            wake_cause: WakeContext::ColdBoot,
            sleep_requests: Vec::new(),
        }
    }

    pub fn timer_wake() -> Self {
        Self {
            wake_cause: WakeContext::TimerWake,
            sleep_requests: Vec::new(),
        }
    }
}

impl PowerControl for MockPower {
    fn last_wake_cause(&self) -> WakeContext {
        self.wake_cause
    }

    fn enter_sleep(&mut self, duration_us: u64) {
        self.sleep_requests.push(duration_us);
    }
}

// ── Retained store ────────────────────────────────────────────

#[derive(Default)]
pub struct MockRetained {
    pub stored: Option<RetainedState>,
}

#[allow(dead_code)]
impl MockRetained {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn preloaded(state: RetainedState) -> Self {
        Self {
            stored: Some(state),
        }
    }
}

impl RetainedStore for MockRetained {
    fn load(&self) -> Option<RetainedState> {
        self.stored.filter(RetainedState::is_plausible)
    }

    fn store(&mut self, state: &RetainedState) {
        self.stored = Some(*state);
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct VecSink {
    pub events: Vec<NodeEvent>,
}

#[allow(dead_code)]
impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&NodeEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for VecSink {
    fn emit(&mut self, event: &NodeEvent) {
        self.events.push(*event);
    }
}
