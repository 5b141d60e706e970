//! Sensor subsystem — the probe arena ([`SensorBank`]) and DS18B20
//! conversions.
//!
//! The bank owns the bounded set of discovered channels. Discovery runs
//! once per cold boot; a timer wake rebuilds the bank from retained
//! addresses without touching the bus. Indices are dense, 0-based, and
//! stable across the sleep/wake boundary.

pub mod ds18b20;

use heapless::Vec;
use log::{info, warn};

use crate::app::ports::SensorBus;
use crate::config::MAX_CHANNELS;
use crate::error::{DiscoveryError, ReadError};
use crate::report::RetainedState;

/// One physical probe bound to a stable index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel {
    /// Dense, 0-based, stable for the node's lifetime.
    pub index: u8,
    /// 64-bit 1-Wire ROM code, discovered rather than configured.
    pub address: u64,
}

/// Fixed-capacity arena of discovered channels.
#[derive(Debug)]
pub struct SensorBank {
    channels: Vec<Channel, MAX_CHANNELS>,
}

impl SensorBank {
    /// Enumerate the bus and bind up to [`MAX_CHANNELS`] temperature
    /// probes in discovery order. Non-probe devices and excess probes are
    /// skipped with a warning; zero qualifying devices is fatal.
    pub fn discover(bus: &mut impl SensorBus) -> Result<Self, DiscoveryError> {
        let devices = bus.enumerate()?;
        info!("Bus scan found {} device(s)", devices.len());

        let mut channels: Vec<Channel, MAX_CHANNELS> = Vec::new();
        for device in &devices {
            if device.family != ds18b20::FAMILY_CODE {
                warn!(
                    "Device {:016X} (family 0x{:02X}) is not a temperature probe, skipping",
                    device.address, device.family
                );
                continue;
            }
            if channels.iter().any(|c| c.address == device.address) {
                warn!("Duplicate address {:016X} in scan, skipping", device.address);
                continue;
            }
            if channels.len() == MAX_CHANNELS {
                warn!(
                    "Probe {:016X} exceeds the {} channel bound, ignoring",
                    device.address, MAX_CHANNELS
                );
                continue;
            }
            let index = channels.len() as u8;
            // Capacity checked above; push cannot fail.
            let _ = channels.push(Channel {
                index,
                address: device.address,
            });
            info!("Bound probe {:016X} as channel {}", device.address, index);
        }

        if channels.is_empty() {
            return Err(DiscoveryError::NoneFound);
        }
        Ok(Self { channels })
    }

    /// Rebuild the bank from retained addresses after a timer wake.
    /// No bus scan: the addresses were discovered at cold boot and probes
    /// do not move while the node sleeps.
    pub fn restore(retained: &RetainedState) -> Self {
        let mut channels = Vec::new();
        let count = (retained.channel_count as usize).min(MAX_CHANNELS);
        for index in 0..count {
            let _ = channels.push(Channel {
                index: index as u8,
                address: retained.addresses[index],
            });
        }
        Self { channels }
    }

    /// Read one channel: start a conversion, then fetch and convert the
    /// result. Retry policy belongs to the caller.
    pub fn read(&self, bus: &mut impl SensorBus, index: u8) -> Result<f32, ReadError> {
        let channel = self
            .channels
            .get(index as usize)
            .ok_or(ReadError::InvalidChannel)?;
        bus.start_conversion(channel.address)?;
        let raw = bus.read_scratchpad(channel.address)?;
        Ok(ds18b20::raw_to_celsius(raw))
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Seed a cold-boot retained state with the discovered addresses.
    pub fn seed_retained(&self) -> RetainedState {
        let mut retained = RetainedState::cold_boot();
        retained.channel_count = self.channels.len() as u8;
        for channel in &self.channels {
            retained.addresses[channel.index as usize] = channel.address;
        }
        retained
    }
}
