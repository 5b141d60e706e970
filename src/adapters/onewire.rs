//! 1-Wire bus adapter.
//!
//! Implements [`SensorBus`] for the DS18B20 probe chain.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: bit-banged 1-Wire over a single open-drain GPIO with an
//! external pull-up, using `esp_rom_delay_us` for slot timing. Enumeration
//! is the standard Maxim Search ROM walk; reads are Match ROM + Convert T
//! (0x44) followed by Match ROM + Read Scratchpad (0xBE) with a CRC-8
//! check over the nine scratchpad bytes.
//!
//! On host/test: a scripted device list plus per-address raw values,
//! injectable from tests and the simulation main loop.

use crate::app::ports::{BusDevice, MAX_BUS_DEVICES, SensorBus};
use crate::error::{DiscoveryError, ReadError};
#[cfg(target_os = "espidf")]
use crate::sensors::ds18b20;

// 1-Wire ROM/function commands.
#[cfg(target_os = "espidf")]
const CMD_SEARCH_ROM: u8 = 0xF0;
#[cfg(target_os = "espidf")]
const CMD_MATCH_ROM: u8 = 0x55;
#[cfg(target_os = "espidf")]
const CMD_CONVERT_T: u8 = 0x44;
#[cfg(target_os = "espidf")]
const CMD_READ_SCRATCHPAD: u8 = 0xBE;

pub struct OneWireBus {
    #[cfg(target_os = "espidf")]
    gpio: i32,
    conversion_wait_ms: u32,
    #[cfg(not(target_os = "espidf"))]
    sim: sim::SimBusState,
}

impl OneWireBus {
    /// `gpio` is the data line (external pull-up required);
    /// `conversion_wait_ms` bounds the wait for Convert T to finish.
    pub fn new(gpio: i32, conversion_wait_ms: u32) -> Self {
        #[cfg(target_os = "espidf")]
        {
            unsafe {
                esp_idf_svc::sys::gpio_set_direction(
                    gpio,
                    esp_idf_svc::sys::gpio_mode_t_GPIO_MODE_INPUT_OUTPUT_OD,
                );
                esp_idf_svc::sys::gpio_set_level(gpio, 1);
            }
            Self {
                gpio,
                conversion_wait_ms,
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            let _ = gpio;
            Self {
                conversion_wait_ms,
                sim: sim::SimBusState::default(),
            }
        }
    }

    // ── Host simulation controls ──────────────────────────────

    /// Seed the simulated bus with devices (host builds only).
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_add_device(&mut self, address: u64, family: u8) {
        self.sim.devices.push(BusDevice { address, family });
    }

    /// Set the raw reading a simulated device answers with (1/16 °C steps).
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_raw(&mut self, address: u64, raw: i16) {
        self.sim.raw.insert(address, raw);
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF backend: bit-banged 1-Wire
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl OneWireBus {
    fn delay_us(us: u32) {
        unsafe { esp_idf_svc::sys::esp_rom_delay_us(us) };
    }

    fn drive_low(&self) {
        unsafe {
            esp_idf_svc::sys::gpio_set_level(self.gpio, 0);
        }
    }

    fn release(&self) {
        unsafe {
            esp_idf_svc::sys::gpio_set_level(self.gpio, 1);
        }
    }

    fn sample(&self) -> bool {
        unsafe { esp_idf_svc::sys::gpio_get_level(self.gpio) != 0 }
    }

    /// Reset pulse + presence detect. `false` means no device answered.
    fn reset(&self) -> bool {
        self.drive_low();
        Self::delay_us(480);
        self.release();
        Self::delay_us(70);
        let presence = !self.sample();
        Self::delay_us(410);
        presence
    }

    fn write_bit(&self, bit: bool) {
        self.drive_low();
        if bit {
            Self::delay_us(6);
            self.release();
            Self::delay_us(64);
        } else {
            Self::delay_us(60);
            self.release();
            Self::delay_us(10);
        }
    }

    fn read_bit(&self) -> bool {
        self.drive_low();
        Self::delay_us(6);
        self.release();
        Self::delay_us(9);
        let bit = self.sample();
        Self::delay_us(55);
        bit
    }

    fn write_byte(&self, byte: u8) {
        for i in 0..8 {
            self.write_bit(byte & (1 << i) != 0);
        }
    }

    fn read_byte(&self) -> u8 {
        let mut byte = 0u8;
        for i in 0..8 {
            if self.read_bit() {
                byte |= 1 << i;
            }
        }
        byte
    }

    fn match_rom(&self, address: u64) -> Result<(), ReadError> {
        if !self.reset() {
            return Err(ReadError::BusFault);
        }
        self.write_byte(CMD_MATCH_ROM);
        for i in 0..8 {
            self.write_byte((address >> (8 * i)) as u8);
        }
        Ok(())
    }

    /// One step of the Maxim Search ROM walk. Returns the discovered ROM
    /// code and the next branch position (0 = search complete).
    fn search_step(&self, last_discrepancy: u8) -> Result<Option<(u64, u8)>, DiscoveryError> {
        if !self.reset() {
            return Err(DiscoveryError::BusFault);
        }
        self.write_byte(CMD_SEARCH_ROM);

        let mut rom: u64 = 0;
        let mut discrepancy_marker: u8 = 0;

        for bit_index in 1..=64u8 {
            let bit = self.read_bit();
            let complement = self.read_bit();

            let direction = match (bit, complement) {
                // No device responded for either polarity: dead bus.
                (true, true) => return Err(DiscoveryError::BusFault),
                // All remaining devices agree on this bit.
                (b, c) if b != c => b,
                // Discrepancy: both polarities present.
                _ => {
                    if bit_index < last_discrepancy {
                        // Repeat the previous walk's choice.
                        rom & (1u64 << (bit_index - 1)) != 0
                    } else if bit_index == last_discrepancy {
                        true
                    } else {
                        discrepancy_marker = bit_index;
                        false
                    }
                }
            };

            if direction {
                rom |= 1u64 << (bit_index - 1);
            }
            self.write_bit(direction);
        }

        // Validate the ROM code CRC (byte 8 covers bytes 0-6).
        let bytes = rom.to_le_bytes();
        if ds18b20::crc8(&bytes[..7]) != bytes[7] {
            return Err(DiscoveryError::BusFault);
        }

        Ok(Some((rom, discrepancy_marker)))
    }
}

// ───────────────────────────────────────────────────────────────
// SensorBus implementation
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl SensorBus for OneWireBus {
    fn enumerate(&mut self) -> Result<heapless::Vec<BusDevice, MAX_BUS_DEVICES>, DiscoveryError> {
        let mut devices = heapless::Vec::new();

        if !self.reset() {
            // An empty bus answers no presence pulse; that is "no devices",
            // not a fault.
            return Ok(devices);
        }

        let mut last_discrepancy: u8 = 0;
        loop {
            let Some((rom, marker)) = self.search_step(last_discrepancy)? else {
                break;
            };
            let device = BusDevice {
                address: rom,
                family: (rom & 0xFF) as u8,
            };
            if devices.push(device).is_err() {
                log::warn!("Bus holds more than {} devices, truncating scan", MAX_BUS_DEVICES);
                break;
            }
            if marker == 0 {
                break; // Walk exhausted.
            }
            last_discrepancy = marker;
        }

        Ok(devices)
    }

    fn start_conversion(&mut self, address: u64) -> Result<(), ReadError> {
        self.match_rom(address)?;
        self.write_byte(CMD_CONVERT_T);

        // Poll the conversion-complete read slot up to the configured bound.
        let mut waited_ms: u32 = 0;
        while !self.read_bit() {
            if waited_ms >= self.conversion_wait_ms {
                return Err(ReadError::Timeout);
            }
            unsafe { esp_idf_svc::sys::vTaskDelay(1) };
            waited_ms += u32::from(esp_idf_svc::sys::portTICK_PERIOD_MS);
        }
        Ok(())
    }

    fn read_scratchpad(&mut self, address: u64) -> Result<i16, ReadError> {
        self.match_rom(address)?;
        self.write_byte(CMD_READ_SCRATCHPAD);

        let mut scratchpad = [0u8; 9];
        for byte in &mut scratchpad {
            *byte = self.read_byte();
        }
        if ds18b20::crc8(&scratchpad[..8]) != scratchpad[8] {
            return Err(ReadError::BusFault);
        }
        Ok(i16::from_le_bytes([scratchpad[0], scratchpad[1]]))
    }
}

#[cfg(not(target_os = "espidf"))]
impl SensorBus for OneWireBus {
    fn enumerate(&mut self) -> Result<heapless::Vec<BusDevice, MAX_BUS_DEVICES>, DiscoveryError> {
        let mut devices = heapless::Vec::new();
        for device in &self.sim.devices {
            if devices.push(*device).is_err() {
                break;
            }
        }
        Ok(devices)
    }

    fn start_conversion(&mut self, address: u64) -> Result<(), ReadError> {
        let _ = self.conversion_wait_ms;
        if self.sim.raw.contains_key(&address) {
            Ok(())
        } else {
            Err(ReadError::Timeout)
        }
    }

    fn read_scratchpad(&mut self, address: u64) -> Result<i16, ReadError> {
        self.sim.raw.get(&address).copied().ok_or(ReadError::BusFault)
    }
}

#[cfg(not(target_os = "espidf"))]
mod sim {
    use crate::app::ports::BusDevice;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct SimBusState {
        pub devices: Vec<BusDevice>,
        pub raw: HashMap<u64, i16>,
    }
}
