//! DS18B20 probe conversions.
//!
//! The probe reports temperature as a signed 16-bit value in units of
//! 1/16 °C (12-bit resolution). The Zigbee temperature-measurement cluster
//! wants centi-degrees in a signed 16-bit attribute. Both conversions live
//! here so the bank and the transport share one definition.

/// 1-Wire family code answered by DS18B20 probes. Discovery binds only
/// devices with this family; anything else on the shared bus is ignored.
pub const FAMILY_CODE: u8 = 0x28;

/// Convert a raw scratchpad reading (1/16 °C steps) to Celsius.
pub fn raw_to_celsius(raw: i16) -> f32 {
    f32::from(raw) / 16.0
}

/// Convert Celsius to the cluster's scaled representation:
/// `scaled = round(celsius * 100)`, saturating at the i16 range.
pub fn celsius_to_attribute(celsius: f32) -> i16 {
    let scaled = (celsius * 100.0).round();
    scaled.clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}

/// Dallas/Maxim CRC-8 (poly 0x31 reflected) over a scratchpad or ROM code.
/// A valid 1-Wire frame always checksums to the final byte.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;
    for &byte in data {
        let mut b = byte;
        for _ in 0..8 {
            let mix = (crc ^ b) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            b >>= 1;
        }
    }
    crc
}
