//! Pin assignments for the ESP32-H2 thermnode board.
//!
//! Single source of truth for GPIO numbers; adapters take these as
//! constructor arguments so host tests never touch them.

/// 1-Wire data line for the DS18B20 probes (external 4.7 kOhm pull-up).
pub const ONEWIRE_BUS_GPIO: i32 = 0;
