//! Adapters — implementations of the port traits against real hardware
//! and the ESP Zigbee stack.
//!
//! Every module here is dual-target: the ESP-IDF implementation is guarded
//! by `#[cfg(target_os = "espidf")]`, with a simulation backend for host
//! builds so the crate (and its tests) compile everywhere.

pub mod log_sink;
pub mod onewire;
pub mod power;
pub mod retained;
pub mod zigbee;
