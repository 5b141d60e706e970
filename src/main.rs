//! Thermnode Firmware — Main Entry Point
//!
//! Battery-powered Zigbee temperature sensor node. One process lifecycle
//! per wake: boot, (re)build the sensor bank, join or rejoin the network,
//! run a single sample-report cycle, deep sleep.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  OneWireBus       ZigbeeStack        RtcRetainedStore          │
//! │  (SensorBus)      (Mesh+Transport)   (RetainedStore)           │
//! │  DeepSleepPower   LogEventSink                                 │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            NodeController (pure logic)                 │    │
//! │  │  SensorBank · ReportFilter · Commissioning FSM ·       │    │
//! │  │  DutyCycleScheduler                                    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```

#![deny(unused_must_use)]

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};

use thermnode::adapters::log_sink::LogEventSink;
use thermnode::adapters::onewire::OneWireBus;
use thermnode::adapters::power::DeepSleepPower;
use thermnode::adapters::retained::RtcRetainedStore;
use thermnode::adapters::zigbee::{self, ZigbeeStack};
use thermnode::app::service::NodeController;
use thermnode::config::NodeConfig;
use thermnode::events;
use thermnode::pins;
use thermnode::sensors::ds18b20;

// ── Stack signal handler ──────────────────────────────────────
//
// The Zigbee stack calls this from its own dispatch task. It must not
// block, so the signal is translated and pushed onto the lock-free queue;
// the main loop below drains it.

#[unsafe(no_mangle)]
extern "C" fn esp_zb_app_signal_handler(signal_struct: *mut zigbee::RawAppSignal) {
    let signal = unsafe { zigbee::translate_app_signal(signal_struct) };
    if !events::push_signal(signal) {
        warn!("Signal queue full, dropping {:?}", signal.kind);
    }
}

fn now_ms() -> u64 {
    (unsafe { esp_idf_svc::sys::esp_timer_get_time() } / 1000) as u64
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Thermnode v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = NodeConfig::default();

    // ── 2. Construct adapters ─────────────────────────────────
    let mut bus = OneWireBus::new(pins::ONEWIRE_BUS_GPIO, config.conversion_wait_ms);
    let mut power = DeepSleepPower::new();
    let mut store = RtcRetainedStore::new();
    let mut stack = ZigbeeStack::new();
    let mut sink = LogEventSink::new();

    // ── 3. Boot the node (wake-cause detection + bank build) ──
    let mut node = NodeController::boot(&config, &power, &store, &mut bus, &mut sink)
        .context("node boot failed")?;

    // ── 4. Zigbee stack bring-up ──────────────────────────────
    zigbee::init_stack(
        node.channel_count() as u8,
        ds18b20::celsius_to_attribute(config.min_measured_c),
        ds18b20::celsius_to_attribute(config.max_measured_c),
    )
    .context("zigbee stack init failed")?;

    thread::Builder::new()
        .name("zb-stack".into())
        .stack_size(8192)
        .spawn(|| zigbee::run_stack_loop())
        .context("zigbee stack task spawn failed")?;

    info!("Stack started; waiting for network");

    // ── 5. Commissioning loop ─────────────────────────────────
    //
    // Drain stack signals into the commissioning machine until the node
    // is joined (then sample) or terminally failed (then halt inert).
    loop {
        events::drain_signals(|signal| {
            node.on_stack_signal(signal, now_ms(), &mut stack, &mut sink);
        });
        if zigbee::take_retry_pending() {
            node.on_retry_timer(&mut stack, &mut sink);
        }

        if node.is_ready() {
            break;
        }
        if node.is_failed() {
            error!("Commissioning failed; halting until external reset");
            loop {
                thread::sleep(Duration::from_secs(60));
            }
        }

        thread::sleep(Duration::from_millis(50));
    }

    // ── 6. One duty cycle, then deep sleep ────────────────────
    //
    // enter_sleep() at the end of the cycle does not return on hardware;
    // the next wake restarts main() from the top.
    let _outcome = node.run_duty_cycle(&mut bus, &mut stack, &mut store, &mut power, &mut sink);

    Ok(())
}
