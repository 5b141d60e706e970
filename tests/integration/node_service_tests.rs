//! End-to-end node lifecycle tests: boot, duty cycle, sleep.
//!
//! These drive [`NodeController`] through the same sequence `main` does,
//! with every port mocked, and assert on the externally visible behaviour:
//! attribute writes, sleep requests, retained-state stores, emitted events.

use crate::mock_ports::{MockBus, MockPower, MockRetained, MockTransport, VecSink};
use thermnode::app::events::NodeEvent;
use thermnode::app::ports::WakeContext;
use thermnode::app::service::NodeController;
use thermnode::config::NodeConfig;
use thermnode::error::Error;
use thermnode::sensors::ds18b20;

fn boot_cold(
    config: &NodeConfig,
    bus: &mut MockBus,
    sink: &mut VecSink,
) -> (NodeController, MockPower, MockRetained) {
    let power = MockPower::cold_boot();
    let store = MockRetained::empty();
    let node = NodeController::boot(config, &power, &store, bus, sink).unwrap();
    (node, power, store)
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn cold_boot_discovers_probes_and_reports_count() {
    let config = NodeConfig::default();
    let mut bus = MockBus::with_probes(2, 20.0);
    let mut sink = VecSink::new();

    let (node, ..) = boot_cold(&config, &mut bus, &mut sink);

    assert_eq!(node.wake_context(), WakeContext::ColdBoot);
    assert_eq!(node.channel_count(), 2);
    assert_eq!(bus.enumerate_calls, 1);
    assert_eq!(sink.events[0], NodeEvent::Started(WakeContext::ColdBoot));
    assert_eq!(
        sink.count(|e| matches!(e, NodeEvent::ChannelsDiscovered { count: 2 })),
        1
    );
}

#[test]
fn cold_boot_with_no_probes_fails() {
    let config = NodeConfig::default();
    let mut bus = MockBus::new();
    let mut sink = VecSink::new();
    let power = MockPower::cold_boot();
    let store = MockRetained::empty();

    let result = NodeController::boot(&config, &power, &store, &mut bus, &mut sink);
    assert!(matches!(result, Err(Error::Discovery(_))));
}

#[test]
fn timer_wake_restores_bank_without_bus_scan() {
    let config = NodeConfig::default();
    let mut sink = VecSink::new();

    // Cold boot first to produce a retained blob.
    let mut bus = MockBus::with_probes(2, 20.0);
    let (mut node, mut power, mut store) = boot_cold(&config, &mut bus, &mut sink);
    let mut transport = MockTransport::new();
    node.run_duty_cycle(&mut bus, &mut transport, &mut store, &mut power, &mut sink);

    // Simulated wake: same store, fresh bus that would fail enumeration.
    let mut wake_bus = MockBus::new();
    let wake_power = MockPower::timer_wake();
    let mut wake_sink = VecSink::new();
    let node = NodeController::boot(&config, &wake_power, &store, &mut wake_bus, &mut wake_sink)
        .unwrap();

    assert_eq!(node.channel_count(), 2);
    assert_eq!(wake_bus.enumerate_calls, 0);
    assert_eq!(
        wake_sink.count(|e| matches!(e, NodeEvent::ChannelsRestored { count: 2 })),
        1
    );
}

#[test]
fn timer_wake_with_lost_state_falls_back_to_discovery() {
    let config = NodeConfig::default();
    let mut bus = MockBus::with_probes(1, 21.0);
    let mut sink = VecSink::new();
    let power = MockPower::timer_wake();
    let store = MockRetained::empty();

    let node = NodeController::boot(&config, &power, &store, &mut bus, &mut sink).unwrap();

    assert_eq!(node.channel_count(), 1);
    assert_eq!(bus.enumerate_calls, 1);
    assert_eq!(
        sink.count(|e| matches!(e, NodeEvent::ChannelsDiscovered { count: 1 })),
        1
    );
}

// ── Duty cycle ────────────────────────────────────────────────

#[test]
fn first_cycle_transmits_and_sleeps_for_the_wake_period() {
    let config = NodeConfig::default();
    let mut bus = MockBus::with_probes(2, 20.0);
    let mut sink = VecSink::new();
    let (mut node, mut power, mut store) = boot_cold(&config, &mut bus, &mut sink);
    let mut transport = MockTransport::new();

    let outcome = node.run_duty_cycle(&mut bus, &mut transport, &mut store, &mut power, &mut sink);

    // Never-reported channels transmit their first reading.
    assert_eq!(outcome.attempted, 2);
    assert_eq!(outcome.succeeded, 2);
    assert_eq!(outcome.transmitted, 2);
    let expected = ds18b20::celsius_to_attribute(20.0);
    assert_eq!(transport.writes, vec![(0, expected), (1, expected)]);

    // Exactly one sleep request, for the configured period.
    assert_eq!(power.sleep_requests, vec![config.wake_period_us()]);

    // The new baseline was stored before sleeping.
    let retained = store.stored.unwrap();
    assert!((retained.last_reported[0] - 20.0).abs() < 1e-3);
    assert!(retained.has_reported[0] && retained.has_reported[1]);
}

#[test]
fn small_change_is_suppressed_but_the_node_still_sleeps() {
    let config = NodeConfig::default();
    let mut sink = VecSink::new();

    let mut bus = MockBus::with_probes(1, 20.0);
    let (mut node, mut power, mut store) = boot_cold(&config, &mut bus, &mut sink);
    let mut transport = MockTransport::new();
    node.run_duty_cycle(&mut bus, &mut transport, &mut store, &mut power, &mut sink);
    transport.writes.clear();

    // Next cycle on the same controller: +0.25 °C is under the threshold.
    bus.set_celsius(0xA1, 20.25);
    let outcome = node.run_duty_cycle(&mut bus, &mut transport, &mut store, &mut power, &mut sink);

    assert_eq!(outcome.transmitted, 0);
    assert!(transport.writes.is_empty());
    assert_eq!(power.sleep_requests.len(), 2);
    assert_eq!(
        sink.count(|e| matches!(
            e,
            NodeEvent::SampleEvaluated {
                transmitted: false,
                ..
            }
        )),
        1
    );
    // Baseline unchanged.
    assert!((store.stored.unwrap().last_reported[0] - 20.0).abs() < 1e-3);
}

#[test]
fn change_above_threshold_transmits_and_moves_the_baseline() {
    let config = NodeConfig::default();
    let mut sink = VecSink::new();

    let mut bus = MockBus::with_probes(1, 20.0);
    let (mut node, mut power, mut store) = boot_cold(&config, &mut bus, &mut sink);
    let mut transport = MockTransport::new();
    node.run_duty_cycle(&mut bus, &mut transport, &mut store, &mut power, &mut sink);
    transport.writes.clear();

    bus.set_celsius(0xA1, 20.75);
    let outcome = node.run_duty_cycle(&mut bus, &mut transport, &mut store, &mut power, &mut sink);

    assert_eq!(outcome.transmitted, 1);
    assert_eq!(
        transport.writes,
        vec![(0, ds18b20::celsius_to_attribute(20.75))]
    );
    assert!((store.stored.unwrap().last_reported[0] - 20.75).abs() < 1e-3);
}

#[test]
fn cycle_with_all_reads_failing_still_sleeps_exactly_once() {
    let config = NodeConfig::default();
    let mut bus = MockBus::with_probes(2, 20.0);
    let mut sink = VecSink::new();
    let (mut node, mut power, mut store) = boot_cold(&config, &mut bus, &mut sink);
    let mut transport = MockTransport::new();

    bus.fail_all_reads = true;
    let outcome = node.run_duty_cycle(&mut bus, &mut transport, &mut store, &mut power, &mut sink);

    assert_eq!(outcome.succeeded, 0);
    assert_eq!(outcome.failed, 2);
    assert!(transport.writes.is_empty());
    assert_eq!(power.sleep_requests, vec![config.wake_period_us()]);
    assert_eq!(sink.count(|e| matches!(e, NodeEvent::ReadFailed { .. })), 2);
}

#[test]
fn one_failed_probe_does_not_block_the_other() {
    let config = NodeConfig::default();
    let mut bus = MockBus::with_probes(2, 20.0);
    bus.raw.remove(&0xA2); // channel 1 answers the conversion but not the read
    let mut sink = VecSink::new();
    let (mut node, mut power, mut store) = boot_cold(&config, &mut bus, &mut sink);
    let mut transport = MockTransport::new();

    let outcome = node.run_duty_cycle(&mut bus, &mut transport, &mut store, &mut power, &mut sink);

    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.transmitted, 1);
    assert_eq!(transport.writes.len(), 1);
    assert_eq!(transport.writes[0].0, 0);
}

#[test]
fn all_failed_retry_knob_runs_a_second_pass() {
    let config = NodeConfig {
        retry_all_failed_once: true,
        ..NodeConfig::default()
    };
    let mut bus = MockBus::with_probes(1, 20.0);
    let mut sink = VecSink::new();
    let (mut node, mut power, mut store) = boot_cold(&config, &mut bus, &mut sink);
    let mut transport = MockTransport::new();

    bus.fail_all_reads = true;
    node.run_duty_cycle(&mut bus, &mut transport, &mut store, &mut power, &mut sink);

    // Two passes over the single channel, one sleep.
    assert_eq!(sink.count(|e| matches!(e, NodeEvent::ReadFailed { .. })), 2);
    assert_eq!(power.sleep_requests.len(), 1);
}

#[test]
fn rejected_write_keeps_the_old_baseline_for_the_next_cycle() {
    let config = NodeConfig::default();
    let mut bus = MockBus::with_probes(1, 20.0);
    let mut sink = VecSink::new();
    let (mut node, mut power, mut store) = boot_cold(&config, &mut bus, &mut sink);
    let mut transport = MockTransport::new();

    transport.fail_writes = true;
    let outcome = node.run_duty_cycle(&mut bus, &mut transport, &mut store, &mut power, &mut sink);

    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.transmitted, 0);
    // Baseline untouched: the same reading is re-attempted next cycle.
    let retained = store.stored.unwrap();
    assert!((retained.last_reported[0] - 0.0).abs() < f32::EPSILON);
    assert!(!retained.has_reported[0]);

    transport.fail_writes = false;
    let outcome = node.run_duty_cycle(&mut bus, &mut transport, &mut store, &mut power, &mut sink);
    assert_eq!(outcome.transmitted, 1);
}

#[test]
fn entering_sleep_event_carries_the_wake_period() {
    let config = NodeConfig::default();
    let mut bus = MockBus::with_probes(1, 20.0);
    let mut sink = VecSink::new();
    let (mut node, mut power, mut store) = boot_cold(&config, &mut bus, &mut sink);
    let mut transport = MockTransport::new();

    node.run_duty_cycle(&mut bus, &mut transport, &mut store, &mut power, &mut sink);

    assert_eq!(
        sink.count(|e| matches!(e, NodeEvent::EnteringSleep { duration_secs: 30 })),
        1
    );
}
