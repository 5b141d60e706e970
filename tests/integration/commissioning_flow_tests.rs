//! Commissioning flow tests: the full join path through the node
//! controller, driven by the same signal sequences the stack delivers on
//! hardware.

use crate::mock_ports::{MockBus, MockPower, MockRetained, VecSink};
use thermnode::adapters::zigbee::{
    SIGNAL_DEVICE_FIRST_START, SIGNAL_SKIP_STARTUP, SIGNAL_STEERING, signal_from_raw,
};
use thermnode::app::events::NodeEvent;
use thermnode::app::ports::CommissioningMode;
use thermnode::app::service::NodeController;
use thermnode::commissioning::{CommissioningState, SignalKind, StackSignal};
use thermnode::config::NodeConfig;

use crate::mock_ports::MockStack;

fn booted_node(sink: &mut VecSink) -> NodeController {
    let config = NodeConfig::default();
    let mut bus = MockBus::with_probes(1, 20.0);
    let power = MockPower::cold_boot();
    let store = MockRetained::empty();
    NodeController::boot(&config, &power, &store, &mut bus, sink).unwrap()
}

#[test]
fn factory_new_device_joins_via_steering() {
    let mut sink = VecSink::new();
    let mut stack = MockStack::new();
    let mut node = booted_node(&mut sink);

    node.on_stack_signal(StackSignal::ok(SignalKind::SkipStartup), 0, &mut stack, &mut sink);
    assert_eq!(
        stack.commissioning_requests,
        vec![CommissioningMode::Initialization]
    );

    node.on_stack_signal(
        StackSignal::ok(SignalKind::FirstStart).with_factory_new(true),
        100,
        &mut stack,
        &mut sink,
    );
    assert_eq!(
        stack.commissioning_requests,
        vec![
            CommissioningMode::Initialization,
            CommissioningMode::NetworkSteering
        ]
    );
    assert!(!node.is_ready());

    node.on_stack_signal(StackSignal::ok(SignalKind::Steering), 2500, &mut stack, &mut sink);
    assert!(node.is_ready());

    // The joined event carries the stack's network identity.
    let joined: Vec<_> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            NodeEvent::NetworkJoined(net) => Some(*net),
            _ => None,
        })
        .collect();
    assert_eq!(joined, vec![stack.network_info]);
}

#[test]
fn rebooted_device_with_stored_network_skips_steering() {
    let mut sink = VecSink::new();
    let mut stack = MockStack::new();
    let mut node = booted_node(&mut sink);

    node.on_stack_signal(StackSignal::ok(SignalKind::SkipStartup), 0, &mut stack, &mut sink);
    node.on_stack_signal(
        StackSignal::ok(SignalKind::Reboot).with_factory_new(false),
        100,
        &mut stack,
        &mut sink,
    );

    assert!(node.is_ready());
    // Initialization only: no steering was requested.
    assert_eq!(
        stack.commissioning_requests,
        vec![CommissioningMode::Initialization]
    );
}

#[test]
fn steering_failure_retries_at_the_fixed_backoff() {
    let mut sink = VecSink::new();
    let mut stack = MockStack::new();
    let mut node = booted_node(&mut sink);

    node.on_stack_signal(StackSignal::ok(SignalKind::SkipStartup), 0, &mut stack, &mut sink);
    node.on_stack_signal(
        StackSignal::ok(SignalKind::FirstStart).with_factory_new(true),
        100,
        &mut stack,
        &mut sink,
    );

    // Three consecutive steering failures: one scheduled retry each.
    for round in 0u64..3 {
        node.on_stack_signal(
            StackSignal::error(SignalKind::Steering, -1),
            1_000 + round * 2_000,
            &mut stack,
            &mut sink,
        );
        assert_eq!(stack.retry_delays.len(), round as usize + 1);
        node.on_retry_timer(&mut stack, &mut sink);
    }
    assert_eq!(stack.retry_delays, vec![1000, 1000, 1000]);

    // Fourth attempt succeeds.
    node.on_stack_signal(StackSignal::ok(SignalKind::Steering), 9_000, &mut stack, &mut sink);
    assert!(node.is_ready());
}

#[test]
fn duplicate_steering_success_is_idempotent() {
    let mut sink = VecSink::new();
    let mut stack = MockStack::new();
    let mut node = booted_node(&mut sink);

    node.on_stack_signal(StackSignal::ok(SignalKind::SkipStartup), 0, &mut stack, &mut sink);
    node.on_stack_signal(StackSignal::ok(SignalKind::Steering), 100, &mut stack, &mut sink);
    assert!(node.is_ready());

    // The stack re-delivers the same success; nothing changes.
    node.on_stack_signal(StackSignal::ok(SignalKind::Steering), 200, &mut stack, &mut sink);
    assert!(node.is_ready());
    assert_eq!(
        sink.count(|e| matches!(e, NodeEvent::NetworkJoined(_))),
        1
    );
}

#[test]
fn non_steering_failure_is_terminal() {
    let mut sink = VecSink::new();
    let mut stack = MockStack::new();
    let mut node = booted_node(&mut sink);

    node.on_stack_signal(StackSignal::ok(SignalKind::SkipStartup), 0, &mut stack, &mut sink);
    node.on_stack_signal(
        StackSignal::error(SignalKind::Reboot, -3),
        100,
        &mut stack,
        &mut sink,
    );

    assert!(node.is_failed());
    assert!(!node.is_ready());
    assert_eq!(node.commissioning_state(), CommissioningState::Failed);

    // Nothing revives a failed node short of a reset.
    node.on_stack_signal(StackSignal::ok(SignalKind::Steering), 200, &mut stack, &mut sink);
    node.on_retry_timer(&mut stack, &mut sink);
    assert!(node.is_failed());
}

#[test]
fn stale_retry_timer_after_join_does_not_restart_steering() {
    let mut sink = VecSink::new();
    let mut stack = MockStack::new();
    let mut node = booted_node(&mut sink);

    node.on_stack_signal(StackSignal::ok(SignalKind::SkipStartup), 0, &mut stack, &mut sink);
    node.on_stack_signal(StackSignal::ok(SignalKind::Steering), 100, &mut stack, &mut sink);
    let requests_before = stack.commissioning_requests.len();

    node.on_retry_timer(&mut stack, &mut sink);
    assert!(node.is_ready());
    assert_eq!(stack.commissioning_requests.len(), requests_before);
}

#[test]
fn raw_signal_sequence_drives_the_same_join() {
    // The exact sequence the stack delivers on a factory-new first start,
    // expressed as raw (type, status) pairs.
    let mut sink = VecSink::new();
    let mut stack = MockStack::new();
    let mut node = booted_node(&mut sink);

    node.on_stack_signal(signal_from_raw(SIGNAL_SKIP_STARTUP, 0, false), 0, &mut stack, &mut sink);
    node.on_stack_signal(
        signal_from_raw(SIGNAL_DEVICE_FIRST_START, 0, true),
        100,
        &mut stack,
        &mut sink,
    );
    node.on_stack_signal(signal_from_raw(SIGNAL_STEERING, -1, false), 200, &mut stack, &mut sink);
    node.on_retry_timer(&mut stack, &mut sink);
    node.on_stack_signal(signal_from_raw(SIGNAL_STEERING, 0, false), 1_300, &mut stack, &mut sink);

    assert!(node.is_ready());
    assert_eq!(stack.retry_delays, vec![1000]);
}
