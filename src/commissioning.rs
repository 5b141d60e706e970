//! Network commissioning state machine.
//!
//! The Zigbee stack delivers typed signals from its own dispatch task; this
//! module turns them into a deterministic state machine. The transition
//! function is pure — `transition(state, signal, now) -> (state, effects)` —
//! and the effects (start commissioning, schedule a retry callback) are
//! executed by [`CommissioningController`] against the [`MeshStack`] port.
//! That split is what lets every join/retry path run in unit tests with no
//! live stack.
//!
//! ```text
//! Uninitialized ──SkipStartup──▶ Joining ──Steering Ok──▶ Joined
//!                                  │  ▲
//!                   Steering Err   │  │ retry timer
//!                                  ▼  │
//!                               Retrying ──Steering Ok──▶ Joined
//!                                  │
//!            non-steering error    ▼
//!        (from Joining/Retrying) Failed (terminal)
//! ```
//!
//! Steering retries are unbounded with a fixed backoff: an end device that
//! cannot find a network keeps trying every `steering_retry_ms` until it
//! joins or is factory reset.

use heapless::Vec;
use log::{info, warn};

use crate::app::events::NodeEvent;
use crate::app::ports::{CommissioningMode, EventSink, MeshStack};

// ---------------------------------------------------------------------------
// States and signals
// ---------------------------------------------------------------------------

/// One instance, process-wide. Created at stack init; transitions driven
/// exclusively by stack signals and the retry timer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommissioningState {
    /// Stack not started yet.
    Uninitialized,
    /// Commissioning in flight (initialisation or steering).
    Joining,
    /// Steering failed; a re-attempt is scheduled for `deadline_ms`.
    Retrying { deadline_ms: u64 },
    /// On a network. Never re-enters `Joining` except via factory reset.
    Joined,
    /// Non-steering stack failure. Terminal until external reset.
    Failed,
}

/// Signal kinds the stack can deliver. `Other` preserves the raw code for
/// logging; the machine deliberately ignores kinds it does not recognise so
/// stack version drift cannot wedge it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    SkipStartup,
    FirstStart,
    Reboot,
    Steering,
    Other(u16),
}

/// Status code attached to every signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalStatus {
    Ok,
    Error(i32),
}

/// One signal as delivered by the stack's dispatch task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackSignal {
    pub kind: SignalKind,
    pub status: SignalStatus,
    /// True when the device has no stored network (factory-new); only
    /// meaningful on `FirstStart` / `Reboot` signals.
    pub factory_new: bool,
}

impl StackSignal {
    pub fn ok(kind: SignalKind) -> Self {
        Self {
            kind,
            status: SignalStatus::Ok,
            factory_new: false,
        }
    }

    pub fn error(kind: SignalKind, code: i32) -> Self {
        Self {
            kind,
            status: SignalStatus::Error(code),
            factory_new: false,
        }
    }

    pub fn with_factory_new(mut self, factory_new: bool) -> Self {
        self.factory_new = factory_new;
        self
    }
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// Side effects a transition requests. Executed by the caller, never by the
/// transition function itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Call `MeshStack::start_commissioning(mode)`.
    StartCommissioning(CommissioningMode),
    /// Call `MeshStack::schedule_retry(delay_ms)` — exactly one per failure.
    ScheduleRetry { delay_ms: u32 },
    /// Log the joined network's identity (extended PAN ID, channel, address).
    LogNetworkIdentity,
}

/// A transition never requests more than two effects.
pub type Effects = Vec<Effect, 2>;

// ---------------------------------------------------------------------------
// Pure transition function
// ---------------------------------------------------------------------------

/// Apply one stack signal to the machine.
///
/// `now_ms` is the monotonic time the signal was observed, used to compute
/// the retry deadline; `retry_delay_ms` is the fixed steering backoff.
pub fn transition(
    state: CommissioningState,
    signal: StackSignal,
    now_ms: u64,
    retry_delay_ms: u32,
) -> (CommissioningState, Effects) {
    use CommissioningState as S;
    use SignalKind as K;
    use SignalStatus as St;

    let mut effects = Effects::new();

    let next = match (state, signal.kind, signal.status) {
        // Stack came up: start base device behaviour initialisation.
        (S::Uninitialized, K::SkipStartup, _) => {
            let _ = effects.push(Effect::StartCommissioning(CommissioningMode::Initialization));
            S::Joining
        }

        // Device start during join. Factory-new devices need steering;
        // a device with a stored network rejoins without it.
        (S::Joining, K::FirstStart | K::Reboot, St::Ok) => {
            if signal.factory_new {
                let _ = effects.push(Effect::StartCommissioning(CommissioningMode::NetworkSteering));
                S::Joining
            } else {
                S::Joined
            }
        }

        // Steering completed: joined. Idempotent once there.
        (S::Joining | S::Retrying { .. }, K::Steering, St::Ok) => {
            let _ = effects.push(Effect::LogNetworkIdentity);
            S::Joined
        }
        (S::Joined, K::Steering, St::Ok) => S::Joined,

        // Steering failed: schedule exactly one retry at a fixed delay.
        (S::Joining | S::Retrying { .. }, K::Steering, St::Error(_)) => {
            let _ = effects.push(Effect::ScheduleRetry {
                delay_ms: retry_delay_ms,
            });
            S::Retrying {
                deadline_ms: now_ms + u64::from(retry_delay_ms),
            }
        }

        // Any other error during join is terminal: no automatic recovery.
        (S::Joining | S::Retrying { .. }, _, St::Error(_)) => S::Failed,

        // Everything else (unrecognised kinds, signals in terminal states)
        // is logged by the controller and leaves the state untouched.
        (s, _, _) => s,
    };

    (next, effects)
}

/// The scheduled retry callback fired: re-issue steering.
pub fn retry_fired(state: CommissioningState) -> (CommissioningState, Effects) {
    let mut effects = Effects::new();
    match state {
        CommissioningState::Retrying { .. } => {
            let _ = effects.push(Effect::StartCommissioning(CommissioningMode::NetworkSteering));
            (CommissioningState::Joining, effects)
        }
        // A stale callback after join (or failure) is a no-op.
        s => (s, effects),
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Thin stateful wrapper: holds the current state, runs the pure transition
/// function, and executes the requested effects against the stack port.
pub struct CommissioningController {
    state: CommissioningState,
    retry_delay_ms: u32,
}

impl CommissioningController {
    pub fn new(retry_delay_ms: u32) -> Self {
        Self {
            state: CommissioningState::Uninitialized,
            retry_delay_ms,
        }
    }

    pub fn state(&self) -> CommissioningState {
        self.state
    }

    /// The single "ready" flag the rest of the system watches.
    pub fn is_joined(&self) -> bool {
        self.state == CommissioningState::Joined
    }

    pub fn is_failed(&self) -> bool {
        self.state == CommissioningState::Failed
    }

    /// Feed one stack signal through the machine and execute its effects.
    pub fn handle_signal(
        &mut self,
        signal: StackSignal,
        now_ms: u64,
        stack: &mut impl MeshStack,
        sink: &mut impl EventSink,
    ) {
        let prev = self.state;
        let (next, effects) = transition(prev, signal, now_ms, self.retry_delay_ms);

        if next == prev && effects.is_empty() {
            info!(
                "Commissioning: ignoring signal {:?} ({:?}) in {:?}",
                signal.kind, signal.status, prev
            );
            return;
        }

        self.state = next;
        self.run_effects(&effects, stack, sink);

        if next != prev {
            if next == CommissioningState::Failed {
                warn!(
                    "Commissioning failed on {:?} ({:?}); node halted until reset",
                    signal.kind, signal.status
                );
            }
            sink.emit(&NodeEvent::CommissioningChanged {
                from: prev,
                to: next,
            });
            if next == CommissioningState::Joined {
                sink.emit(&NodeEvent::NetworkJoined(stack.network_info()));
            }
        }
    }

    /// The stack's scheduler invoked our retry callback.
    pub fn handle_retry_timer(&mut self, stack: &mut impl MeshStack, sink: &mut impl EventSink) {
        let prev = self.state;
        let (next, effects) = retry_fired(prev);
        self.state = next;
        self.run_effects(&effects, stack, sink);
        if next != prev {
            sink.emit(&NodeEvent::CommissioningChanged {
                from: prev,
                to: next,
            });
        }
    }

    fn run_effects(
        &mut self,
        effects: &Effects,
        stack: &mut impl MeshStack,
        _sink: &mut impl EventSink,
    ) {
        for effect in effects {
            match effect {
                Effect::StartCommissioning(mode) => {
                    if let Err(e) = stack.start_commissioning(*mode) {
                        warn!("Commissioning: start({:?}) rejected: {}", mode, e);
                    }
                }
                Effect::ScheduleRetry { delay_ms } => {
                    info!("Commissioning: steering failed, retrying in {} ms", delay_ms);
                    stack.schedule_retry(*delay_ms);
                }
                Effect::LogNetworkIdentity => {
                    let net = stack.network_info();
                    info!(
                        "Joined network (Extended PAN ID: {:02x?}, PAN ID: 0x{:04x}, \
                         Channel: {}, Short Address: 0x{:04x})",
                        net.extended_pan_id, net.pan_id, net.channel, net.short_address
                    );
                }
            }
        }
    }
}
