//! Node controller — the hexagonal core.
//!
//! [`NodeController`] owns the sensor bank, report filter, commissioning
//! controller, and duty-cycle scheduler, and sequences the process-wide
//! lifecycle: boot-cause detection, discovery vs. retained rebuild, signal
//! wiring, and the sample-report-sleep cycle. All I/O flows through port
//! traits injected at call sites, so the whole lifecycle runs against
//! mocks in tests.
//!
//! ```text
//!  SensorBus ──▶ ┌──────────────────────────────┐ ──▶ AttributeTransport
//!                │        NodeController         │
//!  MeshStack ◀──▶│  Bank · Filter · Commission-  │ ──▶ PowerControl
//!                │  ing FSM · DutyCycle          │ ──▶ RetainedStore
//!                └──────────────────────────────┘ ──▶ EventSink
//! ```

use log::{info, warn};

use crate::app::events::NodeEvent;
use crate::app::ports::{
    AttributeTransport, EventSink, MeshStack, PowerControl, RetainedStore, SensorBus, WakeContext,
};
use crate::commissioning::{CommissioningController, CommissioningState, StackSignal};
use crate::config::NodeConfig;
use crate::duty_cycle::{CycleOutcome, DutyCycleScheduler};
use crate::error::Error;
use crate::report::ReportFilter;
use crate::sensors::SensorBank;

/// Composes the domain modules and owns the process-wide lifecycle.
pub struct NodeController {
    commissioning: CommissioningController,
    scheduler: DutyCycleScheduler,
    bank: SensorBank,
    filter: ReportFilter,
    wake: WakeContext,
}

impl NodeController {
    /// Boot the node: detect the wake cause, then either run one-time
    /// discovery (cold boot) or rebuild the bank from retained addresses
    /// (timer wake). Fails only when a cold boot finds zero probes.
    pub fn boot(
        config: &NodeConfig,
        power: &impl PowerControl,
        store: &impl RetainedStore,
        bus: &mut impl SensorBus,
        sink: &mut impl EventSink,
    ) -> Result<Self, Error> {
        config.validate()?;

        let wake = power.last_wake_cause();
        sink.emit(&NodeEvent::Started(wake));

        let (bank, retained) = match wake {
            WakeContext::ColdBoot => {
                info!("Cold boot: running probe discovery");
                let bank = SensorBank::discover(bus)?;
                let retained = bank.seed_retained();
                sink.emit(&NodeEvent::ChannelsDiscovered {
                    count: bank.channel_count() as u8,
                });
                (bank, retained)
            }
            WakeContext::TimerWake => match store.load() {
                Some(retained) => {
                    info!(
                        "Timer wake: restoring {} channel(s) from retained state",
                        retained.channel_count
                    );
                    let bank = SensorBank::restore(&retained);
                    sink.emit(&NodeEvent::ChannelsRestored {
                        count: bank.channel_count() as u8,
                    });
                    (bank, retained)
                }
                None => {
                    // Retained memory lost (brown-out, firmware update):
                    // fall back to a full cold-boot discovery.
                    warn!("Timer wake but retained state invalid; re-running discovery");
                    let bank = SensorBank::discover(bus)?;
                    let retained = bank.seed_retained();
                    sink.emit(&NodeEvent::ChannelsDiscovered {
                        count: bank.channel_count() as u8,
                    });
                    (bank, retained)
                }
            },
        };

        Ok(Self {
            commissioning: CommissioningController::new(config.steering_retry_ms),
            scheduler: DutyCycleScheduler::new(config),
            bank,
            filter: ReportFilter::new(config.report_threshold_c, retained),
            wake,
        })
    }

    // ── Commissioning wiring ──────────────────────────────────

    /// Feed a stack signal into the commissioning machine.
    pub fn on_stack_signal(
        &mut self,
        signal: StackSignal,
        now_ms: u64,
        stack: &mut impl MeshStack,
        sink: &mut impl EventSink,
    ) {
        self.commissioning.handle_signal(signal, now_ms, stack, sink);
    }

    /// The stack's scheduler fired the steering-retry callback.
    pub fn on_retry_timer(&mut self, stack: &mut impl MeshStack, sink: &mut impl EventSink) {
        self.commissioning.handle_retry_timer(stack, sink);
    }

    /// The single "ready" flag: sampling starts only once joined.
    pub fn is_ready(&self) -> bool {
        self.commissioning.is_joined()
    }

    /// Terminal commissioning failure; the node stays awake but inert
    /// until an external reset.
    pub fn is_failed(&self) -> bool {
        self.commissioning.is_failed()
    }

    // ── Duty cycle ────────────────────────────────────────────

    /// Run one sample-report-sleep pass. The sleep request at the end is
    /// unconditional; on hardware this does not return.
    pub fn run_duty_cycle(
        &mut self,
        bus: &mut impl SensorBus,
        transport: &mut impl AttributeTransport,
        store: &mut impl RetainedStore,
        power: &mut impl PowerControl,
        sink: &mut impl EventSink,
    ) -> CycleOutcome {
        self.scheduler.run_cycle(
            &self.bank,
            &mut self.filter,
            bus,
            transport,
            store,
            power,
            sink,
        )
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn commissioning_state(&self) -> CommissioningState {
        self.commissioning.state()
    }

    pub fn wake_context(&self) -> WakeContext {
        self.wake
    }

    pub fn channel_count(&self) -> usize {
        self.bank.channel_count()
    }
}
