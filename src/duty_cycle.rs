//! Duty-cycle orchestration: sample → filter → report → sleep.
//!
//! One cycle per wake period. Per-channel read failures are recorded and
//! skipped — one probe's fault never blocks another's report. The cycle's
//! terminal action is the sleep request; on real hardware that call does
//! not return, so storing retained state happens strictly before it.
//!
//! A cycle in which every read fails still goes to sleep: bounding awake
//! time (and battery draw) wins over catching one missed interval. The
//! `retry_all_failed_once` config knob flips that trade-off for
//! deployments that prefer a second attempt before powering down.

use log::{info, warn};

use crate::app::events::NodeEvent;
use crate::app::ports::{AttributeTransport, EventSink, PowerControl, RetainedStore, SensorBus};
use crate::config::NodeConfig;
use crate::report::ReportFilter;
use crate::sensors::{SensorBank, ds18b20};

/// What one duty cycle did, for logging and tests. On hardware the sleep
/// request never returns, so this is only observable with a mock power port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Channels the cycle attempted to read.
    pub attempted: u8,
    /// Reads that returned a value.
    pub succeeded: u8,
    /// Reports actually written to the transport.
    pub transmitted: u8,
    /// Reads that failed and were skipped.
    pub failed: u8,
}

/// Runs one sample-report-sleep pass per wake period.
pub struct DutyCycleScheduler {
    wake_period_secs: u32,
    wake_period_us: u64,
    retry_all_failed_once: bool,
}

impl DutyCycleScheduler {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            wake_period_secs: config.wake_period_secs,
            wake_period_us: config.wake_period_us(),
            retry_all_failed_once: config.retry_all_failed_once,
        }
    }

    /// Execute one full duty cycle. The final `enter_sleep` is
    /// unconditional and uncancellable.
    pub fn run_cycle(
        &self,
        bank: &SensorBank,
        filter: &mut ReportFilter,
        bus: &mut impl SensorBus,
        transport: &mut impl AttributeTransport,
        store: &mut impl RetainedStore,
        power: &mut impl PowerControl,
        sink: &mut impl EventSink,
    ) -> CycleOutcome {
        let mut outcome = self.sample_all(bank, filter, bus, transport, sink);

        if outcome.succeeded == 0 && outcome.attempted > 0 && self.retry_all_failed_once {
            warn!("All {} channel read(s) failed, retrying once", outcome.attempted);
            outcome = self.sample_all(bank, filter, bus, transport, sink);
        }

        if outcome.succeeded == 0 && outcome.attempted > 0 {
            warn!("Cycle produced no readings; sleeping until next wake");
        }

        store.store(filter.retained());

        sink.emit(&NodeEvent::EnteringSleep {
            duration_secs: self.wake_period_secs,
        });
        info!(
            "Cycle done ({}/{} reads, {} transmitted); sleeping {} s",
            outcome.succeeded, outcome.attempted, outcome.transmitted, self.wake_period_secs
        );
        power.enter_sleep(self.wake_period_us);

        outcome
    }

    /// One pass over every channel.
    fn sample_all(
        &self,
        bank: &SensorBank,
        filter: &mut ReportFilter,
        bus: &mut impl SensorBus,
        transport: &mut impl AttributeTransport,
        sink: &mut impl EventSink,
    ) -> CycleOutcome {
        let mut outcome = CycleOutcome::default();

        for channel in bank.channels() {
            outcome.attempted += 1;

            let celsius = match bank.read(bus, channel.index) {
                Ok(value) => value,
                Err(error) => {
                    outcome.failed += 1;
                    warn!("Channel {} read failed: {}", channel.index, error);
                    sink.emit(&NodeEvent::ReadFailed {
                        channel: channel.index,
                        error,
                    });
                    continue;
                }
            };
            outcome.succeeded += 1;

            let report = filter.evaluate(channel.index, celsius);
            info!(
                "Channel {}: {:.2} C, delta {:.2} C",
                channel.index, report.raw_value, report.delta
            );

            let mut transmitted = false;
            if report.should_transmit {
                let scaled = ds18b20::celsius_to_attribute(report.raw_value);
                match transport.write_temperature(channel.index, scaled) {
                    Ok(()) => {
                        // Baseline moves only after the write went through;
                        // a rejected write is re-attempted next cycle.
                        filter.commit(&report);
                        outcome.transmitted += 1;
                        transmitted = true;
                    }
                    Err(e) => {
                        warn!("Channel {} attribute write failed: {}", channel.index, e);
                    }
                }
            } else {
                info!("Channel {} change too small, not sending", channel.index);
            }

            sink.emit(&NodeEvent::SampleEvaluated {
                channel: channel.index,
                celsius: report.raw_value,
                delta: report.delta,
                transmitted,
            });
        }

        outcome
    }
}
