//! Deep-sleep power adapter.
//!
//! On ESP-IDF this wraps the timer-wakeup deep-sleep API; `enter_sleep`
//! does not return on hardware. The host backend records sleep requests
//! and lets tests inject the wake cause.

use crate::app::ports::{PowerControl, WakeContext};

pub struct DeepSleepPower {
    #[cfg(not(target_os = "espidf"))]
    sim: sim::SimPowerState,
}

impl DeepSleepPower {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            sim: sim::SimPowerState::default(),
        }
    }

    /// Override the reported wake cause (host builds only).
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_wake_cause(&mut self, cause: WakeContext) {
        self.sim.wake_cause = cause;
    }

    /// Durations passed to `enter_sleep` so far, in microseconds
    /// (host builds only).
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_sleep_requests(&self) -> &[u64] {
        &self.sim.sleep_requests
    }
}

impl Default for DeepSleepPower {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "espidf")]
impl PowerControl for DeepSleepPower {
    fn last_wake_cause(&self) -> WakeContext {
        let cause = unsafe { esp_idf_svc::sys::esp_sleep_get_wakeup_cause() };
        if cause == esp_idf_svc::sys::esp_sleep_source_t_ESP_SLEEP_WAKEUP_TIMER {
            WakeContext::TimerWake
        } else {
            // Power-on, brownout, external reset: all treated as cold boot.
            WakeContext::ColdBoot
        }
    }

    fn enter_sleep(&mut self, duration_us: u64) {
        unsafe {
            esp_idf_svc::sys::esp_sleep_enable_timer_wakeup(duration_us);
            esp_idf_svc::sys::esp_deep_sleep_start();
        }
        // Not reached: deep sleep resets the CPU.
        unreachable!("deep sleep entry returned");
    }
}

#[cfg(not(target_os = "espidf"))]
impl PowerControl for DeepSleepPower {
    fn last_wake_cause(&self) -> WakeContext {
        self.sim.wake_cause
    }

    fn enter_sleep(&mut self, duration_us: u64) {
        self.sim.sleep_requests.push(duration_us);
    }
}

#[cfg(not(target_os = "espidf"))]
mod sim {
    use crate::app::ports::WakeContext;

    pub struct SimPowerState {
        pub wake_cause: WakeContext,
        pub sleep_requests: Vec<u64>,
    }

    impl Default for SimPowerState {
        fn default() -> Self {
            Self {
                wake_cause: WakeContext::ColdBoot,
                sleep_requests: Vec::new(),
            }
        }
    }
}
