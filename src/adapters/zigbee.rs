//! Zigbee stack adapter.
//!
//! Two responsibilities:
//!
//! 1. Translate raw stack signals (`esp_zb_app_signal_handler` arguments)
//!    into typed [`StackSignal`]s. This is plain data mapping and compiles
//!    on every target so the mapping itself is unit-testable.
//! 2. Implement [`MeshStack`] and [`AttributeTransport`] against the ESP
//!    Zigbee SDK FFI on device, with a recording backend for host builds.
//!
//! The temperature measurement cluster is served on one endpoint per
//! channel, starting at [`BASE_ENDPOINT`].

use crate::app::ports::{AttributeTransport, CommissioningMode, MeshStack, NetworkInfo};
use crate::commissioning::{SignalKind, StackSignal};
use crate::error::TransportError;

/// Endpoint for channel 0; channel `i` is served on `BASE_ENDPOINT + i`.
pub const BASE_ENDPOINT: u8 = 10;

// App signal types delivered by the stack (esp_zb_app_signal_type_t).
pub const SIGNAL_SKIP_STARTUP: u32 = 1;
pub const SIGNAL_DEVICE_FIRST_START: u32 = 5;
pub const SIGNAL_DEVICE_REBOOT: u32 = 6;
pub const SIGNAL_STEERING: u32 = 10;

/// Map one raw stack signal to the typed form the state machine consumes.
///
/// `factory_new` is sampled by the caller (inside the signal handler, where
/// the stack context is valid) rather than queried here.
pub fn signal_from_raw(sig_type: u32, status: i32, factory_new: bool) -> StackSignal {
    let kind = match sig_type {
        SIGNAL_SKIP_STARTUP => SignalKind::SkipStartup,
        SIGNAL_DEVICE_FIRST_START => SignalKind::FirstStart,
        SIGNAL_DEVICE_REBOOT => SignalKind::Reboot,
        SIGNAL_STEERING => SignalKind::Steering,
        other => SignalKind::Other(other as u16),
    };
    let signal = if status == 0 {
        StackSignal::ok(kind)
    } else {
        StackSignal::error(kind, status)
    };
    signal.with_factory_new(factory_new)
}

// ───────────────────────────────────────────────────────────────
// ESP Zigbee SDK FFI
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod ffi {
    // The Zigbee SDK ships as an extra IDF component; esp-idf-sys does not
    // generate bindings for it, so the handful of calls we need are
    // declared here.
    unsafe extern "C" {
        pub fn esp_zb_bdb_start_top_level_commissioning(mode_mask: u32) -> i32;
        pub fn esp_zb_bdb_is_factory_new() -> bool;
        pub fn esp_zb_scheduler_alarm(
            callback: unsafe extern "C" fn(u8),
            param: u8,
            time_ms: u32,
        );
        pub fn esp_zb_lock_acquire(block_ticks: u32) -> bool;
        pub fn esp_zb_lock_release();
        pub fn esp_zb_zcl_set_attribute_val(
            endpoint: u8,
            cluster_id: u16,
            cluster_role: u8,
            attr_id: u16,
            value_p: *mut core::ffi::c_void,
            check: bool,
        ) -> u8;
        pub fn esp_zb_get_pan_id() -> u16;
        pub fn esp_zb_get_current_channel() -> u8;
        pub fn esp_zb_get_short_address() -> u16;
        pub fn esp_zb_get_extended_pan_id(ext_pan_id: *mut u8);
    }

    pub const BDB_MODE_INITIALIZATION: u32 = 0x00;
    pub const BDB_MODE_NETWORK_STEERING: u32 = 0x02;

    pub const CLUSTER_ID_TEMP_MEASUREMENT: u16 = 0x0402;
    pub const CLUSTER_SERVER_ROLE: u8 = 0x01;
    pub const ATTR_TEMP_MEASUREMENT_VALUE_ID: u16 = 0x0000;
    pub const ZCL_STATUS_SUCCESS: u8 = 0x00;
}

// ───────────────────────────────────────────────────────────────
// Stack bring-up (device only)
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod bringup {
    use super::{BASE_ENDPOINT, signal_from_raw, stack_is_factory_new};
    use crate::commissioning::StackSignal;
    use crate::error::{Error, TransportError};

    /// `esp_zb_app_signal_t` as delivered to `esp_zb_app_signal_handler`.
    #[repr(C)]
    pub struct RawAppSignal {
        pub p_app_signal: *mut u32,
        pub esp_err_status: i32,
    }

    // End-device network configuration (esp_zb_cfg_t, ZED variant).
    #[repr(C)]
    struct ZedCfg {
        ed_timeout: u8,
        keep_alive: u32,
    }

    #[repr(C)]
    struct ZbCfg {
        esp_zb_role: u32,
        install_code_policy: bool,
        nwk_cfg: ZedCfg,
    }

    #[repr(C)]
    struct TempMeasCfg {
        measured_value: i16,
        min_value: i16,
        max_value: i16,
    }

    const DEVICE_TYPE_ED: u32 = 2;
    const ED_AGING_TIMEOUT_64MIN: u8 = 8;
    const ED_KEEP_ALIVE_MS: u32 = 3000;
    // 2.4 GHz channels 11-26.
    const PRIMARY_CHANNEL_MASK: u32 = 0x07FF_F800;
    // ZCL "value unknown" sentinel for the measured-value attribute.
    const VALUE_UNKNOWN: i16 = i16::MIN;

    unsafe extern "C" {
        fn esp_zb_init(nwk_cfg: *mut core::ffi::c_void);
        fn esp_zb_set_primary_network_channel_set(channel_mask: u32) -> i32;
        fn esp_zb_start(autostart: bool) -> i32;
        fn esp_zb_stack_main_loop();
        fn esp_zb_device_register(ep_list: *mut core::ffi::c_void) -> i32;
        fn esp_zb_ep_list_create() -> *mut core::ffi::c_void;
        fn esp_zb_temperature_sensor_ep_create(
            ep_list: *mut core::ffi::c_void,
            endpoint: u8,
            cfg: *mut core::ffi::c_void,
        ) -> i32;
    }

    /// Read the stack's signal struct into the typed form. Must run inside
    /// the signal handler, where the stack context is valid.
    ///
    /// # Safety
    /// `raw` and its inner `p_app_signal` pointer must be the live struct
    /// the stack passed to the handler.
    pub unsafe fn translate_app_signal(raw: *mut RawAppSignal) -> StackSignal {
        let sig_type = unsafe { *(*raw).p_app_signal };
        let status = unsafe { (*raw).esp_err_status };
        let factory_new = matches!(
            sig_type,
            super::SIGNAL_DEVICE_FIRST_START | super::SIGNAL_DEVICE_REBOOT
        ) && stack_is_factory_new();
        signal_from_raw(sig_type, status, factory_new)
    }

    /// Initialise the stack as a sleepy end device and register one
    /// temperature measurement endpoint per channel. Does not start
    /// commissioning; that is driven by the signal handler.
    pub fn init_stack(
        channel_count: u8,
        min_centi_c: i16,
        max_centi_c: i16,
    ) -> Result<(), Error> {
        let mut cfg = ZbCfg {
            esp_zb_role: DEVICE_TYPE_ED,
            install_code_policy: false,
            nwk_cfg: ZedCfg {
                ed_timeout: ED_AGING_TIMEOUT_64MIN,
                keep_alive: ED_KEEP_ALIVE_MS,
            },
        };
        unsafe { esp_zb_init((&mut cfg as *mut ZbCfg).cast()) };

        let ep_list = unsafe { esp_zb_ep_list_create() };
        for index in 0..channel_count {
            let mut meas = TempMeasCfg {
                measured_value: VALUE_UNKNOWN,
                min_value: min_centi_c,
                max_value: max_centi_c,
            };
            let err = unsafe {
                esp_zb_temperature_sensor_ep_create(
                    ep_list,
                    BASE_ENDPOINT + index,
                    (&mut meas as *mut TempMeasCfg).cast(),
                )
            };
            if err != 0 {
                return Err(Error::Transport(TransportError::StackNotReady));
            }
        }
        if unsafe { esp_zb_device_register(ep_list) } != 0 {
            return Err(Error::Transport(TransportError::StackNotReady));
        }

        if unsafe { esp_zb_set_primary_network_channel_set(PRIMARY_CHANNEL_MASK) } != 0 {
            return Err(Error::Transport(TransportError::StackNotReady));
        }
        if unsafe { esp_zb_start(false) } != 0 {
            return Err(Error::Transport(TransportError::StackNotReady));
        }
        Ok(())
    }

    /// The stack's dispatch loop; blocks forever. Run on its own task.
    pub fn run_stack_loop() -> ! {
        unsafe { esp_zb_stack_main_loop() };
        unreachable!("stack main loop returned");
    }
}

#[cfg(target_os = "espidf")]
pub use bringup::{RawAppSignal, init_stack, run_stack_loop, translate_app_signal};

#[cfg(target_os = "espidf")]
mod retry_flag {
    use core::sync::atomic::{AtomicBool, Ordering};

    // Set from the stack scheduler's callback context, drained by the main
    // loop. A plain flag suffices: retries never pile up faster than the
    // loop drains them (one scheduled per failure).
    static RETRY_PENDING: AtomicBool = AtomicBool::new(false);

    pub unsafe extern "C" fn alarm_fired(_param: u8) {
        RETRY_PENDING.store(true, Ordering::Release);
    }

    pub fn take() -> bool {
        RETRY_PENDING.swap(false, Ordering::AcqRel)
    }
}

/// True once the scheduled steering-retry alarm has fired. Clears the flag.
#[cfg(target_os = "espidf")]
pub fn take_retry_pending() -> bool {
    retry_flag::take()
}

/// Whether the device has no stored network. Only valid inside the stack's
/// signal handler context.
#[cfg(target_os = "espidf")]
pub fn stack_is_factory_new() -> bool {
    unsafe { ffi::esp_zb_bdb_is_factory_new() }
}

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

pub struct ZigbeeStack {
    #[cfg(not(target_os = "espidf"))]
    sim: sim::SimStackState,
}

impl ZigbeeStack {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            sim: sim::SimStackState::default(),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_network_info(&mut self, info: NetworkInfo) {
        self.sim.network_info = info;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_commissioning_requests(&self) -> &[CommissioningMode] {
        &self.sim.commissioning_requests
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_retry_delays(&self) -> &[u32] {
        &self.sim.retry_delays
    }

    /// Attribute writes recorded as `(endpoint, scaled value)` pairs
    /// (host builds only).
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_attribute_writes(&self) -> &[(u8, i16)] {
        &self.sim.attribute_writes
    }

    /// Make every subsequent attribute write fail (host builds only).
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_fail_writes(&mut self) {
        self.sim.fail_writes = true;
    }
}

impl Default for ZigbeeStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "espidf")]
impl MeshStack for ZigbeeStack {
    fn start_commissioning(&mut self, mode: CommissioningMode) -> Result<(), TransportError> {
        let mask = match mode {
            CommissioningMode::Initialization => ffi::BDB_MODE_INITIALIZATION,
            CommissioningMode::NetworkSteering => ffi::BDB_MODE_NETWORK_STEERING,
        };
        let err = unsafe { ffi::esp_zb_bdb_start_top_level_commissioning(mask) };
        if err == 0 {
            Ok(())
        } else {
            Err(TransportError::StackNotReady)
        }
    }

    fn schedule_retry(&mut self, delay_ms: u32) {
        unsafe { ffi::esp_zb_scheduler_alarm(retry_flag::alarm_fired, 0, delay_ms) };
    }

    fn network_info(&self) -> NetworkInfo {
        let mut extended_pan_id = [0u8; 8];
        unsafe {
            ffi::esp_zb_get_extended_pan_id(extended_pan_id.as_mut_ptr());
            NetworkInfo {
                extended_pan_id,
                pan_id: ffi::esp_zb_get_pan_id(),
                channel: ffi::esp_zb_get_current_channel(),
                short_address: ffi::esp_zb_get_short_address(),
            }
        }
    }
}

#[cfg(target_os = "espidf")]
impl AttributeTransport for ZigbeeStack {
    fn write_temperature(
        &mut self,
        channel_index: u8,
        scaled_centi_c: i16,
    ) -> Result<(), TransportError> {
        let endpoint = BASE_ENDPOINT + channel_index;
        let mut value = scaled_centi_c;

        // The stack owns the attribute tables; writes must hold its lock.
        if !unsafe { ffi::esp_zb_lock_acquire(u32::MAX) } {
            return Err(TransportError::StackNotReady);
        }
        let status = unsafe {
            ffi::esp_zb_zcl_set_attribute_val(
                endpoint,
                ffi::CLUSTER_ID_TEMP_MEASUREMENT,
                ffi::CLUSTER_SERVER_ROLE,
                ffi::ATTR_TEMP_MEASUREMENT_VALUE_ID,
                (&mut value as *mut i16).cast(),
                false,
            )
        };
        unsafe { ffi::esp_zb_lock_release() };

        if status == ffi::ZCL_STATUS_SUCCESS {
            Ok(())
        } else {
            Err(TransportError::WriteFailed)
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl MeshStack for ZigbeeStack {
    fn start_commissioning(&mut self, mode: CommissioningMode) -> Result<(), TransportError> {
        self.sim.commissioning_requests.push(mode);
        Ok(())
    }

    fn schedule_retry(&mut self, delay_ms: u32) {
        self.sim.retry_delays.push(delay_ms);
    }

    fn network_info(&self) -> NetworkInfo {
        self.sim.network_info
    }
}

#[cfg(not(target_os = "espidf"))]
impl AttributeTransport for ZigbeeStack {
    fn write_temperature(
        &mut self,
        channel_index: u8,
        scaled_centi_c: i16,
    ) -> Result<(), TransportError> {
        if self.sim.fail_writes {
            return Err(TransportError::WriteFailed);
        }
        self.sim
            .attribute_writes
            .push((BASE_ENDPOINT + channel_index, scaled_centi_c));
        Ok(())
    }
}

#[cfg(not(target_os = "espidf"))]
mod sim {
    use crate::app::ports::{CommissioningMode, NetworkInfo};

    #[derive(Default)]
    pub struct SimStackState {
        pub network_info: NetworkInfo,
        pub commissioning_requests: Vec<CommissioningMode>,
        pub retry_delays: Vec<u32>,
        pub attribute_writes: Vec<(u8, i16)>,
        pub fail_writes: bool,
    }
}
