//! Retained-state store adapter.
//!
//! On ESP-IDF the blob lives in RTC slow memory, which survives timed deep
//! sleep but not a power cycle. A magic word plus a length prefix guard
//! against reading garbage after cold boot; the payload itself is a
//! postcard-encoded [`RetainedState`] that must also pass `is_plausible()`
//! before it is handed to the domain.
//!
//! The host backend keeps the encoded bytes in memory so tests exercise
//! the same encode/decode/validate path as the device.

use log::warn;

use crate::app::ports::RetainedStore;
use crate::report::RetainedState;

/// "THM1" — bumped whenever the encoded layout changes.
#[cfg(target_os = "espidf")]
const RETAINED_MAGIC: u32 = 0x5448_4D31;

/// Upper bound on the postcard encoding of [`RetainedState`].
const RETAINED_BLOB_CAP: usize = 64;

#[cfg(target_os = "espidf")]
mod rtc {
    use super::RETAINED_BLOB_CAP;

    // RTC slow memory. Written only from the main task at sleep entry and
    // read only once at boot before any other task starts.
    #[unsafe(link_section = ".rtc.data")]
    pub static mut MAGIC: u32 = 0;
    #[unsafe(link_section = ".rtc.data")]
    pub static mut LEN: u8 = 0;
    #[unsafe(link_section = ".rtc.data")]
    pub static mut BLOB: [u8; RETAINED_BLOB_CAP] = [0; RETAINED_BLOB_CAP];
}

pub struct RtcRetainedStore {
    #[cfg(not(target_os = "espidf"))]
    sim_blob: Option<(u8, [u8; RETAINED_BLOB_CAP])>,
}

impl RtcRetainedStore {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            sim_blob: None,
        }
    }

    /// Corrupt the stored magic so the next load fails (host builds only).
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_corrupt(&mut self) {
        if let Some((len, _)) = &mut self.sim_blob {
            *len = 0;
        }
    }

    fn decode(blob: &[u8]) -> Option<RetainedState> {
        let state: RetainedState = match postcard::from_bytes(blob) {
            Ok(state) => state,
            Err(e) => {
                warn!("Retained blob failed to decode: {}", e);
                return None;
            }
        };
        if !state.is_plausible() {
            warn!("Retained blob decoded but is implausible, discarding");
            return None;
        }
        Some(state)
    }

    fn encode(state: &RetainedState) -> Option<(u8, [u8; RETAINED_BLOB_CAP])> {
        let mut buf = [0u8; RETAINED_BLOB_CAP];
        match postcard::to_slice(state, &mut buf) {
            Ok(used) => {
                let len = used.len() as u8;
                Some((len, buf))
            }
            Err(e) => {
                warn!("Retained state too large to store: {}", e);
                None
            }
        }
    }
}

impl Default for RtcRetainedStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "espidf")]
impl RetainedStore for RtcRetainedStore {
    fn load(&self) -> Option<RetainedState> {
        // Safety: RTC statics are read once at boot, before any concurrent
        // writer exists.
        let (magic, len) = unsafe { (*(&raw const rtc::MAGIC), *(&raw const rtc::LEN)) };
        if magic != RETAINED_MAGIC || len == 0 || usize::from(len) > RETAINED_BLOB_CAP {
            return None;
        }
        let blob = unsafe { *(&raw const rtc::BLOB) };
        Self::decode(&blob[..usize::from(len)])
    }

    fn store(&mut self, state: &RetainedState) {
        let Some((len, blob)) = Self::encode(state) else {
            return;
        };
        // Safety: single writer (main task), invalidate-then-write so a
        // reset mid-store reads as "no retained state" rather than garbage.
        unsafe {
            *(&raw mut rtc::MAGIC) = 0;
            *(&raw mut rtc::LEN) = len;
            *(&raw mut rtc::BLOB) = blob;
            *(&raw mut rtc::MAGIC) = RETAINED_MAGIC;
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl RetainedStore for RtcRetainedStore {
    fn load(&self) -> Option<RetainedState> {
        let (len, blob) = self.sim_blob.as_ref()?;
        if *len == 0 {
            return None;
        }
        Self::decode(&blob[..usize::from(*len)])
    }

    fn store(&mut self, state: &RetainedState) {
        self.sim_blob = Self::encode(state);
    }
}
