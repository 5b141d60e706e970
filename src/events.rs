//! Stack-signal queue.
//!
//! Zigbee signals arrive in the stack's own dispatch task (a C callback on
//! device); the main task consumes them. This is a lock-free SPSC ring so
//! the callback never blocks and never allocates.
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ esp_zb signal cb │────▶│ Signal Queue │────▶│  Main task   │
//! │ (stack task)     │     │  (lock-free) │     │  (consumer)  │
//! └──────────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU8, Ordering};

use crate::commissioning::{SignalKind, SignalStatus, StackSignal};

/// Maximum number of pending signals.
/// Power of 2 for efficient ring buffer modulo.
const SIGNAL_QUEUE_CAP: usize = 16;

const EMPTY_SLOT: StackSignal = StackSignal {
    kind: SignalKind::Other(0),
    status: SignalStatus::Ok,
    factory_new: false,
};

// ── Lock-free SPSC ring buffer ────────────────────────────────
//
// The stack callback writes (produce), the main task reads (consume).
// Uses atomic head/tail indices. The buffer lives in a static so the
// C callback can reach it without a context pointer.

static SIGNAL_HEAD: AtomicU8 = AtomicU8::new(0);
static SIGNAL_TAIL: AtomicU8 = AtomicU8::new(0);
// SAFETY: SIGNAL_BUFFER is accessed exclusively through push_signal
// (producer: stack dispatch task — one writer) and pop_signal (consumer:
// main task — one reader). The release/acquire pairs on the indices
// order the slot writes; no concurrent mutable access to a slot is
// possible under the SPSC discipline.
static mut SIGNAL_BUFFER: [StackSignal; SIGNAL_QUEUE_CAP] = [EMPTY_SLOT; SIGNAL_QUEUE_CAP];

/// Push a signal into the queue.
/// Safe to call from the stack's dispatch context (lock-free).
/// Returns `false` if the queue is full (signal dropped).
pub fn push_signal(signal: StackSignal) -> bool {
    let head = SIGNAL_HEAD.load(Ordering::Relaxed);
    let tail = SIGNAL_TAIL.load(Ordering::Acquire);
    let next_head = (head + 1) % SIGNAL_QUEUE_CAP as u8;

    if next_head == tail {
        return false; // Queue full — drop signal.
    }

    // SAFETY: single producer; the slot at `head` is not visible to the
    // consumer until the Release store below.
    unsafe {
        SIGNAL_BUFFER[head as usize] = signal;
    }

    SIGNAL_HEAD.store(next_head, Ordering::Release);
    true
}

/// Pop the next signal from the queue.
/// Called from the main task (single consumer).
/// Returns `None` if the queue is empty.
pub fn pop_signal() -> Option<StackSignal> {
    let tail = SIGNAL_TAIL.load(Ordering::Relaxed);
    let head = SIGNAL_HEAD.load(Ordering::Acquire);

    if tail == head {
        return None; // Empty.
    }

    // SAFETY: single consumer; the Acquire load above ordered the
    // producer's slot write before this read.
    let signal = unsafe { SIGNAL_BUFFER[tail as usize] };
    SIGNAL_TAIL.store((tail + 1) % SIGNAL_QUEUE_CAP as u8, Ordering::Release);

    Some(signal)
}

/// Drain all pending signals into a callback, in FIFO order.
pub fn drain_signals(mut handler: impl FnMut(StackSignal)) {
    while let Some(signal) = pop_signal() {
        handler(signal);
    }
}

/// Check if the signal queue is empty.
pub fn queue_is_empty() -> bool {
    let tail = SIGNAL_TAIL.load(Ordering::Relaxed);
    let head = SIGNAL_HEAD.load(Ordering::Acquire);
    tail == head
}
