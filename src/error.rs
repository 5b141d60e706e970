//! Unified error types for the thermnode firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! top-level boot path's error handling uniform. All variants are `Copy` so
//! they can be cheaply passed through events and cycle outcomes without
//! allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Probe discovery on the 1-Wire bus failed.
    Discovery(DiscoveryError),
    /// A per-channel temperature read failed.
    Read(ReadError),
    /// An attribute write into the Zigbee stack failed.
    Transport(TransportError),
    /// Peripheral or stack initialisation failed.
    Init(&'static str),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discovery(e) => write!(f, "discovery: {e}"),
            Self::Read(e) => write!(f, "read: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Discovery errors
// ---------------------------------------------------------------------------

/// Errors from the one-time probe discovery scan.
///
/// `NoneFound` is fatal for the node: with zero probes there is no useful
/// work to do, so startup halts rather than entering the duty cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryError {
    /// The bus scan completed but no temperature-probe-family device answered.
    NoneFound,
    /// The bus itself faulted during enumeration (shorted line, no pull-up).
    BusFault,
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoneFound => write!(f, "no temperature probes found"),
            Self::BusFault => write!(f, "bus fault during enumeration"),
        }
    }
}

impl From<DiscoveryError> for Error {
    fn from(e: DiscoveryError) -> Self {
        Self::Discovery(e)
    }
}

// ---------------------------------------------------------------------------
// Read errors
// ---------------------------------------------------------------------------

/// Per-channel read failures. Recoverable: the scheduler skips the channel
/// for the current cycle and tries again on the next wake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadError {
    /// The conversion or scratchpad fetch exceeded the configured bus timeout.
    Timeout,
    /// The bus transaction errored (missing presence pulse, CRC mismatch).
    BusFault,
    /// The requested channel index is not bound to a probe.
    InvalidChannel,
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "bus read timed out"),
            Self::BusFault => write!(f, "bus transaction fault"),
            Self::InvalidChannel => write!(f, "invalid channel index"),
        }
    }
}

impl From<ReadError> for Error {
    fn from(e: ReadError) -> Self {
        Self::Read(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Failures writing measurement attributes into the network stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The stack has not reached the joined state yet.
    StackNotReady,
    /// The attribute write was rejected by the stack.
    WriteFailed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackNotReady => write!(f, "stack not ready"),
            Self::WriteFailed => write!(f, "attribute write failed"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
