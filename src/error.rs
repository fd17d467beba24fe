//! Error types for megha-stream
//!
//! # Error Recovery Strategies
//!
//! ## Fatal Errors (Refuse to Start)
//!
//! - **`Config`**: Configuration is invalid. Fix the configuration and restart.
//! - **`SelfTest`**: The CRC-32 engine failed its startup vectors. The binary
//!   must not stream checksummed data; abort immediately.
//! - **`BigEndianHost`**: The wire format is little-endian with no byte
//!   swapping. The sender refuses to start on big-endian hosts.
//! - **`UnknownDevice`**: Device type not recognized.
//!
//! ## Transient Errors (Log and Continue)
//!
//! - **`Io`**: Socket errors during streaming are counted and the affected
//!   datagram is dropped; only startup I/O failures (bind, resolve) are fatal.
//!
//! Steady-state protocol failures on the receive path never surface here at
//! all — they are routed to per-kind counters in [`crate::stats`] and the
//! datagram is discarded (see [`crate::wire::DecodeError`]).

use thiserror::Error;

/// Errors that can occur in megha-stream
///
/// See module-level documentation for recovery strategies.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Unknown device type: {0}")]
    UnknownDevice(String),

    #[error("CRC-32 self-test failed: {0}")]
    SelfTest(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("host is big-endian; the wire format requires a little-endian host")]
    BigEndianHost,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
