//! Crate-wide error type.
//!
//! Decode-time CRC mismatches and reader-side transient I/O errors are
//! intentionally absent from this enum: per the protocol's error handling
//! policy they are absorbed internally (logged, resynchronized) and never
//! surface to a caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open serial port {port}: {source}")]
    SerialOpenFailed {
        port: String,
        #[source]
        source: tokio_serial::Error,
    },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("payload too large: {0} bytes (max 255)")]
    PayloadTooLarge(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
