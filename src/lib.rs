//! Host-side controller for a multi-drop serial bootloader bus.
//!
//! The bus protocol engine — framing, addressing, CRC, transport, node
//! discovery, and firmware broadcast — lives under [`protocol`],
//! [`transport`], [`discovery`], and [`flasher`].

pub mod discovery;
pub mod error;
pub mod flasher;
pub mod protocol;
pub mod tracing_prelude;
pub mod transport;

pub use error::{Error, Result};
