//! Common tracing imports, pulled in as `use crate::tracing_prelude::*;`
//! throughout the transport and protocol-engine modules.

pub use tracing::{debug, error, info, trace, warn};
