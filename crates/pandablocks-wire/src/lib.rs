//! pandablocks-wire: PandA control port line protocol
//!
//! This crate provides the types and parsers for the text protocol spoken on a PandA
//! control port, plus a minimal blocking client trait. The default build enables a `mock`
//! client so that higher layers can be exercised without a device on the network.

mod types;
pub use types::{Change, ChangeSet, Reply, TableFieldLine, Timestamp, WireValue};

mod error;
pub use error::{Result, WireError};

pub mod protocol;
pub use protocol::{
    format_get, format_put, format_table_put, parse_changes, parse_reply, parse_table_field_line,
    parse_words, CHANGES_COMMAND, ERROR_SENTINEL,
};

mod traits;
pub use traits::DeviceClient;

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::MockClient;
