use core::fmt;
use time::OffsetDateTime;

/// Decoded reply to a single command sent on the control port
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Reply {
    /// Bare `OK`, sent in response to a put
    Ok,
    /// `OK =value`
    Value(String),
    /// `!`-prefixed lines, with the prefix and the `.` terminator removed
    Multi(Vec<String>),
}

/// A scalar as the device reports it: either text or the "in error" sentinel.
///
/// The sentinel is kept as its own variant so that no text value can ever be
/// mistaken for it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WireValue {
    Text(String),
    InError,
}

impl WireValue {
    pub fn text(&self) -> Option<&str> {
        match self {
            WireValue::Text(s) => Some(s),
            WireValue::InError => None,
        }
    }

    pub fn is_in_error(&self) -> bool {
        matches!(self, WireValue::InError)
    }
}

impl fmt::Display for WireValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireValue::Text(s) => f.write_str(s),
            WireValue::InError => f.write_str(crate::ERROR_SENTINEL),
        }
    }
}

/// One entry of a `*CHANGES?` reply
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Change {
    Scalar { field: String, value: WireValue },
    /// A table field changed; its content has to be fetched separately
    Table { field: String },
}

impl Change {
    pub fn field(&self) -> &str {
        match self {
            Change::Scalar { field, .. } | Change::Table { field } => field,
        }
    }
}

/// All changes returned by one poll, in device order
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChangeSet {
    pub changes: Vec<Change>,
    pub timestamp: Option<Timestamp>,
}

/// One line of a table layout reply, e.g. `15:0 REPEATS uint`
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TableFieldLine {
    pub name: String,
    pub bit_low: u32,
    pub bit_high: u32,
    pub subtype: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Timestamp(pub OffsetDateTime);
