use crate::names::NameForm;
use pandablocks_wire::WireError;
use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed name or wire text
    #[error("format error: {0}")]
    Format(String),
    #[error("conversion from {from} form to {to} form is not supported")]
    NotSupported { from: NameForm, to: NameForm },
    #[error("name={value} of an unknown type {kind}, expecting device, control or display")]
    UnknownSource { value: String, kind: String },
    #[error("out of range: {0}")]
    Range(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The device flagged the field with its error sentinel
    #[error("field {field} is in error as reported by the device")]
    DeviceProtocol { field: String },
    #[error("record handle already bound")]
    AlreadyBound,
    #[error(transparent)]
    Wire(#[from] WireError),
}
