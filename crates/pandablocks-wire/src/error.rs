use thiserror::Error;

pub type Result<T, E = WireError> = core::result::Result<T, E>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("malformed reply: {0}")]
    Malformed(String),
    #[error("device reported error: {0}")]
    Protocol(String),
    #[error("unexpected reply to {command}: {reply}")]
    UnexpectedReply { command: String, reply: String },
}
