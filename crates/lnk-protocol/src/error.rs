use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid message type: {0}")]
    InvalidMessageType(u8),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("framing error: {0}")]
    FramingError(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("unexpected {got} message, expected {expected}")]
    UnexpectedMessage {
        got: &'static str,
        expected: &'static str,
    },

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("{operation} timed out after {millis}ms")]
    Timeout { operation: &'static str, millis: u128 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
