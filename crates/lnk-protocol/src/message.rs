use lnk_store::StoreError;
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Remote names of the two callable operations.
pub mod methods {
    pub const GET: &str = "Store.Get";
    pub const PUT: &str = "Store.Put";
}

/// Error codes carried by [`StoreMessage::Error`].
pub mod codes {
    pub const BAD_REQUEST: u32 = 400;
    pub const NOT_FOUND: u32 = 404;
    pub const INTERNAL: u32 = 500;
    pub const CLOSED: u32 = 503;
    pub const KEY_SPACE_EXHAUSTED: u32 = 507;
}

/// All message types in the Lnk store protocol.
///
/// `Get` and `Put` are requests; every request is answered by exactly one of
/// `Value`, `Key`, or `Error`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreMessage {
    Get { key: String },
    Put { url: String },
    Value { url: String },
    Key { key: String },
    Error { code: u32, message: String },
}

impl StoreMessage {
    pub fn type_tag(&self) -> u8 {
        match self {
            Self::Get { .. } => 1,
            Self::Put { .. } => 2,
            Self::Value { .. } => 3,
            Self::Key { .. } => 4,
            Self::Error { .. } => 255,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Get { .. } => "Get",
            Self::Put { .. } => "Put",
            Self::Value { .. } => "Value",
            Self::Key { .. } => "Key",
            Self::Error { .. } => "Error",
        }
    }

    /// Remote operation name for requests, `None` for responses.
    pub fn method(&self) -> Option<&'static str> {
        match self {
            Self::Get { .. } => Some(methods::GET),
            Self::Put { .. } => Some(methods::PUT),
            _ => None,
        }
    }

    pub fn is_request(&self) -> bool {
        self.method().is_some()
    }

    /// Error response describing a failed store call.
    pub fn from_store_error(err: &StoreError) -> Self {
        let code = match err {
            StoreError::NotFound(_) => codes::NOT_FOUND,
            StoreError::KeySpaceExhausted { .. } => codes::KEY_SPACE_EXHAUSTED,
            StoreError::Closed => codes::CLOSED,
            _ => codes::INTERNAL,
        };
        Self::Error {
            code,
            message: err.to_string(),
        }
    }
}

/// Rebuild the store-level error for an error response to a call about
/// `key` (if the call named one).
pub fn store_error(code: u32, message: String, key: Option<&str>) -> StoreError {
    match (code, key) {
        (codes::NOT_FOUND, Some(key)) => StoreError::NotFound(key.to_string()),
        _ => StoreError::Remote(format!("{message} (code {code})")),
    }
}
