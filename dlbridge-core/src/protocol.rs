//! Channel protocol: method-call and response envelopes.

use serde::{Deserialize, Serialize};

use crate::value::{Arguments, Value};

/// Current protocol version. Exported over the C ABI so hosts can check compatibility.
pub const PROTOCOL_VERSION: u8 = 1;

/// Channel identifier the UI layer addresses by default.
pub const DEFAULT_CHANNEL: &str = "gopeed.com/libgopeed";

/// One inbound call: which channel, which method, with what arguments.
/// `id` is chosen by the caller and echoed in the matching [`Response`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub id: u64,
    pub channel: String,
    pub method: String,
    pub args: Arguments,
}

impl MethodCall {
    pub fn new(
        id: u64,
        channel: impl Into<String>,
        method: impl Into<String>,
        args: Arguments,
    ) -> Self {
        Self {
            id,
            channel: channel.into(),
            method: method.into(),
            args,
        }
    }
}

/// Outcome of exactly one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    Success(Value),
    Error {
        code: String,
        message: String,
        details: Option<String>,
    },
    /// The channel cannot route the call (unknown method or other channel).
    NotImplemented,
}

impl Reply {
    pub fn success(value: impl Into<Value>) -> Self {
        Reply::Success(value.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Success(_))
    }

    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Reply::NotImplemented)
    }

    /// Error code when this is an error reply.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Reply::Error { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Error message when this is an error reply.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Reply::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Reply::Success(v) => Some(v),
            _ => None,
        }
    }
}

/// Outbound envelope: the reply to call `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    pub reply: Reply,
}
