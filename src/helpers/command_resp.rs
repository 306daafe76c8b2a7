use serde::Serialize;
use serde_json::Value;

use crate::error::{ErrorKind, PollError, PollResult};

/// A handler's successful outcome, before it is wrapped for the caller.
#[derive(Debug)]
pub struct Reply {
    pub message: String,
    pub data: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
}

/// What goes back over the wire for every request.
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

pub fn reply_message(message: impl Into<String>) -> PollResult<Reply> {
    Ok(Reply {
        message: message.into(),
        data: None,
    })
}

pub fn reply_data<T: Serialize>(message: impl Into<String>, data: &T) -> PollResult<Reply> {
    let data = serde_json::to_value(data)
        .map_err(|e| PollError::Storage(anyhow::Error::new(e)))?;

    Ok(Reply {
        message: message.into(),
        data: Some(data),
    })
}

impl From<Reply> for Envelope {
    fn from(reply: Reply) -> Self {
        Self {
            success: true,
            message: reply.message,
            data: reply.data,
            error: None,
        }
    }
}

impl From<&PollError> for Envelope {
    fn from(e: &PollError) -> Self {
        Self {
            success: false,
            message: e.public_message(),
            data: None,
            error: Some(ErrorBody {
                kind: e.kind(),
            }),
        }
    }
}
