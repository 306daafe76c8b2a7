use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub type PollResult<T> = Result<T, PollError>;

#[derive(Error, Debug)]
pub enum PollError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Authorization(String),

    #[error("voting has closed for poll {0}")]
    PollClosed(i32),

    #[error("user has already voted on poll {0}")]
    DuplicateVote(i32),

    #[error("storage failure: {0:#}")]
    Storage(anyhow::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    #[serde(rename = "validation_error")]
    Validation,
    NotFound,
    #[serde(rename = "authorization_error")]
    Authorization,
    PollClosed,
    DuplicateVote,
    #[serde(rename = "storage_error")]
    Storage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Authorization => "authorization_error",
            ErrorKind::PollClosed => "poll_closed",
            ErrorKind::DuplicateVote => "duplicate_vote",
            ErrorKind::Storage => "storage_error",
        };
        f.write_str(s)
    }
}

impl PollError {
    pub fn validation(msg: impl Into<String>) -> Self {
        PollError::Validation(msg.into())
    }

    pub fn poll_not_found(id: i32) -> Self {
        PollError::NotFound(format!("Poll {}", id))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PollError::Validation(_) => ErrorKind::Validation,
            PollError::NotFound(_) => ErrorKind::NotFound,
            PollError::Authorization(_) => ErrorKind::Authorization,
            PollError::PollClosed(_) => ErrorKind::PollClosed,
            PollError::DuplicateVote(_) => ErrorKind::DuplicateVote,
            PollError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// The message shown to a caller. Storage failures never leak their cause.
    pub fn public_message(&self) -> String {
        match self {
            PollError::Storage(_) => "Server error".to_owned(),
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for PollError {
    fn from(e: sqlx::Error) -> Self {
        PollError::Storage(anyhow::Error::new(e))
    }
}

/// Postgres SQLSTATE of a database error, if any.
pub(crate) fn sqlstate(e: &sqlx::Error) -> Option<String> {
    match e {
        sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

pub(crate) const UNIQUE_VIOLATION: &str = "23505";
pub(crate) const FOREIGN_KEY_VIOLATION: &str = "23503";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_are_opaque_to_callers() {
        let e = PollError::Storage(anyhow::anyhow!("connection refused on 10.0.0.3"));
        assert_eq!(e.kind(), ErrorKind::Storage);
        assert_eq!(e.public_message(), "Server error");
        assert!(e.to_string().contains("connection refused"));
    }

    #[test]
    fn kinds_serialize_to_stable_codes() {
        assert_eq!(serde_json::to_string(&ErrorKind::Validation).unwrap(), "\"validation_error\"");
        assert_eq!(serde_json::to_string(&ErrorKind::DuplicateVote).unwrap(), "\"duplicate_vote\"");
        assert_eq!(ErrorKind::PollClosed.to_string(), "poll_closed");
    }
}
