use thiserror::Error;

use crate::types::StudentId;

/// Errors talking to the school portal API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network failure, timeout, or a body that could not be decoded.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API answered with a non-2xx status. `message` is the server's own
    /// text, shown to the user verbatim.
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("invalid API address: {0}")]
    Url(String),

    #[error("session token is not a valid header value")]
    Token,
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Request(e) => e.status().map(|s| s.as_u16()),
            ApiError::Url(_) | ApiError::Token => None,
        }
    }
}

/// Misuse of the attendance view.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControllerError {
    #[error("select a subject before editing attendance")]
    NoSubjectSelected,

    #[error("attendance is not being edited")]
    NotEditing,

    #[error("the view is busy ({0})")]
    Busy(&'static str),

    #[error("student {0} is not on the roster")]
    UnknownStudent(StudentId),

    #[error("unknown class {0}")]
    UnknownClass(i64),

    #[error("unknown subject {0}")]
    UnknownSubject(i64),

    #[error("could not save attendance: {0}")]
    SaveAborted(String),

    #[error("the view stopped after an error: {0}")]
    Halted(String),
}
