//! Error classification shared by every Hyperlens boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse error category, used to pick exit codes and HTTP statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller-supplied argument failed validation before any engine call.
    InvalidInput,
    /// The engine process could not be started.
    LaunchFailure,
    /// The engine process exited non-zero.
    EngineFailure,
    /// The engine exited 0 but its output was not the expected document.
    MalformedResponse,
    /// The engine reported `success: false`.
    Rejected,
    /// The request was cancelled before the engine finished.
    Cancelled,
    UnsupportedFileType,
    PayloadTooLarge,
    NotFound,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::LaunchFailure => "launch_failure",
            ErrorKind::EngineFailure => "engine_failure",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::Rejected => "rejected",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::UnsupportedFileType => "unsupported_file_type",
            ErrorKind::PayloadTooLarge => "payload_too_large",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
