//! Error types for the adapter and the dispatcher.

use hyperlens_protocol::defaults::CANCELLED_BY_USER_MESSAGE;
use hyperlens_protocol::{ErrorKind, Operation};
use thiserror::Error;

/// Longest slice of raw engine output carried into a display message.
const MAX_DISPLAYED_OUTPUT: usize = 500;

/// Failures of a single engine invocation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine process could not be started (missing interpreter, script, permissions).
    #[error("failed to launch engine '{program}': {message}")]
    LaunchFailure { program: String, message: String },

    /// The engine exited non-zero. `stderr` is the captured text, verbatim.
    #[error("engine exited with {}: {}", exit_label(.code), truncate(.stderr))]
    EngineFailure { code: Option<i32>, stderr: String },

    /// The engine exited 0 but stdout was not the expected document.
    #[error("engine returned a malformed response: {reason}")]
    MalformedResponse { reason: String, raw: String },

    /// The engine answered cleanly with `success: false`.
    #[error("{message}")]
    Rejected { message: String },

    #[error("{}", CANCELLED_BY_USER_MESSAGE)]
    Cancelled,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::LaunchFailure { .. } => ErrorKind::LaunchFailure,
            EngineError::EngineFailure { .. } => ErrorKind::EngineFailure,
            EngineError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            EngineError::Rejected { .. } => ErrorKind::Rejected,
            EngineError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Raw engine output attached to a malformed response.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            EngineError::MalformedResponse { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

/// Failures of a dispatcher operation.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Rejected before the engine was invoked.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The engine invocation behind `operation` failed.
    #[error("{operation} failed: {source}")]
    Engine {
        operation: Operation,
        #[source]
        source: EngineError,
    },
}

impl DispatchError {
    pub fn invalid(message: impl Into<String>) -> Self {
        DispatchError::InvalidInput(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::InvalidInput(_) => ErrorKind::InvalidInput,
            DispatchError::Engine { source, .. } => source.kind(),
        }
    }

    pub fn operation(&self) -> Option<Operation> {
        match self {
            DispatchError::InvalidInput(_) => None,
            DispatchError::Engine { operation, .. } => Some(*operation),
        }
    }

    pub fn engine_error(&self) -> Option<&EngineError> {
        match self {
            DispatchError::InvalidInput(_) => None,
            DispatchError::Engine { source, .. } => Some(source),
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "a signal".to_string(),
    }
}

fn truncate(text: &str) -> String {
    let text = text.trim();
    if text.len() <= MAX_DISPLAYED_OUTPUT {
        return text.to_string();
    }
    let mut end = MAX_DISPLAYED_OUTPUT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated)", &text[..end])
}
