//! Helpful error types for CLI commands
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use hyperlens_engine::{DispatchError, EngineError};
use hyperlens_protocol::config::ENV_ENGINE;
use hyperlens_protocol::{paths, ErrorKind};
use std::fmt;
use std::path::Path;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    /// The main error message
    pub message: String,
    /// Additional context about what was happening
    pub context: Option<String>,
    /// Suggestions for how to fix the error
    pub suggestions: Vec<String>,
    /// Error kind, when the failure came from the engine bridge
    pub kind: Option<ErrorKind>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
            kind: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(
        mut self,
        suggestions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = Some(kind);
        self
    }

    // === Common error constructors ===

    /// Path does not exist
    pub fn path_not_found(path: &Path) -> Self {
        Self::new(format!("Path not found: {}", path.display()))
            .with_context("The specified path does not exist on the filesystem")
            .with_suggestions([
                format!("TRY: Check that the path exists: ls -la {}", path.display()),
                "TRY: Check for typos in the path".to_string(),
            ])
            .with_kind(ErrorKind::InvalidInput)
    }

    /// Path exists but is not a directory
    pub fn not_a_directory(path: &Path) -> Self {
        Self::new(format!("Not a directory: {}", path.display()))
            .with_context("discover expects a directory, not a file")
            .with_suggestions([
                format!(
                    "TRY: Inspect the file instead: hyperlens inspect {}",
                    path.display()
                ),
                format!(
                    "TRY: Discover the parent directory: hyperlens discover {}",
                    parent_display(path)
                ),
            ])
            .with_kind(ErrorKind::InvalidInput)
    }

    /// File does not exist
    pub fn file_not_found(path: &Path) -> Self {
        Self::new(format!("File not found: {}", path.display()))
            .with_context("The specified file does not exist")
            .with_suggestions([
                format!("TRY: Look for .hyper files: hyperlens discover {}", parent_display(path)),
                format!("TRY: Check if the file exists: ls -la {}", path.display()),
            ])
            .with_kind(ErrorKind::InvalidInput)
    }

    /// File exists but is not a `.hyper` extract
    pub fn not_a_hyper_file(path: &Path) -> Self {
        Self::new(format!("Not a .hyper file: {}", path.display()))
            .with_context("Only Tableau Hyper extracts (*.hyper) can be inspected")
            .with_suggestion(format!(
                "TRY: Find extracts nearby: hyperlens discover {}",
                parent_display(path)
            ))
            .with_kind(ErrorKind::InvalidInput)
    }

    /// Bad `--max-rows` value
    pub fn invalid_max_rows(raw: &str) -> Self {
        Self::new(format!("Invalid --max-rows value: '{}'", raw))
            .with_context("--max-rows must be a positive integer")
            .with_suggestions([
                "TRY: --max-rows 1000".to_string(),
                "TRY: Use --sample for the first 5 rows of each table".to_string(),
            ])
            .with_kind(ErrorKind::InvalidInput)
    }

    /// Output file could not be written
    pub fn cannot_write_output(path: &Path, reason: &str) -> Self {
        Self::new(format!("Cannot write output file: {}", path.display()))
            .with_context(reason.to_string())
            .with_suggestions([
                format!("TRY: Check the directory exists: ls -la {}", parent_display(path)),
                "TRY: Omit --output to write to stdout".to_string(),
            ])
            .with_kind(ErrorKind::Io)
    }

    /// Translate a dispatcher failure into user-facing guidance.
    pub fn from_dispatch(err: &DispatchError, subject: &Path) -> Self {
        let kind = err.kind();
        let base = Self::new(err.to_string()).with_kind(kind);
        match err.engine_error() {
            None => base.with_context(format!("While processing {}", subject.display())),
            Some(EngineError::LaunchFailure { program, .. }) => base
                .with_context(format!("The inspection engine '{}' could not be started", program))
                .with_suggestions([
                    format!("TRY: Point {} at the engine executable", ENV_ENGINE),
                    format!(
                        "TRY: Set [engine] program/args in {}",
                        paths::default_config_path().display()
                    ),
                    "TRY: Run `hyperlens config` to see the resolved engine".to_string(),
                ]),
            Some(EngineError::EngineFailure { .. }) => base
                .with_context(format!("The engine failed while reading {}", subject.display()))
                .with_suggestions([
                    "TRY: Check that the file is a valid, fully written Hyper extract".to_string(),
                    "TRY: Re-run with --verbose for engine diagnostics".to_string(),
                ]),
            Some(EngineError::MalformedResponse { .. }) => base
                .with_context("The engine answered with output that is not a valid document")
                .with_suggestion(format!(
                    "TRY: Check the log files under {}",
                    paths::default_logs_dir().display()
                )),
            Some(EngineError::Rejected { .. }) => {
                base.with_context(format!("The engine could not process {}", subject.display()))
            }
            Some(EngineError::Cancelled) => base,
        }
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

/// Error kind behind an `anyhow` error, if it carries one.
pub fn error_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    if let Some(helpful) = err.downcast_ref::<HelpfulError>() {
        return helpful.kind;
    }
    err.downcast_ref::<DispatchError>().map(DispatchError::kind)
}

/// True when the command stopped because the user pressed Ctrl-C.
pub fn is_interrupted(err: &anyhow::Error) -> bool {
    error_kind(err) == Some(ErrorKind::Cancelled)
}

/// Human-readable report for stderr.
pub fn render(err: &anyhow::Error) -> String {
    match err.downcast_ref::<HelpfulError>() {
        Some(helpful) => helpful.to_string(),
        None => format!("ERROR: {:#}\n", err),
    }
}

/// `{"success": false, "error": ...}` for `--json` consumers.
pub fn print_json_error(err: &anyhow::Error) {
    let message = match err.downcast_ref::<HelpfulError>() {
        Some(helpful) => helpful.message.clone(),
        None => format!("{:#}", err),
    };
    let mut body = serde_json::json!({ "success": false, "error": message });
    if let Some(kind) = error_kind(err) {
        body["kind"] = serde_json::Value::String(kind.as_str().to_string());
    }
    match serde_json::to_string_pretty(&body) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{{\"success\": false}}"),
    }
}

fn parent_display(path: &Path) -> String {
    path.parent()
        .map(|p| p.display().to_string())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| ".".to_string())
}
