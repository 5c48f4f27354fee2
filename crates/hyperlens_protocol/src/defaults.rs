//! Canonical default values shared by the CLI and the web service.

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_ENGINE_PROGRAM: &str = "python3";
pub const DEFAULT_ENGINE_SCRIPT: &str = "hyper_inspector.py";

/// Rows per table returned by inspect and by sample-only exports.
pub const SAMPLE_ROW_LIMIT: u64 = 5;

/// Upload ceiling: 500 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 500 * 1024 * 1024;
/// Staged files older than this are swept (1 hour).
pub const STAGING_RETENTION_SECS: u64 = 60 * 60;
/// Sweep period (30 minutes).
pub const SWEEP_INTERVAL_SECS: u64 = 30 * 60;

/// Tracing filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "hyperlens=info,hyperlens_engine=info,tower_http=info";
/// Log files kept per process name, the live one included.
pub const LOG_MAX_FILES: usize = 5;
/// A log file rotates before it grows past this (10 MiB).
pub const LOG_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Multipart field carrying the uploaded file.
pub const UPLOAD_FIELD_NAME: &str = "hyperFile";

pub const CANCELLED_BY_USER_MESSAGE: &str = "Cancelled by user";
