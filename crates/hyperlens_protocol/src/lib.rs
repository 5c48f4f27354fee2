//! Hyperlens Protocol: the contract between callers and the inspection engine.
//!
//! The engine is an external program that reads `.hyper` files through the
//! vendor API. It is invoked as
//!
//! ```text
//! <engine> <operation> <target> [--sample-only] [--max-rows N]
//! ```
//!
//! and prints exactly one JSON document to stdout. This crate owns the request
//! model, the per-operation payload types decoded from that document, and the
//! shared configuration/path helpers used by every Hyperlens binary.

pub mod config;
pub mod defaults;
pub mod error;
pub mod http_types;
pub mod paths;
pub mod types;

pub use error::ErrorKind;
pub use config::{
    ConfigError, EngineSettings, HyperlensConfig, LoggingSettings, ServerSettings, StagingSettings,
};
pub use http_types::{ApiResponse, ErrorResponse, ExportRequestBody, HealthResponse, UploadResponse};
pub use types::{
    ColumnInfo, DiscoverResult, EngineOption, EnginePayload, EngineRequest, EngineResponse,
    ExportOptions, ExportResult, ExportType, ExportedTable, FileDescriptor, InspectResult,
    InspectedTable, Operation, RowCount, SampleRow, TableSchema, UploadedFile,
};

/// File extension of the files the engine understands (without the dot).
pub const HYPER_EXTENSION: &str = "hyper";

/// Returns true if `name` ends in `.hyper` (case-insensitive).
pub fn has_hyper_extension(name: &str) -> bool {
    let suffix_len = HYPER_EXTENSION.len() + 1;
    if name.len() <= suffix_len {
        return false;
    }
    match name.get(name.len() - suffix_len..) {
        Some(suffix) => suffix.eq_ignore_ascii_case(".hyper"),
        None => false,
    }
}
