//! HTTP API types for the upload service.
//!
//! Every response carries a `success` flag; failures always use
//! [`ErrorResponse`] so clients can branch on a single shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::UploadedFile;

/// `{success: true, data: ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// `{success: false, error: "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub file: UploadedFile,
}

/// Body of `POST /api/export/:fileId` and query of the download route.
///
/// `max_rows` stays untyped so that a non-integer value reaches validation
/// and is reported as invalid input instead of a deserialization error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequestBody {
    #[serde(default)]
    pub sample_only: bool,
    #[serde(default)]
    pub max_rows: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub staged_files: usize,
}
