//! Engine request model and per-operation payload types.
//!
//! Payload field names follow the engine's JSON output (snake_case) so that
//! re-serializing a decoded payload yields the same document shape callers
//! already know.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::defaults::SAMPLE_ROW_LIMIT;

// ============================================================================
// Requests
// ============================================================================

/// Operation verbs understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Discover,
    Inspect,
    Export,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Discover => "discover",
            Operation::Inspect => "inspect",
            Operation::Export => "export",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional engine flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOption {
    /// `--sample-only`
    SampleOnly,
    /// `--max-rows N`
    MaxRows(u64),
}

/// Caller-facing export options.
///
/// `sample_only` wins over `max_rows` when both are set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    #[serde(default)]
    pub sample_only: bool,
    #[serde(default)]
    pub max_rows: Option<u64>,
}

impl ExportOptions {
    pub fn sample() -> Self {
        Self {
            sample_only: true,
            max_rows: None,
        }
    }

    pub fn limited(max_rows: u64) -> Self {
        Self {
            sample_only: false,
            max_rows: Some(max_rows),
        }
    }

    /// Per-table row cap implied by these options (`None` = all rows).
    pub fn row_limit(&self) -> Option<u64> {
        if self.sample_only {
            Some(SAMPLE_ROW_LIMIT)
        } else {
            self.max_rows
        }
    }

    pub fn export_type(&self) -> ExportType {
        if self.sample_only {
            ExportType::SampleOnly
        } else {
            ExportType::FullData
        }
    }
}

/// One engine invocation. Built per call and never shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRequest {
    operation: Operation,
    target: PathBuf,
    options: Vec<EngineOption>,
}

impl EngineRequest {
    pub fn discover(directory: impl Into<PathBuf>) -> Self {
        Self {
            operation: Operation::Discover,
            target: directory.into(),
            options: Vec::new(),
        }
    }

    pub fn inspect(file: impl Into<PathBuf>) -> Self {
        Self {
            operation: Operation::Inspect,
            target: file.into(),
            options: Vec::new(),
        }
    }

    pub fn export(file: impl Into<PathBuf>, options: &ExportOptions) -> Self {
        let options = if options.sample_only {
            vec![EngineOption::SampleOnly]
        } else if let Some(max_rows) = options.max_rows {
            vec![EngineOption::MaxRows(max_rows)]
        } else {
            Vec::new()
        };
        Self {
            operation: Operation::Export,
            target: file.into(),
            options,
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn options(&self) -> &[EngineOption] {
        &self.options
    }

    /// Argument list passed to the engine after its own program/script args.
    pub fn to_argv(&self) -> Vec<OsString> {
        let mut argv = vec![
            OsString::from(self.operation.as_str()),
            self.target.clone().into_os_string(),
        ];
        for option in &self.options {
            match option {
                EngineOption::SampleOnly => argv.push(OsString::from("--sample-only")),
                EngineOption::MaxRows(n) => {
                    argv.push(OsString::from("--max-rows"));
                    argv.push(OsString::from(n.to_string()));
                }
            }
        }
        argv
    }
}

// ============================================================================
// Responses
// ============================================================================

/// The envelope every engine document carries.
///
/// `payload` is the whole document; typed decoding happens in
/// [`EnginePayload::decode`] once the operation is known.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineResponse {
    pub success: bool,
    pub error: Option<String>,
    pub payload: Value,
}

impl EngineResponse {
    /// Split a parsed stdout document into its envelope.
    ///
    /// Returns a description of the problem when the document is not an
    /// object with a boolean `success` field.
    pub fn from_document(document: Value) -> Result<Self, String> {
        let object = document
            .as_object()
            .ok_or_else(|| format!("expected a JSON object, got {}", json_kind(&document)))?;
        let success = object
            .get("success")
            .and_then(Value::as_bool)
            .ok_or_else(|| "missing boolean 'success' field".to_string())?;
        let error = object
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(Self {
            success,
            error,
            payload: document,
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Typed payload, one variant per operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EnginePayload {
    Discover(DiscoverResult),
    Inspect(InspectResult),
    Export(ExportResult),
}

impl EnginePayload {
    /// Decode `payload` into the variant matching `operation`.
    ///
    /// Borrows the document so the caller can still report it when the shape
    /// does not match.
    pub fn decode(operation: Operation, payload: &Value) -> serde_json::Result<Self> {
        Ok(match operation {
            Operation::Discover => EnginePayload::Discover(DiscoverResult::deserialize(payload)?),
            Operation::Inspect => EnginePayload::Inspect(InspectResult::deserialize(payload)?),
            Operation::Export => EnginePayload::Export(ExportResult::deserialize(payload)?),
        })
    }

    pub fn operation(&self) -> Operation {
        match self {
            EnginePayload::Discover(_) => Operation::Discover,
            EnginePayload::Inspect(_) => Operation::Inspect,
            EnginePayload::Export(_) => Operation::Export,
        }
    }
}

// ============================================================================
// Row counts
// ============================================================================

/// Row count that may be unavailable (views, failed counts).
///
/// Serialized as a number, or as the string `"unknown"`. Any non-numeric value
/// from the engine (it sends `"Unable to determine"`) decodes as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowCount {
    Known(u64),
    Unknown,
}

impl RowCount {
    pub fn known(&self) -> Option<u64> {
        match self {
            RowCount::Known(n) => Some(*n),
            RowCount::Unknown => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, RowCount::Unknown)
    }

    /// Sum the known counts. Unknown counts are reported separately, never as zero.
    pub fn total<'a>(counts: impl IntoIterator<Item = &'a RowCount>) -> (u64, usize) {
        counts
            .into_iter()
            .fold((0u64, 0usize), |(sum, unknown), count| match count {
                RowCount::Known(n) => (sum.saturating_add(*n), unknown),
                RowCount::Unknown => (sum, unknown + 1),
            })
    }
}

impl fmt::Display for RowCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowCount::Known(n) => write!(f, "{}", n),
            RowCount::Unknown => f.write_str("unknown"),
        }
    }
}

impl Serialize for RowCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RowCount::Known(n) => serializer.serialize_u64(*n),
            RowCount::Unknown => serializer.serialize_str("unknown"),
        }
    }
}

impl<'de> Deserialize<'de> for RowCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value.as_u64() {
            Some(n) => RowCount::Known(n),
            None => RowCount::Unknown,
        })
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// One discovered `.hyper` file. A snapshot; the file may be gone later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    #[serde(rename = "path")]
    pub absolute_path: PathBuf,
    #[serde(rename = "size")]
    pub size_bytes: u64,
    /// Seconds since the Unix epoch.
    #[serde(rename = "modified")]
    pub modified_at: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverResult {
    #[serde(default)]
    pub directory: String,
    pub files_found: usize,
    pub files: Vec<FileDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub declared_type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<Value>,
}

fn default_nullable() -> bool {
    true
}

fn default_table_kind() -> String {
    "TABLE".to_string()
}

/// Structure of one table, shared by inspect and export payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    #[serde(rename = "schema")]
    pub schema_name: String,
    #[serde(rename = "name")]
    pub table_name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(rename = "type", default = "default_table_kind")]
    pub table_kind: String,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

impl TableSchema {
    /// `schema.table`, used as a section label.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema_name, self.table_name)
    }
}

/// A sample row from inspect, or the engine's error text when sampling failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleRow {
    Values(Vec<Value>),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectedTable {
    #[serde(flatten)]
    pub schema: TableSchema,
    pub row_count: RowCount,
    #[serde(default)]
    pub sample_data: Vec<SampleRow>,
}

impl InspectedTable {
    pub fn sample_rows(&self) -> impl Iterator<Item = &Vec<Value>> {
        self.sample_data.iter().filter_map(|row| match row {
            SampleRow::Values(values) => Some(values),
            SampleRow::Error(_) => None,
        })
    }

    pub fn sample_error(&self) -> Option<&str> {
        self.sample_data.iter().find_map(|row| match row {
            SampleRow::Error(message) => Some(message.as_str()),
            SampleRow::Values(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectResult {
    #[serde(default)]
    pub file_path: String,
    pub file_name: String,
    pub file_size: u64,
    #[serde(default)]
    pub schemas: Vec<String>,
    #[serde(default)]
    pub tables: Vec<InspectedTable>,
    pub total_tables: usize,
    pub total_rows: u64,
}

impl InspectResult {
    /// Number of tables whose row count the engine could not determine.
    pub fn unknown_row_counts(&self) -> usize {
        RowCount::total(self.tables.iter().map(|t| &t.row_count)).1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportType {
    SampleOnly,
    FullData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedTable {
    #[serde(flatten)]
    pub schema: TableSchema,
    pub total_rows: RowCount,
    pub exported_rows: u64,
    #[serde(default)]
    pub data: Vec<Map<String, Value>>,
}

impl ExportedTable {
    /// Column names for delimited output: the keys of the first row, falling
    /// back to the declared columns for an empty table.
    pub fn column_names(&self) -> Vec<String> {
        match self.data.first() {
            Some(first) => first.keys().cloned().collect(),
            None => self.schema.columns.iter().map(|c| c.name.clone()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportResult {
    #[serde(default)]
    pub file_path: String,
    pub file_name: String,
    pub file_size: u64,
    pub export_type: ExportType,
    #[serde(default)]
    pub max_rows_per_table: Option<u64>,
    #[serde(default)]
    pub schemas: Vec<String>,
    #[serde(default)]
    pub tables: Vec<ExportedTable>,
    pub total_tables: usize,
    pub total_rows_exported: u64,
}

impl ExportResult {
    /// Cap every table at `limit` rows and make the counters agree with the
    /// rows actually present. Returns the number of tables that were cut.
    pub fn enforce_row_limit(&mut self, limit: Option<u64>) -> usize {
        let mut truncated = 0;
        for table in &mut self.tables {
            if let Some(limit) = limit {
                let limit = usize::try_from(limit).unwrap_or(usize::MAX);
                if table.data.len() > limit {
                    table.data.truncate(limit);
                    truncated += 1;
                }
            }
            table.exported_rows = table.data.len() as u64;
        }
        self.total_tables = self.tables.len();
        self.total_rows_exported = self.tables.iter().map(|t| t.exported_rows).sum();
        truncated
    }
}

// ============================================================================
// Staging
// ============================================================================

/// A file accepted into the staging directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub staging_id: String,
    pub original_name: String,
    pub size_bytes: u64,
    pub stored_path: PathBuf,
    pub uploaded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_export_argv_sample_only_takes_precedence() {
        let options = ExportOptions {
            sample_only: true,
            max_rows: Some(100),
        };
        let request = EngineRequest::export("/data/a.hyper", &options);
        let argv: Vec<String> = request
            .to_argv()
            .into_iter()
            .map(|s| s.to_string_lossy().into_owned())
            .collect();
        assert_eq!(argv, vec!["export", "/data/a.hyper", "--sample-only"]);
        assert_eq!(options.row_limit(), Some(5));
    }

    #[test]
    fn test_export_argv_max_rows() {
        let request = EngineRequest::export("a.hyper", &ExportOptions::limited(10));
        let argv: Vec<String> = request
            .to_argv()
            .into_iter()
            .map(|s| s.to_string_lossy().into_owned())
            .collect();
        assert_eq!(argv, vec!["export", "a.hyper", "--max-rows", "10"]);
    }

    #[test]
    fn test_row_count_decoding() {
        let known: RowCount = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(known, RowCount::Known(42));
        let unknown: RowCount = serde_json::from_value(json!("Unable to determine")).unwrap();
        assert_eq!(unknown, RowCount::Unknown);
        let null: RowCount = serde_json::from_value(Value::Null).unwrap();
        assert!(null.is_unknown());
        assert_eq!(serde_json::to_value(RowCount::Unknown).unwrap(), json!("unknown"));
    }

    #[test]
    fn test_row_count_total_does_not_count_unknown_as_zero() {
        let counts = [RowCount::Known(10), RowCount::Unknown, RowCount::Known(5)];
        assert_eq!(RowCount::total(counts.iter()), (15, 1));
    }

    #[test]
    fn test_envelope_requires_boolean_success() {
        assert!(EngineResponse::from_document(json!([1, 2])).is_err());
        assert!(EngineResponse::from_document(json!({"success": "yes"})).is_err());

        let response =
            EngineResponse::from_document(json!({"success": false, "error": "boom"})).unwrap();
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        let discover_doc = json!({"success": true, "directory": ".", "files_found": 0, "files": []});
        assert!(EnginePayload::decode(Operation::Discover, &discover_doc).is_ok());
        assert!(EnginePayload::decode(Operation::Export, &discover_doc).is_err());
    }

    #[test]
    fn test_inspected_table_sample_error() {
        let table: InspectedTable = serde_json::from_value(json!({
            "schema": "Extract",
            "name": "Extract",
            "full_name": "\"Extract\".\"Extract\"",
            "type": "TABLE",
            "columns": [{"name": "id", "type": "integer", "nullable": false, "default": null}],
            "row_count": "Unable to determine",
            "sample_data": ["Error retrieving sample data: permission denied"]
        }))
        .unwrap();
        assert!(table.row_count.is_unknown());
        assert_eq!(table.sample_rows().count(), 0);
        assert!(table.sample_error().unwrap().contains("permission denied"));
    }

    #[test]
    fn test_enforce_row_limit() {
        let rows: Vec<Map<String, Value>> = (0..8)
            .map(|i| {
                let mut row = Map::new();
                row.insert("id".to_string(), json!(i));
                row
            })
            .collect();
        let mut result = ExportResult {
            file_path: "a.hyper".to_string(),
            file_name: "a.hyper".to_string(),
            file_size: 1,
            export_type: ExportType::FullData,
            max_rows_per_table: Some(3),
            schemas: vec!["public".to_string()],
            tables: vec![ExportedTable {
                schema: TableSchema {
                    schema_name: "public".to_string(),
                    table_name: "t".to_string(),
                    full_name: String::new(),
                    table_kind: "TABLE".to_string(),
                    columns: vec![],
                },
                total_rows: RowCount::Known(8),
                exported_rows: 8,
                data: rows,
            }],
            total_tables: 1,
            total_rows_exported: 8,
        };

        assert_eq!(result.enforce_row_limit(Some(3)), 1);
        assert_eq!(result.tables[0].exported_rows, 3);
        assert_eq!(result.total_rows_exported, 3);
        assert_eq!(result.enforce_row_limit(None), 0);
    }
}
