//! Result shaping: turns decoded payloads into JSON documents or delimited
//! text for download and file output.
//!
//! Delimited output is one section per table:
//!
//! ```text
//! # Extract.Orders
//! id,label
//! 1,first
//!
//! # Extract.Returns
//! id,reason
//! ```
//!
//! The header is the key set of the table's first row. A table without rows
//! still gets a header, taken from its declared columns.

use csv::{QuoteStyle, WriterBuilder};
use hyperlens_protocol::{ExportResult, ExportedTable};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_DELIMITER: u8 = b',';

#[derive(Debug, Error)]
pub enum ShapingError {
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Delimited encoding failed: {0}")]
    Delimited(#[from] csv::Error),

    #[error("Delimited output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Output formats offered by `export` and the download route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }

    /// Render `result` in this format.
    pub fn render(&self, result: &ExportResult) -> Result<String, ShapingError> {
        match self {
            ExportFormat::Json => Ok(to_json(result)?),
            ExportFormat::Csv => to_delimited(result, DEFAULT_DELIMITER),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("Unsupported format '{}': expected json or csv", other)),
        }
    }
}

/// Pretty-printed JSON. Key order follows the source document.
pub fn to_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

/// Delimited text for every table of `result`. Fields are quoted only when
/// they hold the delimiter, a quote or a line break.
pub fn to_delimited(result: &ExportResult, delimiter: u8) -> Result<String, ShapingError> {
    let mut out = Vec::new();
    for (index, table) in result.tables.iter().enumerate() {
        if index > 0 {
            out.push(b'\n');
        }
        out = write_table(out, table, delimiter)?;
    }
    Ok(String::from_utf8(out)?)
}

/// Append one `# schema.table` section to `out`.
fn write_table(
    mut out: Vec<u8>,
    table: &ExportedTable,
    delimiter: u8,
) -> Result<Vec<u8>, csv::Error> {
    out.extend_from_slice(b"# ");
    out.extend_from_slice(table.schema.qualified_name().as_bytes());
    out.push(b'\n');

    let columns = table.column_names();
    if columns.is_empty() {
        return Ok(out);
    }

    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .from_writer(out);
    writer.write_record(&columns)?;
    for row in &table.data {
        writer.write_record(
            columns
                .iter()
                .map(|column| row.get(column).map(render_scalar).unwrap_or_default()),
        )?;
    }
    writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}

/// Text form of one cell. Null is empty; nested values are compact JSON.
pub fn render_scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// `sales.hyper` -> `sales_export.csv`
pub fn download_filename(file_name: &str, format: ExportFormat) -> String {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    let safe: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{}_export.{}", safe, format.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyperlens_test_utils::payloads::export_payload;
    use hyperlens_test_utils::TableFixture;
    use serde_json::json;

    fn single_table(columns: &[&str], rows: Vec<Vec<Value>>) -> ExportResult {
        let mut table = TableFixture::new("Extract", "T");
        for column in columns {
            table = table.column(column, "text");
        }
        for row in rows {
            table = table.row(row);
        }
        serde_json::from_value(export_payload("t.hyper", &[table], None)).unwrap()
    }

    #[test]
    fn test_delimited_quotes_only_when_needed() {
        let result = single_table(
            &["v"],
            vec![
                vec![json!("plain")],
                vec![json!("a,b")],
                vec![json!("say \"hi\"")],
                vec![json!("line\nbreak")],
                vec![json!("cr\rhere")],
            ],
        );
        assert_eq!(
            to_delimited(&result, b',').unwrap(),
            "# Extract.T\nv\nplain\n\"a,b\"\n\"say \"\"hi\"\"\"\n\"line\nbreak\"\n\"cr\rhere\"\n"
        );
    }

    #[test]
    fn test_tab_delimiter_leaves_commas_alone() {
        let result = single_table(&["a", "b"], vec![vec![json!("a,b"), json!("a\tb")]]);
        assert_eq!(
            to_delimited(&result, b'\t').unwrap(),
            "# Extract.T\na\tb\na,b\t\"a\tb\"\n"
        );
    }

    #[test]
    fn test_render_scalar() {
        assert_eq!(render_scalar(&Value::Null), "");
        assert_eq!(render_scalar(&json!(true)), "true");
        assert_eq!(render_scalar(&json!(1.5)), "1.5");
        assert_eq!(render_scalar(&json!("text")), "text");
        assert_eq!(render_scalar(&json!({"a": 1})), "{\"a\":1}");
    }

    #[test]
    fn test_download_filename() {
        assert_eq!(download_filename("sales.hyper", ExportFormat::Csv), "sales_export.csv");
        assert_eq!(
            download_filename("my extract.hyper", ExportFormat::Json),
            "my_extract_export.json"
        );
        assert_eq!(download_filename("noext", ExportFormat::Json), "noext_export.json");
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("xml".parse::<ExportFormat>().is_err());
    }
}
