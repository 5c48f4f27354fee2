//! Engine documents shaped like the real engine's stdout.

use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// A table with declared columns and literal rows.
#[derive(Debug, Clone)]
pub struct TableFixture {
    pub schema: String,
    pub name: String,
    pub columns: Vec<(String, String)>,
    pub rows: Vec<Vec<Value>>,
    /// Report the row count as undeterminable, as the engine does for views.
    pub unknown_count: bool,
}

impl TableFixture {
    pub fn new(schema: &str, name: &str) -> Self {
        Self {
            schema: schema.to_string(),
            name: name.to_string(),
            columns: Vec::new(),
            rows: Vec::new(),
            unknown_count: false,
        }
    }

    pub fn column(mut self, name: &str, declared_type: &str) -> Self {
        self.columns.push((name.to_string(), declared_type.to_string()));
        self
    }

    pub fn row(mut self, values: Vec<Value>) -> Self {
        self.rows.push(values);
        self
    }

    pub fn unknown_count(mut self) -> Self {
        self.unknown_count = true;
        self
    }

    /// `Extract.<name>` with `id` / `label` columns and `count` rows.
    pub fn numbered(name: &str, count: usize) -> Self {
        let mut table = Self::new("Extract", name)
            .column("id", "integer")
            .column("label", "text");
        for i in 0..count {
            table.rows.push(vec![json!(i as u64 + 1), json!(format!("row {}", i + 1))]);
        }
        table
    }

    fn full_name(&self) -> String {
        format!("\"{}\".\"{}\"", self.schema, self.name)
    }

    fn columns_json(&self) -> Value {
        Value::Array(
            self.columns
                .iter()
                .map(|(name, declared_type)| {
                    json!({"name": name, "type": declared_type, "nullable": true, "default": null})
                })
                .collect(),
        )
    }

    fn row_count_json(&self) -> Value {
        if self.unknown_count {
            json!("Unable to determine")
        } else {
            json!(self.rows.len())
        }
    }

    fn row_object(&self, row: &[Value]) -> Map<String, Value> {
        self.columns
            .iter()
            .zip(row.iter())
            .map(|((name, _), value)| (name.clone(), value.clone()))
            .collect()
    }
}

/// Discover document listing `files` (real paths; metadata read from disk).
pub fn discover_payload(directory: &Path, files: &[&Path]) -> Value {
    let entries: Vec<Value> = files
        .iter()
        .map(|path| {
            let meta = fs::metadata(path).ok();
            let size = meta.as_ref().map(|m| m.len()).unwrap_or(0);
            let modified = meta
                .and_then(|m| m.modified().ok())
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);
            json!({
                "path": path.display().to_string(),
                "name": path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
                "size": size,
                "modified": modified,
            })
        })
        .collect();
    json!({
        "directory": directory.display().to_string(),
        "files_found": entries.len(),
        "files": entries,
        "success": true,
    })
}

/// Inspect document with up to five sample rows per table.
pub fn inspect_payload(file_name: &str, tables: &[TableFixture]) -> Value {
    let tables_json: Vec<Value> = tables
        .iter()
        .map(|table| {
            json!({
                "schema": table.schema,
                "name": table.name,
                "full_name": table.full_name(),
                "type": "TABLE",
                "columns": table.columns_json(),
                "row_count": table.row_count_json(),
                "sample_data": table.rows.iter().take(5).cloned().collect::<Vec<_>>(),
            })
        })
        .collect();
    let total_rows: usize = tables
        .iter()
        .filter(|t| !t.unknown_count)
        .map(|t| t.rows.len())
        .sum();
    json!({
        "file_path": format!("/data/{}", file_name),
        "file_name": file_name,
        "file_size": 4096,
        "schemas": schemas_of(tables),
        "tables": tables_json,
        "total_tables": tables.len(),
        "total_rows": total_rows,
        "success": true,
    })
}

/// Export document. `limit` caps rows per table the way the engine's
/// `--max-rows` does; `None` returns every row.
pub fn export_payload(file_name: &str, tables: &[TableFixture], limit: Option<usize>) -> Value {
    let mut exported_total = 0;
    let tables_json: Vec<Value> = tables
        .iter()
        .map(|table| {
            let take = limit.unwrap_or(usize::MAX);
            let data: Vec<Value> = table
                .rows
                .iter()
                .take(take)
                .map(|row| Value::Object(table.row_object(row)))
                .collect();
            exported_total += data.len();
            json!({
                "schema": table.schema,
                "name": table.name,
                "full_name": table.full_name(),
                "type": "TABLE",
                "columns": table.columns_json(),
                "total_rows": table.row_count_json(),
                "exported_rows": data.len(),
                "data": data,
            })
        })
        .collect();
    json!({
        "file_path": format!("/data/{}", file_name),
        "file_name": file_name,
        "file_size": 4096,
        "export_type": if limit == Some(5) { "sample_only" } else { "full_data" },
        "max_rows_per_table": limit,
        "schemas": schemas_of(tables),
        "tables": tables_json,
        "total_tables": tables.len(),
        "total_rows_exported": exported_total,
        "success": true,
    })
}

/// The document the engine prints for a cleanly reported failure.
pub fn rejection(message: &str) -> Value {
    json!({"error": message, "success": false})
}

fn schemas_of(tables: &[TableFixture]) -> Vec<String> {
    let mut schemas: Vec<String> = Vec::new();
    for table in tables {
        if !schemas.contains(&table.schema) {
            schemas.push(table.schema.clone());
        }
    }
    schemas
}
