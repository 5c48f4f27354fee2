//! Inspect command - schemas, tables, row counts and sample rows of one file

use anyhow::Result;
use hyperlens::shaping::{render_scalar, to_json};
use hyperlens_protocol::{has_hyper_extension, InspectResult, InspectedTable, RowCount};
use std::path::{Path, PathBuf};

use crate::cli::error::HelpfulError;
use crate::cli::output::{format_number, format_size, print_table, truncate_cell};
use crate::cli::CommandContext;

/// Arguments for the inspect command
#[derive(Debug)]
pub struct InspectArgs {
    pub file: PathBuf,
    pub json: bool,
}

/// Execute the inspect command
pub async fn run(args: InspectArgs, ctx: &CommandContext) -> Result<()> {
    check_hyper_file(&args.file)?;

    let result = ctx
        .dispatcher
        .inspect(&args.file, &ctx.cancel)
        .await
        .map_err(|e| HelpfulError::from_dispatch(&e, &args.file))?;

    if args.json {
        println!("{}", to_json(&result)?);
    } else {
        print_report(&result);
    }
    Ok(())
}

/// Shared by `inspect` and `export`: friendly errors before the dispatcher's
/// own validation.
pub fn check_hyper_file(path: &Path) -> Result<(), HelpfulError> {
    if !path.exists() {
        return Err(HelpfulError::file_not_found(path));
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !path.is_file() || !has_hyper_extension(&name) {
        return Err(HelpfulError::not_a_hyper_file(path));
    }
    Ok(())
}

pub fn print_report(result: &InspectResult) {
    println!("File:    {} ({})", result.file_name, format_size(result.file_size));
    println!("Schemas: {}", result.schemas.join(", "));
    let unknown = result.unknown_row_counts();
    if unknown > 0 {
        println!(
            "Tables:  {}    Rows: {} (+{} table{} with unknown count)",
            result.total_tables,
            format_number(result.total_rows),
            unknown,
            if unknown == 1 { "" } else { "s" }
        );
    } else {
        println!(
            "Tables:  {}    Rows: {}",
            result.total_tables,
            format_number(result.total_rows)
        );
    }

    for table in &result.tables {
        println!();
        print_table_section(table);
    }
}

fn print_table_section(table: &InspectedTable) {
    let rows = match table.row_count {
        RowCount::Known(n) => format!("{} rows", format_number(n)),
        RowCount::Unknown => "row count unknown".to_string(),
    };
    println!(
        "{} ({}, {})",
        table.schema.qualified_name(),
        table.schema.table_kind,
        rows
    );

    let columns: Vec<Vec<String>> = table
        .schema
        .columns
        .iter()
        .map(|c| {
            vec![
                c.name.clone(),
                c.declared_type.clone(),
                if c.nullable { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    print_table(&["Column", "Type", "Nullable"], columns);

    if let Some(message) = table.sample_error() {
        println!("Sample unavailable: {}", message);
        return;
    }
    let samples: Vec<Vec<String>> = table
        .sample_rows()
        .map(|row| row.iter().map(|v| truncate_cell(&render_scalar(v))).collect())
        .collect();
    if samples.is_empty() {
        return;
    }
    let headers: Vec<&str> = table.schema.columns.iter().map(|c| c.name.as_str()).collect();
    println!("Sample rows:");
    print_table(&headers, samples);
}
