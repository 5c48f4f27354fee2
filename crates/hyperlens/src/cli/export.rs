//! Export command - table data as JSON or CSV, to a file or stdout

use anyhow::Result;
use hyperlens::shaping::ExportFormat;
use hyperlens_engine::validate::max_rows_from_str;
use hyperlens_protocol::{ExportOptions, ExportResult, ExportType};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::cli::error::HelpfulError;
use crate::cli::inspect::check_hyper_file;
use crate::cli::output::{format_number, format_size};
use crate::cli::CommandContext;

/// Arguments for the export command
#[derive(Debug)]
pub struct ExportArgs {
    pub file: PathBuf,
    pub output: Option<PathBuf>,
    pub sample: bool,
    /// Raw `--max-rows` text, validated here so bad values get a helpful error.
    pub max_rows: Option<String>,
    pub format: ExportFormat,
}

/// Build export options from the command-line flags.
pub fn export_options(sample: bool, max_rows: Option<&str>) -> Result<ExportOptions, HelpfulError> {
    let max_rows = match max_rows {
        Some(raw) if !sample => {
            Some(max_rows_from_str(raw).map_err(|_| HelpfulError::invalid_max_rows(raw))?)
        }
        _ => None,
    };
    Ok(ExportOptions {
        sample_only: sample,
        max_rows,
    })
}

/// Execute the export command
pub async fn run(args: ExportArgs, ctx: &CommandContext) -> Result<()> {
    let options = export_options(args.sample, args.max_rows.as_deref())?;
    check_hyper_file(&args.file)?;

    let result = ctx
        .dispatcher
        .export(&args.file, &options, &ctx.cancel)
        .await
        .map_err(|e| HelpfulError::from_dispatch(&e, &args.file))?;

    let rendered = args.format.render(&result)?;

    match &args.output {
        Some(path) => {
            write_output(path, &rendered)?;
            info!(
                file = %args.file.display(),
                output = %path.display(),
                rows = result.total_rows_exported,
                "Export written"
            );
            println!("{}", summary(&result, path, rendered.len() as u64));
        }
        None => {
            print!("{}", rendered);
            if !rendered.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}

pub fn write_output(path: &Path, contents: &str) -> Result<(), HelpfulError> {
    std::fs::write(path, contents)
        .map_err(|e| HelpfulError::cannot_write_output(path, &e.to_string()))
}

fn summary(result: &ExportResult, path: &Path, bytes: u64) -> String {
    let mode = match result.export_type {
        ExportType::SampleOnly => "sample".to_string(),
        ExportType::FullData => match result.max_rows_per_table {
            Some(limit) => format!("up to {} rows per table", format_number(limit)),
            None => "all rows".to_string(),
        },
    };
    format!(
        "Exported {} rows from {} table{} ({}) to {} ({})",
        format_number(result.total_rows_exported),
        result.total_tables,
        if result.total_tables == 1 { "" } else { "s" },
        mode,
        path.display(),
        format_size(bytes)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyperlens_protocol::ErrorKind;

    #[test]
    fn test_export_options_from_flags() {
        assert_eq!(export_options(false, None).unwrap(), ExportOptions::default());
        assert_eq!(
            export_options(false, Some("250")).unwrap(),
            ExportOptions::limited(250)
        );
        // --sample ignores --max-rows entirely, even a bad value
        assert_eq!(export_options(true, Some("abc")).unwrap(), ExportOptions::sample());
    }

    #[test]
    fn test_bad_max_rows_is_helpful() {
        for raw in ["0", "-3", "ten"] {
            let err = export_options(false, Some(raw)).unwrap_err();
            assert_eq!(err.kind, Some(ErrorKind::InvalidInput));
            assert!(err.message.contains(raw));
        }
    }

    #[test]
    fn test_write_output_to_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.json");
        let err = write_output(&path, "{}").unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::Io));
    }
}
