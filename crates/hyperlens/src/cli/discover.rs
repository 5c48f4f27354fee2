//! Discover command - list the `.hyper` files under a directory

use anyhow::Result;
use hyperlens_protocol::DiscoverResult;
use std::path::PathBuf;

use crate::cli::error::HelpfulError;
use crate::cli::output::{format_size, format_time, print_table, system_time_from_secs};
use crate::cli::CommandContext;
use hyperlens::shaping::to_json;

/// Arguments for the discover command
#[derive(Debug)]
pub struct DiscoverArgs {
    pub directory: PathBuf,
    pub json: bool,
}

/// Execute the discover command
pub async fn run(args: DiscoverArgs, ctx: &CommandContext) -> Result<()> {
    if !args.directory.exists() {
        return Err(HelpfulError::path_not_found(&args.directory).into());
    }
    if !args.directory.is_dir() {
        return Err(HelpfulError::not_a_directory(&args.directory).into());
    }

    let result = ctx
        .dispatcher
        .discover(&args.directory, &ctx.cancel)
        .await
        .map_err(|e| HelpfulError::from_dispatch(&e, &args.directory))?;

    if args.json {
        println!("{}", to_json(&result)?);
    } else {
        output_table(&result);
    }
    Ok(())
}

fn output_table(result: &DiscoverResult) {
    if result.files.is_empty() {
        println!("No .hyper files found in {}", result.directory);
        return;
    }

    let rows: Vec<Vec<String>> = result
        .files
        .iter()
        .map(|file| {
            vec![
                file.name.clone(),
                format_size(file.size_bytes),
                format_time(system_time_from_secs(file.modified_at)),
                file.absolute_path.display().to_string(),
            ]
        })
        .collect();
    print_table(&["Name", "Size", "Modified", "Path"], rows);

    let total: u64 = result.files.iter().map(|f| f.size_bytes).sum();
    println!();
    println!(
        "Found {} .hyper file{} ({}) in {}",
        result.files_found,
        if result.files_found == 1 { "" } else { "s" },
        format_size(total),
        result.directory
    );
}
