//! Interactive command - pick a discovered file, then inspect or export it

use anyhow::Result;
use hyperlens::shaping::{download_filename, ExportFormat};
use hyperlens_engine::validate::max_rows_from_str;
use hyperlens_protocol::defaults::SAMPLE_ROW_LIMIT;
use hyperlens_protocol::{DiscoverResult, ExportOptions, FileDescriptor};
use std::io::{self, StdinLock, Stdout, Write};
use std::path::PathBuf;

use crate::cli::error::{is_interrupted, render, HelpfulError};
use crate::cli::export::write_output;
use crate::cli::inspect::print_report;
use crate::cli::output::{format_size, format_time, system_time_from_secs};
use crate::cli::prompt::{prompt_choice, prompt_confirm, prompt_line};
use crate::cli::CommandContext;

/// Arguments for the interactive command
#[derive(Debug)]
pub struct InteractiveArgs {
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Inspect,
    Export(ExportFormat),
    Back,
    Quit,
}

const ACTIONS: [(&str, Action); 5] = [
    ("Inspect", Action::Inspect),
    ("Export as JSON", Action::Export(ExportFormat::Json)),
    ("Export as CSV", Action::Export(ExportFormat::Csv)),
    ("Choose another file", Action::Back),
    ("Quit", Action::Quit),
];

/// Execute the interactive command
pub async fn run(args: InteractiveArgs, ctx: &CommandContext) -> Result<()> {
    if !args.directory.is_dir() {
        return Err(HelpfulError::path_not_found(&args.directory).into());
    }

    let found = ctx
        .dispatcher
        .discover(&args.directory, &ctx.cancel)
        .await
        .map_err(|e| HelpfulError::from_dispatch(&e, &args.directory))?;

    if found.files.is_empty() {
        println!("No .hyper files found in {}", found.directory);
        return Ok(());
    }

    loop {
        print_file_menu(&found);
        let count = found.files.len();
        let prompt = format!("Select a file (1-{}, q to quit): ", count);
        let Some(index) = ask(move |input, output| prompt_choice(input, output, &prompt, count)).await?
        else {
            return Ok(());
        };

        match file_session(&found.files[index], ctx).await? {
            Action::Quit => return Ok(()),
            _ => continue,
        }
    }
}

/// Actions on one file until the user goes back or quits.
async fn file_session(file: &FileDescriptor, ctx: &CommandContext) -> Result<Action> {
    loop {
        println!();
        println!("{} ({})", file.name, format_size(file.size_bytes));
        for (i, (label, _)) in ACTIONS.iter().enumerate() {
            println!("  {}) {}", i + 1, label);
        }
        let Some(choice) = ask(|input, output| {
            prompt_choice(input, output, "Action: ", ACTIONS.len())
        })
        .await?
        else {
            return Ok(Action::Quit);
        };

        let action = ACTIONS[choice].1;
        let outcome = match action {
            Action::Inspect => inspect(file, ctx).await,
            Action::Export(format) => export(file, format, ctx).await,
            Action::Back | Action::Quit => return Ok(action),
        };

        // A failed engine call ends the action, not the session.
        if let Err(err) = outcome {
            if is_interrupted(&err) {
                return Err(err);
            }
            eprint!("{}", render(&err));
        }
    }
}

async fn inspect(file: &FileDescriptor, ctx: &CommandContext) -> Result<()> {
    let result = ctx
        .dispatcher
        .inspect(&file.absolute_path, &ctx.cancel)
        .await
        .map_err(|e| HelpfulError::from_dispatch(&e, &file.absolute_path))?;
    println!();
    print_report(&result);
    Ok(())
}

async fn export(file: &FileDescriptor, format: ExportFormat, ctx: &CommandContext) -> Result<()> {
    let Some(options) = ask(ask_export_options).await? else {
        return Ok(());
    };

    let default_name = download_filename(&file.name, format);
    let Some(output) = ask(move |input, output| {
        let answer = prompt_line(input, output, &format!("Output file [{}]: ", default_name))?;
        Ok(answer.map(|a| if a.is_empty() { default_name } else { a }))
    })
    .await?
    else {
        return Ok(());
    };
    let output = PathBuf::from(output);

    let result = ctx
        .dispatcher
        .export(&file.absolute_path, &options, &ctx.cancel)
        .await
        .map_err(|e| HelpfulError::from_dispatch(&e, &file.absolute_path))?;
    let rendered = format.render(&result)?;
    write_output(&output, &rendered)?;

    println!(
        "Exported {} rows from {} tables to {}",
        result.total_rows_exported,
        result.total_tables,
        output.display()
    );
    Ok(())
}

/// Sample or full export, and an optional per-table row limit.
fn ask_export_options(
    input: &mut StdinLock<'static>,
    output: &mut Stdout,
) -> io::Result<Option<ExportOptions>> {
    let question = format!("Sample only (first {} rows per table)?", SAMPLE_ROW_LIMIT);
    let Some(sample) = prompt_confirm(input, output, &question, Some(true))? else {
        return Ok(None);
    };
    if sample {
        return Ok(Some(ExportOptions::sample()));
    }

    loop {
        let Some(raw) = prompt_line(input, output, "Max rows per table (blank for all): ")? else {
            return Ok(None);
        };
        if raw.is_empty() {
            return Ok(Some(ExportOptions::default()));
        }
        match max_rows_from_str(&raw) {
            Ok(n) => return Ok(Some(ExportOptions::limited(n))),
            Err(_) => writeln!(output, "Enter a positive whole number, or leave blank.")?,
        }
    }
}

fn print_file_menu(found: &DiscoverResult) {
    println!();
    println!("Found {} .hyper file(s) in {}", found.files_found, found.directory);
    for (i, file) in found.files.iter().enumerate() {
        println!(
            "  {:>3}) {:<40} {:>10}  {}",
            i + 1,
            file.name,
            format_size(file.size_bytes),
            format_time(system_time_from_secs(file.modified_at))
        );
    }
}

/// Run a blocking prompt on the blocking pool so the runtime keeps serving
/// the Ctrl-C listener.
async fn ask<T, F>(prompt: F) -> Result<Option<T>>
where
    T: Send + 'static,
    F: FnOnce(&mut StdinLock<'static>, &mut Stdout) -> io::Result<Option<T>> + Send + 'static,
{
    let answer = tokio::task::spawn_blocking(move || {
        let mut input = io::stdin().lock();
        let mut output = io::stdout();
        prompt(&mut input, &mut output)
    })
    .await??;
    Ok(answer)
}
