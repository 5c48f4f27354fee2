//! Hyperlens command-line launcher
//!
//! - **One-shot commands**: `discover`, `inspect`, `export` run one engine
//!   call each; Ctrl-C cancels the engine process group and exits 130
//! - **Interactive browser**: `interactive` chains discover, inspect and export
//! - **Web service**: `serve` runs the upload API until Ctrl-C or SIGTERM

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hyperlens::shaping::ExportFormat;
use hyperlens_logging::{init_logging, ConsoleMode, LogConfig};
use hyperlens_protocol::{ConfigError, HyperlensConfig};
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

use cli::context::EXIT_INTERRUPTED;
use cli::error::{is_interrupted, print_json_error, render};
use cli::CommandContext;

#[derive(Parser, Debug)]
#[command(
    name = "hyperlens",
    version,
    about = "Inspect and export Tableau .hyper extracts"
)]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Inspection engine executable (overrides config and HYPERLENS_ENGINE)
    #[arg(long, global = true)]
    engine: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List .hyper files in a directory
    Discover {
        /// Directory to search
        #[arg(default_value = ".")]
        directory: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show schemas, tables, row counts and sample rows of a .hyper file
    Inspect {
        /// File to inspect
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export table data as JSON or CSV
    Export {
        /// File to export
        file: PathBuf,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only the first 5 rows of each table (wins over --max-rows)
        #[arg(long)]
        sample: bool,

        /// Maximum rows per table
        #[arg(long, allow_hyphen_values = true)]
        max_rows: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
    },

    /// Browse a directory and inspect or export files from prompts
    Interactive {
        /// Directory to browse
        #[arg(default_value = ".")]
        directory: PathBuf,
    },

    /// Run the HTTP upload service
    Serve {
        /// Address to listen on (e.g. 127.0.0.1:3000)
        #[arg(long)]
        bind: Option<String>,

        /// Directory for staged uploads
        #[arg(long)]
        staging_dir: Option<PathBuf>,
    },

    /// Show resolved paths and settings
    Config(cli::config::ConfigArgs),
}

impl Commands {
    fn wants_json(&self) -> bool {
        match self {
            Commands::Discover { json, .. } | Commands::Inspect { json, .. } => *json,
            Commands::Config(args) => args.json,
            _ => false,
        }
    }

    fn is_long_running(&self) -> bool {
        matches!(self, Commands::Serve { .. })
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_mode = cli.command.wants_json();

    let console = if cli.verbose || cli.command.is_long_running() {
        ConsoleMode::Full
    } else {
        ConsoleMode::Quiet
    };
    let config = HyperlensConfig::load();
    let logging = config
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    if let Err(err) = init_logging(LogConfig {
        app_name: "hyperlens",
        console,
        log_dir: None,
        settings: &logging,
    }) {
        eprintln!("Warning: failed to initialize logging: {:#}", err);
    }

    match run_command(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if is_interrupted(&err) => {
            eprintln!("Interrupted");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(err) => {
            if json_mode {
                print_json_error(&err);
            }
            eprint!("{}", render(&err));
            ExitCode::from(1)
        }
    }
}

fn run_command(cli: Cli, config: Result<HyperlensConfig, ConfigError>) -> Result<()> {
    let mut config = config?;
    config.apply_overrides(cli.engine, None, None);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async move {
        let ctx = CommandContext::new(config);
        if !cli.command.is_long_running() {
            ctx.cancel_on_ctrl_c();
        }

        match cli.command {
            Commands::Discover { directory, json } => {
                cli::discover::run(cli::discover::DiscoverArgs { directory, json }, &ctx).await
            }
            Commands::Inspect { file, json } => {
                cli::inspect::run(cli::inspect::InspectArgs { file, json }, &ctx).await
            }
            Commands::Export {
                file,
                output,
                sample,
                max_rows,
                format,
            } => {
                let args = cli::export::ExportArgs {
                    file,
                    output,
                    sample,
                    max_rows,
                    format,
                };
                cli::export::run(args, &ctx).await
            }
            Commands::Interactive { directory } => {
                let args = cli::interactive::InteractiveArgs { directory };
                cli::interactive::run(args, &ctx).await
            }
            Commands::Serve { bind, staging_dir } => {
                let args = cli::serve::ServeArgs { bind, staging_dir };
                cli::serve::run(args, ctx.config).await
            }
            Commands::Config(args) => cli::config::run(args, &ctx.config),
        }
    })
}
