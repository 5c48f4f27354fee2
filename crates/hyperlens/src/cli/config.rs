//! Configuration paths and resolved settings for Hyperlens
//!
//! All paths are under ~/.hyperlens/ unless HYPERLENS_HOME says otherwise.

use hyperlens_engine::ProcessEngine;
use hyperlens_protocol::paths::{default_config_path, default_logs_dir, hyperlens_home};
use hyperlens_protocol::HyperlensConfig;

/// Arguments for the config command
#[derive(Debug, clap::Args)]
pub struct ConfigArgs {
    /// Show resolved settings in JSON format
    #[arg(long)]
    pub json: bool,
}

fn exists_label(exists: bool) -> &'static str {
    if exists {
        "exists"
    } else {
        "not found"
    }
}

/// Run the config command - shows the resolved configuration
pub fn run(args: ConfigArgs, config: &HyperlensConfig) -> anyhow::Result<()> {
    let home = hyperlens_home();
    let config_file = default_config_path();
    let logs = default_logs_dir();
    let engine = ProcessEngine::new(&config.engine);
    let resolved = engine.locate();
    let staging = &config.staging;

    if args.json {
        let body = serde_json::json!({
            "home": home.to_string_lossy(),
            "config_file": {
                "path": config_file.to_string_lossy(),
                "exists": config_file.exists(),
            },
            "logs": {
                "path": logs.to_string_lossy(),
                "exists": logs.exists(),
                "filter": config.logging.filter,
                "max_files": config.logging.max_files,
                "max_file_bytes": config.logging.max_file_bytes,
            },
            "engine": {
                "program": config.engine.program.to_string_lossy(),
                "args": config.engine.args,
                "resolved": resolved.as_ref().map(|p| p.to_string_lossy().into_owned()),
            },
            "server": {
                "bind": config.server.bind,
            },
            "staging": {
                "dir": staging.dir.to_string_lossy(),
                "exists": staging.dir.exists(),
                "max_upload_bytes": staging.max_upload_bytes,
                "retention_secs": staging.retention_secs,
                "sweep_interval_secs": staging.sweep_interval_secs,
            },
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("HYPERLENS CONFIGURATION");
    println!("=======================");
    println!();
    println!("Home:        {}", home.display());
    println!(
        "Config file: {} ({})",
        config_file.display(),
        exists_label(config_file.exists())
    );
    println!("Logs:        {} ({})", logs.display(), exists_label(logs.exists()));
    println!(
        "  Filter {}, {} file(s) of up to {} bytes",
        config.logging.filter, config.logging.max_files, config.logging.max_file_bytes
    );
    println!();
    println!("Engine:");
    println!("  Program:   {}", config.engine.program.display());
    if !config.engine.args.is_empty() {
        println!("  Args:      {}", config.engine.args.join(" "));
    }
    match &resolved {
        Some(path) => println!("  Resolved:  {}", path.display()),
        None => println!("  Resolved:  not found on PATH"),
    }
    println!();
    println!("Server:");
    println!("  Bind:      {}", config.server.bind);
    println!();
    println!("Staging:");
    println!(
        "  Directory: {} ({})",
        staging.dir.display(),
        exists_label(staging.dir.exists())
    );
    println!(
        "  Max upload: {} bytes, retention {}s, sweep every {}s",
        staging.max_upload_bytes, staging.retention_secs, staging.sweep_interval_secs
    );
    Ok(())
}
