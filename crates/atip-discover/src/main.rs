// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! atip-discover - finds ATIP-compatible tools on this machine.
//!
//! Exit codes: `0` success, `2` partial success (some candidates or files
//! failed), `1` fatal error.

mod cache;
mod output;
mod registry_cmd;
mod scan;
mod validate;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use atip_config::AtipConfig;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::output::{OutputFormat, Report};

/// atip-discover - discover ATIP-compatible command-line tools.
#[derive(Parser, Debug)]
#[command(name = "atip-discover", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Output format.
    #[arg(long, short = 'o', global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Disable colored output.
    #[arg(long, global = true)]
    plain: bool,

    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Probe executables and update the registry.
    Scan(scan::ScanArgs),
    /// List registered tools.
    List(registry_cmd::ListArgs),
    /// Show one registered tool.
    Get(registry_cmd::GetArgs),
    /// Remove a tool from the registry and the manifest cache.
    Remove(registry_cmd::RemoveArgs),
    /// Check manifest files against the schema.
    Validate(validate::ValidateArgs),
    /// Inspect or clear the manifest cache.
    Cache {
        #[command(subcommand)]
        action: cache::CacheAction,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => atip_config::load_and_validate_path(path),
        None => atip_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            atip_config::render_errors(&errors);
            return ExitCode::from(1);
        }
    };

    let log_level = if cli.verbose {
        "debug"
    } else {
        config.logging.log_level.as_str()
    };
    init_tracing(log_level);

    match run(cli.command, &config).await {
        Ok(report) => {
            let use_color = !cli.plain && std::io::stdout().is_terminal();
            let rendered = output::render(&report, cli.format, use_color);
            if !rendered.is_empty() {
                println!("{rendered}");
            }
            ExitCode::from(report.exit_code())
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn run(command: Commands, config: &AtipConfig) -> Result<Report, atip_core::AtipError> {
    match command {
        Commands::Scan(args) => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, stopping scan");
                    on_signal.cancel();
                }
            });
            scan::run_scan(&args, config, cancel).await
        }
        Commands::List(args) => registry_cmd::run_list(&args, config),
        Commands::Get(args) => registry_cmd::run_get(&args, config),
        Commands::Remove(args) => registry_cmd::run_remove(&args, config),
        Commands::Validate(args) => Ok(validate::run_validate(&args)),
        Commands::Cache { action } => cache::run_cache(&action, config),
    }
}

/// Logs go to stderr so machine-readable output on stdout stays clean.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("atip={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
