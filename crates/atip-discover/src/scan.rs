// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `atip-discover scan`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use atip_config::AtipConfig;
use atip_core::AtipError;
use atip_discovery::{ProbeConfig, ProcessProber, ScanOptions, Scanner, SkipList};
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::output::Report;

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Scan this directory instead of the configured safe paths (repeatable).
    /// Explicit directories skip the safe-path check.
    #[arg(long = "path", value_name = "DIR")]
    pub paths: Vec<PathBuf>,

    /// Probe every candidate, even unchanged ones.
    #[arg(long)]
    pub full: bool,

    /// Do not load shim manifests.
    #[arg(long)]
    pub no_shims: bool,

    /// Timeout for the introspection call in milliseconds.
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Number of concurrent probes.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub parallel: Option<u64>,
}

/// Command-line flags take precedence over configuration.
pub fn build_options(
    args: &ScanArgs,
    config: &AtipConfig,
) -> Result<(ProbeConfig, ScanOptions), AtipError> {
    let discovery = &config.discovery;

    let scan_timeout = Duration::from_millis(args.timeout.unwrap_or(discovery.scan_timeout_ms));
    let probe = ProbeConfig::new(
        Duration::from_millis(discovery.help_timeout_ms),
        scan_timeout,
        discovery.max_output_bytes,
    );

    let options = ScanOptions {
        safe_paths: config.safe_paths(),
        explicit_paths: args.paths.clone(),
        skip_list: SkipList::new(&discovery.skip_list)?,
        parallelism: args
            .parallel
            .map(|n| n as usize)
            .unwrap_or(discovery.parallelism),
        incremental: !args.full,
        include_shims: !args.no_shims,
    };
    Ok((probe, options))
}

pub async fn run_scan(
    args: &ScanArgs,
    config: &AtipConfig,
    cancel: CancellationToken,
) -> Result<Report, AtipError> {
    let (probe, options) = build_options(args, config)?;
    let scanner = Scanner::new(Arc::new(ProcessProber::new(probe)), config.data_paths());
    let result = scanner.scan_with_cancel(&options, cancel).await?;
    Ok(Report::Scan(result))
}
