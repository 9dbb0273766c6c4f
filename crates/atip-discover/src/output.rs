// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command results and their table, JSON, and quiet renderings.

use std::fmt::Write as _;
use std::path::PathBuf;

use atip_core::{RegistryEntry, ScanResult};
use atip_registry::CacheInfo;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    /// Print nothing; rely on the exit code.
    Quiet,
}

/// A registry entry plus its staleness at the time of listing.
#[derive(Debug, Clone, Serialize)]
pub struct ToolRow {
    #[serde(flatten)]
    pub entry: RegistryEntry,
    pub stale: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileValidation {
    pub path: PathBuf,
    pub valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Report {
    Scan(ScanResult),
    List {
        tools: Vec<ToolRow>,
    },
    Tool {
        #[serde(flatten)]
        tool: ToolRow,
        #[serde(skip_serializing_if = "Option::is_none")]
        manifest: Option<Value>,
    },
    Removed {
        name: String,
        cache_removed: bool,
    },
    Validation {
        files: Vec<FileValidation>,
    },
    CacheInfo {
        cache: CacheInfo,
        registry_file: PathBuf,
        tools: usize,
        last_scan: Option<DateTime<Utc>>,
    },
    CacheCleared {
        tools: usize,
        manifests: usize,
    },
}

impl Report {
    /// `2` for partial success, `0` otherwise. Fatal errors never produce a report.
    pub fn exit_code(&self) -> u8 {
        match self {
            Report::Scan(result) if result.is_partial() => 2,
            Report::Validation { files } if files.iter().any(|f| !f.valid) => 2,
            _ => 0,
        }
    }
}

pub fn render(report: &Report, format: OutputFormat, use_color: bool) -> String {
    match format {
        OutputFormat::Quiet => String::new(),
        OutputFormat::Json => serde_json::to_string_pretty(report)
            .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize report: {e}\"}}")),
        OutputFormat::Table => render_table(report, use_color),
    }
}

fn render_table(report: &Report, use_color: bool) -> String {
    let mut out = String::new();
    match report {
        Report::Scan(result) => render_scan(&mut out, result, use_color),
        Report::List { tools } => {
            if tools.is_empty() {
                out.push_str("no tools registered");
            } else {
                render_tool_table(&mut out, tools, use_color);
            }
        }
        Report::Tool { tool, manifest } => {
            let e = &tool.entry;
            let _ = writeln!(out, "Name:         {}", e.name);
            let _ = writeln!(out, "Version:      {}", e.version);
            let _ = writeln!(out, "Path:         {}", e.path.display());
            let _ = writeln!(out, "Source:       {}", e.source);
            let _ = writeln!(out, "Discovered:   {}", timestamp(e.discovered_at));
            let _ = writeln!(out, "Verified:     {}", timestamp(e.last_verified));
            let _ = write!(out, "Stale:        {}", status(!tool.stale, "no", "yes", use_color));
            if let Some(manifest) = manifest {
                let pretty = serde_json::to_string_pretty(manifest).unwrap_or_default();
                let _ = write!(out, "\n\n{pretty}");
            }
        }
        Report::Removed {
            name,
            cache_removed,
        } => {
            let _ = write!(out, "removed {name}");
            if *cache_removed {
                out.push_str(" (cached manifest deleted)");
            }
        }
        Report::Validation { files } => {
            for (i, file) in files.iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                }
                let label = status(file.valid, "[OK]", "[FAIL]", use_color);
                let _ = write!(out, "{label} {}", file.path.display());
                for error in &file.errors {
                    let _ = write!(out, "\n    {error}");
                }
            }
        }
        Report::CacheInfo {
            cache,
            registry_file,
            tools,
            last_scan,
        } => {
            let _ = writeln!(out, "Registry:     {}", registry_file.display());
            let _ = writeln!(out, "Tools:        {tools}");
            let _ = writeln!(out, "Last scan:    {}", timestamp(*last_scan));
            let _ = writeln!(out, "Cache dir:    {}", cache.dir.display());
            let _ = writeln!(out, "Manifests:    {}", cache.entries);
            let _ = write!(out, "Size:         {}", human_bytes(cache.total_bytes));
        }
        Report::CacheCleared { tools, manifests } => {
            let _ = write!(
                out,
                "cleared {tools} registry entries and {manifests} cached manifests"
            );
        }
    }
    out
}

fn render_scan(out: &mut String, result: &ScanResult, use_color: bool) {
    let _ = write!(
        out,
        "discovered {}, updated {}, failed {}, skipped {} in {:.1}s",
        result.discovered,
        result.updated,
        result.failed,
        result.skipped,
        result.duration.as_secs_f64()
    );
    if result.cancelled {
        out.push_str(" (cancelled)");
    }
    for tool in &result.tools {
        let _ = write!(
            out,
            "\n  {} {} {}",
            status(true, "+", "+", use_color),
            tool.name,
            tool.version
        );
    }
    for error in &result.errors {
        let _ = write!(
            out,
            "\n  {} {}: {}",
            status(false, "!", "!", use_color),
            error.path.display(),
            error.message
        );
    }
}

fn render_tool_table(out: &mut String, tools: &[ToolRow], use_color: bool) {
    let name_w = tools.iter().map(|t| t.entry.name.len()).max().unwrap_or(0).max(4);
    let version_w = tools
        .iter()
        .map(|t| t.entry.version.len())
        .max()
        .unwrap_or(0)
        .max(7);

    let _ = write!(
        out,
        "{:name_w$}  {:version_w$}  {:6}  PATH",
        "NAME", "VERSION", "SOURCE"
    );
    for tool in tools {
        let e = &tool.entry;
        let _ = write!(
            out,
            "\n{:name_w$}  {:version_w$}  {:6}  {}",
            e.name,
            e.version,
            e.source.to_string(),
            e.path.display()
        );
        if tool.stale {
            let _ = write!(out, "  {}", status(false, "(stale)", "(stale)", use_color));
        }
    }
}

fn status(ok: bool, ok_text: &str, fail_text: &str, use_color: bool) -> String {
    if !use_color {
        return if ok { ok_text } else { fail_text }.to_string();
    }
    use colored::Colorize;
    if ok {
        ok_text.green().to_string()
    } else {
        fail_text.red().to_string()
    }
}

fn timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .unwrap_or_else(|| "never".to_string())
}

fn human_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}
