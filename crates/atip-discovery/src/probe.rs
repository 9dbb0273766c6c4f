// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Two-phase probing of candidate executables.
//!
//! Phase 1 runs `<exe> --help` and looks for a standalone `--agent` token in
//! the combined output. Only tools that advertise the flag reach phase 2,
//! which runs `<exe> --agent` and validates the JSON it prints.
//!
//! Every invocation runs with stdin closed, a scrubbed environment, the temp
//! dir as working directory, capped output, and a deadline. On Unix the child
//! leads its own process group so a timeout kills anything it forked.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use atip_core::AtipError;
use atip_manifest::{Manifest, parse_manifest};
use regex::Regex;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Flag that asks a tool for its manifest.
pub const INTROSPECTION_FLAG: &str = "--agent";

/// Flag used for the capability check.
pub const USAGE_FLAG: &str = "--help";

/// Lower bound for the capability-check timeout.
pub const MIN_HELP_TIMEOUT: Duration = Duration::from_secs(1);

/// Environment variables passed through to probed tools.
const INHERITED_ENV: &[&str] = &["PATH", "HOME", "TMPDIR", "LANG"];

const SPAWN_RETRIES: u32 = 3;
const SPAWN_RETRY_DELAY: Duration = Duration::from_millis(20);

/// How long readers get to drain after the process group was killed.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

static INTROSPECTION_TOKEN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[^a-z0-9_-])--agent(?:$|[^a-z0-9_-])").ok());

/// A validated manifest together with the document it was parsed from.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredTool {
    pub manifest: Manifest,
    pub raw: Value,
}

/// Result of probing one executable that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// The tool does not implement the protocol. Not an error.
    NotSupported,
    Discovered(Box<DiscoveredTool>),
}

/// Probes a single executable.
///
/// Errors are per-candidate failures, except [`AtipError::Cancelled`] which
/// means the scan is shutting down.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<ProbeOutcome, AtipError>;
}

/// Timeouts and limits for [`ProcessProber`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    pub help_timeout: Duration,
    pub scan_timeout: Duration,
    pub max_output_bytes: usize,
}

impl ProbeConfig {
    /// Builds a config, raising `help_timeout` to [`MIN_HELP_TIMEOUT`].
    pub fn new(help_timeout: Duration, scan_timeout: Duration, max_output_bytes: usize) -> Self {
        Self {
            help_timeout: help_timeout.max(MIN_HELP_TIMEOUT),
            scan_timeout,
            max_output_bytes,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self::new(MIN_HELP_TIMEOUT, Duration::from_millis(2000), 1024 * 1024)
    }
}

/// Probes by actually running the executable.
#[derive(Debug, Clone, Default)]
pub struct ProcessProber {
    config: ProbeConfig,
}

impl ProcessProber {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Phase 1. Any failure other than cancellation counts as "not supported".
    pub async fn supports_introspection(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<bool, AtipError> {
        match self
            .run(path, USAGE_FLAG, self.config.help_timeout, cancel)
            .await
        {
            Ok(output) => Ok(advertises_introspection(
                &output.stdout.bytes,
                &output.stderr.bytes,
            )),
            Err(AtipError::Cancelled) => Err(AtipError::Cancelled),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "capability check failed");
                Ok(false)
            }
        }
    }

    /// Phase 2. Runs the introspection flag and interprets the output.
    pub async fn fetch_manifest(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<ProbeOutcome, AtipError> {
        let output = self
            .run(path, INTROSPECTION_FLAG, self.config.scan_timeout, cancel)
            .await?;

        if !output.stderr.bytes.is_empty() {
            tracing::trace!(
                path = %path.display(),
                stderr = %String::from_utf8_lossy(&output.stderr.bytes),
                "introspection stderr"
            );
        }
        if output.stdout.truncated {
            return Err(AtipError::Protocol {
                path: path.to_path_buf(),
                message: format!(
                    "manifest output exceeds {} bytes",
                    self.config.max_output_bytes
                ),
            });
        }
        interpret_manifest_output(path, output.status.success(), &output.stdout.bytes)
    }

    async fn run(
        &self,
        path: &Path,
        flag: &str,
        limit: Duration,
        cancel: &CancellationToken,
    ) -> Result<RunOutput, AtipError> {
        let deadline = Instant::now() + limit;
        let mut child = spawn_probe(path, flag).await.map_err(|e| AtipError::Probe {
            path: path.to_path_buf(),
            message: format!("failed to execute: {e}"),
        })?;
        let pid = child.id();

        let cap = self.config.max_output_bytes;
        let stdout_task = tokio::spawn(read_capped(child.stdout.take(), cap));
        let stderr_task = tokio::spawn(read_capped(child.stderr.take(), cap));

        let status = tokio::select! {
            waited = tokio::time::timeout_at(deadline, child.wait()) => match waited {
                Ok(Ok(status)) => status,
                Ok(Err(e)) => {
                    terminate(&mut child, pid).await;
                    return Err(AtipError::Probe {
                        path: path.to_path_buf(),
                        message: format!("failed to wait for process: {e}"),
                    });
                }
                Err(_) => {
                    terminate(&mut child, pid).await;
                    stdout_task.abort();
                    stderr_task.abort();
                    tracing::warn!(
                        path = %path.display(),
                        flag,
                        timeout_ms = limit.as_millis() as u64,
                        "probe timed out"
                    );
                    return Err(AtipError::Timeout {
                        path: path.to_path_buf(),
                        duration: limit,
                    });
                }
            },
            _ = cancel.cancelled() => {
                terminate(&mut child, pid).await;
                stdout_task.abort();
                stderr_task.abort();
                return Err(AtipError::Cancelled);
            }
        };

        // A forked grandchild may keep the pipes open after the leader exits.
        let stdout = join_reader(stdout_task, deadline, pid).await;
        let stderr = join_reader(stderr_task, deadline, pid).await;

        Ok(RunOutput {
            status,
            stdout,
            stderr,
        })
    }
}

#[async_trait]
impl Prober for ProcessProber {
    async fn probe(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<ProbeOutcome, AtipError> {
        if !self.supports_introspection(path, cancel).await? {
            tracing::debug!(path = %path.display(), "does not advertise --agent");
            return Ok(ProbeOutcome::NotSupported);
        }
        self.fetch_manifest(path, cancel).await
    }
}

/// True when usage text mentions `--agent` as a standalone flag.
pub fn advertises_introspection(stdout: &[u8], stderr: &[u8]) -> bool {
    let Some(token) = INTROSPECTION_TOKEN.as_ref() else {
        return false;
    };
    token.is_match(&String::from_utf8_lossy(stdout))
        || token.is_match(&String::from_utf8_lossy(stderr))
}

/// Maps phase-2 output to an outcome.
///
/// Non-zero exit or blank stdout means the tool does not take part. Text that
/// does not parse as JSON is only a violation when it looks like an attempt
/// at a JSON object. Parsed documents must pass manifest validation.
pub fn interpret_manifest_output(
    path: &Path,
    success: bool,
    stdout: &[u8],
) -> Result<ProbeOutcome, AtipError> {
    if !success {
        return Ok(ProbeOutcome::NotSupported);
    }

    let text = String::from_utf8_lossy(stdout);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(ProbeOutcome::NotSupported);
    }

    let raw: Value = match serde_json::from_str(trimmed) {
        Ok(raw) => raw,
        Err(e) if trimmed.starts_with('{') => {
            return Err(AtipError::Protocol {
                path: path.to_path_buf(),
                message: format!("invalid JSON: {e}"),
            });
        }
        Err(_) => return Ok(ProbeOutcome::NotSupported),
    };

    match parse_manifest(raw.clone()) {
        Ok(manifest) => Ok(ProbeOutcome::Discovered(Box::new(DiscoveredTool {
            manifest,
            raw,
        }))),
        Err(errors) => Err(AtipError::Validation {
            path: path.to_path_buf(),
            errors,
        }),
    }
}

#[derive(Debug)]
struct RunOutput {
    status: ExitStatus,
    stdout: Captured,
    stderr: Captured,
}

#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

/// Reads to EOF, keeping at most `cap` bytes. Excess is drained and dropped
/// so the child never blocks on a full pipe.
async fn read_capped<R: AsyncRead + Unpin>(reader: Option<R>, cap: usize) -> Captured {
    let mut captured = Captured::default();
    let Some(mut reader) = reader else {
        return captured;
    };
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = cap.saturating_sub(captured.bytes.len());
                if n > room {
                    captured.truncated = true;
                }
                captured.bytes.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
    captured
}

async fn join_reader(
    mut task: JoinHandle<Captured>,
    deadline: Instant,
    pid: Option<u32>,
) -> Captured {
    if let Ok(joined) = tokio::time::timeout_at(deadline, &mut task).await {
        return joined.unwrap_or_default();
    }
    kill_group(pid);
    match tokio::time::timeout(DRAIN_GRACE, &mut task).await {
        Ok(joined) => joined.unwrap_or_default(),
        Err(_) => {
            task.abort();
            Captured::default()
        }
    }
}

async fn spawn_probe(path: &Path, flag: &str) -> std::io::Result<Child> {
    let mut attempt = 0;
    loop {
        match probe_command(path, flag).spawn() {
            // Freshly written executables can briefly report "text file busy".
            Err(e) if is_text_busy(&e) && attempt < SPAWN_RETRIES => {
                attempt += 1;
                tokio::time::sleep(SPAWN_RETRY_DELAY).await;
            }
            result => return result,
        }
    }
}

fn probe_command(path: &Path, flag: &str) -> Command {
    let mut cmd = Command::new(path);
    cmd.arg(flag)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .current_dir(std::env::temp_dir())
        .kill_on_drop(true)
        .env_clear();
    for key in INHERITED_ENV {
        if let Some(value) = std::env::var_os(key) {
            cmd.env(key, value);
        }
    }
    cmd.env("ATIP_PROBE", "1");

    #[cfg(unix)]
    cmd.process_group(0);

    cmd
}

#[cfg(unix)]
fn is_text_busy(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(libc::ETXTBSY)
}

#[cfg(not(unix))]
fn is_text_busy(_e: &std::io::Error) -> bool {
    false
}

async fn terminate(child: &mut Child, pid: Option<u32>) {
    kill_group(pid);
    let _ = child.start_kill();
    let _ = child.wait().await;
}

#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    if let Some(pid) = pid.and_then(|p| libc::pid_t::try_from(p).ok()) {
        // SAFETY: the child was spawned with process_group(0), so its pid is
        // also the id of a group that only contains the probe and its forks.
        unsafe {
            libc::kill(-pid, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO: &str = r#"{"atip":{"version":"0.4"},"name":"demo","version":"1.0.0","description":"x","commands":{}}"#;

    #[test]
    fn detects_standalone_flag() {
        assert!(advertises_introspection(b"Usage: demo [--agent]\n", b""));
        assert!(advertises_introspection(b"", b"  --AGENT  print ATIP metadata"));
        assert!(advertises_introspection(b"--agent", b""));
        assert!(advertises_introspection(b"flags: --help,--agent", b""));
    }

    #[test]
    fn ignores_lookalike_flags() {
        assert!(!advertises_introspection(b"--agent-mode enables things", b""));
        assert!(!advertises_introspection(b"--agents list agents", b""));
        assert!(!advertises_introspection(b"--user-agent STRING", b""));
        assert!(!advertises_introspection(b"Usage: tool [--help]", b""));
    }

    #[test]
    fn help_timeout_is_clamped() {
        let config = ProbeConfig::new(Duration::from_millis(10), Duration::from_secs(5), 10);
        assert_eq!(config.help_timeout, MIN_HELP_TIMEOUT);
        let config = ProbeConfig::new(Duration::from_secs(3), Duration::from_secs(5), 10);
        assert_eq!(config.help_timeout, Duration::from_secs(3));
    }

    #[test]
    fn nonzero_exit_is_not_supported() {
        let out = interpret_manifest_output(Path::new("/t"), false, DEMO.as_bytes()).unwrap();
        assert_eq!(out, ProbeOutcome::NotSupported);
    }

    #[test]
    fn blank_output_is_not_supported() {
        let out = interpret_manifest_output(Path::new("/t"), true, b"  \n").unwrap();
        assert_eq!(out, ProbeOutcome::NotSupported);
    }

    #[test]
    fn plain_text_is_not_supported() {
        let out =
            interpret_manifest_output(Path::new("/t"), true, b"unknown option --agent").unwrap();
        assert_eq!(out, ProbeOutcome::NotSupported);
    }

    #[test]
    fn broken_object_is_protocol_error() {
        let err = interpret_manifest_output(Path::new("/t"), true, b"  {bad").unwrap_err();
        match err {
            AtipError::Protocol { message, .. } => assert!(message.starts_with("invalid JSON")),
            other => panic!("expected Protocol, got {other:?}"),
        }
    }

    #[test]
    fn schema_failure_is_validation_error() {
        let doc = br#"{"atip":{"version":"0.4"},"name":"demo","version":"1.0.0","description":"x",
            "commands":{"deploy":{"commands":{"rollback":{}}, "description":"d"}}}"#;
        let err = interpret_manifest_output(Path::new("/t"), true, doc).unwrap_err();
        match err {
            AtipError::Validation { errors, .. } => {
                assert_eq!(errors[0].path, "commands.deploy.commands.rollback.description");
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn valid_manifest_is_discovered() {
        match interpret_manifest_output(Path::new("/t"), true, DEMO.as_bytes()).unwrap() {
            ProbeOutcome::Discovered(tool) => {
                assert_eq!(tool.manifest.name, "demo");
                assert_eq!(tool.raw["version"], "1.0.0");
            }
            other => panic!("expected Discovered, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn read_capped_marks_truncation() {
        let data: &[u8] = b"0123456789";
        let captured = read_capped(Some(data), 4).await;
        assert_eq!(captured.bytes, b"0123");
        assert!(captured.truncated);

        let captured = read_capped(Some(data), 10).await;
        assert_eq!(captured.bytes, b"0123456789");
        assert!(!captured.truncated);
    }
}
