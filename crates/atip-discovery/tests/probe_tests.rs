// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Probing real executables (shell scripts).

#![cfg(unix)]

use std::time::{Duration, Instant};

use atip_core::AtipError;
use atip_discovery::{ProbeConfig, ProbeOutcome, Prober, ProcessProber};
use atip_test_utils::{MockTool, demo_manifest, read_calls};
use serde_json::json;
use serial_test::serial;
use tokio_util::sync::CancellationToken;

fn prober_with_timeout(ms: u64) -> ProcessProber {
    ProcessProber::new(ProbeConfig::new(
        Duration::from_secs(1),
        Duration::from_millis(ms),
        1024 * 1024,
    ))
}

#[tokio::test]
async fn conforming_tool_is_discovered() {
    let dir = tempfile::tempdir().unwrap();
    let path = MockTool::new("demo").install(dir.path()).unwrap();

    let outcome = ProcessProber::default()
        .probe(&path, &CancellationToken::new())
        .await
        .unwrap();
    match outcome {
        ProbeOutcome::Discovered(tool) => {
            assert_eq!(tool.manifest.name, "demo");
            assert_eq!(tool.manifest.version, "1.0.0");
        }
        other => panic!("expected Discovered, got {other:?}"),
    }
}

#[tokio::test]
async fn tool_without_flag_never_sees_introspection_flag() {
    let dir = tempfile::tempdir().unwrap();
    let tool = MockTool::plain("legacy").log_calls();
    let path = tool.install(dir.path()).unwrap();

    let outcome = ProcessProber::default()
        .probe(&path, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, ProbeOutcome::NotSupported);

    let calls = read_calls(&tool.calls_path(dir.path()));
    assert_eq!(calls, vec!["--help"]);
}

#[tokio::test]
async fn help_timeout_means_not_supported() {
    let dir = tempfile::tempdir().unwrap();
    let tool = MockTool::new("sluggish").help_sleep(10).log_calls();
    let path = tool.install(dir.path()).unwrap();

    let started = Instant::now();
    let outcome = ProcessProber::default()
        .probe(&path, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, ProbeOutcome::NotSupported);
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(!read_calls(&tool.calls_path(dir.path())).contains(&"--agent".to_string()));
}

#[tokio::test]
async fn nonzero_exit_is_not_supported() {
    let dir = tempfile::tempdir().unwrap();
    let path = MockTool::new("refuses").agent_exit(2).install(dir.path()).unwrap();

    let outcome = ProcessProber::default()
        .probe(&path, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, ProbeOutcome::NotSupported);
}

#[tokio::test]
async fn malformed_json_is_protocol_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = MockTool::new("bad").agent_output("{bad").install(dir.path()).unwrap();

    let err = ProcessProber::default()
        .probe(&path, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AtipError::Protocol { .. }), "got {err:?}");
    assert!(err.to_string().contains("invalid JSON"));
}

#[tokio::test]
async fn schema_violation_is_validation_error() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = json!({
        "atip": {"version": "0.4"},
        "name": "deployer",
        "version": "1.0.0",
        "description": "ships things",
        "commands": {"deploy": {"description": "deploy", "commands": {"rollback": {}}}}
    });
    let path = MockTool::new("deployer")
        .manifest(&manifest)
        .install(dir.path())
        .unwrap();

    let err = ProcessProber::default()
        .probe(&path, &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        AtipError::Validation { errors, .. } => {
            assert_eq!(errors[0].path, "commands.deploy.commands.rollback.description");
        }
        other => panic!("expected Validation, got {other:?}"),
    }
}

#[tokio::test]
async fn oversize_output_is_protocol_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut manifest = demo_manifest("big", "1.0.0");
    manifest["description"] = json!("x".repeat(4096));
    let path = MockTool::new("big").manifest(&manifest).install(dir.path()).unwrap();

    let prober = ProcessProber::new(ProbeConfig::new(
        Duration::from_secs(1),
        Duration::from_secs(2),
        1024,
    ));
    let err = prober
        .probe(&path, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("exceeds 1024 bytes"), "got {err}");
}

#[tokio::test]
#[serial]
async fn timeout_kills_the_process() {
    let dir = tempfile::tempdir().unwrap();
    let tool = MockTool::new("hang").agent_sleep(10).record_pid();
    let path = tool.install(dir.path()).unwrap();

    let started = Instant::now();
    let err = prober_with_timeout(300)
        .probe(&path, &CancellationToken::new())
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, AtipError::Timeout { .. }), "got {err:?}");
    assert!(elapsed < Duration::from_secs(3), "took {elapsed:?}");

    let pid: libc::pid_t = std::fs::read_to_string(tool.pid_path(dir.path()))
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    // SAFETY: signal 0 only checks whether the pid exists.
    let alive = unsafe { libc::kill(pid, 0) } == 0;
    assert!(!alive, "probe process {pid} still running");
}

#[tokio::test]
#[serial]
async fn cancellation_stops_in_flight_probe() {
    let dir = tempfile::tempdir().unwrap();
    let path = MockTool::new("forever")
        .agent_sleep(10)
        .install(dir.path())
        .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = prober_with_timeout(10_000)
        .probe(&path, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, AtipError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn missing_executable_is_not_supported() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = ProcessProber::default()
        .probe(&dir.path().join("ghost"), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, ProbeOutcome::NotSupported);
}

#[tokio::test]
async fn probe_runs_with_scrubbed_environment() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("env.txt");
    let help = "Usage: envdump [--agent]";
    let script = format!(
        "#!/bin/sh\nenv > '{}'\necho '{help}'\n",
        out.display()
    );
    let path = dir.path().join("envdump");
    std::fs::write(&path, script).unwrap();
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    let prober = ProcessProber::default();
    assert!(
        prober
            .supports_introspection(&path, &CancellationToken::new())
            .await
            .unwrap()
    );

    let env = std::fs::read_to_string(&out).unwrap();
    assert!(env.lines().any(|l| l == "ATIP_PROBE=1"));
    assert!(!env.lines().any(|l| l.starts_with("CARGO_")));
}
