// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shell-script executables that behave like ATIP tools (or not).
//!
//! Scripts answer `--help` and `--agent` with configurable text, exit code,
//! and delay. Every invocation's first argument can be appended to a log so
//! tests can assert which phases ran.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};

/// Builder for a mock executable.
#[derive(Debug, Clone)]
pub struct MockTool {
    name: String,
    help_text: String,
    agent_output: String,
    agent_exit: i32,
    agent_sleep_secs: Option<u32>,
    help_sleep_secs: Option<u32>,
    log_calls: bool,
    record_pid: bool,
}

impl MockTool {
    /// A tool that advertises `--agent` and prints [`demo_manifest`].
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let manifest = demo_manifest(&name, "1.0.0");
        Self {
            help_text: format!("Usage: {name} [--help] [--agent]\n  --agent  print ATIP metadata\n"),
            agent_output: manifest.to_string(),
            name,
            agent_exit: 0,
            agent_sleep_secs: None,
            help_sleep_secs: None,
            log_calls: false,
            record_pid: false,
        }
    }

    /// A tool whose usage text never mentions `--agent`.
    pub fn plain(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(name.clone()).help(format!("Usage: {name} [--help] [--verbose]\n"))
    }

    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help_text = text.into();
        self
    }

    pub fn agent_output(mut self, text: impl Into<String>) -> Self {
        self.agent_output = text.into();
        self
    }

    pub fn manifest(self, manifest: &Value) -> Self {
        self.agent_output(manifest.to_string())
    }

    pub fn agent_exit(mut self, code: i32) -> Self {
        self.agent_exit = code;
        self
    }

    /// Makes `--agent` exec `sleep` for this long instead of answering.
    pub fn agent_sleep(mut self, secs: u32) -> Self {
        self.agent_sleep_secs = Some(secs);
        self
    }

    /// Makes `--help` exec `sleep` for this long instead of answering.
    pub fn help_sleep(mut self, secs: u32) -> Self {
        self.help_sleep_secs = Some(secs);
        self
    }

    /// Appends each invocation's first argument to `<name>.calls`.
    pub fn log_calls(mut self) -> Self {
        self.log_calls = true;
        self
    }

    /// Writes the pid of the `--agent` process to `<name>.pid`.
    pub fn record_pid(mut self) -> Self {
        self.record_pid = true;
        self
    }

    /// Writes the script into `dir` with mode 0755 and returns its path.
    pub fn install(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let path = dir.join(&self.name);
        std::fs::write(&path, self.script(dir))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
        }
        Ok(path)
    }

    /// Log file written by [`MockTool::log_calls`].
    pub fn calls_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.calls", self.name))
    }

    /// Pid file written by [`MockTool::record_pid`].
    pub fn pid_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.pid", self.name))
    }

    fn script(&self, dir: &Path) -> String {
        let mut s = String::from("#!/bin/sh\n");
        if self.log_calls {
            let _ = writeln!(s, "echo \"$1\" >> '{}'", self.calls_path(dir).display());
        }
        s.push_str("case \"$1\" in\n--help)\n");
        if let Some(secs) = self.help_sleep_secs {
            let _ = writeln!(s, "  exec sleep {secs}");
        }
        let _ = writeln!(
            s,
            "  cat <<'__MOCK_HELP__'\n{}\n__MOCK_HELP__\n  exit 0\n  ;;",
            self.help_text
        );
        s.push_str("--agent)\n");
        if self.record_pid {
            let _ = writeln!(s, "  echo $$ > '{}'", self.pid_path(dir).display());
        }
        if let Some(secs) = self.agent_sleep_secs {
            let _ = writeln!(s, "  exec sleep {secs}");
        }
        let _ = writeln!(
            s,
            "  cat <<'__MOCK_AGENT__'\n{}\n__MOCK_AGENT__\n  exit {}\n  ;;",
            self.agent_output, self.agent_exit
        );
        s.push_str("esac\nexit 1\n");
        s
    }
}

/// Reads the invocation log; a missing log means no calls.
pub fn read_calls(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Smallest manifest that passes validation.
pub fn demo_manifest(name: &str, version: &str) -> Value {
    json!({
        "atip": {"version": "0.4"},
        "name": name,
        "version": version,
        "description": "x",
        "commands": {}
    })
}
