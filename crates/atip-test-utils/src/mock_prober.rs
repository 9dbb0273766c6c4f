// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory [`Prober`] with canned outcomes keyed by file name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use atip_core::AtipError;
use atip_discovery::{DiscoveredTool, ProbeOutcome, Prober};
use atip_manifest::parse_manifest;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// What the mock answers for one executable.
#[derive(Debug, Clone)]
pub enum MockResponse {
    NotSupported,
    /// Validated like real output; invalid documents yield a validation error.
    Manifest(Value),
    Fail(String),
    /// Blocks until the scan is cancelled.
    Hang,
}

/// A prober that never spawns processes.
///
/// Unknown executables are reported as not supported.
#[derive(Default)]
pub struct MockProber {
    responses: Mutex<HashMap<String, MockResponse>>,
    calls: Mutex<Vec<PathBuf>>,
    delay: Duration,
}

impl MockProber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a fixed delay to every probe (cancellable).
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub async fn respond(&self, file_name: impl Into<String>, response: MockResponse) {
        self.responses.lock().await.insert(file_name.into(), response);
    }

    /// Every path probed so far, in call order.
    pub async fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl Prober for MockProber {
    async fn probe(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<ProbeOutcome, AtipError> {
        self.calls.lock().await.push(path.to_path_buf());

        if !self.delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = cancel.cancelled() => return Err(AtipError::Cancelled),
            }
        }

        let key = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let response = self
            .responses
            .lock()
            .await
            .get(&key)
            .cloned()
            .unwrap_or(MockResponse::NotSupported);

        match response {
            MockResponse::NotSupported => Ok(ProbeOutcome::NotSupported),
            MockResponse::Manifest(raw) => match parse_manifest(raw.clone()) {
                Ok(manifest) => Ok(ProbeOutcome::Discovered(Box::new(DiscoveredTool {
                    manifest,
                    raw,
                }))),
                Err(errors) => Err(AtipError::Validation {
                    path: path.to_path_buf(),
                    errors,
                }),
            },
            MockResponse::Fail(message) => Err(AtipError::Probe {
                path: path.to_path_buf(),
                message,
            }),
            MockResponse::Hang => {
                cancel.cancelled().await;
                Err(AtipError::Cancelled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo_manifest;

    #[tokio::test]
    async fn canned_responses_and_call_log() {
        let prober = MockProber::new();
        prober
            .respond("demo", MockResponse::Manifest(demo_manifest("demo", "2.0.0")))
            .await;
        prober
            .respond("broken", MockResponse::Fail("boom".to_string()))
            .await;
        let cancel = CancellationToken::new();

        match prober.probe(Path::new("/bin/demo"), &cancel).await.unwrap() {
            ProbeOutcome::Discovered(tool) => assert_eq!(tool.manifest.version, "2.0.0"),
            other => panic!("expected Discovered, got {other:?}"),
        }
        assert!(prober.probe(Path::new("/bin/broken"), &cancel).await.is_err());
        assert_eq!(
            prober.probe(Path::new("/bin/other"), &cancel).await.unwrap(),
            ProbeOutcome::NotSupported
        );
        assert_eq!(prober.call_count().await, 3);
    }

    #[tokio::test]
    async fn hang_returns_on_cancel() {
        let prober = MockProber::new();
        prober.respond("stuck", MockResponse::Hang).await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = prober
            .probe(Path::new("/bin/stuck"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AtipError::Cancelled));
    }
}
