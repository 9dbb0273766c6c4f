// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scan orchestration.
//!
//! A scan resolves directories, enumerates candidates, drops skip-listed and
//! unchanged ones, then probes the rest on a fixed pool of workers. Workers
//! pull from a shared task queue and push outcomes into a results channel.
//! The scanner itself is the only consumer of that channel, so every registry
//! and cache mutation happens on one task. The registry is saved once at the
//! end, including when the scan was cancelled.
//!
//! When several candidates report the same tool name, the one enumerated
//! first wins (earlier directory, then file name), regardless of which probe
//! finished first.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use atip_core::{AtipError, DataPaths, RegistryEntry, ScanResult, ToolSource};
use atip_registry::{ManifestCache, RegistryStore, Upsert, file_mod_time};
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::enumerate::enumerate_executables;
use crate::probe::{DiscoveredTool, ProbeOutcome, Prober};
use crate::safety::{SkipList, is_safe_path};
use crate::shim::load_shims;

/// Default number of concurrent probes.
pub const DEFAULT_PARALLELISM: usize = 4;

/// What to scan and how.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Allow-listed directories, each checked with [`is_safe_path`].
    pub safe_paths: Vec<PathBuf>,
    /// Caller-supplied directories. When non-empty these replace
    /// `safe_paths` and skip the safety check.
    pub explicit_paths: Vec<PathBuf>,
    pub skip_list: SkipList,
    pub parallelism: usize,
    /// Skip executables whose registry entry has the same mod time.
    pub incremental: bool,
    /// Load manifests from the shims directory before probing.
    pub include_shims: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            safe_paths: Vec::new(),
            explicit_paths: Vec::new(),
            skip_list: SkipList::default(),
            parallelism: DEFAULT_PARALLELISM,
            incremental: true,
            include_shims: true,
        }
    }
}

#[derive(Debug)]
struct ProbeTask {
    path: PathBuf,
    mod_time: Option<DateTime<Utc>>,
    /// Enumeration order. Lower ranks win name collisions.
    rank: usize,
}

/// Ranks of every enumerated, non-skip-listed candidate, probed or not.
type Ranks = HashMap<PathBuf, usize>;

/// The best-ranked discovery per tool name in this pass.
#[derive(Default)]
struct Discoveries {
    by_name: HashMap<String, (ProbeTask, Box<DiscoveredTool>)>,
}

impl Discoveries {
    fn offer(&mut self, task: ProbeTask, tool: Box<DiscoveredTool>, result: &mut ScanResult) {
        let name = tool.manifest.name.clone();
        let held = self.by_name.get(&name).map(|(held, _)| held.rank);
        if held.is_some() {
            // One of the two candidates is shadowed either way.
            result.skipped += 1;
        }
        match held {
            Some(rank) if rank < task.rank => {
                debug!(tool = %name, path = %task.path.display(), "shadowed by earlier candidate");
            }
            _ => {
                self.by_name.insert(name, (task, tool));
            }
        }
    }
}

struct ProbeReport {
    task: ProbeTask,
    outcome: Result<ProbeOutcome, AtipError>,
}

/// Drives discovery against a registry on disk.
pub struct Scanner {
    prober: Arc<dyn Prober>,
    paths: DataPaths,
}

impl Scanner {
    pub fn new(prober: Arc<dyn Prober>, paths: DataPaths) -> Self {
        Self { prober, paths }
    }

    pub fn data_paths(&self) -> &DataPaths {
        &self.paths
    }

    /// Runs a scan to completion.
    pub async fn scan(&self, options: &ScanOptions) -> Result<ScanResult, AtipError> {
        self.scan_with_cancel(options, CancellationToken::new())
            .await
    }

    /// Runs a scan that stops dispatching probes once `cancel` fires.
    ///
    /// In-flight probes are killed; results gathered so far are saved and
    /// the returned [`ScanResult`] has `cancelled` set. Only registry load or
    /// save failures are returned as errors. When the save fails, manifests
    /// cached for tools this pass would have added are deleted again.
    pub async fn scan_with_cancel(
        &self,
        options: &ScanOptions,
        cancel: CancellationToken,
    ) -> Result<ScanResult, AtipError> {
        let started = Instant::now();
        let mut store = RegistryStore::load(&self.paths.registry_file)?;
        let cache = ManifestCache::new(&self.paths.tools_dir);
        let mut result = ScanResult::default();

        // Names this pass added to the registry, for cache rollback.
        let mut added = Vec::new();
        if options.include_shims {
            self.apply_shims(
                &mut store,
                &cache,
                options.incremental,
                &mut result,
                &mut added,
            );
        }

        let (tasks, ranks) = collect_tasks(options, &store, &mut result);
        debug!(candidates = tasks.len(), skipped = result.skipped, "probing candidates");

        let workers = options.parallelism.max(1);
        let (task_tx, task_rx) = mpsc::channel::<ProbeTask>(workers * 2);
        let (report_tx, mut report_rx) = mpsc::channel::<ProbeReport>(workers * 2);
        let task_rx = Arc::new(Mutex::new(task_rx));

        let dispatcher = spawn_dispatcher(tasks, task_tx, cancel.clone());
        let handles: Vec<JoinHandle<()>> = (0..workers)
            .map(|id| {
                spawn_worker(
                    id,
                    Arc::clone(&self.prober),
                    Arc::clone(&task_rx),
                    report_tx.clone(),
                    cancel.clone(),
                )
            })
            .collect();
        drop(report_tx);

        let mut discoveries = Discoveries::default();
        while let Some(report) = report_rx.recv().await {
            apply_report(report, &mut discoveries, &mut result);
        }

        if let Err(e) = dispatcher.await {
            warn!(error = %e, "dispatcher task failed");
        }
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "probe worker failed");
            }
        }

        commit_discoveries(discoveries, &ranks, &mut store, &cache, &mut result, &mut added);

        result.cancelled = cancel.is_cancelled();
        store.set_last_scan(Utc::now());
        if let Err(e) = store.save() {
            // Updated tools keep their refreshed cache file; new ones would be orphans.
            for name in &added {
                if let Err(err) = cache.remove(name) {
                    warn!(tool = %name, error = %err, "failed to roll back cached manifest");
                }
            }
            return Err(e);
        }
        result.duration = started.elapsed();

        info!(
            discovered = result.discovered,
            updated = result.updated,
            failed = result.failed,
            skipped = result.skipped,
            cancelled = result.cancelled,
            duration_ms = result.duration.as_millis() as u64,
            "scan complete"
        );
        Ok(result)
    }

    /// Upserts shim manifests. A native entry with the same name wins.
    fn apply_shims(
        &self,
        store: &mut RegistryStore,
        cache: &ManifestCache,
        incremental: bool,
        result: &mut ScanResult,
        added: &mut Vec<String>,
    ) {
        let (shims, errors) = load_shims(&self.paths.shims_dir);
        for error in errors {
            result.record_error(&error.path, error.message);
        }

        for shim in shims {
            let entry = shim.entry();
            if let Ok(existing) = store.get(&entry.name) {
                if existing.source == ToolSource::Native {
                    debug!(tool = %entry.name, "native entry shadows shim");
                    continue;
                }
                if incremental && existing.version == entry.version && existing.path == entry.path
                {
                    result.skipped += 1;
                    continue;
                }
            }
            if let Err(e) = cache.write(&entry.name, &shim.raw) {
                result.record_error(&shim.path, e.to_string());
                continue;
            }
            let name = entry.name.clone();
            if record_upsert(store, entry, result) == Upsert::Added {
                added.push(name);
            }
        }
    }
}

/// Resolves the directories a scan enumerates.
///
/// Explicit paths win outright and are made absolute. Otherwise each
/// allow-listed directory must pass the safety check; rejected ones are
/// dropped with a debug log.
pub fn resolve_directories(options: &ScanOptions) -> Vec<PathBuf> {
    if !options.explicit_paths.is_empty() {
        return options
            .explicit_paths
            .iter()
            .map(|p| std::path::absolute(p).unwrap_or_else(|_| p.clone()))
            .collect();
    }

    options
        .safe_paths
        .iter()
        .filter(|dir| match is_safe_path(dir) {
            Ok(()) => true,
            Err(reason) => {
                debug!(dir = %dir.display(), %reason, "skipping unsafe directory");
                false
            }
        })
        .cloned()
        .collect()
}

fn collect_tasks(
    options: &ScanOptions,
    store: &RegistryStore,
    result: &mut ScanResult,
) -> (Vec<ProbeTask>, Ranks) {
    let mut seen = HashSet::new();
    let mut tasks = Vec::new();
    let mut ranks = Ranks::new();

    for dir in resolve_directories(options) {
        for path in enumerate_executables(&dir) {
            if !seen.insert(path.clone()) {
                continue;
            }
            let name = file_name(&path);
            if options.skip_list.matches(&name) {
                debug!(path = %path.display(), "skip-listed");
                result.skipped += 1;
                continue;
            }

            let rank = ranks.len();
            ranks.insert(path.clone(), rank);

            let mod_time = file_mod_time(&path).ok();
            if options.incremental && mod_time.is_some_and(|m| store.is_unchanged(&path, m)) {
                debug!(path = %path.display(), "unchanged since last scan");
                result.skipped += 1;
                continue;
            }
            tasks.push(ProbeTask {
                path,
                mod_time,
                rank,
            });
        }
    }
    (tasks, ranks)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn spawn_dispatcher(
    tasks: Vec<ProbeTask>,
    queue: mpsc::Sender<ProbeTask>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        for task in tasks {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                sent = queue.send(task) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }
    })
}

fn spawn_worker(
    id: usize,
    prober: Arc<dyn Prober>,
    queue: Arc<Mutex<mpsc::Receiver<ProbeTask>>>,
    reports: mpsc::Sender<ProbeReport>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let next = queue.lock().await.recv().await;
            let Some(task) = next else {
                break;
            };
            if cancel.is_cancelled() {
                break;
            }
            debug!(worker = id, path = %task.path.display(), "probing");
            // A panicking prober fails its own candidate, not the worker.
            let probe = {
                let prober = Arc::clone(&prober);
                let path = task.path.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { prober.probe(&path, &cancel).await })
            };
            let outcome = match probe.await {
                Ok(outcome) => outcome,
                Err(e) => Err(AtipError::Internal(format!("probe task failed: {e}"))),
            };
            if reports.send(ProbeReport { task, outcome }).await.is_err() {
                break;
            }
        }
    })
}

fn apply_report(report: ProbeReport, discoveries: &mut Discoveries, result: &mut ScanResult) {
    let ProbeReport { task, outcome } = report;
    match outcome {
        Ok(ProbeOutcome::NotSupported) => {
            debug!(path = %task.path.display(), "not an ATIP tool");
        }
        Ok(ProbeOutcome::Discovered(tool)) => discoveries.offer(task, tool, result),
        Err(AtipError::Cancelled) => {}
        Err(e) => {
            warn!(path = %task.path.display(), error = %e, "probe failed");
            result.record_error(&task.path, e.to_string());
        }
    }
}

/// Caches and upserts each pass winner in rank order.
///
/// A registry entry backed by a better-ranked candidate of this pass (for
/// example one skipped as unchanged) is kept, so incremental scans settle.
fn commit_discoveries(
    discoveries: Discoveries,
    ranks: &Ranks,
    store: &mut RegistryStore,
    cache: &ManifestCache,
    result: &mut ScanResult,
    added: &mut Vec<String>,
) {
    let mut winners: Vec<_> = discoveries.by_name.into_values().collect();
    winners.sort_by_key(|(task, _)| task.rank);

    for (task, tool) in winners {
        let manifest = &tool.manifest;
        let outranked = store.get(&manifest.name).is_ok_and(|existing| {
            existing.source == ToolSource::Native
                && existing.path != task.path
                && ranks.get(&existing.path).is_some_and(|&rank| rank < task.rank)
        });
        if outranked {
            debug!(
                tool = %manifest.name,
                path = %task.path.display(),
                "shadowed by registered candidate"
            );
            result.skipped += 1;
            continue;
        }

        if let Err(e) = cache.write(&manifest.name, &tool.raw) {
            warn!(tool = %manifest.name, error = %e, "failed to cache manifest");
            result.record_error(&task.path, e.to_string());
            continue;
        }
        info!(
            tool = %manifest.name,
            version = %manifest.version,
            path = %task.path.display(),
            "discovered tool"
        );
        let entry = RegistryEntry::native(
            manifest.name.clone(),
            manifest.version.clone(),
            task.path,
            task.mod_time,
        );
        if record_upsert(store, entry, result) == Upsert::Added {
            added.push(manifest.name.clone());
        }
    }
}

fn record_upsert(
    store: &mut RegistryStore,
    entry: RegistryEntry,
    result: &mut ScanResult,
) -> Upsert {
    let name = entry.name.clone();
    let upsert = store.add(entry);
    match upsert {
        Upsert::Added => {
            result.discovered += 1;
            if let Ok(stored) = store.get(&name) {
                result.tools.push(stored.clone());
            }
        }
        Upsert::Updated => result.updated += 1,
    }
    upsert
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tracing_test::traced_test;

    use super::*;

    struct Unsupported;

    #[async_trait]
    impl Prober for Unsupported {
        async fn probe(
            &self,
            _path: &Path,
            _cancel: &CancellationToken,
        ) -> Result<ProbeOutcome, AtipError> {
            Ok(ProbeOutcome::NotSupported)
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn empty_scan_still_records_last_scan() {
        let bin = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let paths = DataPaths::from_data_dir(data.path());
        let scanner = Scanner::new(Arc::new(Unsupported), paths.clone());
        let options = ScanOptions {
            explicit_paths: vec![bin.path().to_path_buf()],
            ..Default::default()
        };

        let result = scanner.scan(&options).await.unwrap();
        assert_eq!(result.discovered + result.failed + result.skipped, 0);
        assert!(!result.is_partial());

        let store = RegistryStore::load(&paths.registry_file).unwrap();
        assert!(store.last_scan().is_some());
        assert!(logs_contain("scan complete"));
    }

    fn demo_discovery(rank: usize, dir: &str) -> (ProbeTask, Box<DiscoveredTool>) {
        let raw = serde_json::json!({
            "atip": {"version": "0.4"},
            "name": "demo",
            "version": "1.0.0",
            "description": "x"
        });
        let manifest = atip_manifest::parse_manifest(raw.clone()).unwrap();
        let task = ProbeTask {
            path: PathBuf::from(dir).join("demo"),
            mod_time: None,
            rank,
        };
        (task, Box::new(DiscoveredTool { manifest, raw }))
    }

    #[test]
    fn earliest_candidate_wins_name_collisions_in_any_arrival_order() {
        for arrival in [[0, 1], [1, 0]] {
            let mut discoveries = Discoveries::default();
            let mut result = ScanResult::default();
            for rank in arrival {
                let dir = if rank == 0 { "/first" } else { "/second" };
                let (task, tool) = demo_discovery(rank, dir);
                discoveries.offer(task, tool, &mut result);
            }
            assert_eq!(result.skipped, 1);
            let (winner, _) = &discoveries.by_name["demo"];
            assert_eq!(winner.path, PathBuf::from("/first/demo"), "arrival {arrival:?}");
        }
    }

    #[test]
    fn explicit_paths_replace_safe_paths() {
        let safe = tempfile::tempdir().unwrap();
        let explicit = tempfile::tempdir().unwrap();
        let options = ScanOptions {
            safe_paths: vec![safe.path().to_path_buf()],
            explicit_paths: vec![explicit.path().to_path_buf()],
            ..Default::default()
        };
        assert_eq!(resolve_directories(&options), vec![explicit.path().to_path_buf()]);
    }

    #[test]
    fn unsafe_safe_paths_are_dropped() {
        let ok = tempfile::tempdir().unwrap();
        let missing = ok.path().join("missing");
        let options = ScanOptions {
            safe_paths: vec![PathBuf::new(), missing, ok.path().to_path_buf()],
            ..Default::default()
        };
        assert_eq!(resolve_directories(&options), vec![ok.path().to_path_buf()]);
    }

    #[test]
    fn relative_explicit_paths_become_absolute() {
        let options = ScanOptions {
            explicit_paths: vec![PathBuf::from("bin")],
            ..Default::default()
        };
        let dirs = resolve_directories(&options);
        assert!(dirs[0].is_absolute());
        assert!(dirs[0].ends_with("bin"));
    }
}
