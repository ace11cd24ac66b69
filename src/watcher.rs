//! Debounced filesystem watcher. The debouncer callback only ever pushes
//! batches onto a channel; a single consumer task owns the debounce timer's
//! downstream effects and applies each batch under the Indexer's write lock,
//! so the "at most one mutator" invariant holds without blocking the
//! notify callback thread.

use crate::config::{
    has_excluded_segment, is_includable_name, WATCHER_DEBOUNCE_CAP_MS, WATCHER_DEBOUNCE_MS,
    WATCHER_RESTART_BACKOFF_SECS,
};
use crate::indexer::Indexer;
use crate::metrics::{Metrics, WatcherCounters};
use notify::{EventKind, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, DebouncedEvent, Debouncer, FileIdMap};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mutation {
    Upsert,
    Remove,
}

pub struct WatcherStatus {
    pub watching: bool,
    pub changed: u64,
    pub created: u64,
    pub deleted: u64,
    pub errors: u64,
}

pub struct WatcherManager {
    watching: Arc<AtomicBool>,
    counters: Arc<WatcherCounters>,
    enabled_tx: watch::Sender<bool>,
}

impl WatcherManager {
    pub fn new(root: PathBuf, indexer: Arc<Indexer>, metrics: Arc<Metrics>) -> Self {
        let (enabled_tx, enabled_rx) = watch::channel(false);
        let counters = Arc::new(WatcherCounters::default());
        let watching = Arc::new(AtomicBool::new(false));

        tokio::spawn(supervisor(
            root,
            indexer,
            counters.clone(),
            metrics,
            enabled_rx,
        ));

        Self {
            watching,
            counters,
            enabled_tx,
        }
    }

    pub fn enable(&self) {
        self.watching.store(true, Ordering::SeqCst);
        let _ = self.enabled_tx.send(true);
    }

    pub fn disable(&self) {
        self.watching.store(false, Ordering::SeqCst);
        let _ = self.enabled_tx.send(false);
    }

    pub fn is_watching(&self) -> bool {
        self.watching.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> WatcherStatus {
        let (changed, created, deleted, errors) = self.counters.snapshot();
        WatcherStatus {
            watching: self.is_watching(),
            changed,
            created,
            deleted,
            errors,
        }
    }
}

async fn supervisor(
    root: PathBuf,
    indexer: Arc<Indexer>,
    counters: Arc<WatcherCounters>,
    metrics: Arc<Metrics>,
    mut enabled_rx: watch::Receiver<bool>,
) {
    loop {
        if !*enabled_rx.borrow() {
            if enabled_rx.changed().await.is_err() {
                return;
            }
            continue;
        }

        let (batch_tx, mut batch_rx) = mpsc::unbounded_channel::<DebounceEventResult>();
        let debouncer = match start_debouncer(&root, batch_tx) {
            Ok(d) => d,
            Err(e) => {
                counters.errors.fetch_add(1, Ordering::Relaxed);
                metrics.record_error();
                warn!(error = %e, "failed to start watcher, retrying after backoff");
                tokio::time::sleep(Duration::from_secs(WATCHER_RESTART_BACKOFF_SECS)).await;
                continue;
            }
        };
        info!(root = %root.display(), "watcher started");

        loop {
            tokio::select! {
                changed = enabled_rx.changed() => {
                    if changed.is_err() {
                        drop(debouncer);
                        return;
                    }
                    if !*enabled_rx.borrow() {
                        drop(debouncer);
                        info!("watcher disabled");
                        break;
                    }
                }
                maybe_result = batch_rx.recv() => {
                    match maybe_result {
                        Some(Ok(events)) => {
                            apply_batch(&root, &indexer, &counters, &metrics, events).await;
                        }
                        Some(Err(errors)) => {
                            for e in &errors {
                                warn!(error = %e, "watcher reported error, restarting");
                            }
                            counters.errors.fetch_add(1, Ordering::Relaxed);
                            metrics.record_error();
                            drop(debouncer);
                            tokio::time::sleep(Duration::from_secs(WATCHER_RESTART_BACKOFF_SECS)).await;
                            break;
                        }
                        None => {
                            counters.errors.fetch_add(1, Ordering::Relaxed);
                            metrics.record_error();
                            warn!("watcher channel closed unexpectedly, restarting");
                            tokio::time::sleep(Duration::from_secs(WATCHER_RESTART_BACKOFF_SECS)).await;
                            break;
                        }
                    }
                }
            }
        }
    }
}

fn start_debouncer(
    root: &Path,
    tx: mpsc::UnboundedSender<DebounceEventResult>,
) -> notify::Result<Debouncer<notify::RecommendedWatcher, FileIdMap>> {
    let mut debouncer = new_debouncer(
        Duration::from_millis(WATCHER_DEBOUNCE_MS),
        Some(Duration::from_millis(WATCHER_DEBOUNCE_CAP_MS)),
        move |result: DebounceEventResult| {
            let _ = tx.send(result);
        },
    )?;
    debouncer.watch(root, RecursiveMode::Recursive)?;
    Ok(debouncer)
}

fn classify(event: &DebouncedEvent) -> Option<Mutation> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) => Some(Mutation::Upsert),
        EventKind::Remove(_) => Some(Mutation::Remove),
        _ => None,
    }
}

async fn apply_batch(
    root: &Path,
    indexer: &Arc<Indexer>,
    counters: &Arc<WatcherCounters>,
    metrics: &Arc<Metrics>,
    events: Vec<DebouncedEvent>,
) {
    // Per-path last-event-wins; delete overrides create/modify regardless of order.
    let mut final_kind: HashMap<PathBuf, Mutation> = HashMap::new();
    for event in &events {
        let Some(kind) = classify(event) else { continue };
        for path in &event.paths {
            let relative = match path.strip_prefix(root) {
                Ok(r) => r,
                Err(_) => continue,
            };
            if has_excluded_segment(relative) {
                continue;
            }
            if kind == Mutation::Upsert {
                let name = path.file_name().map(|n| n.to_string_lossy().to_string());
                if !name.map(|n| is_includable_name(&n)).unwrap_or(false) {
                    continue;
                }
            }
            match final_kind.get(path) {
                Some(Mutation::Remove) => {}
                _ => {
                    final_kind.insert(path.clone(), kind);
                }
            }
        }
    }

    if final_kind.is_empty() {
        return;
    }

    for (path, kind) in &final_kind {
        let relative = match path.strip_prefix(root) {
            Ok(r) => r.to_string_lossy().replace('\\', "/"),
            Err(_) => continue,
        };
        match kind {
            Mutation::Upsert => {
                let existed = indexer.get_file(&relative).is_ok();
                if let Err(e) = indexer.upsert(&relative).await {
                    warn!(path = %relative, error = %e, "watcher upsert failed");
                    counters.errors.fetch_add(1, Ordering::Relaxed);
                    metrics.record_error();
                    continue;
                }
                if existed {
                    counters.changed.fetch_add(1, Ordering::Relaxed);
                } else {
                    counters.created.fetch_add(1, Ordering::Relaxed);
                }
            }
            Mutation::Remove => {
                if let Err(e) = indexer.remove(&relative).await {
                    warn!(path = %relative, error = %e, "watcher remove failed");
                    counters.errors.fetch_add(1, Ordering::Relaxed);
                    metrics.record_error();
                    continue;
                }
                counters.deleted.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    if let Err(e) = indexer.save().await {
        warn!(error = %e, "snapshot save after watcher batch failed");
        counters.errors.fetch_add(1, Ordering::Relaxed);
        metrics.record_error();
    } else {
        metrics.record_index_completed(indexer.indexed_at().to_rfc3339());
    }
}
