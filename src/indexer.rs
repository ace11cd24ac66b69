//! Builds, loads, saves, and serves the project's search index: the
//! persisted JSON snapshot plus the in-memory inverted index derived from it.

use crate::config::{has_excluded_segment, is_includable_name, Config, MAX_FILE_SIZE_BYTES};
use crate::error::{AppError, AppResult};
use crate::lang::detect_language;
use crate::walker;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, instrument};

pub const SNAPSHOT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub name: String,
    pub size: u64,
    pub modified: String,
    pub lines: usize,
    pub content: String,
    pub extension: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: String,
    pub indexed_at: String,
    pub project_root: String,
    pub file_count: usize,
    pub files: Vec<FileRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredHit {
    pub file: String,
    pub line: usize,
    pub content: String,
    pub language: String,
    pub context: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub path: String,
    pub language: String,
    pub lines: usize,
    pub size: u64,
}

/// In-memory state behind the reader lock: the file table (keyed by
/// project-relative path, ordered so snapshots and search ties are
/// deterministic) and the token postings derived from it.
struct IndexState {
    files: BTreeMap<String, FileRecord>,
    inverted: std::collections::HashMap<String, BTreeSet<String>>,
    indexed_at: DateTime<Utc>,
    loaded: bool,
}

impl IndexState {
    fn empty() -> Self {
        Self {
            files: BTreeMap::new(),
            inverted: std::collections::HashMap::new(),
            indexed_at: Utc::now(),
            loaded: false,
        }
    }

    fn rebuild_inverted(&mut self) {
        self.inverted.clear();
        for (path, record) in &self.files {
            for token in tokenize(&record.content.to_lowercase()) {
                self.inverted.entry(token).or_default().insert(path.clone());
            }
            for token in tokenize(&path.to_lowercase()) {
                self.inverted.entry(token).or_default().insert(path.clone());
            }
        }
    }
}

pub struct Indexer {
    root: PathBuf,
    snapshot_path: PathBuf,
    snapshot_tmp_path: PathBuf,
    state: RwLock<IndexState>,
    write_lock: AsyncMutex<()>,
    rebuilding: AtomicBool,
}

/// Maximal runs of `[A-Za-z0-9_]`.
fn tokenize(s: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in s.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            current.push(c);
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

impl Indexer {
    pub fn new(config: &Config) -> Self {
        Self {
            root: config.project_root.clone(),
            snapshot_path: config.snapshot_path(),
            snapshot_tmp_path: config.snapshot_tmp_path(),
            state: RwLock::new(IndexState::empty()),
            write_lock: AsyncMutex::new(()),
            rebuilding: AtomicBool::new(false),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.state.read().loaded
    }

    pub fn file_count(&self) -> usize {
        self.state.read().files.len()
    }

    pub fn indexed_at(&self) -> DateTime<Utc> {
        self.state.read().indexed_at
    }

    #[instrument(skip(self))]
    pub async fn load(&self) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        if !self.snapshot_path.exists() {
            return Err(AppError::NotFound("no snapshot on disk".to_string()));
        }
        let raw = tokio::fs::read_to_string(&self.snapshot_path)
            .await
            .map_err(AppError::Io)?;
        let snapshot: Snapshot = serde_json::from_str(&raw)
            .map_err(|e| AppError::ParseInvalid(format!("corrupt snapshot: {}", e)))?;

        let mut files = BTreeMap::new();
        for record in snapshot.files {
            files.insert(record.path.clone(), record);
        }
        let indexed_at = DateTime::parse_from_rfc3339(&snapshot.indexed_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let mut state = self.state.write();
        state.files = files;
        state.indexed_at = indexed_at;
        state.loaded = true;
        state.rebuild_inverted();
        info!(file_count = state.files.len(), "loaded snapshot from disk");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn build_full(&self) -> AppResult<usize> {
        if !self.try_begin_rebuild() {
            return Err(AppError::AlreadyRunning);
        }
        self.rebuild_and_save_inner(true).await
    }

    /// Attempts to acquire the rebuild CAS guard without blocking on the
    /// write lock. Returns `false` if a rebuild is already in progress —
    /// callers use this to decide between `202 indexing` and `200
    /// already_running` before doing any real work.
    pub fn try_begin_rebuild(&self) -> bool {
        self.rebuilding
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Runs the walk and persists it. Caller must have already won
    /// `try_begin_rebuild`; the guard is released on every exit path.
    pub async fn rebuild_and_save(&self) -> AppResult<usize> {
        self.rebuild_and_save_inner(true).await
    }

    async fn rebuild_and_save_inner(&self, also_save: bool) -> AppResult<usize> {
        let _guard = self.write_lock.lock().await;
        let result = self.build_full_inner().await;
        let result = if also_save {
            match result {
                Ok(count) => {
                    drop(_guard);
                    self.save().await.map(|()| count)
                }
                Err(e) => Err(e),
            }
        } else {
            result
        };
        self.rebuilding.store(false, Ordering::SeqCst);
        result
    }

    async fn build_full_inner(&self) -> AppResult<usize> {
        let root = self.root.clone();
        let records = tokio::task::spawn_blocking(move || walker::walk(&root))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

        let mut files = BTreeMap::new();
        for record in records {
            files.insert(record.path.clone(), record);
        }

        let mut state = self.state.write();
        let count = files.len();
        state.files = files;
        state.indexed_at = Utc::now();
        state.loaded = true;
        state.rebuild_inverted();
        info!(file_count = count, "full walk complete");
        Ok(count)
    }

    #[instrument(skip(self))]
    pub async fn save(&self) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        let snapshot = {
            let state = self.state.read();
            Snapshot {
                version: SNAPSHOT_VERSION.to_string(),
                indexed_at: state.indexed_at.to_rfc3339(),
                project_root: self.root.to_string_lossy().to_string(),
                file_count: state.files.len(),
                files: state.files.values().cloned().collect(),
            }
        };

        let body = serde_json::to_vec_pretty(&snapshot)?;
        tokio::fs::write(&self.snapshot_tmp_path, &body)
            .await
            .map_err(AppError::Io)?;
        tokio::fs::rename(&self.snapshot_tmp_path, &self.snapshot_path)
            .await
            .map_err(AppError::Io)?;
        info!(file_count = snapshot.file_count, "snapshot saved");
        Ok(())
    }

    /// Resolve a project-relative path lexically (no filesystem touch, so it
    /// works for paths that don't exist yet) and reject anything that would
    /// climb above `root`.
    fn resolve_safe(&self, rel_path: &str) -> AppResult<PathBuf> {
        let rel = rel_path.trim_start_matches('/');
        let mut normalized = PathBuf::new();
        for component in Path::new(rel).components() {
            match component {
                std::path::Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(AppError::PathUnsafe(rel_path.to_string()));
                    }
                }
                std::path::Component::CurDir => {}
                std::path::Component::Normal(seg) => normalized.push(seg),
                _ => return Err(AppError::PathUnsafe(rel_path.to_string())),
            }
        }
        Ok(self.root.join(normalized))
    }

    pub fn get_file(&self, rel_path: &str) -> AppResult<FileRecord> {
        self.resolve_safe(rel_path)?;
        let key = normalize_key(rel_path);
        self.state
            .read()
            .files
            .get(&key)
            .cloned()
            .ok_or_else(|| AppError::NotFound(rel_path.to_string()))
    }

    pub fn list_files(&self, language: Option<&str>) -> Vec<FileSummary> {
        self.state
            .read()
            .files
            .values()
            .filter(|r| language.map(|l| r.language == l).unwrap_or(true))
            .map(|r| FileSummary {
                path: r.path.clone(),
                language: r.language.clone(),
                lines: r.lines,
                size: r.size,
            })
            .collect()
    }

    #[instrument(skip(self))]
    pub fn search(&self, query: &str, limit: usize) -> Vec<ScoredHit> {
        if query.is_empty() {
            return Vec::new();
        }
        let limit = limit.clamp(1, 100);
        let query_lower = query.to_lowercase();
        let tokens = tokenize(&query_lower);

        let state = self.state.read();
        let candidates: BTreeSet<String> = if tokens.is_empty() {
            state.files.keys().cloned().collect()
        } else {
            let mut union = BTreeSet::new();
            let mut any_missing = false;
            for token in &tokens {
                match state.inverted.get(token) {
                    Some(paths) => union.extend(paths.iter().cloned()),
                    None => any_missing = true,
                }
            }
            if any_missing {
                state.files.keys().cloned().collect()
            } else {
                union
            }
        };

        let mut hits = Vec::new();
        for path in candidates {
            let Some(record) = state.files.get(&path) else {
                continue;
            };
            let lines: Vec<&str> = record.content.lines().collect();
            let basename_hit = record.name.to_lowercase().contains(&query_lower);
            let path_hit = record.path.to_lowercase().contains(&query_lower);

            for (idx, line) in lines.iter().enumerate() {
                if !line.to_lowercase().contains(&query_lower) {
                    continue;
                }
                let length_prior = 0.2 / (1.0 + (line.len() as f64) / 100.0);
                let mut score = 0.5 + length_prior;
                if basename_hit {
                    score += 0.2;
                }
                if path_hit {
                    score += 0.1;
                }
                let score = score.clamp(0.0, 1.0);

                let start = idx.saturating_sub(2);
                let end = (idx + 2).min(lines.len().saturating_sub(1));
                let context = lines[start..=end].join("\n");

                hits.push(ScoredHit {
                    file: record.path.clone(),
                    line: idx + 1,
                    content: line.trim().to_string(),
                    language: record.language.clone(),
                    context,
                    score,
                });
            }
        }

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        hits
    }

    #[instrument(skip(self))]
    pub async fn upsert(&self, rel_path: &str) -> AppResult<()> {
        let full_path = self.resolve_safe(rel_path)?;
        let key = normalize_key(rel_path);
        let relative = Path::new(&key);

        let name = match full_path.file_name() {
            Some(n) => n.to_string_lossy().to_string(),
            None => return Ok(()),
        };
        if !is_includable_name(&name) || has_excluded_segment(relative) {
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;
        let metadata = match tokio::fs::metadata(&full_path).await {
            Ok(m) => m,
            Err(_) => return Ok(()),
        };
        if metadata.len() > MAX_FILE_SIZE_BYTES {
            return Ok(());
        }
        let content = match tokio::fs::read_to_string(&full_path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => return Ok(()),
            Err(e) => return Err(AppError::Io(e)),
        };

        let modified: DateTime<Utc> = metadata.modified().map_err(AppError::Io)?.into();
        let extension = name
            .rsplit_once('.')
            .map(|(_, ext)| format!(".{}", ext.to_lowercase()))
            .unwrap_or_default();
        let language = detect_language(&extension).to_string();
        let lines = if content.is_empty() {
            0
        } else {
            content.matches('\n').count() + 1
        };

        let record = FileRecord {
            path: key.clone(),
            name,
            size: metadata.len(),
            modified: modified.to_rfc3339(),
            lines,
            content,
            extension,
            language,
        };

        let mut state = self.state.write();
        state.files.insert(key, record);
        state.rebuild_inverted();
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, rel_path: &str) -> AppResult<()> {
        self.resolve_safe(rel_path)?;
        let key = normalize_key(rel_path);
        let _guard = self.write_lock.lock().await;
        let mut state = self.state.write();
        if state.files.remove(&key).is_some() {
            state.rebuild_inverted();
        }
        Ok(())
    }
}

fn normalize_key(rel_path: &str) -> String {
    rel_path.trim_start_matches('/').replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config_for(root: &Path) -> Config {
        let index_dir = root.join(".prism");
        std::fs::create_dir_all(&index_dir).unwrap();
        Config {
            project_root: root.to_path_buf(),
            port: 8080,
            enable_watcher: false,
            shutdown_timeout_ms: 5000,
            index_dir,
        }
    }

    #[tokio::test]
    async fn build_then_search_finds_hit() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.js"),
            "function foo() { return 1; }\n",
        )
        .unwrap();
        let indexer = Indexer::new(&config_for(dir.path()));
        let count = indexer.build_full().await.unwrap();
        assert_eq!(count, 1);

        let hits = indexer.search("foo", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file, "a.js");
        assert_eq!(hits[0].line, 1);
        assert!(hits[0].score >= 0.5);
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "def f():\n    pass\n").unwrap();
        let indexer = Indexer::new(&config_for(dir.path()));
        indexer.build_full().await.unwrap();
        indexer.save().await.unwrap();

        let reloaded = Indexer::new(&config_for(dir.path()));
        reloaded.load().await.unwrap();
        assert_eq!(reloaded.file_count(), 1);
        assert!(reloaded.get_file("a.py").is_ok());
    }

    #[tokio::test]
    async fn upsert_then_remove() {
        let dir = tempdir().unwrap();
        let indexer = Indexer::new(&config_for(dir.path()));
        std::fs::write(dir.path().join("b.rs"), "fn main() {}\n").unwrap();
        indexer.upsert("b.rs").await.unwrap();
        assert!(indexer.get_file("b.rs").is_ok());

        indexer.remove("b.rs").await.unwrap();
        assert!(matches!(indexer.get_file("b.rs"), Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let indexer = Indexer::new(&config_for(dir.path()));
        let result = indexer.get_file("../../etc/passwd");
        assert!(matches!(result, Err(AppError::PathUnsafe(_))));
    }

    #[test]
    fn empty_query_returns_no_hits() {
        let dir = tempdir().unwrap();
        let indexer = Indexer::new(&config_for(dir.path()));
        assert!(indexer.search("", 10).is_empty());
    }
}
