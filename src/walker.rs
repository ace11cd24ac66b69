//! Recursive traversal of the project tree honoring this daemon's own
//! include/exclude policy. Unlike the broader walkers elsewhere in this
//! codebase's lineage, this one does not defer to `.gitignore` at all — the
//! suffix/segment lists below are exhaustive and authoritative.

use crate::config::{has_excluded_segment, is_includable_name, MAX_FILE_SIZE_BYTES};
use crate::indexer::FileRecord;
use crate::lang::detect_language;
use chrono::{DateTime, Utc};
use ignore::WalkBuilder;
use std::path::Path;
use tracing::{debug, warn};

pub fn walk(root: &Path) -> Vec<FileRecord> {
    let mut out = Vec::new();

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .parents(false)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .follow_links(false)
        .build();

    for result in walker {
        let entry = match result {
            Ok(e) => e,
            Err(e) => {
                debug!(error = %e, "walk entry failed");
                continue;
            }
        };

        let path = entry.path();
        if path == root {
            continue;
        }

        let relative = match path.strip_prefix(root) {
            Ok(r) => r,
            Err(_) => continue,
        };
        if has_excluded_segment(relative) {
            continue;
        }

        let file_type = match entry.file_type() {
            Some(ft) => ft,
            None => continue,
        };
        if file_type.is_dir() {
            continue;
        }

        let resolved = if file_type.is_symlink() {
            match std::fs::canonicalize(path) {
                Ok(target) if target.starts_with(root) => target,
                _ => {
                    debug!(path = %path.display(), "skipping symlink outside project root");
                    continue;
                }
            }
        } else {
            path.to_path_buf()
        };

        let name = match path.file_name() {
            Some(n) => n.to_string_lossy().to_string(),
            None => continue,
        };
        if !is_includable_name(&name) {
            continue;
        }

        match build_record(root, relative, &resolved, &name) {
            Ok(Some(record)) => out.push(record),
            Ok(None) => {}
            Err(e) => {
                warn!(path = %resolved.display(), error = %e, "skipping unreadable file");
            }
        }
    }

    out
}

fn build_record(
    root: &Path,
    relative: &Path,
    resolved: &Path,
    name: &str,
) -> std::io::Result<Option<FileRecord>> {
    let metadata = std::fs::metadata(resolved)?;
    if metadata.len() > MAX_FILE_SIZE_BYTES {
        return Ok(None);
    }

    let content = match std::fs::read_to_string(resolved) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => return Ok(None),
        Err(e) => return Err(e),
    };

    let modified: DateTime<Utc> = metadata.modified()?.into();
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

    let _ = root;
    Ok(Some(FileRecord {
        path: relative.to_string_lossy().replace('\\', "/"),
        name: name.to_string(),
        size: metadata.len(),
        modified: modified.to_rfc3339(),
        lines,
        content,
        extension,
        language,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn includes_matching_suffix_and_excludes_dirs() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {}\n").unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        std::fs::write(dir.path().join("node_modules/b.rs"), "fn x() {}\n").unwrap();
        std::fs::write(dir.path().join("c.exe"), "binary").unwrap();

        let records = walk(dir.path());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, "a.rs");
    }

    #[test]
    fn skips_oversize_files() {
        let dir = tempdir().unwrap();
        let big = "a".repeat((MAX_FILE_SIZE_BYTES + 1) as usize);
        std::fs::write(dir.path().join("big.py"), big).unwrap();
        let records = walk(dir.path());
        assert!(records.is_empty());
    }
}
