//! One-shot, advisory inspection of the project tree. Never consulted during
//! search or indexing, and never allowed to fail startup: any I/O error
//! collapses to the `unknown` fallback.

use serde::Serialize;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
pub struct ProjectInfo {
    pub name: String,
    pub language: String,
    #[serde(rename = "type")]
    pub project_type: String,
}

struct Marker {
    file: &'static str,
    language: &'static str,
    project_type: &'static str,
}

const MARKERS: &[Marker] = &[
    Marker { file: "Cargo.toml", language: "rust", project_type: "cargo" },
    Marker { file: "package.json", language: "javascript", project_type: "node" },
    Marker { file: "pyproject.toml", language: "python", project_type: "python" },
    Marker { file: "go.mod", language: "go", project_type: "go" },
    Marker { file: "pom.xml", language: "java", project_type: "maven" },
    Marker { file: "Gemfile", language: "ruby", project_type: "bundler" },
    Marker { file: "composer.json", language: "php", project_type: "composer" },
];

pub fn probe(root: &Path) -> ProjectInfo {
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    for marker in MARKERS {
        let path = root.join(marker.file);
        match path.try_exists() {
            Ok(true) => {
                return ProjectInfo {
                    name,
                    language: marker.language.to_string(),
                    project_type: marker.project_type.to_string(),
                };
            }
            Ok(false) => continue,
            Err(e) => {
                debug!(marker = marker.file, error = %e, "probe marker check failed");
                continue;
            }
        }
    }

    if let Ok(entries) = std::fs::read_dir(root) {
        for entry in entries.filter_map(|e| e.ok()) {
            let fname = entry.file_name().to_string_lossy().to_string();
            if fname.ends_with(".csproj") {
                return ProjectInfo {
                    name,
                    language: "csharp".to_string(),
                    project_type: "dotnet".to_string(),
                };
            }
        }
    }

    ProjectInfo {
        name,
        language: "unknown".to_string(),
        project_type: "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn detects_cargo_project() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]\n").unwrap();
        let info = probe(dir.path());
        assert_eq!(info.language, "rust");
        assert_eq!(info.project_type, "cargo");
    }

    #[test]
    fn falls_back_to_unknown() {
        let dir = tempdir().unwrap();
        let info = probe(dir.path());
        assert_eq!(info.language, "unknown");
    }
}
