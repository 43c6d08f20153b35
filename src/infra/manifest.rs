//! Solution manifest loading
//!
//! A `symscope.toml` lists the projects of a solution:
//!
//! ```toml
//! [[project]]
//! name = "Core"
//! root = "core"
//!
//! [[project]]
//! name = "App"
//! root = "app"
//! files = ["main.ml", "../shared/util.ml"]
//! defines = ["DEBUG"]
//! references = ["Core"]
//! ```
//!
//! Without `files`, sources are discovered under `root` by extension.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SolutionError;
use crate::models::solution::{Project, ProjectConfig, ProjectId, Solution};

pub const MANIFEST_FILE: &str = "symscope.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "project", default)]
    pub projects: Vec<ProjectEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub name: String,

    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Sources in compilation order, relative to `root`
    #[serde(default)]
    pub files: Option<Vec<PathBuf>>,

    #[serde(default)]
    pub defines: Vec<String>,

    #[serde(default)]
    pub references: Vec<String>,

    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_extensions() -> Vec<String> {
    vec!["ml".to_string()]
}

/// A solution together with the directory its manifest lives in
#[derive(Debug, Clone)]
pub struct LoadedSolution {
    pub root: PathBuf,
    pub solution: Solution,
}

pub async fn load_solution(
    manifest_path: &Path,
    max_file_size: u64,
) -> Result<LoadedSolution, SolutionError> {
    let content = tokio::fs::read_to_string(manifest_path).await.map_err(|e| {
        SolutionError::Manifest(format!("{}: {}", manifest_path.display(), e))
    })?;
    let manifest: Manifest = toml::from_str(&content)
        .map_err(|e| SolutionError::Manifest(format!("{}: {}", manifest_path.display(), e)))?;

    let base = match manifest_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let base = tokio::fs::canonicalize(&base).await?;

    let mut projects = Vec::with_capacity(manifest.projects.len());
    for entry in &manifest.projects {
        projects.push(load_project(&base, entry, max_file_size).await?);
    }

    let solution = Solution::new(projects)?;
    tracing::debug!(
        "Loaded {} projects from {}",
        manifest.projects.len(),
        manifest_path.display()
    );
    Ok(LoadedSolution {
        root: base,
        solution,
    })
}

async fn load_project(
    base: &Path,
    entry: &ProjectEntry,
    max_file_size: u64,
) -> Result<Project, SolutionError> {
    let root = tokio::fs::canonicalize(base.join(&entry.root))
        .await
        .map_err(|e| {
            SolutionError::Manifest(format!(
                "project '{}': root {}: {}",
                entry.name,
                entry.root.display(),
                e
            ))
        })?;
    let files = match &entry.files {
        Some(files) => {
            let mut resolved = Vec::with_capacity(files.len());
            for file in files {
                resolved.push(tokio::fs::canonicalize(root.join(file)).await.map_err(|e| {
                    SolutionError::Manifest(format!(
                        "project '{}': {}: {}",
                        entry.name,
                        file.display(),
                        e
                    ))
                })?);
            }
            resolved
        }
        None => discover_sources(&root, &entry.extensions),
    };

    let config = ProjectConfig {
        defines: entry.defines.clone(),
        references: entry.references.iter().map(ProjectId::new).collect(),
    };

    let mut project = Project::new(ProjectId::new(&entry.name), config);
    for path in files {
        let text = read_source(&path, max_file_size).await?;
        project = project.with_document(path, text);
    }
    tracing::debug!(
        "Project {}: {} documents",
        entry.name,
        project.documents().len()
    );
    Ok(project)
}

/// Source files under `root`, sorted by path
fn discover_sources(root: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let extensions: HashSet<&str> = extensions.iter().map(String::as_str).collect();
    let walker = walkdir::WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            e.depth() == 0
                || (!name.starts_with('.') && !matches!(name.as_ref(), "target" | "node_modules"))
        });

    walker
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.contains(ext))
        })
        .map(|e| e.into_path())
        .collect()
}

async fn read_source(path: &Path, max_size: u64) -> Result<String, SolutionError> {
    let size = tokio::fs::metadata(path).await?.len();
    if max_size != u64::MAX && size > max_size {
        return Err(SolutionError::FileTooLarge {
            path: path.display().to_string(),
            size_mb: size / 1024 / 1024,
            limit_mb: max_size / 1024 / 1024,
        });
    }

    let bytes = tokio::fs::read(path).await?;
    let check_len = bytes.len().min(8192);
    if bytes[..check_len].contains(&0) {
        return Err(SolutionError::BinaryFile(path.display().to_string()));
    }
    String::from_utf8(bytes).map_err(|_| SolutionError::BinaryFile(path.display().to_string()))
}

/// Write documents that differ from `original` back to disk
///
/// A file linked into several projects is written once. Returns the
/// written paths in order.
pub async fn write_changed_documents(
    original: &Solution,
    updated: &Solution,
) -> Result<Vec<PathBuf>, SolutionError> {
    let mut ids = updated.changed_since(original);
    ids.sort();

    let mut written = Vec::new();
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id.path.clone()) {
            continue;
        }
        let document = updated
            .document(&id)
            .ok_or_else(|| SolutionError::DocumentNotFound(id.to_string()))?;
        tokio::fs::write(document.path(), document.text()).await?;
        tracing::debug!("Wrote {}", document.path().display());
        written.push(id.path);
    }
    Ok(written)
}
