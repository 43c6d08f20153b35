//! Immutable solution graph
//!
//! A `Solution` owns projects, a `Project` owns documents. Nothing here is
//! mutated in place: edits produce a new `Solution` that shares every
//! untouched project with its predecessor.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::text::{LineIndex, TextSpan};
use crate::error::SolutionError;

/// Project identity (the project name)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(Arc<str>);

impl ProjectId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Document identity: the owning project plus the file path.
///
/// A file linked into two projects yields two distinct documents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId {
    pub project: ProjectId,
    pub path: PathBuf,
}

impl DocumentId {
    pub fn new(project: ProjectId, path: impl Into<PathBuf>) -> Self {
        Self {
            project,
            path: path.into(),
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.project, self.path.display())
    }
}

/// Immutable text snapshot of a source file
#[derive(Debug, Clone)]
pub struct Document {
    id: DocumentId,
    text: Arc<str>,
    version: u64,
    lines: Arc<LineIndex>,
}

impl Document {
    pub fn new(id: DocumentId, text: impl Into<Arc<str>>) -> Self {
        let text = text.into();
        let lines = Arc::new(LineIndex::new(&text));
        Self {
            id,
            text,
            version: 0,
            lines,
        }
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.id.path
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.id.project
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Shared handle to the text snapshot
    pub fn shared_text(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.lines
    }

    pub fn span_text(&self, span: TextSpan) -> Option<&str> {
        span.slice(&self.text)
    }

    /// New snapshot with `text` and the next version stamp
    pub fn with_text(&self, text: impl Into<Arc<str>>) -> Self {
        let mut next = Self::new(self.id.clone(), text);
        next.version = self.version + 1;
        next
    }
}

/// Compilation configuration of a project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Conditional compilation symbols
    #[serde(default)]
    pub defines: Vec<String>,

    /// Projects this project references
    #[serde(default)]
    pub references: Vec<ProjectId>,
}

#[derive(Debug, Clone)]
pub struct Project {
    id: ProjectId,
    config: ProjectConfig,
    /// Documents in compilation order
    documents: Vec<Arc<Document>>,
}

impl Project {
    pub fn new(id: ProjectId, config: ProjectConfig) -> Self {
        Self {
            id,
            config,
            documents: Vec::new(),
        }
    }

    /// Append a document with `text` at `path`
    pub fn with_document(mut self, path: impl Into<PathBuf>, text: impl Into<Arc<str>>) -> Self {
        let id = DocumentId::new(self.id.clone(), path);
        self.documents.push(Arc::new(Document::new(id, text)));
        self
    }

    pub fn id(&self) -> &ProjectId {
        &self.id
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn documents(&self) -> &[Arc<Document>] {
        &self.documents
    }

    pub fn document(&self, path: &Path) -> Option<&Arc<Document>> {
        self.documents.iter().find(|d| d.path() == path)
    }

    /// Stamp covering configuration, file list and document versions
    pub fn version_stamp(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.id.hash(&mut hasher);
        self.config.defines.hash(&mut hasher);
        self.config.references.hash(&mut hasher);
        for doc in &self.documents {
            doc.path().hash(&mut hasher);
            doc.version().hash(&mut hasher);
            doc.text().hash(&mut hasher);
        }
        hasher.finish()
    }
}

/// Immutable collection of projects with a file path index
#[derive(Debug, Clone, Default)]
pub struct Solution {
    projects: Arc<BTreeMap<ProjectId, Arc<Project>>>,
    path_index: Arc<HashMap<PathBuf, Vec<DocumentId>>>,
    version: u64,
}

impl Solution {
    pub fn new(projects: Vec<Project>) -> Result<Self, SolutionError> {
        let mut map = BTreeMap::new();
        for project in projects {
            let id = project.id.clone();
            if map.insert(id.clone(), Arc::new(project)).is_some() {
                return Err(SolutionError::DuplicateProject(id.to_string()));
            }
        }

        for project in map.values() {
            for reference in &project.config.references {
                if !map.contains_key(reference) {
                    return Err(SolutionError::UnknownReference {
                        project: project.id.to_string(),
                        reference: reference.to_string(),
                    });
                }
            }
        }

        let path_index = Self::index_paths(&map);
        Ok(Self {
            projects: Arc::new(map),
            path_index: Arc::new(path_index),
            version: 0,
        })
    }

    fn index_paths(projects: &BTreeMap<ProjectId, Arc<Project>>) -> HashMap<PathBuf, Vec<DocumentId>> {
        let mut index: HashMap<PathBuf, Vec<DocumentId>> = HashMap::new();
        for project in projects.values() {
            for doc in &project.documents {
                index
                    .entry(doc.path().to_path_buf())
                    .or_default()
                    .push(doc.id().clone());
            }
        }
        index
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn projects(&self) -> impl Iterator<Item = &Arc<Project>> {
        self.projects.values()
    }

    pub fn project(&self, id: &ProjectId) -> Option<&Arc<Project>> {
        self.projects.get(id)
    }

    pub fn document(&self, id: &DocumentId) -> Option<&Arc<Document>> {
        self.projects.get(&id.project)?.document(&id.path)
    }

    /// All documents backed by `path`, one per project the file is linked into
    pub fn document_ids_for_path(&self, path: &Path) -> &[DocumentId] {
        self.path_index
            .get(path)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// First document for `path`, in project order
    pub fn document_for_path(&self, path: &Path) -> Option<&Arc<Document>> {
        self.document_ids_for_path(path)
            .first()
            .and_then(|id| self.document(id))
    }

    pub fn projects_containing(&self, path: &Path) -> Vec<ProjectId> {
        self.document_ids_for_path(path)
            .iter()
            .map(|id| id.project.clone())
            .collect()
    }

    /// Projects that transitively reference `id`, in breadth-first order
    ///
    /// The reference graph is walked to its closure so that a one-hop
    /// expansion over this list reaches every consumer.
    pub fn dependent_projects(&self, id: &ProjectId) -> Vec<ProjectId> {
        let mut seen: HashSet<&ProjectId> = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);
        let mut dependents = Vec::new();

        while let Some(current) = queue.pop_front() {
            for project in self.projects.values() {
                if project.config.references.contains(current) && seen.insert(&project.id) {
                    dependents.push(project.id.clone());
                    queue.push_back(&project.id);
                }
            }
        }
        dependents
    }

    /// New solution with the text of one document replaced
    pub fn with_document_text(
        &self,
        id: &DocumentId,
        text: impl Into<Arc<str>>,
    ) -> Result<Self, SolutionError> {
        let project = self
            .projects
            .get(&id.project)
            .ok_or_else(|| SolutionError::ProjectNotFound(id.project.to_string()))?;
        let position = project
            .documents
            .iter()
            .position(|d| d.id() == id)
            .ok_or_else(|| SolutionError::DocumentNotFound(id.to_string()))?;

        let mut updated = Project::clone(project);
        updated.documents[position] = Arc::new(project.documents[position].with_text(text));

        let mut projects = BTreeMap::clone(&self.projects);
        projects.insert(id.project.clone(), Arc::new(updated));

        Ok(Self {
            projects: Arc::new(projects),
            path_index: Arc::clone(&self.path_index),
            version: self.version + 1,
        })
    }

    /// Documents whose version differs from their counterpart in `base`
    pub fn changed_since(&self, base: &Solution) -> Vec<DocumentId> {
        self.projects
            .values()
            .flat_map(|p| p.documents.iter())
            .filter(|doc| {
                base.document(doc.id())
                    .is_none_or(|old| old.version() != doc.version())
            })
            .map(|doc| doc.id().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(name: &str, references: &[&str]) -> Project {
        Project::new(
            ProjectId::new(name),
            ProjectConfig {
                defines: Vec::new(),
                references: references.iter().map(ProjectId::new).collect(),
            },
        )
    }

    #[test]
    fn test_dependents_are_transitive() {
        let solution = Solution::new(vec![
            project("Core", &[]),
            project("Lib", &["Core"]),
            project("App", &["Lib"]),
            project("Tool", &[]),
        ])
        .unwrap();

        let dependents = solution.dependent_projects(&ProjectId::new("Core"));
        assert_eq!(dependents, vec![ProjectId::new("Lib"), ProjectId::new("App")]);
        assert!(solution.dependent_projects(&ProjectId::new("App")).is_empty());
    }

    #[test]
    fn test_unknown_reference_rejected() {
        let err = Solution::new(vec![project("App", &["Missing"])]).unwrap_err();
        assert!(matches!(err, SolutionError::UnknownReference { .. }));
    }

    #[test]
    fn test_duplicate_project_rejected() {
        let err = Solution::new(vec![project("App", &[]), project("App", &[])]).unwrap_err();
        assert!(matches!(err, SolutionError::DuplicateProject(_)));
    }

    #[test]
    fn test_linked_file_maps_to_each_project() {
        let shared = PathBuf::from("/src/shared.ml");
        let solution = Solution::new(vec![
            project("A", &[]).with_document(&shared, "let a = 1"),
            project("B", &[]).with_document(&shared, "let a = 1"),
        ])
        .unwrap();

        let ids = solution.document_ids_for_path(&shared);
        assert_eq!(ids.len(), 2);
        assert_eq!(
            solution.projects_containing(&shared),
            vec![ProjectId::new("A"), ProjectId::new("B")]
        );
    }

    #[test]
    fn test_with_document_text_is_copy_on_write() {
        let path = PathBuf::from("/src/a.ml");
        let original = Solution::new(vec![
            project("A", &[]).with_document(&path, "let a = 1"),
            project("B", &[]).with_document("/src/b.ml", "let b = 2"),
        ])
        .unwrap();
        let id = DocumentId::new(ProjectId::new("A"), &path);

        let updated = original.with_document_text(&id, "let a = 2").unwrap();

        assert_eq!(original.document(&id).unwrap().text(), "let a = 1");
        assert_eq!(updated.document(&id).unwrap().text(), "let a = 2");
        assert_eq!(updated.document(&id).unwrap().version(), 1);
        assert!(Arc::ptr_eq(
            original.project(&ProjectId::new("B")).unwrap(),
            updated.project(&ProjectId::new("B")).unwrap()
        ));
        assert_eq!(updated.changed_since(&original), vec![id]);
    }

    #[test]
    fn test_version_stamp_tracks_document_versions() {
        let path = PathBuf::from("/src/a.ml");
        let solution = Solution::new(vec![project("A", &[]).with_document(&path, "let a = 1")])
            .unwrap();
        let id = DocumentId::new(ProjectId::new("A"), &path);
        let before = solution.project(&id.project).unwrap().version_stamp();

        let edited = solution.with_document_text(&id, "let a = 1").unwrap();
        let after = edited.project(&id.project).unwrap().version_stamp();
        assert_ne!(before, after);
    }
}
