//! Project option resolution

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use super::checker::{ParsingOptions, ProjectOptions, SourceFile};
use crate::infra::hash_content;
use crate::models::solution::{Document, ProjectId, Solution};

/// Resolves checker options for documents and projects
///
/// `None` means the options are unavailable right now (project removed,
/// still loading, ...). Callers treat it as absence, not as a fault.
#[async_trait]
pub trait OptionsProvider: Send + Sync {
    async fn options_for_document(
        &self,
        solution: &Solution,
        document: &Document,
    ) -> Option<(ParsingOptions, Arc<ProjectOptions>)>;

    async fn options_for_project(
        &self,
        solution: &Solution,
        project: &ProjectId,
    ) -> Option<(ParsingOptions, Arc<ProjectOptions>)>;
}

/// Derives options from the solution snapshot itself
#[derive(Debug, Clone, Copy, Default)]
pub struct SolutionOptionsProvider;

impl SolutionOptionsProvider {
    pub fn new() -> Self {
        Self
    }

    fn build(
        solution: &Solution,
        project: &ProjectId,
        visiting: &mut HashSet<ProjectId>,
    ) -> Option<Arc<ProjectOptions>> {
        let project = solution.project(project)?;
        if !visiting.insert(project.id().clone()) {
            tracing::warn!("Reference cycle through project {}", project.id());
            return None;
        }

        let referenced_projects: Vec<Arc<ProjectOptions>> = project
            .config()
            .references
            .iter()
            .filter_map(|reference| Self::build(solution, reference, visiting))
            .collect();
        visiting.remove(project.id());

        // Checks depend on what referenced projects export
        let stamp = referenced_projects
            .iter()
            .fold(project.version_stamp(), |acc, r| {
                hash_content(&format!("{acc}:{}", r.stamp))
            });

        let source_files = project
            .documents()
            .iter()
            .map(|doc| SourceFile {
                path: doc.path().to_path_buf(),
                version: doc.version(),
                text: doc.shared_text(),
            })
            .collect();

        Some(Arc::new(ProjectOptions {
            project_id: project.id().clone(),
            source_files,
            defines: project.config().defines.clone(),
            referenced_projects,
            stamp,
        }))
    }
}

#[async_trait]
impl OptionsProvider for SolutionOptionsProvider {
    async fn options_for_document(
        &self,
        solution: &Solution,
        document: &Document,
    ) -> Option<(ParsingOptions, Arc<ProjectOptions>)> {
        self.options_for_project(solution, document.project_id())
            .await
    }

    async fn options_for_project(
        &self,
        solution: &Solution,
        project: &ProjectId,
    ) -> Option<(ParsingOptions, Arc<ProjectOptions>)> {
        let options = Self::build(solution, project, &mut HashSet::new())?;
        Some((options.parsing_options(), options))
    }
}
