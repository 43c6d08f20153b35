//! Scope expansion and concurrent per-project use search

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;

use super::checker::{FileCheckResults, TypeChecker};
use super::options::OptionsProvider;
use crate::error::{SymscopeError, SymscopeResult};
use crate::models::solution::{DocumentId, ProjectId, Solution};
use crate::models::symbol::{DeclarationLocation, Symbol, SymbolUse};
use crate::models::text::SourceRange;

#[derive(Clone)]
pub struct ScopeExpander {
    checker: Arc<dyn TypeChecker>,
    options: Arc<dyn OptionsProvider>,
    max_concurrent: usize,
}

impl ScopeExpander {
    pub fn new(
        checker: Arc<dyn TypeChecker>,
        options: Arc<dyn OptionsProvider>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            checker,
            options,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Projects to search for a symbol declared at `location`
    ///
    /// Internal symbols stay within their declaring projects; anything else
    /// also reaches each project's dependents. Order is stable, duplicates
    /// removed.
    pub fn searched_projects(location: &DeclarationLocation, solution: &Solution) -> Vec<ProjectId> {
        let DeclarationLocation::VisibleInProjects {
            projects,
            is_internal,
        } = location
        else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut searched = Vec::new();
        for project in projects {
            let dependents = if *is_internal {
                Vec::new()
            } else {
                solution.dependent_projects(project)
            };
            for id in std::iter::once(project.clone()).chain(dependents) {
                if seen.insert(id.clone()) {
                    searched.push(id);
                }
            }
        }
        searched
    }

    /// Uses of `symbol` reported by each project's check, in project order
    ///
    /// Projects run concurrently. A project without resolvable options
    /// contributes nothing; checker faults and cancellation abort the search.
    pub async fn find_uses_in_projects(
        &self,
        symbol: &Symbol,
        projects: &[ProjectId],
        solution: &Solution,
        cancel: &CancellationToken,
    ) -> SymscopeResult<Vec<SymbolUse>> {
        let owned: Vec<ProjectId> = projects.to_vec();
        let searches = stream::iter(owned.into_iter().enumerate())
            .map(|(idx, project)| async move {
                self.uses_in_project(symbol, &project, solution)
                    .await
                    .map(|uses| (idx, uses))
            })
            .buffer_unordered(self.max_concurrent)
            .try_collect::<Vec<_>>();

        let mut per_project = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SymscopeError::Cancelled),
            result = searches => result?,
        };

        per_project.sort_by_key(|(idx, _)| *idx);
        Ok(per_project.into_iter().flat_map(|(_, uses)| uses).collect())
    }

    async fn uses_in_project(
        &self,
        symbol: &Symbol,
        project: &ProjectId,
        solution: &Solution,
    ) -> SymscopeResult<Vec<SymbolUse>> {
        let Some((_, options)) = self.options.options_for_project(solution, project).await else {
            tracing::debug!("No options for project {}, skipping", project);
            return Ok(Vec::new());
        };

        let results = self.checker.parse_and_check_project(&options).await?;
        let uses = results.uses_of_symbol(symbol);
        tracing::trace!("{} uses of '{}' in {}", uses.len(), symbol.name, project);
        Ok(uses)
    }

    /// All uses of `symbol` in scope, one per source range, grouped by document
    pub async fn find_uses_across_scope(
        &self,
        symbol: &Symbol,
        location: &DeclarationLocation,
        file_check: &dyn FileCheckResults,
        solution: &Solution,
        cancel: &CancellationToken,
    ) -> SymscopeResult<HashMap<DocumentId, Vec<SymbolUse>>> {
        if cancel.is_cancelled() {
            return Err(SymscopeError::Cancelled);
        }

        let uses = match location {
            DeclarationLocation::CurrentDocumentOnly => file_check.uses_of_symbol_in_file(symbol),
            DeclarationLocation::VisibleInProjects { .. } => {
                let projects = Self::searched_projects(location, solution);
                tracing::debug!(
                    "Searching {} projects for '{}'",
                    projects.len(),
                    symbol.name
                );
                self.find_uses_in_projects(symbol, &projects, solution, cancel)
                    .await?
            }
        };

        Ok(group_by_document(dedup_by_range(uses), solution))
    }
}

/// Keep the first use reported for each source range
pub fn dedup_by_range(uses: Vec<SymbolUse>) -> Vec<SymbolUse> {
    let mut seen: HashSet<SourceRange> = HashSet::with_capacity(uses.len());
    uses.into_iter()
        .filter(|u| seen.insert(u.range.clone()))
        .collect()
}

/// Map each use to every document backed by its file
///
/// A file linked into several projects yields one copy per document. Uses
/// in files the solution does not know are dropped.
pub fn group_by_document(
    uses: Vec<SymbolUse>,
    solution: &Solution,
) -> HashMap<DocumentId, Vec<SymbolUse>> {
    let mut grouped: HashMap<DocumentId, Vec<SymbolUse>> = HashMap::new();
    for symbol_use in uses {
        let ids = solution.document_ids_for_path(symbol_use.range.file());
        if ids.is_empty() {
            tracing::debug!(
                "Dropping use outside the solution: {}",
                symbol_use.range.file().display()
            );
        }
        for id in ids {
            grouped
                .entry(id.clone())
                .or_default()
                .push(symbol_use.clone());
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::error::CheckError;
    use crate::models::solution::Document;
    use crate::models::symbol::{OccurrenceKind, SymbolId, SymbolKind};
    use crate::models::text::Range;
    use crate::services::checker::{
        FileCheck, ParsingOptions, ProjectCheckResults, ProjectOptions,
    };
    use crate::services::fixtures;
    use crate::services::options::SolutionOptionsProvider;

    /// Hides options of the named projects
    struct PartialOptions {
        missing: Vec<ProjectId>,
    }

    #[async_trait]
    impl OptionsProvider for PartialOptions {
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
            if self.missing.contains(project) {
                return None;
            }
            SolutionOptionsProvider
                .options_for_project(solution, project)
                .await
        }
    }

    struct FailingChecker;

    #[async_trait]
    impl TypeChecker for FailingChecker {
        async fn parse_and_check_file(
            &self,
            path: &Path,
            _version: u64,
            _text: &str,
            _options: &ProjectOptions,
        ) -> Result<FileCheck, CheckError> {
            Err(CheckError::SourceUnavailable(path.display().to_string()))
        }

        async fn parse_and_check_project(
            &self,
            options: &ProjectOptions,
        ) -> Result<Arc<dyn ProjectCheckResults>, CheckError> {
            Err(CheckError::Failed {
                path: options.project_id.to_string(),
                message: "checker crashed".to_string(),
            })
        }
    }

    /// Signals once a project check starts, then never finishes
    struct StalledChecker {
        started: Arc<Notify>,
    }

    #[async_trait]
    impl TypeChecker for StalledChecker {
        async fn parse_and_check_file(
            &self,
            path: &Path,
            _version: u64,
            _text: &str,
            _options: &ProjectOptions,
        ) -> Result<FileCheck, CheckError> {
            Err(CheckError::SourceUnavailable(path.display().to_string()))
        }

        async fn parse_and_check_project(
            &self,
            _options: &ProjectOptions,
        ) -> Result<Arc<dyn ProjectCheckResults>, CheckError> {
            self.started.notify_one();
            std::future::pending().await
        }
    }

    fn five_projects() -> Solution {
        fixtures::solution(vec![
            fixtures::project("Core", &[], &[("/core/a.ml", "let shared = 1\nlet c = shared")]),
            fixtures::project("A", &["Core"], &[("/a/m.ml", "let a = shared")]),
            fixtures::project("B", &["Core"], &[("/b/m.ml", "let b = shared")]),
            fixtures::project("C", &["Core"], &[("/c/m.ml", "let c = shared")]),
            fixtures::project("D", &["Core"], &[("/d/m.ml", "let d = shared")]),
        ])
    }

    fn ids(names: &[&str]) -> Vec<ProjectId> {
        names.iter().map(ProjectId::new).collect()
    }

    #[test]
    fn test_public_symbol_reaches_dependents() {
        let solution = fixtures::solution(vec![
            fixtures::project("P", &[], &[]),
            fixtures::project("Q", &["P"], &[]),
            fixtures::project("R", &["P"], &[]),
            fixtures::project("S", &[], &[]),
        ]);
        let location = DeclarationLocation::VisibleInProjects {
            projects: ids(&["P"]),
            is_internal: false,
        };

        let searched: HashSet<ProjectId> = ScopeExpander::searched_projects(&location, &solution)
            .into_iter()
            .collect();
        assert_eq!(searched, ids(&["P", "Q", "R"]).into_iter().collect());
    }

    #[test]
    fn test_internal_symbol_stays_in_projects() {
        let solution = fixtures::solution(vec![
            fixtures::project("P", &[], &[]),
            fixtures::project("Q", &["P"], &[]),
        ]);
        let location = DeclarationLocation::VisibleInProjects {
            projects: ids(&["P", "P"]),
            is_internal: true,
        };
        assert_eq!(
            ScopeExpander::searched_projects(&location, &solution),
            ids(&["P"])
        );
    }

    #[test]
    fn test_current_document_only_searches_no_projects() {
        let solution = fixtures::single_file("let x = 1");
        assert!(
            ScopeExpander::searched_projects(&DeclarationLocation::CurrentDocumentOnly, &solution)
                .is_empty()
        );
    }

    #[test]
    fn test_dedup_by_range() {
        let symbol = Arc::new(Symbol::new(SymbolId(1), "T", SymbolKind::Type));
        let range = SourceRange::new("/p/a.ml", Range::on_line(2, 4, 5));
        let kinds = [
            OccurrenceKind::Use,
            OccurrenceKind::InType,
            OccurrenceKind::InAttribute,
            OccurrenceKind::InPattern,
        ];
        let mut uses: Vec<SymbolUse> = kinds
            .iter()
            .map(|k| SymbolUse::new(Arc::clone(&symbol), range.clone(), *k))
            .collect();
        uses.push(SymbolUse::new(
            Arc::clone(&symbol),
            SourceRange::new("/p/a.ml", Range::on_line(3, 0, 1)),
            OccurrenceKind::Use,
        ));

        let deduped = dedup_by_range(uses);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].kind, OccurrenceKind::Use);
    }

    #[tokio::test]
    async fn test_type_annotation_counts_once() {
        let text = "type Point = { x: int }\nlet origin (p: Point) = p";
        let solution = fixtures::single_file(text);
        let resolved = fixtures::resolve(&solution, fixtures::MAIN_PATH, 5).await;
        let location = DeclarationLocation::classify(
            resolved.symbol(),
            &fixtures::document(&solution, fixtures::MAIN_PATH),
            &solution,
        )
        .unwrap();

        let grouped = fixtures::expander()
            .find_uses_across_scope(
                resolved.symbol(),
                &location,
                resolved.file_check.as_ref(),
                &solution,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let uses = grouped.values().next().unwrap();
        assert_eq!(uses.len(), 2);
    }

    #[tokio::test]
    async fn test_unresolvable_projects_contribute_nothing() {
        let solution = five_projects();
        let resolved = fixtures::resolve(&solution, "/core/a.ml", 4).await;
        let expander = ScopeExpander::new(
            fixtures::checker(),
            Arc::new(PartialOptions {
                missing: ids(&["C", "D"]),
            }),
            4,
        );
        let location = DeclarationLocation::VisibleInProjects {
            projects: ids(&["Core"]),
            is_internal: false,
        };
        assert_eq!(ScopeExpander::searched_projects(&location, &solution).len(), 5);

        let grouped = expander
            .find_uses_across_scope(
                resolved.symbol(),
                &location,
                resolved.file_check.as_ref(),
                &solution,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let mut files: Vec<String> = grouped
            .keys()
            .map(|id| id.path.display().to_string())
            .collect();
        files.sort();
        assert_eq!(files, vec!["/a/m.ml", "/b/m.ml", "/core/a.ml"]);
        assert_eq!(grouped.values().map(Vec::len).sum::<usize>(), 4);
    }

    #[tokio::test]
    async fn test_results_follow_project_order() {
        let solution = five_projects();
        let resolved = fixtures::resolve(&solution, "/core/a.ml", 4).await;
        let uses = fixtures::expander()
            .find_uses_in_projects(
                resolved.symbol(),
                &ids(&["D", "A", "Core"]),
                &solution,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let files: Vec<&Path> = uses.iter().map(|u| u.range.file()).collect();
        assert_eq!(
            files,
            vec![
                Path::new("/d/m.ml"),
                Path::new("/a/m.ml"),
                Path::new("/core/a.ml"),
                Path::new("/core/a.ml"),
            ]
        );
    }

    #[tokio::test]
    async fn test_checker_fault_propagates() {
        let solution = five_projects();
        let resolved = fixtures::resolve(&solution, "/core/a.ml", 4).await;
        let expander = ScopeExpander::new(
            Arc::new(FailingChecker),
            Arc::new(SolutionOptionsProvider),
            2,
        );

        let err = expander
            .find_uses_in_projects(
                resolved.symbol(),
                &ids(&["Core", "A"]),
                &solution,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SymscopeError::Check(CheckError::Failed { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_search() {
        let solution = five_projects();
        let resolved = fixtures::resolve(&solution, "/core/a.ml", 4).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = fixtures::expander()
            .find_uses_in_projects(resolved.symbol(), &ids(&["Core"]), &solution, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_stops_running_search() {
        let solution = five_projects();
        let resolved = fixtures::resolve(&solution, "/core/a.ml", 4).await;
        let started = Arc::new(Notify::new());
        let expander = ScopeExpander::new(
            Arc::new(StalledChecker {
                started: Arc::clone(&started),
            }),
            Arc::new(SolutionOptionsProvider),
            2,
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            started.notified().await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            expander.find_uses_in_projects(
                resolved.symbol(),
                &ids(&["Core", "A", "B"]),
                &solution,
                &cancel,
            ),
        )
        .await
        .expect("search did not stop on cancel");
        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_linked_file_gets_a_copy_per_document() {
        let shared = ("/shared/util.ml", "let helper = 1");
        let solution = fixtures::solution(vec![
            fixtures::project("A", &[], &[shared, ("/a/m.ml", "let a = helper")]),
            fixtures::project("B", &[], &[shared]),
        ]);
        let resolved = fixtures::resolve(&solution, "/a/m.ml", 8).await;
        let location = DeclarationLocation::classify(
            resolved.symbol(),
            &fixtures::document(&solution, "/a/m.ml"),
            &solution,
        )
        .unwrap();

        let grouped = fixtures::expander()
            .find_uses_across_scope(
                resolved.symbol(),
                &location,
                resolved.file_check.as_ref(),
                &solution,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(grouped.contains_key(&DocumentId::new(ProjectId::new("A"), "/shared/util.ml")));
        assert!(grouped.contains_key(&DocumentId::new(ProjectId::new("B"), "/shared/util.ml")));
        assert_eq!(grouped.len(), 3);
    }
}
