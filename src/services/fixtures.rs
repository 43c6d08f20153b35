//! Shared builders for service tests

use std::sync::Arc;
use std::time::Duration;

use super::check_cache::CachingChecker;
use super::checker::TypeChecker;
use super::locator::{ResolvedSymbolUse, SymbolUseLocator};
use super::options::{OptionsProvider, SolutionOptionsProvider};
use super::rename::RenamePlanner;
use super::resolver::PositionResolver;
use super::scope::ScopeExpander;
use crate::infra::checker::LexicalChecker;
use crate::infra::tokenizer::IdentifierTokenizer;
use crate::models::config::ApplyStrategy;
use crate::models::solution::{Document, Project, ProjectConfig, ProjectId, Solution};
use crate::models::symbol::LookupKind;

pub const MAIN_PATH: &str = "/p/main.ml";

pub fn project(name: &str, references: &[&str], files: &[(&str, &str)]) -> Project {
    let config = ProjectConfig {
        defines: Vec::new(),
        references: references.iter().map(ProjectId::new).collect(),
    };
    files
        .iter()
        .fold(Project::new(ProjectId::new(name), config), |project, (path, text)| {
            project.with_document(*path, *text)
        })
}

pub fn solution(projects: Vec<Project>) -> Solution {
    Solution::new(projects).unwrap()
}

/// Project `P` holding `MAIN_PATH` only
pub fn single_file(text: &str) -> Solution {
    solution(vec![project("P", &[], &[(MAIN_PATH, text)])])
}

pub fn document(solution: &Solution, path: &str) -> Arc<Document> {
    Arc::clone(solution.document_for_path(path.as_ref()).unwrap())
}

pub fn checker() -> Arc<dyn TypeChecker> {
    Arc::new(CachingChecker::new(
        LexicalChecker,
        Duration::from_secs(300),
        100,
    ))
}

fn options() -> Arc<dyn OptionsProvider> {
    Arc::new(SolutionOptionsProvider)
}

pub fn resolver() -> PositionResolver {
    PositionResolver::new(Arc::new(IdentifierTokenizer), options())
}

pub fn locator() -> SymbolUseLocator {
    SymbolUseLocator::new(resolver(), checker(), options(), LookupKind::Greedy)
}

pub fn expander() -> ScopeExpander {
    ScopeExpander::new(checker(), options(), 4)
}

pub fn planner() -> RenamePlanner {
    let checker = checker();
    let locator = SymbolUseLocator::new(
        resolver(),
        Arc::clone(&checker),
        options(),
        LookupKind::Greedy,
    );
    RenamePlanner::new(
        locator,
        ScopeExpander::new(checker, options(), 4),
        ApplyStrategy::Batched,
    )
}

/// Resolve the symbol at `offset` in the document at `path`
pub async fn resolve(solution: &Solution, path: &str, offset: usize) -> ResolvedSymbolUse {
    let doc = document(solution, path);
    locator()
        .resolve_symbol_use(solution, &doc, offset)
        .await
        .unwrap()
        .unwrap()
}
