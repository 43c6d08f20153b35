//! Reference search and rename facade

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::check_cache::{CacheStats, CachingChecker};
use super::checker::TypeChecker;
use super::locator::SymbolUseLocator;
use super::options::{OptionsProvider, SolutionOptionsProvider};
use super::rename::{RenamePlan, RenamePlanner};
use super::resolver::PositionResolver;
use super::scope::ScopeExpander;
use super::store::SolutionStore;
use crate::error::{SolutionError, SymscopeResult};
use crate::infra::checker::LexicalChecker;
use crate::infra::tokenizer::{IdentifierTokenizer, Tokenizer};
use crate::models::solution::{Document, DocumentId, ProjectId, Solution};
use crate::models::symbol::{DeclarationLocation, Symbol, SymbolCandidate, SymbolUse};
use crate::models::text::TextSpan;

/// Replacement text for a rename, given the text being replaced
pub type TextChanger = Box<dyn FnOnce(&str) -> String + Send>;

/// Solution-wide uses of one symbol
#[derive(Debug, Clone)]
pub struct SymbolReferences {
    pub symbol: Arc<Symbol>,
    pub declaration: DeclarationLocation,
    pub uses_by_document: BTreeMap<DocumentId, Vec<SymbolUse>>,
}

impl SymbolReferences {
    pub fn use_count(&self) -> usize {
        self.uses_by_document.values().map(Vec::len).sum()
    }
}

#[async_trait]
pub trait ReferenceService: Send + Sync {
    fn store(&self) -> &SolutionStore;

    /// Identifier under the cursor, without checking
    async fn candidate_at(
        &self,
        document: &DocumentId,
        offset: usize,
    ) -> SymscopeResult<Option<SymbolCandidate>>;

    /// Uses of the symbol at `offset`, confined to `document`
    async fn symbol_uses_at_location_in_document(
        &self,
        document: &DocumentId,
        offset: usize,
    ) -> SymscopeResult<Option<Vec<SymbolUse>>>;

    async fn symbol_uses_in_projects(
        &self,
        symbol: &Symbol,
        projects: &[ProjectId],
        cancel: &CancellationToken,
    ) -> SymscopeResult<Vec<SymbolUse>>;

    /// Uses of the symbol at `offset` across its whole visibility scope
    async fn symbol_uses_in_solution(
        &self,
        document: &DocumentId,
        offset: usize,
        cancel: &CancellationToken,
    ) -> SymscopeResult<Option<SymbolReferences>>;

    /// Plan a rename of the symbol covered by `span`
    async fn change_all_symbol_references(
        &self,
        document: &DocumentId,
        span: TextSpan,
        text_changer: TextChanger,
    ) -> SymscopeResult<Option<RenamePlan>>;

    /// Apply `plan` to the current solution and make the result current
    async fn commit(&self, plan: &RenamePlan, cancel: &CancellationToken)
    -> SymscopeResult<Solution>;
}

pub struct DefaultReferenceService {
    store: SolutionStore,
    locator: SymbolUseLocator,
    expander: ScopeExpander,
    planner: RenamePlanner,
    cache: Option<Arc<CachingChecker<LexicalChecker>>>,
}

impl DefaultReferenceService {
    pub fn new(
        store: SolutionStore,
        checker: Arc<dyn TypeChecker>,
        options: Arc<dyn OptionsProvider>,
        tokenizer: Arc<dyn Tokenizer>,
    ) -> Self {
        let resolver = PositionResolver::new(tokenizer, Arc::clone(&options));
        let locator = SymbolUseLocator::new(
            resolver,
            Arc::clone(&checker),
            Arc::clone(&options),
            crate::config::lookup_kind(),
        );
        let expander = ScopeExpander::new(
            checker,
            options,
            crate::config::max_concurrent_projects(),
        );
        let planner = RenamePlanner::new(
            locator.clone(),
            expander.clone(),
            crate::config::apply_strategy(),
        );

        Self {
            store,
            locator,
            expander,
            planner,
            cache: None,
        }
    }

    /// Lexical checker behind the check cache, options from the solution
    pub fn with_defaults(store: SolutionStore) -> Self {
        let cache = Arc::new(CachingChecker::from_config(LexicalChecker::new()));
        let checker: Arc<dyn TypeChecker> = Arc::clone(&cache) as Arc<dyn TypeChecker>;
        let mut service = Self::new(
            store,
            checker,
            Arc::new(SolutionOptionsProvider::new()),
            Arc::new(IdentifierTokenizer::new()),
        );
        service.cache = Some(cache);
        service
    }

    pub async fn cache_stats(&self) -> Option<CacheStats> {
        match &self.cache {
            Some(cache) => Some(cache.stats().await),
            None => None,
        }
    }

    fn document(solution: &Solution, id: &DocumentId) -> SymscopeResult<Arc<Document>> {
        solution
            .document(id)
            .cloned()
            .ok_or_else(|| SolutionError::DocumentNotFound(id.to_string()).into())
    }

    /// Document backing `path` in the current solution
    pub async fn document_id_for_path(&self, path: &Path) -> SymscopeResult<DocumentId> {
        let solution = self.store.current().await;
        solution
            .document_ids_for_path(path)
            .first()
            .cloned()
            .ok_or_else(|| SolutionError::FileNotInSolution(path.to_path_buf()).into())
    }
}

#[async_trait]
impl ReferenceService for DefaultReferenceService {
    fn store(&self) -> &SolutionStore {
        &self.store
    }

    async fn candidate_at(
        &self,
        document: &DocumentId,
        offset: usize,
    ) -> SymscopeResult<Option<SymbolCandidate>> {
        let solution = self.store.current().await;
        let doc = Self::document(&solution, document)?;
        self.locator
            .resolver()
            .resolve(&solution, &doc, offset, crate::config::lookup_kind())
            .await
    }

    async fn symbol_uses_at_location_in_document(
        &self,
        document: &DocumentId,
        offset: usize,
    ) -> SymscopeResult<Option<Vec<SymbolUse>>> {
        let solution = self.store.current().await;
        let doc = Self::document(&solution, document)?;
        self.locator.find_file_uses(&solution, &doc, offset).await
    }

    async fn symbol_uses_in_projects(
        &self,
        symbol: &Symbol,
        projects: &[ProjectId],
        cancel: &CancellationToken,
    ) -> SymscopeResult<Vec<SymbolUse>> {
        let solution = self.store.current().await;
        self.expander
            .find_uses_in_projects(symbol, projects, &solution, cancel)
            .await
    }

    async fn symbol_uses_in_solution(
        &self,
        document: &DocumentId,
        offset: usize,
        cancel: &CancellationToken,
    ) -> SymscopeResult<Option<SymbolReferences>> {
        let solution = self.store.current().await;
        let doc = Self::document(&solution, document)?;

        let Some(resolved) = self
            .locator
            .resolve_symbol_use(&solution, &doc, offset)
            .await?
        else {
            return Ok(None);
        };
        let symbol = Arc::clone(resolved.symbol());
        let Some(declaration) = DeclarationLocation::classify(&symbol, &doc, &solution) else {
            tracing::debug!("'{}' is declared outside the solution", symbol.name);
            return Ok(None);
        };

        let grouped = self
            .expander
            .find_uses_across_scope(
                &symbol,
                &declaration,
                resolved.file_check.as_ref(),
                &solution,
                cancel,
            )
            .await?;

        let mut uses_by_document: BTreeMap<DocumentId, Vec<SymbolUse>> =
            grouped.into_iter().collect();
        for uses in uses_by_document.values_mut() {
            uses.sort_by(|a, b| a.range.cmp(&b.range));
        }

        Ok(Some(SymbolReferences {
            symbol,
            declaration,
            uses_by_document,
        }))
    }

    async fn change_all_symbol_references(
        &self,
        document: &DocumentId,
        span: TextSpan,
        text_changer: TextChanger,
    ) -> SymscopeResult<Option<RenamePlan>> {
        let solution = self.store.current().await;
        let doc = Self::document(&solution, document)?;
        self.planner
            .plan_rename(&solution, &doc, span, text_changer)
            .await
    }

    async fn commit(
        &self,
        plan: &RenamePlan,
        cancel: &CancellationToken,
    ) -> SymscopeResult<Solution> {
        let mut current = self.store.lock().await;
        let updated = plan.apply(&current, cancel).await?;
        *current = updated.clone();
        Ok(updated)
    }
}
