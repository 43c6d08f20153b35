//! Symbol use location within one checked file

use std::sync::Arc;

use super::checker::{FileCheckResults, ProjectOptions, TypeChecker};
use super::options::OptionsProvider;
use super::resolver::PositionResolver;
use crate::error::SymscopeResult;
use crate::models::solution::{Document, Solution};
use crate::models::symbol::{LookupKind, Symbol, SymbolCandidate, SymbolUse};

/// The origin use a cursor resolved to, with the check it came from
#[derive(Clone)]
pub struct ResolvedSymbolUse {
    pub candidate: SymbolCandidate,
    pub symbol_use: SymbolUse,
    pub file_check: Arc<dyn FileCheckResults>,
    pub options: Arc<ProjectOptions>,
}

impl ResolvedSymbolUse {
    pub fn symbol(&self) -> &Arc<Symbol> {
        &self.symbol_use.symbol
    }

    /// Every use of the symbol in the checked file, unfiltered
    pub fn file_uses(&self) -> Vec<SymbolUse> {
        self.file_check.uses_of_symbol_in_file(self.symbol())
    }
}

impl std::fmt::Debug for ResolvedSymbolUse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSymbolUse")
            .field("candidate", &self.candidate)
            .field("symbol_use", &self.symbol_use)
            .field("project", &self.options.project_id)
            .finish()
    }
}

#[derive(Clone)]
pub struct SymbolUseLocator {
    resolver: PositionResolver,
    checker: Arc<dyn TypeChecker>,
    options: Arc<dyn OptionsProvider>,
    lookup: LookupKind,
}

impl SymbolUseLocator {
    pub fn new(
        resolver: PositionResolver,
        checker: Arc<dyn TypeChecker>,
        options: Arc<dyn OptionsProvider>,
        lookup: LookupKind,
    ) -> Self {
        Self {
            resolver,
            checker,
            options,
            lookup,
        }
    }

    pub fn resolver(&self) -> &PositionResolver {
        &self.resolver
    }

    /// Resolve the cursor at `offset` to a checked symbol use
    ///
    /// Every missing link (no identifier, no options, unchecked file, nothing
    /// the checker correlates) is `Ok(None)`. Checker faults propagate.
    pub async fn resolve_symbol_use(
        &self,
        solution: &Solution,
        document: &Document,
        offset: usize,
    ) -> SymscopeResult<Option<ResolvedSymbolUse>> {
        let Some(candidate) = self
            .resolver
            .resolve(solution, document, offset, self.lookup)
            .await?
        else {
            return Ok(None);
        };

        let Some((file_check, options)) = self.check_document(solution, document).await? else {
            return Ok(None);
        };

        let Some(symbol_use) = file_check.symbol_use_at_location(
            candidate.line,
            candidate.right_column,
            &candidate.line_text,
            &candidate.island,
        ) else {
            tracing::debug!(
                "'{}' at {}:{} resolves to no symbol",
                candidate.name(),
                candidate.line,
                candidate.right_column
            );
            return Ok(None);
        };

        Ok(Some(ResolvedSymbolUse {
            candidate,
            symbol_use,
            file_check,
            options,
        }))
    }

    /// Check `document` against its project's current options
    pub async fn check_document(
        &self,
        solution: &Solution,
        document: &Document,
    ) -> SymscopeResult<Option<(Arc<dyn FileCheckResults>, Arc<ProjectOptions>)>> {
        let Some((_, options)) = self.options.options_for_document(solution, document).await
        else {
            tracing::debug!("No project options for {}", document.id());
            return Ok(None);
        };

        let check = self
            .checker
            .parse_and_check_file(document.path(), document.version(), document.text(), &options)
            .await?;
        let Some(file_check) = check.results else {
            tracing::debug!("{} was parsed but not checked", document.path().display());
            return Ok(None);
        };
        Ok(Some((file_check, options)))
    }

    /// All uses in `document` of the symbol at `offset`
    pub async fn find_file_uses(
        &self,
        solution: &Solution,
        document: &Document,
        offset: usize,
    ) -> SymscopeResult<Option<Vec<SymbolUse>>> {
        Ok(self
            .resolve_symbol_use(solution, document, offset)
            .await?
            .map(|resolved| resolved.file_uses()))
    }
}
