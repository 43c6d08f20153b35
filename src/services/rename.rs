//! Rename planning and deferred multi-document apply

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::checker::FileCheckResults;
use super::locator::SymbolUseLocator;
use super::scope::ScopeExpander;
use crate::error::{SolutionError, SymscopeError, SymscopeResult};
use crate::infra::tokenizer::{self, Tokenizer};
use crate::models::config::ApplyStrategy;
use crate::models::solution::{Document, DocumentId, Solution};
use crate::models::symbol::{DeclarationLocation, Symbol, SymbolUse};
use crate::models::text::{LineIndex, TextSpan};

#[derive(Clone)]
pub struct RenamePlanner {
    locator: SymbolUseLocator,
    expander: ScopeExpander,
    strategy: ApplyStrategy,
}

impl RenamePlanner {
    pub fn new(locator: SymbolUseLocator, expander: ScopeExpander, strategy: ApplyStrategy) -> Self {
        Self {
            locator,
            expander,
            strategy,
        }
    }

    /// Plan renaming the symbol covered by `span`
    ///
    /// `text_changer` runs once, now, on the text under `span`. Returns
    /// `Ok(None)` when the span is empty or blank, nothing resolves there, or
    /// the symbol is declared outside the solution.
    pub async fn plan_rename<F>(
        &self,
        solution: &Solution,
        document: &Document,
        span: TextSpan,
        text_changer: F,
    ) -> SymscopeResult<Option<RenamePlan>>
    where
        F: FnOnce(&str) -> String,
    {
        if span.is_empty() {
            return Ok(None);
        }
        let original_text = document
            .span_text(span)
            .ok_or(SolutionError::InvalidSpan {
                start: span.start,
                end: span.end(),
                length: document.text().len(),
            })?;
        if original_text.trim().is_empty() {
            return Ok(None);
        }

        let tokenizer = Arc::clone(self.locator.resolver().tokenizer());
        let target = tokenizer.fixup_span(document.text(), span);
        let Some(resolved) = self
            .locator
            .resolve_symbol_use(solution, document, target.start)
            .await?
        else {
            return Ok(None);
        };

        let symbol = Arc::clone(resolved.symbol());
        let Some(declaration) = DeclarationLocation::classify(&symbol, document, solution) else {
            tracing::debug!("'{}' is declared outside the solution", symbol.name);
            return Ok(None);
        };

        let new_text = text_changer(original_text);
        tracing::debug!(
            "Planned rename of '{}' to '{}' ({:?})",
            original_text,
            new_text,
            declaration
        );

        Ok(Some(RenamePlan {
            document: document.id().clone(),
            version: document.version(),
            planned_text: document.shared_text(),
            span,
            original_text: original_text.to_string(),
            new_text,
            symbol,
            declaration,
            file_check: resolved.file_check,
            locator: self.locator.clone(),
            expander: self.expander.clone(),
            tokenizer,
            strategy: self.strategy,
        }))
    }
}

/// A rename computed at one position, applied solution-wide on demand
///
/// The plan keeps identifiers and the origin check only. `apply` works on
/// whatever solution the caller passes, so edits made after planning are
/// seen: an origin document that changed since planning is checked again,
/// and a span whose current text is not the symbol's name is left alone.
/// It is meant to be applied once, by one caller.
#[derive(Clone)]
pub struct RenamePlan {
    document: DocumentId,
    version: u64,
    planned_text: Arc<str>,
    span: TextSpan,
    original_text: String,
    new_text: String,
    symbol: Arc<Symbol>,
    declaration: DeclarationLocation,
    file_check: Arc<dyn FileCheckResults>,
    locator: SymbolUseLocator,
    expander: ScopeExpander,
    tokenizer: Arc<dyn Tokenizer>,
    strategy: ApplyStrategy,
}

impl RenamePlan {
    pub fn document(&self) -> &DocumentId {
        &self.document
    }

    pub fn span(&self) -> TextSpan {
        self.span
    }

    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn new_text(&self) -> &str {
        &self.new_text
    }

    pub fn symbol(&self) -> &Arc<Symbol> {
        &self.symbol
    }

    pub fn declaration(&self) -> &DeclarationLocation {
        &self.declaration
    }

    pub fn strategy(&self) -> ApplyStrategy {
        self.strategy
    }

    pub fn with_strategy(mut self, strategy: ApplyStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Occurrences the plan would rewrite in `current`
    pub async fn locations(
        &self,
        current: &Solution,
        cancel: &CancellationToken,
    ) -> SymscopeResult<HashMap<DocumentId, Vec<SymbolUse>>> {
        if cancel.is_cancelled() {
            return Err(SymscopeError::Cancelled);
        }

        let file_check = match self.declaration {
            DeclarationLocation::CurrentDocumentOnly => match self.origin_check(current).await? {
                Some(check) => check,
                None => {
                    tracing::debug!("{} can no longer be checked", self.document);
                    return Ok(HashMap::new());
                }
            },
            DeclarationLocation::VisibleInProjects { .. } => Arc::clone(&self.file_check),
        };

        self.expander
            .find_uses_across_scope(
                &self.symbol,
                &self.declaration,
                file_check.as_ref(),
                current,
                cancel,
            )
            .await
    }

    /// Check of the origin document as it stands in `current`
    async fn origin_check(
        &self,
        current: &Solution,
    ) -> SymscopeResult<Option<Arc<dyn FileCheckResults>>> {
        let Some(document) = current.document(&self.document) else {
            return Ok(None);
        };
        if document.version() == self.version && document.text() == &*self.planned_text {
            return Ok(Some(Arc::clone(&self.file_check)));
        }

        tracing::debug!("{} changed since planning, checking again", self.document);
        Ok(self
            .locator
            .check_document(current, document)
            .await?
            .map(|(check, _)| check))
    }

    /// Whether `span` of `text` still names the planned symbol
    fn names_symbol(&self, text: &str, span: TextSpan) -> bool {
        span.slice(text)
            .is_some_and(|s| tokenizer::unquote(s) == self.symbol.name)
    }

    /// Rewrite every occurrence in `current`, returning the edited solution
    pub async fn apply(
        &self,
        current: &Solution,
        cancel: &CancellationToken,
    ) -> SymscopeResult<Solution> {
        let uses_by_document = self.locations(current, cancel).await?;

        let mut ids: Vec<&DocumentId> = uses_by_document.keys().collect();
        ids.sort();

        let mut solution = current.clone();
        let mut changed = 0;
        for id in ids {
            if cancel.is_cancelled() {
                return Err(SymscopeError::Cancelled);
            }
            let Some(document) = solution.document(id) else {
                tracing::debug!("{} vanished before apply", id);
                continue;
            };
            let uses = &uses_by_document[id];
            let text = match self.strategy {
                ApplyStrategy::Batched => self.rewrite_batched(document.text(), uses),
                ApplyStrategy::Sequential => self.rewrite_sequential(document.text(), uses),
            };
            if text != document.text() {
                solution = solution.with_document_text(id, text)?;
                changed += 1;
            }
        }

        tracing::info!(
            "Renamed '{}' to '{}' in {} documents",
            self.original_text,
            self.new_text,
            changed
        );
        Ok(solution)
    }

    /// All spans resolved against `text`, applied back to front
    fn rewrite_batched(&self, text: &str, uses: &[SymbolUse]) -> String {
        let index = LineIndex::new(text);
        let mut spans: Vec<TextSpan> = uses
            .iter()
            .filter_map(|u| index.range_to_span(&u.range.range))
            .map(|span| self.tokenizer.fixup_span(text, span))
            .filter(|span| {
                let names = !span.is_empty() && self.names_symbol(text, *span);
                if !names {
                    tracing::debug!("Skipping stale span at {}", span.start);
                }
                names
            })
            .collect();
        spans.sort();
        spans.dedup();

        let mut accepted: Vec<TextSpan> = Vec::with_capacity(spans.len());
        for span in spans {
            if accepted.last().is_some_and(|prev| prev.overlaps(&span)) {
                tracing::debug!("Skipping overlapping span at {}", span.start);
                continue;
            }
            accepted.push(span);
        }

        let mut rewritten = text.to_string();
        for span in accepted.iter().rev() {
            rewritten.replace_range(span.start..span.end(), &self.new_text);
        }
        rewritten
    }

    /// Spans applied in enumeration order against the running text
    ///
    /// Each range is mapped onto the already edited text, so a second
    /// occurrence after an edit on the same line lands on shifted columns
    /// and is skipped.
    fn rewrite_sequential(&self, text: &str, uses: &[SymbolUse]) -> String {
        let mut rewritten = text.to_string();
        for symbol_use in uses {
            let Some(span) = LineIndex::new(&rewritten).range_to_span(&symbol_use.range.range)
            else {
                continue;
            };
            let span = self.tokenizer.fixup_span(&rewritten, span);
            if span.is_empty() || !self.names_symbol(&rewritten, span) {
                continue;
            }
            rewritten.replace_range(span.start..span.end(), &self.new_text);
        }
        rewritten
    }
}

impl std::fmt::Debug for RenamePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenamePlan")
            .field("document", &self.document)
            .field("span", &self.span)
            .field("original_text", &self.original_text)
            .field("new_text", &self.new_text)
            .field("declaration", &self.declaration)
            .field("strategy", &self.strategy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::symbol::OccurrenceKind;
    use crate::models::text::{Range, SourceRange};
    use crate::services::fixtures;

    async fn plan(solution: &Solution, path: &str, span: TextSpan) -> Option<RenamePlan> {
        let doc = fixtures::document(solution, path);
        fixtures::planner()
            .plan_rename(solution, &doc, span, |s| format!("{s}2"))
            .await
            .unwrap()
    }

    fn text_of(solution: &Solution, path: &str) -> String {
        fixtures::document(solution, path).text().to_string()
    }

    #[tokio::test]
    async fn test_rename_round_trip() {
        let text = "let x = 1\nlet y = x + 1";
        let solution = fixtures::single_file(text);
        let plan = plan(&solution, fixtures::MAIN_PATH, TextSpan::new(4, 1))
            .await
            .unwrap();
        assert_eq!(plan.original_text(), "x");
        assert_eq!(plan.new_text(), "x2");

        let cancel = CancellationToken::new();
        let locations = plan.locations(&solution, &cancel).await.unwrap();
        let index = LineIndex::new(text);
        let mut offsets: Vec<usize> = locations
            .values()
            .flatten()
            .filter_map(|u| index.range_to_span(&u.range.range))
            .map(|s| s.start)
            .collect();
        offsets.sort();
        assert_eq!(offsets, vec![4, text.rfind('x').unwrap()]);

        let renamed = plan.apply(&solution, &cancel).await.unwrap();
        assert_eq!(
            text_of(&renamed, fixtures::MAIN_PATH),
            "let x2 = 1\nlet y = x2 + 1"
        );
        // The input snapshot is untouched
        assert_eq!(text_of(&solution, fixtures::MAIN_PATH), text);
    }

    #[tokio::test]
    async fn test_empty_or_blank_span_is_not_renameable() {
        let solution = fixtures::single_file("let x = 1\nlet y = x + 1");
        assert!(plan(&solution, fixtures::MAIN_PATH, TextSpan::new(4, 0)).await.is_none());
        assert!(plan(&solution, fixtures::MAIN_PATH, TextSpan::new(3, 1)).await.is_none());
        assert!(plan(&solution, fixtures::MAIN_PATH, TextSpan::new(9, 1)).await.is_none());
    }

    #[tokio::test]
    async fn test_keyword_is_not_renameable() {
        let solution = fixtures::single_file("let x = 1");
        assert!(plan(&solution, fixtures::MAIN_PATH, TextSpan::new(0, 3)).await.is_none());
    }

    #[tokio::test]
    async fn test_text_changer_runs_at_plan_time() {
        let solution = fixtures::single_file("let x = 1");
        let doc = fixtures::document(&solution, fixtures::MAIN_PATH);
        let mut calls = 0;
        let plan = fixtures::planner()
            .plan_rename(&solution, &doc, TextSpan::new(4, 1), |_| {
                calls += 1;
                "renamed".to_string()
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(calls, 1);
        assert_eq!(plan.new_text(), "renamed");
    }

    #[tokio::test]
    async fn test_apply_sees_later_edits() {
        let solution = fixtures::single_file("let x = 1\nlet y = x + 1");
        let plan = plan(&solution, fixtures::MAIN_PATH, TextSpan::new(4, 1))
            .await
            .unwrap();

        let doc = fixtures::document(&solution, fixtures::MAIN_PATH);
        let edited = solution
            .with_document_text(doc.id(), "let x = 1\nlet y = x + 1\nlet z = x * x")
            .unwrap();
        let renamed = plan.apply(&edited, &CancellationToken::new()).await.unwrap();

        assert_eq!(
            text_of(&renamed, fixtures::MAIN_PATH),
            "let x2 = 1\nlet y = x2 + 1\nlet z = x2 * x2"
        );
    }

    #[tokio::test]
    async fn test_apply_after_line_inserted_above_public_symbol() {
        let solution = fixtures::single_file("let x = 1\nlet y = x");
        let plan = plan(&solution, fixtures::MAIN_PATH, TextSpan::new(4, 1))
            .await
            .unwrap();
        assert!(matches!(
            plan.declaration(),
            DeclarationLocation::VisibleInProjects { .. }
        ));

        let doc = fixtures::document(&solution, fixtures::MAIN_PATH);
        let edited = solution
            .with_document_text(doc.id(), "let a = 0\nlet x = 1\nlet y = x")
            .unwrap();
        let renamed = plan.apply(&edited, &CancellationToken::new()).await.unwrap();

        assert_eq!(
            text_of(&renamed, fixtures::MAIN_PATH),
            "let a = 0\nlet x2 = 1\nlet y = x2"
        );
    }

    #[tokio::test]
    async fn test_apply_after_line_inserted_above_private_symbol() {
        let solution = fixtures::single_file("let private x = 1\nlet y = x");
        let plan = plan(&solution, fixtures::MAIN_PATH, TextSpan::new(12, 1))
            .await
            .unwrap();
        assert_eq!(plan.declaration(), &DeclarationLocation::CurrentDocumentOnly);

        let doc = fixtures::document(&solution, fixtures::MAIN_PATH);
        let edited = solution
            .with_document_text(doc.id(), "let a = 0\nlet private x = 1\nlet y = x")
            .unwrap();
        let renamed = plan.apply(&edited, &CancellationToken::new()).await.unwrap();

        assert_eq!(
            text_of(&renamed, fixtures::MAIN_PATH),
            "let a = 0\nlet private x2 = 1\nlet y = x2"
        );
    }

    #[tokio::test]
    async fn test_stale_range_is_not_overwritten() {
        let solution = fixtures::single_file("let x = 1");
        let plan = plan(&solution, fixtures::MAIN_PATH, TextSpan::new(4, 1))
            .await
            .unwrap();
        let stale = SymbolUse::new(
            Arc::clone(plan.symbol()),
            SourceRange::new(fixtures::MAIN_PATH, Range::on_line(0, 0, 3)),
            OccurrenceKind::Use,
        );

        assert_eq!(plan.rewrite_batched("let x = 1", &[stale.clone()]), "let x = 1");
        assert_eq!(plan.rewrite_sequential("let x = 1", &[stale]), "let x = 1");
    }

    #[tokio::test]
    async fn test_span_past_end_is_invalid() {
        let solution = fixtures::single_file("let x = 1");
        let doc = fixtures::document(&solution, fixtures::MAIN_PATH);
        let err = fixtures::planner()
            .plan_rename(&solution, &doc, TextSpan::new(8, 4), |s| s.to_string())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SymscopeError::Solution(SolutionError::InvalidSpan {
                start: 8,
                end: 12,
                length: 9
            })
        ));
    }

    #[tokio::test]
    async fn test_rename_across_projects() {
        let solution = fixtures::solution(vec![
            fixtures::project("Lib", &[], &[("/lib/api.ml", "let fetch n = n\nlet once = fetch 1")]),
            fixtures::project("App", &["Lib"], &[("/app/main.ml", "let run = fetch 2")]),
            fixtures::project("Other", &[], &[("/other/m.ml", "let fetch = 3")]),
        ]);
        let plan = plan(&solution, "/app/main.ml", TextSpan::new(10, 5))
            .await
            .unwrap();
        assert_eq!(
            plan.declaration(),
            &DeclarationLocation::VisibleInProjects {
                projects: vec![crate::models::solution::ProjectId::new("Lib")],
                is_internal: false,
            }
        );

        let renamed = plan.apply(&solution, &CancellationToken::new()).await.unwrap();
        assert_eq!(text_of(&renamed, "/lib/api.ml"), "let fetch2 n = n\nlet once = fetch2 1");
        assert_eq!(text_of(&renamed, "/app/main.ml"), "let run = fetch2 2");
        assert_eq!(text_of(&renamed, "/other/m.ml"), "let fetch = 3");
        assert_eq!(renamed.changed_since(&solution).len(), 2);
    }

    #[tokio::test]
    async fn test_private_symbol_stays_in_document() {
        let solution = fixtures::solution(vec![fixtures::project(
            "P",
            &[],
            &[
                ("/p/a.ml", "let private helper = 1\nlet y = helper"),
                ("/p/b.ml", "let helper = 2"),
            ],
        )]);
        let plan = plan(&solution, "/p/a.ml", TextSpan::new(12, 6)).await.unwrap();
        assert_eq!(plan.declaration(), &DeclarationLocation::CurrentDocumentOnly);

        let renamed = plan.apply(&solution, &CancellationToken::new()).await.unwrap();
        assert_eq!(text_of(&renamed, "/p/a.ml"), "let private helper2 = 1\nlet y = helper2");
        assert_eq!(text_of(&renamed, "/p/b.ml"), "let helper = 2");
    }

    #[tokio::test]
    async fn test_sequential_strategy_miscomputes_same_line_edits() {
        let text = "let x = 1\nlet y = x + x";
        let solution = fixtures::single_file(text);
        let plan = plan(&solution, fixtures::MAIN_PATH, TextSpan::new(4, 1))
            .await
            .unwrap();
        let cancel = CancellationToken::new();

        let batched = plan.apply(&solution, &cancel).await.unwrap();
        assert_eq!(
            text_of(&batched, fixtures::MAIN_PATH),
            "let x2 = 1\nlet y = x2 + x2"
        );

        let sequential = plan
            .clone()
            .with_strategy(ApplyStrategy::Sequential)
            .apply(&solution, &cancel)
            .await
            .unwrap();
        assert_eq!(
            text_of(&sequential, fixtures::MAIN_PATH),
            "let x2 = 1\nlet y = x2 + x"
        );
    }

    #[tokio::test]
    async fn test_cancelled_apply() {
        let solution = fixtures::single_file("let x = 1\nlet y = x");
        let plan = plan(&solution, fixtures::MAIN_PATH, TextSpan::new(4, 1))
            .await
            .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(plan.apply(&solution, &cancel).await.unwrap_err().is_cancelled());
    }
}
