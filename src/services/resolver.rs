//! Position resolution

use std::sync::Arc;

use super::options::OptionsProvider;
use crate::error::{SolutionError, SymscopeResult};
use crate::infra::tokenizer::Tokenizer;
use crate::models::solution::{Document, Solution};
use crate::models::symbol::{LookupKind, SymbolCandidate};

/// Maps a buffer offset to the identifier under it
#[derive(Clone)]
pub struct PositionResolver {
    tokenizer: Arc<dyn Tokenizer>,
    options: Arc<dyn OptionsProvider>,
}

impl PositionResolver {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, options: Arc<dyn OptionsProvider>) -> Self {
        Self { tokenizer, options }
    }

    pub fn tokenizer(&self) -> &Arc<dyn Tokenizer> {
        &self.tokenizer
    }

    /// Candidate at `offset` in `document`
    ///
    /// `offset` is a byte offset that must fall on a char boundary inside the
    /// text. Whitespace, punctuation, comments and inactive regions give
    /// `Ok(None)`.
    pub async fn resolve(
        &self,
        solution: &Solution,
        document: &Document,
        offset: usize,
        lookup: LookupKind,
    ) -> SymscopeResult<Option<SymbolCandidate>> {
        let text = document.text();
        if offset > text.len() || !text.is_char_boundary(offset) {
            return Err(SolutionError::InvalidPosition {
                offset,
                length: text.len(),
            }
            .into());
        }

        let Some((parsing, _)) = self.options.options_for_document(solution, document).await
        else {
            tracing::debug!("No options for {}", document.id());
            return Ok(None);
        };

        let candidate =
            self.tokenizer
                .symbol_at_position(text, offset, &parsing.defines, lookup);
        if candidate.is_none() {
            tracing::debug!("No identifier at {}:{}", document.path().display(), offset);
        }
        Ok(candidate)
    }
}
