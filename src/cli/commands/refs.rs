//! Refs command - every use of the symbol at a position

use anyhow::Result;
use clap::{Args, ValueEnum};
use serde::Serialize;

use super::{cancel_on_ctrl_c, locate};
use crate::app::App;
use crate::cli::output::OutputContext;
use crate::cli::response::{ReferenceOutput, SymbolOutput};
use crate::models::symbol::{DeclarationLocation, SymbolUse};
use crate::services::references::ReferenceService;
use crate::services::scope::dedup_by_range;

#[derive(Args, Debug)]
pub struct RefsArgs {
    /// File path with position (file:line:column)
    pub location: String,

    /// Search the current file only, or every project that can see the symbol
    #[arg(long, value_enum, default_value_t = SearchScope::Solution)]
    pub scope: SearchScope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SearchScope {
    File,
    Solution,
}

#[derive(Serialize)]
struct RefsResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    symbol: Option<SymbolOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    declaration: Option<DeclarationLocation>,
    count: usize,
    references: Vec<ReferenceOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl RefsResponse {
    fn no_symbol() -> Self {
        Self {
            symbol: None,
            declaration: None,
            count: 0,
            references: vec![],
            message: Some("No symbol at this position".to_string()),
        }
    }

    /// Uses sharing a range (a type annotation is both a use and a type use) count once
    fn in_file(uses: Vec<SymbolUse>, ctx: &OutputContext) -> Self {
        let uses = dedup_by_range(uses);
        Self {
            symbol: uses
                .first()
                .map(|u| SymbolOutput::from_symbol(&u.symbol, ctx)),
            declaration: None,
            count: uses.len(),
            references: uses
                .iter()
                .map(|u| ReferenceOutput::from_use(u, ctx))
                .collect(),
            message: None,
        }
    }
}

pub async fn execute(args: RefsArgs, app: &App) -> Result<()> {
    let ctx = &app.output;
    let (_, service) = app.reference_service().await?;
    let (document, offset) = locate(&service, &args.location).await?;

    let response = match args.scope {
        SearchScope::File => {
            match service
                .symbol_uses_at_location_in_document(&document, offset)
                .await?
            {
                Some(uses) => RefsResponse::in_file(uses, ctx),
                None => RefsResponse::no_symbol(),
            }
        }
        SearchScope::Solution => {
            let cancel = cancel_on_ctrl_c();
            match service
                .symbol_uses_in_solution(&document, offset, &cancel)
                .await?
            {
                Some(refs) => RefsResponse {
                    symbol: Some(SymbolOutput::from_symbol(&refs.symbol, ctx)),
                    count: refs.use_count(),
                    references: refs
                        .uses_by_document
                        .values()
                        .flatten()
                        .map(|u| ReferenceOutput::from_use(u, ctx))
                        .collect(),
                    declaration: Some(refs.declaration),
                    message: None,
                },
                None => RefsResponse::no_symbol(),
            }
        }
    };

    ctx.print_success_flat(response);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use super::*;
    use crate::models::symbol::{OccurrenceKind, Symbol, SymbolId, SymbolKind};
    use crate::models::text::{Range, SourceRange};

    #[test]
    fn test_file_refs_count_annotation_once() {
        let ctx = OutputContext::new(PathBuf::from("/p"));
        let symbol = Arc::new(Symbol::new(SymbolId(7), "Point", SymbolKind::Type));
        let at = |line, start, end| SourceRange::new("/p/a.ml", Range::on_line(line, start, end));
        let uses = vec![
            SymbolUse::new(Arc::clone(&symbol), at(0, 5, 10), OccurrenceKind::Definition),
            SymbolUse::new(Arc::clone(&symbol), at(1, 15, 20), OccurrenceKind::Use),
            SymbolUse::new(Arc::clone(&symbol), at(1, 15, 20), OccurrenceKind::InType),
        ];

        let response = RefsResponse::in_file(uses, &ctx);
        assert_eq!(response.count, 2);
        assert_eq!(response.references.len(), 2);
        assert_eq!(response.references[1].kind, OccurrenceKind::Use.to_string());
        assert_eq!(response.symbol.map(|s| s.name), Some("Point".to_string()));
    }
}
