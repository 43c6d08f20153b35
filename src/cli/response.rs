//! Response types for CLI output
//!
//! Shared by the commands; line and column values are 1-indexed.

use std::path::Path;

use serde::Serialize;

use crate::cli::output::OutputContext;
use crate::models::symbol::{Symbol, SymbolUse};
use crate::models::text::SourceRange;

/// Location in a file (relative path when inside the solution root)
#[derive(Debug, Clone, Serialize)]
pub struct LocationOutput {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl LocationOutput {
    pub fn from_range(range: &SourceRange, ctx: &OutputContext) -> Self {
        let (line, column) = range.start().to_display();
        Self {
            file: ctx.relative_path(range.file()),
            line,
            column,
        }
    }
}

/// One symbol occurrence
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceOutput {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub end_column: u32,
    pub kind: String,
}

impl ReferenceOutput {
    pub fn from_use(symbol_use: &SymbolUse, ctx: &OutputContext) -> Self {
        let (line, column) = symbol_use.range.start().to_display();
        let (_, end_column) = symbol_use.range.end().to_display();
        Self {
            file: ctx.relative_path(symbol_use.range.file()),
            line,
            column,
            end_column,
            kind: symbol_use.kind.to_string(),
        }
    }
}

/// Symbol identity as shown to the user
#[derive(Debug, Clone, Serialize)]
pub struct SymbolOutput {
    pub name: String,
    pub kind: String,
    pub accessibility: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_at: Option<LocationOutput>,
}

impl SymbolOutput {
    pub fn from_symbol(symbol: &Symbol, ctx: &OutputContext) -> Self {
        Self {
            name: symbol.name.clone(),
            kind: symbol.kind.to_string(),
            accessibility: format!("{:?}", symbol.accessibility).to_lowercase(),
            declared_at: symbol
                .declaration
                .as_ref()
                .map(|range| LocationOutput::from_range(range, ctx)),
        }
    }
}

/// Edits planned or written for one file
#[derive(Debug, Clone, Serialize)]
pub struct FileChangeOutput {
    pub file: String,
    pub edit_count: usize,
}

impl FileChangeOutput {
    pub fn new(path: &Path, edit_count: usize, ctx: &OutputContext) -> Self {
        Self {
            file: ctx.relative_path(path),
            edit_count,
        }
    }
}
