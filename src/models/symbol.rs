//! Symbol model definitions
//!
//! Semantic symbols as assigned by a checker, their occurrences, and the
//! syntactic candidates extracted from raw text at a cursor position.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::solution::{Document, ProjectId, Solution};
use super::text::{SourceRange, TextSpan};

/// Checker-assigned symbol identity
///
/// Stable across edits that only move a declaration: text inserted above it
/// keeps the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(pub u64);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Value,
    Function,
    Parameter,
    Type,
}

impl SymbolKind {
    pub fn is_type(&self) -> bool {
        matches!(self, Self::Type)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Function)
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Value => "value",
            Self::Function => "function",
            Self::Parameter => "parameter",
            Self::Type => "type",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Accessibility {
    #[default]
    Public,
    Internal,
    Private,
}

/// A semantically resolved program entity
///
/// Equality is by `id` only; the remaining fields describe the symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    #[serde(default)]
    pub accessibility: Accessibility,
    /// Bound inside a function body or parameter list
    #[serde(default)]
    pub is_local: bool,
    /// Where the symbol is declared; `None` for symbols from outside the solution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declaration: Option<SourceRange>,
}

impl Symbol {
    pub fn new(id: SymbolId, name: impl Into<String>, kind: SymbolKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            accessibility: Accessibility::Public,
            is_local: false,
            declaration: None,
        }
    }

    pub fn with_accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = accessibility;
        self
    }

    pub fn with_declaration(mut self, declaration: SourceRange) -> Self {
        self.declaration = Some(declaration);
        self
    }

    pub fn local(mut self) -> Self {
        self.is_local = true;
        self
    }

    /// Not visible outside the declaring file
    pub fn is_private_to_file(&self) -> bool {
        self.is_local || self.accessibility == Accessibility::Private
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

/// Syntactic role of an occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceKind {
    Definition,
    Use,
    InType,
    InAttribute,
    InPattern,
}

impl fmt::Display for OccurrenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Definition => "definition",
            Self::Use => "use",
            Self::InType => "in_type",
            Self::InAttribute => "in_attribute",
            Self::InPattern => "in_pattern",
        };
        f.write_str(s)
    }
}

/// One occurrence of a symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolUse {
    pub symbol: Arc<Symbol>,
    pub range: SourceRange,
    pub kind: OccurrenceKind,
}

impl SymbolUse {
    pub fn new(symbol: Arc<Symbol>, range: SourceRange, kind: OccurrenceKind) -> Self {
        Self {
            symbol,
            range,
            kind,
        }
    }

    pub fn is_definition(&self) -> bool {
        self.kind == OccurrenceKind::Definition
    }
}

/// How the tokenizer picks an identifier at a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LookupKind {
    /// Cursor must be inside the identifier
    Precise,
    /// Cursor may also sit right after the identifier
    #[default]
    Greedy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    Identifier,
    Keyword,
}

/// Identifier found at a cursor position, before semantic resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolCandidate {
    /// Span of the identifier under the cursor
    pub span: TextSpan,
    pub kind: CandidateKind,
    /// 0-indexed line
    pub line: u32,
    pub left_column: u32,
    pub right_column: u32,
    pub line_text: String,
    /// Qualifying path ending with the identifier itself, backticks stripped
    pub island: Vec<String>,
}

impl SymbolCandidate {
    pub fn name(&self) -> &str {
        self.island.last().map(String::as_str).unwrap_or_default()
    }
}

/// Where a symbol can be referenced from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum DeclarationLocation {
    CurrentDocumentOnly,
    VisibleInProjects {
        projects: Vec<ProjectId>,
        is_internal: bool,
    },
}

impl DeclarationLocation {
    /// Classify `symbol` as seen from `document`
    ///
    /// Returns `None` when the declaration lies outside the solution, in which
    /// case there is nothing the solution can rename.
    pub fn classify(symbol: &Symbol, document: &Document, solution: &Solution) -> Option<Self> {
        let declared = symbol.declaration.as_ref()?;

        if symbol.is_private_to_file() && declared.file() == document.path() {
            return Some(Self::CurrentDocumentOnly);
        }

        let projects = solution.projects_containing(declared.file());
        if projects.is_empty() {
            return None;
        }

        Some(Self::VisibleInProjects {
            projects,
            is_internal: symbol.accessibility == Accessibility::Internal,
        })
    }
}
