//! Data models for Symscope
//!
//! Contains core type definitions used throughout the application.

pub mod config;
pub mod solution;
pub mod symbol;
pub mod text;

// Re-export commonly used types
pub use config::{ApplyStrategy, SymscopeConfig};
pub use solution::{Document, DocumentId, Project, ProjectConfig, ProjectId, Solution};
pub use symbol::{
    Accessibility, CandidateKind, DeclarationLocation, LookupKind, OccurrenceKind, Symbol,
    SymbolCandidate, SymbolId, SymbolKind, SymbolUse,
};
pub use text::{LineIndex, Position, Range, SourceRange, TextSpan};
