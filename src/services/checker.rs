//! Type-checking collaborator contracts
//!
//! The engine never checks code itself. It asks a `TypeChecker` for parsed
//! and checked files or projects and queries the results for symbol uses.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CheckError;
use crate::models::solution::ProjectId;
use crate::models::symbol::{Symbol, SymbolUse};

/// One source file as seen by the checker
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub version: u64,
    pub text: Arc<str>,
}

/// Options that affect parsing only
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsingOptions {
    pub source_files: Vec<PathBuf>,
    pub defines: Vec<String>,
}

/// Snapshot of everything the checker needs to check a project
#[derive(Debug, Clone)]
pub struct ProjectOptions {
    pub project_id: ProjectId,
    /// Sources in compilation order
    pub source_files: Vec<SourceFile>,
    pub defines: Vec<String>,
    pub referenced_projects: Vec<Arc<ProjectOptions>>,
    /// Changes whenever any input above changes
    pub stamp: u64,
}

impl ProjectOptions {
    pub fn parsing_options(&self) -> ParsingOptions {
        ParsingOptions {
            source_files: self.source_files.iter().map(|f| f.path.clone()).collect(),
            defines: self.defines.clone(),
        }
    }

    pub fn contains_file(&self, path: &Path) -> bool {
        self.source_files.iter().any(|f| f.path == path)
    }
}

/// A diagnostic produced while parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDiagnostic {
    pub line: u32,
    pub message: String,
}

/// Parse result of a single file
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub path: PathBuf,
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl ParsedFile {
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Semantic results for one checked file
pub trait FileCheckResults: Send + Sync {
    /// The use whose identifier ends at `end_column` on `line`
    ///
    /// `island` is the qualifying path of the identifier, last element being
    /// the identifier itself. Returns `None` when nothing correlates.
    fn symbol_use_at_location(
        &self,
        line: u32,
        end_column: u32,
        line_text: &str,
        island: &[String],
    ) -> Option<SymbolUse>;

    /// Every use of `symbol` in this file, unfiltered
    fn uses_of_symbol_in_file(&self, symbol: &Symbol) -> Vec<SymbolUse>;

    fn all_uses(&self) -> Vec<SymbolUse>;
}

/// Semantic results for a whole project
pub trait ProjectCheckResults: Send + Sync {
    fn uses_of_symbol(&self, symbol: &Symbol) -> Vec<SymbolUse>;
}

#[derive(Clone)]
pub struct FileCheck {
    pub parse: Arc<ParsedFile>,
    /// `None` when checking was not possible, e.g. the file is not part of
    /// the project described by the options
    pub results: Option<Arc<dyn FileCheckResults>>,
}

impl std::fmt::Debug for FileCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCheck")
            .field("parse", &self.parse)
            .field("checked", &self.results.is_some())
            .finish()
    }
}

#[async_trait]
pub trait TypeChecker: Send + Sync {
    async fn parse_and_check_file(
        &self,
        path: &Path,
        version: u64,
        text: &str,
        options: &ProjectOptions,
    ) -> Result<FileCheck, CheckError>;

    async fn parse_and_check_project(
        &self,
        options: &ProjectOptions,
    ) -> Result<Arc<dyn ProjectCheckResults>, CheckError>;
}
