//! Error types for Symscope
//!
//! Absence of a symbol at a position is not an error: operations return
//! `Ok(None)` for it. These types cover faults only.

use std::path::PathBuf;

use thiserror::Error;

pub type SymscopeResult<T> = std::result::Result<T, SymscopeError>;

#[derive(Debug, Error)]
pub enum SymscopeError {
    #[error("{0}")]
    Check(#[from] CheckError),

    #[error("{0}")]
    Solution(#[from] SolutionError),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SymscopeError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("Type check failed for {path}: {message}")]
    Failed { path: String, message: String },

    #[error("Source not available to the checker: {0}")]
    SourceUnavailable(String),
}

#[derive(Debug, Error)]
pub enum SolutionError {
    #[error("Duplicate project: {0}")]
    DuplicateProject(String),

    #[error("Project '{project}' references unknown project '{reference}'")]
    UnknownReference { project: String, reference: String },

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("File is not part of the solution: {}", .0.display())]
    FileNotInSolution(PathBuf),

    #[error("Invalid position: offset {offset} is outside the document (length {length})")]
    InvalidPosition { offset: usize, length: usize },

    #[error("Invalid span: {start}..{end} runs past the document end (length {length})")]
    InvalidSpan {
        start: usize,
        end: usize,
        length: usize,
    },

    #[error("Invalid position: line {line}, column {column} exceeds file bounds")]
    InvalidLocation { line: u32, column: u32 },

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("File too large ({size_mb}MB > {limit_mb}MB limit): {path}")]
    FileTooLarge {
        path: String,
        size_mb: u64,
        limit_mb: u64,
    },

    #[error("Cannot load binary file: {0}")]
    BinaryFile(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config parse error: {0}")]
    Parse(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
