//! Symscope - cross-project symbol references and safe rename
//!
//! Resolves the identifier at a cursor, finds every use of the same symbol in
//! the projects that can see it, and plans a rename of all of them.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod infra;
pub mod models;
pub mod services;

pub use error::{SymscopeError, SymscopeResult};
