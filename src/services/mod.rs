//! Service layer for Symscope

pub mod check_cache;
pub mod checker;
pub mod config;
pub mod locator;
pub mod options;
pub mod references;
pub mod rename;
pub mod resolver;
pub mod scope;
pub mod store;

#[cfg(test)]
mod fixtures;

pub use check_cache::{CacheStats, CachingChecker};
pub use checker::{FileCheck, FileCheckResults, ProjectCheckResults, TypeChecker};
pub use config::{ConfigService, DefaultConfigService};
pub use locator::{ResolvedSymbolUse, SymbolUseLocator};
pub use options::{OptionsProvider, SolutionOptionsProvider};
pub use references::{DefaultReferenceService, ReferenceService, SymbolReferences, TextChanger};
pub use rename::{RenamePlan, RenamePlanner};
pub use resolver::PositionResolver;
pub use scope::ScopeExpander;
pub use store::SolutionStore;
