//! Global Configuration Singleton

use std::sync::OnceLock;
use std::time::Duration;

use crate::models::config::{ApplyStrategy, SymscopeConfig};
use crate::models::symbol::LookupKind;

static CONFIG: OnceLock<RuntimeConfig> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub max_concurrent_projects: usize,
    pub lookup: LookupKind,
    pub strategy: ApplyStrategy,
    pub cache_ttl: Duration,
    pub max_cached_files: usize,
    pub max_file_size_bytes: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from(&SymscopeConfig::default())
    }
}

impl From<&SymscopeConfig> for RuntimeConfig {
    fn from(config: &SymscopeConfig) -> Self {
        Self {
            // A zero bound would never poll any search
            max_concurrent_projects: config.search.max_concurrent_projects.max(1),
            lookup: config.search.lookup,
            strategy: config.rename.strategy,
            cache_ttl: Duration::from_secs(config.check.cache_ttl_secs),
            max_cached_files: config.check.max_cached_files,
            max_file_size_bytes: config.check.max_file_size_bytes(),
        }
    }
}

pub fn init(config: &SymscopeConfig) {
    let _ = CONFIG.set(RuntimeConfig::from(config));
}

pub fn max_concurrent_projects() -> usize {
    config().max_concurrent_projects
}

pub fn lookup_kind() -> LookupKind {
    config().lookup
}

pub fn apply_strategy() -> ApplyStrategy {
    config().strategy
}

pub fn cache_ttl() -> Duration {
    config().cache_ttl
}

pub fn max_cached_files() -> usize {
    config().max_cached_files
}

pub fn max_file_size_bytes() -> u64 {
    config().max_file_size_bytes
}

pub fn is_initialized() -> bool {
    CONFIG.get().is_some()
}

fn config() -> RuntimeConfig {
    CONFIG.get().cloned().unwrap_or_default()
}
