//! Configuration model for Symscope

use serde::{Deserialize, Serialize};

use super::symbol::LookupKind;

/// Symscope configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SymscopeConfig {
    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub check: CheckConfig,

    #[serde(default)]
    pub rename: RenameConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Reference search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Upper bound on project searches running at once
    #[serde(default = "defaults::max_concurrent_projects")]
    pub max_concurrent_projects: usize,

    #[serde(default)]
    pub lookup: LookupKind,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_projects: defaults::max_concurrent_projects(),
            lookup: LookupKind::default(),
        }
    }
}

/// Checker cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    #[serde(default = "defaults::cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "defaults::max_cached_files")]
    pub max_cached_files: usize,

    #[serde(default = "defaults::max_file_size_mb")]
    pub max_file_size_mb: u32,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: defaults::cache_ttl_secs(),
            max_cached_files: defaults::max_cached_files(),
            max_file_size_mb: defaults::max_file_size_mb(),
        }
    }
}

impl CheckConfig {
    pub fn max_file_size_bytes(&self) -> u64 {
        if self.max_file_size_mb == 0 {
            u64::MAX
        } else {
            u64::from(self.max_file_size_mb) * 1024 * 1024
        }
    }
}

/// How rename edits are written into a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApplyStrategy {
    /// Compute every span against the document's starting text, apply once
    #[default]
    Batched,
    /// Replace one occurrence at a time against the running text
    Sequential,
}

impl std::str::FromStr for ApplyStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "batched" => Ok(Self::Batched),
            "sequential" => Ok(Self::Sequential),
            other => Err(format!("unknown rename strategy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RenameConfig {
    #[serde(default)]
    pub strategy: ApplyStrategy,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "defaults::format")]
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: defaults::format(),
        }
    }
}

mod defaults {
    // Search
    pub fn max_concurrent_projects() -> usize {
        8
    }

    // Check
    pub fn cache_ttl_secs() -> u64 {
        300
    }
    pub fn max_cached_files() -> usize {
        1000
    }
    pub fn max_file_size_mb() -> u32 {
        5
    }

    // Output
    pub fn format() -> String {
        "json".to_string()
    }
}
