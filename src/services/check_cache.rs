//! Check result caching with LRU eviction and statistics

use std::collections::HashMap;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::checker::{FileCheck, ProjectCheckResults, ProjectOptions, TypeChecker};
use crate::error::CheckError;
use crate::models::solution::ProjectId;

struct CacheEntry<T> {
    input_hash: u64,
    value: T,
    created_at: Instant,
    last_accessed: Instant,
}

impl<T> CacheEntry<T> {
    fn new(input_hash: u64, value: T) -> Self {
        let now = Instant::now();
        Self {
            input_hash,
            value,
            created_at: now,
            last_accessed: now,
        }
    }

    fn is_valid(&self, input_hash: u64, ttl: Duration) -> bool {
        self.input_hash == input_hash && self.created_at.elapsed() < ttl
    }
}

type FileKey = (ProjectId, PathBuf);

/// `TypeChecker` decorator that memoizes file and project checks
///
/// File checks are keyed by project and path and stay valid while the
/// document version, text and project stamp are unchanged. Project checks
/// are keyed by project and validated by stamp. Repeated identical requests
/// return the same `Arc`s.
pub struct CachingChecker<C> {
    inner: C,
    files: RwLock<HashMap<FileKey, CacheEntry<FileCheck>>>,
    projects: RwLock<HashMap<ProjectId, CacheEntry<Arc<dyn ProjectCheckResults>>>>,
    max_entries: usize,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<C: TypeChecker> CachingChecker<C> {
    pub fn new(inner: C, ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner,
            files: RwLock::new(HashMap::new()),
            projects: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Sized from the runtime configuration
    pub fn from_config(inner: C) -> Self {
        Self::new(
            inner,
            crate::config::cache_ttl(),
            crate::config::max_cached_files(),
        )
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn hit(&self, what: &dyn std::fmt::Display) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("Check cache hit: {}", what);
    }

    fn miss(&self, what: &dyn std::fmt::Display) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("Check cache miss: {}", what);
    }

    /// Drop cached checks of one project
    pub async fn invalidate_project(&self, project: &ProjectId) {
        self.files.write().await.retain(|(p, _), _| p != project);
        self.projects.write().await.remove(project);
    }

    pub async fn clear(&self) {
        self.files.write().await.clear();
        self.projects.write().await.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Remove expired entries
    pub async fn cleanup_expired(&self) -> usize {
        let ttl = self.ttl;
        let mut removed = 0;
        {
            let mut files = self.files.write().await;
            let before = files.len();
            files.retain(|_, entry| entry.created_at.elapsed() < ttl);
            removed += before - files.len();
        }
        let mut projects = self.projects.write().await;
        let before = projects.len();
        projects.retain(|_, entry| entry.created_at.elapsed() < ttl);
        removed + before - projects.len()
    }

    pub async fn stats(&self) -> CacheStats {
        let file_entries = self.files.read().await.len();
        let project_entries = self.projects.read().await.len();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        CacheStats {
            file_entries,
            project_entries,
            hits,
            misses,
            hit_rate: if hits + misses > 0 {
                hits as f64 / (hits + misses) as f64
            } else {
                0.0
            },
        }
    }
}

/// Evict least recently used entry
fn evict_lru<K: Clone + Eq + Hash, T>(entries: &mut HashMap<K, CacheEntry<T>>) {
    if let Some(oldest) = entries
        .iter()
        .min_by_key(|(_, e)| e.last_accessed)
        .map(|(k, _)| k.clone())
    {
        entries.remove(&oldest);
        tracing::trace!("Evicted check cache entry");
    }
}

fn file_input_hash(version: u64, text: &str, stamp: u64) -> u64 {
    crate::infra::hash_content(&format!("{version}:{stamp}:{text}"))
}

#[async_trait]
impl<C: TypeChecker> TypeChecker for CachingChecker<C> {
    async fn parse_and_check_file(
        &self,
        path: &Path,
        version: u64,
        text: &str,
        options: &ProjectOptions,
    ) -> Result<FileCheck, CheckError> {
        let key = (options.project_id.clone(), path.to_path_buf());
        let hash = file_input_hash(version, text, options.stamp);

        {
            let mut files = self.files.write().await;
            if let Some(entry) = files.get_mut(&key)
                && entry.is_valid(hash, self.ttl)
            {
                entry.last_accessed = Instant::now();
                self.hit(&path.display());
                return Ok(entry.value.clone());
            }
        }

        self.miss(&path.display());
        let check = self
            .inner
            .parse_and_check_file(path, version, text, options)
            .await?;

        {
            let mut files = self.files.write().await;
            if files.len() >= self.max_entries && !files.contains_key(&key) {
                evict_lru(&mut files);
            }
            files.insert(key, CacheEntry::new(hash, check.clone()));
        }

        Ok(check)
    }

    async fn parse_and_check_project(
        &self,
        options: &ProjectOptions,
    ) -> Result<Arc<dyn ProjectCheckResults>, CheckError> {
        let key = &options.project_id;

        {
            let mut projects = self.projects.write().await;
            if let Some(entry) = projects.get_mut(key)
                && entry.is_valid(options.stamp, self.ttl)
            {
                entry.last_accessed = Instant::now();
                self.hit(key);
                return Ok(Arc::clone(&entry.value));
            }
        }

        self.miss(key);
        let results = self.inner.parse_and_check_project(options).await?;

        {
            let mut projects = self.projects.write().await;
            if projects.len() >= self.max_entries && !projects.contains_key(key) {
                evict_lru(&mut projects);
            }
            projects.insert(
                key.clone(),
                CacheEntry::new(options.stamp, Arc::clone(&results)),
            );
        }

        Ok(results)
    }
}

#[derive(Debug, Clone)]
pub struct CacheStats {
    pub file_entries: usize,
    pub project_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}
