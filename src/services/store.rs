//! Shared current-solution holder

use std::sync::Arc;

use tokio::sync::{RwLock, RwLockWriteGuard};

use crate::models::solution::Solution;

/// Holds the current `Solution` snapshot
///
/// Readers clone the snapshot (cheap, structurally shared) and work on it
/// without holding the lock.
#[derive(Debug, Clone, Default)]
pub struct SolutionStore {
    current: Arc<RwLock<Solution>>,
}

impl SolutionStore {
    pub fn new(solution: Solution) -> Self {
        Self {
            current: Arc::new(RwLock::new(solution)),
        }
    }

    pub async fn current(&self) -> Solution {
        self.current.read().await.clone()
    }

    /// Replace the current snapshot
    pub async fn commit(&self, solution: Solution) {
        let mut current = self.current.write().await;
        tracing::debug!(
            "Solution version {} -> {}",
            current.version(),
            solution.version()
        );
        *current = solution;
    }

    /// Exclusive access for read-modify-write sequences
    pub async fn lock(&self) -> RwLockWriteGuard<'_, Solution> {
        self.current.write().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures;

    #[tokio::test]
    async fn test_commit_replaces_snapshot() {
        let store = SolutionStore::new(fixtures::single_file("let a = 1"));
        let before = store.current().await;
        let doc = fixtures::document(&before, fixtures::MAIN_PATH);

        let edited = before.with_document_text(doc.id(), "let b = 1").unwrap();
        store.commit(edited).await;

        let after = store.current().await;
        assert_eq!(after.version(), before.version() + 1);
        assert_eq!(fixtures::document(&after, fixtures::MAIN_PATH).text(), "let b = 1");
        assert_eq!(doc.text(), "let a = 1");
    }
}
