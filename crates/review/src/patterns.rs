//! Learned-pattern store.

use crate::error::{ReviewError, Result};
use datagate_core::{Decision, IssueSignature, LearnedPattern, Time};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;

/// Format version written by [`PatternStore::export`].
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable copy of the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSnapshot {
    /// Format version
    pub version: u32,

    /// When taken
    pub exported_at: Time,

    /// Patterns ordered by signature
    pub patterns: Vec<LearnedPattern>,
}

/// Reviewer decisions per issue signature, shared by concurrent runs.
#[derive(Debug, Default)]
pub struct PatternStore {
    patterns: RwLock<HashMap<IssueSignature, LearnedPattern>>,
}

impl PatternStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of one pattern.
    pub async fn get(&self, signature: &IssueSignature) -> Option<LearnedPattern> {
        self.patterns.read().await.get(signature).cloned()
    }

    /// Copies of several patterns, for scoring a whole report under one lock.
    pub async fn get_many<'a>(
        &self,
        signatures: impl IntoIterator<Item = &'a IssueSignature>,
    ) -> HashMap<IssueSignature, LearnedPattern> {
        let patterns = self.patterns.read().await;
        signatures
            .into_iter()
            .filter_map(|s| patterns.get(s).map(|p| (s.clone(), p.clone())))
            .collect()
    }

    /// Apply a batch of decisions atomically.
    pub async fn record_all(&self, decisions: &[(IssueSignature, Decision)], now: Time) {
        let mut patterns = self.patterns.write().await;
        for (signature, decision) in decisions {
            patterns
                .entry(signature.clone())
                .or_insert_with(|| LearnedPattern::new(signature.clone(), now))
                .record(*decision, now);
        }
    }

    /// Count a sighting for each signature that already has a pattern.
    /// Unknown signatures stay novel.
    pub async fn observe_all<'a>(&self, signatures: impl IntoIterator<Item = &'a IssueSignature>, now: Time) {
        let mut patterns = self.patterns.write().await;
        for signature in signatures {
            if let Some(pattern) = patterns.get_mut(signature) {
                pattern.observe(now);
            }
        }
    }

    /// Number of patterns.
    pub async fn len(&self) -> usize {
        self.patterns.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.patterns.read().await.is_empty()
    }

    /// Snapshot every pattern.
    pub async fn export(&self, now: Time) -> PatternSnapshot {
        let mut patterns: Vec<LearnedPattern> = self.patterns.read().await.values().cloned().collect();
        patterns.sort_by(|a, b| a.signature.cmp(&b.signature));
        PatternSnapshot {
            version: SNAPSHOT_VERSION,
            exported_at: now,
            patterns,
        }
    }

    /// Load a snapshot, replacing patterns with the same signature.
    /// Returns the number of patterns loaded.
    pub async fn import(&self, snapshot: PatternSnapshot) -> Result<usize> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(ReviewError::UnsupportedSnapshot(snapshot.version));
        }
        let count = snapshot.patterns.len();
        let mut patterns = self.patterns.write().await;
        for pattern in snapshot.patterns {
            patterns.insert(pattern.signature.clone(), pattern);
        }
        info!("Imported {} learned patterns", count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datagate_core::Severity;

    fn sig(rule: &str) -> IssueSignature {
        IssueSignature::new(Some(rule), "field", Severity::Warning)
    }

    #[tokio::test]
    async fn test_record_and_read() {
        let store = PatternStore::new();
        let now = chrono::Utc::now();
        store
            .record_all(&[(sig("a"), Decision::Accepted), (sig("a"), Decision::Rejected), (sig("b"), Decision::Accepted)], now)
            .await;

        let a = store.get(&sig("a")).await.unwrap();
        assert_eq!(a.feedback_count, 2);
        assert_eq!(a.history, vec![Decision::Accepted, Decision::Rejected]);
        assert_eq!(store.len().await, 2);

        let many = store.get_many([&sig("a"), &sig("zzz")]).await;
        assert_eq!(many.len(), 1);
    }

    #[tokio::test]
    async fn test_observe_counts_known_signatures_only() {
        let store = PatternStore::new();
        let now = chrono::Utc::now();
        store.record_all(&[(sig("a"), Decision::Accepted)], now).await;

        store.observe_all([&sig("a"), &sig("new")], now).await;

        let a = store.get(&sig("a")).await.unwrap();
        assert_eq!(a.seen_count, 2);
        assert_eq!(a.feedback_count, 1);
        assert!(store.get(&sig("new")).await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_survives_restart() {
        let store = PatternStore::new();
        let now = chrono::Utc::now();
        store.record_all(&[(sig("b"), Decision::Rejected), (sig("a"), Decision::Accepted)], now).await;

        let json = serde_json::to_string(&store.export(now).await).unwrap();
        let snapshot: PatternSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot.patterns[0].signature, sig("a"));

        let restored = PatternStore::new();
        assert_eq!(restored.import(snapshot).await.unwrap(), 2);
        assert_eq!(restored.get(&sig("b")).await.unwrap().history, vec![Decision::Rejected]);
    }

    #[tokio::test]
    async fn test_import_rejects_unknown_version() {
        let snapshot = PatternSnapshot {
            version: 99,
            exported_at: chrono::Utc::now(),
            patterns: Vec::new(),
        };
        assert_eq!(PatternStore::new().import(snapshot).await, Err(ReviewError::UnsupportedSnapshot(99)));
    }
}
