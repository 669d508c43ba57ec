use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::fragment::TranscriptFragment;

#[derive(Default)]
struct Inner {
    /// Kept ordered by `timestamp_ms` at insertion time, so reads never sort.
    fragments: Vec<TranscriptFragment>,
    frozen: bool,
}

/// Orders transcript fragments into one logical transcript.
///
/// Fragments arrive out of order because per-chunk transcription calls
/// complete out of order; insertion is by each fragment's own timestamp,
/// which makes `canonical_transcript` invariant to arrival order. Only
/// final fragments contribute to the canonical join; interim ones stay in
/// the live view but are never part of what gets persisted or analyzed.
///
/// Cheap to clone; all clones share the same underlying sequence.
#[derive(Clone, Default)]
pub struct TranscriptAccumulator {
    inner: Arc<Mutex<Inner>>,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fragment at its timestamp position.
    ///
    /// After [`freeze`](Self::freeze), appends are logged and discarded:
    /// results straggling in once finalization has snapshotted the
    /// transcript must never mutate what was persisted.
    pub async fn append(&self, fragment: TranscriptFragment) {
        let mut inner = self.inner.lock().await;

        if inner.frozen {
            info!(
                "Discarding straggler fragment at {} ms (accumulator frozen)",
                fragment.timestamp_ms
            );
            return;
        }

        let at = inner
            .fragments
            .partition_point(|f| f.timestamp_ms <= fragment.timestamp_ms);
        debug!(
            "Fragment appended at {} ms (final={}, {} chars)",
            fragment.timestamp_ms,
            fragment.is_final,
            fragment.text.len()
        );
        inner.fragments.insert(at, fragment);
    }

    /// The authoritative transcript: all final fragments in timestamp order,
    /// joined with single spaces. Consistent with every append that
    /// completed before this read started.
    pub async fn canonical_transcript(&self) -> String {
        let inner = self.inner.lock().await;
        inner
            .fragments
            .iter()
            .filter(|f| f.is_final && !f.is_empty())
            .map(|f| f.text.trim())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Live read-only view of every fragment, interim ones included.
    pub async fn fragments(&self) -> Vec<TranscriptFragment> {
        self.inner.lock().await.fragments.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.fragments.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.fragments.is_empty()
    }

    pub async fn final_count(&self) -> usize {
        self.inner
            .lock()
            .await
            .fragments
            .iter()
            .filter(|f| f.is_final)
            .count()
    }

    /// Stop accepting fragments. Called right before finalization takes its
    /// one canonical snapshot.
    pub async fn freeze(&self) {
        self.inner.lock().await.frozen = true;
    }
}
