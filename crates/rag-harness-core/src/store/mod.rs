//! Vector index abstraction for RAG Harness.
//!
//! The [`VectorIndex`] trait defines the storage operations the ingestion
//! and query pipelines need, enabling pluggable backends (SQLite in the app
//! crate, [`memory::InMemoryIndex`] for tests).
//!
//! An index instance is bound to one named collection. The collection
//! records which embedding model built it so that queries embedded with a
//! different model can be refused.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::embedding::cosine_similarity;
use crate::models::{RetrievedChunk, VectorRecord};

/// Summary of a persisted collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    /// Embedding model the collection was built with.
    pub embedding_model: String,
    pub dims: usize,
    pub records: usize,
    /// Whether the ingestion that last reset this collection ran to the end.
    pub completed: bool,
}

/// Abstract vector store bound to a single collection.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`reset`](VectorIndex::reset) | Drop all records and (re)declare the embedding model |
/// | [`insert`](VectorIndex::insert) | Append records to the collection |
/// | [`mark_complete`](VectorIndex::mark_complete) | Flag the collection as fully populated |
/// | [`nearest`](VectorIndex::nearest) | Top-k records by cosine similarity |
/// | [`describe`](VectorIndex::describe) | Collection summary, `None` if it was never created |
///
/// `reset` followed by `insert` is not atomic; callers serialize ingestion.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Name of the collection this index operates on.
    fn collection(&self) -> &str;

    /// Empty the collection, creating it if absent, and record the embedding
    /// model and dimensionality that subsequent inserts must match. Clears
    /// the completion flag.
    async fn reset(&self, embedding_model: &str, dims: usize) -> Result<()>;

    /// Insert records. Fails if the collection was never reset or a vector's
    /// length differs from the declared dimensionality.
    async fn insert(&self, records: &[VectorRecord]) -> Result<()>;

    async fn mark_complete(&self) -> Result<()>;

    /// Return up to `k` records ordered by descending similarity to `query`.
    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>>;

    async fn describe(&self) -> Result<Option<CollectionInfo>>;
}

/// Score and rank candidates by cosine similarity, keeping the top `k`.
///
/// Ties are broken by source and chunk position so results are stable.
pub fn rank_by_similarity<I>(query: &[f32], candidates: I, k: usize) -> Vec<RetrievedChunk>
where
    I: IntoIterator<Item = (RetrievedChunk, Vec<f32>)>,
{
    let mut scored: Vec<RetrievedChunk> = candidates
        .into_iter()
        .map(|(mut chunk, vector)| {
            chunk.score = cosine_similarity(query, &vector) as f64;
            chunk
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.source.cmp(&b.source))
            .then(a.chunk_index.cmp(&b.chunk_index))
    });
    scored.truncate(k);
    scored
}
