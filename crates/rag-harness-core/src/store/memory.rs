//! In-memory [`VectorIndex`] implementation for tests.
//!
//! Uses a `Vec` behind `std::sync::RwLock`. Search is brute-force cosine
//! similarity over every stored vector.

use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::models::{RetrievedChunk, VectorRecord};

use super::{rank_by_similarity, CollectionInfo, VectorIndex};

struct MemCollection {
    embedding_model: String,
    dims: usize,
    completed: bool,
    records: Vec<VectorRecord>,
}

/// In-memory vector index holding a single collection.
pub struct InMemoryIndex {
    name: String,
    inner: RwLock<Option<MemCollection>>,
}

impl InMemoryIndex {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            name: collection.into(),
            inner: RwLock::new(None),
        }
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory index lock poisoned")
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn collection(&self) -> &str {
        &self.name
    }

    async fn reset(&self, embedding_model: &str, dims: usize) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        *inner = Some(MemCollection {
            embedding_model: embedding_model.to_string(),
            dims,
            completed: false,
            records: Vec::new(),
        });
        Ok(())
    }

    async fn insert(&self, records: &[VectorRecord]) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        let coll = inner
            .as_mut()
            .ok_or_else(|| anyhow!("collection '{}' does not exist; reset it first", self.name))?;
        for record in records {
            if record.embedding.len() != coll.dims {
                bail!(
                    "vector for chunk {} has {} dims, collection expects {}",
                    record.chunk.id,
                    record.embedding.len(),
                    coll.dims
                );
            }
        }
        coll.records.extend_from_slice(records);
        Ok(())
    }

    async fn mark_complete(&self) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        let coll = inner
            .as_mut()
            .ok_or_else(|| anyhow!("collection '{}' does not exist", self.name))?;
        coll.completed = true;
        Ok(())
    }

    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        let inner = self.inner.read().map_err(poisoned)?;
        let Some(coll) = inner.as_ref() else {
            return Ok(Vec::new());
        };
        let candidates = coll.records.iter().map(|r| {
            (
                RetrievedChunk {
                    chunk_id: r.chunk.id.clone(),
                    source: r.chunk.source.clone(),
                    title: r.chunk.title.clone(),
                    chunk_index: r.chunk.chunk_index,
                    text: r.chunk.text.clone(),
                    score: 0.0,
                },
                r.embedding.clone(),
            )
        });
        Ok(rank_by_similarity(query, candidates, k))
    }

    async fn describe(&self) -> Result<Option<CollectionInfo>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.as_ref().map(|coll| CollectionInfo {
            name: self.name.clone(),
            embedding_model: coll.embedding_model.clone(),
            dims: coll.dims,
            records: coll.records.len(),
            completed: coll.completed,
        }))
    }
}
