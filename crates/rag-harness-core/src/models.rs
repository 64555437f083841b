//! Core data models used throughout RAG Harness.
//!
//! These types represent the documents, chunks, stored records, and answers
//! that flow through the ingestion and query pipelines.

use serde::Serialize;

/// Plain text fetched from a URL, ready for splitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Originating URL. Every chunk split from this document carries it.
    pub source: String,
    /// Page title, when the fetcher could find one.
    pub title: Option<String>,
    pub text: String,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            title: None,
            text: text.into(),
        }
    }
}

/// A bounded slice of a document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Random UUID assigned when the chunk is created.
    pub id: String,
    /// Source identifier inherited from the parent [`Document`].
    pub source: String,
    /// Title inherited from the parent [`Document`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Position within the parent document, contiguous from 0.
    pub chunk_index: i64,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

/// A chunk together with its embedding, as written into a vector index.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// A chunk returned by nearest-neighbour retrieval.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub chunk_index: i64,
    pub text: String,
    /// Cosine similarity to the query vector.
    pub score: f64,
}

/// Result of a query: the synthesized answer and the sources it used.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    /// Distinct source identifiers, ordered by the rank of their first
    /// retrieved chunk. Always a subset of the retrieved chunks' sources.
    pub sources: Vec<String>,
    /// The chunks that grounded the answer, best match first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<RetrievedChunk>,
}
