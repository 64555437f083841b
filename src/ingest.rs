//! Ingestion pipeline orchestration.
//!
//! Replaces the session's collection with the content of a set of URLs:
//! fetch → split → embed → store. Each step is announced to an
//! [`IngestReporter`]; a URL that cannot be fetched is reported and skipped.

use serde::Serialize;

use rag_harness_core::models::VectorRecord;
use rag_harness_core::split::TextSplitter;
use rag_harness_core::{RagError, RagResult};

use crate::progress::{IngestReporter, IngestStatus};
use crate::session::Session;

/// What an ingestion run stored.
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub collection: String,
    pub embedding_model: String,
    /// URLs that produced a document, in request order.
    pub ingested: Vec<String>,
    /// URLs that were reported as [`IngestStatus::FetchFailed`].
    pub failed: Vec<String>,
    pub chunks: usize,
}

/// Replace the session's collection with chunks of `urls`.
///
/// Blank entries are ignored; an empty list is rejected before any step
/// runs. On success the collection holds exactly the chunks of the fetched
/// documents and is marked complete.
pub async fn ingest(
    session: &Session,
    urls: &[String],
    reporter: &dyn IngestReporter,
) -> RagResult<IngestSummary> {
    let urls: Vec<&str> = urls
        .iter()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .collect();
    if urls.is_empty() {
        return Err(RagError::InvalidInput(
            "at least one URL is required".to_string(),
        ));
    }

    let config = session.config();
    let splitter = TextSplitter::new(config.chunking.max_chars, config.chunking.overlap_chars)
        .map_err(RagError::config)?;
    let batch_size = config.embedding.batch_size.max(1);

    let _guard = session.write_guard().await;

    reporter.report(&IngestStatus::Initializing);
    let components = session.components().await?;
    let embedder = components.embedder;
    let index = components.index;

    reporter.report(&IngestStatus::Resetting);
    session.set_ready(false);
    index
        .reset(embedder.model_name(), embedder.dims())
        .await
        .map_err(RagError::index)?;
    tracing::info!(collection = index.collection(), model = embedder.model_name(), "collection reset");

    reporter.report(&IngestStatus::Loading);
    let mut documents = Vec::with_capacity(urls.len());
    let mut ingested = Vec::new();
    let mut failed = Vec::new();
    for url in urls {
        match components.fetcher.fetch(url).await {
            Ok(document) => {
                ingested.push(url.to_string());
                documents.push(document);
            }
            Err(e) => {
                let err = RagError::Fetch {
                    url: url.to_string(),
                    reason: e.to_string(),
                };
                tracing::warn!("{}", err);
                reporter.report(&IngestStatus::FetchFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                });
                failed.push(url.to_string());
            }
        }
    }

    reporter.report(&IngestStatus::Splitting);
    let chunks = splitter.split_documents(&documents);
    tracing::info!(documents = documents.len(), chunks = chunks.len(), "split documents");

    reporter.report(&IngestStatus::Storing);
    for batch in chunks.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed(&texts).await.map_err(RagError::embedding)?;
        if vectors.len() != batch.len() {
            return Err(RagError::Embedding(format!(
                "provider returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != embedder.dims()) {
            return Err(RagError::Embedding(format!(
                "provider returned a {}-dim vector, expected {}",
                bad.len(),
                embedder.dims()
            )));
        }

        let records: Vec<VectorRecord> = batch
            .iter()
            .cloned()
            .zip(vectors)
            .map(|(chunk, embedding)| VectorRecord { chunk, embedding })
            .collect();
        index.insert(&records).await.map_err(RagError::index)?;
    }

    index.mark_complete().await.map_err(RagError::index)?;
    session.set_ready(true);
    reporter.report(&IngestStatus::Done);

    Ok(IngestSummary {
        collection: index.collection().to_string(),
        embedding_model: embedder.model_name().to_string(),
        ingested,
        failed,
        chunks: chunks.len(),
    })
}
