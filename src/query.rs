//! Retrieve-then-generate question answering.

use rag_harness_core::embedding::embed_query;
use rag_harness_core::models::Answer;
use rag_harness_core::prompt::{attribute_sources, build_prompt, parse_response};
use rag_harness_core::{RagError, RagResult};

use crate::session::{check_model, Session};

/// Answer `question` from the session's collection.
///
/// Returns [`RagError::NotInitialized`] until an ingestion has completed in
/// this session or [`Session::attach`] succeeded. The returned sources are
/// always sources of retrieved chunks.
pub async fn answer(session: &Session, question: &str) -> RagResult<Answer> {
    let question = question.trim();
    if question.is_empty() {
        return Err(RagError::InvalidInput("question is empty".to_string()));
    }

    let _guard = session.read_guard().await;
    if !session.is_ready() {
        return Err(RagError::NotInitialized);
    }

    let index = session.index().await?;
    let embedder = session.embedder().await?;
    let info = index
        .describe()
        .await
        .map_err(RagError::index)?
        .filter(|info| info.completed)
        .ok_or(RagError::NotInitialized)?;
    check_model(&info, embedder.as_ref())?;
    let generator = session.generator().await?;

    let query_vec = embed_query(embedder.as_ref(), question)
        .await
        .map_err(RagError::embedding)?;
    let context = index
        .nearest(&query_vec, session.config().retrieval.top_k)
        .await
        .map_err(RagError::index)?;
    tracing::debug!(hits = context.len(), "retrieved context");

    let prompt = build_prompt(question, &context);
    let raw = generator
        .generate(&prompt)
        .await
        .map_err(RagError::generation)?;

    let parsed = parse_response(&raw);
    let sources = attribute_sources(&parsed.sources, &context);
    if sources.len() < parsed.sources.len() {
        tracing::debug!(
            claimed = parsed.sources.len(),
            kept = sources.len(),
            "dropped sources that were not retrieved"
        );
    }

    Ok(Answer {
        text: parsed.answer,
        sources,
        context,
    })
}
