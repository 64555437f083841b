use thiserror::Error;

/// Failure taxonomy of the ingestion and query pipelines.
///
/// Capability traits return `anyhow::Result`; the pipelines convert those
/// into one of these variants so callers can branch on the kind of failure
/// instead of matching on messages.
#[derive(Debug, Error)]
pub enum RagError {
    /// A URL could not be retrieved or parsed. Isolated per URL during ingestion.
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// A query was issued before any ingestion completed in this session.
    #[error("vector index is not initialized; ingest some URLs first")]
    NotInitialized,

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("vector index operation failed: {0}")]
    Index(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RagError {
    /// Wrap a capability error, keeping the whole context chain in the message.
    pub fn embedding(err: anyhow::Error) -> Self {
        Self::Embedding(format!("{:#}", err))
    }

    pub fn index(err: anyhow::Error) -> Self {
        Self::Index(format!("{:#}", err))
    }

    pub fn generation(err: anyhow::Error) -> Self {
        Self::Generation(format!("{:#}", err))
    }

    pub fn config(err: anyhow::Error) -> Self {
        Self::Config(format!("{:#}", err))
    }

    pub fn is_not_initialized(&self) -> bool {
        matches!(self, Self::NotInitialized)
    }
}

pub type RagResult<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_wrapping_keeps_context_chain() {
        let err: anyhow::Result<()> = Err(anyhow::anyhow!("connection refused"));
        let err = err.context("calling /api/embed").unwrap_err();
        let wrapped = RagError::embedding(err);
        let msg = wrapped.to_string();
        assert!(msg.contains("calling /api/embed"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_not_initialized_is_distinguished() {
        assert!(RagError::NotInitialized.is_not_initialized());
        assert!(!RagError::Index("x".into()).is_not_initialized());
    }
}
