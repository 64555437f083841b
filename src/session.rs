//! Caller-owned pipeline context.
//!
//! A [`Session`] holds the configuration and the capability handles the
//! pipelines run against. Each handle is built by a [`ComponentFactory`] the
//! first time it is needed and reused for the rest of the session.
//!
//! The session also serializes access to its collection: ingestion takes the
//! write side of an internal lock for its whole reset-then-populate sequence,
//! queries take the read side.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rag_harness_core::embedding::EmbeddingProvider;
use rag_harness_core::generation::Generator;
use rag_harness_core::store::{CollectionInfo, VectorIndex};
use rag_harness_core::{RagError, RagResult};

use crate::config::Config;
use crate::embedding::create_provider;
use crate::fetch::{DocumentFetcher, HttpFetcher};
use crate::generation::create_generator;
use crate::sqlite_index::SqliteIndex;

/// Builds the capability handles for a session.
#[async_trait]
pub trait ComponentFactory: Send + Sync {
    fn generator(&self, config: &Config) -> Result<Arc<dyn Generator>>;
    fn embedder(&self, config: &Config) -> Result<Arc<dyn EmbeddingProvider>>;
    fn fetcher(&self, config: &Config) -> Result<Arc<dyn DocumentFetcher>>;
    async fn open_index(&self, config: &Config) -> Result<Arc<dyn VectorIndex>>;
}

/// Real providers chosen by the configuration, over the SQLite index.
pub struct DefaultComponents;

#[async_trait]
impl ComponentFactory for DefaultComponents {
    fn generator(&self, config: &Config) -> Result<Arc<dyn Generator>> {
        create_generator(&config.generation)
    }

    fn embedder(&self, config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
        create_provider(&config.embedding)
    }

    fn fetcher(&self, config: &Config) -> Result<Arc<dyn DocumentFetcher>> {
        Ok(Arc::new(HttpFetcher::new(&config.fetch)?))
    }

    async fn open_index(&self, config: &Config) -> Result<Arc<dyn VectorIndex>> {
        Ok(Arc::new(SqliteIndex::open(config).await?))
    }
}

/// Every handle an ingestion needs.
#[derive(Clone)]
pub struct Components {
    pub generator: Arc<dyn Generator>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub index: Arc<dyn VectorIndex>,
    pub fetcher: Arc<dyn DocumentFetcher>,
}

pub struct Session {
    config: Config,
    factory: Box<dyn ComponentFactory>,
    generator: OnceCell<Arc<dyn Generator>>,
    embedder: OnceCell<Arc<dyn EmbeddingProvider>>,
    index: OnceCell<Arc<dyn VectorIndex>>,
    fetcher: OnceCell<Arc<dyn DocumentFetcher>>,
    ready: AtomicBool,
    gate: RwLock<()>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self::with_factory(config, DefaultComponents)
    }

    pub fn with_factory(config: Config, factory: impl ComponentFactory + 'static) -> Self {
        Self {
            config,
            factory: Box::new(factory),
            generator: OnceCell::new(),
            embedder: OnceCell::new(),
            index: OnceCell::new(),
            fetcher: OnceCell::new(),
            ready: AtomicBool::new(false),
            gate: RwLock::new(()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether a completed collection is available to queries.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub(crate) fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub(crate) async fn write_guard(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write().await
    }

    pub(crate) async fn read_guard(&self) -> RwLockReadGuard<'_, ()> {
        self.gate.read().await
    }

    pub async fn generator(&self) -> RagResult<Arc<dyn Generator>> {
        self.generator
            .get_or_try_init(|| async {
                tracing::debug!(provider = %self.config.generation.provider, "creating generator");
                self.factory.generator(&self.config).map_err(RagError::config)
            })
            .await
            .cloned()
    }

    pub async fn embedder(&self) -> RagResult<Arc<dyn EmbeddingProvider>> {
        self.embedder
            .get_or_try_init(|| async {
                tracing::debug!(provider = %self.config.embedding.provider, "creating embedder");
                self.factory.embedder(&self.config).map_err(RagError::config)
            })
            .await
            .cloned()
    }

    pub async fn index(&self) -> RagResult<Arc<dyn VectorIndex>> {
        self.index
            .get_or_try_init(|| async {
                tracing::debug!(dir = %self.config.index.dir.display(), "opening vector index");
                self.factory
                    .open_index(&self.config)
                    .await
                    .map_err(RagError::index)
            })
            .await
            .cloned()
    }

    pub async fn fetcher(&self) -> RagResult<Arc<dyn DocumentFetcher>> {
        self.fetcher
            .get_or_try_init(|| async { self.factory.fetcher(&self.config).map_err(RagError::config) })
            .await
            .cloned()
    }

    /// Create any handle not created yet and return them all.
    pub async fn components(&self) -> RagResult<Components> {
        Ok(Components {
            generator: self.generator().await?,
            embedder: self.embedder().await?,
            index: self.index().await?,
            fetcher: self.fetcher().await?,
        })
    }

    /// Summary of the persisted collection, `None` if it was never built.
    pub async fn status(&self) -> RagResult<Option<CollectionInfo>> {
        let index = self.index().await?;
        index.describe().await.map_err(RagError::index)
    }

    /// Use the persisted collection without re-ingesting.
    ///
    /// Fails with [`RagError::NotInitialized`] when the collection is absent
    /// or its last ingestion did not complete, and with [`RagError::Index`]
    /// when it was built with a different embedding model.
    pub async fn attach(&self) -> RagResult<CollectionInfo> {
        let _guard = self.read_guard().await;
        let info = match self.status().await? {
            Some(info) if info.completed => info,
            Some(info) => {
                tracing::warn!(collection = %info.name, "last ingestion did not complete");
                return Err(RagError::NotInitialized);
            }
            None => return Err(RagError::NotInitialized),
        };

        let embedder = self.embedder().await?;
        check_model(&info, embedder.as_ref())?;

        tracing::info!(collection = %info.name, records = info.records, "attached to persisted collection");
        self.set_ready(true);
        Ok(info)
    }
}

/// Refuse a collection whose vectors were produced by another model.
pub fn check_model(info: &CollectionInfo, embedder: &dyn EmbeddingProvider) -> RagResult<()> {
    if info.embedding_model != embedder.model_name() || info.dims != embedder.dims() {
        return Err(RagError::Index(format!(
            "collection '{}' was built with embedding model '{}' ({} dims) but '{}' ({} dims) is configured; re-ingest the URLs",
            info.name,
            info.embedding_model,
            info.dims,
            embedder.model_name(),
            embedder.dims()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_harness_core::generation::Prompt;
    use rag_harness_core::models::Document;
    use rag_harness_core::store::memory::InMemoryIndex;
    use std::sync::atomic::AtomicUsize;

    use crate::fetch::FetchError;

    struct Unit;

    #[async_trait]
    impl Generator for Unit {
        fn model_name(&self) -> &str {
            "unit"
        }
        async fn generate(&self, _prompt: &Prompt) -> Result<String> {
            Ok(String::new())
        }
    }

    #[async_trait]
    impl EmbeddingProvider for Unit {
        fn model_name(&self) -> &str {
            "unit"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    #[async_trait]
    impl DocumentFetcher for Unit {
        async fn fetch(&self, url: &str) -> Result<Document, FetchError> {
            Ok(Document::new(url, "text"))
        }
    }

    struct Counting {
        index: Arc<InMemoryIndex>,
        built: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ComponentFactory for Counting {
        fn generator(&self, _config: &Config) -> Result<Arc<dyn Generator>> {
            self.built.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Unit))
        }
        fn embedder(&self, _config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
            self.built.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Unit))
        }
        fn fetcher(&self, _config: &Config) -> Result<Arc<dyn DocumentFetcher>> {
            self.built.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Unit))
        }
        async fn open_index(&self, _config: &Config) -> Result<Arc<dyn VectorIndex>> {
            self.built.fetch_add(1, Ordering::SeqCst);
            Ok(self.index.clone())
        }
    }

    fn counting() -> (Counting, Arc<AtomicUsize>, Arc<InMemoryIndex>) {
        let index = Arc::new(InMemoryIndex::new("kb"));
        let built = Arc::new(AtomicUsize::new(0));
        (
            Counting {
                index: index.clone(),
                built: built.clone(),
            },
            built,
            index,
        )
    }

    #[tokio::test]
    async fn test_components_are_created_once() {
        let (factory, built, _) = counting();
        let session = Session::with_factory(Config::default(), factory);
        session.components().await.unwrap();
        session.components().await.unwrap();
        session.embedder().await.unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_attach_requires_completed_collection() {
        let (factory, _, index) = counting();
        let session = Session::with_factory(Config::default(), factory);
        assert!(session.attach().await.unwrap_err().is_not_initialized());

        index.reset("unit", 1).await.unwrap();
        assert!(session.attach().await.unwrap_err().is_not_initialized());
        assert!(!session.is_ready());

        index.mark_complete().await.unwrap();
        let info = session.attach().await.unwrap();
        assert_eq!(info.embedding_model, "unit");
        assert!(session.is_ready());
    }

    #[tokio::test]
    async fn test_attach_rejects_other_model() {
        let (factory, _, index) = counting();
        index.reset("someone-else", 1).await.unwrap();
        index.mark_complete().await.unwrap();
        let session = Session::with_factory(Config::default(), factory);
        let err = session.attach().await.unwrap_err();
        assert!(matches!(err, RagError::Index(msg) if msg.contains("someone-else")));
        assert!(!session.is_ready());
    }

    #[tokio::test]
    async fn test_attach_does_not_build_generator() {
        let (factory, built, _) = counting();
        let session = Session::with_factory(Config::default(), factory);
        let _ = session.attach().await;
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }
}
