//! SQLite-backed [`VectorIndex`].
//!
//! One database file holds any number of named collections. Vectors are
//! stored as little-endian f32 BLOBs and searched by brute-force cosine
//! similarity in Rust, which is plenty for the handful of pages a
//! collection is built from.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use rag_harness_core::embedding::{blob_to_vec, vec_to_blob};
use rag_harness_core::models::{RetrievedChunk, VectorRecord};
use rag_harness_core::store::{rank_by_similarity, CollectionInfo, VectorIndex};

use crate::config::Config;
use crate::db;
use crate::migrate;

pub struct SqliteIndex {
    pool: SqlitePool,
    collection: String,
}

impl SqliteIndex {
    /// Connect to the configured index database and ensure its schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::run_migrations(&pool)
            .await
            .context("Failed to create index schema")?;
        Ok(Self::with_pool(pool, &config.index.collection))
    }

    pub fn with_pool(pool: SqlitePool, collection: &str) -> Self {
        Self {
            pool,
            collection: collection.to_string(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn declared_dims(&self) -> Result<Option<usize>> {
        let dims: Option<i64> =
            sqlx::query_scalar("SELECT dims FROM collections WHERE name = ?")
                .bind(&self.collection)
                .fetch_optional(&self.pool)
                .await?;
        Ok(dims.map(|d| d as usize))
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn reset(&self, embedding_model: &str, dims: usize) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM records WHERE collection = ?")
            .bind(&self.collection)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO collections (name, embedding_model, dims, completed, updated_at)
            VALUES (?, ?, ?, 0, ?)
            ON CONFLICT(name) DO UPDATE SET
                embedding_model = excluded.embedding_model,
                dims = excluded.dims,
                completed = 0,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.collection)
        .bind(embedding_model)
        .bind(dims as i64)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn insert(&self, records: &[VectorRecord]) -> Result<()> {
        let dims = self.declared_dims().await?.ok_or_else(|| {
            anyhow!(
                "collection '{}' does not exist; reset it first",
                self.collection
            )
        })?;

        for record in records {
            if record.embedding.len() != dims {
                bail!(
                    "vector for chunk {} has {} dims, collection expects {}",
                    record.chunk.id,
                    record.embedding.len(),
                    dims
                );
            }
        }

        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                r#"
                INSERT INTO records (id, collection, source, title, chunk_index, text, hash, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&record.chunk.id)
            .bind(&self.collection)
            .bind(&record.chunk.source)
            .bind(&record.chunk.title)
            .bind(record.chunk.chunk_index)
            .bind(&record.chunk.text)
            .bind(&record.chunk.hash)
            .bind(vec_to_blob(&record.embedding))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn mark_complete(&self) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let updated = sqlx::query(
            "UPDATE collections SET completed = 1, updated_at = ? WHERE name = ?",
        )
        .bind(now)
        .bind(&self.collection)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            bail!("collection '{}' does not exist", self.collection);
        }
        Ok(())
    }

    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT id, source, title, chunk_index, text, embedding
            FROM records
            WHERE collection = ?
            "#,
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await?;

        let candidates = rows.iter().map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            (
                RetrievedChunk {
                    chunk_id: row.get("id"),
                    source: row.get("source"),
                    title: row.get("title"),
                    chunk_index: row.get("chunk_index"),
                    text: row.get("text"),
                    score: 0.0,
                },
                blob_to_vec(&blob),
            )
        });

        Ok(rank_by_similarity(query, candidates, k))
    }

    async fn describe(&self) -> Result<Option<CollectionInfo>> {
        let row = sqlx::query(
            r#"
            SELECT c.embedding_model, c.dims, c.completed,
                   (SELECT COUNT(*) FROM records r WHERE r.collection = c.name) AS records
            FROM collections c
            WHERE c.name = ?
            "#,
        )
        .bind(&self.collection)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let dims: i64 = row.get("dims");
            let records: i64 = row.get("records");
            let completed: i64 = row.get("completed");
            CollectionInfo {
                name: self.collection.clone(),
                embedding_model: row.get("embedding_model"),
                dims: dims as usize,
                records: records as usize,
                completed: completed != 0,
            }
        }))
    }
}
