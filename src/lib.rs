//! # RAG Harness
//!
//! Ingest a handful of web pages and answer questions about them with cited
//! sources.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌────────────┐
//! │  Fetch   │──▶│ Split+Embed  │──▶│   SQLite    │
//! │ URL→text │   │   (ingest)   │   │ collection  │
//! └──────────┘   └──────────────┘   └─────┬──────┘
//!                                         │ top-k
//!                   ┌─────────────────────┘
//!                   ▼
//!             ┌───────────┐   ┌───────────┐
//!             │  Prompt   │──▶│    LLM    │──▶ answer + sources
//!             │ (query)   │   │           │
//!             └───────────┘   └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rag init
//! rag ingest --url https://example.com/rates --url https://example.com/fed
//! rag ask "What was the 30-year fixed mortgage rate and on what date?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`session`] | Create-once capability handles and the ingest/query lock |
//! | [`ingest`] | Fetch → split → embed → store |
//! | [`query`] | Embed → retrieve → prompt → answer |
//! | [`progress`] | Ingestion status events and reporters |
//! | [`fetch`] | HTTP fetcher and HTML text extraction |
//! | [`embedding`] | Embedding providers |
//! | [`generation`] | Chat-completions generator |
//! | [`sqlite_index`] | Persistent vector index |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod embedding;
pub mod fetch;
pub mod generation;
mod http;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod progress;
pub mod query;
pub mod session;
pub mod sqlite_index;

pub use rag_harness_core::models::{Answer, Chunk, Document, RetrievedChunk};
pub use rag_harness_core::{RagError, RagResult};
