//! # RAG Harness Core
//!
//! Runtime-agnostic logic for RAG Harness: data models, the recursive text
//! splitter, the capability traits the pipelines are written against
//! (embedding, vector index, generation), prompt assembly and answer
//! parsing, and the error taxonomy.
//!
//! This crate contains no tokio, sqlx, or network I/O. Concrete
//! capabilities live in the `rag-harness` app crate.

pub mod embedding;
pub mod error;
pub mod generation;
pub mod models;
pub mod prompt;
pub mod split;
pub mod store;

pub use error::{RagError, RagResult};
