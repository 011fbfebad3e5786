//! Seams to the hosted collaborators.
//!
//! The workflows only talk to these traits. `GeminiClient` and `QdrantStore`
//! are the hosted implementations; tests substitute in-memory ones.

use crate::chunking::TextChunk;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Representation of a vector embedding
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

/// A chunk ready to be written to the vector store
#[derive(Debug, Clone)]
pub struct VectorRecord {
    /// Deterministic point id (UUID string)
    pub id: String,
    pub embedding: Embedding,
    pub chunk: TextChunk,
}

/// Hosted embedding model
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed document chunks for storage, one embedding per input in order
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Embed a user question for retrieval
    async fn embed_query(&self, text: &str) -> Result<Embedding>;
}

/// Hosted language model
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a response for a fully built prompt
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Hosted vector collection.
///
/// Upsert and query only: nothing in this crate deletes remote vectors.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Name of the collection this store writes to
    fn collection(&self) -> &str;

    /// Create the collection if it does not exist yet
    async fn ensure_collection(&self, dimensions: u64) -> Result<()>;

    /// Insert or overwrite records by id
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()>;

    /// Return up to `limit` chunks closest to `vector`, best first
    async fn query(&self, vector: Embedding, limit: u64) -> Result<Vec<TextChunk>>;
}
