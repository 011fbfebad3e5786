use crate::chunking::TextChunk;
use crate::providers::{Embedding, VectorRecord, VectorStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
use qdrant_client::qdrant::{
    with_payload_selector, CreateCollectionBuilder, Distance, PointStruct, SearchPoints,
    UpsertPointsBuilder, Value, VectorParams, WithPayloadSelector,
};
use qdrant_client::Qdrant;
use serde_json::json;
use std::collections::HashMap;

pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION: &str = "knowledgeagent";

/// Configuration for Qdrant
#[derive(Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: String,
    pub collection: String,
}

/// Vector store backed by a single Qdrant collection
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
}

impl QdrantStore {
    /// Create a new Qdrant client. No request is made until first use.
    pub fn new(config: QdrantConfig) -> Result<Self> {
        let client = Qdrant::from_url(&config.url)
            .api_key(config.api_key)
            .build()
            .with_context(|| format!("Failed to build Qdrant client for {}", config.url))?;

        Ok(QdrantStore {
            client,
            collection: config.collection,
        })
    }

    /// Check if the collection exists
    pub async fn collection_exists(&self) -> Result<bool> {
        match self.client.collection_info(&self.collection).await {
            Ok(_) => Ok(true),
            Err(qdrant_client::QdrantError::ResponseError { status })
                if status.code() == tonic::Code::NotFound =>
            {
                Ok(false)
            }
            Err(e) => Err(anyhow::anyhow!(
                "Failed to check collection existence: {}",
                e
            )),
        }
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn ensure_collection(&self, dimensions: u64) -> Result<()> {
        if self.collection_exists().await? {
            return Ok(());
        }

        info!(
            "Creating collection {} ({} dimensions)",
            self.collection, dimensions
        );

        let create_collection =
            CreateCollectionBuilder::new(self.collection.clone()).vectors_config(VectorParams {
                size: dimensions,
                distance: Distance::Cosine.into(),
                ..Default::default()
            });

        self.client
            .create_collection(create_collection)
            .await
            .with_context(|| format!("Failed to create collection {}", self.collection))?;

        Ok(())
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        let points = records
            .into_iter()
            .map(|record| {
                let payload = chunk_payload(&record.chunk)?;
                Ok(PointStruct::new(record.id, record.embedding.values, payload))
            })
            .collect::<Result<Vec<PointStruct>>>()?;

        let upsert_request = UpsertPointsBuilder::new(self.collection.clone(), points)
            .wait(true)
            .build();

        self.client
            .upsert_points(upsert_request)
            .await
            .with_context(|| format!("Failed to upsert points in collection {}", self.collection))?;

        Ok(())
    }

    async fn query(&self, vector: Embedding, limit: u64) -> Result<Vec<TextChunk>> {
        let search_request = SearchPoints {
            collection_name: self.collection.clone(),
            vector: vector.values,
            limit,
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(with_payload_selector::SelectorOptions::Enable(true)),
            }),
            ..Default::default()
        };

        let search_response = self
            .client
            .search_points(search_request)
            .await
            .with_context(|| format!("Failed to search collection {}", self.collection))?;

        // Convert search results back to TextChunks
        let chunks = search_response
            .result
            .into_iter()
            .filter_map(|scored_point| chunk_from_payload(&scored_point.payload))
            .collect();

        Ok(chunks)
    }
}

fn chunk_payload(chunk: &TextChunk) -> Result<HashMap<String, Value>> {
    serde_json::from_value(json!({
        "text": chunk.text,
        "document_id": chunk.document_id,
        "start_position": chunk.start_position,
        "chunk_index": chunk.chunk_index,
    }))
    .context("Failed to build point payload")
}

fn chunk_from_payload(payload: &HashMap<String, Value>) -> Option<TextChunk> {
    let text = payload.get("text")?.as_str()?;

    let document_id = payload
        .get("document_id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_default();

    let integer = |key: &str| {
        payload
            .get(key)
            .and_then(|v| v.as_integer())
            .map(|v| v as usize)
            .unwrap_or(0)
    };

    Some(TextChunk {
        text: text.to_string(),
        token_count: crate::chunking::estimate_token_count(text),
        document_id,
        start_position: integer("start_position"),
        chunk_index: integer("chunk_index"),
    })
}
