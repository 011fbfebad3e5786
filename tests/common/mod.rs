//! In-memory collaborators that count every provider call.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use knowledge_agent::chunking::TextChunk;
use knowledge_agent::config::{Credentials, Settings};
use knowledge_agent::error::ConfigError;
use knowledge_agent::providers::{ChatModel, Embedder, Embedding, VectorRecord, VectorStore};
use knowledge_agent::rag::RagEngine;
use knowledge_agent::session::Connector;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const CANNED_RESPONSE: &str = "X is the thing described in alpha.txt.";

#[derive(Default)]
pub struct MockEmbedder {
    pub document_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
    pub fail: AtomicBool,
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("embedding quota exceeded"));
        }
        Ok(texts
            .iter()
            .map(|text| Embedding {
                values: vec![text.len() as f32, 1.0, 0.5],
            })
            .collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Embedding> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("embedding quota exceeded"));
        }
        Ok(Embedding {
            values: vec![text.len() as f32, 1.0, 0.5],
        })
    }
}

pub struct MockChat {
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl Default for MockChat {
    fn default() -> Self {
        MockChat {
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ChatModel for MockChat {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("deadline exceeded"));
        }
        Ok(CANNED_RESPONSE.to_string())
    }
}

#[derive(Default)]
pub struct MockStore {
    pub ensure_calls: AtomicUsize,
    pub upsert_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
    /// Number of records in each upsert call
    pub upsert_sizes: Mutex<Vec<usize>>,
    pub dimensions: Mutex<Option<u64>>,
    pub points: Mutex<BTreeMap<String, TextChunk>>,
    pub fail_upsert: AtomicBool,
}

#[async_trait]
impl VectorStore for MockStore {
    fn collection(&self) -> &str {
        "knowledgeagent"
    }

    async fn ensure_collection(&self, dimensions: u64) -> Result<()> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        self.dimensions.lock().unwrap().get_or_insert(dimensions);
        Ok(())
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.upsert_sizes.lock().unwrap().push(records.len());
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(anyhow!("unauthorized"));
        }
        let mut points = self.points.lock().unwrap();
        for record in records {
            points.insert(record.id, record.chunk);
        }
        Ok(())
    }

    async fn query(&self, _vector: Embedding, limit: u64) -> Result<Vec<TextChunk>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .points
            .lock()
            .unwrap()
            .values()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

/// One set of mock providers shared by an engine
#[derive(Default)]
pub struct Providers {
    pub embedder: Arc<MockEmbedder>,
    pub chat: Arc<MockChat>,
    pub store: Arc<MockStore>,
}

impl Providers {
    pub fn new() -> Arc<Self> {
        Arc::new(Providers::default())
    }

    pub fn engine(&self, settings: &Settings) -> RagEngine {
        RagEngine::new(
            self.embedder.clone(),
            self.chat.clone(),
            self.store.clone(),
            settings,
        )
    }

    /// Total calls made to any hosted service
    pub fn network_calls(&self) -> usize {
        self.embedder.document_calls.load(Ordering::SeqCst)
            + self.embedder.query_calls.load(Ordering::SeqCst)
            + self.chat.calls.load(Ordering::SeqCst)
            + self.store.ensure_calls.load(Ordering::SeqCst)
            + self.store.upsert_calls.load(Ordering::SeqCst)
            + self.store.query_calls.load(Ordering::SeqCst)
    }
}

/// Connector handing out engines over the same mock providers
pub struct MockConnector {
    pub providers: Arc<Providers>,
    pub settings: Settings,
    pub connects: AtomicUsize,
}

impl MockConnector {
    pub fn new(providers: Arc<Providers>, settings: Settings) -> Arc<Self> {
        Arc::new(MockConnector {
            providers,
            settings,
            connects: AtomicUsize::new(0),
        })
    }
}

impl Connector for MockConnector {
    fn connect(&self, credentials: &Credentials) -> Result<RagEngine, ConfigError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if credentials.gemini_api_key == "revoked" {
            return Err(ConfigError::ClientInit(anyhow!("key revoked")));
        }
        Ok(self.providers.engine(&self.settings))
    }
}

pub fn settings_for(data_dir: &Path) -> Settings {
    Settings {
        data_dir: data_dir.to_path_buf(),
        ..Settings::default()
    }
}

pub fn credentials() -> Credentials {
    Credentials::new("gemini-key", "qdrant-key").unwrap()
}

pub fn write_two_documents(data_dir: &Path) {
    std::fs::create_dir_all(data_dir).unwrap();
    std::fs::write(
        data_dir.join("alpha.txt"),
        "X is a lightweight orchestration layer.",
    )
    .unwrap();
    std::fs::write(
        data_dir.join("beta.txt"),
        "Y stores vectors in a hosted collection.",
    )
    .unwrap();
}
