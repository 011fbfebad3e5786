use crate::chunking::{split_into_chunks, TextChunk};
use crate::config::Settings;
use crate::document::load_directory;
use crate::error::{ChatError, IngestError};
use crate::providers::{ChatModel, Embedder, VectorRecord, VectorStore};
use log::{error, info};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Reference to a populated vector collection.
///
/// Only [`RagEngine::ingest`] creates one, so holding a handle means at least
/// one ingestion succeeded in this session.
#[derive(Clone)]
pub struct IndexHandle {
    store: Arc<dyn VectorStore>,
    documents: usize,
    chunks: usize,
}

impl IndexHandle {
    pub fn collection(&self) -> &str {
        self.store.collection()
    }

    /// Documents written by the ingestion that produced this handle
    pub fn documents(&self) -> usize {
        self.documents
    }

    /// Chunks written by the ingestion that produced this handle
    pub fn chunks(&self) -> usize {
        self.chunks
    }
}

impl fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexHandle")
            .field("collection", &self.collection())
            .field("documents", &self.documents)
            .field("chunks", &self.chunks)
            .finish()
    }
}

/// RAG (Retrieval-Augmented Generation) engine
#[derive(Clone)]
pub struct RagEngine {
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatModel>,
    store: Arc<dyn VectorStore>,
    chunk_size: usize,
    top_k: u64,
}

impl RagEngine {
    /// Create a new RAG engine
    pub fn new(
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
        store: Arc<dyn VectorStore>,
        settings: &Settings,
    ) -> Self {
        RagEngine {
            embedder,
            chat,
            store,
            chunk_size: settings.chunk_size,
            top_k: settings.top_k,
        }
    }

    /// Load every document below `source_dir`, embed its chunks and upsert
    /// them into the collection.
    ///
    /// Nothing is sent to a provider unless at least one non-empty chunk was
    /// loaded. Upserts are not atomic: if the store fails midway, points that
    /// were already written stay in the collection.
    pub async fn ingest(&self, source_dir: &Path) -> Result<IndexHandle, IngestError> {
        let documents = load_directory(source_dir).map_err(|failure| IngestError::Unreadable {
            path: failure.path,
            source: failure.error,
        })?;

        let chunks: Vec<TextChunk> = documents
            .iter()
            .flat_map(|doc| split_into_chunks(&doc.content, &doc.document_id, self.chunk_size))
            .collect();

        if chunks.is_empty() {
            info!("Nothing to ingest in {}", source_dir.display());
            return Err(IngestError::NoDocuments);
        }

        info!(
            "Split {} documents into {} chunks",
            documents.len(),
            chunks.len()
        );

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = self
            .embedder
            .embed_documents(&texts)
            .await
            .map_err(provider_failure)?;

        if embeddings.len() != chunks.len() {
            return Err(provider_failure(anyhow::anyhow!(
                "Embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let dimensions = embeddings[0].values.len() as u64;
        self.store
            .ensure_collection(dimensions)
            .await
            .map_err(provider_failure)?;

        let collection = self.store.collection().to_string();
        let records: Vec<VectorRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| VectorRecord {
                id: point_id(&collection, &chunk),
                embedding,
                chunk,
            })
            .collect();
        let chunk_count = records.len();

        self.store.upsert(records).await.map_err(provider_failure)?;

        info!(
            "Ingested {} chunks into collection {}",
            chunk_count, collection
        );

        Ok(IndexHandle {
            store: self.store.clone(),
            documents: documents.len(),
            chunks: chunk_count,
        })
    }

    /// Answer `query` from the collection behind `handle`.
    ///
    /// A blank query is [`ChatError::EmptyQuery`] whether or not an index
    /// exists; otherwise a missing handle is [`ChatError::NoIndex`]. Both fail
    /// before any provider call. A provider fault is reported once; there are
    /// no retries.
    pub async fn ask(
        &self,
        query: &str,
        handle: Option<&IndexHandle>,
    ) -> Result<String, ChatError> {
        let question = query.trim();
        if question.is_empty() {
            return Err(ChatError::EmptyQuery);
        }

        let handle = match handle {
            Some(handle) => handle,
            None => return Err(ChatError::NoIndex),
        };

        let question_embedding = self
            .embedder
            .embed_query(question)
            .await
            .map_err(chat_failure)?;

        let chunks = handle
            .store
            .query(question_embedding, self.top_k)
            .await
            .map_err(chat_failure)?;

        info!(
            "Retrieved {} chunks from {}",
            chunks.len(),
            handle.collection()
        );

        let prompt = build_prompt(&chunks, question);
        self.chat.generate(&prompt).await.map_err(chat_failure)
    }
}

/// Stable id so re-ingesting a document overwrites its earlier chunks
fn point_id(collection: &str, chunk: &TextChunk) -> String {
    let name = format!("{}/{}#{}", collection, chunk.document_id, chunk.chunk_index);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

fn provider_failure(cause: anyhow::Error) -> IngestError {
    error!("Ingestion failed: {:#}", cause);
    IngestError::ProviderFailure(cause)
}

fn chat_failure(cause: anyhow::Error) -> ChatError {
    error!("Query failed: {:#}", cause);
    ChatError::ProviderFailure(cause)
}

/// Combine retrieved context and the user's question into one prompt
pub fn build_prompt(chunks: &[TextChunk], question: &str) -> String {
    let context = if chunks.is_empty() {
        "(no matching passages were found in the ingested documents)".to_string()
    } else {
        chunks
            .iter()
            .map(|chunk| format!("[{}]\n{}", chunk.document_id, chunk.text))
            .collect::<Vec<String>>()
            .join("\n\n")
    };

    format!(
        "You are a knowledge agent answering questions about the user's documents. \
         Use only the context below. If the context does not contain the answer, say so.\n\n\
         Context:\n{}\n\nQuestion: {}",
        context, question
    )
}
