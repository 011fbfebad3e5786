use crate::error::ConfigError;
use std::env;
use std::fmt;
use std::path::PathBuf;

/// API keys for the hosted providers.
///
/// Written once per session and read many times. `Debug` is redacted so the
/// keys never reach the log.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub gemini_api_key: String,
    pub vector_store_api_key: String,
}

impl Credentials {
    /// Build credentials from user input, rejecting blank fields
    pub fn new(gemini_api_key: &str, vector_store_api_key: &str) -> Result<Self, ConfigError> {
        let gemini_api_key = gemini_api_key.trim();
        let vector_store_api_key = vector_store_api_key.trim();

        if gemini_api_key.is_empty() {
            return Err(ConfigError::MissingCredential("Gemini API key"));
        }
        if vector_store_api_key.is_empty() {
            return Err(ConfigError::MissingCredential("Vector store API key"));
        }

        Ok(Credentials {
            gemini_api_key: gemini_api_key.to_string(),
            vector_store_api_key: vector_store_api_key.to_string(),
        })
    }

    /// Read credentials from `GEMINI_API_KEY` (or `GOOGLE_API_KEY`) and `QDRANT_API_KEY`
    pub fn from_env() -> Result<Self, ConfigError> {
        let gemini_api_key = env::var("GEMINI_API_KEY")
            .or_else(|_| env::var("GOOGLE_API_KEY"))
            .map_err(|_| ConfigError::MissingCredential("GEMINI_API_KEY"))?;
        let vector_store_api_key = env::var("QDRANT_API_KEY")
            .map_err(|_| ConfigError::MissingCredential("QDRANT_API_KEY"))?;

        Credentials::new(&gemini_api_key, &vector_store_api_key)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("gemini_api_key", &"<redacted>")
            .field("vector_store_api_key", &"<redacted>")
            .finish()
    }
}

/// Workflow settings shared by every session
#[derive(Debug, Clone)]
pub struct Settings {
    /// Folder that uploads land in and ingestion reads from
    pub data_dir: PathBuf,
    /// Target chunk size in estimated tokens
    pub chunk_size: usize,
    /// Number of chunks retrieved per question
    pub top_k: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            data_dir: PathBuf::from("data"),
            chunk_size: 1024,
            top_k: 4,
        }
    }
}
