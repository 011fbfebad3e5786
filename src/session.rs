//! Per-user session state machine.
//!
//! ```text
//! Uninitialized -> CredentialsPending -> Ready -> Indexed -> (Ask)*
//!                                          ^         |
//!                                          +--Reset--+
//! ```
//!
//! Every UI action goes through [`Session::dispatch`], which runs at most one
//! workflow and returns the notice to show. Failures never change state.

use crate::config::{Credentials, Settings};
use crate::database::{QdrantConfig, QdrantStore};
use crate::error::{ChatError, ConfigError, IngestError};
use crate::gemini::{GeminiClient, GeminiConfig};
use crate::rag::{IndexHandle, RagEngine};
use crate::upload::{save_upload, UploadedFile};
use log::{info, warn};
use std::fmt::Display;
use std::sync::Arc;

/// Builds provider clients once credentials are known
pub trait Connector: Send + Sync {
    fn connect(&self, credentials: &Credentials) -> Result<RagEngine, ConfigError>;
}

/// Connects to Gemini and Qdrant
pub struct HostedConnector {
    pub gemini: GeminiConfig,
    pub qdrant: QdrantConfig,
    pub settings: Settings,
}

impl Connector for HostedConnector {
    fn connect(&self, credentials: &Credentials) -> Result<RagEngine, ConfigError> {
        let gemini = GeminiClient::new(GeminiConfig {
            api_key: credentials.gemini_api_key.clone(),
            ..self.gemini.clone()
        })
        .map_err(ConfigError::ClientInit)?;

        let store = QdrantStore::new(QdrantConfig {
            api_key: credentials.vector_store_api_key.clone(),
            ..self.qdrant.clone()
        })
        .map_err(ConfigError::ClientInit)?;

        let gemini = Arc::new(gemini);
        Ok(RagEngine::new(
            gemini.clone(),
            gemini,
            Arc::new(store),
            &self.settings,
        ))
    }
}

/// A user action from the page
#[derive(Debug)]
pub enum Action {
    SubmitCredentials {
        gemini_api_key: String,
        vector_store_api_key: String,
    },
    Upload(Option<UploadedFile>),
    Ingest,
    Ask(String),
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Info,
    Warning,
    Error,
}

/// Message shown to the user after an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: Level,
    pub message: String,
}

impl Notice {
    fn new(level: Level, message: impl Display) -> Self {
        Notice {
            level,
            message: message.to_string(),
        }
    }
}

/// One question and the answer shown for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub query: String,
    pub response: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    CredentialsPending,
    Ready,
    Indexed,
}

enum State {
    Uninitialized,
    CredentialsPending,
    Ready(RagEngine),
    Indexed(RagEngine, IndexHandle),
}

pub struct Session {
    state: State,
    connector: Arc<dyn Connector>,
    settings: Arc<Settings>,
    last_turn: Option<ChatTurn>,
}

impl Session {
    pub fn new(connector: Arc<dyn Connector>, settings: Arc<Settings>) -> Self {
        Session {
            state: State::Uninitialized,
            connector,
            settings,
            last_turn: None,
        }
    }

    /// Begin the session, submitting `preset` credentials (from the
    /// environment) right away when they are available
    pub fn start(&mut self, preset: Option<&Credentials>) -> Option<Notice> {
        if !matches!(self.state, State::Uninitialized) {
            return None;
        }
        self.state = State::CredentialsPending;

        preset.map(|credentials| self.connect(credentials))
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            State::Uninitialized => Phase::Uninitialized,
            State::CredentialsPending => Phase::CredentialsPending,
            State::Ready(_) => Phase::Ready,
            State::Indexed(..) => Phase::Indexed,
        }
    }

    pub fn index(&self) -> Option<&IndexHandle> {
        match &self.state {
            State::Indexed(_, handle) => Some(handle),
            _ => None,
        }
    }

    pub fn last_turn(&self) -> Option<&ChatTurn> {
        self.last_turn.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Apply one user action and return the notice to display, if any
    pub async fn dispatch(&mut self, action: Action) -> Option<Notice> {
        match action {
            Action::SubmitCredentials {
                gemini_api_key,
                vector_store_api_key,
            } => Some(self.submit_credentials(&gemini_api_key, &vector_store_api_key)),
            Action::Upload(file) => Some(self.upload(file)),
            Action::Ingest => Some(self.ingest().await),
            Action::Ask(query) => self.ask(query).await,
            Action::Reset => Some(self.reset()),
        }
    }

    fn submit_credentials(&mut self, gemini_api_key: &str, vector_store_api_key: &str) -> Notice {
        if !matches!(self.state, State::CredentialsPending) {
            return Notice::new(Level::Warning, ConfigError::AlreadyConfigured);
        }

        match Credentials::new(gemini_api_key, vector_store_api_key) {
            Ok(credentials) => self.connect(&credentials),
            Err(e) => Notice::new(Level::Error, e),
        }
    }

    fn connect(&mut self, credentials: &Credentials) -> Notice {
        match self.connector.connect(credentials) {
            Ok(engine) => {
                info!("Session credentials accepted");
                self.state = State::Ready(engine);
                Notice::new(Level::Success, "Connected. Upload files or ingest the data folder.")
            }
            Err(e) => {
                warn!("Client construction failed: {}", e);
                Notice::new(Level::Error, e)
            }
        }
    }

    fn upload(&mut self, file: Option<UploadedFile>) -> Notice {
        match save_upload(&self.settings.data_dir, file) {
            Ok(path) => Notice::new(Level::Success, format!("Saved {}", path.display())),
            Err(e) => Notice::new(Level::Error, e),
        }
    }

    async fn ingest(&mut self) -> Notice {
        let engine = match &self.state {
            State::Ready(engine) | State::Indexed(engine, _) => engine.clone(),
            _ => return Notice::new(Level::Error, ConfigError::CredentialsRequired),
        };

        match engine.ingest(&self.settings.data_dir).await {
            Ok(handle) => {
                let message = format!(
                    "Documents ingested successfully! ({} documents, {} chunks in {})",
                    handle.documents(),
                    handle.chunks(),
                    handle.collection()
                );
                self.state = State::Indexed(engine, handle);
                Notice::new(Level::Success, message)
            }
            Err(e @ IngestError::NoDocuments) => Notice::new(
                Level::Warning,
                format!("{} in {}", e, self.settings.data_dir.display()),
            ),
            Err(e) => Notice::new(Level::Error, e),
        }
    }

    async fn ask(&mut self, query: String) -> Option<Notice> {
        let (engine, handle) = match &self.state {
            State::Ready(engine) => (engine, None),
            State::Indexed(engine, handle) => (engine, Some(handle)),
            _ => return Some(Notice::new(Level::Error, ConfigError::CredentialsRequired)),
        };

        match engine.ask(&query, handle).await {
            Ok(response) => {
                self.last_turn = Some(ChatTurn {
                    query: query.trim().to_string(),
                    response,
                });
                None
            }
            Err(ChatError::EmptyQuery) => None,
            Err(e @ ChatError::NoIndex) => Some(Notice::new(Level::Warning, e)),
            Err(e) => Some(Notice::new(Level::Error, e)),
        }
    }

    /// Return to the pre-ingestion view. Remote vectors are left in place.
    fn reset(&mut self) -> Notice {
        self.last_turn = None;

        let state = std::mem::replace(&mut self.state, State::Uninitialized);
        self.state = match state {
            State::Indexed(engine, _) => State::Ready(engine),
            other => other,
        };

        Notice::new(Level::Info, "Session cleared.")
    }
}
