//! Error taxonomy for the workflows.
//!
//! Collaborators (Gemini, Qdrant, the document loader) report failures as
//! `anyhow::Error`; each workflow converts them into one of these types at its
//! boundary so callers can tell expected conditions from provider faults.

use std::path::PathBuf;
use thiserror::Error;

/// Missing or unusable credentials
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is required")]
    MissingCredential(&'static str),

    #[error("Enter both API keys before ingesting or chatting")]
    CredentialsRequired,

    #[error("Credentials are already configured for this session")]
    AlreadyConfigured,

    #[error("Failed to initialize provider clients: {0:#}")]
    ClientInit(#[source] anyhow::Error),
}

/// Failures of the ingestion workflow
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("No documents found to ingest")]
    NoDocuments,

    #[error("Failed to read {}: {source:#}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Provider failure during ingestion: {0:#}")]
    ProviderFailure(#[source] anyhow::Error),
}

/// Failures of the chat workflow
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Please ingest documents first by clicking the 'Ingest Documents' button.")]
    NoIndex,

    #[error("Query is empty")]
    EmptyQuery,

    #[error("Error during query: {0:#}")]
    ProviderFailure(#[source] anyhow::Error),
}

/// Failures of the upload operation
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No file was supplied")]
    EmptyPayload,

    #[error("Invalid file name: {0:?}")]
    InvalidName(String),

    #[error("Failed to save upload: {0}")]
    IoFailure(#[from] std::io::Error),
}
