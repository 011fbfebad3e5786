pub mod chunking;
pub mod config;
pub mod database;
pub mod document;
pub mod error;
pub mod gemini;
pub mod page;
pub mod providers;
pub mod rag;
pub mod server;
pub mod session;
pub mod upload;
