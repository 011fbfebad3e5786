mod common;

use common::{settings_for, write_two_documents, Providers, CANNED_RESPONSE};
use knowledge_agent::error::{ChatError, IngestError};
use std::sync::atomic::Ordering;
use tempfile::TempDir;

#[tokio::test]
async fn ask_without_index_makes_no_calls() {
    let dir = TempDir::new().unwrap();
    let providers = Providers::new();
    let engine = providers.engine(&settings_for(dir.path()));

    let result = engine.ask("What is X?", None).await;

    assert!(matches!(result, Err(ChatError::NoIndex)));
    assert_eq!(providers.network_calls(), 0);
}

#[tokio::test]
async fn blank_query_without_index_is_empty_query() {
    let dir = TempDir::new().unwrap();
    let providers = Providers::new();
    let engine = providers.engine(&settings_for(dir.path()));

    let result = engine.ask("  ", None).await;

    assert!(matches!(result, Err(ChatError::EmptyQuery)));
    assert_eq!(providers.network_calls(), 0);
}

#[tokio::test]
async fn missing_folder_is_no_documents_without_calls() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("data");
    let providers = Providers::new();
    let engine = providers.engine(&settings_for(&data_dir));

    let result = engine.ingest(&data_dir).await;

    assert!(matches!(result, Err(IngestError::NoDocuments)));
    assert_eq!(providers.network_calls(), 0);
}

#[tokio::test]
async fn empty_or_blank_folder_is_no_documents_without_calls() {
    let dir = TempDir::new().unwrap();
    let providers = Providers::new();
    let engine = providers.engine(&settings_for(dir.path()));

    assert!(matches!(
        engine.ingest(dir.path()).await,
        Err(IngestError::NoDocuments)
    ));

    std::fs::write(dir.path().join("blank.txt"), "   \n\n  ").unwrap();
    std::fs::write(dir.path().join("photo.png"), [0u8, 1, 2]).unwrap();
    assert!(matches!(
        engine.ingest(dir.path()).await,
        Err(IngestError::NoDocuments)
    ));

    assert_eq!(providers.network_calls(), 0);
}

#[tokio::test]
async fn two_documents_then_question() {
    let dir = TempDir::new().unwrap();
    write_two_documents(dir.path());
    let providers = Providers::new();
    let engine = providers.engine(&settings_for(dir.path()));

    let handle = engine.ingest(dir.path()).await.unwrap();

    assert_eq!(handle.documents(), 2);
    assert_eq!(handle.chunks(), 2);
    assert_eq!(handle.collection(), "knowledgeagent");
    assert_eq!(providers.embedder.document_calls.load(Ordering::SeqCst), 1);
    assert_eq!(providers.store.upsert_calls.load(Ordering::SeqCst), 1);
    assert_eq!(*providers.store.upsert_sizes.lock().unwrap(), vec![2]);
    assert_eq!(*providers.store.dimensions.lock().unwrap(), Some(3));

    let answer = engine.ask("What is X?", Some(&handle)).await.unwrap();

    assert_eq!(answer, CANNED_RESPONSE);
    assert_eq!(providers.embedder.query_calls.load(Ordering::SeqCst), 1);
    assert_eq!(providers.store.query_calls.load(Ordering::SeqCst), 1);
    assert_eq!(providers.chat.calls.load(Ordering::SeqCst), 1);

    let prompts = providers.chat.prompts.lock().unwrap();
    assert!(prompts[0].contains("Question: What is X?"));
    assert!(prompts[0].contains("X is a lightweight orchestration layer."));
    assert!(prompts[0].contains("[alpha.txt]"));
}

#[tokio::test]
async fn blank_query_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    write_two_documents(dir.path());
    let providers = Providers::new();
    let engine = providers.engine(&settings_for(dir.path()));
    let handle = engine.ingest(dir.path()).await.unwrap();
    let calls_after_ingest = providers.network_calls();

    let result = engine.ask("   ", Some(&handle)).await;

    assert!(matches!(result, Err(ChatError::EmptyQuery)));
    assert_eq!(providers.network_calls(), calls_after_ingest);
}

#[tokio::test]
async fn embedding_failure_is_reported_before_any_upsert() {
    let dir = TempDir::new().unwrap();
    write_two_documents(dir.path());
    let providers = Providers::new();
    providers.embedder.fail.store(true, Ordering::SeqCst);
    let engine = providers.engine(&settings_for(dir.path()));

    let err = engine.ingest(dir.path()).await.unwrap_err();

    assert!(matches!(err, IngestError::ProviderFailure(_)));
    assert!(err.to_string().contains("embedding quota exceeded"));
    assert_eq!(providers.store.upsert_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn store_failure_is_a_provider_failure() {
    let dir = TempDir::new().unwrap();
    write_two_documents(dir.path());
    let providers = Providers::new();
    providers.store.fail_upsert.store(true, Ordering::SeqCst);
    let engine = providers.engine(&settings_for(dir.path()));

    let err = engine.ingest(dir.path()).await.unwrap_err();

    assert!(matches!(err, IngestError::ProviderFailure(_)));
    assert!(err.to_string().contains("unauthorized"));
}

#[tokio::test]
async fn chat_failure_is_reported_once_without_retry() {
    let dir = TempDir::new().unwrap();
    write_two_documents(dir.path());
    let providers = Providers::new();
    let engine = providers.engine(&settings_for(dir.path()));
    let handle = engine.ingest(dir.path()).await.unwrap();
    providers.chat.fail.store(true, Ordering::SeqCst);

    let err = engine.ask("What is X?", Some(&handle)).await.unwrap_err();

    assert!(matches!(err, ChatError::ProviderFailure(_)));
    assert!(err.to_string().contains("deadline exceeded"));
    assert_eq!(providers.chat.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn reingesting_overwrites_points_of_the_same_document() {
    let dir = TempDir::new().unwrap();
    write_two_documents(dir.path());
    let providers = Providers::new();
    let engine = providers.engine(&settings_for(dir.path()));

    engine.ingest(dir.path()).await.unwrap();
    std::fs::write(dir.path().join("alpha.txt"), "X was rewritten.").unwrap();
    engine.ingest(dir.path()).await.unwrap();

    {
        let points = providers.store.points.lock().unwrap();
        assert_eq!(points.len(), 2);
        assert!(points.values().any(|chunk| chunk.text == "X was rewritten."));
    }

    std::fs::write(dir.path().join("gamma.txt"), "Z is new.").unwrap();
    engine.ingest(dir.path()).await.unwrap();
    assert_eq!(providers.store.points.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn undecodable_and_corrupt_files_do_not_block_the_rest() {
    let dir = TempDir::new().unwrap();
    write_two_documents(dir.path());
    std::fs::write(dir.path().join("notes.txt"), b"caf\xE9\n").unwrap();
    std::fs::write(dir.path().join("broken.docx"), b"not a zip archive").unwrap();
    let providers = Providers::new();
    let engine = providers.engine(&settings_for(dir.path()));

    let handle = engine.ingest(dir.path()).await.unwrap();

    assert_eq!(handle.documents(), 3);
    assert_eq!(handle.chunks(), 3);
    let points = providers.store.points.lock().unwrap();
    assert!(points.values().any(|chunk| chunk.document_id == "notes.txt"));
    assert!(points.values().all(|chunk| chunk.document_id != "broken.docx"));
}

#[tokio::test]
async fn folder_of_only_corrupt_files_is_no_documents() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("broken.docx"), b"not a zip archive").unwrap();
    let providers = Providers::new();
    let engine = providers.engine(&settings_for(dir.path()));

    let result = engine.ingest(dir.path()).await;

    assert!(matches!(result, Err(IngestError::NoDocuments)));
    assert_eq!(providers.network_calls(), 0);
}

#[tokio::test]
async fn file_in_place_of_folder_is_unreadable() {
    let dir = TempDir::new().unwrap();
    let data_path = dir.path().join("data");
    std::fs::write(&data_path, "not a folder").unwrap();
    let providers = Providers::new();
    let engine = providers.engine(&settings_for(&data_path));

    let err = engine.ingest(&data_path).await.unwrap_err();

    assert!(matches!(&err, IngestError::Unreadable { path, .. } if *path == data_path));
    assert!(err.to_string().contains("not a directory"));
    assert_eq!(providers.network_calls(), 0);
}
