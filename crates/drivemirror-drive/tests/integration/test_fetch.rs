//! Integration tests for the content fetcher
//!
//! - Binary download via `alt=media`
//! - Native document export with the mapped MIME type
//! - Existing final path short-circuits without a request
//! - Native types without export produce a skip
//! - Failed transfers leave neither final nor partial files
//! - Names longer than the length cap are truncated and still published

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use drivemirror_core::domain::{FetchOutcome, ItemRecord};
use drivemirror_drive::export::DOCX;
use drivemirror_drive::fetch::{self, TransferError};

use crate::common;

fn entries(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_fetch_media_writes_file() {
    let (server, client) = common::setup_drive_mock().await;
    let dir = tempfile::tempdir().unwrap();

    let content: Vec<u8> = (0..200_000).map(|i| (i % 251) as u8).collect();
    common::mount_media(&server, "bin-1", &content).await;

    let item = ItemRecord::new("bin-1", "data.bin", "application/octet-stream").unwrap();
    let outcome = fetch::fetch(&client, &item, dir.path()).await.expect("fetch failed");

    let expected = dir.path().join("data.bin");
    assert_eq!(outcome, FetchOutcome::Downloaded(expected.clone()));
    assert_eq!(std::fs::read(&expected).unwrap(), content);
    assert_eq!(entries(dir.path()), vec!["data.bin"]);
}

#[tokio::test]
async fn test_fetch_media_requests_all_drives() {
    let (server, client) = common::setup_drive_mock().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/files/shared-1"))
        .and(query_param("alt", "media"))
        .and(query_param("supportsAllDrives", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let item = ItemRecord::new("shared-1", "s.txt", "text/plain")
        .unwrap()
        .with_shared(true);
    fetch::fetch(&client, &item, dir.path()).await.expect("fetch failed");
}

#[tokio::test]
async fn test_fetch_native_document_exports_docx() {
    let (server, client) = common::setup_drive_mock().await;
    let dir = tempfile::tempdir().unwrap();

    common::mount_export(&server, "doc-1", DOCX.mime_type, b"PK\x03\x04docx").await;

    let item = ItemRecord::new("doc-1", "Quarterly Plan", common::DOC_MIME).unwrap();
    let outcome = fetch::fetch(&client, &item, dir.path()).await.expect("fetch failed");

    let expected = dir.path().join("Quarterly Plan.docx");
    assert_eq!(outcome, FetchOutcome::Downloaded(expected.clone()));
    assert_eq!(std::fs::read(expected).unwrap(), b"PK\x03\x04docx");
}

#[tokio::test]
async fn test_fetch_drawing_exports_pdf() {
    let (server, client) = common::setup_drive_mock().await;
    let dir = tempfile::tempdir().unwrap();

    common::mount_export(&server, "draw-1", "application/pdf", b"%PDF-1.7").await;

    let item = ItemRecord::new("draw-1", "Sketch", "application/vnd.google-apps.drawing").unwrap();
    let outcome = fetch::fetch(&client, &item, dir.path()).await.expect("fetch failed");

    assert_eq!(
        outcome,
        FetchOutcome::Downloaded(dir.path().join("Sketch.pdf"))
    );
}

#[tokio::test]
async fn test_fetch_existing_file_is_skipped_without_request() {
    let (server, client) = common::setup_drive_mock().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let existing = dir.path().join("keep.txt");
    std::fs::write(&existing, b"local copy").unwrap();

    let item = ItemRecord::new("keep-1", "keep.txt", "text/plain").unwrap();
    let outcome = fetch::fetch(&client, &item, dir.path()).await.expect("fetch failed");

    assert_eq!(outcome, FetchOutcome::SkippedExists(existing.clone()));
    assert_eq!(std::fs::read(existing).unwrap(), b"local copy");
}

#[tokio::test]
async fn test_fetch_unexportable_type_is_skipped() {
    let (server, client) = common::setup_drive_mock().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let item = ItemRecord::new("form-1", "Survey", common::FORM_MIME).unwrap();
    let outcome = fetch::fetch(&client, &item, dir.path()).await.expect("fetch failed");

    assert_eq!(outcome, FetchOutcome::SkippedNoExport("Survey".to_string()));
    assert!(entries(dir.path()).is_empty());
}

#[tokio::test]
async fn test_fetch_http_error_leaves_no_files() {
    let (server, client) = common::setup_drive_mock().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/files/gone-1"))
        .respond_with(ResponseTemplate::new(404).set_body_string("File not found: gone-1"))
        .mount(&server)
        .await;

    let item = ItemRecord::new("gone-1", "gone.txt", "text/plain").unwrap();
    let err = fetch::fetch(&client, &item, dir.path()).await.unwrap_err();

    assert!(matches!(err, TransferError::Status { status: 404, .. }));
    assert!(entries(dir.path()).is_empty());
}

#[tokio::test]
async fn test_fetch_retries_server_error() {
    let (server, client) = common::setup_drive_mock().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/files/flaky-1"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    common::mount_media(&server, "flaky-1", b"eventually").await;

    let item = ItemRecord::new("flaky-1", "flaky.txt", "text/plain").unwrap();
    let outcome = fetch::fetch(&client, &item, dir.path()).await.expect("fetch failed");

    assert!(matches!(outcome, FetchOutcome::Downloaded(_)));
}

#[tokio::test]
async fn test_fetch_into_missing_directory_fails_cleanly() {
    let (server, client) = common::setup_drive_mock().await;
    let dir = tempfile::tempdir().unwrap();
    common::mount_media(&server, "bin-2", b"bytes").await;

    let item = ItemRecord::new("bin-2", "b.bin", "application/octet-stream").unwrap();
    let missing = dir.path().join("not-created");
    let err = fetch::fetch(&client, &item, &missing).await.unwrap_err();

    assert!(matches!(err, TransferError::Io(_)));
    assert!(!missing.exists());
}

#[tokio::test]
async fn test_fetch_overlong_name_is_truncated_and_published() {
    let (server, client) = common::setup_drive_mock().await;
    let dir = tempfile::tempdir().unwrap();

    let id = "1BxiMVs0XRA5nFMdKvBdBZjgmUUqptlbs74OgvE2upms";
    common::mount_media(&server, id, b"%PDF-1.4 long").await;

    let name = format!("{}.pdf", "a".repeat(300));
    let item = ItemRecord::new(id, name, "application/pdf").unwrap();
    let outcome = fetch::fetch(&client, &item, dir.path()).await.expect("fetch failed");

    let FetchOutcome::Downloaded(published) = outcome else {
        panic!("expected a download, got {:?}", outcome);
    };
    let file_name = published.file_name().unwrap().to_string_lossy().into_owned();
    assert_eq!(file_name.chars().count(), 240);
    assert!(file_name.ends_with(".pdf"));
    assert_eq!(std::fs::read(&published).unwrap(), b"%PDF-1.4 long");
    assert_eq!(entries(dir.path()), vec![file_name]);
}
