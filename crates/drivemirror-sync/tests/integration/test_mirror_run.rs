//! End-to-end mirror runs with a static session

use std::sync::{Arc, Mutex};

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use drivemirror_core::domain::MirrorMessage;
use drivemirror_sync::engine::MirrorSummary;
use drivemirror_sync::MirrorError;

use crate::common::*;

#[tokio::test(flavor = "multi_thread")]
async fn test_every_item_has_one_outcome_for_any_unit_budget() {
    const ITEMS: usize = 5;
    let server = MockServer::start().await;
    mount_listing(&server, text_files(ITEMS)).await;
    mount_text_media(&server, ITEMS).await;

    for budget in 1..=ITEMS {
        let root = tempfile::tempdir().unwrap();
        let mirror = static_mirror(fresh_session(&server), test_options(root.path(), budget));

        let run = mirror.start().await.unwrap();
        assert_eq!(run.unit_count(), budget);
        let messages = run.collect_all().await;

        assert_eq!(terminal_count(&messages), ITEMS, "budget {budget}");
        assert_eq!(messages.last(), Some(&MirrorMessage::Finished));
        assert_eq!(messages.iter().filter(|m| m.is_sentinel()).count(), 1);

        for i in 0..ITEMS {
            let file = root.path().join("My Drive").join(format!("file-{}.txt", i));
            assert_eq!(
                std::fs::read_to_string(&file).unwrap(),
                format!("content-{}", i)
            );
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_second_run_only_skips() {
    let server = MockServer::start().await;
    mount_listing(&server, text_files(3)).await;
    mount_text_media(&server, 3).await;

    let root = tempfile::tempdir().unwrap();
    let mirror = static_mirror(fresh_session(&server), test_options(root.path(), 2));

    let first = mirror.start().await.unwrap().collect_all().await;
    let summary: MirrorSummary = first.iter().collect();
    assert_eq!(summary.downloaded, 3);

    let second = mirror.start().await.unwrap().collect_all().await;
    let summary: MirrorSummary = second.iter().collect();
    assert_eq!(summary.skipped_existing, 3);
    assert_eq!(summary.outcomes(), 3);

    let expected = root.path().join("My Drive").join("file-0.txt");
    assert!(rendered(&second).contains(&format!("Skipped (exists): {}", expected.display())));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_empty_listing_yields_no_files() {
    let server = MockServer::start().await;
    mount_listing(&server, vec![]).await;

    let root = tempfile::tempdir().unwrap();
    let run = static_mirror(fresh_session(&server), test_options(root.path(), 4))
        .start()
        .await
        .unwrap();

    assert_eq!(run.unit_count(), 0);
    assert_eq!(rendered(&run.collect_all().await), vec!["No files found."]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_folders_only_yields_no_files() {
    let server = MockServer::start().await;
    mount_listing(
        &server,
        vec![
            file_json("d1", "Docs", FOLDER_MIME, None),
            file_json("d2", "Old", FOLDER_MIME, Some("d1")),
        ],
    )
    .await;

    let root = tempfile::tempdir().unwrap();
    let messages = static_mirror(fresh_session(&server), test_options(root.path(), 2))
        .start()
        .await
        .unwrap()
        .collect_all()
        .await;

    assert_eq!(messages, vec![MirrorMessage::NoFiles]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_hierarchy_and_export() {
    let server = MockServer::start().await;
    mount_listing(
        &server,
        vec![
            file_json("d1", "Projects", FOLDER_MIME, None),
            file_json("d2", "Q1: plans", FOLDER_MIME, Some("d1")),
            file_json("f1", "notes.txt", "text/plain", Some("d2")),
            file_json("g1", "Roadmap", DOC_MIME, Some("d1")),
        ],
    )
    .await;
    mount_media(&server, "f1", b"notes").await;
    Mock::given(method("GET"))
        .and(path("/files/g1/export"))
        .and(wiremock::matchers::query_param("mimeType", DOCX_MIME))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"docx-bytes".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let messages = static_mirror(fresh_session(&server), test_options(root.path(), 2))
        .start()
        .await
        .unwrap()
        .collect_all()
        .await;

    assert_eq!(terminal_count(&messages), 2);
    let projects = root.path().join("Projects");
    assert_eq!(
        std::fs::read(projects.join("Q1_ plans").join("notes.txt")).unwrap(),
        b"notes"
    );
    assert_eq!(
        std::fs::read(projects.join("Roadmap.docx")).unwrap(),
        b"docx-bytes"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unmapped_native_type_is_skipped() {
    let server = MockServer::start().await;
    mount_listing(
        &server,
        vec![
            file_json("forms", "Forms", FOLDER_MIME, None),
            file_json("q1", "Survey", FORM_MIME, Some("forms")),
            file_json("id-0", "file-0.txt", "text/plain", None),
        ],
    )
    .await;
    mount_text_media(&server, 1).await;

    let root = tempfile::tempdir().unwrap();
    let mut run = static_mirror(fresh_session(&server), test_options(root.path(), 1))
        .start()
        .await
        .unwrap();

    let mut messages = Vec::new();
    while let Some(message) = run.next().await {
        messages.push(message);
    }

    assert!(rendered(&messages).contains(&"Skipped (no export type): Survey".to_string()));
    assert_eq!(run.progress().completed(), run.progress().total());
    assert_eq!(run.progress().total(), 2);
    // Nothing was written under the form's folder, so it was never created
    assert!(!root.path().join("Forms").exists());
    assert!(root.path().join("My Drive").join("file-0.txt").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unit_budget_clamps_to_item_count() {
    let server = MockServer::start().await;
    mount_listing(&server, text_files(3)).await;
    mount_text_media(&server, 3).await;

    let root = tempfile::tempdir().unwrap();
    let run = static_mirror(fresh_session(&server), test_options(root.path(), 16))
        .start()
        .await
        .unwrap();

    assert_eq!(run.unit_count(), 3);
    assert_eq!(terminal_count(&run.collect_all().await), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_transfer_reports_error_and_leaves_no_file() {
    let server = MockServer::start().await;
    mount_listing(&server, text_files(2)).await;
    mount_media(&server, "id-0", b"content-0").await;
    Mock::given(method("GET"))
        .and(path("/files/id-1"))
        .respond_with(ResponseTemplate::new(404).set_body_string("File not found: id-1"))
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let messages = static_mirror(fresh_session(&server), test_options(root.path(), 2))
        .start()
        .await
        .unwrap()
        .collect_all()
        .await;

    let summary: MirrorSummary = messages.iter().collect();
    assert_eq!(summary.downloaded, 1);
    assert_eq!(summary.errors, 1);
    assert!(rendered(&messages)
        .iter()
        .any(|line| line.starts_with("Error downloading file-1.txt: HTTP 404")));

    let dir = root.path().join("My Drive");
    assert!(!dir.join("file-1.txt").exists());
    let leftovers: Vec<_> = std::fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".part"))
        .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_progress_callback_sees_each_completion() {
    let server = MockServer::start().await;
    mount_listing(&server, text_files(4)).await;
    mount_text_media(&server, 4).await;

    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = calls.clone();

    let root = tempfile::tempdir().unwrap();
    let messages = static_mirror(fresh_session(&server), test_options(root.path(), 2))
        .start()
        .await
        .unwrap()
        .with_progress(move |done: usize, total: usize, desc: &str| {
            sink.lock().unwrap().push((done, total, desc.to_string()));
        })
        .collect_all()
        .await;

    let calls = calls.lock().unwrap();
    let counts: Vec<(usize, usize)> = calls.iter().map(|(d, t, _)| (*d, *t)).collect();
    assert_eq!(counts, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    assert!(calls.iter().all(|(_, _, desc)| desc.ends_with(".txt")));
    assert_eq!(terminal_count(&messages), 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_panicking_callback_does_not_abort_run() {
    let server = MockServer::start().await;
    mount_listing(&server, text_files(3)).await;
    mount_text_media(&server, 3).await;

    let root = tempfile::tempdir().unwrap();
    let messages = static_mirror(fresh_session(&server), test_options(root.path(), 1))
        .start()
        .await
        .unwrap()
        .with_progress(|_: usize, _: usize, _: &str| panic!("display crashed"))
        .collect_all()
        .await;

    assert_eq!(terminal_count(&messages), 3);
    assert_eq!(messages.last(), Some(&MirrorMessage::Finished));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_listing_failure_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(403).set_body_string("insufficient scopes"))
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let result = static_mirror(fresh_session(&server), test_options(root.path(), 2))
        .start()
        .await;

    assert!(matches!(result, Err(MirrorError::Metadata(_))));
    assert!(std::fs::read_dir(root.path()).unwrap().next().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stream_adapter() {
    use futures_util::StreamExt;

    let server = MockServer::start().await;
    mount_listing(&server, text_files(2)).await;
    mount_text_media(&server, 2).await;

    let root = tempfile::tempdir().unwrap();
    let run = static_mirror(fresh_session(&server), test_options(root.path(), 2))
        .start()
        .await
        .unwrap();

    let messages: Vec<MirrorMessage> = run.into_stream().collect().await;
    assert_eq!(terminal_count(&messages), 2);
    assert_eq!(messages.last(), Some(&MirrorMessage::Finished));
}
