//! Integration tests for the metadata listing
//!
//! - Single page and multi-page listings
//! - Query parameters sent to `files.list`
//! - Retry of throttled and failing pages
//! - A page that keeps failing fails the whole listing

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use drivemirror_core::domain::ItemKind;
use drivemirror_drive::listing;
use drivemirror_drive::DriveError;

use crate::common;

#[tokio::test]
async fn test_listing_single_page() {
    let (server, client) = common::setup_drive_mock().await;

    common::mount_listing_single_page(
        &server,
        json!([
            common::file_json("d1", "Docs", common::FOLDER_MIME, None),
            common::file_json("f1", "a.txt", "text/plain", Some("d1")),
            common::file_json("g1", "Plan", common::DOC_MIME, Some("d1")),
        ]),
    )
    .await;

    let items = listing::list_items(&client).await.expect("listing failed");

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].kind, ItemKind::Folder);
    assert_eq!(items[1].kind, ItemKind::File);
    assert_eq!(items[1].parent_id.as_deref(), Some("d1"));
    assert_eq!(items[2].kind, ItemKind::NativeDoc);
}

#[tokio::test]
async fn test_listing_sends_expected_query() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .and(header("authorization", "Bearer test-access-token"))
        .and(query_param("q", "trashed = false"))
        .and(query_param("corpora", "user"))
        .and(query_param("includeItemsFromAllDrives", "true"))
        .and(query_param("supportsAllDrives", "true"))
        .and(query_param("pageSize", "1000"))
        .and(query_param("fields", listing::LIST_FIELDS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let items = listing::list_items(&client).await.expect("listing failed");
    assert!(items.is_empty());
}

#[tokio::test]
async fn test_listing_follows_next_page_token() {
    let (server, client) = common::setup_drive_mock().await;

    common::mount_listing_two_pages(
        &server,
        json!([common::file_json("p1-a", "one.txt", "text/plain", None)]),
        json!([
            common::file_json("p2-a", "two.txt", "text/plain", None),
            common::file_json("p2-b", "three.txt", "text/plain", None),
        ]),
    )
    .await;

    let items = listing::list_items(&client).await.expect("listing failed");

    let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["p1-a", "p2-a", "p2-b"]);
}

#[tokio::test]
async fn test_listing_custom_page_size() {
    let (server, client) = common::setup_drive_mock().await;
    let client = client.with_page_size(50);

    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("pageSize", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": [] })))
        .expect(1)
        .mount(&server)
        .await;

    listing::list_items(&client).await.expect("listing failed");
}

#[tokio::test]
async fn test_listing_retries_throttled_page() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    common::mount_listing_single_page(
        &server,
        json!([common::file_json("f1", "a.txt", "text/plain", None)]),
    )
    .await;

    let items = listing::list_items(&client).await.expect("listing failed");
    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn test_listing_retries_server_error() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    common::mount_listing_single_page(&server, json!([])).await;

    assert!(listing::list_items(&client).await.is_ok());
}

#[tokio::test]
async fn test_listing_unauthorized_is_not_retried() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid credentials"))
        .expect(1)
        .mount(&server)
        .await;

    let err = listing::list_items(&client).await.unwrap_err();
    assert!(matches!(err, DriveError::Unauthorized(_)));
}

#[tokio::test]
async fn test_failing_second_page_fails_listing() {
    let (server, client) = common::setup_drive_mock().await;
    let client = client.with_max_retries(1);

    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nextPageToken": "page-2",
            "files": [common::file_json("f1", "a.txt", "text/plain", None)]
        })))
        .mount(&server)
        .await;

    let err = listing::list_items(&client).await.unwrap_err();
    assert!(matches!(err, DriveError::ServerError(_)));
}

#[tokio::test]
async fn test_listing_invalid_json() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = listing::list_items(&client).await.unwrap_err();
    assert!(matches!(err, DriveError::InvalidResponse(_)));
}
