//! Shared test helpers for Drive API integration tests
//!
//! Each helper mounts the endpoints a test needs on a wiremock server.
//! Clients are created with a short backoff so retry tests stay fast.

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use drivemirror_drive::client::DriveClient;

pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
pub const DOC_MIME: &str = "application/vnd.google-apps.document";
pub const FORM_MIME: &str = "application/vnd.google-apps.form";

/// Starts a mock server and returns a client pointing at it.
pub async fn setup_drive_mock() -> (MockServer, DriveClient) {
    let server = MockServer::start().await;
    let client = DriveClient::with_base_url("test-access-token", server.uri())
        .with_backoff_base(Duration::from_millis(1));
    (server, client)
}

/// JSON file resource as returned by `files.list`.
pub fn file_json(id: &str, name: &str, mime: &str, parent: Option<&str>) -> Value {
    let mut file = json!({
        "id": id,
        "name": name,
        "mimeType": mime,
        "shared": false,
        "ownedByMe": true
    });
    if let Some(parent) = parent {
        file["parents"] = json!([parent]);
    }
    file
}

/// Mounts a single-page listing.
pub async fn mount_listing_single_page(server: &MockServer, files: Value) {
    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": files })))
        .mount(server)
        .await;
}

/// Mounts a two-page listing chained by `nextPageToken`.
pub async fn mount_listing_two_pages(server: &MockServer, page1: Value, page2: Value) {
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nextPageToken": "page-2",
            "files": page1
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": page2 })))
        .mount(server)
        .await;
}

/// Mounts the `alt=media` download endpoint for an item.
pub async fn mount_media(server: &MockServer, item_id: &str, content: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/files/{}", item_id)))
        .and(query_param("alt", "media"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(content.to_vec())
                .append_header("Content-Type", "application/octet-stream"),
        )
        .mount(server)
        .await;
}

/// Mounts the export endpoint for an item and target MIME type.
pub async fn mount_export(server: &MockServer, item_id: &str, export_mime: &str, content: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/files/{}/export", item_id)))
        .and(query_param("mimeType", export_mime))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .mount(server)
        .await;
}
