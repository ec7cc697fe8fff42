//! Shared helpers for mirror-run integration tests

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use drivemirror_core::domain::{MirrorMessage, SessionEndpoints, SessionToken};
use drivemirror_core::ports::StaticCredentialProvider;
use drivemirror_sync::engine::{DriveMirror, MirrorOptions};

pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
pub const DOC_MIME: &str = "application/vnd.google-apps.document";
pub const FORM_MIME: &str = "application/vnd.google-apps.form";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

pub fn endpoints(server: &MockServer) -> SessionEndpoints {
    SessionEndpoints {
        token_uri: format!("{}/token", server.uri()),
        api_base_url: server.uri(),
    }
}

/// A session valid for an hour against `server`
pub fn fresh_session(server: &MockServer) -> SessionToken {
    SessionToken::new("test-access-token")
        .with_expires_at(Utc::now() + chrono::Duration::hours(1))
        .with_endpoints(endpoints(server))
}

/// Options tuned for tests: fast backoff, short receive timeout and a
/// fixed parallelism so unit counts do not depend on the host
pub fn test_options(root: &Path, max_units: usize) -> MirrorOptions {
    MirrorOptions::new(root)
        .with_max_units(max_units)
        .with_available_parallelism(8)
        .with_recv_timeout(Duration::from_millis(200))
        .with_backoff_base(Duration::from_millis(1))
}

pub fn static_mirror(session: SessionToken, options: MirrorOptions) -> DriveMirror {
    DriveMirror::new(Arc::new(StaticCredentialProvider::new(session)), options)
}

/// JSON file resource as returned by `files.list`
pub fn file_json(id: &str, name: &str, mime: &str, parent: Option<&str>) -> Value {
    let mut file = json!({
        "id": id,
        "name": name,
        "mimeType": mime,
        "ownedByMe": true
    });
    if let Some(parent) = parent {
        file["parents"] = json!([parent]);
    }
    file
}

/// `count` plain text files named `file-<i>.txt` with ids `id-<i>`
pub fn text_files(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            file_json(
                &format!("id-{}", i),
                &format!("file-{}.txt", i),
                "text/plain",
                None,
            )
        })
        .collect()
}

pub async fn mount_listing(server: &MockServer, files: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": files })))
        .mount(server)
        .await;
}

pub async fn mount_media(server: &MockServer, item_id: &str, content: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/files/{}", item_id)))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .mount(server)
        .await;
}

/// Mounts `content-<i>` as the media body of each `id-<i>`
pub async fn mount_text_media(server: &MockServer, count: usize) {
    for i in 0..count {
        mount_media(server, &format!("id-{}", i), format!("content-{}", i).as_bytes()).await;
    }
}

/// Renders messages the way they are printed
pub fn rendered(messages: &[MirrorMessage]) -> Vec<String> {
    messages.iter().map(ToString::to_string).collect()
}

pub fn terminal_count(messages: &[MirrorMessage]) -> usize {
    messages.iter().filter(|m| m.is_terminal()).count()
}
