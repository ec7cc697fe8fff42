//! Integration tests for session refresh against a mock token endpoint

use chrono::Utc;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use drivemirror_core::domain::{SessionEndpoints, SessionToken};
use drivemirror_core::ports::{CredentialProvider, RefreshError};
use drivemirror_drive::auth::{refresh_session, TokenFileCredentialProvider};

fn session_for(server: &MockServer) -> SessionToken {
    SessionToken::new("stale-token")
        .with_refresh("refresh-123", "client-abc", Some("shh".to_string()))
        .with_endpoints(SessionEndpoints {
            token_uri: format!("{}/token", server.uri()),
            api_base_url: format!("{}/drive/v3", server.uri()),
        })
}

#[tokio::test]
async fn test_refresh_session_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh-token",
            "token_type": "Bearer",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = session_for(&server);
    let refreshed = refresh_session(&reqwest::Client::new(), &session)
        .await
        .expect("refresh failed");

    assert_eq!(refreshed.access_token, "fresh-token");
    assert_eq!(refreshed.refresh_token.as_deref(), Some("refresh-123"));
    assert!(refreshed.expires_at.unwrap() > Utc::now());
    assert_eq!(refreshed.endpoints, session.endpoints);
}

#[tokio::test]
async fn test_refresh_session_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked."
        })))
        .mount(&server)
        .await;

    let err = refresh_session(&reqwest::Client::new(), &session_for(&server))
        .await
        .unwrap_err();

    assert!(matches!(err, RefreshError::Rejected(_)), "{err:?}");
}

#[tokio::test]
async fn test_token_file_provider_persists_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh-token",
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": "rotated-refresh"
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("token.json");
    std::fs::write(
        &token_path,
        serde_json::to_string(&session_for(&server)).unwrap(),
    )
    .unwrap();

    let provider = TokenFileCredentialProvider::new(&token_path);
    let current = provider.session().await.unwrap();
    let refreshed = provider.refresh(&current).await.unwrap();
    assert_eq!(refreshed.access_token, "fresh-token");

    let reloaded = provider.session().await.unwrap();
    assert_eq!(reloaded.access_token, "fresh-token");
    assert_eq!(reloaded.refresh_token.as_deref(), Some("rotated-refresh"));
}
