//! Integration tests for the CMK dispatcher over HTTP.
//!
//! A mock of the KMS REST API is served by axum on an ephemeral port; the real
//! [`OtcKmsClient`] talks to it through the [`Dispatcher`].

// Allow unwrap() in tests - panics are acceptable for test assertions
#![allow(clippy::disallowed_methods)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use cmk_core::{Dispatcher, Key, KeyState, Origin};
use cmk_otc::{OtcConfig, OtcKmsClient};

pub const PROJECT_ID: &str = "0123456789abcdef";
pub const TOKEN: &str = "integration-token";
pub const DOMAIN_ID: &str = "mock-domain";

/// Number of keys the mock returns per `list-keys` page.
pub const PAGE_SIZE: usize = 2;

// ============================================================================
// Mock KMS
// ============================================================================

#[derive(Default)]
struct MockState {
    keys: Vec<Key>,
    calls: Vec<(String, Value)>,
    fail_action: Option<String>,
    created: u32,
}

#[derive(Clone, Default)]
struct MockKms {
    state: Arc<Mutex<MockState>>,
}

fn error(status: StatusCode, code: &str, msg: &str) -> Response {
    (
        status,
        Json(json!({"error": {"error_code": code, "error_msg": msg}})),
    )
        .into_response()
}

fn invalid_state() -> Response {
    error(
        StatusCode::BAD_REQUEST,
        "KMS.0206",
        "The key state does not allow this operation.",
    )
}

async fn handle(
    State(kms): State<MockKms>,
    Path((project_id, action)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if headers.get("X-Auth-Token").and_then(|v| v.to_str().ok()) != Some(TOKEN) {
        return error(
            StatusCode::UNAUTHORIZED,
            "APIGW.0301",
            "Incorrect IAM authentication information",
        );
    }
    if project_id != PROJECT_ID {
        return error(StatusCode::NOT_FOUND, "KMS.0101", "Project not found.");
    }

    let mut state = kms.state.lock().await;
    state.calls.push((action.clone(), body.clone()));

    if state.fail_action.as_deref() == Some(action.as_str()) {
        return error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "KMS.0000",
            "Internal error.",
        );
    }

    let key_id = body.get("key_id").and_then(Value::as_str).unwrap_or_default();

    match action.as_str() {
        "list-keys" => {
            let start = body
                .get("marker")
                .and_then(Value::as_str)
                .and_then(|m| m.parse::<usize>().ok())
                .unwrap_or(0)
                .min(state.keys.len());
            let end = (start + PAGE_SIZE).min(state.keys.len());
            let page = &state.keys[start..end];
            let truncated = end < state.keys.len();

            Json(json!({
                "keys": page.iter().map(|k| k.key_id.clone()).collect::<Vec<_>>(),
                "key_details": page,
                "next_marker": if truncated { end.to_string() } else { String::new() },
                "truncated": truncated.to_string(),
                "total": state.keys.len(),
            }))
            .into_response()
        },
        "create-key" => {
            state.created += 1;
            let key = Key {
                key_id: format!("00000000-0000-0000-0000-{:012}", state.created),
                domain_id: Some(DOMAIN_ID.into()),
                key_alias: body
                    .get("key_alias")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                key_description: body
                    .get("key_description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                origin: Some(
                    body.get("origin")
                        .cloned()
                        .and_then(|o| serde_json::from_value::<Origin>(o).ok())
                        .unwrap_or(Origin::Kms),
                ),
                key_state: Some(KeyState::Enabled),
                ..Key::default()
            };
            let response = json!({"key_info": {"key_id": key.key_id, "domain_id": DOMAIN_ID}});
            state.keys.push(key);
            Json(response).into_response()
        },
        "enable-key" | "disable-key" | "schedule-key-deletion" | "cancel-key-deletion" => {
            let Some(key) = state.keys.iter_mut().find(|k| k.key_id == key_id) else {
                return error(StatusCode::NOT_FOUND, "KMS.0207", "Key not found.");
            };

            let (expected_ok, next) = match action.as_str() {
                "enable-key" => (key.is_in(&KeyState::Disabled), KeyState::Enabled),
                "disable-key" => (key.is_in(&KeyState::Enabled), KeyState::Disabled),
                "schedule-key-deletion" => {
                    (!key.is_in(&KeyState::PendingDeletion), KeyState::PendingDeletion)
                },
                _ => (key.is_in(&KeyState::PendingDeletion), KeyState::Disabled),
            };
            if !expected_ok {
                return invalid_state();
            }
            key.key_state = Some(next.clone());

            if action.starts_with("enable") || action.starts_with("disable") {
                Json(json!({"key_info": {"key_id": key.key_id, "key_state": next}}))
                    .into_response()
            } else {
                Json(json!({"key_id": key.key_id, "key_state": next})).into_response()
            }
        },
        _ => error(StatusCode::NOT_FOUND, "KMS.0000", "Unknown action."),
    }
}

// ============================================================================
// Test Server
// ============================================================================

/// A mock KMS API listening on an ephemeral local port.
pub struct MockServer {
    pub base_url: String,
    kms: MockKms,
    handle: JoinHandle<()>,
}

impl MockServer {
    /// Starts a server pre-populated with `keys`.
    pub async fn start(keys: Vec<Key>) -> Result<Self> {
        let kms = MockKms::default();
        kms.state.lock().await.keys = keys;

        let app = Router::new()
            .route("/v1.0/{project_id}/kms/{action}", post(handle))
            .with_state(kms.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("Failed to bind mock server")?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            kms,
            handle,
        })
    }

    /// Client settings pointing at this server.
    pub fn config(&self) -> OtcConfig {
        OtcConfig::new(&self.base_url, PROJECT_ID, TOKEN)
    }

    /// Dispatcher over a real HTTP client.
    pub fn dispatcher(&self) -> Result<Dispatcher<OtcKmsClient>> {
        Ok(Dispatcher::new(OtcKmsClient::new(self.config())?))
    }

    /// Actions received so far, in order.
    pub async fn actions(&self) -> Vec<String> {
        let state = self.kms.state.lock().await;
        state.calls.iter().map(|(action, _)| action.clone()).collect()
    }

    /// Body of the last call to `action`.
    pub async fn last_body(&self, action: &str) -> Option<Value> {
        let state = self.kms.state.lock().await;
        state
            .calls
            .iter()
            .rev()
            .find(|(name, _)| name == action)
            .map(|(_, body)| body.clone())
    }

    /// Makes every call to `action` fail with HTTP 500.
    pub async fn fail(&self, action: &str) {
        self.kms.state.lock().await.fail_action = Some(action.to_string());
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Key as the mock stores it.
pub fn stored_key(n: u32, alias: &str, state: KeyState) -> Key {
    let mut key = Key::new(format!("11111111-0000-0000-0000-{n:012}"))
        .with_alias(alias)
        .with_state(state);
    key.domain_id = Some(DOMAIN_ID.into());
    key
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cmk_core::{ApiError, CmkError, DesiredState, FailureReport, KmsClient, ModuleParams, Toggle};

    fn mutating(actions: &[String]) -> Vec<&str> {
        actions
            .iter()
            .map(String::as_str)
            .filter(|a| *a != "list-keys")
            .collect()
    }

    #[tokio::test]
    async fn test_create_sends_only_supplied_attributes() {
        let server = MockServer::start(vec![]).await.unwrap();
        let dispatcher = server.dispatcher().unwrap();

        let mut params = ModuleParams::new("app-key");
        params.key_description = Some("application key".into());

        let outcome = dispatcher.run(params).await.unwrap();

        assert!(outcome.changed);
        let key = outcome.key.unwrap();
        assert_eq!(key.key_id, "00000000-0000-0000-0000-000000000001");
        assert_eq!(key.domain_id.as_deref(), Some(DOMAIN_ID));
        assert_eq!(key.key_alias.as_deref(), Some("app-key"));

        assert_eq!(
            server.last_body("create-key").await.unwrap(),
            json!({"key_alias": "app-key", "key_description": "application key"})
        );
        assert_eq!(mutating(&server.actions().await), vec!["create-key"]);
    }

    #[tokio::test]
    async fn test_enable_disabled_key() {
        let server = MockServer::start(vec![stored_key(1, "app", KeyState::Disabled)])
            .await
            .unwrap();
        let dispatcher = server.dispatcher().unwrap();

        let mut params = ModuleParams::new("app");
        params.enable = Toggle::Yes;
        let outcome = dispatcher.run(params).await.unwrap();

        assert_eq!(outcome.msg.as_deref(), Some("The key was enabled"));
        let key = outcome.key.unwrap();
        assert!(key.is_in(&KeyState::Enabled));
        assert_eq!(key.key_alias.as_deref(), Some("app"));
        assert_eq!(
            server.last_body("enable-key").await.unwrap(),
            json!({"key_id": "11111111-0000-0000-0000-000000000001"})
        );
    }

    #[tokio::test]
    async fn test_enable_enabled_key_issues_no_mutation() {
        let server = MockServer::start(vec![stored_key(1, "app", KeyState::Enabled)])
            .await
            .unwrap();
        let dispatcher = server.dispatcher().unwrap();

        let mut params = ModuleParams::new("app");
        params.enable = Toggle::Yes;
        let err = dispatcher.run(params).await.unwrap_err();

        assert_eq!(err.to_string(), "Only a disabled key can be used.");
        assert_eq!(server.actions().await, vec!["list-keys"]);
    }

    #[tokio::test]
    async fn test_lookup_by_id_walks_pages() {
        let keys: Vec<Key> = (1..=5)
            .map(|n| stored_key(n, &format!("key-{n}"), KeyState::Enabled))
            .collect();
        let server = MockServer::start(keys).await.unwrap();
        let client = OtcKmsClient::new(server.config()).unwrap();

        let found = client
            .find_key("11111111-0000-0000-0000-000000000005", true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.key_alias.as_deref(), Some("key-5"));
        assert_eq!(server.actions().await.len(), 3);

        let missing = client.find_key("nope", true).await.unwrap();
        assert!(missing.is_none());

        let err = client.find_key("nope", false).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_absent_schedules_deletion_with_pending_days() {
        let server = MockServer::start(vec![stored_key(1, "app", KeyState::Enabled)])
            .await
            .unwrap();
        let dispatcher = server.dispatcher().unwrap();

        let mut params = ModuleParams::new("app");
        params.state = DesiredState::Absent;
        params.pending_days = Some(14);
        let outcome = dispatcher.run(params).await.unwrap();

        assert!(outcome.changed);
        assert_eq!(
            outcome.msg.as_deref(),
            Some("The key is scheduled to be deleted.")
        );
        assert!(outcome.key.unwrap().is_in(&KeyState::PendingDeletion));
        assert_eq!(
            server.last_body("schedule-key-deletion").await.unwrap(),
            json!({"key_id": "11111111-0000-0000-0000-000000000001", "pending_days": "14"})
        );
    }

    #[tokio::test]
    async fn test_absent_without_pending_days_omits_field() {
        let server = MockServer::start(vec![stored_key(1, "app", KeyState::Disabled)])
            .await
            .unwrap();
        let dispatcher = server.dispatcher().unwrap();

        let mut params = ModuleParams::new("app");
        params.state = DesiredState::Absent;
        dispatcher.run(params).await.unwrap();

        assert_eq!(
            server.last_body("schedule-key-deletion").await.unwrap(),
            json!({"key_id": "11111111-0000-0000-0000-000000000001"})
        );
    }

    #[tokio::test]
    async fn test_absent_already_scheduled() {
        let server = MockServer::start(vec![stored_key(1, "app", KeyState::PendingDeletion)])
            .await
            .unwrap();
        let dispatcher = server.dispatcher().unwrap();

        let mut params = ModuleParams::new("app");
        params.state = DesiredState::Absent;
        let err = dispatcher.run(params).await.unwrap_err();

        assert_eq!(err.to_string(), "The key deletion is already scheduled.");
        assert!(mutating(&server.actions().await).is_empty());
    }

    #[tokio::test]
    async fn test_cancel_then_enable() {
        let server = MockServer::start(vec![stored_key(1, "app", KeyState::PendingDeletion)])
            .await
            .unwrap();
        let dispatcher = server.dispatcher().unwrap();

        let mut cancel = ModuleParams::new("app");
        cancel.cancel_deletion = Toggle::Yes;
        let outcome = dispatcher.run(cancel).await.unwrap();
        assert_eq!(outcome.msg.as_deref(), Some("The deletion was canceled"));
        assert!(outcome.key.unwrap().is_in(&KeyState::Disabled));

        let mut enable = ModuleParams::new("app");
        enable.enable = Toggle::Yes;
        let outcome = dispatcher.run(enable).await.unwrap();
        assert!(outcome.key.unwrap().is_in(&KeyState::Enabled));

        assert_eq!(
            mutating(&server.actions().await),
            vec!["cancel-key-deletion", "enable-key"]
        );
    }

    #[tokio::test]
    async fn test_present_twice_never_creates() {
        let server = MockServer::start(vec![stored_key(1, "app", KeyState::Enabled)])
            .await
            .unwrap();
        let dispatcher = server.dispatcher().unwrap();

        for _ in 0..2 {
            let err = dispatcher.run(ModuleParams::new("app")).await.unwrap_err();
            assert_eq!(err.to_string(), "Key already exists");
        }
        assert!(mutating(&server.actions().await).is_empty());
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let server = MockServer::start(vec![stored_key(1, "app", KeyState::Enabled)])
            .await
            .unwrap();
        server.fail("disable-key").await;
        let dispatcher = server.dispatcher().unwrap();

        let mut params = ModuleParams::new("app");
        params.disable = Toggle::Yes;
        let err = dispatcher.run(params).await.unwrap_err();

        assert!(err.is_remote());
        match &err {
            CmkError::Api(ApiError::Api { status, code, .. }) => {
                assert_eq!(*status, 500);
                assert_eq!(code, "KMS.0000");
            },
            other => panic!("unexpected error: {other:?}"),
        }
        let report = FailureReport::from(&err);
        assert!(report.msg.contains("KMS.0000"));
    }

    #[tokio::test]
    async fn test_wrong_token_rejected() {
        let server = MockServer::start(vec![]).await.unwrap();
        let client =
            OtcKmsClient::new(OtcConfig::new(&server.base_url, PROJECT_ID, "wrong")).unwrap();

        let err = Dispatcher::new(client)
            .run(ModuleParams::new("app"))
            .await
            .unwrap_err();

        match err {
            CmkError::Api(ApiError::Api { status, code, .. }) => {
                assert_eq!(status, 401);
                assert_eq!(code, "APIGW.0301");
            },
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(server.actions().await.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            OtcKmsClient::new(OtcConfig::new(format!("http://{addr}"), PROJECT_ID, TOKEN))
                .unwrap();
        let err = client.find_key("app", true).await.unwrap_err();

        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[tokio::test]
    async fn test_check_mode_over_http() {
        let server = MockServer::start(vec![stored_key(1, "app", KeyState::Enabled)])
            .await
            .unwrap();
        let dispatcher = server.dispatcher().unwrap().with_check_mode(true);

        let mut params = ModuleParams::new("app");
        params.disable = Toggle::Yes;
        let outcome = dispatcher.run(params).await.unwrap();

        assert!(outcome.changed);
        assert_eq!(outcome.msg.as_deref(), Some("The key was disabled"));
        assert_eq!(server.actions().await, vec!["list-keys"]);
    }
}
