//! HTTP client for the KMS API.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use cmk_core::{ApiError, CreateKeyAttrs, Key, KmsClient};

use crate::config::OtcConfig;
use crate::error::ConfigError;
use crate::wire::{
    api_error, KeyIdBody, KeyInfoResponse, ListKeysBody, ListKeysResponse,
    ScheduleDeletionBody, LIST_LIMIT,
};

/// Header carrying the IAM token.
const AUTH_HEADER: &str = "X-Auth-Token";

/// KMS client for one project.
pub struct OtcKmsClient {
    client: Client,
    config: OtcConfig,
    base_url: String,
}

impl OtcKmsClient {
    /// Builds a client from validated settings.
    pub fn new(config: OtcConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            config,
        })
    }

    /// Settings this client was built with.
    pub fn config(&self) -> &OtcConfig {
        &self.config
    }

    fn url(&self, action: &str) -> String {
        format!("{}{}", self.base_url, action)
    }

    async fn post<B, R>(&self, action: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = self.url(action);
        debug!(url = %url, "KMS request");

        let resp = self
            .client
            .post(&url)
            .header(AUTH_HEADER, self.config.token.as_str())
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        debug!(action = action, status = status.as_u16(), "KMS response");

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &bytes));
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::Decode(format!("{action}: {e}")))
    }

    /// Posts `{key_id}` to `action` and merges the `key_info` answer into `key`.
    async fn key_info_action(&self, action: &str, key: &Key) -> Result<Key, ApiError> {
        let resp: KeyInfoResponse = self
            .post(action, &KeyIdBody {
                key_id: &key.key_id,
            })
            .await?;

        let mut updated = key.clone();
        updated.merge(resp.key_info);
        Ok(updated)
    }
}

#[async_trait]
impl KmsClient for OtcKmsClient {
    async fn find_key(
        &self,
        identifier: &str,
        ignore_missing: bool,
    ) -> Result<Option<Key>, ApiError> {
        let mut marker: Option<String> = None;

        loop {
            let page: ListKeysResponse = self
                .post("list-keys", &ListKeysBody {
                    limit: LIST_LIMIT,
                    marker: marker.as_deref(),
                })
                .await?;

            if let Some(key) = page.key_details.iter().find(|k| k.matches(identifier)) {
                return Ok(Some(key.clone()));
            }

            match page.next_page() {
                Some(next) if marker.as_deref() != Some(next) => marker = Some(next.to_string()),
                _ => break,
            }
        }

        if ignore_missing {
            Ok(None)
        } else {
            Err(ApiError::NotFound(identifier.to_string()))
        }
    }

    async fn create_key(&self, attrs: &CreateKeyAttrs) -> Result<Key, ApiError> {
        let resp: KeyInfoResponse = self.post("create-key", attrs).await?;

        let mut key = Key {
            key_alias: Some(attrs.key_alias.clone()),
            key_description: attrs.key_description.clone(),
            origin: attrs.origin.clone(),
            ..Key::default()
        };
        key.merge(resp.key_info);
        Ok(key)
    }

    async fn enable_key(&self, key: &Key) -> Result<Key, ApiError> {
        self.key_info_action("enable-key", key).await
    }

    async fn disable_key(&self, key: &Key) -> Result<Key, ApiError> {
        self.key_info_action("disable-key", key).await
    }

    async fn cancel_key_deletion(&self, key: &Key) -> Result<Key, ApiError> {
        let resp: Key = self
            .post("cancel-key-deletion", &KeyIdBody {
                key_id: &key.key_id,
            })
            .await?;

        let mut updated = key.clone();
        updated.scheduled_deletion_date = None;
        updated.merge(resp);
        Ok(updated)
    }

    async fn schedule_key_deletion(
        &self,
        key: &Key,
        pending_days: Option<u32>,
    ) -> Result<Key, ApiError> {
        let resp: Key = self
            .post("schedule-key-deletion", &ScheduleDeletionBody {
                key_id: &key.key_id,
                pending_days: pending_days.map(|days| days.to_string()),
            })
            .await?;

        let mut updated = key.clone();
        updated.merge(resp);
        Ok(updated)
    }

    fn name(&self) -> &'static str {
        "otc"
    }
}
