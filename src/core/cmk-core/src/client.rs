//! KMS client trait.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ApiError;
use crate::key::{Key, Origin};

/// Attributes of a key to create.
///
/// Optional attributes left as `None` are not sent to the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateKeyAttrs {
    /// Alias of the new key.
    pub key_alias: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_description: Option<String>,
    /// Origin of the key material (provider default: `kms`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
    /// 36-byte request serial number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<String>,
}

/// Trait for KMS backends the dispatcher talks to.
///
/// Every method except [`find_key`](KmsClient::find_key) mutates the remote key.
#[async_trait]
pub trait KmsClient: Send + Sync {
    /// Looks a key up by id or alias.
    ///
    /// With `ignore_missing` a miss is `Ok(None)`; otherwise it is
    /// [`ApiError::NotFound`].
    async fn find_key(&self, identifier: &str, ignore_missing: bool)
        -> Result<Option<Key>, ApiError>;

    /// Creates a key.
    async fn create_key(&self, attrs: &CreateKeyAttrs) -> Result<Key, ApiError>;

    /// Enables a disabled key.
    async fn enable_key(&self, key: &Key) -> Result<Key, ApiError>;

    /// Disables an enabled key.
    async fn disable_key(&self, key: &Key) -> Result<Key, ApiError>;

    /// Cancels a scheduled deletion.
    async fn cancel_key_deletion(&self, key: &Key) -> Result<Key, ApiError>;

    /// Schedules deletion, after `pending_days` or the provider default.
    async fn schedule_key_deletion(
        &self,
        key: &Key,
        pending_days: Option<u32>,
    ) -> Result<Key, ApiError>;

    /// Returns the name of this backend for logging.
    fn name(&self) -> &'static str;
}
