//! In-memory KMS backend.
//!
//! Mirrors the provider's state transitions closely enough for development
//! runs (`--dev`) and tests. Every mutating call is recorded, successful or
//! not.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::client::{CreateKeyAttrs, KmsClient};
use crate::error::ApiError;
use crate::key::{Key, KeyState, Origin};

/// Grace period applied when deletion is scheduled without `pending_days`.
pub const DEFAULT_PENDING_DAYS: u32 = 7;

const MILLIS_PER_DAY: u128 = 24 * 60 * 60 * 1000;
const LOCAL_DOMAIN: &str = "local";

/// A mutating call received by [`InMemoryKms`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// `create_key`.
    Create(CreateKeyAttrs),
    /// `enable_key` with the key id.
    Enable(String),
    /// `disable_key` with the key id.
    Disable(String),
    /// `cancel_key_deletion` with the key id.
    CancelDeletion(String),
    /// `schedule_key_deletion`.
    ScheduleDeletion {
        /// Key id.
        key_id: String,
        /// Requested grace period.
        pending_days: Option<u32>,
    },
}

#[derive(Debug, Default)]
struct State {
    keys: Vec<Key>,
    mutations: Vec<Mutation>,
    lookups: usize,
}

/// KMS backend holding keys in process memory.
#[derive(Debug, Default)]
pub struct InMemoryKms {
    state: Mutex<State>,
}

impl InMemoryKms {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-populated with `keys`.
    pub fn with_keys(keys: impl IntoIterator<Item = Key>) -> Self {
        Self {
            state: Mutex::new(State {
                keys: keys.into_iter().collect(),
                ..State::default()
            }),
        }
    }

    /// Snapshot of the stored keys.
    pub async fn keys(&self) -> Vec<Key> {
        self.state.lock().await.keys.clone()
    }

    /// Mutating calls received so far, in order.
    pub async fn mutations(&self) -> Vec<Mutation> {
        self.state.lock().await.mutations.clone()
    }

    /// Number of `find_key` calls received so far.
    pub async fn lookups(&self) -> usize {
        self.state.lock().await.lookups
    }

    /// Applies `change` to the stored key with `key_id` if it is in `expected`.
    async fn transition(
        &self,
        mutation: Mutation,
        key_id: &str,
        expected: KeyState,
        change: impl FnOnce(&mut Key),
    ) -> Result<Key, ApiError> {
        let mut state = self.state.lock().await;
        state.mutations.push(mutation);

        let key = state
            .keys
            .iter_mut()
            .find(|k| k.key_id == key_id)
            .ok_or_else(|| ApiError::NotFound(key_id.to_string()))?;

        if !key.is_in(&expected) {
            return Err(invalid_state(key, &expected));
        }

        change(key);
        debug!(key_id = key_id, state = ?key.key_state, "Key transitioned");
        Ok(key.clone())
    }
}

#[async_trait]
impl KmsClient for InMemoryKms {
    async fn find_key(
        &self,
        identifier: &str,
        ignore_missing: bool,
    ) -> Result<Option<Key>, ApiError> {
        let mut state = self.state.lock().await;
        state.lookups += 1;

        match state.keys.iter().find(|k| k.matches(identifier)) {
            Some(key) => Ok(Some(key.clone())),
            None if ignore_missing => Ok(None),
            None => Err(ApiError::NotFound(identifier.to_string())),
        }
    }

    async fn create_key(&self, attrs: &CreateKeyAttrs) -> Result<Key, ApiError> {
        let mut state = self.state.lock().await;
        state.mutations.push(Mutation::Create(attrs.clone()));

        if state
            .keys
            .iter()
            .any(|k| k.key_alias.as_deref() == Some(attrs.key_alias.as_str()))
        {
            return Err(ApiError::Api {
                status: 400,
                code: "LOCAL.ALIAS_EXISTS".into(),
                message: format!("alias already exists: {}", attrs.key_alias),
            });
        }

        let key = Key {
            key_id: generate_key_id(),
            domain_id: Some(LOCAL_DOMAIN.into()),
            key_alias: Some(attrs.key_alias.clone()),
            key_description: attrs.key_description.clone(),
            realm: Some(LOCAL_DOMAIN.into()),
            creation_date: Some(now_millis().to_string()),
            scheduled_deletion_date: None,
            key_state: Some(KeyState::Enabled),
            default_key_flag: Some("0".into()),
            key_type: Some("1".into()),
            origin: Some(attrs.origin.clone().unwrap_or(Origin::Kms)),
        };

        debug!(key_id = %key.key_id, alias = %attrs.key_alias, "Key created");
        state.keys.push(key.clone());
        Ok(key)
    }

    async fn enable_key(&self, key: &Key) -> Result<Key, ApiError> {
        self.transition(
            Mutation::Enable(key.key_id.clone()),
            &key.key_id,
            KeyState::Disabled,
            |k| k.key_state = Some(KeyState::Enabled),
        )
        .await
    }

    async fn disable_key(&self, key: &Key) -> Result<Key, ApiError> {
        self.transition(
            Mutation::Disable(key.key_id.clone()),
            &key.key_id,
            KeyState::Enabled,
            |k| k.key_state = Some(KeyState::Disabled),
        )
        .await
    }

    async fn cancel_key_deletion(&self, key: &Key) -> Result<Key, ApiError> {
        self.transition(
            Mutation::CancelDeletion(key.key_id.clone()),
            &key.key_id,
            KeyState::PendingDeletion,
            |k| {
                k.key_state = Some(KeyState::Disabled);
                k.scheduled_deletion_date = None;
            },
        )
        .await
    }

    async fn schedule_key_deletion(
        &self,
        key: &Key,
        pending_days: Option<u32>,
    ) -> Result<Key, ApiError> {
        let mut state = self.state.lock().await;
        state.mutations.push(Mutation::ScheduleDeletion {
            key_id: key.key_id.clone(),
            pending_days,
        });

        let stored = state
            .keys
            .iter_mut()
            .find(|k| k.key_id == key.key_id)
            .ok_or_else(|| ApiError::NotFound(key.key_id.clone()))?;

        if stored.is_in(&KeyState::PendingDeletion) {
            return Err(invalid_state(stored, &KeyState::Enabled));
        }

        let days = pending_days.unwrap_or(DEFAULT_PENDING_DAYS);
        stored.key_state = Some(KeyState::PendingDeletion);
        stored.scheduled_deletion_date =
            Some((now_millis() + u128::from(days) * MILLIS_PER_DAY).to_string());

        debug!(key_id = %stored.key_id, days = days, "Key deletion scheduled");
        Ok(stored.clone())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

fn invalid_state(key: &Key, expected: &KeyState) -> ApiError {
    ApiError::Api {
        status: 400,
        code: "LOCAL.INVALID_STATE".into(),
        message: format!(
            "key {} is in state {}, expected {}",
            key.key_id,
            key.key_state
                .as_ref()
                .map_or("unknown", |state| state.code()),
            expected
        ),
    }
}

/// Random (version 4) UUID.
fn generate_key_id() -> String {
    Uuid::new_v4().to_string()
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
