//! Typed lifecycle requests.
//!
//! Parameters become an [`Intent`] at the boundary. Once the key has been
//! looked up, the intent resolves to exactly one [`Request`], which maps to
//! exactly one mutating client call.

use tracing::debug;

use crate::client::{CreateKeyAttrs, KmsClient};
use crate::error::{ApiError, CmkError};
use crate::key::{Key, KeyState};

/// Transition requested on an existing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Disabled → enabled.
    Enable,
    /// Enabled → disabled.
    Disable,
    /// Pending deletion → disabled.
    CancelDeletion,
}

/// Validated parameters, before the lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// `state=present`.
    Present {
        /// Alias or id to look up.
        key: String,
        /// Attributes used if the key has to be created.
        create: CreateKeyAttrs,
        /// Transition to apply if the key exists.
        transition: Option<Transition>,
    },
    /// `state=absent`.
    Absent {
        /// Alias or id to look up.
        key: String,
        /// Grace period, provider default when `None`.
        pending_days: Option<u32>,
    },
}

impl Intent {
    /// Identifier to look the key up with.
    pub fn identifier(&self) -> &str {
        match self {
            Intent::Present { key, .. } | Intent::Absent { key, .. } => key,
        }
    }
}

/// Create a key that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    /// Attributes of the new key.
    pub attrs: CreateKeyAttrs,
}

/// Enable a disabled key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnableRequest {
    /// Key to enable.
    pub key: Key,
}

/// Disable an enabled key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisableRequest {
    /// Key to disable.
    pub key: Key,
}

/// Cancel the scheduled deletion of a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelDeletionRequest {
    /// Key pending deletion.
    pub key: Key,
}

/// Schedule a key for deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleDeletionRequest {
    /// Key to delete.
    pub key: Key,
    /// Grace period, provider default when `None`.
    pub pending_days: Option<u32>,
}

/// The single mutation a run performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// See [`CreateRequest`].
    Create(CreateRequest),
    /// See [`EnableRequest`].
    Enable(EnableRequest),
    /// See [`DisableRequest`].
    Disable(DisableRequest),
    /// See [`CancelDeletionRequest`].
    CancelDeletion(CancelDeletionRequest),
    /// See [`ScheduleDeletionRequest`].
    ScheduleDeletion(ScheduleDeletionRequest),
}

impl Request {
    /// Resolves an intent against the lookup result.
    ///
    /// Fails with the precondition the current key state violates.
    pub fn plan(intent: Intent, found: Option<Key>) -> Result<Self, CmkError> {
        match (intent, found) {
            (Intent::Present { create, .. }, None) => {
                Ok(Request::Create(CreateRequest { attrs: create }))
            },
            (Intent::Present { transition, .. }, Some(key)) => match transition {
                Some(Transition::Enable) if key.is_in(&KeyState::Disabled) => {
                    Ok(Request::Enable(EnableRequest { key }))
                },
                Some(Transition::Enable) => Err(CmkError::NotDisabled),
                Some(Transition::Disable) if key.is_in(&KeyState::Enabled) => {
                    Ok(Request::Disable(DisableRequest { key }))
                },
                Some(Transition::Disable) => Err(CmkError::NotEnabled),
                Some(Transition::CancelDeletion) if key.is_in(&KeyState::PendingDeletion) => {
                    Ok(Request::CancelDeletion(CancelDeletionRequest { key }))
                },
                Some(Transition::CancelDeletion) => Err(CmkError::NotPendingDeletion(Box::new(key))),
                None => Err(CmkError::AlreadyExists),
            },
            (Intent::Absent { .. }, None) => Err(CmkError::KeyNotFound),
            (Intent::Absent { .. }, Some(key)) if key.is_in(&KeyState::PendingDeletion) => {
                Err(CmkError::DeletionAlreadyScheduled)
            },
            (Intent::Absent { pending_days, .. }, Some(key)) => {
                Ok(Request::ScheduleDeletion(ScheduleDeletionRequest { key, pending_days }))
            },
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Create(_) => "create",
            Request::Enable(_) => "enable",
            Request::Disable(_) => "disable",
            Request::CancelDeletion(_) => "cancel_deletion",
            Request::ScheduleDeletion(_) => "schedule_deletion",
        }
    }

    /// Message reported on success.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            Request::Create(_) => None,
            Request::Enable(_) => Some("The key was enabled"),
            Request::Disable(_) => Some("The key was disabled"),
            Request::CancelDeletion(_) => Some("The deletion was canceled"),
            Request::ScheduleDeletion(_) => Some("The key is scheduled to be deleted."),
        }
    }

    /// Key the request applies to, `None` for a creation.
    pub fn target(&self) -> Option<&Key> {
        match self {
            Request::Create(_) => None,
            Request::Enable(EnableRequest { key })
            | Request::Disable(DisableRequest { key })
            | Request::CancelDeletion(CancelDeletionRequest { key })
            | Request::ScheduleDeletion(ScheduleDeletionRequest { key, .. }) => Some(key),
        }
    }

    /// Issues the mutating call.
    pub async fn execute<C>(self, client: &C) -> Result<Key, ApiError>
    where
        C: KmsClient + ?Sized,
    {
        debug!(request = self.name(), backend = client.name(), "Executing request");

        match self {
            Request::Create(CreateRequest { attrs }) => client.create_key(&attrs).await,
            Request::Enable(EnableRequest { key }) => client.enable_key(&key).await,
            Request::Disable(DisableRequest { key }) => client.disable_key(&key).await,
            Request::CancelDeletion(CancelDeletionRequest { key }) => {
                client.cancel_key_deletion(&key).await
            },
            Request::ScheduleDeletion(ScheduleDeletionRequest { key, pending_days }) => {
                client.schedule_key_deletion(&key, pending_days).await
            },
        }
    }
}
