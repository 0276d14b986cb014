//! Dispatcher and client error types.

use thiserror::Error;

use crate::key::Key;

/// Errors raised by a [`KmsClient`](crate::KmsClient) implementation.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never got a response (connection, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider answered with an error document.
    #[error("kms api error (HTTP {status}): {code}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Provider error code (e.g. `KMS.0205`).
        code: String,
        /// Provider error message.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Lookup miss with `ignore_missing` unset.
    #[error("key not found: {0}")]
    NotFound(String),
}

/// Errors that end a dispatcher run.
///
/// The precondition variants render the exact message reported to the caller.
#[derive(Debug, Error)]
pub enum CmkError {
    /// Parameter rejected before any remote call.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// `enable=yes` on a key that is not disabled.
    #[error("Only a disabled key can be used.")]
    NotDisabled,

    /// `disable=yes` on a key that is not enabled.
    #[error("Only an enabled key can be used.")]
    NotEnabled,

    /// `cancel_deletion=yes` on a key that is not pending deletion.
    #[error("Only an scheduled to be deleted key can be used.")]
    NotPendingDeletion(Box<Key>),

    /// `state=present` on an existing key with no transition requested.
    #[error("Key already exists")]
    AlreadyExists,

    /// `state=absent` on a key that cannot be found.
    #[error("The key doesn't exist")]
    KeyNotFound,

    /// `state=absent` on a key already pending deletion.
    #[error("The key deletion is already scheduled.")]
    DeletionAlreadyScheduled,

    /// Client failure, propagated unchanged.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl CmkError {
    /// Key to attach to the failure report, if the failure carries one.
    pub fn key(&self) -> Option<&Key> {
        match self {
            CmkError::NotPendingDeletion(key) => Some(key),
            _ => None,
        }
    }

    /// Whether the failure came from the KMS client rather than a local check.
    pub fn is_remote(&self) -> bool {
        matches!(self, CmkError::Api(_))
    }
}
