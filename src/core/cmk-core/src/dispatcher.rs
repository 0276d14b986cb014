//! CMK lifecycle dispatcher.

use serde::Serialize;
use tracing::{debug, info};

use crate::client::KmsClient;
use crate::error::CmkError;
use crate::key::Key;
use crate::params::ModuleParams;
use crate::request::Request;

/// Successful result of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    /// Whether the remote key was (or, in check mode, would be) modified.
    pub changed: bool,
    /// Resulting key attributes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<Key>,
    /// Human-readable summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

/// Failure document of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    /// Always `true`.
    pub failed: bool,
    /// Always `false`: a failed run never mutates.
    pub changed: bool,
    /// Description of the violated precondition or remote error.
    pub msg: String,
    /// Key the failure refers to, when relevant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<Key>,
}

impl From<&CmkError> for FailureReport {
    fn from(err: &CmkError) -> Self {
        Self {
            failed: true,
            changed: false,
            msg: err.to_string(),
            key: err.key().cloned(),
        }
    }
}

impl FailureReport {
    /// Failure that did not come from the dispatcher (setup, I/O).
    pub fn message(msg: impl Into<String>) -> Self {
        Self {
            failed: true,
            changed: false,
            msg: msg.into(),
            key: None,
        }
    }
}

/// Runs module invocations against a KMS client.
///
/// Each run performs one lookup and at most one mutating call.
pub struct Dispatcher<C> {
    client: C,
    check_mode: bool,
}

impl<C: KmsClient> Dispatcher<C> {
    /// Creates a dispatcher over `client`.
    pub fn new(client: C) -> Self {
        Self {
            client,
            check_mode: false,
        }
    }

    /// Enables check mode: preconditions are evaluated, nothing is mutated.
    pub fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Executes one invocation.
    ///
    /// # Errors
    ///
    /// - [`CmkError::InvalidParameter`] before any remote call
    /// - a precondition variant when the key state does not allow the request
    /// - [`CmkError::Api`] when the client fails
    pub async fn run(&self, params: ModuleParams) -> Result<Outcome, CmkError> {
        let intent = params.validate()?;

        debug!(
            identifier = intent.identifier(),
            backend = self.client.name(),
            "Looking up key"
        );
        let found = self.client.find_key(intent.identifier(), true).await?;
        debug!(
            found = found.is_some(),
            key_id = found.as_ref().map(|k| k.key_id.as_str()),
            "Lookup complete"
        );

        let request = Request::plan(intent, found)?;
        let msg = request.message().map(str::to_string);

        if self.check_mode {
            info!(request = request.name(), "Check mode, skipping mutation");
            return Ok(Outcome {
                changed: true,
                key: request.target().cloned(),
                msg,
            });
        }

        let name = request.name();
        let key = request.execute(&self.client).await?;
        info!(request = name, key_id = %key.key_id, "Key updated");

        Ok(Outcome {
            changed: true,
            key: Some(key),
            msg,
        })
    }
}
