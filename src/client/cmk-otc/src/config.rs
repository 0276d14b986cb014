//! Connection settings.

use std::fmt;
use std::time::Duration;

use zeroize::Zeroizing;

use crate::error::ConfigError;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for reaching the KMS API of one project.
#[derive(Clone)]
pub struct OtcConfig {
    /// KMS endpoint, e.g. `https://kms.eu-de.otc.t-systems.com`.
    pub endpoint: String,
    /// Project the keys belong to.
    pub project_id: String,
    /// Pre-issued IAM token, sent as `X-Auth-Token`.
    pub token: Zeroizing<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl OtcConfig {
    /// Creates settings with the default timeout.
    pub fn new(
        endpoint: impl Into<String>,
        project_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            project_id: project_id.into(),
            token: Zeroizing::new(token.into()),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks that every setting is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Missing("endpoint"));
        }
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(ConfigError::InvalidEndpoint(self.endpoint.clone()));
        }
        if self.project_id.trim().is_empty() {
            return Err(ConfigError::Missing("project_id"));
        }
        if self.token.trim().is_empty() {
            return Err(ConfigError::Missing("token"));
        }
        Ok(())
    }

    /// Base URL of the KMS actions, with a trailing slash.
    pub fn base_url(&self) -> String {
        format!(
            "{}/v1.0/{}/kms/",
            self.endpoint.trim_end_matches('/'),
            self.project_id
        )
    }
}

impl fmt::Debug for OtcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtcConfig")
            .field("endpoint", &self.endpoint)
            .field("project_id", &self.project_id)
            .field("token", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}
