//! Request and response bodies of the KMS API.

use serde::{Deserialize, Serialize};

use cmk_core::{ApiError, Key};

/// Page size used when listing keys.
pub(crate) const LIST_LIMIT: &str = "100";

#[derive(Serialize)]
pub(crate) struct KeyIdBody<'a> {
    pub key_id: &'a str,
}

#[derive(Serialize)]
pub(crate) struct ScheduleDeletionBody<'a> {
    pub key_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_days: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct ListKeysBody<'a> {
    pub limit: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<&'a str>,
}

#[derive(Deserialize)]
pub(crate) struct ListKeysResponse {
    #[serde(default)]
    pub key_details: Vec<Key>,
    #[serde(default)]
    pub next_marker: Option<String>,
    #[serde(default)]
    pub truncated: Option<Truncated>,
}

/// `truncated` comes back as `"true"`/`"false"`.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum Truncated {
    Text(String),
    Flag(bool),
}

impl ListKeysResponse {
    /// Marker of the next page, if there is one.
    pub fn next_page(&self) -> Option<&str> {
        let truncated = match &self.truncated {
            Some(Truncated::Text(text)) => text == "true",
            Some(Truncated::Flag(flag)) => *flag,
            None => false,
        };
        if truncated {
            self.next_marker.as_deref().filter(|m| !m.is_empty())
        } else {
            None
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct KeyInfoResponse {
    pub key_info: Key,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    error_code: String,
    error_msg: String,
}

/// Maps a non-2xx response to an [`ApiError`].
pub(crate) fn api_error(status: u16, body: &[u8]) -> ApiError {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(ErrorBody { error }) => ApiError::Api {
            status,
            code: error.error_code,
            message: error.error_msg,
        },
        Err(_) => ApiError::Api {
            status,
            code: "unknown".into(),
            message: String::from_utf8_lossy(body).trim().to_string(),
        },
    }
}
