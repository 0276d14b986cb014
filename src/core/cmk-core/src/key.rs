//! Customer master key resource types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CmkError;

/// Provider status code of a CMK.
///
/// Carried as a string on the wire (`"2"`, `"3"`, ...). Codes outside the
/// known set are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyState {
    /// `1`: created, waiting for activation.
    PendingActivation,
    /// `2`: enabled.
    Enabled,
    /// `3`: disabled.
    Disabled,
    /// `4`: deletion scheduled.
    PendingDeletion,
    /// `5`: waiting for imported key material.
    PendingImport,
    /// Any other provider code.
    Unknown(String),
}

impl KeyState {
    /// Parses a provider status code.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "1" => KeyState::PendingActivation,
            "2" => KeyState::Enabled,
            "3" => KeyState::Disabled,
            "4" => KeyState::PendingDeletion,
            "5" => KeyState::PendingImport,
            other => KeyState::Unknown(other.to_string()),
        }
    }

    /// Returns the provider status code.
    pub fn code(&self) -> &str {
        match self {
            KeyState::PendingActivation => "1",
            KeyState::Enabled => "2",
            KeyState::Disabled => "3",
            KeyState::PendingDeletion => "4",
            KeyState::PendingImport => "5",
            KeyState::Unknown(code) => code,
        }
    }
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for KeyState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for KeyState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Code {
            Text(String),
            Number(u64),
        }

        Ok(match Code::deserialize(deserializer)? {
            Code::Text(code) => KeyState::from_code(&code),
            Code::Number(code) => KeyState::from_code(&code.to_string()),
        })
    }
}

/// Origin of the key material.
///
/// Values outside the known set are kept verbatim so that one odd key does
/// not break decoding of a whole listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Material generated by the KMS.
    Kms,
    /// Material imported by the user.
    External,
    /// Any other provider value, including an empty one.
    Unknown(String),
}

impl Origin {
    /// Maps a provider value, without rejecting unknown ones.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "kms" => Origin::Kms,
            "external" => Origin::External,
            other => Origin::Unknown(other.to_string()),
        }
    }

    /// Wire name.
    pub fn as_str(&self) -> &str {
        match self {
            Origin::Kms => "kms",
            Origin::External => "external",
            Origin::Unknown(value) => value,
        }
    }
}

impl Serialize for Origin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Origin {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Origin::from_wire(&value))
    }
}

impl FromStr for Origin {
    type Err = CmkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kms" => Ok(Origin::Kms),
            "external" => Ok(Origin::External),
            other => Err(CmkError::InvalidParameter(format!(
                "origin must be one of kms, external (got '{other}')"
            ))),
        }
    }
}

/// A customer master key as reported by the KMS.
///
/// Only `key_id` is guaranteed; mutation responses carry a subset of the
/// attributes and are merged into the key they were issued for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    /// CMK ID.
    pub key_id: String,
    /// User domain ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,
    /// Key alias (the name used for lookups).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_alias: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_description: Option<String>,
    /// Region the key lives in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
    /// Creation time, milliseconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    /// Scheduled deletion time, milliseconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_deletion_date: Option<String>,
    /// Provider status code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_state: Option<KeyState>,
    /// `1` for the service default key, `0` otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_key_flag: Option<String>,
    /// Key algorithm family.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<String>,
    /// Origin of the key material.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
}

impl Key {
    /// Creates a key handle with only an id.
    pub fn new(key_id: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            ..Self::default()
        }
    }

    /// Sets the alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.key_alias = Some(alias.into());
        self
    }

    /// Sets the state.
    pub fn with_state(mut self, state: KeyState) -> Self {
        self.key_state = Some(state);
        self
    }

    /// Returns true if the key is currently in `state`.
    pub fn is_in(&self, state: &KeyState) -> bool {
        self.key_state.as_ref() == Some(state)
    }

    /// Returns true if `identifier` is this key's id or alias.
    pub fn matches(&self, identifier: &str) -> bool {
        self.key_id == identifier || self.key_alias.as_deref() == Some(identifier)
    }

    /// Overlays the fields present in a (partial) provider response.
    pub fn merge(&mut self, update: Key) {
        if !update.key_id.is_empty() {
            self.key_id = update.key_id;
        }
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if update.$field.is_some() {
                    self.$field = update.$field;
                })*
            };
        }
        overlay!(
            domain_id,
            key_alias,
            key_description,
            realm,
            creation_date,
            scheduled_deletion_date,
            key_state,
            default_key_flag,
            key_type,
            origin
        );
    }
}
