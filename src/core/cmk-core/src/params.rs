//! Module parameters and boundary validation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::client::CreateKeyAttrs;
use crate::error::CmkError;
use crate::key::Origin;
use crate::request::{Intent, Transition};

/// Shortest deletion grace period the provider accepts.
pub const MIN_PENDING_DAYS: u32 = 7;

/// Longest deletion grace period the provider accepts.
pub const MAX_PENDING_DAYS: u32 = 1096;

/// Length of a request serial number.
pub const SEQUENCE_LEN: usize = 36;

/// A `yes`/`no` flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Toggle {
    /// `yes`
    Yes,
    /// `no`
    #[default]
    No,
}

impl Toggle {
    /// Returns true for `yes`.
    pub fn is_yes(self) -> bool {
        self == Toggle::Yes
    }
}

impl FromStr for Toggle {
    type Err = CmkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(Toggle::Yes),
            "no" => Ok(Toggle::No),
            other => Err(CmkError::InvalidParameter(format!(
                "expected one of yes, no (got '{other}')"
            ))),
        }
    }
}

impl fmt::Display for Toggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Toggle::Yes => "yes",
            Toggle::No => "no",
        })
    }
}

/// Desired state of the key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    /// The key must exist (created, or transitioned by a flag).
    #[default]
    Present,
    /// The key must be scheduled for deletion.
    Absent,
}

impl FromStr for DesiredState {
    type Err = CmkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(DesiredState::Present),
            "absent" => Ok(DesiredState::Absent),
            other => Err(CmkError::InvalidParameter(format!(
                "state must be one of present, absent (got '{other}')"
            ))),
        }
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DesiredState::Present => "present",
            DesiredState::Absent => "absent",
        })
    }
}

/// Parameters of one module invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleParams {
    /// Alias (to create) or alias/id (to look up).
    pub key: String,
    /// Description used on creation.
    #[serde(default)]
    pub key_description: Option<String>,
    /// `kms` or `external`, used on creation.
    #[serde(default)]
    pub origin: Option<String>,
    /// Request serial number used on creation.
    #[serde(default)]
    pub sequence: Option<String>,
    /// Grace period used when scheduling deletion.
    #[serde(default)]
    pub pending_days: Option<u32>,
    /// Enable a disabled key.
    #[serde(default)]
    pub enable: Toggle,
    /// Disable an enabled key.
    #[serde(default)]
    pub disable: Toggle,
    /// Cancel a scheduled deletion.
    #[serde(default)]
    pub cancel_deletion: Toggle,
    /// Desired state.
    #[serde(default)]
    pub state: DesiredState,
}

impl ModuleParams {
    /// Creates parameters for `key` with every option at its default.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Validates the flat parameter set into a typed intent.
    ///
    /// `enable`, `disable` and `cancel_deletion` are resolved in that order;
    /// the first one set wins.
    pub fn validate(self) -> Result<Intent, CmkError> {
        if self.key.trim().is_empty() {
            return Err(CmkError::InvalidParameter("key cannot be empty".into()));
        }
        let key = self.key;

        if let Some(days) = self.pending_days {
            if !(MIN_PENDING_DAYS..=MAX_PENDING_DAYS).contains(&days) {
                return Err(CmkError::InvalidParameter(format!(
                    "pending_days must be between {MIN_PENDING_DAYS} and {MAX_PENDING_DAYS} (got {days})"
                )));
            }
        }

        match self.state {
            DesiredState::Absent => Ok(Intent::Absent {
                key,
                pending_days: self.pending_days,
            }),
            DesiredState::Present => {
                let origin = non_empty(self.origin)
                    .map(|o| o.parse::<Origin>())
                    .transpose()?;

                let sequence = non_empty(self.sequence);
                if let Some(seq) = &sequence {
                    if seq.len() != SEQUENCE_LEN {
                        return Err(CmkError::InvalidParameter(format!(
                            "sequence must be {SEQUENCE_LEN} bytes long (got {})",
                            seq.len()
                        )));
                    }
                }

                let flags = [
                    (self.enable, Transition::Enable),
                    (self.disable, Transition::Disable),
                    (self.cancel_deletion, Transition::CancelDeletion),
                ];
                let mut requested = flags
                    .iter()
                    .filter(|(flag, _)| flag.is_yes())
                    .map(|(_, transition)| *transition);
                let transition = requested.next();
                let ignored: Vec<Transition> = requested.collect();
                if let Some(chosen) = transition {
                    if !ignored.is_empty() {
                        warn!(
                            chosen = ?chosen,
                            ignored = ?ignored,
                            "Several transitions requested, only the first one applies"
                        );
                    }
                }

                Ok(Intent::Present {
                    create: CreateKeyAttrs {
                        key_alias: key.clone(),
                        key_description: non_empty(self.key_description),
                        origin,
                        sequence,
                    },
                    key,
                    transition,
                })
            },
        }
    }
}

/// Treats empty strings like unset options.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
