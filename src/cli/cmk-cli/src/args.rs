//! Command line and args-file parsing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser};
use serde_json::{Map, Value};

use cmk_core::{DesiredState, ModuleParams, Toggle};
use cmk_otc::OtcConfig;

/// Key of the check-mode switch in an args file.
const CHECK_MODE_KEY: &str = "_ansible_check_mode";

// ============================================================================
// CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "cmk")]
#[command(about = "Manage KMS customer master keys: create, enable, disable, schedule or cancel deletion")]
#[command(version)]
pub struct Cli {
    /// JSON document with the module parameters (replaces the parameter flags)
    #[arg(value_name = "ARGS_FILE", conflicts_with = "key")]
    pub args_file: Option<PathBuf>,

    /// Evaluate preconditions and report, without modifying the key
    #[arg(long)]
    pub check: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub params: ParamArgs,
}

#[derive(Args)]
pub struct ConnectionArgs {
    /// KMS endpoint
    #[arg(long, env = "OTC_KMS_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Project owning the keys
    #[arg(long, env = "OTC_PROJECT_ID")]
    pub project_id: Option<String>,

    /// IAM token
    #[arg(long, env = "OTC_AUTH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value = "30", env = "OTC_KMS_TIMEOUT")]
    pub timeout: u64,

    /// Development mode: in-memory KMS, empty at every start and gone on exit.
    /// A run can only create a key or report that it is missing or exists;
    /// enable, disable and deletion requests need a real endpoint.
    #[arg(long, env = "CMK_DEV_MODE")]
    pub dev: bool,
}

#[derive(Args, Default)]
pub struct ParamArgs {
    /// Key alias (to create) or alias/id (to look up)
    #[arg(long)]
    pub key: Option<String>,

    /// Description of the key to create
    #[arg(long)]
    pub key_description: Option<String>,

    /// Origin of the key material to create (kms, external)
    #[arg(long)]
    pub origin: Option<String>,

    /// 36-byte request serial number
    #[arg(long)]
    pub sequence: Option<String>,

    /// Days before a scheduled deletion becomes effective (7-1096)
    #[arg(long)]
    pub pending_days: Option<u32>,

    /// Enable a disabled key (yes, no)
    #[arg(long, default_value = "no")]
    pub enable: Toggle,

    /// Disable an enabled key (yes, no)
    #[arg(long, default_value = "no")]
    pub disable: Toggle,

    /// Cancel a scheduled deletion (yes, no)
    #[arg(long, default_value = "no")]
    pub cancel_deletion: Toggle,

    /// Desired state (present, absent)
    #[arg(long, default_value = "present")]
    pub state: DesiredState,
}

// ============================================================================
// Invocation
// ============================================================================

/// Parameters of one run plus the check-mode switch.
#[derive(Debug, PartialEq, Eq)]
pub struct Invocation {
    pub params: ModuleParams,
    pub check_mode: bool,
}

impl ConnectionArgs {
    /// Builds the client settings, failing on the first missing one.
    pub fn otc_config(&self) -> Result<OtcConfig> {
        let endpoint = self
            .endpoint
            .clone()
            .context("KMS endpoint required. Set OTC_KMS_ENDPOINT or use --endpoint")?;
        let project_id = self
            .project_id
            .clone()
            .context("Project id required. Set OTC_PROJECT_ID or use --project-id")?;
        let token = self
            .token
            .clone()
            .context("Authentication token required. Set OTC_AUTH_TOKEN or use --token")?;

        Ok(OtcConfig::new(endpoint, project_id, token)
            .with_timeout(Duration::from_secs(self.timeout)))
    }
}

impl ParamArgs {
    /// Converts the flags into module parameters.
    pub fn into_params(self) -> Result<ModuleParams> {
        let key = self
            .key
            .context("--key is required when no ARGS_FILE is given")?;

        Ok(ModuleParams {
            key,
            key_description: self.key_description,
            origin: self.origin,
            sequence: self.sequence,
            pending_days: self.pending_days,
            enable: self.enable,
            disable: self.disable,
            cancel_deletion: self.cancel_deletion,
            state: self.state,
        })
    }
}

/// Reads a JSON args file.
pub fn load_args_file(path: &Path) -> Result<Invocation> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read args file {}", path.display()))?;
    parse_args_document(&text)
}

/// Parses a JSON parameter document.
///
/// Keys starting with `_` are framework settings: `_ansible_check_mode` is
/// honored, the others are dropped.
pub fn parse_args_document(text: &str) -> Result<Invocation> {
    let mut doc: Map<String, Value> =
        serde_json::from_str(text).context("Args file must be a JSON object")?;

    let check_mode = doc
        .get(CHECK_MODE_KEY)
        .and_then(Value::as_bool)
        .unwrap_or(false);
    doc.retain(|name, _| !name.starts_with('_'));

    let params = serde_json::from_value(Value::Object(doc))
        .context("Invalid module parameters")?;

    Ok(Invocation { params, check_mode })
}

impl Cli {
    /// Resolves the parameters from the args file or the flags.
    pub fn invocation(args_file: Option<&Path>, params: ParamArgs) -> Result<Invocation> {
        match args_file {
            Some(path) => load_args_file(path),
            None => Ok(Invocation {
                params: params.into_params()?,
                check_mode: false,
            }),
        }
    }
}
