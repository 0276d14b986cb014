//! CMK CLI - Customer master key lifecycle module.
//!
//! Reads the module parameters from an args file or from flags, performs one
//! lookup and at most one mutation, and prints a JSON report on stdout.
//! Logs go to stderr (`RUST_LOG`).

mod args;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::{error, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cmk_core::{
    CmkError, Dispatcher, FailureReport, InMemoryKms, KmsClient, ModuleParams, Outcome,
};
use cmk_otc::OtcKmsClient;

use crate::args::Cli;

async fn dispatch<C: KmsClient>(
    client: C,
    params: ModuleParams,
    check_mode: bool,
) -> Result<Outcome, CmkError> {
    Dispatcher::new(client)
        .with_check_mode(check_mode)
        .run(params)
        .await
}

fn setup_failure(err: anyhow::Error) -> FailureReport {
    error!(error = %format!("{err:#}"), "Setup failed");
    FailureReport::message(format!("{err:#}"))
}

async fn run(cli: Cli) -> Result<Outcome, FailureReport> {
    let Cli {
        args_file,
        check,
        connection,
        params,
    } = cli;

    let invocation = Cli::invocation(args_file.as_deref(), params).map_err(setup_failure)?;
    let check_mode = check || invocation.check_mode;

    let result = if connection.dev {
        warn!("Development mode enabled - keys only live in process memory");
        dispatch(InMemoryKms::new(), invocation.params, check_mode).await
    } else {
        let config = connection.otc_config().map_err(setup_failure)?;
        let client = OtcKmsClient::new(config)
            .context("Failed to create KMS client")
            .map_err(setup_failure)?;
        dispatch(client, invocation.params, check_mode).await
    };

    result.map_err(|err| {
        if err.is_remote() {
            error!(error = %err, "KMS call failed");
        } else {
            warn!(error = %err, "Request rejected");
        }
        FailureReport::from(&err)
    })
}

fn print_report<T: Serialize>(report: &T) {
    match serde_json::to_string(report) {
        Ok(json) => println!("{json}"),
        Err(e) => println!("{}", serialization_failure(&e)),
    }
}

/// Report used when the real one cannot be serialized.
fn serialization_failure(err: &serde_json::Error) -> serde_json::Value {
    serde_json::json!({
        "failed": true,
        "changed": false,
        "msg": format!("Failed to serialize report: {err}"),
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(outcome) => {
            print_report(&outcome);
            ExitCode::SUCCESS
        },
        Err(report) => {
            print_report(&report);
            ExitCode::FAILURE
        },
    }
}
