//! # CMK OTC Client
//!
//! [`KmsClient`](cmk_core::KmsClient) implementation over the Open Telekom
//! Cloud KMS REST API (`/v1.0/{project_id}/kms/...`).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
mod wire;

pub use client::OtcKmsClient;
pub use config::OtcConfig;
pub use error::ConfigError;
