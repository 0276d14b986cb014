//! # CMK Core
//!
//! Lifecycle dispatcher for cloud KMS customer master keys (CMK).
//!
//! ## Features
//!
//! - Flat module parameters validated into a typed intent
//! - Lookup by alias or id, then exactly one mutating request
//! - Create, enable, disable, schedule deletion, cancel deletion
//! - Check mode (preconditions only, no mutation)
//! - In-memory KMS backend for development and tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod key;
pub mod memory;
pub mod params;
pub mod request;

pub use client::{CreateKeyAttrs, KmsClient};
pub use dispatcher::{Dispatcher, FailureReport, Outcome};
pub use error::{ApiError, CmkError};
pub use key::{Key, KeyState, Origin};
pub use memory::{InMemoryKms, Mutation};
pub use params::{DesiredState, ModuleParams, Toggle};
pub use request::{Intent, Request, Transition};
