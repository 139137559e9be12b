// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-webauth project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rust WebAuth library
//!
//! OpenID Connect redirect orchestration and bearer-token validation for
//! Rocket web applications.
//!
//! - [`auth`]: signing keys, token validation, redirect state, sessions and
//!   the [`auth::AuthFlow`] state machine
//! - [`config`]: YAML configuration validated against an embedded JSON schema
//! - [`web`]: Rocket guards, handlers and server assembly
//! - [`error`]: the [`AuthError`] taxonomy and its HTTP mapping

pub mod auth;
pub mod config;
pub mod error;
pub mod web;

pub use auth::{AuthFlow, FlowOutcome};
pub use config::Config;
pub use error::AuthError;
