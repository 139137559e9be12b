// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-webauth project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rocket binding of the authentication flow
//!
//! The session lives in a [`crate::auth::SessionStore`]; the browser only
//! holds its id in an encrypted private cookie, so the `secrets` feature of
//! Rocket and a configured `server.secret_key` are required in production.

pub mod gates;
pub mod guards;
pub mod handlers;
pub mod server;

pub use guards::{Authenticated, SessionHandle, SESSION_COOKIE};
pub use handlers::FlowResponse;
pub use server::{build_rocket, figment};
