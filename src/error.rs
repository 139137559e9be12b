// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-webauth project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Error taxonomy for the authentication layer
//!
//! Every failure the redirect flow or the bearer-token path can produce is an
//! [`AuthError`]. Each variant maps to exactly one HTTP status through
//! [`AuthError::status`]: protocol and validation faults are `401`, provider,
//! resource and configuration faults are `500`.
//!
//! The Rocket [`Responder`] implementation never echoes internal details for
//! server errors; those are logged instead.

use log::error;
use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::Request;
use thiserror::Error;

/// Substring reported by the identity provider when the user asked for a
/// password reset from the sign-in page.
pub const PASSWORD_RESET_SIGNAL: &str = "AADB2C90118";

/// Errors raised while orchestrating authentication or validating tokens
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid or incomplete configuration, fatal at startup
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The `state` parameter is missing, not base64 or not the expected JSON
    #[error("state decoding error: {0}")]
    StateDecoding(String),

    /// The `state` parameter decoded but carries a stage this server does not know
    #[error("unknown stage in redirect state: {0}")]
    UnknownStage(String),

    /// The nonce in the returned state does not match the session nonce
    #[error("nonce mismatch between redirect state and session")]
    NonceMismatch,

    /// The token is empty, malformed or its signature does not verify
    #[error("token validation error: {0}")]
    TokenValidation(String),

    /// A claim check failed after the signature was verified
    #[error("claim error: {0}")]
    Claim(String),

    /// The signing key could not be resolved
    #[error("key resolution error: {0}")]
    KeyResolution(String),

    /// The identity provider rejected an exchange
    #[error("token exchange error: {0}")]
    Exchange(String),

    /// Silent acquisition needs the user to interact with the provider
    #[error("interaction required: {0}")]
    InteractionRequired(String),

    /// No resource is configured for the route
    #[error("no resource configured for route {0}")]
    UnknownResource(String),

    /// No bearer assertion was supplied for an on-behalf-of exchange
    #[error("missing bearer assertion for on-behalf-of exchange")]
    MissingAssertion,

    /// A protected resource call failed
    #[error("downstream API error: {0}")]
    DownstreamApi(String),

    /// No authenticated session or no bearer token
    #[error("not authenticated: {0}")]
    Unauthenticated(String),

    /// The session store failed
    #[error("session store error: {0}")]
    SessionStore(String),
}

impl AuthError {
    /// HTTP status this error is reported with
    pub fn status(&self) -> Status {
        match self {
            AuthError::StateDecoding(_)
            | AuthError::NonceMismatch
            | AuthError::TokenValidation(_)
            | AuthError::Claim(_)
            | AuthError::KeyResolution(_)
            | AuthError::Unauthenticated(_) => Status::Unauthorized,
            AuthError::Configuration(_)
            | AuthError::UnknownStage(_)
            | AuthError::Exchange(_)
            | AuthError::InteractionRequired(_)
            | AuthError::UnknownResource(_)
            | AuthError::MissingAssertion
            | AuthError::DownstreamApi(_)
            | AuthError::SessionStore(_) => Status::InternalServerError,
        }
    }

    /// Whether the provider reported the password-reset signal
    pub fn is_password_reset(&self) -> bool {
        matches!(
            self,
            AuthError::Exchange(message) | AuthError::InteractionRequired(message)
                if message.contains(PASSWORD_RESET_SIGNAL)
        )
    }
}

impl<'r> Responder<'r, 'static> for AuthError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        let body = if status == Status::Unauthorized {
            match self {
                AuthError::NonceMismatch | AuthError::StateDecoding(_) => "Not Permitted".to_string(),
                _ => "Unauthorized".to_string(),
            }
        } else {
            error!("{} {}: {}", request.method(), request.uri(), self);
            "Internal Server Error".to_string()
        };
        (status, body).respond_to(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AuthError::NonceMismatch.status(), Status::Unauthorized);
        assert_eq!(
            AuthError::StateDecoding("bad".into()).status(),
            Status::Unauthorized
        );
        assert_eq!(
            AuthError::KeyResolution("no key".into()).status(),
            Status::Unauthorized
        );
        assert_eq!(
            AuthError::Exchange("boom".into()).status(),
            Status::InternalServerError
        );
        assert_eq!(
            AuthError::UnknownStage("LOGOUT".into()).status(),
            Status::InternalServerError
        );
        assert_eq!(
            AuthError::DownstreamApi("502".into()).status(),
            Status::InternalServerError
        );
    }

    #[test]
    fn test_password_reset_detection() {
        let err = AuthError::Exchange(
            "access_denied: AADB2C90118: The user has forgotten their password.".into(),
        );
        assert!(err.is_password_reset());
        assert!(!AuthError::Exchange("invalid_grant".into()).is_password_reset());
        assert!(!AuthError::Claim(PASSWORD_RESET_SIGNAL.into()).is_password_reset());
        assert!(AuthError::InteractionRequired(
            "invalid_grant: AADB2C90118: The user has forgotten their password.".into()
        )
        .is_password_reset());
        assert!(!AuthError::InteractionRequired("login_required: ".into()).is_password_reset());
    }
}
