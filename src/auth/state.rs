// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-webauth project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Redirect state codec
//!
//! The `state` parameter sent to the identity provider, and echoed back on
//! the callback, carries the flow stage, the path the flow started from and
//! the session nonce. It is JSON encoded with URL-safe base64.
//!
//! The state is not signed. Its integrity relies on the nonce comparison
//! performed by the flow orchestrator.
//!
//! # Examples
//!
//! ```
//! use rust_webauth::auth::state::{RedirectState, Stage};
//!
//! let encoded = RedirectState::new(Stage::SignIn, "/", "1234").encode();
//! let decoded = RedirectState::decode(&encoded).unwrap();
//! assert_eq!(decoded.stage, Stage::SignIn);
//! assert_eq!(decoded.nonce, "1234");
//! ```

use std::fmt;
use std::str::FromStr;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Decoder accepting both padded and unpadded URL-safe input
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Stage of the redirect flow a `state` value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    SignIn,
    AcquireToken,
    ResetPassword,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::SignIn => "SIGN_IN",
            Stage::AcquireToken => "ACQUIRE_TOKEN",
            Stage::ResetPassword => "RESET_PASSWORD",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SIGN_IN" => Ok(Stage::SignIn),
            "ACQUIRE_TOKEN" => Ok(Stage::AcquireToken),
            "RESET_PASSWORD" => Ok(Stage::ResetPassword),
            other => Err(AuthError::UnknownStage(other.to_string())),
        }
    }
}

/// Decoded content of the `state` parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectState {
    pub stage: Stage,
    pub path: String,
    pub nonce: String,
}

/// Well-formed `state` whose stage has not been parsed yet
///
/// The callback compares the nonce before looking at the stage, so a forged
/// state is reported as a nonce mismatch whatever stage it names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UncheckedState {
    pub stage: String,
    pub path: String,
    pub nonce: String,
}

impl UncheckedState {
    /// Parse the stage
    ///
    /// # Errors
    ///
    /// [`AuthError::UnknownStage`] when the stage is outside [`Stage`]
    pub fn into_state(self) -> Result<RedirectState, AuthError> {
        let stage = self.stage.parse::<Stage>().inspect_err(|_| {
            warn!("Redirect state carries an unknown stage: {:?}", self.stage);
        })?;
        Ok(RedirectState {
            stage,
            path: self.path,
            nonce: self.nonce,
        })
    }
}

impl RedirectState {
    pub fn new(stage: Stage, path: impl Into<String>, nonce: impl Into<String>) -> Self {
        Self {
            stage,
            path: path.into(),
            nonce: nonce.into(),
        }
    }

    /// Encode as URL-safe base64 of `{"stage":..,"path":..,"nonce":..}`
    pub fn encode(&self) -> String {
        // Serializing a struct of strings cannot fail
        let json = serde_json::to_string(self).unwrap_or_default();
        URL_SAFE_LENIENT.encode(json)
    }

    /// Decode a `state` parameter
    ///
    /// # Errors
    ///
    /// * [`AuthError::StateDecoding`] for invalid base64, invalid JSON or
    ///   missing fields
    /// * [`AuthError::UnknownStage`] when the payload is well formed but names
    ///   a stage outside [`Stage`]
    pub fn decode(encoded: &str) -> Result<Self, AuthError> {
        Self::decode_unchecked(encoded)?.into_state()
    }

    /// Decode a `state` parameter without parsing its stage
    ///
    /// # Errors
    ///
    /// [`AuthError::StateDecoding`] for invalid base64, invalid JSON or
    /// missing fields
    pub fn decode_unchecked(encoded: &str) -> Result<UncheckedState, AuthError> {
        let bytes = URL_SAFE_LENIENT.decode(encoded.trim()).map_err(|e| {
            debug!("State is not valid base64: {}", e);
            AuthError::StateDecoding(format!("invalid base64: {}", e))
        })?;

        serde_json::from_slice(&bytes).map_err(|e| {
            debug!("State is not valid JSON: {}", e);
            AuthError::StateDecoding(format!("invalid JSON: {}", e))
        })
    }
}

/// Shorthand for `RedirectState::new(stage, path, nonce).encode()`
pub fn encode(stage: Stage, path: &str, nonce: &str) -> String {
    RedirectState::new(stage, path, nonce).encode()
}

/// Shorthand for [`RedirectState::decode`]
pub fn decode(encoded: &str) -> Result<RedirectState, AuthError> {
    RedirectState::decode(encoded)
}
