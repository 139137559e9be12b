// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-webauth project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Web server configuration
//!
//! Binding, cookie encryption and TLS settings handed to Rocket.
//!
//! ### TLS Configuration
//!
//! For HTTPS both `cert` and `key` must be provided as Base64-encoded PEM
//! files. If neither is set the server runs without TLS.

use serde::{Deserialize, Serialize};

/// Configuration of the Rocket server hosting the authentication routes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The TCP port the server listens on.
    ///
    /// Valid range is 1-65534. Default value is 8000.
    #[serde(default = "default_port")]
    pub port: u16,

    /// The network address the server binds to.
    ///
    /// Default is "127.0.0.1". Use "0.0.0.0" to bind to all IPv4 interfaces.
    #[serde(default = "default_address")]
    pub address: String,

    /// The server name reported in HTTP headers.
    #[serde(default = "default_name")]
    pub name: String,

    /// Base64 key encrypting the private session cookie.
    ///
    /// Must decode to at least 32 bytes. When absent, Rocket generates an
    /// ephemeral key in debug builds and refuses to start in release builds.
    #[serde(default)]
    pub secret_key: Option<String>,

    /// SSL/TLS certificate in PEM format, Base64 encoded.
    #[serde(default)]
    pub cert: Option<String>,

    /// SSL/TLS private key in PEM format, Base64 encoded.
    #[serde(default)]
    pub key: Option<String>,
}

fn default_port() -> u16 {
    8000
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_name() -> String {
    format!("RustWebAuth/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            address: default_address(),
            name: default_name(),
            secret_key: None,
            cert: None,
            key: None,
        }
    }
}
