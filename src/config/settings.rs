// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-webauth project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Web application settings, protected resources and protected routes

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Redirect targets and route layout of the web application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Callback URI registered with the identity provider.
    ///
    /// Must point to `{auth_base}/redirect` on this server.
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    /// Where the identity provider sends the browser after sign-out
    #[serde(default = "default_post_logout_redirect_uri")]
    pub post_logout_redirect_uri: String,

    /// Route the browser lands on after a successful sign-in
    #[serde(default = "default_home_page_route")]
    pub home_page_route: String,

    /// Mount point of the sign-in, callback and sign-out routes
    #[serde(default = "default_auth_base")]
    pub auth_base: String,
}

fn default_redirect_uri() -> String {
    "http://localhost:8000/auth/redirect".to_string()
}

fn default_post_logout_redirect_uri() -> String {
    "http://localhost:8000/".to_string()
}

fn default_home_page_route() -> String {
    "/".to_string()
}

fn default_auth_base() -> String {
    "/auth".to_string()
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            redirect_uri: default_redirect_uri(),
            post_logout_redirect_uri: default_post_logout_redirect_uri(),
            home_page_route: default_home_page_route(),
            auth_base: default_auth_base(),
        }
    }
}

impl SettingsConfig {
    /// Route of the sign-in entry point
    pub fn sign_in_route(&self) -> String {
        format!("{}/signin", self.auth_base.trim_end_matches('/'))
    }
}

/// A downstream resource the application calls on behalf of its users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Endpoint called with the acquired token
    pub endpoint: String,

    /// Scopes requested for the token
    pub scopes: BTreeSet<String>,

    /// Route of this application whose handler needs the resource
    pub calling_page_route: String,

    /// Acquire the token by exchanging the caller's bearer token instead of
    /// using the signed-in session
    #[serde(default)]
    pub on_behalf_of: bool,
}

/// Bearer-protected API route
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedRoute {
    /// Scopes every access token must carry
    #[serde(default)]
    pub scopes: BTreeSet<String>,
}
