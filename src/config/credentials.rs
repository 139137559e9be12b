// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-webauth project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Application registration and authorities
//!
//! The application is registered with the identity provider under a client id
//! inside a tenant. Deployments using user-flow policies (sign-up/sign-in and
//! password reset) configure one authority per policy; the sign-up/sign-in
//! authority then replaces the tenant authority for sign-in, key discovery and
//! sign-out.

use serde::{Deserialize, Serialize};

/// Client registration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Application (client) id issued by the identity provider
    #[serde(default)]
    pub client_id: String,

    /// Directory (tenant) id the application is registered in
    #[serde(default)]
    pub tenant_id: String,

    /// Client secret used for the token grants
    #[serde(default)]
    pub client_secret: String,
}

/// Policy authorities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoliciesConfig {
    /// Authority of the sign-up/sign-in policy,
    /// e.g. `https://contoso.b2clogin.com/contoso.onmicrosoft.com/B2C_1_susi`
    pub sign_up_sign_in: String,

    /// Authority of the password reset policy
    pub reset_password: String,
}
