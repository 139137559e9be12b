// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-webauth project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use anyhow::{Context, Result};
use base64::Engine;
use log::debug;
use url::Url;

use super::Config;
use crate::error::AuthError;

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// # Example
///
/// ```bash
/// ./rust_webauth --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema_str = include_str!("../../resources/config.schema.json");

    let schema: serde_json::Value =
        serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Check if a string is a valid IP address
///
/// Validates that a string represents a valid IPv4 or IPv6 address,
/// or is one of the special values like "localhost" or "0.0.0.0".
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    matches!(addr, "localhost" | "::" | "::0" | "0.0.0.0")
}

fn require_non_empty(value: &str, field: &str) -> Result<(), AuthError> {
    if value.trim().is_empty() {
        return Err(AuthError::Configuration(format!("{} is required", field)));
    }
    Ok(())
}

fn require_http_url(value: &str, field: &str) -> Result<(), AuthError> {
    let url = Url::parse(value)
        .map_err(|e| AuthError::Configuration(format!("{} is not a valid URL: {}", field, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AuthError::Configuration(format!(
            "{} must use http or https",
            field
        )));
    }
    Ok(())
}

fn require_route(value: &str, field: &str) -> Result<(), AuthError> {
    if !value.starts_with('/') {
        return Err(AuthError::Configuration(format!(
            "{} must start with '/'",
            field
        )));
    }
    Ok(())
}

/// Validates the configuration against additional rules that aren't covered by the JSON schema.
///
/// # Validation Rules
///
/// - **Credentials**: `client_id`, `tenant_id` and `client_secret` are present
/// - **Authorities**: the tenant authority and, when configured, both policy
///   authorities are http(s) URLs
/// - **Redirects**: `redirect_uri` and `post_logout_redirect_uri` are http(s) URLs
/// - **Routes**: the home route, the auth base, every calling page route and
///   every protected route start with `/`, and no two resources share a
///   calling page route
/// - **Resources**: endpoints are http(s) URLs and request at least one scope
/// - **Server**: port within 1-65534, valid address, base64 secret key,
///   certificate and key provided together
pub fn validate_specific_rules(config: &Config) -> Result<(), AuthError> {
    debug!("Performing additional validation checks");

    require_non_empty(&config.credentials.client_id, "credentials.client_id")?;
    require_non_empty(&config.credentials.tenant_id, "credentials.tenant_id")?;
    require_non_empty(&config.credentials.client_secret, "credentials.client_secret")?;

    require_http_url(&config.authority, "authority")?;
    if let Some(policies) = &config.policies {
        require_http_url(&policies.sign_up_sign_in, "policies.sign_up_sign_in")?;
        require_http_url(&policies.reset_password, "policies.reset_password")?;
    }

    require_http_url(&config.settings.redirect_uri, "settings.redirect_uri")?;
    require_http_url(
        &config.settings.post_logout_redirect_uri,
        "settings.post_logout_redirect_uri",
    )?;
    require_route(&config.settings.home_page_route, "settings.home_page_route")?;
    require_route(&config.settings.auth_base, "settings.auth_base")?;

    let mut calling_routes = std::collections::HashSet::new();
    for (name, resource) in &config.resources {
        require_http_url(&resource.endpoint, &format!("resources.{}.endpoint", name))?;
        require_route(
            &resource.calling_page_route,
            &format!("resources.{}.calling_page_route", name),
        )?;
        if resource.scopes.is_empty() {
            return Err(AuthError::Configuration(format!(
                "resources.{}.scopes must not be empty",
                name
            )));
        }
        if !calling_routes.insert(resource.calling_page_route.as_str()) {
            return Err(AuthError::Configuration(format!(
                "route {} is used by more than one resource",
                resource.calling_page_route
            )));
        }
    }

    for route in config.protected_routes.keys() {
        require_route(route, "protected_routes")?;
    }

    if config.server.port < 1 || config.server.port > 65534 {
        return Err(AuthError::Configuration(format!(
            "Invalid port number: {}",
            config.server.port
        )));
    }
    if !is_valid_ip_address(&config.server.address) {
        return Err(AuthError::Configuration(format!(
            "Invalid address: {}",
            config.server.address
        )));
    }

    if let Some(secret) = &config.server.secret_key {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(secret)
            .map_err(|_| AuthError::Configuration("server.secret_key is not valid base64".into()))?;
        if decoded.len() < 32 {
            return Err(AuthError::Configuration(
                "server.secret_key must decode to at least 32 bytes".into(),
            ));
        }
    }

    match (&config.server.cert, &config.server.key) {
        (Some(_), None) => {
            return Err(AuthError::Configuration(
                "SSL certificate provided without a key".into(),
            ))
        }
        (None, Some(_)) => {
            return Err(AuthError::Configuration(
                "SSL key provided without a certificate".into(),
            ))
        }
        (Some(cert), Some(key)) => {
            for (value, field) in [(cert, "server.cert"), (key, "server.key")] {
                base64::engine::general_purpose::STANDARD
                    .decode(value)
                    .map_err(|_| {
                        AuthError::Configuration(format!("{} is not valid base64", field))
                    })?;
            }
        }
        (None, None) => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PoliciesConfig, ResourceDescriptor};

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.credentials.client_id = "client".into();
        config.credentials.tenant_id = "tenant".into();
        config.credentials.client_secret = "secret".into();
        config.authority = "https://login.example.com/tenant".into();
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_specific_rules(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_credentials() {
        for field in ["client_id", "tenant_id", "client_secret"] {
            let mut config = valid_config();
            match field {
                "client_id" => config.credentials.client_id.clear(),
                "tenant_id" => config.credentials.tenant_id.clear(),
                _ => config.credentials.client_secret.clear(),
            }
            match validate_specific_rules(&config) {
                Err(AuthError::Configuration(message)) => assert!(message.contains(field)),
                other => panic!("expected configuration error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_invalid_policy_authority() {
        let mut config = valid_config();
        config.policies = Some(PoliciesConfig {
            sign_up_sign_in: "not a url".into(),
            reset_password: "https://b2c.example.com/reset".into(),
        });
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn test_duplicate_calling_routes() {
        let mut config = valid_config();
        let resource = ResourceDescriptor {
            endpoint: "https://api.example.com/".into(),
            scopes: ["read".to_string()].into_iter().collect(),
            calling_page_route: "/profile".into(),
            on_behalf_of: false,
        };
        config.resources.insert("a".into(), resource.clone());
        config.resources.insert("b".into(), resource);
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn test_secret_key_length() {
        let mut config = valid_config();
        config.server.secret_key = Some(base64::engine::general_purpose::STANDARD.encode([0u8; 16]));
        assert!(validate_specific_rules(&config).is_err());
        config.server.secret_key = Some(base64::engine::general_purpose::STANDARD.encode([0u8; 32]));
        assert!(validate_specific_rules(&config).is_ok());
    }

    #[test]
    fn test_cert_without_key() {
        let mut config = valid_config();
        config.server.cert = Some("Y2VydA==".into());
        assert!(validate_specific_rules(&config).is_err());
    }
}
