// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-webauth project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings. The configuration is backed by a YAML file and
//! validated against a JSON schema, then against rules the schema cannot
//! express (see [`utils::validate_specific_rules`]).
//!
//! ## Configuration Structure
//!
//! - `credentials`: client id, tenant id and client secret
//! - `authority`: tenant authority URL
//! - `policies`: optional sign-up/sign-in and password reset authorities
//! - `settings`: redirect URIs and route layout
//! - `resources`: downstream resources keyed by name
//! - `protected_routes`: bearer-protected API routes and their scopes
//! - `key_cache_ttl_secs`: lifetime of cached signing keys
//! - `server`: Rocket binding, cookie secret and TLS
//!
//! ## Usage
//!
//! ```no_run
//! use rust_webauth::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(Some(8081), Some("0.0.0.0".to_string()));
//!
//! println!("Sign-in route: {}", config.settings.sign_in_route());
//! ```

pub mod credentials;
pub mod server;
pub mod settings;
pub mod utils;

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

pub use credentials::{CredentialsConfig, PoliciesConfig};
pub use server::ServerConfig;
pub use settings::{ProtectedRoute, ResourceDescriptor, SettingsConfig};
pub use utils::{is_valid_ip_address, output_config_schema};

/// Root configuration structure.
///
/// Each section uses default values when not explicitly specified in the
/// configuration file. Credentials have no usable default: a configuration
/// without them fails [`utils::validate_specific_rules`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Client registration with the identity provider.
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Tenant authority, e.g. `https://login.microsoftonline.com/{tenant_id}`.
    #[serde(default = "default_authority")]
    pub authority: String,

    /// User-flow policies. When present, the sign-up/sign-in authority is
    /// used instead of `authority` and ID tokens may omit `tid`.
    #[serde(default)]
    pub policies: Option<PoliciesConfig>,

    /// Redirect URIs and routes of the web application.
    #[serde(default)]
    pub settings: SettingsConfig,

    /// Downstream resources keyed by resource name.
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceDescriptor>,

    /// Bearer-protected routes keyed by route path.
    #[serde(default)]
    pub protected_routes: BTreeMap<String, ProtectedRoute>,

    /// Lifetime of cached signing key sets, in seconds.
    #[serde(default = "default_key_cache_ttl_secs")]
    pub key_cache_ttl_secs: u64,

    /// Rocket server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_authority() -> String {
    "https://login.microsoftonline.com/common".to_string()
}

fn default_key_cache_ttl_secs() -> u64 {
    600
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: CredentialsConfig::default(),
            authority: default_authority(),
            policies: None,
            settings: SettingsConfig::default(),
            resources: BTreeMap::new(),
            protected_routes: BTreeMap::new(),
            key_cache_ttl_secs: default_key_cache_ttl_secs(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Whether the deployment uses user-flow policies
    pub fn uses_policies(&self) -> bool {
        self.policies.is_some()
    }

    /// Authority used for sign-in, key discovery and sign-out
    pub fn default_authority(&self) -> &str {
        match &self.policies {
            Some(policies) => &policies.sign_up_sign_in,
            None => &self.authority,
        }
    }

    /// Authority of the password reset policy, if any
    pub fn reset_password_authority(&self) -> Option<&str> {
        self.policies
            .as_ref()
            .map(|policies| policies.reset_password.as_str())
    }

    /// Resource whose calling page is `route`
    pub fn resource_for_route(&self, route: &str) -> Option<(&str, &ResourceDescriptor)> {
        self.resources
            .iter()
            .find(|(_, resource)| resource.calling_page_route == route)
            .map(|(name, resource)| (name.as_str(), resource))
    }

    /// Scopes a bearer token must carry on `route`; empty for unlisted routes
    pub fn required_scopes(&self, route: &str) -> BTreeSet<String> {
        self.protected_routes
            .get(route)
            .map(|protected| protected.scopes.clone())
            .unwrap_or_default()
    }

    /// Check the rules the JSON schema cannot express
    pub fn validate(&self) -> Result<(), crate::error::AuthError> {
        utils::validate_specific_rules(self)
    }

    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Original path: {:?}, Sample path: {:?}", path, sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating parent directory: {:?}", parent);
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// A missing file is created with default values. A file failing schema
    /// validation, deserialization or the specific rules produces a sample
    /// file next to it and an error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        // First step: convert YAML to a generic Value
        let yaml_value: serde_yml::Value = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML configuration from {:?}", path))?;

        // Convert to JSON Value for validation
        let json_value = serde_json::to_value(&yaml_value).with_context(|| {
            format!("Failed to convert YAML to JSON for validation: {:?}", path)
        })?;

        let schema_str = include_str!("../../resources/config.schema.json");
        let schema: serde_json::Value =
            serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        debug!("Validating {} configuration against schema", path.display());
        if let Err(error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            Self::create_sample_config(path)?;
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        debug!("Schema validation passed, deserializing into Config structure");
        let config: Config = match serde_yml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                error!("Configuration deserialization error: {}", err);
                if let Err(e) = Self::create_sample_config(path) {
                    error!("Failed to create sample config: {}", e);
                }
                return Err(anyhow::anyhow!(
                    "Failed to deserialize configuration from {}: {}",
                    path.display(),
                    err
                ));
            }
        };

        if let Err(err) = config.validate() {
            error!("Configuration specific validation error: {}", err);
            Self::create_sample_config(path)?;
            return Err(err.into());
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only values that are explicitly provided override the existing
    /// configuration.
    ///
    /// # Parameters
    ///
    /// * `port` - TCP port for the server
    /// * `address` - Network address for the server to bind to
    pub fn apply_args(&mut self, port: Option<u16>, address: Option<String>) {
        if let Some(port) = port {
            debug!("Overriding port from command line: {}", port);
            self.server.port = port;
        }

        if let Some(address) = address {
            debug!("Overriding address from command line: {}", address);
            self.server.address = address;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(route: &str) -> ResourceDescriptor {
        ResourceDescriptor {
            endpoint: "https://graph.example.com/v1.0/me".into(),
            scopes: ["User.Read".to_string()].into_iter().collect(),
            calling_page_route: route.into(),
            on_behalf_of: false,
        }
    }

    #[test]
    fn test_default_authority_follows_policies() {
        let mut config = Config::default();
        config.authority = "https://login.example.com/tenant".into();
        assert_eq!(config.default_authority(), "https://login.example.com/tenant");
        assert!(config.reset_password_authority().is_none());

        config.policies = Some(PoliciesConfig {
            sign_up_sign_in: "https://b2c.example.com/t/B2C_1_susi".into(),
            reset_password: "https://b2c.example.com/t/B2C_1_reset".into(),
        });
        assert!(config.uses_policies());
        assert_eq!(config.default_authority(), "https://b2c.example.com/t/B2C_1_susi");
        assert_eq!(
            config.reset_password_authority(),
            Some("https://b2c.example.com/t/B2C_1_reset")
        );
    }

    #[test]
    fn test_route_lookups() {
        let mut config = Config::default();
        config.resources.insert("graph".into(), resource("/profile"));
        config.protected_routes.insert(
            "/api/todo".into(),
            ProtectedRoute {
                scopes: ["todo.read".to_string()].into_iter().collect(),
            },
        );

        let (name, found) = config.resource_for_route("/profile").unwrap();
        assert_eq!(name, "graph");
        assert_eq!(found.endpoint, "https://graph.example.com/v1.0/me");
        assert!(config.resource_for_route("/other").is_none());

        assert!(config.required_scopes("/api/todo").contains("todo.read"));
        assert!(config.required_scopes("/api/other").is_empty());
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        config.apply_args(None, None);
        assert_eq!(config.server.port, 8000);

        config.apply_args(Some(9000), Some("0.0.0.0".into()));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.address, "0.0.0.0");
    }
}
