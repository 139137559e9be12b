// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-webauth project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::Result;
use rust_webauth::config::{Config, PoliciesConfig, ProtectedRoute, ResourceDescriptor};
use tempfile::tempdir;

fn complete_config() -> Config {
    let mut config = Config::default();
    config.credentials.client_id = "client".into();
    config.credentials.tenant_id = "tenant".into();
    config.credentials.client_secret = "secret".into();
    config.authority = "https://login.microsoftonline.com/tenant".into();
    config.resources.insert(
        "graph".into(),
        ResourceDescriptor {
            endpoint: "https://graph.microsoft.com/v1.0/me".into(),
            scopes: ["User.Read".to_string()].into_iter().collect(),
            calling_page_route: "/profile".into(),
            on_behalf_of: false,
        },
    );
    config.protected_routes.insert(
        "/api/todo".into(),
        ProtectedRoute {
            scopes: ["todo.read".to_string()].into_iter().collect(),
        },
    );
    config
}

#[test]
fn test_config_load_and_save() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    let mut config = complete_config();
    config.server.port = 8443;
    config.policies = Some(PoliciesConfig {
        sign_up_sign_in: "https://contoso.b2clogin.com/contoso.onmicrosoft.com/B2C_1_susi".into(),
        reset_password: "https://contoso.b2clogin.com/contoso.onmicrosoft.com/B2C_1_reset".into(),
    });
    config.save_to_file(&config_path)?;

    let loaded = Config::from_file(&config_path)?;
    assert_eq!(loaded, config);
    assert!(loaded.uses_policies());
    assert_eq!(loaded.server.port, 8443);
    assert_eq!(loaded.resource_for_route("/profile").map(|(name, _)| name), Some("graph"));

    Ok(())
}

#[test]
fn test_missing_file_creates_default() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("absent.yaml");

    let config = Config::from_file(&config_path)?;
    assert!(config_path.exists());
    assert_eq!(config.server.port, 8000);
    assert_eq!(config.settings.auth_base, "/auth");
    // Defaults carry no credentials
    assert!(config.validate().is_err());

    Ok(())
}

#[test]
fn test_schema_violation_writes_sample() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");
    std::fs::write(&config_path, "server:\n  port: \"not a number\"\n")?;

    assert!(Config::from_file(&config_path).is_err());
    assert!(temp_dir.path().join("config.sample.yaml").exists());

    Ok(())
}

#[test]
fn test_specific_rules_reject_loaded_file() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    // Two resources on one calling page is valid for the schema only
    let mut config = complete_config();
    let duplicate = config.resources["graph"].clone();
    config.resources.insert("mail".into(), duplicate);
    config.save_to_file(&config_path)?;

    let err = Config::from_file(&config_path).unwrap_err();
    assert!(err.to_string().contains("/profile"));
    assert!(temp_dir.path().join("config.sample.yaml").exists());

    Ok(())
}
