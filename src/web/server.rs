// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-webauth project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::{Context, Result};
use base64::prelude::*;
use log::{debug, info};
use rocket::config::LogLevel;
use rocket::data::{Limits, ToByteUnit};
use rocket::figment::Figment;
use rocket::{routes, Build, Rocket};

use super::{gates, handlers};
use crate::auth::AuthFlow;
use crate::config::Config;

/// Rocket configuration derived from the `server` section
///
/// The cookie secret is merged when configured. TLS is enabled when both the
/// certificate and the key are present; they are stored Base64 encoded and
/// handed to Rocket decoded.
pub fn figment(config: &Config) -> Result<Figment> {
    let server = &config.server;
    let mut figment = rocket::Config::figment()
        .merge(("ident", server.name.clone()))
        .merge(("limits", Limits::new().limit("json", 2.mebibytes())))
        .merge(("address", server.address.clone()))
        .merge(("port", server.port))
        .merge(("log_level", LogLevel::Normal));

    if let Some(secret_key) = &server.secret_key {
        figment = figment.merge(("secret_key", secret_key.clone()));
    }

    if let (Some(cert), Some(key)) = (&server.cert, &server.key) {
        debug!("SSL certificates found in configuration, enabling TLS");

        let cert_data = BASE64_STANDARD
            .decode(cert)
            .context("Failed to decode server.cert")?;
        let key_data = BASE64_STANDARD
            .decode(key)
            .context("Failed to decode server.key")?;

        figment = figment
            .merge(("tls.certs", cert_data))
            .merge(("tls.key", key_data));

        info!("TLS enabled for web server");
    }

    Ok(figment)
}

/// Build the Rocket instance serving the authentication routes
///
/// * `{auth_base}/signin`, `{auth_base}/redirect`, `{auth_base}/signout`
/// * the home page at `home_page_route` and the claims of the signed-in user at `/id`
/// * one route per configured resource and protected route
///
/// The [`AuthFlow`] becomes managed state shared by every handler and guard.
pub fn build_rocket(figment: Figment, flow: AuthFlow) -> Rocket<Build> {
    let settings = flow.config().settings.clone();
    let configured = gates::routes_for(flow.config());
    info!(
        "Mounting authentication routes at {} and {} configured routes",
        settings.auth_base,
        configured.len()
    );

    rocket::custom(figment)
        .mount(
            settings.auth_base.as_str(),
            routes![handlers::sign_in, handlers::redirect, handlers::sign_out],
        )
        .mount(settings.home_page_route.as_str(), routes![handlers::home])
        .mount("/", routes![handlers::id])
        .mount("/", configured)
        .manage(flow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_figment_merges_server_section() {
        let mut config = Config::default();
        config.server.port = 9443;
        config.server.address = "0.0.0.0".into();
        config.server.secret_key = Some(BASE64_STANDARD.encode([7u8; 32]));

        let rocket_config: rocket::Config = figment(&config).unwrap().extract().unwrap();
        assert_eq!(rocket_config.port, 9443);
        assert_eq!(rocket_config.address.to_string(), "0.0.0.0");
        assert_eq!(rocket_config.log_level, LogLevel::Normal);
    }

    #[test]
    fn test_figment_rejects_undecodable_tls() {
        let mut config = Config::default();
        config.server.cert = Some("%%%".into());
        config.server.key = Some("%%%".into());
        assert!(figment(&config).is_err());
    }
}
