// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-webauth project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the authentication server
use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;

use rust_webauth::auth::AuthFlow;
use rust_webauth::config::{output_config_schema, Config};
use rust_webauth::web::{build_rocket, figment};

/// OpenID Connect sign-in, token acquisition and bearer-protected routes
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (YAML), created with defaults when missing
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Web server port, overrides server.port
    #[arg(short, long)]
    port: Option<u16>,

    /// Web server address, overrides server.address
    #[arg(short, long)]
    address: Option<String>,

    /// Print the configuration JSON schema and exit
    #[arg(long)]
    show_config_schema: bool,
}

#[rocket::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.show_config_schema {
        return output_config_schema();
    }

    let mut config = Config::from_file(&args.config)?;
    config.apply_args(args.port, args.address);
    config.validate()?;

    info!(
        "Starting authentication server on {}:{}",
        config.server.address, config.server.port
    );

    let figment = figment(&config)?;
    let flow = AuthFlow::from_config(config);
    let rocket = build_rocket(figment, flow);
    let ignited = rocket.ignite().await?;
    ignited.launch().await?;

    Ok(())
}
