// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-webauth project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Protected resource client

use async_trait::async_trait;
use log::debug;

use crate::error::AuthError;

/// Calls a protected resource with a bearer token
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// Single `GET` on `endpoint`, returning the JSON body
    async fn get(&self, endpoint: &str, bearer_token: &str)
        -> Result<serde_json::Value, AuthError>;
}

/// [`ResourceApi`] over `reqwest`
#[derive(Clone, Default)]
pub struct HttpResourceApi {
    http: reqwest::Client,
}

impl HttpResourceApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }
}

#[async_trait]
impl ResourceApi for HttpResourceApi {
    async fn get(
        &self,
        endpoint: &str,
        bearer_token: &str,
    ) -> Result<serde_json::Value, AuthError> {
        debug!("Calling protected resource {}", endpoint);
        let response = self
            .http
            .get(endpoint)
            .bearer_auth(bearer_token)
            .send()
            .await
            .map_err(|e| AuthError::DownstreamApi(format!("{}: {}", endpoint, e)))?;

        if !response.status().is_success() {
            return Err(AuthError::DownstreamApi(format!(
                "{} returned HTTP {}",
                endpoint,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::DownstreamApi(format!("{}: invalid JSON: {}", endpoint, e)))
    }
}
