// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-webauth project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Identity provider client
//!
//! [`IdentityProvider`] is the seam between the flow orchestrator and the
//! OAuth2 endpoints of the identity provider. It builds authorization URLs and
//! performs the three token grants the flows need:
//!
//! - authorization code exchange after the redirect callback
//! - silent acquisition for an already signed-in account
//! - on-behalf-of exchange of an incoming bearer assertion
//!
//! [`HttpIdentityProvider`] talks to the v2.0 `authorize` and `token`
//! endpoints with form-encoded `reqwest` posts and keeps the refresh tokens it
//! receives in memory, keyed by home account id, to serve silent requests.
//!
//! ID tokens are decoded without verification here; the orchestrator runs
//! their claims through the validator before trusting them.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use log::{debug, warn};
use serde::Deserialize;
use tokio::sync::RwLock;
use url::Url;

use super::claims::Claims;
use super::session::{AccountRef, PendingRequest};
use crate::error::AuthError;

/// Authorization URL request: authority, scopes, state and redirect URI
pub type AuthCodeRequest = PendingRequest;

/// Grant type of the on-behalf-of exchange
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Provider error codes meaning the user has to go through the browser again
const INTERACTION_ERRORS: [&str; 4] = [
    "interaction_required",
    "invalid_grant",
    "consent_required",
    "login_required",
];

/// Authorization code exchange request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRequest {
    pub code: String,
    pub authority: String,
    pub scopes: BTreeSet<String>,
    pub redirect_uri: String,
}

/// Result of a successful code exchange
#[derive(Debug, Clone, PartialEq)]
pub struct CodeExchange {
    pub access_token: String,
    /// Unverified ID-token claims
    pub id_token_claims: Claims,
    pub account: Option<AccountRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SilentRequest {
    pub account: AccountRef,
    pub scopes: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnBehalfOfRequest {
    pub assertion: String,
    pub scopes: BTreeSet<String>,
}

/// Access token returned by a silent or on-behalf-of grant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    /// May be empty when the provider answered without a token
    pub access_token: String,
    pub expires_in: Option<u64>,
}

/// OAuth2 endpoints of the identity provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the browser is redirected to for interactive sign-in
    async fn authorization_url(&self, request: &AuthCodeRequest) -> Result<String, AuthError>;

    /// Exchange an authorization code for tokens
    async fn exchange_code(&self, request: &CodeRequest) -> Result<CodeExchange, AuthError>;

    /// Acquire a token without user interaction
    ///
    /// Fails with [`AuthError::InteractionRequired`] when only an interactive
    /// flow can produce the token.
    async fn acquire_token_silent(&self, request: &SilentRequest) -> Result<TokenGrant, AuthError>;

    /// Exchange a bearer assertion for a downstream token
    async fn exchange_on_behalf_of(
        &self,
        request: &OnBehalfOfRequest,
    ) -> Result<TokenGrant, AuthError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// [`IdentityProvider`] speaking the OAuth2 v2.0 endpoints over HTTP
#[derive(Clone)]
pub struct HttpIdentityProvider {
    client_id: String,
    client_secret: String,
    authority: String,
    http: reqwest::Client,
    refresh_tokens: Arc<RwLock<HashMap<String, String>>>,
}

impl HttpIdentityProvider {
    /// `authority` is used for the silent and on-behalf-of grants, which
    /// carry no authority of their own
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        authority: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authority: authority.into(),
            http: reqwest::Client::new(),
            refresh_tokens: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Use a custom HTTP client
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    fn endpoint(authority: &str, name: &str) -> String {
        format!("{}/oauth2/v2.0/{}", authority.trim_end_matches('/'), name)
    }

    fn scope_param(scopes: &BTreeSet<String>) -> String {
        scopes.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
    }

    async fn post_token(
        &self,
        authority: &str,
        params: &[(&str, &str)],
        operation: &'static str,
    ) -> Result<TokenResponse, AuthError> {
        let response = self
            .http
            .post(Self::endpoint(authority, "token"))
            .form(params)
            .send()
            .await
            .map_err(|e| AuthError::Exchange(format!("{}: {}", operation, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(err) if INTERACTION_ERRORS.contains(&err.error.as_str()) => {
                    debug!("{} needs interaction: {}", operation, err.error);
                    AuthError::InteractionRequired(format!(
                        "{}: {}",
                        err.error,
                        err.error_description.unwrap_or_default()
                    ))
                }
                Ok(err) => AuthError::Exchange(format!(
                    "{}: {}: {}",
                    operation,
                    err.error,
                    err.error_description.unwrap_or_default()
                )),
                Err(_) => AuthError::Exchange(format!("{}: HTTP {}", operation, status)),
            });
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::Exchange(format!("{}: invalid response: {}", operation, e)))
    }
}

/// Decode the payload of a JWT without checking its signature
fn unverified_claims(token: &str) -> Result<Claims, AuthError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| AuthError::Exchange("ID token is not a JWT".to_string()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::Exchange(format!("ID token payload is not base64: {}", e)))?;
    let json: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::Exchange(format!("ID token payload is not JSON: {}", e)))?;
    Ok(Claims::from_json(&json))
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn authorization_url(&self, request: &AuthCodeRequest) -> Result<String, AuthError> {
        let mut url = Url::parse(&Self::endpoint(&request.authority, "authorize")).map_err(|e| {
            AuthError::Configuration(format!("invalid authority {}: {}", request.authority, e))
        })?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &request.redirect_uri)
            .append_pair("response_mode", "query")
            .append_pair("scope", &Self::scope_param(&request.scopes))
            .append_pair("state", &request.state);
        Ok(url.into())
    }

    async fn exchange_code(&self, request: &CodeRequest) -> Result<CodeExchange, AuthError> {
        let scope = Self::scope_param(&request.scopes);
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", request.code.as_str()),
            ("redirect_uri", request.redirect_uri.as_str()),
            ("scope", scope.as_str()),
        ];
        let tokens = self
            .post_token(&request.authority, &params, "code exchange")
            .await?;

        let id_token_claims = match tokens.id_token.as_deref() {
            Some(id_token) => unverified_claims(id_token)?,
            None => Claims::new(),
        };
        let account = AccountRef::from_claims(&id_token_claims);

        match (&account, tokens.refresh_token) {
            (Some(account), Some(refresh_token)) => {
                self.refresh_tokens
                    .write()
                    .await
                    .insert(account.home_account_id.clone(), refresh_token);
            }
            (None, Some(_)) => warn!("Refresh token received without an account, not cached"),
            _ => {}
        }

        Ok(CodeExchange {
            access_token: tokens.access_token,
            id_token_claims,
            account,
        })
    }

    async fn acquire_token_silent(&self, request: &SilentRequest) -> Result<TokenGrant, AuthError> {
        let refresh_token = self
            .refresh_tokens
            .read()
            .await
            .get(&request.account.home_account_id)
            .cloned()
            .ok_or_else(|| {
                AuthError::InteractionRequired("no cached refresh token".to_string())
            })?;

        let scope = Self::scope_param(&request.scopes);
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("scope", scope.as_str()),
        ];
        let tokens = self
            .post_token(&self.authority, &params, "silent acquisition")
            .await?;

        if let Some(rotated) = tokens.refresh_token {
            self.refresh_tokens
                .write()
                .await
                .insert(request.account.home_account_id.clone(), rotated);
        }

        Ok(TokenGrant {
            access_token: tokens.access_token,
            expires_in: tokens.expires_in,
        })
    }

    async fn exchange_on_behalf_of(
        &self,
        request: &OnBehalfOfRequest,
    ) -> Result<TokenGrant, AuthError> {
        let scope = Self::scope_param(&request.scopes);
        let params = [
            ("grant_type", JWT_BEARER_GRANT),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("assertion", request.assertion.as_str()),
            ("scope", scope.as_str()),
            ("requested_token_use", "on_behalf_of"),
        ];
        let tokens = self
            .post_token(&self.authority, &params, "on-behalf-of exchange")
            .await?;

        Ok(TokenGrant {
            access_token: tokens.access_token,
            expires_in: tokens.expires_in,
        })
    }
}
