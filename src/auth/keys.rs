// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-webauth project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Signing key resolution
//!
//! Access tokens are verified with the public key named by the `kid` header.
//! The keys are published by the identity provider as a JSON Web Key Set at
//! `{authority}/discovery/v2.0/keys`, where the authority is either the tenant
//! authority or, for policy-based deployments, the sign-up/sign-in policy
//! authority.
//!
//! [`JwksKeyResolver`] fetches that key set with `reqwest`, caches it per
//! discovery URI and refetches once when a key id is missing from a cached
//! set, which covers provider key rotation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::DecodingKey;
use log::{debug, info, warn};
use tokio::sync::RwLock;

use crate::error::AuthError;

/// Suffix appended to an authority to obtain its key discovery endpoint
pub const KEY_DISCOVERY_SUFFIX: &str = "/discovery/v2.0/keys";

/// Default lifetime of a cached key set (10 minutes)
pub const DEFAULT_KEY_CACHE_TTL: Duration = Duration::from_secs(600);

/// Build the key discovery URI of an authority
pub fn discovery_uri(authority: &str) -> String {
    format!("{}{}", authority.trim_end_matches('/'), KEY_DISCOVERY_SUFFIX)
}

/// Resolves a key id to a verification key
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyResolver: Send + Sync {
    /// Resolve `key_id` from the key set published under `authority`
    ///
    /// # Errors
    ///
    /// [`AuthError::KeyResolution`] when the key set cannot be fetched or
    /// does not contain `key_id`.
    async fn resolve_key(&self, key_id: &str, authority: &str) -> Result<DecodingKey, AuthError>;
}

#[derive(Debug, Clone)]
struct CachedKeySet {
    keys: JwkSet,
    fetched_at: Instant,
}

/// [`KeyResolver`] backed by the remote JSON Web Key Set
#[derive(Clone)]
pub struct JwksKeyResolver {
    cache: Arc<RwLock<HashMap<String, CachedKeySet>>>,
    ttl: Duration,
    http_client: reqwest::Client,
}

impl Default for JwksKeyResolver {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_CACHE_TTL)
    }
}

impl JwksKeyResolver {
    pub fn new(ttl: Duration) -> Self {
        Self::with_client(ttl, reqwest::Client::new())
    }

    pub fn with_client(ttl: Duration, http_client: reqwest::Client) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            http_client,
        }
    }

    /// Number of key sets currently cached
    pub async fn cached_entries(&self) -> usize {
        self.cache.read().await.len()
    }

    async fn cached(&self, uri: &str) -> Option<JwkSet> {
        let cache = self.cache.read().await;
        cache
            .get(uri)
            .filter(|entry| entry.fetched_at.elapsed() <= self.ttl)
            .map(|entry| entry.keys.clone())
    }

    async fn fetch_and_cache(&self, uri: &str) -> Result<JwkSet, AuthError> {
        debug!("Fetching signing keys from {}", uri);
        let response = self
            .http_client
            .get(uri)
            .send()
            .await
            .map_err(|e| AuthError::KeyResolution(format!("HTTP error: {}", e)))?;

        if !response.status().is_success() {
            return Err(AuthError::KeyResolution(format!(
                "key discovery returned HTTP {}",
                response.status()
            )));
        }

        let keys: JwkSet = response
            .json()
            .await
            .map_err(|e| AuthError::KeyResolution(format!("invalid key set: {}", e)))?;

        info!("Cached {} signing keys from {}", keys.keys.len(), uri);
        self.cache.write().await.insert(
            uri.to_string(),
            CachedKeySet {
                keys: keys.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(keys)
    }
}

#[async_trait]
impl KeyResolver for JwksKeyResolver {
    async fn resolve_key(&self, key_id: &str, authority: &str) -> Result<DecodingKey, AuthError> {
        let uri = discovery_uri(authority);

        let jwk = match self.cached(&uri).await {
            Some(keys) if keys.find(key_id).is_some() => keys.find(key_id).cloned(),
            Some(_) => {
                warn!("Key {} not in cached set for {}, refreshing", key_id, uri);
                self.fetch_and_cache(&uri).await?.find(key_id).cloned()
            }
            None => self.fetch_and_cache(&uri).await?.find(key_id).cloned(),
        };

        let jwk = jwk.ok_or_else(|| {
            AuthError::KeyResolution(format!("key {} not published at {}", key_id, uri))
        })?;

        DecodingKey::from_jwk(&jwk)
            .map_err(|e| AuthError::KeyResolution(format!("unusable key {}: {}", key_id, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_discovery_uri() {
        assert_eq!(
            discovery_uri("https://login.example.com/tenant-id"),
            "https://login.example.com/tenant-id/discovery/v2.0/keys"
        );
        assert_eq!(
            discovery_uri("https://contoso.b2clogin.com/contoso.onmicrosoft.com/B2C_1_susi/"),
            "https://contoso.b2clogin.com/contoso.onmicrosoft.com/B2C_1_susi/discovery/v2.0/keys"
        );
    }

    #[tokio::test]
    async fn test_resolves_and_caches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tenant/discovery/v2.0/keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(test_support::jwks("kid-1")))
            .expect(1)
            .mount(&server)
            .await;

        let resolver = JwksKeyResolver::default();
        let authority = format!("{}/tenant", server.uri());

        assert!(resolver.resolve_key("kid-1", &authority).await.is_ok());
        assert!(resolver.resolve_key("kid-1", &authority).await.is_ok());
        assert_eq!(resolver.cached_entries().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_kid_refetches_once_then_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tenant/discovery/v2.0/keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(test_support::jwks("kid-1")))
            .expect(2)
            .mount(&server)
            .await;

        let resolver = JwksKeyResolver::default();
        let authority = format!("{}/tenant", server.uri());

        assert!(resolver.resolve_key("kid-1", &authority).await.is_ok());
        let result = resolver.resolve_key("rotated", &authority).await;
        assert!(matches!(result, Err(AuthError::KeyResolution(_))));
    }

    #[tokio::test]
    async fn test_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let resolver = JwksKeyResolver::default();
        let result = resolver.resolve_key("kid-1", &server.uri()).await;
        assert!(matches!(result, Err(AuthError::KeyResolution(_))));
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(test_support::jwks("kid-1")))
            .expect(2)
            .mount(&server)
            .await;

        let resolver = JwksKeyResolver::new(Duration::ZERO);
        resolver.resolve_key("kid-1", &server.uri()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        resolver.resolve_key("kid-1", &server.uri()).await.unwrap();
    }
}
