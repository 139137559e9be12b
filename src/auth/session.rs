// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-webauth project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Authenticated session
//!
//! [`Session`] is the per-user state mutated by the flow orchestrator: the
//! authentication flags, the bound account, the validated ID-token claims,
//! the current nonce, the scratch requests of the pending interactive flow and
//! one token slot per protected resource. It only offers typed accessors.
//!
//! Sessions are persisted through a [`SessionStore`]. The web layer keeps the
//! session id in a private cookie and loads the session on every request.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::claims::Claims;
use crate::error::AuthError;

/// Handle on an account known to the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRef {
    /// `{oid}.{tid}` when both claims exist, otherwise `sub`
    pub home_account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl AccountRef {
    /// Derive an account handle from ID-token claims
    pub fn from_claims(claims: &Claims) -> Option<Self> {
        let tenant_id = claims.get_str("tid").map(str::to_string);
        let home_account_id = match (claims.get_str("oid"), tenant_id.as_deref()) {
            (Some(oid), Some(tid)) => format!("{}.{}", oid, tid),
            _ => claims
                .get_str("sub")
                .or_else(|| claims.get_str("oid"))?
                .to_string(),
        };
        Some(Self {
            home_account_id,
            username: claims
                .get_str("preferred_username")
                .or_else(|| claims.get_str("email"))
                .map(str::to_string),
            tenant_id,
        })
    }
}

/// Scratch copy of an authorization or token request awaiting the callback
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub authority: String,
    pub scopes: BTreeSet<String>,
    pub state: String,
    pub redirect_uri: String,
}

/// Per-resource token slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSlot {
    pub access_token: Option<String>,
    pub resource_response: Option<serde_json::Value>,
}

/// Per-user authentication state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    is_authenticated: bool,
    is_authorized: bool,
    account: Option<AccountRef>,
    id_token_claims: Claims,
    nonce: String,
    pending_auth_request: PendingRequest,
    pending_token_request: PendingRequest,
    resources: BTreeMap<String, ResourceSlot>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    pub fn set_authenticated(&mut self, value: bool) {
        self.is_authenticated = value;
    }

    pub fn is_authorized(&self) -> bool {
        self.is_authorized
    }

    pub fn set_authorized(&mut self, value: bool) {
        self.is_authorized = value;
    }

    pub fn account(&self) -> Option<&AccountRef> {
        self.account.as_ref()
    }

    pub fn set_account(&mut self, account: Option<AccountRef>) {
        self.account = account;
    }

    pub fn id_token_claims(&self) -> &Claims {
        &self.id_token_claims
    }

    pub fn set_id_token_claims(&mut self, claims: Claims) {
        self.id_token_claims = claims;
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn set_nonce(&mut self, nonce: impl Into<String>) {
        self.nonce = nonce.into();
    }

    pub fn pending_auth_request(&self) -> &PendingRequest {
        &self.pending_auth_request
    }

    pub fn set_pending_auth_request(&mut self, request: PendingRequest) {
        self.pending_auth_request = request;
    }

    pub fn pending_token_request(&self) -> &PendingRequest {
        &self.pending_token_request
    }

    pub fn set_pending_token_request(&mut self, request: PendingRequest) {
        self.pending_token_request = request;
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceSlot> {
        self.resources.get(name)
    }

    /// Slot of `name`, created empty on first use
    pub fn ensure_resource_slot(&mut self, name: &str) -> &mut ResourceSlot {
        self.resources.entry(name.to_string()).or_default()
    }
}

/// Persistence of sessions by id
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<Session>, AuthError>;

    async fn save(&self, id: &str, session: &Session) -> Result<(), AuthError>;

    async fn destroy(&self, id: &str) -> Result<(), AuthError>;
}

/// In-process [`SessionStore`]
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> Result<Option<Session>, AuthError> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn save(&self, id: &str, session: &Session) -> Result<(), AuthError> {
        self.sessions
            .write()
            .await
            .insert(id.to_string(), session.clone());
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), AuthError> {
        if self.sessions.write().await.remove(id).is_some() {
            debug!("Session destroyed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::ClaimValue;

    #[test]
    fn test_ensure_resource_slot_is_lazy() {
        let mut session = Session::new();
        assert!(session.resource("graph").is_none());

        session.ensure_resource_slot("graph").access_token = Some("token".into());
        session.ensure_resource_slot("graph").resource_response = Some(serde_json::json!({"ok": true}));

        let slot = session.resource("graph").unwrap();
        assert_eq!(slot.access_token.as_deref(), Some("token"));
        assert_eq!(slot.resource_response, Some(serde_json::json!({"ok": true})));
    }

    #[test]
    fn test_account_from_claims() {
        let claims = Claims::new()
            .with("oid", ClaimValue::String("o".into()))
            .with("tid", ClaimValue::String("t".into()))
            .with("preferred_username", ClaimValue::String("jane@contoso.com".into()));
        let account = AccountRef::from_claims(&claims).unwrap();
        assert_eq!(account.home_account_id, "o.t");
        assert_eq!(account.username.as_deref(), Some("jane@contoso.com"));

        let b2c = Claims::new().with("sub", ClaimValue::String("s".into()));
        assert_eq!(AccountRef::from_claims(&b2c).unwrap().home_account_id, "s");

        assert!(AccountRef::from_claims(&Claims::new()).is_none());
    }

    #[test]
    fn test_session_serializes() {
        let mut session = Session::new();
        session.set_nonce("n");
        session.set_authenticated(true);
        session.ensure_resource_slot("api");
        let text = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&text).unwrap();
        assert_eq!(back, session);
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemorySessionStore::new();
        let mut session = Session::new();
        session.set_nonce("abc");

        store.save("id-1", &session).await.unwrap();
        assert_eq!(store.load("id-1").await.unwrap().unwrap().nonce(), "abc");
        assert!(store.load("id-2").await.unwrap().is_none());

        store.destroy("id-1").await.unwrap();
        assert!(store.is_empty().await);
    }
}
