// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-webauth project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Redirect flow orchestration
//!
//! [`AuthFlow`] drives the interactive flows and guards protected routes.
//!
//! ```text
//! UNAUTHENTICATED --initiate_sign_in--> AWAITING_CALLBACK --handle_callback--> AUTHENTICATED
//!                                              |      ^
//!                      reset signal (AADB2C90118)      | RESET_PASSWORD callback
//!                                              v      |
//!                                     PASSWORD_RESET_REDIRECT
//!
//! AUTHENTICATED --acquire_resource_token--> AWAITING_RESOURCE_TOKEN --handle_callback--> RESOURCE_AUTHORIZED
//!               (silent acquisition skips straight to RESOURCE_AUTHORIZED)
//! ```
//!
//! Every interactive hand-off regenerates the session nonce and embeds it in
//! the `state` parameter. The callback compares both before anything else
//! happens, so a forged or replayed callback never reaches the token
//! endpoint.
//!
//! The orchestrator is independent of the web framework: operations take the
//! session and request data explicitly and return a [`FlowOutcome`] or an
//! [`AuthError`] whose status the web layer reports.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};

use super::claims::{ValidatedAccessToken, ValidatedIdToken};
use super::keys::{JwksKeyResolver, KeyResolver};
use super::provider::{
    CodeExchange, CodeRequest, HttpIdentityProvider, IdentityProvider, OnBehalfOfRequest,
    SilentRequest,
};
use super::resource_api::{HttpResourceApi, ResourceApi};
use super::session::{AccountRef, MemorySessionStore, PendingRequest, Session, SessionStore};
use super::state::{self, RedirectState, Stage};
use super::validator::validate_access_token;
use super::OIDC_DEFAULT_SCOPES;
use crate::config::{Config, ResourceDescriptor};
use crate::error::AuthError;

/// What the web layer should do after a flow step
#[derive(Debug, Clone, PartialEq)]
pub enum FlowOutcome {
    /// Send the browser to this URL
    Redirect(String),
    /// Continue to the route handler, with the resource response if one was fetched
    Continue(Option<serde_json::Value>),
}

/// Query parameters of the redirect callback
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Extract the token of a `Bearer` authorization header
pub fn bearer_token(authorization: Option<&str>) -> Option<&str> {
    let header = authorization?.trim();
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn new_nonce() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Redirect flow state machine and route guards
pub struct AuthFlow {
    config: Arc<Config>,
    provider: Arc<dyn IdentityProvider>,
    resource_api: Arc<dyn ResourceApi>,
    key_resolver: Arc<dyn KeyResolver>,
    sessions: Arc<dyn SessionStore>,
}

impl AuthFlow {
    pub fn new(
        config: Config,
        provider: Arc<dyn IdentityProvider>,
        resource_api: Arc<dyn ResourceApi>,
        key_resolver: Arc<dyn KeyResolver>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            provider,
            resource_api,
            key_resolver,
            sessions,
        }
    }

    /// Build a flow wired to the HTTP collaborators and an in-memory session store
    pub fn from_config(config: Config) -> Self {
        let provider = HttpIdentityProvider::new(
            config.credentials.client_id.clone(),
            config.credentials.client_secret.clone(),
            config.default_authority(),
        );
        let key_resolver = JwksKeyResolver::new(Duration::from_secs(config.key_cache_ttl_secs));
        Self::new(
            config,
            Arc::new(provider),
            Arc::new(HttpResourceApi::new()),
            Arc::new(key_resolver),
            Arc::new(MemorySessionStore::new()),
        )
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Sign-out URL of the identity provider
    pub fn logout_url(&self) -> String {
        format!(
            "{}/oauth2/v2.0/logout?post_logout_redirect_uri={}",
            self.config.default_authority().trim_end_matches('/'),
            self.config.settings.post_logout_redirect_uri
        )
    }

    fn sign_in_redirect(&self, stage: Stage, path: &str, nonce: &str) -> FlowOutcome {
        FlowOutcome::Redirect(format!(
            "{}?state={}",
            self.config.settings.sign_in_route(),
            state::encode(stage, path, nonce)
        ))
    }

    /// Record the pending requests and ask the provider for the authorization URL
    async fn start_interactive(
        &self,
        session: &mut Session,
        authority: &str,
        scopes: BTreeSet<String>,
        encoded_state: String,
    ) -> Result<FlowOutcome, AuthError> {
        let request = PendingRequest {
            authority: authority.to_string(),
            scopes,
            state: encoded_state,
            redirect_uri: self.config.settings.redirect_uri.clone(),
        };
        session.set_pending_auth_request(request.clone());
        session.set_pending_token_request(request.clone());

        let url = self.provider.authorization_url(&request).await?;
        debug!("Redirecting to the identity provider at {}", authority);
        Ok(FlowOutcome::Redirect(url))
    }

    /// Start an interactive sign-in
    ///
    /// The pending requests, the nonce and the account binding are reset.
    /// `incoming_state` is only inspected to detect a password reset
    /// continuation, which targets the reset authority instead of the
    /// default one.
    pub async fn initiate_sign_in(
        &self,
        session: &mut Session,
        incoming_state: Option<&str>,
        path: &str,
    ) -> Result<FlowOutcome, AuthError> {
        session.set_pending_auth_request(PendingRequest::default());
        session.set_pending_token_request(PendingRequest::default());
        session.set_account(None);
        session.set_authenticated(false);
        session.set_authorized(false);
        let nonce = new_nonce();
        session.set_nonce(nonce.clone());

        let resetting = incoming_state
            .filter(|s| !s.is_empty())
            .and_then(|s| match RedirectState::decode(s) {
                Ok(decoded) => Some(decoded.stage == Stage::ResetPassword),
                Err(e) => {
                    debug!("Ignoring undecodable state on sign-in: {}", e);
                    None
                }
            })
            .unwrap_or(false);

        let (stage, authority) = match (resetting, self.config.reset_password_authority()) {
            (true, Some(reset_authority)) => (Stage::ResetPassword, reset_authority),
            (true, None) => {
                warn!("Password reset requested but no reset policy is configured");
                (Stage::SignIn, self.config.default_authority())
            }
            (false, _) => (Stage::SignIn, self.config.default_authority()),
        };

        info!("Starting interactive {} flow", stage);
        let scopes = OIDC_DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect();
        let encoded = state::encode(stage, path, &nonce);
        self.start_interactive(session, authority, scopes, encoded)
            .await
    }

    /// Handle the redirect back from the identity provider
    ///
    /// # Errors
    ///
    /// * [`AuthError::StateDecoding`] when `state` is missing or malformed
    /// * [`AuthError::NonceMismatch`] when the state nonce is not the session nonce
    /// * [`AuthError::UnknownStage`] when the state names an unknown stage
    /// * [`AuthError::Claim`] when the ID token is rejected
    /// * exchange and resource errors of the stage being completed
    pub async fn handle_callback(
        &self,
        session: &mut Session,
        params: &CallbackParams,
    ) -> Result<FlowOutcome, AuthError> {
        let encoded = params
            .state
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                warn!("Callback without state parameter");
                AuthError::StateDecoding("missing state".to_string())
            })?;

        let unchecked = RedirectState::decode_unchecked(encoded)
            .inspect_err(|e| warn!("Rejecting callback: {}", e))?;

        // Nonce first: a forged state is a mismatch whatever stage it names
        if session.nonce().is_empty() || unchecked.nonce != session.nonce() {
            warn!("Rejecting callback: nonce does not match the session");
            return Err(AuthError::NonceMismatch);
        }

        let state = unchecked.into_state().inspect_err(|e| {
            if let AuthError::UnknownStage(stage) = e {
                error!("Callback with unknown stage {:?}", stage);
            }
        })?;

        match state.stage {
            Stage::SignIn => self.complete_sign_in(session, params, &state).await,
            Stage::AcquireToken => self.complete_token_acquisition(session, params, &state).await,
            Stage::ResetPassword => {
                info!("Password reset completed, restarting sign-in");
                let nonce = new_nonce();
                session.set_nonce(nonce.clone());
                Ok(self.sign_in_redirect(Stage::SignIn, &state.path, &nonce))
            }
        }
    }

    /// Exchange the callback code with the pending token request
    async fn redeem_code(
        &self,
        session: &Session,
        params: &CallbackParams,
        scopes: BTreeSet<String>,
    ) -> Result<CodeExchange, AuthError> {
        if let Some(error) = &params.error {
            return Err(AuthError::Exchange(format!(
                "{}: {}",
                error,
                params.error_description.as_deref().unwrap_or_default()
            )));
        }
        let code = params
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthError::Exchange("callback carries no code".to_string()))?;

        let pending = session.pending_token_request();
        let authority = if pending.authority.is_empty() {
            self.config.default_authority().to_string()
        } else {
            pending.authority.clone()
        };

        self.provider
            .exchange_code(&CodeRequest {
                code: code.to_string(),
                authority,
                scopes,
                redirect_uri: self.config.settings.redirect_uri.clone(),
            })
            .await
    }

    async fn complete_sign_in(
        &self,
        session: &mut Session,
        params: &CallbackParams,
        state: &RedirectState,
    ) -> Result<FlowOutcome, AuthError> {
        let scopes = session.pending_token_request().scopes.clone();
        let exchange = match self.redeem_code(session, params, scopes).await {
            Ok(exchange) => exchange,
            Err(e) if e.is_password_reset() => {
                info!("User requested a password reset");
                let nonce = new_nonce();
                session.set_nonce(nonce.clone());
                return Ok(self.sign_in_redirect(Stage::ResetPassword, &state.path, &nonce));
            }
            Err(e) => {
                error!("Code exchange failed: {}", e);
                return Err(e);
            }
        };

        let credentials = &self.config.credentials;
        let id_token = ValidatedIdToken::validate(
            exchange.id_token_claims,
            &credentials.client_id,
            &credentials.tenant_id,
            self.config.uses_policies(),
        )
        .inspect_err(|e| warn!("Sign-in rejected: {}", e))?;

        let account = exchange
            .account
            .or_else(|| AccountRef::from_claims(id_token.claims()));
        session.set_account(account);
        session.set_id_token_claims(id_token.into_claims());
        session.set_authenticated(true);

        info!("Sign-in completed");
        Ok(FlowOutcome::Redirect(
            self.config.settings.home_page_route.clone(),
        ))
    }

    async fn complete_token_acquisition(
        &self,
        session: &mut Session,
        params: &CallbackParams,
        state: &RedirectState,
    ) -> Result<FlowOutcome, AuthError> {
        let (name, resource) = self
            .config
            .resource_for_route(&state.path)
            .ok_or_else(|| AuthError::UnknownResource(state.path.clone()))?;

        let exchange = self
            .redeem_code(session, params, resource.scopes.clone())
            .await
            .inspect_err(|e| error!("Token acquisition for {} failed: {}", name, e))?;
        if exchange.access_token.is_empty() {
            return Err(AuthError::Exchange(format!("no access token for {}", name)));
        }
        if session.account().is_none() {
            session.set_account(exchange.account);
        }

        self.call_resource(session, name, resource, exchange.access_token)
            .await?;
        Ok(FlowOutcome::Redirect(state.path.clone()))
    }

    /// Store the token, call the resource and store its response
    async fn call_resource(
        &self,
        session: &mut Session,
        name: &str,
        resource: &ResourceDescriptor,
        access_token: String,
    ) -> Result<serde_json::Value, AuthError> {
        let response = self
            .resource_api
            .get(&resource.endpoint, &access_token)
            .await
            .inspect_err(|e| error!("Call to resource {} failed: {}", name, e));

        let slot = session.ensure_resource_slot(name);
        slot.access_token = Some(access_token);
        let response = response?;
        slot.resource_response = Some(response.clone());
        session.set_authorized(true);
        Ok(response)
    }

    async fn start_resource_interaction(
        &self,
        session: &mut Session,
        route: &str,
        resource: &ResourceDescriptor,
    ) -> Result<FlowOutcome, AuthError> {
        let nonce = new_nonce();
        session.set_nonce(nonce.clone());
        let encoded = state::encode(Stage::AcquireToken, route, &nonce);
        self.start_interactive(
            session,
            self.config.default_authority(),
            resource.scopes.clone(),
            encoded,
        )
        .await
    }

    /// Obtain the token of the resource bound to `route`
    ///
    /// Tries silent acquisition with the bound account first. Without an
    /// account, when the provider needs interaction or when it answers with
    /// an empty token, an interactive `ACQUIRE_TOKEN` flow is started instead.
    pub async fn acquire_resource_token(
        &self,
        session: &mut Session,
        route: &str,
    ) -> Result<FlowOutcome, AuthError> {
        let (name, resource) = self
            .config
            .resource_for_route(route)
            .ok_or_else(|| AuthError::UnknownResource(route.to_string()))?;

        let Some(account) = session.account().cloned() else {
            info!("No account bound, acquiring {} interactively", name);
            return self.start_resource_interaction(session, route, resource).await;
        };

        let silent = self
            .provider
            .acquire_token_silent(&SilentRequest {
                account,
                scopes: resource.scopes.clone(),
            })
            .await;

        match silent {
            Ok(grant) if !grant.access_token.is_empty() => {
                let response = self
                    .call_resource(session, name, resource, grant.access_token)
                    .await?;
                Ok(FlowOutcome::Continue(Some(response)))
            }
            Ok(_) => {
                info!("Silent acquisition of {} returned no token", name);
                self.start_resource_interaction(session, route, resource).await
            }
            Err(AuthError::InteractionRequired(reason)) => {
                info!("Silent acquisition of {} needs interaction: {}", name, reason);
                self.start_resource_interaction(session, route, resource).await
            }
            Err(e) => {
                error!("Silent acquisition of {} failed: {}", name, e);
                Err(e)
            }
        }
    }

    /// Call the resource bound to `route` with a token exchanged for the
    /// caller's bearer assertion
    pub async fn acquire_on_behalf_of(
        &self,
        authorization: Option<&str>,
        route: &str,
    ) -> Result<serde_json::Value, AuthError> {
        let assertion = bearer_token(authorization).ok_or(AuthError::MissingAssertion)?;
        let (name, resource) = self
            .config
            .resource_for_route(route)
            .ok_or_else(|| AuthError::UnknownResource(route.to_string()))?;

        let grant = self
            .provider
            .exchange_on_behalf_of(&OnBehalfOfRequest {
                assertion: assertion.to_string(),
                scopes: resource.scopes.clone(),
            })
            .await
            .inspect_err(|e| error!("On-behalf-of exchange for {} failed: {}", name, e))?;
        if grant.access_token.is_empty() {
            return Err(AuthError::Exchange(format!("no access token for {}", name)));
        }

        self.resource_api
            .get(&resource.endpoint, &grant.access_token)
            .await
            .inspect_err(|e| error!("Call to resource {} failed: {}", name, e))
    }

    /// Destroy the session and send the browser to the provider's sign-out
    pub async fn sign_out(
        &self,
        session_id: &str,
        session: &mut Session,
    ) -> Result<FlowOutcome, AuthError> {
        session.set_authenticated(false);
        session.set_authorized(false);
        self.sessions.destroy(session_id).await?;
        info!("Session signed out");
        Ok(FlowOutcome::Redirect(self.logout_url()))
    }

    /// Reject requests without an authenticated session
    pub fn require_authentication(&self, session: Option<&Session>) -> Result<(), AuthError> {
        match session {
            Some(session) if session.is_authenticated() => Ok(()),
            Some(_) => Err(AuthError::Unauthenticated("session is not signed in".into())),
            None => Err(AuthError::Unauthenticated("no session".into())),
        }
    }

    /// Validate the bearer token of a request to `route`
    pub async fn require_authorization(
        &self,
        authorization: Option<&str>,
        route: &str,
    ) -> Result<ValidatedAccessToken, AuthError> {
        let token = bearer_token(authorization)
            .ok_or_else(|| AuthError::Unauthenticated("missing bearer token".into()))?;
        let required: Vec<String> = self.config.required_scopes(route).into_iter().collect();
        let credentials = &self.config.credentials;

        validate_access_token(
            token,
            &credentials.client_id,
            &credentials.tenant_id,
            &required,
            self.config.default_authority(),
            self.key_resolver.as_ref(),
        )
        .await
        .inspect_err(|e| warn!("Bearer token rejected on {}: {}", route, e))
    }
}
