// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-webauth project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! OpenID Connect redirect orchestration
//!
//! Building blocks, leaves first:
//!
//! - [`keys`]: resolves a signing key id to a verification key
//! - [`validator`]: ID-token and access-token validation
//! - [`state`]: the `state` parameter carried through redirects
//! - [`session`]: the per-user session entity and its store
//! - [`provider`] and [`resource_api`]: the outbound collaborators
//! - [`flow`]: the redirect state machine tying everything together

pub mod claims;
pub mod flow;
pub mod keys;
pub mod provider;
pub mod resource_api;
pub mod session;
pub mod state;
pub mod validator;

pub use claims::{ClaimValue, Claims, ValidatedAccessToken, ValidatedIdToken};
pub use flow::{AuthFlow, CallbackParams, FlowOutcome};
pub use keys::{JwksKeyResolver, KeyResolver};
pub use provider::{HttpIdentityProvider, IdentityProvider};
pub use resource_api::{HttpResourceApi, ResourceApi};
pub use session::{AccountRef, MemorySessionStore, Session, SessionStore};
pub use state::{RedirectState, Stage};

/// Scopes requested on every sign-in
pub const OIDC_DEFAULT_SCOPES: [&str; 3] = ["openid", "profile", "offline_access"];
