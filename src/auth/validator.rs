// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-webauth project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Token validation
//!
//! Two validation paths are provided:
//!
//! - [`validate_id_token`] checks the claims of an ID token returned by a
//!   code exchange: audience, freshness and tenant.
//! - [`validate_access_token`] verifies a bearer token presented to an API:
//!   the signature is verified with the key named by the `kid` header, then
//!   issuer, freshness, audience and scopes are checked in that order.
//!
//! Freshness means `iat <= now <= exp`, in seconds, with `now` read once per
//! call.
//!
//! # Examples
//!
//! ```
//! use rust_webauth::auth::claims::{ClaimValue, Claims};
//! use rust_webauth::auth::validator::validate_id_token;
//!
//! let now = chrono::Utc::now().timestamp();
//! let claims = Claims::new()
//!     .with("aud", ClaimValue::String("client".into()))
//!     .with("tid", ClaimValue::String("tenant".into()))
//!     .with("iat", ClaimValue::Number(now - 10))
//!     .with("exp", ClaimValue::Number(now + 3600));
//!
//! assert!(validate_id_token(&claims, "client", "tenant", false));
//! assert!(!validate_id_token(&claims, "other-client", "tenant", false));
//! ```

use std::collections::HashSet;

use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use log::{debug, warn};

use super::claims::{Claims, ValidatedAccessToken, ValidatedIdToken};
use super::keys::KeyResolver;
use crate::error::AuthError;

/// Check the claims of an ID token
///
/// Returns `true` only when all of the following hold:
///
/// - `aud` equals `expected_client_id`
/// - `iat <= now <= exp`
/// - `tid` equals `expected_tenant_id`, except for policy-based deployments
///   whose tokens carry no `tid` at all
///
/// A missing claim fails its check.
pub fn validate_id_token(
    claims: &Claims,
    expected_client_id: &str,
    expected_tenant_id: &str,
    uses_policies: bool,
) -> bool {
    validate_id_token_at(
        claims,
        expected_client_id,
        expected_tenant_id,
        uses_policies,
        chrono::Utc::now().timestamp(),
    )
}

fn validate_id_token_at(
    claims: &Claims,
    expected_client_id: &str,
    expected_tenant_id: &str,
    uses_policies: bool,
    now: i64,
) -> bool {
    let audience_ok = claims.matches("aud", expected_client_id);
    let fresh = is_fresh(claims, now);
    let tenant_ok = match claims.get("tid") {
        None => uses_policies,
        Some(_) => claims.get_str("tid") == Some(expected_tenant_id),
    };

    if !(audience_ok && fresh && tenant_ok) {
        debug!(
            "ID token rejected (audience: {}, fresh: {}, tenant: {})",
            audience_ok, fresh, tenant_ok
        );
    }
    audience_ok && fresh && tenant_ok
}

fn is_fresh(claims: &Claims, now: i64) -> bool {
    match (claims.get_number("iat"), claims.get_number("exp")) {
        (Some(iat), Some(exp)) => iat <= now && now <= exp,
        _ => false,
    }
}

impl ValidatedIdToken {
    /// Validate ID-token claims and wrap them
    ///
    /// # Errors
    ///
    /// [`AuthError::Claim`] when [`validate_id_token`] rejects the claims.
    pub fn validate(
        claims: Claims,
        expected_client_id: &str,
        expected_tenant_id: &str,
        uses_policies: bool,
    ) -> Result<Self, AuthError> {
        if validate_id_token(&claims, expected_client_id, expected_tenant_id, uses_policies) {
            Ok(ValidatedIdToken::new(claims))
        } else {
            Err(AuthError::Claim("ID token claims rejected".to_string()))
        }
    }
}

/// Verify a bearer access token
///
/// The gates run in order and the first failure is returned:
///
/// 1. the token is not empty
/// 2. the header decodes and names a `kid` and an asymmetric algorithm
/// 3. `key_resolver` resolves the `kid` against `key_authority`
/// 4. the signature verifies
/// 5. `iss` contains `expected_tenant_id`
/// 6. `iat <= now <= exp`
/// 7. `aud` is `expected_client_id` or `api://{expected_client_id}`
/// 8. every scope of `required_scopes` appears in the space-delimited `scp`
///
/// # Errors
///
/// * [`AuthError::TokenValidation`] for gates 1, 2 and 4
/// * [`AuthError::KeyResolution`] for gate 3
/// * [`AuthError::Claim`] for gates 5 to 8
pub async fn validate_access_token(
    raw_token: &str,
    expected_client_id: &str,
    expected_tenant_id: &str,
    required_scopes: &[String],
    key_authority: &str,
    key_resolver: &dyn KeyResolver,
) -> Result<ValidatedAccessToken, AuthError> {
    if raw_token.trim().is_empty() {
        return Err(AuthError::TokenValidation("empty token".to_string()));
    }

    let header = decode_header(raw_token)
        .map_err(|e| AuthError::TokenValidation(format!("malformed header: {}", e)))?;
    let key_id = header
        .kid
        .as_deref()
        .ok_or_else(|| AuthError::TokenValidation("token header has no kid".to_string()))?;
    if !is_asymmetric(header.alg) {
        return Err(AuthError::TokenValidation(format!(
            "unsupported algorithm {:?}",
            header.alg
        )));
    }

    let key = key_resolver.resolve_key(key_id, key_authority).await?;

    // Signature only; claims are checked below with the provider's rules
    let mut validation = Validation::new(header.alg);
    validation.required_spec_claims = HashSet::new();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;

    let payload = decode::<serde_json::Value>(raw_token, &key, &validation).map_err(|e| {
        warn!("Access token signature rejected: {}", e);
        AuthError::TokenValidation(format!("signature verification failed: {}", e))
    })?;
    let claims = Claims::from_json(&payload.claims);

    check_access_claims(
        &claims,
        expected_client_id,
        expected_tenant_id,
        required_scopes,
        chrono::Utc::now().timestamp(),
    )?;

    Ok(ValidatedAccessToken::new(claims))
}

fn is_asymmetric(alg: Algorithm) -> bool {
    matches!(
        alg,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
            | Algorithm::ES256
            | Algorithm::ES384
    )
}

fn check_access_claims(
    claims: &Claims,
    expected_client_id: &str,
    expected_tenant_id: &str,
    required_scopes: &[String],
    now: i64,
) -> Result<(), AuthError> {
    let issuer = claims
        .get_str("iss")
        .ok_or_else(|| AuthError::Claim("missing iss".to_string()))?;
    if !issuer.contains(expected_tenant_id) {
        return Err(AuthError::Claim(format!("unexpected issuer {}", issuer)));
    }

    if !is_fresh(claims, now) {
        return Err(AuthError::Claim("token is not within its validity window".to_string()));
    }

    let api_audience = format!("api://{}", expected_client_id);
    if !claims.matches("aud", expected_client_id) && !claims.matches("aud", &api_audience) {
        return Err(AuthError::Claim("unexpected audience".to_string()));
    }

    let granted: HashSet<&str> = claims
        .get_str("scp")
        .map(|scp| scp.split_whitespace().collect())
        .unwrap_or_default();
    if let Some(missing) = required_scopes
        .iter()
        .find(|scope| !granted.contains(scope.as_str()))
    {
        return Err(AuthError::Claim(format!("missing scope {}", missing)));
    }

    Ok(())
}
