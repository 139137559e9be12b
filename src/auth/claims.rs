// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-webauth project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Typed claim sets
//!
//! Token payloads are kept as a [`Claims`] map whose values belong to the
//! closed set described by [`ClaimValue`]. Validated tokens are wrapped in
//! [`ValidatedIdToken`] and [`ValidatedAccessToken`], which can only be built
//! by the validator module.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Value of a single claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    /// A string claim such as `aud`, `iss` or `tid`
    String(String),
    /// A numeric claim such as `iat` or `exp`
    Number(i64),
    /// A list of strings such as `roles` or a multi-audience `aud`
    StringArray(Vec<String>),
}

impl ClaimValue {
    /// Convert a JSON value, dropping kinds outside the supported set
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(ClaimValue::String(s.clone())),
            serde_json::Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(ClaimValue::Number),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(ClaimValue::StringArray),
            _ => None,
        }
    }
}

/// A set of claims keyed by claim name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(BTreeMap<String, ClaimValue>);

impl Claims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a claim set from a decoded JSON payload
    ///
    /// Non-object payloads yield an empty set. Booleans, objects and nulls
    /// are skipped.
    pub fn from_json(payload: &serde_json::Value) -> Self {
        let map = payload
            .as_object()
            .map(|object| {
                object
                    .iter()
                    .filter_map(|(name, value)| {
                        ClaimValue::from_json(value).map(|v| (name.clone(), v))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Claims(map)
    }

    /// Builder-style insertion
    pub fn with(mut self, name: impl Into<String>, value: ClaimValue) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ClaimValue) {
        self.0.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<ClaimValue> {
        self.0.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&ClaimValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// String value of a claim, `None` if absent or not a string
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(ClaimValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Numeric value of a claim, `None` if absent or not a number
    pub fn get_number(&self, name: &str) -> Option<i64> {
        match self.0.get(name) {
            Some(ClaimValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// Whether a claim equals `expected`, either as a string or as one
    /// element of a string array
    pub fn matches(&self, name: &str, expected: &str) -> bool {
        match self.0.get(name) {
            Some(ClaimValue::String(s)) => s == expected,
            Some(ClaimValue::StringArray(values)) => values.iter().any(|v| v == expected),
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ClaimValue)> {
        self.0.iter()
    }
}

/// ID-token claims that passed [`validate_id_token`](super::validator::validate_id_token)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedIdToken(Claims);

impl ValidatedIdToken {
    pub(crate) fn new(claims: Claims) -> Self {
        Self(claims)
    }

    pub fn claims(&self) -> &Claims {
        &self.0
    }

    pub fn into_claims(self) -> Claims {
        self.0
    }
}

/// Access-token claims whose signature and claim checks all passed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedAccessToken(Claims);

impl ValidatedAccessToken {
    pub(crate) fn new(claims: Claims) -> Self {
        Self(claims)
    }

    pub fn claims(&self) -> &Claims {
        &self.0
    }

    /// Scopes granted by the `scp` claim
    pub fn scopes(&self) -> Vec<&str> {
        self.0
            .get_str("scp")
            .map(|scp| scp.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn into_claims(self) -> Claims {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_keeps_supported_kinds() {
        let claims = Claims::from_json(&json!({
            "aud": "client",
            "iat": 1700000000,
            "exp": 1700003600.0,
            "roles": ["reader", "writer"],
            "email_verified": true,
            "address": {"country": "FR"},
            "mixed": ["a", 1],
            "nothing": null
        }));

        assert_eq!(claims.get_str("aud"), Some("client"));
        assert_eq!(claims.get_number("iat"), Some(1700000000));
        assert_eq!(claims.get_number("exp"), Some(1700003600));
        assert!(claims.matches("roles", "writer"));
        assert!(!claims.contains("email_verified"));
        assert!(!claims.contains("address"));
        assert!(!claims.contains("mixed"));
        assert!(!claims.contains("nothing"));
    }

    #[test]
    fn test_serde_roundtrip_through_session_json() {
        let claims = Claims::new()
            .with("tid", ClaimValue::String("tenant".into()))
            .with("exp", ClaimValue::Number(42))
            .with("groups", ClaimValue::StringArray(vec!["g1".into()]));

        let text = serde_json::to_string(&claims).unwrap();
        let back: Claims = serde_json::from_str(&text).unwrap();
        assert_eq!(back, claims);
    }

    #[test]
    fn test_access_token_scopes() {
        let token = ValidatedAccessToken::new(
            Claims::new().with("scp", ClaimValue::String("read  write".into())),
        );
        assert_eq!(token.scopes(), vec!["read", "write"]);
    }
}
