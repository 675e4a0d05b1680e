//! Admin-token gate for the diagnostic and download endpoints.
//!
//! The token can arrive three ways, checked in order: query parameter
//! `token`, header `x-admin-token`, or `Authorization: Bearer`.

use axum::http::HeaderMap;
use std::collections::HashMap;

use crate::errors::{Error, Result};

/// Pull the admin token out of a request, wherever the caller put it.
pub fn extract_token(query: &HashMap<String, String>, headers: &HeaderMap) -> Option<String> {
    if let Some(token) = query.get("token") {
        return Some(token.clone());
    }
    if let Some(token) = headers.get("x-admin-token").and_then(|v| v.to_str().ok()) {
        return Some(token.to_string());
    }
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            let (scheme, rest) = v.split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| rest.trim().to_string())
        })
}

/// Check a provided token against the configured one. An unset server token
/// is a configuration error (500), a mismatch is unauthorized (401).
pub fn require_admin(configured: Option<&str>, provided: Option<&str>) -> Result<()> {
    let expected = match configured {
        Some(t) if !t.is_empty() => t,
        _ => return Err(Error::ConfigurationMissing { what: "ADMIN_TOKEN" }),
    };
    match provided {
        Some(t) if t == expected => Ok(()),
        _ => Err(Error::Unauthorized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn token_sources_checked_in_order() {
        let mut query = HashMap::new();
        query.insert("token".to_string(), "from-query".to_string());
        let mut headers = HeaderMap::new();
        headers.insert("x-admin-token", HeaderValue::from_static("from-header"));
        assert_eq!(extract_token(&query, &headers).as_deref(), Some("from-query"));

        query.clear();
        assert_eq!(extract_token(&query, &headers).as_deref(), Some("from-header"));

        headers.clear();
        headers.insert("authorization", HeaderValue::from_static("BEARER abc123"));
        assert_eq!(extract_token(&query, &headers).as_deref(), Some("abc123"));

        headers.clear();
        assert_eq!(extract_token(&query, &headers), None);
    }

    #[test]
    fn unset_server_token_is_configuration_error() {
        let err = require_admin(None, Some("anything")).unwrap_err();
        assert!(matches!(err, Error::ConfigurationMissing { .. }));
        let err = require_admin(Some(""), Some("anything")).unwrap_err();
        assert!(matches!(err, Error::ConfigurationMissing { .. }));
    }

    #[test]
    fn mismatch_is_unauthorized() {
        assert!(matches!(require_admin(Some("secret"), Some("wrong")), Err(Error::Unauthorized)));
        assert!(matches!(require_admin(Some("secret"), None), Err(Error::Unauthorized)));
        assert!(require_admin(Some("secret"), Some("secret")).is_ok());
    }
}
