//! The claim-map contract (`spec.md` §1, §6): JWT verification itself is
//! out of scope, so this crate only extracts a tenant id and a normalized
//! user id from an already-verified claim map. In production that map is
//! populated by whatever edge proxy terminates the JWT; here it's read
//! from an `x-claims` JSON header by [`claims_stub_layer`], which stands in
//! for that step.

use std::collections::HashMap;

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use saga_core::ids::derive_user_id_from_subject;
use saga_core::CoreError;
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiError;

pub type ClaimMap = HashMap<String, Value>;

const TENANT_CLAIM_KEYS: &[&str] = &["tenant_id", "tenantId", "mt", "tid", "tenant"];
const SUBJECT_CLAIM_KEYS: &[&str] = &["sub", "uid", "user_id", "userId"];

/// Reads the `x-claims` header (a JSON object), parses it into a
/// [`ClaimMap`], and stashes it in the request extensions so downstream
/// handlers can extract [`Claims`]. A missing or malformed header yields
/// an empty map rather than a hard failure — callers that actually require
/// a tenant/subject still get `Unauthorized` from [`Claims::from_request_parts`].
pub async fn claims_stub_layer(mut request: Request, next: Next) -> Response {
    let claims: ClaimMap = request
        .headers()
        .get("x-claims")
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_default();
    request.extensions_mut().insert(claims);
    next.run(request).await
}

/// A verified tenant id and a normalized user id, extracted per §6's
/// fallback key lists. Non-UUID subjects are deterministically mapped to a
/// name-based UUID under the `"user:"` namespace.
#[derive(Debug, Clone)]
pub struct Claims {
    pub tenant_id: String,
    pub user_id: String,
}

impl Claims {
    fn from_map(map: &ClaimMap) -> Option<Self> {
        let tenant_id = TENANT_CLAIM_KEYS
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(Value::as_str)?
            .to_string();
        let subject = SUBJECT_CLAIM_KEYS
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(Value::as_str)?;
        Some(Self {
            tenant_id,
            user_id: normalize_subject(subject),
        })
    }
}

fn normalize_subject(subject: &str) -> String {
    if Uuid::parse_str(subject).is_ok() {
        subject.to_string()
    } else {
        derive_user_id_from_subject(subject).to_string()
    }
}

impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let map = parts
            .extensions
            .get::<ClaimMap>()
            .cloned()
            .unwrap_or_default();
        Claims::from_map(&map).ok_or(ApiError(CoreError::Unauthorized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_first_matching_fallback_key() {
        let map: ClaimMap = serde_json::from_str(r#"{"tid": "acme", "uid": "u-1"}"#).unwrap();
        let claims = Claims::from_map(&map).unwrap();
        assert_eq!(claims.tenant_id, "acme");
        assert_eq!(claims.user_id, "u-1");
    }

    #[test]
    fn non_uuid_subject_is_normalized_deterministically() {
        let map: ClaimMap = serde_json::from_str(r#"{"tenant_id": "acme", "sub": "alice"}"#).unwrap();
        let a = Claims::from_map(&map).unwrap();
        let b = Claims::from_map(&map).unwrap();
        assert_eq!(a.user_id, b.user_id);
        assert!(Uuid::parse_str(&a.user_id).is_ok());
    }

    #[test]
    fn missing_tenant_claim_rejects() {
        let map: ClaimMap = serde_json::from_str(r#"{"sub": "alice"}"#).unwrap();
        assert!(Claims::from_map(&map).is_none());
    }
}
