use std::collections::BTreeMap;

use saga_core::{SagaId, TenantId};
use serde_json::Value;

use crate::error::BusError;

/// The event fields the projector cares about, after falling back across
/// payload/headers (`spec.md` §4.3 step 3).
#[derive(Debug, Clone)]
pub struct DecodedEvent {
    pub event_type: String,
    pub saga_id: SagaId,
    pub tenant_id: TenantId,
    pub user_id: String,
    pub reason: Option<String>,
    pub raw: Value,
}

/// Decodes and encodes the heterogeneous JSON event envelope used on the
/// bus (`spec.md` §4.3, §6 "Bus contracts").
pub struct EventCodec;

impl EventCodec {
    /// Extracts `type`/`saga_id` (required) and `tenant_id`/`user_id`/
    /// `reason` (optional, default `"unknown"`) by falling back, in order,
    /// over: (a) top-level payload keys, (b) nested `payload.*` keys, (c)
    /// bus headers. Accepts both `snake_case` and `camelCase` key spellings
    /// since events originate from heterogeneous participant services.
    pub fn decode(payload: &[u8], headers: &BTreeMap<String, String>) -> Result<DecodedEvent, BusError> {
        let raw: Value = serde_json::from_slice(payload)
            .map_err(|e| BusError::Malformed(format!("invalid JSON payload: {e}")))?;

        let event_type =
            Self::lookup_string(&raw, headers, &["type", "event_type", "eventType", "event-type"])
                .ok_or_else(|| BusError::Malformed("missing required field `type`".to_string()))?;

        let saga_id_raw =
            Self::lookup_string(&raw, headers, &["saga_id", "sagaId", "saga-id"])
                .ok_or_else(|| BusError::Malformed("missing required field `saga_id`".to_string()))?;
        let saga_id: SagaId = saga_id_raw
            .parse()
            .map_err(|_| BusError::Malformed(format!("invalid saga_id: {saga_id_raw}")))?;

        let tenant_id = Self::lookup_string(&raw, headers, &["tenant_id", "tenantId", "tenant-id"])
            .map(|raw| match parse_tenant_map_literal(&raw) {
                Some(first_key) => TenantId::from(first_key),
                None => TenantId::from(raw),
            })
            .unwrap_or_else(TenantId::unknown);

        let user_id = Self::lookup_string(&raw, headers, &["user_id", "userId", "user-id"])
            .unwrap_or_else(|| "unknown".to_string());

        let reason = Self::lookup_string(&raw, headers, &["reason"]);

        Ok(DecodedEvent {
            event_type,
            saga_id,
            tenant_id,
            user_id,
            reason,
            raw,
        })
    }

    /// Looks up `keys` (in order) across: top-level payload object, nested
    /// `payload.*` object (if present), then headers. The header fallback
    /// matches case-insensitively since header casing varies by transport
    /// (`spec.md` §9: "accept both `tenant-id` and `Tenant-Id` on read").
    fn lookup_string(raw: &Value, headers: &BTreeMap<String, String>, keys: &[&str]) -> Option<String> {
        for key in keys {
            if let Some(value) = raw.get(*key).and_then(Self::value_as_string) {
                return Some(value);
            }
        }
        if let Some(nested) = raw.get("payload") {
            for key in keys {
                if let Some(value) = nested.get(*key).and_then(Self::value_as_string) {
                    return Some(value);
                }
            }
        }
        for key in keys {
            if let Some((_, value)) = headers.iter().find(|(h, _)| h.eq_ignore_ascii_case(key)) {
                return Some(value.clone());
            }
        }
        None
    }

    fn value_as_string(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Parses a tenant id that arrived as a map-literal, e.g. `{123=[...]}` (Java
/// `toString`-style) or `{"123":[...]}` (JSON-style), returning the first
/// key. Returns `None` if `raw` isn't a map literal at all, in which case
/// the caller should use `raw` as the tenant id verbatim (`spec.md` §4.3:
/// "tenant_id may arrive as a map-literal ... extract the first key").
pub fn parse_tenant_map_literal(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('{') || !trimmed.ends_with('}') {
        return None;
    }
    let inner = &trimmed[1..trimmed.len() - 1];

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        return map.keys().next().cloned();
    }

    // Java `AbstractMap::toString` style: `{123=[...], 456=[...]}`.
    let first_entry = inner.split(',').next()?;
    let key = first_entry.split('=').next()?.trim();
    if key.is_empty() {
        None
    } else {
        Some(key.trim_matches('"').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_required_fields_from_top_level_payload() {
        let payload = br#"{"type":"ORDER_CREATE","saga_id":"018f1e00-0000-7000-8000-000000000001"}"#;
        let decoded = EventCodec::decode(payload, &BTreeMap::new()).unwrap();
        assert_eq!(decoded.event_type, "ORDER_CREATE");
        assert_eq!(decoded.tenant_id.as_str(), "unknown");
        assert_eq!(decoded.user_id, "unknown");
    }

    #[test]
    fn falls_back_to_nested_payload_then_headers() {
        let payload = br#"{"type":"PAYMENT_AUTHORIZED","payload":{"saga_id":"018f1e00-0000-7000-8000-000000000002","user_id":"u-1"}}"#;
        let mut headers = BTreeMap::new();
        headers.insert("tenant-id".to_string(), "acme".to_string());
        let decoded = EventCodec::decode(payload, &headers).unwrap();
        assert_eq!(decoded.user_id, "u-1");
        assert_eq!(decoded.tenant_id.as_str(), "acme");
    }

    #[test]
    fn missing_required_field_is_malformed() {
        let payload = br#"{"type":"ORDER_CREATE"}"#;
        let err = EventCodec::decode(payload, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, BusError::Malformed(_)));
    }

    #[test]
    fn json_style_map_literal_extracts_first_key() {
        assert_eq!(parse_tenant_map_literal(r#"{"123":[1,2]}"#), Some("123".to_string()));
    }

    #[test]
    fn java_style_map_literal_extracts_first_key() {
        assert_eq!(parse_tenant_map_literal("{123=[acme, other]}"), Some("123".to_string()));
    }

    #[test]
    fn plain_string_is_not_a_map_literal() {
        assert_eq!(parse_tenant_map_literal("acme"), None);
    }
}
