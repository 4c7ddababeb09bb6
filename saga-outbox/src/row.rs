use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single outbox row, physically partitioned by `created_on` (UTC date);
/// the primary key is the composite `(id, created_on)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OutboxRow {
    pub id: Uuid,
    pub created_on: NaiveDate,
    pub tenant_id: String,
    pub saga_id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: Option<String>,
    pub event_type: String,
    pub event_key: Option<String>,
    pub payload: Vec<u8>,
    /// Stored as `JSONB`; decoded as a flat string→string map.
    pub headers_json: serde_json::Value,
    pub attempts: i32,
    pub lease_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub idem_key: Option<String>,
}

impl OutboxRow {
    /// Decodes [`Self::headers_json`] into a flat string map, skipping any
    /// entry that isn't a JSON string value.
    pub fn headers(&self) -> std::collections::BTreeMap<String, String> {
        self.headers_json
            .as_object()
            .into_iter()
            .flat_map(|map| map.iter())
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect()
    }

    /// The row is eligible for a new claim iff the lease is unset or expired.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        self.lease_until.is_none_or(|until| until < now)
    }

    /// The bus message key: first non-empty of `event_key`, `saga_id`,
    /// `aggregate_id`, `aggregate_type`, falling back to the literal
    /// `"event"` (`spec.md` §4.2 step 3).
    pub fn bus_key(&self) -> String {
        if let Some(key) = self.event_key.as_ref().filter(|s| !s.is_empty()) {
            return key.clone();
        }
        let saga_id = self.saga_id.to_string();
        if !saga_id.is_empty() {
            return saga_id;
        }
        if let Some(aggregate_id) = self.aggregate_id.as_ref().filter(|s| !s.is_empty()) {
            return aggregate_id.clone();
        }
        if !self.aggregate_type.is_empty() {
            return self.aggregate_type.clone();
        }
        "event".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_row() -> OutboxRow {
        let now = Utc::now();
        OutboxRow {
            id: Uuid::new_v4(),
            created_on: now.date_naive(),
            tenant_id: "acme".to_string(),
            saga_id: Uuid::new_v4(),
            aggregate_type: "ORDER".to_string(),
            aggregate_id: Some("order-1".to_string()),
            event_type: "ORDER_CREATE".to_string(),
            event_key: None,
            payload: b"{}".to_vec(),
            headers_json: serde_json::json!({"tenant-id": "acme", "retryable": true}),
            attempts: 0,
            lease_until: None,
            created_at: now,
            updated_at: now,
            idem_key: None,
        }
    }

    #[test]
    fn headers_decodes_only_string_values() {
        let row = sample_row();
        let headers = row.headers();
        assert_eq!(headers.get("tenant-id").map(String::as_str), Some("acme"));
        assert!(!headers.contains_key("retryable"));
    }

    #[test]
    fn bus_key_prefers_event_key_then_saga_id() {
        let mut row = sample_row();
        assert_eq!(row.bus_key(), row.saga_id.to_string());

        row.event_key = Some("order/42".to_string());
        assert_eq!(row.bus_key(), "order/42");
    }

    #[test]
    fn is_claimable_reflects_lease_state() {
        let mut row = sample_row();
        let now = Utc::now();
        assert!(row.is_claimable(now));

        row.lease_until = Some(now + Duration::seconds(30));
        assert!(!row.is_claimable(now));
        assert!(row.is_claimable(now + Duration::seconds(31)));
    }
}
