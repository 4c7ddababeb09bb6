//! Tenant and saga identifiers, plus the deterministic-derivation helpers
//! used when an identifier isn't supplied directly by a caller.
//!
//! See `spec.md` §3 (saga_id is a time-ordered UUID), §4.1 (outbox rows
//! derive a missing `saga_id` from `tenant_id | aggregate_type | event_key`),
//! and §6 (non-UUID JWT subjects are mapped to a name-based UUID under the
//! `"user:"` namespace).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A fixed namespace UUID used for all of our UUIDv5 derivations, so that two
/// different derivation contexts (e.g. a saga id vs a user id) can't
/// accidentally collide even if their input strings happen to match.
const DERIVATION_NAMESPACE: Uuid =
    Uuid::from_bytes([
        0x8f, 0x2b, 0x6b, 0x8a, 0x9e, 0x2a, 0x4b, 0x63, 0xa0, 0x0c, 0x2a, 0x6e,
        0x0c, 0x0a, 0x5e, 0x41,
    ]);

/// Opaque per-tenant identifier, as extracted from the verified claim map
/// (`tenant_id` / `tenantId` / `mt` / `tid` / `tenant`, per `spec.md` §6).
/// Tenants are not guaranteed to be UUIDs upstream, so this wraps a string.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The literal fallback tenant used when a bus event carries no
    /// identifiable tenant (`spec.md` §4.3 step 3).
    pub fn unknown() -> Self {
        Self("unknown".to_string())
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TenantId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A saga's 128-bit identifier (`spec.md` §3).
#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SagaId(Uuid);

impl SagaId {
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Generates a fresh, time-ordered saga id (UUIDv7), per `spec.md` §4.6
    /// step 1 ("time-ordered UUID preferred").
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Deterministically derives a saga id from `tenant_id | aggregate_type |
    /// event_key`, used by `OutboxStore::insert` when the caller doesn't
    /// supply a `saga_id` directly (`spec.md` §4.1).
    pub fn derive(tenant_id: &TenantId, aggregate_type: &str, event_key: &str) -> Self {
        let input = format!("{tenant_id}|{aggregate_type}|{event_key}");
        Self(Uuid::new_v5(&DERIVATION_NAMESPACE, input.as_bytes()))
    }
}

impl fmt::Display for SagaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SagaId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self)
    }
}

impl From<Uuid> for SagaId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// Maps a JWT `sub` (or `uid`/`user_id`/`userId`) claim to a stable UUID.
/// UUID-shaped subjects pass through unchanged; everything else is mapped
/// deterministically under the `"user:"` namespace (`spec.md` §6).
pub fn derive_user_id_from_subject(subject: &str) -> Uuid {
    if let Ok(uuid) = Uuid::from_str(subject) {
        return uuid;
    }
    let input = format!("user:{subject}");
    Uuid::new_v5(&DERIVATION_NAMESPACE, input.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saga_id_derivation_is_deterministic() {
        let tenant = TenantId::from("acme");
        let a = SagaId::derive(&tenant, "ORDER", "order-42");
        let b = SagaId::derive(&tenant, "ORDER", "order-42");
        assert_eq!(a, b);

        let c = SagaId::derive(&tenant, "ORDER", "order-43");
        assert_ne!(a, c);
    }

    #[test]
    fn user_id_passthrough_for_uuid_subjects() {
        let uuid = Uuid::new_v4();
        assert_eq!(derive_user_id_from_subject(&uuid.to_string()), uuid);
    }

    #[test]
    fn user_id_derivation_is_deterministic_for_non_uuid_subjects() {
        let a = derive_user_id_from_subject("auth0|abc123");
        let b = derive_user_id_from_subject("auth0|abc123");
        assert_eq!(a, b);
        assert_ne!(a, derive_user_id_from_subject("auth0|xyz789"));
    }

    #[test]
    fn generated_saga_ids_are_v7_and_unique() {
        let a = SagaId::generate();
        let b = SagaId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_uuid().get_version_num(), 7);
    }
}
