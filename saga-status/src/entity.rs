use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The coarse saga lifecycle state (`spec.md` §4.3 step 4 mapping table).
/// Ordering here is the natural "happy path" progression; it's informative
/// only — the projection itself is last-writer-wins, not monotonic.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SagaState {
    Started,
    Priced,
    Reserved,
    Paid,
    Shipped,
    Completed,
    Failed,
}

impl SagaState {
    /// Maps a bus event's `type` field (case-insensitive) to a coarse
    /// state. Unknown types map to `STARTED` (`spec.md` §4.3 step 4).
    pub fn from_event_type(event_type: &str) -> Self {
        match event_type.to_ascii_uppercase().as_str() {
            "ORDER_CREATE" | "ORDER_CREATED" => SagaState::Started,
            "CART_ITEM_ADDED"
            | "CART_ITEM_UPDATED"
            | "CART_ITEM_REMOVED"
            | "DISCOUNT_APPLIED"
            | "SHIPPING_QUOTED" => SagaState::Priced,
            "INVENTORY_RESERVED" | "RESERVATION_OK" => SagaState::Reserved,
            "PAYMENT_AUTHORIZED" | "PAYMENT_CAPTURED" | "PAYMENT_OK" => SagaState::Paid,
            "SHIPMENT_DISPATCHED" | "ORDER_SHIPPED" => SagaState::Shipped,
            "ORDER_COMPLETED" => SagaState::Completed,
            "ORDER_FAILED"
            | "COMPENSATED"
            | "CANCELLED"
            | "ORDER_CANCELLED"
            | "PAYMENT_FAILED"
            | "RESERVATION_FAILED" => SagaState::Failed,
            _ => SagaState::Started,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::Started => "STARTED",
            SagaState::Priced => "PRICED",
            SagaState::Reserved => "RESERVED",
            SagaState::Paid => "PAID",
            SagaState::Shipped => "SHIPPED",
            SagaState::Completed => "COMPLETED",
            SagaState::Failed => "FAILED",
        }
    }
}

impl std::str::FromStr for SagaState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "STARTED" => Ok(SagaState::Started),
            "PRICED" => Ok(SagaState::Priced),
            "RESERVED" => Ok(SagaState::Reserved),
            "PAID" => Ok(SagaState::Paid),
            "SHIPPED" => Ok(SagaState::Shipped),
            "COMPLETED" => Ok(SagaState::Completed),
            "FAILED" => Ok(SagaState::Failed),
            _ => Err(()),
        }
    }
}

/// A single row of the `saga_status` projection
/// (`spec.md` §6: `saga_status(id UUID PK, tenant_id, user_id, type, state,
/// reason, created_at, updated_at)`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SagaStatus {
    pub id: Uuid,
    pub tenant_id: String,
    pub user_id: String,
    #[sqlx(rename = "type")]
    pub saga_type: String,
    pub state: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SagaStatus {
    pub fn state(&self) -> Option<SagaState> {
        self.state.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_event_types() {
        assert_eq!(SagaState::from_event_type("order_create"), SagaState::Started);
        assert_eq!(SagaState::from_event_type("PAYMENT_CAPTURED"), SagaState::Paid);
        assert_eq!(SagaState::from_event_type("ORDER_CANCELLED"), SagaState::Failed);
    }

    #[test]
    fn unknown_event_type_maps_to_started() {
        assert_eq!(SagaState::from_event_type("SOMETHING_WEIRD"), SagaState::Started);
    }
}
