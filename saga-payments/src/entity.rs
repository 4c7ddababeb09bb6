//! Aggregate shapes for the payment state machine (`spec.md` §3, §4.7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Initiated,
    Authorizing,
    RequiresAction,
    Authorized,
    Capturing,
    Captured,
    Settled,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Initiated => "INITIATED",
            PaymentStatus::Authorizing => "AUTHORIZING",
            PaymentStatus::RequiresAction => "REQUIRES_ACTION",
            PaymentStatus::Authorized => "AUTHORIZED",
            PaymentStatus::Capturing => "CAPTURING",
            PaymentStatus::Captured => "CAPTURED",
            PaymentStatus::Settled => "SETTLED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "INITIATED" => PaymentStatus::Initiated,
            "AUTHORIZING" => PaymentStatus::Authorizing,
            "REQUIRES_ACTION" => PaymentStatus::RequiresAction,
            "AUTHORIZED" => PaymentStatus::Authorized,
            "CAPTURING" => PaymentStatus::Capturing,
            "CAPTURED" => PaymentStatus::Captured,
            "SETTLED" => PaymentStatus::Settled,
            "FAILED" => PaymentStatus::Failed,
            "CANCELLED" => PaymentStatus::Cancelled,
            _ => return None,
        })
    }

    /// `spec.md` §4.7: "active = INITIATED | AUTHORIZING | REQUIRES_ACTION |
    /// AUTHORIZED | CAPTURING".
    pub fn is_active(self) -> bool {
        matches!(
            self,
            PaymentStatus::Initiated
                | PaymentStatus::Authorizing
                | PaymentStatus::RequiresAction
                | PaymentStatus::Authorized
                | PaymentStatus::Capturing
        )
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub tenant_id: String,
    pub saga_id: Uuid,
    pub order_id: String,
    pub user_id: String,
    pub amount_minor: i64,
    pub currency_code: String,
    pub status: String,
    pub psp: String,
    pub psp_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn status(&self) -> PaymentStatus {
        PaymentStatus::parse(&self.status).unwrap_or(PaymentStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    Pending,
    Succeeded,
    Failed,
}

impl AttemptStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptStatus::Pending => "PENDING",
            AttemptStatus::Succeeded => "SUCCEEDED",
            AttemptStatus::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PaymentAttempt {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub attempt_no: i32,
    pub status: String,
    pub psp_ref: Option<String>,
    pub failure_code: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    Pending,
    Succeeded,
    Failed,
}

impl CaptureStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CaptureStatus::Pending => "PENDING",
            CaptureStatus::Succeeded => "SUCCEEDED",
            CaptureStatus::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Capture {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub amount_minor: i64,
    pub currency_code: String,
    pub status: String,
    pub psp_capture_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundStatus {
    Pending,
    Succeeded,
    Failed,
}

impl RefundStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RefundStatus::Pending => "PENDING",
            RefundStatus::Succeeded => "SUCCEEDED",
            RefundStatus::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Refund {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub capture_id: Option<Uuid>,
    pub amount_minor: i64,
    pub currency_code: String,
    pub status: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisputeStatus {
    Opened,
    EvidenceSubmitted,
    Arbitration,
    Won,
    Lost,
    Closed,
    Cancelled,
}

impl DisputeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DisputeStatus::Opened => "OPENED",
            DisputeStatus::EvidenceSubmitted => "EVIDENCE_SUBMITTED",
            DisputeStatus::Arbitration => "ARBITRATION",
            DisputeStatus::Won => "WON",
            DisputeStatus::Lost => "LOST",
            DisputeStatus::Closed => "CLOSED",
            DisputeStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "OPENED" => DisputeStatus::Opened,
            "EVIDENCE_SUBMITTED" => DisputeStatus::EvidenceSubmitted,
            "ARBITRATION" => DisputeStatus::Arbitration,
            "WON" => DisputeStatus::Won,
            "LOST" => DisputeStatus::Lost,
            "CLOSED" => DisputeStatus::Closed,
            "CANCELLED" => DisputeStatus::Cancelled,
            _ => return None,
        })
    }

    /// `spec.md` §4.7: `close(outcome)` requires a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DisputeStatus::Won
                | DisputeStatus::Lost
                | DisputeStatus::Closed
                | DisputeStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Dispute {
    pub id: Uuid,
    pub tenant_id: String,
    pub payment_id: Uuid,
    pub psp: String,
    pub psp_dispute_id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Dispute {
    pub fn status(&self) -> DisputeStatus {
        DisputeStatus::parse(&self.status).unwrap_or(DisputeStatus::Opened)
    }
}
