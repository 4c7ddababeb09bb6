//! The payment aggregate, its double-entry ledger, and the idempotency
//! layer guarding every caller-facing mutation (`spec.md` §3, §4.7-§4.9).

mod entity;
mod error;
mod idempotency;
mod ledger;
mod machine;
mod provider;
mod store;

pub use entity::{
    AttemptStatus, Capture, CaptureStatus, Dispute, DisputeStatus, Payment, PaymentAttempt,
    PaymentStatus, Refund, RefundStatus,
};
pub use error::{PaymentError, ProviderError};
pub use idempotency::IdempotencyStore;
pub use ledger::{Account, Ledger};
pub use machine::{AuthorizeCommand, PaymentStateMachine, WebhookEvent};
pub use provider::{HttpProviderAdapter, ProviderAdapter, ProviderRequest, ProviderResult, StubProviderAdapter};
pub use store::PaymentStore;
