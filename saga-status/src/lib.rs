//! The `saga_status` projection: a coarse, eventually-consistent view of a
//! saga's progress, maintained by `saga-projector` and served to clients by
//! `saga-gateway` (`spec.md` §4.3, §4.4).

mod entity;
mod error;
mod store;

pub use entity::{SagaState, SagaStatus};
pub use error::StatusError;
pub use store::SagaStatusStore;
