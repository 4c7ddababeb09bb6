//! Consumes bus events from any participant service and maintains the
//! `saga_status` projection plus a live notification (`spec.md` §4.3).

mod projector;

pub use projector::SagaEventProjector;
