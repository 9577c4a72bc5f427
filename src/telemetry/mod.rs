//! Observability: structured logging and decision counters.

pub mod metrics;
pub mod tracing;

pub use metrics::{
    record_policy_decision, record_role_change, record_unique_conflict, RoleChangeOutcome,
};
pub use tracing::init_telemetry;
