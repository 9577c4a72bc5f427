//! Counters for authorization and integrity outcomes.
//!
//! No recorder is installed here; the embedding process decides where the
//! `metrics` facade sends them.

use metrics::counter;

use crate::auth::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleChangeOutcome {
    Applied,
    Rejected,
}

impl RoleChangeOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            RoleChangeOutcome::Applied => "applied",
            RoleChangeOutcome::Rejected => "rejected",
        }
    }
}

pub fn record_policy_decision(entity: &'static str, action: &'static str, allowed: bool) {
    counter!(
        "policy_decisions_total",
        "entity" => entity,
        "action" => action,
        "allowed" => allowed.to_string()
    )
    .increment(1);
}

pub fn record_role_change(from: Role, to: Role, outcome: RoleChangeOutcome) {
    counter!(
        "role_changes_total",
        "from" => from.as_str(),
        "to" => to.as_str(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

pub fn record_unique_conflict(constraint: &'static str) {
    counter!("unique_conflicts_total", "constraint" => constraint).increment(1);
}
