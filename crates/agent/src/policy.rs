use portgate_core::capabilities::{is_carrier_scoped, is_permitted};
use portgate_core::domain::caller::CallerContext;
use portgate_core::domain::entity::EntityMap;
use portgate_core::domain::intent::Intent;

pub const ROLE_NOT_PERMITTED: &str = "role_not_permitted";
pub const CARRIER_SCOPE_MISMATCH: &str = "carrier_scope_mismatch";
pub const CARRIER_SCOPE_MISSING: &str = "carrier_scope_missing";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    Deny { reason_code: &'static str, user_message: String },
}

impl PolicyDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny { .. } => "deny",
        }
    }
}

/// Table-driven authorization over the capability rules.
#[derive(Clone, Copy, Debug, Default)]
pub struct PolicyEnforcer;

impl PolicyEnforcer {
    pub fn new() -> Self {
        Self
    }

    pub fn authorize(
        &self,
        intent: Intent,
        caller: &CallerContext,
        entities: &EntityMap,
    ) -> PolicyDecision {
        if !is_permitted(caller.role, intent) {
            return PolicyDecision::Deny {
                reason_code: ROLE_NOT_PERMITTED,
                user_message: format!(
                    "Sorry, the '{intent}' feature is not available for your role ({}).",
                    caller.role
                ),
            };
        }

        if !(caller.role.is_carrier_bound() && is_carrier_scoped(intent)) {
            return PolicyDecision::Allow;
        }

        let Some(scope) = caller.carrier_scope.as_ref() else {
            return PolicyDecision::Deny {
                reason_code: CARRIER_SCOPE_MISSING,
                user_message: "Your account is not linked to a carrier.".to_owned(),
            };
        };

        // A missing carrier id means the caller's own carrier.
        match entities.carrier_id() {
            Some(requested) if &requested != scope => PolicyDecision::Deny {
                reason_code: CARRIER_SCOPE_MISMATCH,
                user_message: scope_mismatch_message(intent).to_owned(),
            },
            _ => PolicyDecision::Allow,
        }
    }
}

fn scope_mismatch_message(intent: Intent) -> &'static str {
    match intent {
        Intent::CarrierScore => "Cannot access other carriers' scores",
        _ => "Cannot access other carriers' records",
    }
}
