//! Static role/intent permission table.

use crate::domain::caller::Role;
use crate::domain::intent::Intent;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capability {
    pub intent: Intent,
    pub roles: &'static [Role],
    /// Carrier-bound roles may only touch their own carrier's records.
    pub carrier_scoped: bool,
    /// Also open to `Role::Anon` callers.
    pub anonymous_readable: bool,
}

const STAFF: &[Role] = &[Role::Admin, Role::Operator];
const AUTHENTICATED: &[Role] = &[Role::Admin, Role::Operator, Role::Carrier, Role::Driver];

const fn capability(
    intent: Intent,
    roles: &'static [Role],
    carrier_scoped: bool,
    anonymous_readable: bool,
) -> Capability {
    Capability { intent, roles, carrier_scoped, anonymous_readable }
}

pub const CAPABILITIES: [Capability; 14] = [
    capability(Intent::BookingStatus, AUTHENTICATED, true, false),
    capability(Intent::CarrierScore, AUTHENTICATED, true, false),
    capability(Intent::SlotAvailability, AUTHENTICATED, false, true),
    capability(Intent::SlotRecommendation, AUTHENTICATED, true, false),
    capability(Intent::DriverNoshowRisk, STAFF, false, false),
    capability(Intent::PassageHistory, AUTHENTICATED, true, false),
    capability(Intent::TrafficForecast, STAFF, false, false),
    capability(Intent::AnomalyDetection, STAFF, false, false),
    capability(Intent::BlockchainAudit, STAFF, false, false),
    capability(Intent::AnalyticsStressIndex, STAFF, false, false),
    capability(Intent::AnalyticsAlerts, STAFF, false, false),
    capability(Intent::Help, AUTHENTICATED, false, false),
    capability(Intent::Smalltalk, AUTHENTICATED, false, false),
    capability(Intent::Unknown, AUTHENTICATED, false, false),
];

pub fn capability_for(intent: Intent) -> &'static Capability {
    // Every catalog intent has exactly one row.
    CAPABILITIES
        .iter()
        .find(|capability| capability.intent == intent)
        .unwrap_or(&CAPABILITIES[CAPABILITIES.len() - 1])
}

pub fn is_permitted(role: Role, intent: Intent) -> bool {
    let capability = capability_for(intent);
    match role {
        Role::Anon => capability.anonymous_readable,
        role => capability.roles.contains(&role),
    }
}

pub fn is_carrier_scoped(intent: Intent) -> bool {
    capability_for(intent).carrier_scoped
}

/// Anonymous callers are limited to direct, anonymous-readable operations and
/// never reach the conversational entry point.
pub fn chat_entry_permitted(role: Role) -> bool {
    role != Role::Anon
}

/// Intents a role may invoke, sorted by name.
pub fn allowed_intents(role: Role) -> Vec<Intent> {
    let mut intents: Vec<Intent> = Intent::ALL
        .into_iter()
        .filter(|intent| *intent != Intent::Unknown && is_permitted(role, *intent))
        .collect();
    intents.sort_by_key(|intent| intent.as_str());
    intents
}
