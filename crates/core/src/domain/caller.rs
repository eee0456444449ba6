use std::fmt;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::domain::carrier::CarrierId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Operator,
    Carrier,
    Driver,
    Anon,
}

impl Role {
    pub const ALL: [Role; 5] = [Role::Admin, Role::Operator, Role::Carrier, Role::Driver, Role::Anon];

    /// Maps a declared role onto the closed set. Missing, unauthenticated and
    /// unrecognized values all become `Anon`.
    pub fn normalize(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Anon;
        };
        match raw.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Self::Admin,
            "OPERATOR" => Self::Operator,
            "CARRIER" => Self::Carrier,
            "DRIVER" => Self::Driver,
            _ => Self::Anon,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Operator => "OPERATOR",
            Self::Carrier => "CARRIER",
            Self::Driver => "DRIVER",
            Self::Anon => "ANON",
        }
    }

    /// Roles whose access to carrier-scoped data is limited to their own carrier.
    pub fn is_carrier_bound(self) -> bool {
        matches!(self, Self::Carrier | Self::Driver)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-scoped identity handed in by the boundary layer. Read-only inside
/// the pipeline; the trace id travels with it through every stage.
#[derive(Clone, Debug)]
pub struct CallerContext {
    pub role: Role,
    pub caller_id: Option<String>,
    pub carrier_scope: Option<CarrierId>,
    pub trace_id: String,
    pub auth_token: Option<SecretString>,
}

impl CallerContext {
    pub fn new(role: Role, trace_id: impl Into<String>) -> Self {
        Self {
            role,
            caller_id: None,
            carrier_scope: None,
            trace_id: trace_id.into(),
            auth_token: None,
        }
    }

    pub fn with_caller_id(mut self, caller_id: impl Into<String>) -> Self {
        self.caller_id = Some(caller_id.into());
        self
    }

    pub fn with_carrier_scope(mut self, carrier_id: CarrierId) -> Self {
        self.carrier_scope = Some(carrier_id);
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(SecretString::from(token.into()));
        self
    }
}
