//! Staff role resolution from dynamic claim shapes.
//!
//! Identity-provider claims carry the staff role in one of three shapes
//! depending on how the account was provisioned: a singular `role` string,
//! a `roles` array, or boolean flags. Resolution tries each shape in a fixed
//! priority order so the precedence stays auditable in one place.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Roles allowed through the staff token gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    /// Property owner; full access.
    Owner,
    /// Administrator.
    Admin,
    /// Front-desk staff.
    Staff,
}

impl StaffRole {
    /// Canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            StaffRole::Owner => "owner",
            StaffRole::Admin => "admin",
            StaffRole::Staff => "staff",
        }
    }

    /// Parse a role name, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "owner" => Some(StaffRole::Owner),
            "admin" => Some(StaffRole::Admin),
            "staff" => Some(StaffRole::Staff),
            _ => None,
        }
    }
}

impl std::fmt::Display for StaffRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

type ClaimExtractor = fn(&Map<String, Value>) -> Option<StaffRole>;

/// Extraction order; the first shape yielding a recognized role wins.
const EXTRACTORS: [ClaimExtractor; 3] = [from_role_field, from_roles_array, from_boolean_flags];

/// Resolve a staff role from a merged claims map.
pub fn resolve_role(claims: &Map<String, Value>) -> Option<StaffRole> {
    EXTRACTORS.iter().find_map(|extract| extract(claims))
}

fn from_role_field(claims: &Map<String, Value>) -> Option<StaffRole> {
    claims.get("role")?.as_str().and_then(StaffRole::parse)
}

fn from_roles_array(claims: &Map<String, Value>) -> Option<StaffRole> {
    claims
        .get("roles")?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .find_map(StaffRole::parse)
}

fn from_boolean_flags(claims: &Map<String, Value>) -> Option<StaffRole> {
    let flag = |name: &str| claims.get(name).and_then(Value::as_bool).unwrap_or(false);
    if flag("owner") {
        Some(StaffRole::Owner)
    } else if flag("admin") {
        Some(StaffRole::Admin)
    } else if flag("staff") {
        Some(StaffRole::Staff)
    } else {
        None
    }
}
