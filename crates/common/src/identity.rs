//! Caller identity handed to the core by the authentication layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::UserId;

/// Role attached to an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a role string is not one the pipeline knows about.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct RoleParseError(pub String);

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "admin" => Ok(Role::Admin),
            other => Err(RoleParseError(other.to_string())),
        }
    }
}

/// The authenticated caller of a cart or checkout operation.
///
/// Passed explicitly into every operation instead of being looked up from
/// request-scoped state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub user_id: UserId,
    pub role: Role,
}

impl CallerIdentity {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn customer(user_id: UserId) -> Self {
        Self::new(user_id, Role::Customer)
    }

    pub fn admin(user_id: UserId) -> Self {
        Self::new(user_id, Role::Admin)
    }

    /// Returns true if the caller may act on behalf of other users.
    pub fn is_privileged(&self) -> bool {
        self.role == Role::Admin
    }

    /// Resolves the user an operation applies to.
    ///
    /// Only privileged callers may name another user; everyone else always
    /// resolves to themselves and the requested target is ignored.
    pub fn resolve_target(&self, requested: Option<UserId>) -> UserId {
        match requested {
            Some(target) if self.is_privileged() => target,
            _ => self.user_id,
        }
    }
}
