use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Privilege tier of an account.
///
/// Tiers form a total order `Anonymous < Authenticated < Manager < Admin`.
/// The order comes from [`Role::rank`], not from declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Anonymous,
    Authenticated,
    Manager,
    Admin,
}

impl Role {
    pub const fn rank(self) -> u8 {
        match self {
            Role::Anonymous => 0,
            Role::Authenticated => 1,
            Role::Manager => 2,
            Role::Admin => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Anonymous => "ANONYMOUS",
            Role::Authenticated => "AUTHENTICATED",
            Role::Manager => "MANAGER",
            Role::Admin => "ADMIN",
        }
    }
}

impl Ord for Role {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for Role {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protected operations exposed by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ViewOwnProfile,
    UpdateOwnProfile,
    SetProfilePicture,
    ChangeOwnPassword,
    ListAccounts,
    ViewAccount,
    CreateAccount,
    UpdateAccount,
    DeleteAccount,
    UnlockAccount,
    ChangeRole,
}

/// Operations restricted to `Admin` no matter what the ordering says.
const ADMIN_ONLY: &[Operation] = &[Operation::ChangeRole];

impl Operation {
    pub const fn minimum_role(self) -> Role {
        match self {
            Operation::ViewOwnProfile
            | Operation::UpdateOwnProfile
            | Operation::SetProfilePicture
            | Operation::ChangeOwnPassword => Role::Authenticated,
            Operation::ListAccounts
            | Operation::ViewAccount
            | Operation::CreateAccount
            | Operation::UpdateAccount
            | Operation::DeleteAccount
            | Operation::UnlockAccount
            | Operation::ChangeRole => Role::Manager,
        }
    }

    pub fn is_admin_only(self) -> bool {
        ADMIN_ONLY.contains(&self)
    }
}

/// Role gate denial. Carries no detail about which check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("forbidden")]
pub struct Forbidden;

/// Decide whether `caller` may perform `operation`.
pub fn authorize(caller: Role, operation: Operation) -> Result<(), Forbidden> {
    if operation.is_admin_only() && caller != Role::Admin {
        tracing::debug!(%caller, ?operation, "denied by admin-only carve-out");
        return Err(Forbidden);
    }

    if caller >= operation.minimum_role() {
        Ok(())
    } else {
        tracing::debug!(%caller, ?operation, "denied by role ordering");
        Err(Forbidden)
    }
}
