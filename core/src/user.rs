//! Users as resolved by the user directory.

use crate::types::{Team, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role a user holds in the helpdesk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// Ticket submitter.
    User,
    /// Support staff working tickets.
    Technician,
    /// Full administrative rights.
    Admin,
}

impl UserRole {
    /// Roles that may hold tickets and assign them to others.
    #[must_use]
    pub const fn is_support_staff(self) -> bool {
        matches!(self, Self::Technician | Self::Admin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "USER",
            Self::Technician => "TECHNICIAN",
            Self::Admin => "ADMIN",
        })
    }
}

/// Account status of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    /// Normal account.
    Active,
    /// Deactivated by an administrator.
    Inactive,
    /// Temporarily blocked.
    Suspended,
    /// Registered, not yet confirmed.
    PendingActivation,
}

/// A directory user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Directory id.
    pub id: UserId,
    /// Human-readable name.
    pub display_name: String,
    /// Role.
    pub role: UserRole,
    /// Account status.
    pub status: UserStatus,
}

impl User {
    /// Creates an active user.
    #[must_use]
    pub fn new(id: impl Into<UserId>, display_name: impl Into<String>, role: UserRole) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            role,
            status: UserStatus::Active,
        }
    }

    /// Replaces the account status.
    #[must_use]
    pub const fn with_status(mut self, status: UserStatus) -> Self {
        self.status = status;
        self
    }

    /// True when the account is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Active technicians and admins can hold tickets.
    #[must_use]
    pub fn is_assignable(&self) -> bool {
        self.is_active() && self.role.is_support_staff()
    }
}

impl Team {
    /// Whether a user with `role` may work tickets routed to this team.
    ///
    /// Support tickets need a technician. Development tickets accept technicians
    /// and admins.
    #[must_use]
    pub const fn accepts(self, role: UserRole) -> bool {
        match self {
            Self::Support => matches!(role, UserRole::Technician),
            Self::Development => matches!(role, UserRole::Technician | UserRole::Admin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_staff_are_assignable() {
        assert!(User::new("t", "Tech", UserRole::Technician).is_assignable());
        assert!(User::new("a", "Admin", UserRole::Admin).is_assignable());
        assert!(!User::new("u", "User", UserRole::User).is_assignable());
        assert!(
            !User::new("t", "Tech", UserRole::Technician)
                .with_status(UserStatus::Suspended)
                .is_assignable()
        );
    }

    #[test]
    fn team_role_compatibility() {
        assert!(Team::Support.accepts(UserRole::Technician));
        assert!(!Team::Support.accepts(UserRole::Admin));
        assert!(Team::Development.accepts(UserRole::Admin));
        assert!(!Team::Development.accepts(UserRole::User));
    }
}
