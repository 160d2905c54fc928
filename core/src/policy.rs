//! Authorization policy for ticket operations.
//!
//! [`authorize`] is a pure function of the acting user's role, their relationship
//! to the ticket, and the requested action. The workflow service calls it before
//! every mutation and turns a [`Decision::Deny`] into an `Unauthorized` error.
//!
//! | Action                 | ADMIN | TECHNICIAN               | USER                         |
//! |------------------------|-------|--------------------------|------------------------------|
//! | View                   | all   | assignee or creator      | creator                      |
//! | Modify                 | all   | assignee or creator      | creator                      |
//! | Change status          | all   | assignee                 | creator, `OPEN -> CLOSED` only |
//! | Close                  | all   | assignee or creator      | assignee or creator          |
//! | Reopen                 | all   | all                      | never                        |
//! | Assign                 | all   | all                      | never                        |
//! | Remove message         | all   | author                   | author                       |

use crate::types::{Ticket, TicketStatus, UserId};
use crate::user::UserRole;
use std::fmt;

/// How the acting user relates to the ticket being acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Relationship {
    /// The user submitted the ticket.
    pub is_creator: bool,
    /// The user is the current assignee.
    pub is_assignee: bool,
}

impl Relationship {
    /// Derives the relationship of `user` to `ticket`.
    #[must_use]
    pub fn between(user: &UserId, ticket: &Ticket) -> Self {
        Self {
            is_creator: ticket.is_created_by(user),
            is_assignee: ticket.is_assigned_to(user),
        }
    }

    /// No relationship at all.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            is_creator: false,
            is_assignee: false,
        }
    }
}

/// An operation a user wants to perform on a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketAction {
    /// Read the ticket and its conversation.
    View,
    /// Edit fields or add messages and attachments.
    Modify,
    /// Move the ticket between two statuses.
    ChangeStatus {
        /// Current status.
        from: TicketStatus,
        /// Requested status.
        to: TicketStatus,
    },
    /// Close the ticket.
    Close,
    /// Reopen a closed ticket.
    Reopen,
    /// Assign the ticket to a user or team.
    Assign,
    /// Delete a message from the conversation.
    RemoveMessage {
        /// The acting user wrote the message.
        is_author: bool,
    },
}

impl fmt::Display for TicketAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::View => f.write_str("view"),
            Self::Modify => f.write_str("modify"),
            Self::ChangeStatus { from, to } => write!(f, "change status {from} -> {to}"),
            Self::Close => f.write_str("close"),
            Self::Reopen => f.write_str("reopen"),
            Self::Assign => f.write_str("assign"),
            Self::RemoveMessage { .. } => f.write_str("remove message"),
        }
    }
}

/// Outcome of a policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The action may proceed.
    Allow,
    /// The action is refused, with a short reason.
    Deny(&'static str),
}

impl Decision {
    /// True for [`Decision::Allow`].
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }

    const fn allow_if(condition: bool, reason: &'static str) -> Self {
        if condition { Self::Allow } else { Self::Deny(reason) }
    }
}

/// Decides whether a user with `role` and `relationship` may perform `action`.
#[must_use]
pub const fn authorize(role: UserRole, relationship: Relationship, action: TicketAction) -> Decision {
    let Relationship {
        is_creator,
        is_assignee,
    } = relationship;

    if matches!(role, UserRole::Admin) {
        return Decision::Allow;
    }

    match action {
        TicketAction::View | TicketAction::Modify => match role {
            UserRole::Technician => Decision::allow_if(
                is_assignee || is_creator,
                "technicians may only act on tickets assigned to or created by them",
            ),
            _ => Decision::allow_if(is_creator, "users may only act on their own tickets"),
        },
        TicketAction::ChangeStatus { from, to } => {
            if matches!(role, UserRole::Technician) && is_assignee {
                Decision::Allow
            } else if is_creator {
                Decision::allow_if(
                    matches!(from, TicketStatus::Open) && matches!(to, TicketStatus::Closed),
                    "creators may only close their own open tickets",
                )
            } else {
                Decision::Deny("only the assignee may change the status")
            }
        }
        TicketAction::Close => Decision::allow_if(
            is_assignee || is_creator,
            "only the assignee or the creator may close the ticket",
        ),
        TicketAction::Reopen | TicketAction::Assign => Decision::allow_if(
            matches!(role, UserRole::Technician),
            "requires a support role",
        ),
        TicketAction::RemoveMessage { is_author } => {
            Decision::allow_if(is_author, "only the author may remove a message")
        }
    }
}
