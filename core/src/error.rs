//! Error taxonomy of the workflow engine.

use crate::directory::DirectoryError;
use crate::policy::TicketAction;
use crate::store::StoreError;
use crate::types::{MessageId, TicketId, TicketStatus, UserId};
use crate::validation::ValidationError;
use thiserror::Error;

/// Every failure an engine operation can return.
///
/// Domain-rule violations (validation, transition, authorization, state) are
/// detected before any write. Infrastructure failures are propagated as-is; the
/// engine does not retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// Malformed input or ineligible assignee.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The ticket id does not resolve.
    #[error("ticket {0} not found")]
    TicketNotFound(TicketId),

    /// The user id does not resolve.
    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// The message id does not resolve within the ticket.
    #[error("message {message_id} not found on ticket {ticket_id}")]
    MessageNotFound {
        /// The ticket.
        ticket_id: TicketId,
        /// The missing message.
        message_id: MessageId,
    },

    /// The requested move is not in the transition table.
    #[error("invalid status transition from {from} to {to}")]
    InvalidStatusTransition {
        /// Current status.
        from: TicketStatus,
        /// Requested status.
        to: TicketStatus,
    },

    /// The operation does not apply to the ticket's current state.
    #[error("ticket {ticket_id} is {status}: {reason}")]
    InvalidState {
        /// The ticket.
        ticket_id: TicketId,
        /// Its current status.
        status: TicketStatus,
        /// What was expected.
        reason: &'static str,
    },

    /// The acting user lacks the role or relationship the action requires.
    #[error("user {actor} may not {action}: {reason}")]
    Unauthorized {
        /// The acting user.
        actor: UserId,
        /// The refused action.
        action: TicketAction,
        /// Policy reason.
        reason: &'static str,
    },

    /// The ticket store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The user directory failed.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl WorkflowError {
    /// True for store and directory failures.
    #[must_use]
    pub const fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Directory(_))
    }

    /// True for lookup misses.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::TicketNotFound(_) | Self::UserNotFound(_) | Self::MessageNotFound { .. }
        )
    }

    /// Short label for metrics and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::TicketNotFound(_) | Self::UserNotFound(_) | Self::MessageNotFound { .. } => {
                "not_found"
            }
            Self::InvalidStatusTransition { .. } => "invalid_transition",
            Self::InvalidState { .. } => "invalid_state",
            Self::Unauthorized { .. } => "unauthorized",
            Self::Store(_) | Self::Directory(_) => "infrastructure",
        }
    }
}
