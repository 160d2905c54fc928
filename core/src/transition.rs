//! The status transition table.
//!
//! | From          | To                              |
//! |---------------|---------------------------------|
//! | `OPEN`        | `ASSIGNED`, `IN_PROGRESS`, `CLOSED` |
//! | `ASSIGNED`    | `IN_PROGRESS`, `OPEN`, `CLOSED` |
//! | `IN_PROGRESS` | `RESOLVED`, `ASSIGNED`, `CLOSED` |
//! | `RESOLVED`    | `CLOSED`, `REOPENED`, `IN_PROGRESS` |
//! | `CLOSED`      | `REOPENED`                      |
//! | `REOPENED`    | `ASSIGNED`, `IN_PROGRESS`, `CLOSED` |
//!
//! Self-transitions are never legal. There is no terminal state.

use crate::types::TicketStatus;

/// Statuses reachable in one step from `from`.
#[must_use]
pub const fn allowed_targets(from: TicketStatus) -> &'static [TicketStatus] {
    use TicketStatus::{Assigned, Closed, InProgress, Open, Reopened, Resolved};

    match from {
        Open => &[Assigned, InProgress, Closed],
        Assigned => &[InProgress, Open, Closed],
        InProgress => &[Resolved, Assigned, Closed],
        Resolved => &[Closed, Reopened, InProgress],
        Closed => &[Reopened],
        Reopened => &[Assigned, InProgress, Closed],
    }
}

/// Whether `from -> to` is a legal single-step move.
#[must_use]
pub fn is_valid_transition(from: TicketStatus, to: TicketStatus) -> bool {
    allowed_targets(from).contains(&to)
}

impl TicketStatus {
    /// Method form of [`is_valid_transition`].
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        is_valid_transition(self, to)
    }
}
