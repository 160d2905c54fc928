//! Priority-based service level agreements.
//!
//! A ticket's age is measured in whole hours (truncated) since creation. It needs
//! escalation once that age reaches the SLA for its priority, and is approaching
//! escalation during the window just before.

use crate::types::{Priority, Ticket};
use chrono::{DateTime, Duration, Utc};

/// SLA threshold in hours for `priority`.
#[must_use]
pub const fn sla_hours(priority: Priority) -> i64 {
    match priority {
        Priority::Critical => 4,
        Priority::High => 24,
        Priority::Medium => 48,
        Priority::Low => 72,
    }
}

/// Whole hours elapsed between `created_at` and `now`, truncated toward zero.
#[must_use]
pub fn age_hours(created_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - created_at).num_hours()
}

/// Instant at which a ticket created at `created_at` breaches its SLA.
#[must_use]
pub fn escalation_deadline(priority: Priority, created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + Duration::hours(sla_hours(priority))
}

/// True once the ticket's age has reached its SLA threshold.
#[must_use]
pub fn needs_escalation(ticket: &Ticket, now: DateTime<Utc>) -> bool {
    age_hours(ticket.created_at, now) >= sla_hours(ticket.priority)
}

/// True while the ticket is within `window_hours` of its threshold but not past it.
#[must_use]
pub fn is_approaching_escalation(ticket: &Ticket, now: DateTime<Utc>, window_hours: i64) -> bool {
    let age = age_hours(ticket.created_at, now);
    let threshold = sla_hours(ticket.priority);
    age >= threshold - window_hours && age < threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TicketId, TicketStatus, TicketType, UserId};
    use proptest::prelude::*;

    fn ticket(priority: Priority, created_at: DateTime<Utc>) -> Ticket {
        Ticket {
            id: TicketId::new(1),
            title: "VPN down".to_string(),
            description: String::new(),
            status: TicketStatus::Open,
            ticket_type: TicketType::Incident,
            priority,
            created_by: UserId::new("u1"),
            assigned_user: None,
            assigned_team: None,
            messages: Vec::new(),
            attachments: Vec::new(),
            created_at,
            updated_at: created_at,
        }
    }

    fn epoch() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    #[test]
    fn sla_table() {
        assert_eq!(sla_hours(Priority::Critical), 4);
        assert_eq!(sla_hours(Priority::High), 24);
        assert_eq!(sla_hours(Priority::Medium), 48);
        assert_eq!(sla_hours(Priority::Low), 72);
    }

    #[test]
    fn critical_breaches_at_four_whole_hours() {
        let t = ticket(Priority::Critical, epoch());
        let almost = epoch() + Duration::hours(3) + Duration::minutes(59);
        assert!(!needs_escalation(&t, almost));
        assert!(is_approaching_escalation(&t, almost, 1));
        assert!(needs_escalation(&t, epoch() + Duration::hours(4)));
        assert!(!is_approaching_escalation(&t, epoch() + Duration::hours(4), 1));
    }

    #[test]
    fn fresh_ticket_is_neither() {
        let t = ticket(Priority::High, epoch());
        let now = epoch() + Duration::hours(2);
        assert!(!needs_escalation(&t, now));
        assert!(!is_approaching_escalation(&t, now, 1));
    }

    #[test]
    fn deadline_adds_threshold() {
        assert_eq!(
            escalation_deadline(Priority::Medium, epoch()),
            epoch() + Duration::hours(48)
        );
    }

    proptest! {
        #[test]
        fn approaching_and_breached_are_exclusive(minutes in 0i64..10_000, idx in 0usize..4) {
            let priority = Priority::ALL[idx];
            let t = ticket(priority, epoch());
            let now = epoch() + Duration::minutes(minutes);
            prop_assert!(!(needs_escalation(&t, now) && is_approaching_escalation(&t, now, 1)));
        }
    }
}
