//! Integration tests for the assignment engine.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

mod common;

use common::{Harness, uid};
use helpdesk_core::WorkflowError;
use helpdesk_core::event::TicketEvent;
use helpdesk_core::types::{Actor, Priority, Team, TicketStatus, TicketType};
use helpdesk_core::user::User;
use helpdesk_core::validation::ValidationError;
use helpdesk_runtime::{CapacityWarning, EngineConfig};
use helpdesk_testing::fixtures::{admin, customer, inactive_technician, technician};

fn harness() -> Harness {
    Harness::new([
        customer("u1"),
        customer("u2"),
        technician("t1"),
        technician("t2"),
        inactive_technician("t3"),
        admin("a1"),
    ])
}

// ============================================================================
// Assigning users
// ============================================================================

#[tokio::test]
async fn assignment_moves_ticket_in_progress() {
    let h = harness();
    let ticket = h.open_ticket("u1", TicketType::Bug, Priority::High).await;

    let assigned = h
        .engine
        .assignment()
        .assign_to_user(ticket.id, &uid("t1"), &Actor::User(uid("a1")))
        .await
        .expect("assignment succeeds");

    assert_eq!(assigned.status, TicketStatus::InProgress);
    assert_eq!(assigned.assigned_user, Some(uid("t1")));
    assert_eq!(h.reload(&ticket).await, assigned);

    let events = h.bus.ticket_events();
    assert!(matches!(
        &events[..],
        [
            TicketEvent::Assigned { previous_assignee: None, .. },
            TicketEvent::StatusChanged {
                from: TicketStatus::Open,
                to: TicketStatus::InProgress,
                ..
            },
        ]
    ));
}

#[tokio::test]
async fn plain_users_cannot_hold_tickets() {
    let h = harness();
    let ticket = h.open_ticket("u1", TicketType::Bug, Priority::High).await;

    let err = h
        .workflow()
        .assign_to_user(ticket.id, &uid("u2"), &uid("a1"))
        .await
        .expect_err("role USER is not assignable");

    assert!(matches!(
        err,
        WorkflowError::Validation(ValidationError::AssigneeNotEligible { .. })
    ));
    let unchanged = h.reload(&ticket).await;
    assert_eq!(unchanged.status, TicketStatus::Open);
    assert!(unchanged.assigned_user.is_none());
    assert!(h.bus.published().is_empty());
}

#[tokio::test]
async fn inactive_technicians_cannot_hold_tickets() {
    let h = harness();
    let ticket = h.open_ticket("u1", TicketType::Bug, Priority::High).await;

    let err = h
        .workflow()
        .assign_to_user(ticket.id, &uid("t3"), &uid("a1"))
        .await
        .expect_err("inactive accounts are not assignable");

    assert!(matches!(
        err,
        WorkflowError::Validation(ValidationError::AssigneeNotEligible { .. })
    ));
}

#[tokio::test]
async fn unknown_assignee_is_not_found() {
    let h = harness();
    let ticket = h.open_ticket("u1", TicketType::Bug, Priority::High).await;

    assert_eq!(
        h.workflow().assign_to_user(ticket.id, &uid("ghost"), &uid("a1")).await,
        Err(WorkflowError::UserNotFound(uid("ghost")))
    );
}

#[tokio::test]
async fn only_support_staff_may_assign() {
    let h = harness();
    let ticket = h.open_ticket("u1", TicketType::Bug, Priority::High).await;

    let err = h
        .workflow()
        .assign_to_user(ticket.id, &uid("t1"), &uid("u1"))
        .await
        .expect_err("creators cannot assign");
    assert!(matches!(err, WorkflowError::Unauthorized { .. }));

    h.workflow()
        .assign_to_user(ticket.id, &uid("t1"), &uid("t2"))
        .await
        .expect("technicians may assign");
}

#[tokio::test]
async fn closed_tickets_cannot_be_assigned() {
    let h = harness();
    let ticket = h.open_ticket("u1", TicketType::Bug, Priority::High).await;
    h.workflow().close_ticket(ticket.id, &uid("u1")).await.expect("closed");

    assert_eq!(
        h.workflow().assign_to_user(ticket.id, &uid("t1"), &uid("a1")).await,
        Err(WorkflowError::InvalidStatusTransition {
            from: TicketStatus::Closed,
            to: TicketStatus::InProgress,
        })
    );
}

#[tokio::test]
async fn reassignment_keeps_status_and_records_previous_assignee() {
    let h = harness();
    let ticket = h.open_ticket("u1", TicketType::Bug, Priority::High).await;
    h.workflow()
        .assign_to_user(ticket.id, &uid("t1"), &uid("a1"))
        .await
        .expect("first assignment");
    h.bus.clear();

    let reassigned = h
        .workflow()
        .assign_to_user(ticket.id, &uid("t2"), &uid("a1"))
        .await
        .expect("reassignment");

    assert_eq!(reassigned.status, TicketStatus::InProgress);
    assert_eq!(reassigned.assigned_user, Some(uid("t2")));
    let events = h.bus.ticket_events();
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        TicketEvent::Assigned { previous_assignee: Some(previous), .. } if *previous == uid("t1")
    ));
}

#[tokio::test]
async fn team_roles_are_enforced() {
    let h = harness();
    let ticket = h.open_ticket("u1", TicketType::Bug, Priority::High).await;
    h.workflow()
        .assign_to_team(ticket.id, Team::Support, &uid("a1"))
        .await
        .expect("routed");

    assert!(matches!(
        h.workflow().assign_to_user(ticket.id, &uid("a1"), &uid("a1")).await,
        Err(WorkflowError::Validation(ValidationError::TeamMismatch { .. }))
    ));

    let dev = h.open_ticket("u1", TicketType::Bug, Priority::High).await;
    h.workflow()
        .assign_to_team(dev.id, Team::Development, &uid("a1"))
        .await
        .expect("routed");
    let assigned = h
        .workflow()
        .assign_to_user(dev.id, &uid("a1"), &uid("a1"))
        .await
        .expect("development accepts admins");
    assert_eq!(assigned.assigned_user, Some(uid("a1")));
}

#[tokio::test]
async fn reassigning_the_current_holder_changes_nothing() {
    let h = harness();
    let ticket = h.open_ticket("u1", TicketType::Bug, Priority::High).await;
    h.workflow()
        .assign_to_user(ticket.id, &uid("t1"), &uid("a1"))
        .await
        .expect("assigned");
    let writes = h.store.write_count();
    h.bus.clear();

    let again = h
        .workflow()
        .assign_to_user(ticket.id, &uid("t1"), &uid("a1"))
        .await
        .expect("idempotent");

    assert_eq!(again.status, TicketStatus::InProgress);
    assert_eq!(again.assigned_user, Some(uid("t1")));
    assert_eq!(h.store.write_count(), writes);
    assert!(h.bus.published().is_empty());
}

#[tokio::test]
async fn assignment_over_the_ceiling_warns_but_proceeds() {
    let h = Harness::with_config(
        [customer("u1"), technician("t1"), admin("a1")],
        EngineConfig::default().with_workload_ceiling(1),
    );
    let first = h.open_ticket("u1", TicketType::Bug, Priority::High).await;
    let second = h.open_ticket("u1", TicketType::Bug, Priority::High).await;
    h.workflow()
        .assign_to_user(first.id, &uid("t1"), &uid("a1"))
        .await
        .expect("below ceiling");

    assert_eq!(
        h.engine.assignment().capacity_warning(&uid("t1")).await,
        Ok(Some(CapacityWarning {
            user_id: uid("t1"),
            active_tickets: 1,
            ceiling: 1,
        }))
    );
    let second = h
        .workflow()
        .assign_to_user(second.id, &uid("t1"), &uid("a1"))
        .await
        .expect("capacity is advisory");
    assert_eq!(second.assigned_user, Some(uid("t1")));
    assert_eq!(h.engine.queries().workload(&uid("t1")).await.expect("workload").active, 2);
}

// ============================================================================
// Team routing
// ============================================================================

#[tokio::test]
async fn routing_an_open_ticket_marks_it_assigned() {
    let h = harness();
    let ticket = h.open_ticket("u1", TicketType::Bug, Priority::High).await;

    let routed = h
        .workflow()
        .assign_to_team(ticket.id, Team::Development, &uid("t1"))
        .await
        .expect("routed");

    assert_eq!(routed.status, TicketStatus::Assigned);
    assert_eq!(routed.assigned_team, Some(Team::Development));
    assert_eq!(h.bus.event_types(), ["TicketTeamAssigned.v1", "TicketStatusChanged.v1"]);
}

#[tokio::test]
async fn routing_again_to_the_same_team_is_a_no_op() {
    let h = harness();
    let ticket = h.open_ticket("u1", TicketType::Bug, Priority::High).await;
    h.workflow()
        .assign_to_team(ticket.id, Team::Support, &uid("a1"))
        .await
        .expect("routed");
    let writes = h.store.write_count();
    h.bus.clear();

    let again = h
        .workflow()
        .assign_to_team(ticket.id, Team::Support, &uid("a1"))
        .await
        .expect("idempotent");

    assert_eq!(again.status, TicketStatus::Assigned);
    assert_eq!(h.store.write_count(), writes);
    assert!(h.bus.published().is_empty());
}

#[tokio::test]
async fn routing_leaves_in_progress_tickets_in_progress() {
    let h = harness();
    let ticket = h.open_ticket("u1", TicketType::Bug, Priority::High).await;
    h.workflow()
        .assign_to_user(ticket.id, &uid("t1"), &uid("a1"))
        .await
        .expect("assigned");

    let routed = h
        .workflow()
        .assign_to_team(ticket.id, Team::Support, &uid("a1"))
        .await
        .expect("routed");
    assert_eq!(routed.status, TicketStatus::InProgress);
}

#[tokio::test]
async fn closed_tickets_cannot_be_routed() {
    let h = harness();
    let ticket = h.open_ticket("u1", TicketType::Bug, Priority::High).await;
    h.workflow().close_ticket(ticket.id, &uid("u1")).await.expect("closed");

    assert!(matches!(
        h.workflow().assign_to_team(ticket.id, Team::Support, &uid("a1")).await,
        Err(WorkflowError::InvalidState { .. })
    ));
}

// ============================================================================
// Candidate selection
// ============================================================================

#[tokio::test]
async fn best_candidate_skips_ineligible_users_and_prefers_idle_ones() {
    let h = harness();
    let ticket = h.open_ticket("u1", TicketType::Bug, Priority::High).await;
    h.workflow()
        .assign_to_user(ticket.id, &uid("t1"), &uid("a1"))
        .await
        .expect("assigned");

    let candidates: Vec<User> = vec![
        customer("u2"),
        inactive_technician("t3"),
        technician("t1"),
        technician("t2"),
    ];
    let best = h
        .engine
        .assignment()
        .find_best_candidate(&candidates)
        .await
        .expect("lookup succeeds");
    assert_eq!(best.map(|u| u.id), Some(uid("t2")));

    let nobody = h
        .engine
        .assignment()
        .find_best_candidate(&[customer("u2")])
        .await
        .expect("lookup succeeds");
    assert!(nobody.is_none());
}

#[tokio::test]
async fn available_candidates_exclude_saturated_technicians() {
    let h = Harness::with_config(
        [customer("u1"), technician("t1"), technician("t2"), admin("a1")],
        EngineConfig::default().with_workload_ceiling(1),
    );
    let ticket = h.open_ticket("u1", TicketType::Bug, Priority::High).await;
    h.workflow()
        .assign_to_user(ticket.id, &uid("t1"), &uid("a1"))
        .await
        .expect("assigned");

    let available: Vec<_> = h
        .engine
        .assignment()
        .available_candidates()
        .await
        .expect("lookup succeeds")
        .into_iter()
        .map(|u| u.id)
        .collect();
    assert_eq!(available, [uid("t2")]);
}
