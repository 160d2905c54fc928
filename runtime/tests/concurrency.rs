//! Concurrent writers on the same ticket.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

mod common;

use common::{Harness, uid};
use helpdesk_core::event::TicketEvent;
use helpdesk_core::types::{Priority, TicketDraft, TicketStatus, TicketType};
use helpdesk_testing::fixtures::{admin, customer, technician};
use std::collections::HashSet;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_assignments_are_serialized() {
    let h = Harness::new([customer("u1"), technician("t1"), technician("t2"), admin("a1")]);
    let ticket = h.open_ticket("u1", TicketType::Bug, Priority::High).await;

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let engine = h.engine.clone();
            let assignee = if i % 2 == 0 { uid("t1") } else { uid("t2") };
            tokio::spawn(async move {
                engine
                    .workflow()
                    .assign_to_user(ticket.id, &assignee, &uid("a1"))
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.expect("task joined").expect("assignment succeeds");
    }

    let events = h.bus.ticket_events();
    let moved = events
        .iter()
        .filter(|e| matches!(e, TicketEvent::StatusChanged { .. }))
        .count();
    // Only the first writer sees OPEN.
    assert_eq!(moved, 1);

    // Each handover saw the one before it, and nobody is handed a ticket they hold.
    let handovers: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            TicketEvent::Assigned {
                previous_assignee,
                assignee,
                ..
            } => Some((previous_assignee.clone(), assignee.clone())),
            _ => None,
        })
        .collect();
    assert!(handovers.len() >= 2);
    assert_eq!(handovers[0].0, None);
    for pair in handovers.windows(2) {
        assert_eq!(pair[1].0.as_ref(), Some(&pair[0].1));
        assert_ne!(pair[1].0.as_ref(), Some(&pair[1].1));
    }

    let stored = h.reload(&ticket).await;
    assert_eq!(stored.status, TicketStatus::InProgress);
    assert!(h.env.locks().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn close_racing_escalation_always_ends_closed() {
    for _ in 0..10 {
        let h = Harness::new([customer("u1"), technician("t1")]);
        let ticket = h.aged_ticket("u1", Priority::Critical, 8);

        let escalation = h.engine.escalation();
        let sweep = tokio::spawn(async move { escalation.sweep().await });
        let engine = h.engine.clone();
        let close = tokio::spawn(async move {
            engine.workflow().close_ticket(ticket.id, &uid("u1")).await
        });

        let report = sweep.await.expect("sweep joined");
        close.await.expect("close joined").expect("creator may close");

        assert_eq!(report.failed, 0);
        assert_eq!(h.reload(&ticket).await.status, TicketStatus::Closed);
        assert!(h.env.locks().is_empty());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_get_distinct_ids() {
    let h = Harness::new([customer("u1"), customer("u2")]);

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let engine = h.engine.clone();
            let creator = if i % 2 == 0 { uid("u1") } else { uid("u2") };
            tokio::spawn(async move {
                engine
                    .workflow()
                    .create_ticket(
                        TicketDraft::new(format!("Ticket number {i}"), TicketType::Bug, Priority::Low),
                        &creator,
                    )
                    .await
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for task in tasks {
        let ticket = task.await.expect("task joined").expect("created");
        assert!(ids.insert(ticket.id));
    }
    assert_eq!(h.store.len(), 20);
    assert_eq!(h.bus.published().len(), 20);
}
