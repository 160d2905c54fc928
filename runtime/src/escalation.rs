//! SLA escalation.
//!
//! Every priority has a response window:
//!
//! | Priority | Hours |
//! |----------|-------|
//! | CRITICAL | 4     |
//! | HIGH     | 24    |
//! | MEDIUM   | 48    |
//! | LOW      | 72    |
//!
//! [`EscalationService::sweep`] looks at every `OPEN` and `ASSIGNED` ticket.
//! Tickets past their window are reassigned to the least loaded active
//! technician; tickets inside the last hour of their window are only logged.
//! One ticket failing never stops the sweep.
//!
//! [`EscalationScheduler`] runs sweeps on a [`Ticker`] until shutdown:
//!
//! ```text
//! loop {
//!     select {
//!         shutdown => stop
//!         tick     => sweep, report
//!     }
//! }
//! ```

use crate::assignment::AssignmentEngine;
use crate::environment::WorkflowEnvironment;
use crate::metrics::EscalationMetrics;
use helpdesk_core::WorkflowError;
use helpdesk_core::environment::Ticker;
use helpdesk_core::sla;
use helpdesk_core::types::{Actor, Ticket, TicketStatus};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Statuses the sweep looks at, in order.
const SWEPT_STATUSES: [TicketStatus; 2] = [TicketStatus::Open, TicketStatus::Assigned];

/// What one sweep saw and did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Tickets looked at.
    pub examined: usize,
    /// Tickets past their SLA window.
    pub breached: usize,
    /// Tickets inside the early-warning window.
    pub approaching: usize,
    /// Breached tickets handed to a new technician.
    pub reassigned: usize,
    /// Breached tickets left alone because nobody was available.
    pub without_candidate: usize,
    /// Breached tickets that changed underneath the sweep and no longer qualified.
    pub skipped: usize,
    /// Breached tickets whose escalation failed.
    pub failed: usize,
    /// Status queries that failed, skipping that whole status.
    pub query_failures: usize,
}

/// Result of escalating one breached ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscalationOutcome {
    /// The ticket went to a new technician.
    Reassigned(Ticket),
    /// No active technician was available.
    NoCandidate,
    /// The ticket was no longer open, assigned or breached once locked.
    Skipped,
}

/// SLA checks and reassignment of breached tickets.
#[derive(Clone)]
pub struct EscalationService {
    env: WorkflowEnvironment,
    assignment: AssignmentEngine,
}

impl EscalationService {
    /// Creates a service over `env`.
    #[must_use]
    pub fn new(env: WorkflowEnvironment) -> Self {
        let assignment = AssignmentEngine::new(env.clone());
        Self { env, assignment }
    }

    /// True when `ticket` is at or past its SLA threshold.
    #[must_use]
    pub fn needs_escalation(&self, ticket: &Ticket) -> bool {
        sla::needs_escalation(ticket, self.env.clock.now())
    }

    /// True when `ticket` is inside the early-warning window but not yet breached.
    #[must_use]
    pub fn is_approaching_escalation(&self, ticket: &Ticket) -> bool {
        sla::is_approaching_escalation(
            ticket,
            self.env.clock.now(),
            self.env.config.approaching_window_hours,
        )
    }

    /// Examines every `OPEN` and `ASSIGNED` ticket once.
    ///
    /// Never fails: query and per-ticket errors are logged and counted in the
    /// report.
    pub async fn sweep(&self) -> SweepReport {
        let started = Instant::now();
        let mut report = SweepReport::default();

        for status in SWEPT_STATUSES {
            let tickets = match self.env.store.find_by_status(status).await {
                Ok(tickets) => tickets,
                Err(e) => {
                    error!(%status, error = %e, "Failed to list tickets for escalation");
                    report.query_failures += 1;
                    continue;
                }
            };

            for ticket in tickets {
                report.examined += 1;

                if self.is_approaching_escalation(&ticket) {
                    report.approaching += 1;
                    info!(
                        ticket_id = %ticket.id,
                        priority = %ticket.priority,
                        deadline = %sla::escalation_deadline(ticket.priority, ticket.created_at),
                        "Ticket approaching SLA deadline"
                    );
                    continue;
                }
                if !self.needs_escalation(&ticket) {
                    continue;
                }

                report.breached += 1;
                warn!(
                    ticket_id = %ticket.id,
                    priority = %ticket.priority,
                    age_hours = sla::age_hours(ticket.created_at, self.env.clock.now()),
                    "Ticket breached SLA"
                );

                match self.escalate(&ticket).await {
                    Ok(EscalationOutcome::Reassigned(updated)) => {
                        report.reassigned += 1;
                        info!(
                            ticket_id = %updated.id,
                            assignee = ?updated.assigned_user,
                            "Escalated ticket reassigned"
                        );
                    }
                    Ok(EscalationOutcome::NoCandidate) => {
                        report.without_candidate += 1;
                        warn!(ticket_id = %ticket.id, "No technician available for escalation");
                    }
                    Ok(EscalationOutcome::Skipped) => {
                        report.skipped += 1;
                        debug!(ticket_id = %ticket.id, "Ticket changed before escalation, skipped");
                    }
                    Err(e) => {
                        report.failed += 1;
                        error!(ticket_id = %ticket.id, error = %e, "Escalation failed");
                    }
                }
            }
        }

        let elapsed = started.elapsed();
        EscalationMetrics::record_sweep(&report, elapsed);
        info!(
            examined = report.examined,
            breached = report.breached,
            reassigned = report.reassigned,
            failed = report.failed,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "Escalation sweep finished"
        );
        report
    }

    /// Reassigns one breached ticket to the least loaded active technician.
    ///
    /// The ticket is re-read under its lock; if it has since left `OPEN` or
    /// `ASSIGNED`, or no longer breaches, nothing happens.
    ///
    /// # Errors
    ///
    /// Any error from the candidate lookup or the assignment itself.
    pub async fn escalate(&self, ticket: &Ticket) -> Result<EscalationOutcome, WorkflowError> {
        let technicians = self.env.directory.get_active_technicians().await?;
        let Some(candidate) = self.assignment.find_best_candidate(&technicians).await? else {
            return Ok(EscalationOutcome::NoCandidate);
        };

        let _guard = self.env.locks().lock(ticket.id).await;
        let current = self.env.load_ticket(ticket.id).await?;
        if !SWEPT_STATUSES.contains(&current.status) || !self.needs_escalation(&current) {
            return Ok(EscalationOutcome::Skipped);
        }

        let updated = self
            .assignment
            .assign_loaded(current, &candidate.id, &Actor::System)
            .await?;
        Ok(EscalationOutcome::Reassigned(updated))
    }
}

/// Ticker backed by [`tokio::time::interval`].
///
/// The first tick fires immediately. Ticks missed while a sweep overruns are
/// skipped rather than bunched up.
#[derive(Debug)]
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    /// Ticks every `period`. Must be called inside a tokio runtime.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }
}

impl Ticker for IntervalTicker {
    fn tick(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.interval.tick().await;
        })
    }
}

/// Background loop running escalation sweeps.
///
/// # Lifecycle
///
/// 1. Created via `new()`
/// 2. Spawned as background task via `spawn()`
/// 3. Runs until the shutdown channel fires or closes. A sweep in progress
///    finishes before the loop checks for shutdown again.
pub struct EscalationScheduler {
    service: Arc<EscalationService>,
    ticker: Box<dyn Ticker>,
    shutdown: broadcast::Receiver<()>,
    reports: Option<mpsc::Sender<SweepReport>>,
}

impl EscalationScheduler {
    /// Creates a scheduler that sweeps with `service` on every tick of `ticker`.
    #[must_use]
    pub fn new(
        service: Arc<EscalationService>,
        ticker: Box<dyn Ticker>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            service,
            ticker,
            shutdown,
            reports: None,
        }
    }

    /// Sends each sweep's report to `reports`. A closed receiver is ignored.
    #[must_use]
    pub fn with_reports(mut self, reports: mpsc::Sender<SweepReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Spawn the scheduler as a background task.
    #[must_use]
    pub fn spawn(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Runs until shutdown.
    pub async fn run(&mut self) {
        info!("Escalation scheduler started");

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!("Escalation scheduler received shutdown signal");
                    break;
                }
                () = self.ticker.tick() => {
                    let report = self.service.sweep().await;
                    if let Some(reports) = &self.reports {
                        if reports.send(report).await.is_err() {
                            debug!("Sweep report receiver dropped");
                        }
                    }
                }
            }
        }

        info!("Escalation scheduler stopped");
    }
}
