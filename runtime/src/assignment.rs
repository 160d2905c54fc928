//! Assignment engine.
//!
//! Decides who a ticket may go to and applies the assignment:
//!
//! 1. The ticket must be able to reach `IN_PROGRESS` (or already be there).
//! 2. The target must exist, be active and hold a support role.
//! 3. A team-routed ticket only goes to a role that team accepts.
//! 4. The target's active workload is compared to the ceiling. Exceeding it
//!    produces a [`CapacityWarning`], not a refusal.
//!
//! Assigning a user always moves the ticket to `IN_PROGRESS`. Routing to a team
//! moves an `OPEN` ticket to `ASSIGNED` and leaves other statuses alone.

use crate::environment::{WorkflowEnvironment, ensure_allowed};
use crate::metrics::{AssignmentMetrics, TicketMetrics};
use helpdesk_core::WorkflowError;
use helpdesk_core::event::TicketEvent;
use helpdesk_core::policy::TicketAction;
use helpdesk_core::transition::is_valid_transition;
use helpdesk_core::types::{Actor, Team, Ticket, TicketId, TicketStatus, UserId};
use helpdesk_core::user::User;
use helpdesk_core::validation::ValidationError;
use tracing::{info, instrument, warn};

/// Raised when an assignment pushes a user to or past the workload ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityWarning {
    /// The overloaded user.
    pub user_id: UserId,
    /// Active tickets held before this assignment.
    pub active_tickets: usize,
    /// Configured ceiling.
    pub ceiling: usize,
}

/// Picks assignees and applies assignments.
#[derive(Clone)]
pub struct AssignmentEngine {
    env: WorkflowEnvironment,
}

impl AssignmentEngine {
    /// Creates an engine over `env`.
    #[must_use]
    pub const fn new(env: WorkflowEnvironment) -> Self {
        Self { env }
    }

    /// Assigns a ticket to a user and moves it to `IN_PROGRESS`.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if a user actor lacks a support role
    /// - `TicketNotFound` / `UserNotFound` for unknown ids
    /// - `InvalidStatusTransition` if the ticket cannot reach `IN_PROGRESS`
    /// - `Validation` if the target is inactive, not support staff, or outside the ticket's team
    /// - `Store` / `Directory` on infrastructure failure
    #[instrument(skip_all, fields(ticket_id = %ticket_id, assignee = %user_id, actor = %actor))]
    pub async fn assign_to_user(
        &self,
        ticket_id: TicketId,
        user_id: &UserId,
        actor: &Actor,
    ) -> Result<Ticket, WorkflowError> {
        self.authorize(actor).await?;
        let _guard = self.env.locks().lock(ticket_id).await;
        let ticket = self.env.load_ticket(ticket_id).await?;
        self.assign_loaded(ticket, user_id, actor).await
    }

    /// Routes a ticket to a team.
    ///
    /// `OPEN` tickets advance to `ASSIGNED`. Routing to the team the ticket is
    /// already on is a no-op.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if a user actor lacks a support role
    /// - `TicketNotFound` for unknown ids
    /// - `InvalidState` if the ticket is `CLOSED`
    /// - `Store` / `Directory` on infrastructure failure
    #[instrument(skip_all, fields(ticket_id = %ticket_id, team = %team, actor = %actor))]
    pub async fn assign_to_team(
        &self,
        ticket_id: TicketId,
        team: Team,
        actor: &Actor,
    ) -> Result<Ticket, WorkflowError> {
        self.authorize(actor).await?;
        let _guard = self.env.locks().lock(ticket_id).await;
        let mut ticket = self.env.load_ticket(ticket_id).await?;

        if ticket.status == TicketStatus::Closed {
            return Err(WorkflowError::InvalidState {
                ticket_id,
                status: ticket.status,
                reason: "closed tickets cannot be routed to a team",
            });
        }

        let from = ticket.status;
        let previous_team = ticket.assigned_team;
        let team_changed = previous_team != Some(team);
        let advance = from == TicketStatus::Open;
        if !team_changed && !advance {
            return Ok(ticket);
        }

        ticket.assigned_team = Some(team);
        if advance {
            ticket.status = TicketStatus::Assigned;
        }
        let saved = self.env.store.save(ticket).await?;

        let now = self.env.clock.now();
        let mut events = Vec::with_capacity(2);
        if team_changed {
            events.push(TicketEvent::TeamAssigned {
                ticket_id,
                previous_team,
                team,
                assigned_by: actor.clone(),
                occurred_at: now,
            });
        }
        if advance {
            TicketMetrics::record_status_change(from, TicketStatus::Assigned);
            events.push(TicketEvent::StatusChanged {
                ticket_id,
                from,
                to: TicketStatus::Assigned,
                changed_by: actor.clone(),
                occurred_at: now,
            });
        }
        self.env.publish(events).await;

        info!(status = %saved.status, "Ticket routed to team");
        Ok(saved)
    }

    /// Assigns a ticket that the caller has already loaded under its lock.
    pub(crate) async fn assign_loaded(
        &self,
        mut ticket: Ticket,
        user_id: &UserId,
        actor: &Actor,
    ) -> Result<Ticket, WorkflowError> {
        let from = ticket.status;
        if from != TicketStatus::InProgress && !is_valid_transition(from, TicketStatus::InProgress) {
            return Err(WorkflowError::InvalidStatusTransition {
                from,
                to: TicketStatus::InProgress,
            });
        }

        let assignee = self.check_assignee(user_id, ticket.assigned_team).await?;
        let holder_changed = !ticket.is_assigned_to(&assignee.id);
        if holder_changed {
            self.capacity_warning(&assignee.id).await?;
        } else if from == TicketStatus::InProgress {
            return Ok(ticket);
        }

        let previous_assignee = ticket.assigned_user.replace(assignee.id.clone());
        ticket.status = TicketStatus::InProgress;
        let saved = self.env.store.save(ticket).await?;

        let now = self.env.clock.now();
        let mut events = Vec::with_capacity(2);
        if holder_changed {
            AssignmentMetrics::record_assignment(actor);
            events.push(TicketEvent::Assigned {
                ticket_id: saved.id,
                previous_assignee,
                assignee: assignee.id.clone(),
                assigned_by: actor.clone(),
                occurred_at: now,
            });
        }
        if from != TicketStatus::InProgress {
            TicketMetrics::record_status_change(from, TicketStatus::InProgress);
            events.push(TicketEvent::StatusChanged {
                ticket_id: saved.id,
                from,
                to: TicketStatus::InProgress,
                changed_by: actor.clone(),
                occurred_at: now,
            });
        }
        self.env.publish(events).await;

        info!(ticket_id = %saved.id, assignee = %assignee.id, "Ticket assigned");
        Ok(saved)
    }

    /// Resolves `user_id` and checks it may hold a ticket routed to `team`.
    pub(crate) async fn check_assignee(
        &self,
        user_id: &UserId,
        team: Option<Team>,
    ) -> Result<User, WorkflowError> {
        let user = self.env.resolve_user(user_id).await?;
        if !user.is_active() {
            return Err(ValidationError::AssigneeNotEligible {
                user_id: user.id,
                reason: "account is not active",
            }
            .into());
        }
        if !user.role.is_support_staff() {
            return Err(ValidationError::AssigneeNotEligible {
                user_id: user.id,
                reason: "only technicians and admins can hold tickets",
            }
            .into());
        }
        if let Some(team) = team {
            if !team.accepts(user.role) {
                return Err(ValidationError::TeamMismatch {
                    team,
                    role: user.role,
                }
                .into());
            }
        }
        Ok(user)
    }

    /// Compares `user_id`'s active workload to the ceiling.
    ///
    /// Logs and counts a warning when the user is at or above it. The
    /// assignment still goes ahead.
    ///
    /// # Errors
    ///
    /// `Store` if the workload cannot be counted.
    pub async fn capacity_warning(
        &self,
        user_id: &UserId,
    ) -> Result<Option<CapacityWarning>, WorkflowError> {
        let active_tickets = self.active_workload(user_id).await?;
        let ceiling = self.env.config.workload_ceiling;
        if active_tickets < ceiling {
            return Ok(None);
        }
        warn!(user = %user_id, active_tickets, ceiling, "Assigning to user at workload ceiling");
        AssignmentMetrics::record_capacity_warning();
        Ok(Some(CapacityWarning {
            user_id: user_id.clone(),
            active_tickets,
            ceiling,
        }))
    }

    /// The least loaded assignable candidate. Ties go to the earliest in `candidates`.
    ///
    /// Users who are inactive or lack a support role are skipped. Returns `None`
    /// when nobody qualifies.
    ///
    /// # Errors
    ///
    /// `Store` if a workload cannot be counted.
    pub async fn find_best_candidate(&self, candidates: &[User]) -> Result<Option<User>, WorkflowError> {
        let mut loads = Vec::with_capacity(candidates.len());
        for candidate in candidates.iter().filter(|c| c.is_assignable()) {
            loads.push((candidate, self.active_workload(&candidate.id).await?));
        }
        Ok(least_loaded(loads).cloned())
    }

    /// Active technicians still below the workload ceiling.
    ///
    /// # Errors
    ///
    /// `Directory` or `Store` on infrastructure failure.
    pub async fn available_candidates(&self) -> Result<Vec<User>, WorkflowError> {
        let technicians = self.env.directory.get_active_technicians().await?;
        let ceiling = self.env.config.workload_ceiling;
        let mut available = Vec::with_capacity(technicians.len());
        for technician in technicians {
            if self.active_workload(&technician.id).await? < ceiling {
                available.push(technician);
            }
        }
        Ok(available)
    }

    /// Assigns a ticket to the least loaded active technician, as the system.
    ///
    /// Returns `Ok(None)` when no technician is available.
    ///
    /// # Errors
    ///
    /// Any error from the candidate lookup or [`assign_to_user`](Self::assign_to_user).
    pub async fn auto_assign(&self, ticket_id: TicketId) -> Result<Option<Ticket>, WorkflowError> {
        let technicians = self.env.directory.get_active_technicians().await?;
        let Some(candidate) = self.find_best_candidate(&technicians).await? else {
            return Ok(None);
        };
        self.assign_to_user(ticket_id, &candidate.id, &Actor::System)
            .await
            .map(Some)
    }

    async fn active_workload(&self, user_id: &UserId) -> Result<usize, WorkflowError> {
        Ok(self
            .env
            .store
            .count_by_assignee_and_status(user_id, TicketStatus::ACTIVE)
            .await?)
    }

    async fn authorize(&self, actor: &Actor) -> Result<(), WorkflowError> {
        match actor {
            Actor::System => Ok(()),
            Actor::User(id) => {
                let user = self.env.resolve_user(id).await?;
                ensure_allowed(&user, None, TicketAction::Assign)
            }
        }
    }
}

/// Minimum by load, keeping the first on ties.
fn least_loaded<T>(loads: impl IntoIterator<Item = (T, usize)>) -> Option<T> {
    let mut best: Option<(T, usize)> = None;
    for (candidate, load) in loads {
        match &best {
            Some((_, best_load)) if load >= *best_load => {}
            _ => best = Some((candidate, load)),
        }
    }
    best.map(|(candidate, _)| candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ties_go_to_the_first_candidate() {
        assert_eq!(least_loaded([("a", 2), ("b", 1), ("c", 1)]), Some("b"));
        assert_eq!(least_loaded([("a", 0), ("b", 0)]), Some("a"));
        assert_eq!(least_loaded(Vec::<(&str, usize)>::new()), None);
    }

    proptest! {
        #[test]
        fn least_loaded_is_a_minimum(loads in prop::collection::vec(0usize..20, 1..12)) {
            let indexed: Vec<(usize, usize)> = loads.iter().copied().enumerate().collect();
            let chosen = least_loaded(indexed.clone());
            prop_assert!(chosen.is_some());
            let chosen = chosen.unwrap_or_default();
            let min = loads.iter().copied().min().unwrap_or_default();
            prop_assert_eq!(loads[chosen], min);
            prop_assert!(loads[..chosen].iter().all(|load| *load > min));
        }
    }
}
