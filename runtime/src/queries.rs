//! Read-side queries over the ticket store.

use crate::environment::WorkflowEnvironment;
use helpdesk_core::WorkflowError;
use helpdesk_core::types::{Priority, Team, Ticket, TicketStatistics, TicketStatus, UserId, WorkloadStats};
use helpdesk_core::user::UserRole;
use std::collections::BTreeMap;

/// Lookups and aggregates. Nothing here takes a ticket lock.
#[derive(Clone)]
pub struct TicketQueries {
    env: WorkflowEnvironment,
}

impl TicketQueries {
    /// Creates a query service over `env`.
    #[must_use]
    pub const fn new(env: WorkflowEnvironment) -> Self {
        Self { env }
    }

    /// Tickets in `status`, oldest first.
    ///
    /// # Errors
    ///
    /// `Store` on infrastructure failure.
    pub async fn by_status(&self, status: TicketStatus) -> Result<Vec<Ticket>, WorkflowError> {
        Ok(self.env.store.find_by_status(status).await?)
    }

    /// Tickets with `priority`, oldest first.
    ///
    /// # Errors
    ///
    /// `Store` on infrastructure failure.
    pub async fn by_priority(&self, priority: Priority) -> Result<Vec<Ticket>, WorkflowError> {
        Ok(self.env.store.find_by_priority(priority).await?)
    }

    /// Tickets routed to `team`, oldest first.
    ///
    /// # Errors
    ///
    /// `Store` on infrastructure failure.
    pub async fn by_team(&self, team: Team) -> Result<Vec<Ticket>, WorkflowError> {
        Ok(self.env.store.find_by_team(team).await?)
    }

    /// Tickets assigned to `user`, oldest first.
    ///
    /// # Errors
    ///
    /// `Store` on infrastructure failure.
    pub async fn assigned_to(&self, user: &UserId) -> Result<Vec<Ticket>, WorkflowError> {
        Ok(self.env.store.find_by_assignee(user).await?)
    }

    /// Tickets submitted by `user`, oldest first.
    ///
    /// # Errors
    ///
    /// `Store` on infrastructure failure.
    pub async fn created_by(&self, user: &UserId) -> Result<Vec<Ticket>, WorkflowError> {
        Ok(self.env.store.find_by_creator(user).await?)
    }

    /// Every ticket, oldest first.
    ///
    /// # Errors
    ///
    /// `Store` on infrastructure failure.
    pub async fn all(&self) -> Result<Vec<Ticket>, WorkflowError> {
        Ok(self.env.store.find_all().await?)
    }

    /// The tickets `viewer` may see.
    ///
    /// Admins see everything, technicians what they created or hold, users what
    /// they created.
    ///
    /// # Errors
    ///
    /// `UserNotFound` for an unknown viewer, `Store` / `Directory` on infrastructure failure.
    pub async fn visible_to(&self, viewer: &UserId) -> Result<Vec<Ticket>, WorkflowError> {
        let user = self.env.resolve_user(viewer).await?;
        match user.role {
            UserRole::Admin => self.all().await,
            UserRole::User => self.created_by(&user.id).await,
            UserRole::Technician => {
                let mut merged = BTreeMap::new();
                for ticket in self
                    .assigned_to(&user.id)
                    .await?
                    .into_iter()
                    .chain(self.created_by(&user.id).await?)
                {
                    merged.insert((ticket.created_at, ticket.id), ticket);
                }
                Ok(merged.into_values().collect())
            }
        }
    }

    /// Aggregate counts over all tickets.
    ///
    /// # Errors
    ///
    /// `Store` on infrastructure failure.
    pub async fn statistics(&self) -> Result<TicketStatistics, WorkflowError> {
        Ok(self.env.store.statistics().await?)
    }

    /// Active and completed ticket counts for `user`.
    ///
    /// # Errors
    ///
    /// `Store` on infrastructure failure.
    pub async fn workload(&self, user: &UserId) -> Result<WorkloadStats, WorkflowError> {
        let active = self
            .env
            .store
            .count_by_assignee_and_status(user, TicketStatus::ACTIVE)
            .await?;
        let completed = self
            .env
            .store
            .count_by_assignee_and_status(user, TicketStatus::COMPLETED)
            .await?;
        Ok(WorkloadStats {
            user_id: user.clone(),
            active,
            completed,
        })
    }
}
