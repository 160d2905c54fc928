//! Prometheus metrics for the ticket engine.
//!
//! Recorders cover:
//! - Ticket creation and status changes
//! - Assignments and capacity warnings
//! - Escalation sweeps
//! - Event publication
//! - Workflow errors by kind
//!
//! # Example
//!
//! ```rust,no_run
//! use helpdesk_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! if let Some(text) = server.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use crate::escalation::SweepReport;
use helpdesk_core::types::{Actor, Priority, TicketStatus, TicketType};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder handle.
///
/// Installs the global recorder and renders the scrape text on demand.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address the scrape endpoint is advertised on (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// A recorder that is already installed (e.g., by another test) is not an
    /// error; the call logs a warning and [`render`](Self::render) returns `None`.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Address the scrape endpoint is advertised on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this instance did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Ticket lifecycle
    describe_counter!(
        "helpdesk_tickets_created_total",
        "Total number of tickets created, by priority and type"
    );
    describe_counter!(
        "helpdesk_ticket_status_changes_total",
        "Total number of status transitions, by source and target status"
    );
    describe_counter!(
        "helpdesk_workflow_errors_total",
        "Total number of failed workflow operations, by error kind"
    );

    // Assignment
    describe_counter!(
        "helpdesk_tickets_assigned_total",
        "Total number of ticket assignments, by who assigned"
    );
    describe_counter!(
        "helpdesk_capacity_warnings_total",
        "Assignments made to users at or above the workload ceiling"
    );

    // Escalation
    describe_counter!(
        "helpdesk_escalation_sweeps_total",
        "Total number of escalation sweeps run"
    );
    describe_counter!(
        "helpdesk_escalations_total",
        "Breached tickets handled by the scheduler, by outcome"
    );
    describe_histogram!(
        "helpdesk_escalation_sweep_duration_seconds",
        "Time taken by one escalation sweep"
    );

    // Event bus
    describe_counter!(
        "helpdesk_events_published_total",
        "Total number of ticket events published"
    );
    describe_counter!(
        "helpdesk_event_publish_failures_total",
        "Ticket events that could not be published"
    );
}

/// Ticket lifecycle metrics recorder.
pub struct TicketMetrics;

impl TicketMetrics {
    /// Record a ticket creation.
    pub fn record_created(priority: Priority, ticket_type: TicketType) {
        counter!(
            "helpdesk_tickets_created_total",
            "priority" => priority.as_str(),
            "type" => ticket_type.as_str()
        )
        .increment(1);
    }

    /// Record a status transition.
    pub fn record_status_change(from: TicketStatus, to: TicketStatus) {
        counter!(
            "helpdesk_ticket_status_changes_total",
            "from" => from.as_str(),
            "to" => to.as_str()
        )
        .increment(1);
    }

    /// Record a failed operation.
    pub fn record_error(operation: &'static str, kind: &'static str) {
        counter!(
            "helpdesk_workflow_errors_total",
            "operation" => operation,
            "kind" => kind
        )
        .increment(1);
    }
}

/// Assignment metrics recorder.
pub struct AssignmentMetrics;

impl AssignmentMetrics {
    /// Record an assignment.
    pub fn record_assignment(assigned_by: &Actor) {
        let source = if assigned_by.is_system() { "system" } else { "user" };
        counter!("helpdesk_tickets_assigned_total", "assigned_by" => source).increment(1);
    }

    /// Record an assignment to a user at or above the ceiling.
    pub fn record_capacity_warning() {
        counter!("helpdesk_capacity_warnings_total").increment(1);
    }
}

/// Escalation metrics recorder.
pub struct EscalationMetrics;

impl EscalationMetrics {
    /// Record a completed sweep.
    pub fn record_sweep(report: &SweepReport, duration: Duration) {
        counter!("helpdesk_escalation_sweeps_total").increment(1);
        histogram!("helpdesk_escalation_sweep_duration_seconds").record(duration.as_secs_f64());
        for (outcome, count) in [
            ("reassigned", report.reassigned),
            ("no_candidate", report.without_candidate),
            ("skipped", report.skipped),
            ("failed", report.failed),
            ("query_failed", report.query_failures),
        ] {
            if count > 0 {
                counter!("helpdesk_escalations_total", "outcome" => outcome).increment(count as u64);
            }
        }
    }
}

/// Event bus metrics recorder.
pub struct EventBusMetrics;

impl EventBusMetrics {
    /// Record a published event.
    pub fn record_publish() {
        counter!("helpdesk_events_published_total").increment(1);
    }

    /// Record an event that could not be published.
    pub fn record_publish_error() {
        counter!("helpdesk_event_publish_failures_total").increment(1);
    }
}
