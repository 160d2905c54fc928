//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables shared by the workflow service, assignment engine and scheduler.
///
/// # Example
///
/// ```
/// use helpdesk_runtime::config::EngineConfig;
/// use std::time::Duration;
///
/// let config = EngineConfig::default()
///     .with_workload_ceiling(5)
///     .with_escalation_interval(Duration::from_secs(600));
/// assert_eq!(config.workload_ceiling, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Active tickets (`ASSIGNED` or `IN_PROGRESS`) a user may hold before
    /// assignments start raising capacity warnings.
    pub workload_ceiling: usize,

    /// Period between escalation sweeps.
    pub escalation_interval: Duration,

    /// Hours before the SLA threshold during which a ticket counts as approaching.
    pub approaching_window_hours: i64,

    /// Assign `CRITICAL` incidents to the least loaded technician on creation.
    pub auto_assign_critical_incidents: bool,

    /// Topic ticket events are published to.
    pub event_topic: String,

    /// Buffer size per topic for the in-process event bus.
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workload_ceiling: 10,
            escalation_interval: Duration::from_secs(60 * 60),
            approaching_window_hours: 1,
            auto_assign_critical_incidents: true,
            event_topic: "ticket-events".to_string(),
            event_channel_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Sets the workload ceiling.
    #[must_use]
    pub const fn with_workload_ceiling(mut self, ceiling: usize) -> Self {
        self.workload_ceiling = ceiling;
        self
    }

    /// Sets the sweep period.
    #[must_use]
    pub const fn with_escalation_interval(mut self, interval: Duration) -> Self {
        self.escalation_interval = interval;
        self
    }

    /// Sets the early-warning window.
    #[must_use]
    pub const fn with_approaching_window_hours(mut self, hours: i64) -> Self {
        self.approaching_window_hours = hours;
        self
    }

    /// Enables or disables auto-assignment of critical incidents.
    #[must_use]
    pub const fn with_auto_assign(mut self, enabled: bool) -> Self {
        self.auto_assign_critical_incidents = enabled;
        self
    }

    /// Sets the event topic.
    #[must_use]
    pub fn with_event_topic(mut self, topic: impl Into<String>) -> Self {
        self.event_topic = topic.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.workload_ceiling, 10);
        assert_eq!(config.escalation_interval, Duration::from_secs(3600));
        assert_eq!(config.approaching_window_hours, 1);
        assert!(config.auto_assign_critical_incidents);
        assert_eq!(config.event_topic, "ticket-events");
    }
}
