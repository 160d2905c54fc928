//! Configuration management for the helpdesk daemon.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Values that are missing or fail to parse fall back to their default.

use helpdesk_core::types::UserId;
use helpdesk_core::user::{User, UserRole};
use helpdesk_runtime::EngineConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::{AddrParseError, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

/// Users loaded into the in-memory directory when `HELPDESK_SEED_USERS` is unset.
const DEFAULT_SEED_USERS: &str = "admin:ADMIN,tech-1:TECHNICIAN,tech-2:TECHNICIAN";

/// Daemon configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Engine tuning
    pub engine: EngineConfig,
    /// Process-level settings
    pub server: ServerConfig,
    /// Users the in-memory directory starts with
    pub seed_users: Vec<SeedUser>,
}

/// Process-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Log filter (trace, debug, info, warn, error, or a full `EnvFilter` directive)
    pub log_level: String,
    /// Metrics server host (for Prometheus scraping)
    pub metrics_host: String,
    /// Metrics server port
    pub metrics_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

/// One `id:ROLE` entry of `HELPDESK_SEED_USERS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedUser {
    /// Directory id
    pub id: String,
    /// Role
    pub role: UserRole,
}

impl SeedUser {
    /// Active directory user for this entry, named after its id.
    #[must_use]
    pub fn to_user(&self) -> User {
        User::new(UserId::new(self.id.as_str()), self.id.as_str(), self.role)
    }
}

impl Config {
    /// Load configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = EngineConfig::default();

        let engine = EngineConfig {
            workload_ceiling: parsed(&lookup, "HELPDESK_WORKLOAD_CEILING")
                .unwrap_or(defaults.workload_ceiling),
            escalation_interval: parsed(&lookup, "HELPDESK_ESCALATION_INTERVAL_SECS")
                .filter(|secs: &u64| *secs > 0)
                .map_or(defaults.escalation_interval, Duration::from_secs),
            approaching_window_hours: parsed(&lookup, "HELPDESK_APPROACHING_WINDOW_HOURS")
                .unwrap_or(defaults.approaching_window_hours),
            auto_assign_critical_incidents: lookup("HELPDESK_AUTO_ASSIGN")
                .and_then(|s| parse_flag(&s))
                .unwrap_or(defaults.auto_assign_critical_incidents),
            event_topic: lookup("HELPDESK_EVENT_TOPIC")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.event_topic),
            event_channel_capacity: parsed(&lookup, "HELPDESK_EVENT_CHANNEL_CAPACITY")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.event_channel_capacity),
        };

        let server = ServerConfig {
            log_level: lookup("RUST_LOG").unwrap_or_else(|| "helpdesk=info".to_string()),
            metrics_host: lookup("METRICS_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            metrics_port: parsed(&lookup, "METRICS_PORT").unwrap_or(9090),
            shutdown_timeout: parsed(&lookup, "SHUTDOWN_TIMEOUT").unwrap_or(10),
        };

        let seed_users = lookup("HELPDESK_SEED_USERS")
            .map_or_else(|| parse_seed_users(DEFAULT_SEED_USERS), |s| parse_seed_users(&s));

        Self {
            engine,
            server,
            seed_users,
        }
    }

    /// Socket address of the metrics endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if host and port do not form a valid address.
    pub fn metrics_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.server.metrics_host, self.server.metrics_port).parse()
    }

    /// How long each background task gets to stop.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout)
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_role(value: &str) -> Option<UserRole> {
    match value.trim().to_ascii_uppercase().as_str() {
        "USER" => Some(UserRole::User),
        "TECHNICIAN" => Some(UserRole::Technician),
        "ADMIN" => Some(UserRole::Admin),
        _ => None,
    }
}

/// Parses `id:ROLE` pairs separated by commas. Malformed entries are dropped.
fn parse_seed_users(value: &str) -> Vec<SeedUser> {
    value
        .split(',')
        .filter_map(|entry| {
            let (id, role) = entry.split_once(':')?;
            let id = id.trim();
            if id.is_empty() {
                return None;
            }
            Some(SeedUser {
                id: id.to_string(),
                role: parse_role(role)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = load(&[]);

        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.server.log_level, "helpdesk=info");
        assert_eq!(config.server.metrics_port, 9090);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(10));
        assert_eq!(config.seed_users.len(), 3);
        assert_eq!(config.seed_users[0].role, UserRole::Admin);
    }

    #[test]
    fn reads_every_engine_setting() {
        let config = load(&[
            ("HELPDESK_WORKLOAD_CEILING", "5"),
            ("HELPDESK_ESCALATION_INTERVAL_SECS", "60"),
            ("HELPDESK_APPROACHING_WINDOW_HOURS", "2"),
            ("HELPDESK_AUTO_ASSIGN", "off"),
            ("HELPDESK_EVENT_TOPIC", "tickets"),
            ("HELPDESK_EVENT_CHANNEL_CAPACITY", "64"),
        ]);

        assert_eq!(config.engine.workload_ceiling, 5);
        assert_eq!(config.engine.escalation_interval, Duration::from_secs(60));
        assert_eq!(config.engine.approaching_window_hours, 2);
        assert!(!config.engine.auto_assign_critical_incidents);
        assert_eq!(config.engine.event_topic, "tickets");
        assert_eq!(config.engine.event_channel_capacity, 64);
    }

    #[test]
    fn unparsable_values_fall_back_to_defaults() {
        let config = load(&[
            ("HELPDESK_WORKLOAD_CEILING", "ten"),
            ("HELPDESK_ESCALATION_INTERVAL_SECS", "0"),
            ("HELPDESK_AUTO_ASSIGN", "maybe"),
            ("HELPDESK_EVENT_TOPIC", "   "),
            ("METRICS_PORT", "99999"),
        ]);

        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.server.metrics_port, 9090);
    }

    #[test]
    fn seed_users_skip_malformed_entries() {
        let config = load(&[(
            "HELPDESK_SEED_USERS",
            "a1:admin, t1:TECHNICIAN ,broken,:USER,x:WIZARD,u1:USER",
        )]);

        let ids: Vec<&str> = config.seed_users.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, ["a1", "t1", "u1"]);
        let user = config.seed_users[1].to_user();
        assert_eq!(user.role, UserRole::Technician);
        assert!(user.is_active());
    }

    #[test]
    fn metrics_address_combines_host_and_port() {
        let config = load(&[("METRICS_HOST", "127.0.0.1"), ("METRICS_PORT", "9100")]);
        assert_eq!(
            config.metrics_addr().map(|a| a.port()),
            Ok(9100)
        );

        let bad = load(&[("METRICS_HOST", "not a host")]);
        assert!(bad.metrics_addr().is_err());
    }
}
