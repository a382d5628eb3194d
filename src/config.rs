//! Service settings, read from the environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use tracing::warn;

/// Default location of the rules document, relative to the working directory.
pub const DEFAULT_RULES_PATH: &str = "config/intent_rules.json";

/// Service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Rules document path (`MAILROOM_RULES_PATH`). A relative path is
    /// resolved against the working directory the service is started from.
    pub rules_path: PathBuf,
    /// Listen address (`MAILROOM_BIND`).
    pub bind: IpAddr,
    /// Listen port (`MAILROOM_PORT`).
    pub port: u16,
    /// Pipeline worker tasks (`MAILROOM_WORKERS`).
    pub workers: usize,
    /// Maximum queued messages before 503 (`MAILROOM_QUEUE_CAPACITY`).
    pub queue_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            rules_path: PathBuf::from(DEFAULT_RULES_PATH),
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
            workers: 4,
            queue_capacity: 1024,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparsable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let rules_path = lookup("MAILROOM_RULES_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.rules_path);

        Self {
            rules_path,
            bind: parse_or(&lookup, "MAILROOM_BIND", defaults.bind),
            port: parse_or(&lookup, "MAILROOM_PORT", defaults.port),
            workers: parse_or(&lookup, "MAILROOM_WORKERS", defaults.workers).max(1),
            queue_capacity: parse_or(&lookup, "MAILROOM_QUEUE_CAPACITY", defaults.queue_capacity)
                .max(1),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Invalid setting, using default");
            default
        }),
    }
}
