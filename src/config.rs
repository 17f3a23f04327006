use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::solver::SolverConfig;

pub const BIND_ADDR_VAR: &str = "TIMETABLE_BIND_ADDR";
pub const LOCK_TIMEOUT_VAR: &str = "TIMETABLE_LOCK_TIMEOUT_MS";
pub const BACKTRACKS_VAR: &str = "TIMETABLE_BACKTRACKS_PER_HOUR";

/// Runtime settings, read from the environment with defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// How long a generation waits for all of its teacher locks.
    pub lock_timeout: Duration,
    pub solver: SolverConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            lock_timeout: Duration::from_millis(5_000),
            solver: SolverConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from any variable lookup; unset variables keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let lock_timeout_ms: u64 = parse_or(&lookup, LOCK_TIMEOUT_VAR, 5_000)?;
        Ok(Self {
            bind_addr: parse_or(&lookup, BIND_ADDR_VAR, defaults.bind_addr)?,
            lock_timeout: Duration::from_millis(lock_timeout_ms),
            solver: SolverConfig {
                backtracks_per_hour: parse_or(
                    &lookup,
                    BACKTRACKS_VAR,
                    defaults.solver.backtracks_per_hour,
                )?,
                ..defaults.solver
            },
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        _ => Ok(default),
    }
}
