//! Server configuration, read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::engine::Pacing;
use crate::session::CachePolicy;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Directory for the durable file store (None = in-memory store)
    pub data_dir: Option<PathBuf>,
    pub cache_policy: CachePolicy,
    pub pacing: Pacing,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 6573,
            data_dir: None,
            cache_policy: CachePolicy::default(),
            pacing: Pacing::default(),
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env_string(name)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: {:?}", name, raw);
            None
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cache_policy = CachePolicy {
            absolute: env_parse("CLUB_CACHE_ABSOLUTE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_policy.absolute),
            sliding: env_parse("CLUB_CACHE_SLIDING_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_policy.sliding),
        };

        let pacing = Pacing {
            pathfinding: env_parse("PATHFINDING_STEP_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.pacing.pathfinding),
            sorting: env_parse("SORTING_STEP_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.pacing.sorting),
        };

        Self {
            port: env_parse("CLUB_PORT").unwrap_or(defaults.port),
            data_dir: env_string("CLUB_DATA_DIR").map(PathBuf::from),
            cache_policy,
            pacing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 6] = [
        "CLUB_PORT",
        "CLUB_DATA_DIR",
        "CLUB_CACHE_ABSOLUTE_SECS",
        "CLUB_CACHE_SLIDING_SECS",
        "PATHFINDING_STEP_DELAY_MS",
        "SORTING_STEP_DELAY_MS",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_env() {
        clear_env();
        let config = ServerConfig::from_env();

        assert_eq!(config.port, 6573);
        assert!(config.data_dir.is_none());
        assert_eq!(config.cache_policy, CachePolicy::default());
        assert_eq!(config.pacing, Pacing::default());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var("CLUB_PORT", "8080");
        std::env::set_var("CLUB_DATA_DIR", " /var/lib/club ");
        std::env::set_var("CLUB_CACHE_SLIDING_SECS", "30");
        std::env::set_var("SORTING_STEP_DELAY_MS", "0");

        let config = ServerConfig::from_env();
        clear_env();

        assert_eq!(config.port, 8080);
        assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/club")));
        assert_eq!(config.cache_policy.sliding, Duration::from_secs(30));
        assert_eq!(config.cache_policy.absolute, Duration::from_secs(3600));
        assert_eq!(config.pacing.sorting, Duration::ZERO);
        assert_eq!(config.pacing.pathfinding, Duration::from_millis(18));
    }

    #[test]
    #[serial]
    fn test_invalid_values_fall_back() {
        clear_env();
        std::env::set_var("CLUB_PORT", "not-a-port");

        let config = ServerConfig::from_env();
        clear_env();

        assert_eq!(config.port, 6573);
    }
}
