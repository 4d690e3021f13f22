//! Invoker configuration.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_parsed<T: FromStr>(key: &str, default: T) -> T {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env_opt(key)
        .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

/// Invoker configuration, from environment variables or any serde source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokerConfig {
    /// Preparation timeout in milliseconds. An operation that has not
    /// reported readiness within this window is treated as failed.
    #[serde(default = "default_prepare_timeout_ms")]
    pub prepare_timeout_ms: u64,
    /// Default lane for `execute` calls that do not ask for one:
    /// true = sequential.
    #[serde(default = "default_in_sequence")]
    pub in_sequence_mode: bool,
    /// Worker threads for the dispatch runtime. 0 = available parallelism.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
}

fn default_prepare_timeout_ms() -> u64 {
    5_000
}
fn default_in_sequence() -> bool {
    true
}
fn default_worker_threads() -> usize {
    0
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            prepare_timeout_ms: default_prepare_timeout_ms(),
            in_sequence_mode: default_in_sequence(),
            worker_threads: default_worker_threads(),
        }
    }
}

impl InvokerConfig {
    /// Build config from `GLEIS_*` environment variables (call
    /// [`load_dotenv`] first if a `.env` file should be honored).
    pub fn from_env() -> Self {
        Self {
            prepare_timeout_ms: env_parsed("GLEIS_PREPARE_TIMEOUT_MS", default_prepare_timeout_ms()),
            in_sequence_mode: env_bool("GLEIS_IN_SEQUENCE", default_in_sequence()),
            worker_threads: env_parsed("GLEIS_WORKER_THREADS", default_worker_threads()),
        }
    }

    pub fn prepare_timeout(&self) -> Duration {
        Duration::from_millis(self.prepare_timeout_ms)
    }

    /// Resolve worker thread count (0 means use available parallelism).
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.worker_threads
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = InvokerConfig::default();
        assert_eq!(config.prepare_timeout_ms, 5_000);
        assert!(config.in_sequence_mode);
        assert_eq!(config.worker_threads, 0);
        assert_eq!(config.prepare_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn resolved_worker_threads() {
        let mut config = InvokerConfig::default();
        // 0 means auto-detect
        assert!(config.resolved_worker_threads() > 0);

        config.worker_threads = 3;
        assert_eq!(config.resolved_worker_threads(), 3);
    }

    #[test]
    fn from_env_overrides() {
        env::set_var("GLEIS_PREPARE_TIMEOUT_MS", "250");
        env::set_var("GLEIS_IN_SEQUENCE", "false");
        env::set_var("GLEIS_WORKER_THREADS", "2");

        let config = InvokerConfig::from_env();
        assert_eq!(config.prepare_timeout_ms, 250);
        assert!(!config.in_sequence_mode);
        assert_eq!(config.worker_threads, 2);

        env::remove_var("GLEIS_PREPARE_TIMEOUT_MS");
        env::remove_var("GLEIS_IN_SEQUENCE");
        env::remove_var("GLEIS_WORKER_THREADS");
    }

    #[test]
    fn from_env_ignores_garbage() {
        env::set_var("GLEIS_PREPARE_TIMEOUT_MS", "not-a-number");
        let config = InvokerConfig::from_env();
        assert_eq!(config.prepare_timeout_ms, 5_000);
        env::remove_var("GLEIS_PREPARE_TIMEOUT_MS");
    }

    #[test]
    fn deserializes_with_field_defaults() {
        let config: InvokerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.prepare_timeout_ms, 5_000);
        assert!(config.in_sequence_mode);
    }
}
