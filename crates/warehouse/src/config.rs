use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default service endpoint (a local emulator).
const DEFAULT_ENDPOINT: &str = "http://localhost:9050";

/// Default rows per result page.
const DEFAULT_PAGE_SIZE: u32 = 10;

/// Default interval between job-status checks.
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

// ── Env helpers ──────────────────────────────────────────────────

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries `{PROFILE}_{KEY}` first, falls back to `{KEY}`.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── WarehouseConfig ──────────────────────────────────────────────

/// Configuration for the warehouse client and query runner.
///
/// Reads from environment variables with optional profile prefix.
/// When `WHARF_PROFILE=PROD`, checks `PROD_WHARF_ENDPOINT` before
/// `WHARF_ENDPOINT`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Base URL of the warehouse REST API.
    pub endpoint: String,
    /// Project the queries run under.
    pub project: String,
    /// Ambient bearer token, attached to requests when present. The token
    /// itself is opaque to this crate.
    pub auth_token: Option<String>,
    /// Rows per result page.
    pub page_size: u32,
    /// Interval between job-status checks, in milliseconds.
    pub poll_interval_ms: u64,
    /// Optional cap on total polling time, in seconds.
    ///
    /// Unset means poll until the job reaches its terminal state, however
    /// long that takes. Setting it turns a stuck job into
    /// [`crate::WarehouseError::DeadlineExceeded`].
    pub poll_deadline_secs: Option<u64>,
}

impl WarehouseConfig {
    /// Build config from environment variables.
    ///
    /// Reads `WHARF_PROFILE` to determine profile prefix.
    /// For each key, tries `{PROFILE}_WHARF_*` first, then `WHARF_*`.
    pub fn from_env() -> Self {
        let profile = env_opt("WHARF_PROFILE")
            .map(|s| s.to_uppercase())
            .unwrap_or_default();
        Self::from_env_profiled(&profile)
    }

    /// Build config for a specific named profile.
    pub fn from_env_profiled(profile: &str) -> Self {
        Self {
            endpoint: profiled_env_or(profile, "WHARF_ENDPOINT", DEFAULT_ENDPOINT),
            project: profiled_env_or(profile, "WHARF_PROJECT", "default"),
            auth_token: profiled_env_opt(profile, "WHARF_AUTH_TOKEN"),
            page_size: profiled_env_u32(profile, "WHARF_PAGE_SIZE", DEFAULT_PAGE_SIZE),
            poll_interval_ms: profiled_env_u64(
                profile,
                "WHARF_POLL_INTERVAL_MS",
                DEFAULT_POLL_INTERVAL_MS,
            ),
            poll_deadline_secs: profiled_env_opt(profile, "WHARF_POLL_DEADLINE_SECS")
                .and_then(|v| v.parse().ok()),
        }
    }

    /// Poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Poll deadline as a [`Duration`], when configured.
    pub fn poll_deadline(&self) -> Option<Duration> {
        self.poll_deadline_secs.map(Duration::from_secs)
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            project: "default".to_string(),
            auth_token: None,
            page_size: DEFAULT_PAGE_SIZE,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            poll_deadline_secs: None,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env-based tests must run serially to avoid interfering with each other.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Helper: clear all WHARF_* and profile env vars used by the config.
    fn clear_wharf_env() {
        let keys = [
            "WHARF_PROFILE",
            "WHARF_ENDPOINT",
            "WHARF_PROJECT",
            "WHARF_AUTH_TOKEN",
            "WHARF_PAGE_SIZE",
            "WHARF_POLL_INTERVAL_MS",
            "WHARF_POLL_DEADLINE_SECS",
            "TEST_WHARF_ENDPOINT",
            "TEST_WHARF_PROJECT",
        ];
        for k in keys {
            env::remove_var(k);
        }
    }

    #[test]
    fn defaults_when_no_env_vars() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_wharf_env();

        let cfg = WarehouseConfig::from_env_profiled("");

        assert_eq!(cfg.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(cfg.project, "default");
        assert_eq!(cfg.auth_token, None);
        assert_eq!(cfg.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(cfg.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(cfg.poll_deadline_secs, None);
    }

    #[test]
    fn from_env_reads_vars() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_wharf_env();

        env::set_var("WHARF_ENDPOINT", "https://warehouse.example.com");
        env::set_var("WHARF_PROJECT", "analytics");
        env::set_var("WHARF_PAGE_SIZE", "50");
        env::set_var("WHARF_POLL_DEADLINE_SECS", "120");

        let cfg = WarehouseConfig::from_env_profiled("");

        assert_eq!(cfg.endpoint, "https://warehouse.example.com");
        assert_eq!(cfg.project, "analytics");
        assert_eq!(cfg.page_size, 50);
        assert_eq!(cfg.poll_deadline_secs, Some(120));

        clear_wharf_env();
    }

    #[test]
    fn profiled_env_takes_precedence() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_wharf_env();

        env::set_var("WHARF_PROJECT", "base");
        env::set_var("TEST_WHARF_PROJECT", "test");

        let cfg = WarehouseConfig::from_env_profiled("TEST");
        assert_eq!(cfg.project, "test");

        clear_wharf_env();
    }

    #[test]
    fn invalid_numeric_falls_back_to_default() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_wharf_env();

        env::set_var("WHARF_PAGE_SIZE", "not_a_number");
        env::set_var("WHARF_POLL_DEADLINE_SECS", "soon");

        let cfg = WarehouseConfig::from_env_profiled("");
        assert_eq!(cfg.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(cfg.poll_deadline_secs, None);

        clear_wharf_env();
    }

    #[test]
    fn duration_accessors() {
        let cfg = WarehouseConfig {
            poll_interval_ms: 250,
            poll_deadline_secs: Some(30),
            ..WarehouseConfig::default()
        };
        assert_eq!(cfg.poll_interval(), Duration::from_millis(250));
        assert_eq!(cfg.poll_deadline(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn empty_env_var_treated_as_unset() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_wharf_env();

        env::set_var("WHARF_AUTH_TOKEN", "");

        let cfg = WarehouseConfig::from_env_profiled("");
        assert_eq!(cfg.auth_token, None);

        clear_wharf_env();
    }
}
