use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
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

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub scheduler: SchedulerConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `STEWARD_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("STEWARD_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            scheduler: SchedulerConfig::from_env_profiled(p),
            storage: StorageConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  scheduler:   poll={}s, lock_ttl={}s, lock_prefix={}, instance={}",
            self.scheduler.poll_interval_secs,
            self.scheduler.lock_ttl_secs,
            self.scheduler.lock_prefix,
            self.scheduler.instance_id
        );
        tracing::info!(
            "  storage:     data_dir={}, workspace={}",
            self.storage.data_dir.display(),
            self.storage.workspace.display()
        );
    }
}

// ── Scheduler ─────────────────────────────────────────────────

/// Coordinator tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often due interval tasks are polled, in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Lease TTL for the per-task distributed lock, in seconds.
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl_secs: u64,
    /// Lock key prefix; the task id is appended.
    #[serde(default = "default_lock_prefix")]
    pub lock_prefix: String,
    /// Owner identity written into leases held by this process.
    #[serde(default = "default_instance_id")]
    pub instance_id: String,
}

fn default_poll_interval() -> u64 { 60 }
fn default_lock_ttl() -> u64 { 30 * 60 }
fn default_lock_prefix() -> String { "task:".to_string() }
fn default_instance_id() -> String { uuid::Uuid::new_v4().to_string() }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            lock_ttl_secs: default_lock_ttl(),
            lock_prefix: default_lock_prefix(),
            instance_id: default_instance_id(),
        }
    }
}

impl SchedulerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            poll_interval_secs: profiled_env_u64(p, "SCHEDULER_POLL_INTERVAL_SECS", default_poll_interval()),
            lock_ttl_secs: profiled_env_u64(p, "SCHEDULER_LOCK_TTL_SECS", default_lock_ttl()),
            lock_prefix: profiled_env_or(p, "SCHEDULER_LOCK_PREFIX", &default_lock_prefix()),
            instance_id: profiled_env_opt(p, "SCHEDULER_INSTANCE_ID").unwrap_or_else(default_instance_id),
        }
    }

    pub fn lock_key(&self, task_id: &str) -> String {
        format!("{}{}", self.lock_prefix, task_id)
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory of JSON-lines tables (`<schema>/<table>.jsonl`).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// YAML workspace seeding templates, tasks and bindings.
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,
}

fn default_data_dir() -> PathBuf { PathBuf::from("data") }
fn default_workspace() -> PathBuf { PathBuf::from("steward.yaml") }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            workspace: default_workspace(),
        }
    }
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            data_dir: profiled_env_opt(p, "STEWARD_DATA_DIR").map(PathBuf::from).unwrap_or_else(default_data_dir),
            workspace: profiled_env_opt(p, "STEWARD_WORKSPACE").map(PathBuf::from).unwrap_or_else(default_workspace),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_defaults() {
        let cfg = SchedulerConfig::default();
        assert_eq!(cfg.poll_interval_secs, 60);
        assert_eq!(cfg.lock_ttl_secs, 1800);
        assert_eq!(cfg.lock_key("abc"), "task:abc");
        assert!(!cfg.instance_id.is_empty());
    }

    #[test]
    fn scheduler_config_fills_missing_fields() {
        let cfg: SchedulerConfig = serde_json::from_str(r#"{"poll_interval_secs": 5}"#).unwrap();
        assert_eq!(cfg.poll_interval_secs, 5);
        assert_eq!(cfg.lock_prefix, "task:");
    }

    #[test]
    fn storage_config_defaults_when_empty() {
        let cfg: StorageConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, StorageConfig::default());
        assert_eq!(cfg.data_dir, PathBuf::from("data"));
        assert_eq!(cfg.workspace, PathBuf::from("steward.yaml"));

        let cfg: StorageConfig = serde_json::from_str(r#"{"data_dir": "/srv/tables"}"#).unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/srv/tables"));
        assert_eq!(cfg.workspace, PathBuf::from("steward.yaml"));
    }

    #[test]
    fn profile_prefers_prefixed_key() {
        env::set_var("STEWARDTEST_SCHEDULER_LOCK_PREFIX", "quality_task:");
        let cfg = Config::for_profile("stewardtest");
        assert_eq!(cfg.profile_label(), "STEWARDTEST");
        assert_eq!(cfg.scheduler.lock_key("t1"), "quality_task:t1");
        env::remove_var("STEWARDTEST_SCHEDULER_LOCK_PREFIX");
    }
}
