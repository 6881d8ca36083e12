use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Delays before each delivery attempt. The first attempt is delayed too.
pub const DEFAULT_RETRY_DELAYS_MS: [u64; 3] = [2_000, 5_000, 10_000];
pub const DEFAULT_RUN_DEADLINE_SECS: u64 = 600;
pub const DEFAULT_LEASE_TTL_SECS: u64 = 900;
pub const DEFAULT_DELIVERY_TIMEOUT_SECS: u64 = 30;

/// Top-level config (eventdesk.toml + EVENTDESK_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventdeskConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Report scheduler tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whole-pass budget. Items not finished by then are cut off.
    #[serde(default = "default_run_deadline_secs")]
    pub run_deadline_secs: u64,
    /// How long a per-item lease survives if the holder dies mid-run.
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,
    /// One entry per attempt; the length is the attempt count.
    #[serde(default = "default_retry_delays_ms")]
    pub retry_delays_ms: Vec<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            run_deadline_secs: DEFAULT_RUN_DEADLINE_SECS,
            lease_ttl_secs: DEFAULT_LEASE_TTL_SECS,
            retry_delays_ms: DEFAULT_RETRY_DELAYS_MS.to_vec(),
        }
    }
}

/// Outbound report delivery (webhook into the mailer service).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Endpoint that renders and mails the report. `None` disables `run`.
    pub webhook_url: Option<String>,
    #[serde(default = "default_delivery_timeout_secs")]
    pub timeout_secs: u64,
    pub bearer_token: Option<String>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: DEFAULT_DELIVERY_TIMEOUT_SECS,
            bearer_token: None,
        }
    }
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.eventdesk/eventdesk.db", home)
}
fn default_run_deadline_secs() -> u64 {
    DEFAULT_RUN_DEADLINE_SECS
}
fn default_lease_ttl_secs() -> u64 {
    DEFAULT_LEASE_TTL_SECS
}
fn default_retry_delays_ms() -> Vec<u64> {
    DEFAULT_RETRY_DELAYS_MS.to_vec()
}
fn default_delivery_timeout_secs() -> u64 {
    DEFAULT_DELIVERY_TIMEOUT_SECS
}

impl EventdeskConfig {
    /// Load config from a TOML file with EVENTDESK_* env var overrides.
    ///
    /// Nested keys use a double underscore:
    /// `EVENTDESK_SCHEDULER__LEASE_TTL_SECS=60`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: EventdeskConfig = Figment::from(Serialized::defaults(EventdeskConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("EVENTDESK_").split("__"))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> crate::error::Result<()> {
        if self.scheduler.retry_delays_ms.is_empty() {
            return Err(crate::error::CoreError::Config(
                "scheduler.retry_delays_ms must contain at least one delay".to_string(),
            ));
        }
        if self.scheduler.lease_ttl_secs == 0 {
            return Err(crate::error::CoreError::Config(
                "scheduler.lease_ttl_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.eventdesk/eventdesk.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = EventdeskConfig::load(path.to_str()).unwrap();
        assert_eq!(config.scheduler.retry_delays_ms, vec![2_000, 5_000, 10_000]);
        assert_eq!(config.scheduler.lease_ttl_secs, DEFAULT_LEASE_TTL_SECS);
        assert!(config.delivery.webhook_url.is_none());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eventdesk.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[scheduler]\nretry_delays_ms = [10, 20]\n\n[delivery]\nwebhook_url = \"http://mailer.local/reports\""
        )
        .unwrap();

        let config = EventdeskConfig::load(path.to_str()).unwrap();
        assert_eq!(config.scheduler.retry_delays_ms, vec![10, 20]);
        assert_eq!(
            config.delivery.webhook_url.as_deref(),
            Some("http://mailer.local/reports")
        );
        assert_eq!(config.scheduler.run_deadline_secs, DEFAULT_RUN_DEADLINE_SECS);
    }

    #[test]
    fn empty_retry_schedule_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eventdesk.toml");
        std::fs::write(&path, "[scheduler]\nretry_delays_ms = []\n").unwrap();

        let err = EventdeskConfig::load(path.to_str()).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}
