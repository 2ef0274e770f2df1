use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::time::Duration;

use anyhow::Context;
use instance_defs::FeatureName;
use log::info;
use serde::{Deserialize, Serialize};

pub const CONFIG_PATH_ENV: &str = "INSTANCE_SYNC_CONFIG";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LockConfig {
    pub lease: String,
    pub acquire_timeout: String,
    pub retry_interval: String,
    /// Upper bound on one provider observation made while the lock is held.
    pub provider_timeout: String,
}

impl Default for LockConfig {
    fn default() -> Self {
        LockConfig {
            lease: "2m".to_string(),
            acquire_timeout: "10s".to_string(),
            retry_interval: "200ms".to_string(),
            provider_timeout: "1m".to_string(),
        }
    }
}

/// Parsed lock timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockSettings {
    pub lease: Duration,
    pub acquire_timeout: Duration,
    pub retry_interval: Duration,
    pub provider_timeout: Duration,
}

impl Default for LockSettings {
    fn default() -> Self {
        LockSettings {
            lease: Duration::from_secs(120),
            acquire_timeout: Duration::from_secs(10),
            retry_interval: Duration::from_millis(200),
            provider_timeout: Duration::from_secs(60),
        }
    }
}

impl LockSettings {
    /// How often a held lease is renewed.
    pub fn renew_interval(&self) -> Duration {
        (self.lease / 3).max(Duration::from_millis(1))
    }
}

impl LockConfig {
    pub fn settings(&self) -> Result<LockSettings, anyhow::Error> {
        Ok(LockSettings {
            lease: parse_duration("lock.lease", &self.lease)?,
            acquire_timeout: parse_duration("lock.acquire_timeout", &self.acquire_timeout)?,
            retry_interval: parse_duration("lock.retry_interval", &self.retry_interval)?,
            provider_timeout: parse_duration("lock.provider_timeout", &self.provider_timeout)?,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct DeploymentEventConfig {
    pub max_retries: u32,
    /// Delay before the first redelivery, doubled on every further attempt.
    pub retry_backoff: String,
}

impl Default for DeploymentEventConfig {
    fn default() -> Self {
        DeploymentEventConfig {
            max_retries: 3,
            retry_backoff: "1s".to_string(),
        }
    }
}

impl DeploymentEventConfig {
    pub fn retry_backoff(&self) -> Result<Duration, anyhow::Error> {
        parse_duration("deployment_events.retry_backoff", &self.retry_backoff)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct FeatureFlagConfig {
    pub global: BTreeSet<FeatureName>,
    pub accounts: BTreeMap<String, BTreeSet<FeatureName>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    pub lock: LockConfig,
    pub deployment_events: DeploymentEventConfig,
    pub feature_flags: FeatureFlagConfig,
}

impl SyncConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, anyhow::Error> {
        let config: SyncConfig =
            serde_yaml::from_str(yaml).context("Failed to parse instance sync configuration")?;
        config.lock.settings()?;
        config.deployment_events.retry_backoff()?;
        Ok(config)
    }

    /// Reads the file named by `INSTANCE_SYNC_CONFIG`, or returns defaults.
    pub fn load() -> Result<Self, anyhow::Error> {
        match env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => {
                info!("Loading instance sync configuration from {}", path);
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read configuration file {}", path))?;
                SyncConfig::from_yaml_str(&contents)
            }
            _ => Ok(SyncConfig::default()),
        }
    }
}

fn parse_duration(field: &str, value: &str) -> Result<Duration, anyhow::Error> {
    humantime::parse_duration(value)
        .with_context(|| format!("Invalid duration '{}' for {}", value, field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.lock.settings().unwrap(), LockSettings::default());
        assert_eq!(config.deployment_events.max_retries, 3);
        assert_eq!(
            config.deployment_events.retry_backoff().unwrap(),
            Duration::from_secs(1)
        );
        assert!(config.feature_flags.global.is_empty());
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
lock:
  lease: 30s
  provider_timeout: 20s
deployment_events:
  max_retries: 5
  retry_backoff: 250ms
feature_flags:
  global: [STOP_INSTANCE_SYNC_VIA_ITERATOR_FOR_PCF]
  accounts:
    acc-1: [MOVE_PCF_INSTANCE_SYNC_TO_PERPETUAL_TASK]
"#;
        let config = SyncConfig::from_yaml_str(yaml).unwrap();
        let settings = config.lock.settings().unwrap();
        assert_eq!(settings.lease, Duration::from_secs(30));
        assert_eq!(settings.acquire_timeout, Duration::from_secs(10));
        assert_eq!(settings.provider_timeout, Duration::from_secs(20));
        assert_eq!(settings.renew_interval(), Duration::from_secs(10));
        assert_eq!(config.deployment_events.max_retries, 5);
        assert_eq!(
            config.deployment_events.retry_backoff().unwrap(),
            Duration::from_millis(250)
        );
        assert_eq!(
            config.feature_flags.accounts["acc-1"],
            BTreeSet::from([FeatureName::MovePcfInstanceSyncToPerpetualTask])
        );
        assert!(config
            .feature_flags
            .global
            .contains(&FeatureName::StopInstanceSyncViaIteratorForPcf));
    }

    #[test]
    fn test_invalid_duration_is_rejected() {
        let err = SyncConfig::from_yaml_str("lock:\n  lease: soon\n").unwrap_err();
        assert!(err.to_string().contains("lock.lease"), "{}", err);

        let err = SyncConfig::from_yaml_str("deployment_events:\n  retry_backoff: later\n")
            .unwrap_err();
        assert!(
            format!("{:#}", err).contains("deployment_events.retry_backoff"),
            "{:#}",
            err
        );
    }
}
