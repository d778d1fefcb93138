//! Named monitoring configurations

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default sampling interval in seconds
pub const DEFAULT_INTERVAL_SECS: u64 = 5;

/// Longest accepted sampling interval, one day
pub const MAX_INTERVAL_SECS: u64 = 86_400;

/// A named group of containers sampled on a fixed interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub name: String,
    /// Container names or ids
    pub containers: Vec<String>,
    /// Sampling interval in seconds
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

impl MonitorConfig {
    pub fn new(name: impl Into<String>, containers: Vec<String>, interval: u64) -> Self {
        Self {
            name: name.into(),
            containers,
            interval,
            created_at: Utc::now(),
        }
    }

    /// Check the config is usable for a monitoring run
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("config name must not be empty");
        }
        if self
            .name
            .chars()
            .any(|c| matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        {
            bail!("config name '{}' contains characters not allowed in file names", self.name);
        }
        if self.containers.is_empty() {
            bail!("config '{}' lists no containers", self.name);
        }
        if self.interval == 0 {
            bail!("interval must be at least 1 second");
        }
        if self.interval > MAX_INTERVAL_SECS {
            bail!(
                "interval of {}s exceeds the maximum of {}s",
                self.interval,
                MAX_INTERVAL_SECS
            );
        }
        Ok(())
    }

    pub fn interval_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        let config = MonitorConfig::new("stack", vec!["web".into()], 5);
        assert!(config.validate().is_ok());

        assert!(MonitorConfig::new("", vec!["web".into()], 5).validate().is_err());
        assert!(MonitorConfig::new("a/b", vec!["web".into()], 5).validate().is_err());
        assert!(MonitorConfig::new("stack", vec![], 5).validate().is_err());
        assert!(MonitorConfig::new("stack", vec!["web".into()], 0).validate().is_err());
    }

    #[test]
    fn test_validate_caps_interval() {
        let at_cap = MonitorConfig::new("stack", vec!["web".into()], MAX_INTERVAL_SECS);
        assert!(at_cap.validate().is_ok());

        let above = MonitorConfig::new("stack", vec!["web".into()], MAX_INTERVAL_SECS + 1);
        assert!(above.validate().is_err());
        assert!(MonitorConfig::new("stack", vec!["web".into()], u64::MAX)
            .validate()
            .is_err());
    }

    #[test]
    fn test_interval_defaults_when_missing() {
        let config: MonitorConfig =
            serde_json::from_str(r#"{"name":"stack","containers":["db"]}"#).unwrap();
        assert_eq!(config.interval, DEFAULT_INTERVAL_SECS);
    }
}
