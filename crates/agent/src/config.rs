//! Agent configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Agent options shared by every monitoring run
#[derive(Debug, Clone, Deserialize)]
pub struct AgentOptions {
    /// Root directory for configs and collected data
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Pricing region for egress cost estimates
    #[serde(default)]
    pub region: Option<String>,

    /// Cap on concurrent stats fetches per tick; unset fetches every container at once
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    /// Extra image/name patterns treated as egress gateways
    #[serde(default)]
    pub proxy_patterns: Vec<String>,
}

pub fn default_data_dir() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mdok")
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            region: None,
            max_concurrency: None,
            proxy_patterns: Vec::new(),
        }
    }
}

impl AgentOptions {
    /// Load from an optional config file, then `MDOK_`-prefixed environment
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("MDOK")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("proxy_patterns"),
            )
            .build()
            .context("Failed to load agent configuration")?;

        config
            .try_deserialize()
            .context("Invalid agent configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let options = AgentOptions::default();
        assert_eq!(options.max_concurrency, None);
        assert!(options.data_dir.ends_with(".mdok"));
        assert!(options.region.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "region = \"eu-west-1\"\nmax_concurrency = 4\nproxy_patterns = [\"kong\", \"apisix\"]"
        )
        .unwrap();

        let options = AgentOptions::load(Some(file.path())).unwrap();
        assert_eq!(options.region.as_deref(), Some("eu-west-1"));
        assert_eq!(options.max_concurrency, Some(4));
        assert_eq!(options.proxy_patterns, vec!["kong", "apisix"]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(AgentOptions::load(Some(Path::new("/nonexistent/mdok.toml"))).is_err());
    }
}
