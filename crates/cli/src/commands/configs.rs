//! Monitoring config management commands

use anyhow::{bail, Result};
use mdok_lib::{MonitorConfig, SeriesStore};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{print_info, print_success, print_table, OutputFormat};

#[derive(Tabled, Serialize)]
struct ConfigRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Containers")]
    containers: String,
    #[tabled(rename = "Interval")]
    interval: String,
    #[tabled(rename = "Created")]
    created: String,
}

/// List saved configs
pub fn list_configs(store: &SeriesStore, format: OutputFormat) -> Result<()> {
    let configs = store.list_configs()?;

    match format {
        OutputFormat::Json => crate::output::print_json(&configs),
        OutputFormat::Table => {
            let rows: Vec<ConfigRow> = configs
                .iter()
                .map(|c| ConfigRow {
                    name: c.name.clone(),
                    containers: c.containers.join(", "),
                    interval: format!("{}s", c.interval),
                    created: c.created_at.format("%Y-%m-%d %H:%M").to_string(),
                })
                .collect();
            print_table(&rows, format);
        }
    }

    Ok(())
}

/// Save a new config
pub fn create_config(
    store: &SeriesStore,
    name: &str,
    containers: Vec<String>,
    interval: u64,
    overwrite: bool,
) -> Result<()> {
    let config = MonitorConfig::new(name, containers, interval);
    config.validate()?;

    if store.config_exists(name) && !overwrite {
        bail!("config '{}' already exists (use --force to replace it)", name);
    }

    store.save_config(&config)?;
    print_success(&format!(
        "Saved config '{}' with {} container(s), sampling every {}s",
        name,
        config.containers.len(),
        interval
    ));
    print_info(&format!("Start collecting with: mdok-agent {}", name));
    Ok(())
}

/// Delete a config and its collected data
pub fn delete_config(store: &SeriesStore, name: &str) -> Result<()> {
    if !store.config_exists(name) && !store.run_dir(name).exists() {
        bail!("config '{}' not found", name);
    }

    store.delete_config(name)?;
    print_success(&format!("Deleted config '{}' and its data", name));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_rejects_duplicate() {
        let dir = TempDir::new().unwrap();
        let store = SeriesStore::new(dir.path());

        create_config(&store, "stack", vec!["web".into()], 5, false).unwrap();
        assert!(create_config(&store, "stack", vec!["db".into()], 5, false).is_err());

        create_config(&store, "stack", vec!["db".into()], 10, true).unwrap();
        assert_eq!(store.load_config("stack").unwrap().containers, vec!["db"]);
    }

    #[test]
    fn test_create_validates() {
        let dir = TempDir::new().unwrap();
        let store = SeriesStore::new(dir.path());

        assert!(create_config(&store, "stack", vec![], 5, false).is_err());
        assert!(create_config(&store, "stack", vec!["web".into()], 0, false).is_err());
        assert!(!store.config_exists("stack"));
    }

    #[test]
    fn test_delete_missing_config() {
        let dir = TempDir::new().unwrap();
        let store = SeriesStore::new(dir.path());

        assert!(delete_config(&store, "nope").is_err());
    }
}
