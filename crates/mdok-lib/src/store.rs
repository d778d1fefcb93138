//! File-backed persistence for configs and container series
//!
//! Layout under the store root:
//!
//! ```text
//! configs/<name>.json          monitoring configs
//! data/<run>/<container>.json  one series per container per run
//! ```

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::MonitorConfig;
use crate::models::ContainerSeries;
use crate::session::{self, SessionInfo};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound(path.display().to_string())
        } else {
            StoreError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Percent-encode characters that are unsafe in file names.
///
/// `%` is encoded as well, so two different names never map to one file.
/// A leading `.` is encoded to keep `.` and `..` out of paths.
pub fn encode_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, c) in name.char_indices() {
        let escape = matches!(
            c,
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' | '%'
        ) || c.is_control()
            || (i == 0 && c == '.');
        if escape {
            let _ = write!(out, "%{:02X}", c as u32);
        } else {
            out.push(c);
        }
    }
    out
}

/// Store rooted at an explicit directory
#[derive(Debug, Clone)]
pub struct SeriesStore {
    root: PathBuf,
}

impl SeriesStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn configs_dir(&self) -> PathBuf {
        self.root.join("configs")
    }

    pub fn config_path(&self, name: &str) -> PathBuf {
        self.configs_dir().join(format!("{}.json", encode_filename(name)))
    }

    pub fn run_dir(&self, run: &str) -> PathBuf {
        self.root.join("data").join(encode_filename(run))
    }

    pub fn series_path(&self, run: &str, container: &str) -> PathBuf {
        self.run_dir(run)
            .join(format!("{}.json", encode_filename(container)))
    }

    pub fn save_config(&self, config: &MonitorConfig) -> StoreResult<()> {
        write_json(&self.config_path(&config.name), config)
    }

    pub fn load_config(&self, name: &str) -> StoreResult<MonitorConfig> {
        read_json(&self.config_path(name))
    }

    pub fn config_exists(&self, name: &str) -> bool {
        self.config_path(name).is_file()
    }

    /// All readable configs sorted by name; unreadable files are skipped
    pub fn list_configs(&self) -> StoreResult<Vec<MonitorConfig>> {
        let mut configs: Vec<MonitorConfig> = json_files(&self.configs_dir())?
            .into_iter()
            .filter_map(|path| match read_json(&path) {
                Ok(config) => Some(config),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping unreadable config");
                    None
                }
            })
            .collect();
        configs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(configs)
    }

    /// Remove a config together with all of its collected data
    pub fn delete_config(&self, name: &str) -> StoreResult<()> {
        let path = self.config_path(name);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(&path, e)),
        }

        let data = self.run_dir(name);
        match fs::remove_dir_all(&data) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&data, e)),
        }
    }

    pub fn save_series(&self, run: &str, series: &ContainerSeries) -> StoreResult<()> {
        write_json(&self.series_path(run, &series.container_name), series)
    }

    pub fn load_series(&self, run: &str, container: &str) -> StoreResult<ContainerSeries> {
        read_json(&self.series_path(run, container))
    }

    /// Every series of a run sorted by container name.
    ///
    /// Corrupt files are logged and skipped so one bad file does not hide
    /// the rest of the run.
    pub fn load_all(&self, run: &str) -> StoreResult<Vec<ContainerSeries>> {
        let mut all: Vec<ContainerSeries> = json_files(&self.run_dir(run))?
            .into_iter()
            .filter_map(|path| match read_json(&path) {
                Ok(series) => Some(series),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable series");
                    None
                }
            })
            .collect();
        all.sort_by(|a, b| a.container_name.cmp(&b.container_name));
        Ok(all)
    }

    /// Sessions across all containers of a run, newest first
    pub fn list_sessions(&self, run: &str) -> StoreResult<Vec<SessionInfo>> {
        let all = self.load_all(run)?;
        if all.iter().all(|s| s.samples.is_empty()) {
            return Err(StoreError::NotFound(format!("monitoring data for '{}'", run)));
        }
        Ok(session::collect_sessions(run, &all))
    }
}

fn json_files(dir: &Path) -> StoreResult<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(dir, e)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| StoreError::io(dir, e))?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let bytes = fs::read(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write through a temp file and rename so readers never see a partial file
fn write_json<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }

    let json = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| StoreError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))
}
