//! Metrics collection loop
//!
//! Drives one monitoring run: resolves the configured containers, samples
//! them on a fixed interval, persists after every tick and writes the final
//! derived summaries once on shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use tokio::sync::broadcast;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::rate::derive_sample;
use super::RuntimeClient;
use crate::config::MonitorConfig;
use crate::models::{ContainerSeries, HostInfo, RawStats};
use crate::network::{NetworkInspector, ProxyMatcher};
use crate::observability::StructuredLogger;
use crate::session;
use crate::store::{SeriesStore, StoreError, StoreResult};

/// Configuration for the metrics collection loop
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    /// Sampling interval
    pub interval: Duration,
    /// Cap on stats fetches in flight within one tick.
    ///
    /// `None` fetches every active container at once.
    pub max_concurrency: Option<usize>,
    /// Pricing region for the egress cost estimate
    pub region: Option<String>,
    /// Extra image/name patterns treated as egress proxies
    pub proxy_patterns: Vec<String>,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(crate::config::DEFAULT_INTERVAL_SECS),
            max_concurrency: None,
            region: None,
            proxy_patterns: Vec::new(),
        }
    }
}

/// Counts from one collection cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickResults {
    pub collected: usize,
    pub skipped: usize,
    pub dropped: usize,
}

enum Outcome {
    Collected,
    Skipped,
    Dropped(String),
}

/// Stops a running [`CollectionLoop`]
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    shutdown_tx: broadcast::Sender<()>,
}

impl MonitorHandle {
    pub fn stop(&self) {
        // No receivers means the loop already exited
        let _ = self.shutdown_tx.send(());
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }
}

/// Collection loop for one monitoring run
pub struct CollectionLoop {
    client: Arc<dyn RuntimeClient>,
    store: SeriesStore,
    monitor: MonitorConfig,
    config: CollectionConfig,
    inspector: NetworkInspector,
    logger: StructuredLogger,
    /// Series keyed by container display name
    series: DashMap<String, ContainerSeries>,
    /// Last raw snapshot per container, the baseline for counter rates
    baselines: DashMap<String, RawStats>,
    /// Containers still collected, display name to id
    active: DashMap<String, String>,
    session_id: OnceLock<String>,
    finalized: AtomicBool,
    handle: MonitorHandle,
}

impl CollectionLoop {
    pub fn new(
        client: Arc<dyn RuntimeClient>,
        store: SeriesStore,
        monitor: MonitorConfig,
        config: CollectionConfig,
    ) -> Self {
        let matcher = ProxyMatcher::new(config.proxy_patterns.iter().cloned());
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            inspector: NetworkInspector::new(client.clone(), matcher),
            logger: StructuredLogger::new(monitor.name.clone()),
            client,
            store,
            monitor,
            config,
            series: DashMap::new(),
            baselines: DashMap::new(),
            active: DashMap::new(),
            session_id: OnceLock::new(),
            finalized: AtomicBool::new(false),
            handle: MonitorHandle { shutdown_tx },
        }
    }

    pub fn handle(&self) -> MonitorHandle {
        self.handle.clone()
    }

    /// Request shutdown of a loop started with [`CollectionLoop::run`]
    pub fn stop(&self) {
        self.handle.stop();
    }

    pub fn run_name(&self) -> &str {
        &self.monitor.name
    }

    /// Identifier of the current session, set by [`CollectionLoop::start`]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.get().map(String::as_str)
    }

    /// Names of containers still being collected, sorted
    pub fn active_containers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.active.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Resolve the configured containers and open a new session.
    ///
    /// Existing series of the run are resumed so the new session's samples
    /// append to them. Fails when the runtime is unreachable or none of the
    /// containers resolve.
    pub async fn start(&self) -> Result<()> {
        self.client
            .ping()
            .await
            .context("container runtime is not reachable")?;

        let host = match self.client.host_info().await {
            Ok(host) => host,
            Err(e) => {
                warn!(error = %e, "Failed to read host info");
                HostInfo::default()
            }
        };

        let started = Utc::now();
        let session_id = self
            .session_id
            .get_or_init(|| started.timestamp().to_string())
            .clone();

        for requested in &self.monitor.containers {
            let details = match self.client.inspect(requested).await {
                Ok(details) => details,
                Err(e) => {
                    warn!(container = %requested, error = %e, "Container not found, skipping");
                    continue;
                }
            };

            let mut series = match self.store.load_series(&self.monitor.name, &details.name) {
                Ok(existing) => {
                    info!(
                        container = %details.name,
                        samples = existing.samples.len(),
                        "Resuming existing series"
                    );
                    existing
                }
                Err(StoreError::NotFound(_)) => ContainerSeries {
                    start_time: started,
                    ..Default::default()
                },
                Err(e) => {
                    warn!(container = %details.name, error = %e, "Existing series unreadable, starting fresh");
                    ContainerSeries {
                        start_time: started,
                        ..Default::default()
                    }
                }
            };

            series.container_id = details.id.clone();
            series.container_name = details.name.clone();
            series.image_name = if details.image.is_empty() {
                "unknown".to_string()
            } else {
                details.image.clone()
            };
            series.host = host.clone();
            series.limits = details.limits;
            series.interval_seconds = self.monitor.interval;
            series.session_id = Some(session_id.clone());
            series.end_time = None;
            series.summary = None;
            series.network_cost = None;
            series.recommendation = None;

            self.active.insert(details.name.clone(), details.id.clone());
            self.series.insert(details.name, series);
        }

        if self.active.is_empty() {
            bail!(
                "none of the containers in '{}' could be found",
                self.monitor.name
            );
        }

        self.logger
            .log_startup(self.active.len(), self.monitor.interval, &session_id);
        Ok(())
    }

    /// Run until shutdown is signalled, then finalize.
    ///
    /// The first tick fires immediately.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut own_shutdown = self.handle.subscribe();

        let reason = loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let start = Instant::now();
                    let results = self.tick().await;
                    debug!(
                        collected = results.collected,
                        skipped = results.skipped,
                        dropped = results.dropped,
                        elapsed_ms = start.elapsed().as_millis(),
                        "Collection cycle complete"
                    );

                    if self.active.is_empty() {
                        warn!(run = %self.monitor.name, "No containers left to collect");
                        break "no containers left";
                    }
                }
                _ = shutdown.recv() => break "shutdown requested",
                _ = own_shutdown.recv() => break "stopped",
            }
        };

        self.finalize(reason).await;
    }

    /// Collect one sample from every active container, then persist
    pub async fn tick(&self) -> TickResults {
        let targets: Vec<(String, String)> = self
            .active
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let width = self.config.max_concurrency.unwrap_or(targets.len()).max(1);

        let outcomes: Vec<(String, Outcome)> = stream::iter(targets)
            .map(|(name, id)| async move {
                let outcome = self.collect_container(&name, &id).await;
                (name, outcome)
            })
            .buffer_unordered(width)
            .collect()
            .await;

        let mut results = TickResults::default();
        for (name, outcome) in outcomes {
            match outcome {
                Outcome::Collected => results.collected += 1,
                Outcome::Skipped => results.skipped += 1,
                Outcome::Dropped(reason) => {
                    self.active.remove(&name);
                    self.baselines.remove(&name);
                    self.logger.log_container_dropped(&name, &reason);
                    results.dropped += 1;
                }
            }
        }

        self.persist().await;
        results
    }

    async fn collect_container(&self, name: &str, id: &str) -> Outcome {
        let details = match self.client.inspect(id).await {
            Ok(details) => details,
            Err(e) if e.is_not_found() => return Outcome::Dropped(e.to_string()),
            Err(e) => {
                debug!(container = %name, error = %e, "Failed to inspect container");
                return Outcome::Skipped;
            }
        };

        if !details.running {
            info!(container = %name, "Container not running, skipping");
            return Outcome::Skipped;
        }

        let raw = match self.client.stats(id).await {
            Ok(raw) => raw,
            Err(e) if e.is_not_found() => return Outcome::Dropped(e.to_string()),
            Err(e) => {
                warn!(container = %name, error = %e, "Failed to collect stats");
                return Outcome::Skipped;
            }
        };

        let previous = self.baselines.insert(name.to_string(), raw.clone());
        let mut sample = derive_sample(&raw, previous.as_ref());
        self.inspector.probe(&details).await.apply(&mut sample);
        sample.session_id = self.session_id.get().cloned();

        self.logger.log_sample(name, &sample);
        if let Some(mut series) = self.series.get_mut(name) {
            series.samples.push(sample);
        }
        Outcome::Collected
    }

    /// Write every series with the current time as its end.
    ///
    /// Failures are logged and collection continues in memory.
    async fn persist(&self) {
        let now = Utc::now();
        let batch: Vec<ContainerSeries> = self
            .series
            .iter_mut()
            .map(|mut entry| {
                entry.end_time = Some(now);
                entry.value().clone()
            })
            .collect();

        for (series, result) in self.save_all(batch).await {
            if let Err(e) = result {
                self.logger.log_persist_failure(&series.container_name, &e);
            }
        }
    }

    /// Write a batch of series on the blocking pool, off every map guard
    async fn save_all(
        &self,
        batch: Vec<ContainerSeries>,
    ) -> Vec<(ContainerSeries, StoreResult<()>)> {
        let store = self.store.clone();
        let run = self.monitor.name.clone();
        let task = tokio::task::spawn_blocking(move || {
            batch
                .into_iter()
                .map(|series| {
                    let result = store.save_series(&run, &series);
                    (series, result)
                })
                .collect::<Vec<_>>()
        });

        match task.await {
            Ok(results) => results,
            Err(e) => {
                warn!(run = %self.monitor.name, error = %e, "Series write task failed");
                Vec::new()
            }
        }
    }

    /// Derive summaries, persist and release the runtime client.
    ///
    /// Runs at most once; later calls return `false`.
    pub async fn finalize(&self, reason: &str) -> bool {
        if self.finalized.swap(true, Ordering::SeqCst) {
            return false;
        }

        let now = Utc::now();
        let region = self.config.region.as_deref();
        let batch: Vec<ContainerSeries> = self
            .series
            .iter_mut()
            .filter(|entry| !entry.samples.is_empty())
            .map(|mut entry| {
                entry.end_time = Some(now);
                session::derive(entry.value_mut(), region);
                entry.value().clone()
            })
            .collect();

        for (series, result) in self.save_all(batch).await {
            let name = &series.container_name;
            match result {
                Ok(()) => {
                    let warnings = series.summary.as_ref().map_or(0, |s| s.warnings.len());
                    self.logger
                        .log_summary_saved(name, series.samples.len(), warnings)
                }
                Err(e) => self.logger.log_persist_failure(name, &e),
            }
        }

        self.client.close().await;
        self.logger.log_shutdown(reason);
        true
    }

    /// Copy of the in-memory series, sorted by container name
    pub fn snapshot(&self) -> Vec<ContainerSeries> {
        let mut all: Vec<ContainerSeries> = self.series.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.container_name.cmp(&b.container_name));
        all
    }
}

/// Builder for creating the collection loop
pub struct CollectionLoopBuilder {
    client: Option<Arc<dyn RuntimeClient>>,
    store: Option<SeriesStore>,
    monitor: Option<MonitorConfig>,
    config: CollectionConfig,
}

impl CollectionLoopBuilder {
    pub fn new() -> Self {
        Self {
            client: None,
            store: None,
            monitor: None,
            config: CollectionConfig::default(),
        }
    }

    pub fn client(mut self, client: Arc<dyn RuntimeClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn store(mut self, store: SeriesStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the monitored group; its interval becomes the sampling interval
    pub fn monitor(mut self, monitor: MonitorConfig) -> Self {
        self.config.interval = monitor.interval_duration();
        self.monitor = Some(monitor);
        self
    }

    /// Cap concurrent stats fetches per tick below the container count
    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.config.max_concurrency = Some(limit);
        self
    }

    pub fn region(mut self, region: Option<String>) -> Self {
        self.config.region = region;
        self
    }

    pub fn proxy_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.proxy_patterns = patterns;
        self
    }

    pub fn build(self) -> Result<CollectionLoop> {
        let client = self
            .client
            .ok_or_else(|| anyhow::anyhow!("Runtime client is required"))?;
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("Store is required"))?;
        let monitor = self
            .monitor
            .ok_or_else(|| anyhow::anyhow!("Monitor config is required"))?;
        monitor.validate()?;

        Ok(CollectionLoop::new(client, store, monitor, self.config))
    }
}

impl Default for CollectionLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
