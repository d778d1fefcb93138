//! Metrics collection from the container runtime
//!
//! This module provides the runtime client seam, a Docker Engine
//! implementation of it, the rate calculator that turns raw cumulative
//! counters into samples, and the collection loop driving a monitoring run.

mod docker;
mod r#loop;
mod rate;


pub use docker::{read_cpu_model, DockerClient};
pub use r#loop::{
    CollectionConfig, CollectionLoop, CollectionLoopBuilder, MonitorHandle, TickResults,
};
pub use rate::{derive_sample, elapsed_seconds};

use crate::models::{ContainerDetails, ContainerInfo, HostInfo, RawStats};
use std::sync::Arc;
use thiserror::Error;

pub use async_trait::async_trait;

/// Errors surfaced by a runtime client
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The container no longer resolves
    #[error("container {0} not found")]
    NotFound(String),

    /// The runtime cannot be reached at all
    #[error("container runtime unavailable: {0}")]
    Unavailable(String),

    #[error("runtime API error: {0}")]
    Api(String),

    #[error("failed to decode runtime response: {0}")]
    Decode(String),
}

impl RuntimeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::NotFound(_))
    }
}

pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;

/// Operations consumed from the container runtime
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Check the runtime is reachable
    async fn ping(&self) -> RuntimeResult<()>;

    /// List containers; stopped ones only when `all` is set
    async fn list_containers(&self, all: bool) -> RuntimeResult<Vec<ContainerInfo>>;

    /// Inspect a container by name or id
    async fn inspect(&self, container: &str) -> RuntimeResult<ContainerDetails>;

    /// One non-streaming stats snapshot
    async fn stats(&self, container_id: &str) -> RuntimeResult<RawStats>;

    /// Run a short command inside the container and return its stdout
    async fn exec_capture(&self, container_id: &str, cmd: &[&str]) -> RuntimeResult<String>;

    async fn host_info(&self) -> RuntimeResult<HostInfo>;

    /// Release the underlying connection
    async fn close(&self) {}
}

/// Connect to the local Docker daemon
pub fn connect_docker() -> anyhow::Result<Arc<dyn RuntimeClient>> {
    let client = DockerClient::connect()?;
    tracing::info!("Connected to local Docker daemon");
    Ok(Arc::new(client))
}
