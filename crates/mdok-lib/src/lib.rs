//! Container group monitoring library
//!
//! This crate provides the core functionality for:
//! - Metrics collection from the container runtime
//! - Traffic classification by destination
//! - Session segmentation and summary statistics
//! - Resource warnings, egress cost and instance sizing
//! - File-backed persistence and report exports

pub mod analysis;
pub mod collector;
pub mod config;
pub mod export;
pub mod models;
pub mod network;
pub mod observability;
pub mod session;
pub mod store;

pub use collector::{
    connect_docker, CollectionConfig, CollectionLoop, CollectionLoopBuilder, MonitorHandle,
    RuntimeClient, RuntimeError,
};
pub use config::MonitorConfig;
pub use export::ExportFormat;
pub use models::*;
pub use observability::StructuredLogger;
pub use session::{Selection, SessionInfo};
pub use store::{SeriesStore, StoreError};
