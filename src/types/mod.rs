//! Core types for cropwatch.
//!
//! This module provides foundational types used throughout the system:
//! - **IDs**: Strongly-typed identifiers (PlanId, CheckpointId, RequestId)
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Configuration structures for the pipeline, monitoring and completion client
//! - **Images**: Image references and geolocation carried by requests

mod config;
mod errors;
mod ids;
mod image;

pub use config::{CompletionConfig, Config, MonitoringConfig, ObservabilityConfig, PipelineConfig};
pub use errors::{Error, Result};
pub use ids::{CheckpointId, PlanId, RequestId};
pub use image::{GeoLocation, ImageRef};
