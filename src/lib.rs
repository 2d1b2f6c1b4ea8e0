//! # Cropwatch Core - agentic crop-disease diagnosis
//!
//! Turns a crop photo into a structured diagnosis and follows the treatment
//! over time:
//! - Concurrent preprocessing and vision completion with a deterministic fallback
//! - Tolerant normalization of model output into typed records
//! - Concurrent tool fan-out with per-call isolation and timeouts
//! - Confidence-gated refinement pass
//! - Longitudinal monitoring plans driven by a status state machine
//!
//! ## Architecture
//!
//! ```text
//!                ┌──────────────────────────────────────────────┐
//!   request  →   │            AnalysisOrchestrator              │
//!                │  ┌─────────────┐  ┌──────────┐  ┌──────────┐ │
//!                │  │Preprocessing│  │Completion│→ │Normalizer│ │
//!                │  └─────────────┘  └──────────┘  └──────────┘ │
//!                │  ┌─────────────┐  ┌──────────┐               │
//!                │  │ToolExecutor │→ │  Gate    │→ refinement   │
//!                │  └─────────────┘  └──────────┘               │
//!                └──────────────────────────────────────────────┘
//!   diagnosis →  MonitoringEngine → checkpoints → plan status
//! ```
//!
//! All external services (`CompletionClient`, `PreprocessingService`, tools)
//! are constructed by the caller and injected.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod completion;
pub mod diagnosis;
pub mod monitoring;
pub mod normalize;
pub mod pipeline;
pub mod preprocessing;
pub mod tools;
pub mod types;

pub mod observability;

pub use diagnosis::{fallback_diagnosis, NormalizedDiagnosis};
pub use monitoring::{MonitoringEngine, MonitoringPlan};
pub use pipeline::{AnalysisOrchestrator, AnalysisRequest, AnalysisResponse};
pub use types::{Config, Error, Result};
