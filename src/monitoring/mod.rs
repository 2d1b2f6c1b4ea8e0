//! Longitudinal monitoring of a diagnosed crop.
//!
//! A `MonitoringPlan` starts from a diagnosis and accumulates dated
//! checkpoints. Each checkpoint is assessed by the completion service with the
//! whole plan history as context, and the resulting decision drives the plan's
//! status machine.

mod context;
pub mod engine;
mod types;

pub use context::checkpoint_prompt;
pub use engine::{next_status, CheckpointInput, MonitoringEngine, PlanOptions};
pub use types::{
    CheckpointAssessment, Decision, DecisionAction, MonitoringCheckpoint, MonitoringPlan,
    OverallProgress, PlanStatus, ProgressAnalysis, StatusChange, TreatmentCategory, TreatmentPlan,
    TreatmentStep, Urgency,
};
