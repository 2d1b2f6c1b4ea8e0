//! The diagnosis pipeline: prompt, completion, normalization, tool fan-out and
//! the refinement gate.

mod gate;
mod orchestrator;
mod prompt;

pub use gate::RefinementGate;
pub use orchestrator::{
    AnalysisOrchestrator, AnalysisRequest, AnalysisResponse, StageOutcome, StageStatus,
};
pub use prompt::{diagnosis_prompt, refinement_prompt};
