//! Refinement gate.

use crate::diagnosis::NormalizedDiagnosis;
use crate::tools::ToolResult;

/// Decides whether tool evidence warrants a second completion pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefinementGate {
    threshold: u8,
}

impl Default for RefinementGate {
    fn default() -> Self {
        Self { threshold: 85 }
    }
}

impl RefinementGate {
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Refine only when tools ran and the primary disease confidence is at or
    /// below the threshold.
    pub fn should_refine(&self, diagnosis: &NormalizedDiagnosis, tool_results: &[ToolResult]) -> bool {
        !tool_results.is_empty() && diagnosis.primary_confidence() <= self.threshold
    }
}
