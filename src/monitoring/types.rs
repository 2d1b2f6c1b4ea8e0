//! Monitoring plan and checkpoint records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::diagnosis::NormalizedDiagnosis;
use crate::types::{CheckpointId, ImageRef, PlanId};

/// Plan status.
///
/// ```text
/// ACTIVE ⇄ CRITICAL ──declare_success──▶ COMPLETED
///    ▲  ╲    │
///    │   ▼   ▼
///    └─── PAUSED   (external pause/resume only)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Active,
    Paused,
    Critical,
    Completed,
}

impl PlanStatus {
    pub fn is_terminal(self) -> bool {
        self == PlanStatus::Completed
    }

    /// Whether checkpoints may be submitted in this status.
    pub fn accepts_checkpoints(self) -> bool {
        matches!(self, PlanStatus::Active | PlanStatus::Critical)
    }

    pub fn can_transition_to(self, to: PlanStatus) -> bool {
        match (self, to) {
            (PlanStatus::Active, PlanStatus::Critical) => true,
            (PlanStatus::Active, PlanStatus::Completed) => true,
            (PlanStatus::Active, PlanStatus::Paused) => true,
            (PlanStatus::Critical, PlanStatus::Active) => true,
            (PlanStatus::Critical, PlanStatus::Completed) => true,
            (PlanStatus::Critical, PlanStatus::Paused) => true,
            (PlanStatus::Paused, PlanStatus::Active) => true,
            // COMPLETED is terminal
            (PlanStatus::Completed, _) => false,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverallProgress {
    Improving,
    #[default]
    Stable,
    Worsening,
    NewIssues,
}

impl OverallProgress {
    pub fn parse_lenient(s: &str) -> Self {
        match normalize_token(s).as_str() {
            "improving" | "improved" | "better" => OverallProgress::Improving,
            "worsening" | "worse" | "declining" => OverallProgress::Worsening,
            "new_issues" | "new_issue" | "new" => OverallProgress::NewIssues,
            _ => OverallProgress::Stable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    #[default]
    ContinuePlan,
    AdjustTreatment,
    Escalate,
    AddIntervention,
    DeclareSuccess,
}

impl DecisionAction {
    pub fn parse_lenient(s: &str) -> Self {
        match normalize_token(s).as_str() {
            "adjust_treatment" | "adjust" => DecisionAction::AdjustTreatment,
            "escalate" => DecisionAction::Escalate,
            "add_intervention" | "intervene" => DecisionAction::AddIntervention,
            "declare_success" | "success" | "resolved" => DecisionAction::DeclareSuccess,
            _ => DecisionAction::ContinuePlan,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Urgency {
    pub fn parse_lenient(s: &str) -> Self {
        match normalize_token(s).as_str() {
            "low" => Urgency::Low,
            "high" => Urgency::High,
            "critical" | "urgent" => Urgency::Critical,
            _ => Urgency::Medium,
        }
    }
}

fn normalize_token(s: &str) -> String {
    s.trim().to_ascii_lowercase().replace([' ', '-'], "_")
}

/// What changed since the previous checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProgressAnalysis {
    pub overall_progress: OverallProgress,
    pub symptom_changes: Vec<String>,
    pub new_symptoms: Vec<String>,
    pub resolved_symptoms: Vec<String>,
    /// -2 (much better) ..= 2 (much worse)
    pub severity_change: i8,
    pub confidence: u8,
}

/// The engine's autonomous decision for this checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub action: DecisionAction,
    pub reasoning: String,
    pub confidence: u8,
    pub suggested_actions: Vec<String>,
    pub urgency: Urgency,
}

/// The model-produced part of a checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointAssessment {
    pub analysis: ProgressAnalysis,
    pub agent_reasoning: String,
    pub plan_adjustments: Vec<String>,
    pub next_steps: Vec<String>,
    pub decision: Decision,
}

impl CheckpointAssessment {
    /// Deterministic assessment used when the model's answer is unusable.
    pub fn neutral() -> Self {
        Self {
            analysis: ProgressAnalysis {
                overall_progress: OverallProgress::Stable,
                severity_change: 0,
                confidence: 0,
                ..Default::default()
            },
            agent_reasoning: "Automated assessment unavailable for this checkpoint; \
                              continuing the current treatment plan."
                .to_string(),
            plan_adjustments: Vec::new(),
            next_steps: vec![
                "Continue the current treatment schedule".to_string(),
                "Submit a clear photo at the next checkpoint".to_string(),
            ],
            decision: Decision {
                action: DecisionAction::ContinuePlan,
                reasoning: "No reliable assessment was available; keeping the plan unchanged."
                    .to_string(),
                confidence: 0,
                suggested_actions: Vec::new(),
                urgency: Urgency::Medium,
            },
        }
    }
}

/// One dated observation within a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringCheckpoint {
    pub id: CheckpointId,
    pub day: u32,
    pub timestamp: DateTime<Utc>,
    pub image_ref: ImageRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_conditions: Option<String>,
    pub analysis: ProgressAnalysis,
    pub agent_reasoning: String,
    pub plan_adjustments: Vec<String>,
    pub next_steps: Vec<String>,
    pub decision: Decision,
    /// True when the neutral assessment was substituted.
    #[serde(default)]
    pub fallback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreatmentCategory {
    Organic,
    Chemical,
    Prevention,
    Monitoring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentStep {
    pub day: u32,
    pub action: String,
    pub category: TreatmentCategory,
}

/// Initial treatment schedule for a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentPlan {
    pub summary: String,
    pub timeline: Vec<TreatmentStep>,
}

impl TreatmentPlan {
    /// Derive a schedule from a diagnosis: organic measures first, chemical
    /// options after a first review, prevention throughout.
    pub fn from_diagnosis(diagnosis: &NormalizedDiagnosis, checkpoint_interval_days: u32) -> Self {
        let interval = checkpoint_interval_days.max(1);
        let mut timeline = Vec::new();

        for action in &diagnosis.organic_treatments {
            timeline.push(TreatmentStep {
                day: 0,
                action: action.clone(),
                category: TreatmentCategory::Organic,
            });
        }
        for action in &diagnosis.chemical_treatments {
            timeline.push(TreatmentStep {
                day: interval,
                action: action.clone(),
                category: TreatmentCategory::Chemical,
            });
        }
        for action in &diagnosis.prevention_tips {
            timeline.push(TreatmentStep {
                day: 0,
                action: action.clone(),
                category: TreatmentCategory::Prevention,
            });
        }
        timeline.push(TreatmentStep {
            day: interval,
            action: "Photograph the same plant for a progress checkpoint".to_string(),
            category: TreatmentCategory::Monitoring,
        });
        timeline.sort_by_key(|s| s.day);

        let summary = match diagnosis.primary_disease() {
            Some(d) => format!("Treatment plan for {} on {}", d.name, diagnosis.crop_type),
            None => format!("General care plan for {}", diagnosis.crop_type),
        };

        Self { summary, timeline }
    }
}

/// A recorded status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub from: PlanStatus,
    pub to: PlanStatus,
    pub at: DateTime<Utc>,
    pub reason: String,
}

/// Longitudinal treatment plan.
///
/// Only `MonitoringEngine::submit_checkpoint`, `pause` and `resume` mutate a
/// plan. Concurrent submissions for one plan must be serialized by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringPlan {
    pub id: PlanId,
    pub start_date: NaiveDate,
    pub crop_type: String,
    pub initial_diagnosis: NormalizedDiagnosis,
    pub initial_treatment_plan: TreatmentPlan,
    pub checkpoints: Vec<MonitoringCheckpoint>,
    pub current_status: PlanStatus,
    pub total_duration_days: u32,
    pub next_checkpoint_day: u32,
    pub adaptive_insights: Vec<String>,
    /// Opaque; forwarded verbatim to the completion service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuity_token: Option<String>,
    #[serde(default)]
    pub status_history: Vec<StatusChange>,
}

impl MonitoringPlan {
    pub fn last_checkpoint(&self) -> Option<&MonitoringCheckpoint> {
        self.checkpoints.last()
    }

    /// Record a status change; no-op when the status is unchanged.
    pub(crate) fn set_status(&mut self, to: PlanStatus, reason: impl Into<String>) {
        if self.current_status == to {
            return;
        }
        self.status_history.push(StatusChange {
            from: self.current_status,
            to,
            at: Utc::now(),
            reason: reason.into(),
        });
        self.current_status = to;
    }
}
