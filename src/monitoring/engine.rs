//! Monitoring engine - checkpoint submission and plan state machine.
//!
//! Plans are passed in by value and handed back updated; the engine itself holds
//! no per-plan state. Status transitions:
//!
//! - `continue_plan | adjust_treatment | add_intervention` keep the status,
//!   except that `continue_plan` below critical urgency relaxes CRITICAL to ACTIVE
//! - `escalate` or critical urgency move the plan to CRITICAL
//! - `declare_success` completes the plan from either ACTIVE or CRITICAL

use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::context::checkpoint_prompt;
use super::types::{
    CheckpointAssessment, Decision, DecisionAction, MonitoringCheckpoint, MonitoringPlan,
    OverallProgress, PlanStatus, TreatmentPlan, Urgency,
};
use crate::completion::{CompletionClient, CompletionRequest, ResponseShape};
use crate::diagnosis::NormalizedDiagnosis;
use crate::normalize;
use crate::types::{CheckpointId, Error, ImageRef, MonitoringConfig, PlanId, Result};

/// Trailing run of same-direction checkpoints that produces a trend insight.
const TREND_STREAK: usize = 2;

/// Optional settings for a new plan.
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Derived from the diagnosis when absent.
    pub treatment_plan: Option<TreatmentPlan>,
    /// Falls back to `MonitoringConfig::default_duration_days`.
    pub total_duration_days: Option<u32>,
    pub continuity_token: Option<String>,
    /// Today when absent.
    pub start_date: Option<NaiveDate>,
}

/// Inputs for one checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointInput {
    pub day: u32,
    pub image_ref: ImageRef,
    pub user_notes: Option<String>,
    pub weather_conditions: Option<String>,
}

impl CheckpointInput {
    pub fn new(day: u32, image_ref: ImageRef) -> Self {
        Self {
            day,
            image_ref,
            user_notes: None,
            weather_conditions: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.user_notes = Some(notes.into());
        self
    }

    pub fn with_weather(mut self, weather: impl Into<String>) -> Self {
        self.weather_conditions = Some(weather.into());
        self
    }
}

pub struct MonitoringEngine {
    client: Arc<dyn CompletionClient>,
    config: MonitoringConfig,
}

impl std::fmt::Debug for MonitoringEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitoringEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MonitoringEngine {
    pub fn new(client: Arc<dyn CompletionClient>, config: MonitoringConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &MonitoringConfig {
        &self.config
    }

    /// Create an ACTIVE plan seeded from a diagnosis.
    pub fn create_plan(&self, diagnosis: NormalizedDiagnosis, options: PlanOptions) -> MonitoringPlan {
        let interval = self.config.checkpoint_interval_days.max(1);
        let total_duration_days = options
            .total_duration_days
            .unwrap_or(self.config.default_duration_days)
            .max(1);
        let treatment_plan = options
            .treatment_plan
            .unwrap_or_else(|| TreatmentPlan::from_diagnosis(&diagnosis, interval));

        let plan = MonitoringPlan {
            id: PlanId::new(),
            start_date: options.start_date.unwrap_or_else(|| Utc::now().date_naive()),
            crop_type: diagnosis.crop_type.clone(),
            initial_diagnosis: diagnosis,
            initial_treatment_plan: treatment_plan,
            checkpoints: Vec::new(),
            current_status: PlanStatus::Active,
            total_duration_days,
            next_checkpoint_day: interval.min(total_duration_days),
            adaptive_insights: Vec::new(),
            continuity_token: options.continuity_token,
            status_history: Vec::new(),
        };

        info!(
            plan_id = %plan.id,
            crop = %plan.crop_type,
            duration_days = total_duration_days,
            "monitoring_plan_created"
        );
        plan
    }

    /// Assess one checkpoint and fold it into the plan.
    ///
    /// Rejects plans that are PAUSED or COMPLETED, empty images, and days that do
    /// not come after the previous checkpoint. A failed or unparsable completion
    /// yields the neutral assessment rather than an error.
    #[instrument(skip_all, fields(plan_id = %plan.id, day = input.day))]
    pub async fn submit_checkpoint(
        &self,
        mut plan: MonitoringPlan,
        input: CheckpointInput,
    ) -> Result<(MonitoringCheckpoint, MonitoringPlan)> {
        if !plan.current_status.accepts_checkpoints() {
            return Err(Error::state_transition(format!(
                "cannot submit checkpoint to plan {}: status is {:?}",
                plan.id, plan.current_status
            )));
        }
        if input.image_ref.is_empty() {
            return Err(Error::input("checkpoint image is required"));
        }
        if let Some(last) = plan.last_checkpoint() {
            if input.day <= last.day {
                return Err(Error::input(format!(
                    "checkpoint day {} must come after day {}",
                    input.day, last.day
                )));
            }
        }

        let request = CompletionRequest::new(checkpoint_prompt(&plan, &input))
            .with_image(input.image_ref.clone())
            .with_continuity_token(plan.continuity_token.clone())
            .with_shape(ResponseShape::Checkpoint);

        let (assessment, fallback, token) = match self.client.complete(request).await {
            Ok(completion) => match normalize::parse_checkpoint(&completion.text) {
                Ok(assessment) => (assessment, false, completion.continuity_token),
                Err(e) => {
                    warn!(error = %e, "checkpoint_parse_failed_using_neutral");
                    (CheckpointAssessment::neutral(), true, completion.continuity_token)
                }
            },
            Err(e) => {
                warn!(error = %e, code = e.code(), "checkpoint_completion_failed_using_neutral");
                (CheckpointAssessment::neutral(), true, None)
            }
        };

        let CheckpointAssessment {
            analysis,
            agent_reasoning,
            plan_adjustments,
            next_steps,
            decision,
        } = assessment;

        let checkpoint = MonitoringCheckpoint {
            id: CheckpointId::new(),
            day: input.day,
            timestamp: Utc::now(),
            image_ref: input.image_ref,
            user_notes: input.user_notes,
            weather_conditions: input.weather_conditions,
            analysis,
            agent_reasoning,
            plan_adjustments,
            next_steps,
            decision,
            fallback,
        };

        self.apply_checkpoint(&mut plan, checkpoint.clone());
        if token.is_some() {
            plan.continuity_token = token;
        }

        info!(
            status = ?plan.current_status,
            action = ?checkpoint.decision.action,
            urgency = ?checkpoint.decision.urgency,
            next_checkpoint_day = plan.next_checkpoint_day,
            fallback,
            "checkpoint_recorded"
        );
        Ok((checkpoint, plan))
    }

    fn apply_checkpoint(&self, plan: &mut MonitoringPlan, checkpoint: MonitoringCheckpoint) {
        let day = checkpoint.day;

        let to = next_status(plan.current_status, &checkpoint.decision);
        if to != plan.current_status {
            let reason = format!("day {}: {:?}", day, checkpoint.decision.action);
            plan.set_status(to, reason);
        }

        plan.adaptive_insights.extend(
            checkpoint
                .plan_adjustments
                .iter()
                .map(|adj| format!("Day {}: {}", day, adj)),
        );
        plan.checkpoints.push(checkpoint);
        if let Some(insight) = trend_insight(&plan.checkpoints) {
            plan.adaptive_insights.push(insight);
        }

        plan.next_checkpoint_day = if plan.current_status.is_terminal() {
            day
        } else {
            let urgency = plan
                .last_checkpoint()
                .map_or(Urgency::Medium, |cp| cp.decision.urgency);
            let step = match urgency {
                Urgency::Critical => 1,
                Urgency::High => 2,
                Urgency::Medium | Urgency::Low => self.config.checkpoint_interval_days.max(1),
            };
            day.saturating_add(step).min(plan.total_duration_days.max(day))
        };
    }

    /// Pause an ACTIVE or CRITICAL plan.
    pub fn pause(&self, mut plan: MonitoringPlan, reason: impl Into<String>) -> Result<MonitoringPlan> {
        if !plan.current_status.can_transition_to(PlanStatus::Paused) {
            return Err(Error::state_transition(format!(
                "cannot pause plan {}: status is {:?}",
                plan.id, plan.current_status
            )));
        }
        plan.set_status(PlanStatus::Paused, reason);
        info!(plan_id = %plan.id, "monitoring_plan_paused");
        Ok(plan)
    }

    /// Resume a PAUSED plan as ACTIVE.
    pub fn resume(&self, mut plan: MonitoringPlan, reason: impl Into<String>) -> Result<MonitoringPlan> {
        if plan.current_status != PlanStatus::Paused {
            return Err(Error::state_transition(format!(
                "cannot resume plan {}: status is {:?}, expected Paused",
                plan.id, plan.current_status
            )));
        }
        plan.set_status(PlanStatus::Active, reason);
        info!(plan_id = %plan.id, "monitoring_plan_resumed");
        Ok(plan)
    }
}

/// Status after a checkpoint decision. Pure; only called for ACTIVE or CRITICAL.
pub fn next_status(current: PlanStatus, decision: &Decision) -> PlanStatus {
    match decision.action {
        DecisionAction::DeclareSuccess => PlanStatus::Completed,
        _ if decision.urgency == Urgency::Critical => PlanStatus::Critical,
        DecisionAction::Escalate => PlanStatus::Critical,
        DecisionAction::ContinuePlan if current == PlanStatus::Critical => PlanStatus::Active,
        _ => current,
    }
}

fn trend_insight(checkpoints: &[MonitoringCheckpoint]) -> Option<String> {
    let last = checkpoints.last()?;
    let direction = last.analysis.overall_progress;
    let message = match direction {
        OverallProgress::Improving => "improving; current treatment is working",
        OverallProgress::Worsening => "worsening; consider changing treatment",
        OverallProgress::Stable | OverallProgress::NewIssues => return None,
    };

    let streak = checkpoints
        .iter()
        .rev()
        .take_while(|cp| cp.analysis.overall_progress == direction)
        .count();
    (streak >= TREND_STREAK)
        .then(|| format!("Day {}: {} consecutive checkpoints {}", last.day, streak, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::Completion;
    use crate::diagnosis::fallback_diagnosis;
    use async_trait::async_trait;
    use mockall::mock;
    use serde_json::json;

    mock! {
        pub Client {}

        #[async_trait]
        impl CompletionClient for Client {
            async fn complete(&self, request: CompletionRequest) -> Result<Completion>;
        }
    }

    fn assessment(action: &str, urgency: &str, progress: &str) -> String {
        json!({
            "analysis": {"overallProgress": progress, "severityChange": 0, "confidence": 70},
            "agentReasoning": format!("{} at {}", action, urgency),
            "planAdjustments": ["Increase spray frequency"],
            "nextSteps": ["Recheck leaves"],
            "decision": {"action": action, "reasoning": "test", "confidence": 70, "urgency": urgency}
        })
        .to_string()
    }

    fn engine_with(responses: Vec<Result<Completion>>) -> MonitoringEngine {
        let mut client = MockClient::new();
        let mut responses = responses.into_iter();
        client
            .expect_complete()
            .times(responses.len())
            .returning(move |_| responses.next().unwrap_or_else(|| Err(Error::completion("exhausted"))));
        MonitoringEngine::new(Arc::new(client), MonitoringConfig::default())
    }

    fn image() -> ImageRef {
        ImageRef::url("https://example.org/day.jpg")
    }

    #[test]
    fn test_next_status_table() {
        let decision = |action, urgency| Decision {
            action,
            urgency,
            ..Default::default()
        };
        use DecisionAction::*;
        use PlanStatus::*;

        assert_eq!(next_status(Active, &decision(ContinuePlan, Urgency::Low)), Active);
        assert_eq!(next_status(Active, &decision(AdjustTreatment, Urgency::High)), Active);
        assert_eq!(next_status(Active, &decision(AddIntervention, Urgency::Critical)), Critical);
        assert_eq!(next_status(Active, &decision(Escalate, Urgency::High)), Critical);
        assert_eq!(next_status(Critical, &decision(ContinuePlan, Urgency::High)), Active);
        assert_eq!(next_status(Critical, &decision(ContinuePlan, Urgency::Critical)), Critical);
        assert_eq!(next_status(Critical, &decision(AdjustTreatment, Urgency::Medium)), Critical);
        assert_eq!(next_status(Critical, &decision(DeclareSuccess, Urgency::Critical)), Completed);
    }

    #[test]
    fn test_create_plan_defaults() {
        let engine = engine_with(vec![]);
        let plan = engine.create_plan(fallback_diagnosis(), PlanOptions::default());
        assert_eq!(plan.current_status, PlanStatus::Active);
        assert_eq!(plan.total_duration_days, 14);
        assert_eq!(plan.next_checkpoint_day, 3);
        assert_eq!(plan.crop_type, "Tomato");
        assert!(!plan.initial_treatment_plan.timeline.is_empty());
        assert!(plan.checkpoints.is_empty());
    }

    #[tokio::test]
    async fn test_critical_then_success() {
        let engine = engine_with(vec![
            Ok(Completion {
                text: assessment("adjust_treatment", "critical", "worsening"),
                continuity_token: Some("resp_2".into()),
            }),
            Ok(Completion::text(assessment("declare_success", "low", "improving"))),
        ]);
        let plan = engine.create_plan(
            fallback_diagnosis(),
            PlanOptions {
                continuity_token: Some("resp_1".into()),
                ..Default::default()
            },
        );

        let (cp, plan) = engine
            .submit_checkpoint(plan, CheckpointInput::new(3, image()))
            .await
            .unwrap();
        assert!(!cp.fallback);
        assert_eq!(plan.current_status, PlanStatus::Critical);
        assert_eq!(plan.next_checkpoint_day, 4);
        assert_eq!(plan.continuity_token.as_deref(), Some("resp_2"));
        assert_eq!(plan.adaptive_insights, vec!["Day 3: Increase spray frequency"]);

        let (_, plan) = engine
            .submit_checkpoint(plan, CheckpointInput::new(4, image()))
            .await
            .unwrap();
        assert_eq!(plan.current_status, PlanStatus::Completed);
        // no new token: prior one kept
        assert_eq!(plan.continuity_token.as_deref(), Some("resp_2"));
        assert_eq!(plan.status_history.len(), 2);
        assert_eq!(plan.status_history[1].from, PlanStatus::Critical);
        assert_eq!(plan.status_history[1].to, PlanStatus::Completed);
    }

    #[tokio::test]
    async fn test_unparsable_uses_neutral_checkpoint() {
        let engine = engine_with(vec![
            Ok(Completion::text("the plant looks fine I guess")),
            Err(Error::auth_quota("quota exceeded")),
        ]);
        let plan = engine.create_plan(fallback_diagnosis(), PlanOptions::default());

        let (cp, plan) = engine
            .submit_checkpoint(plan, CheckpointInput::new(3, image()))
            .await
            .unwrap();
        assert!(cp.fallback);
        assert_eq!(cp.analysis.overall_progress, OverallProgress::Stable);
        assert_eq!(cp.decision.action, DecisionAction::ContinuePlan);
        assert_eq!(plan.current_status, PlanStatus::Active);
        assert_eq!(plan.next_checkpoint_day, 6);

        let (cp, plan) = engine
            .submit_checkpoint(plan, CheckpointInput::new(6, image()))
            .await
            .unwrap();
        assert!(cp.fallback);
        assert_eq!(plan.checkpoints.len(), 2);
    }

    #[tokio::test]
    async fn test_guards_reject_before_completion() {
        let engine = engine_with(vec![Ok(Completion::text(assessment(
            "continue_plan",
            "low",
            "stable",
        )))]);
        let plan = engine.create_plan(fallback_diagnosis(), PlanOptions::default());
        let (_, plan) = engine
            .submit_checkpoint(plan, CheckpointInput::new(5, image()))
            .await
            .unwrap();

        let err = engine
            .submit_checkpoint(plan.clone(), CheckpointInput::new(5, image()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Input(_)));

        let err = engine
            .submit_checkpoint(plan.clone(), CheckpointInput::new(6, ImageRef::url("")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Input(_)));

        let paused = engine.pause(plan, "grower travelling").unwrap();
        let err = engine
            .submit_checkpoint(paused.clone(), CheckpointInput::new(6, image()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StateTransition(_)));

        let resumed = engine.resume(paused, "back").unwrap();
        assert_eq!(resumed.current_status, PlanStatus::Active);
        assert!(engine.resume(resumed, "again").is_err());
    }

    #[test]
    fn test_trend_insight_needs_a_streak() {
        let engine = engine_with(vec![]);
        let mut plan = engine.create_plan(fallback_diagnosis(), PlanOptions::default());
        let checkpoint = |day, progress| {
            let mut cp = plan_checkpoint(day);
            cp.analysis.overall_progress = progress;
            cp
        };

        engine.apply_checkpoint(&mut plan, checkpoint(3, OverallProgress::Improving));
        assert!(plan.adaptive_insights.is_empty());
        engine.apply_checkpoint(&mut plan, checkpoint(6, OverallProgress::Improving));
        assert_eq!(
            plan.adaptive_insights,
            vec!["Day 6: 2 consecutive checkpoints improving; current treatment is working"]
        );
        engine.apply_checkpoint(&mut plan, checkpoint(9, OverallProgress::Stable));
        assert_eq!(plan.adaptive_insights.len(), 1);
    }

    #[test]
    fn test_next_checkpoint_capped_at_duration() {
        let engine = engine_with(vec![]);
        let mut plan = engine.create_plan(
            fallback_diagnosis(),
            PlanOptions {
                total_duration_days: Some(7),
                ..Default::default()
            },
        );
        let mut cp = plan_checkpoint(6);
        cp.decision.urgency = Urgency::Low;
        engine.apply_checkpoint(&mut plan, cp);
        assert_eq!(plan.next_checkpoint_day, 7);
    }

    fn plan_checkpoint(day: u32) -> MonitoringCheckpoint {
        let a = CheckpointAssessment::neutral();
        MonitoringCheckpoint {
            id: CheckpointId::new(),
            day,
            timestamp: Utc::now(),
            image_ref: image(),
            user_notes: None,
            weather_conditions: None,
            analysis: a.analysis,
            agent_reasoning: a.agent_reasoning,
            plan_adjustments: a.plan_adjustments,
            next_steps: a.next_steps,
            decision: a.decision,
            fallback: true,
        }
    }
}
