//! Monitoring integration tests - plan lifecycle across several checkpoints.

use async_trait::async_trait;
use chrono::NaiveDate;
use cropwatch_core::completion::{Completion, CompletionClient, CompletionRequest, ResponseShape};
use cropwatch_core::monitoring::{
    CheckpointInput, DecisionAction, MonitoringEngine, MonitoringPlan, OverallProgress, PlanOptions,
    PlanStatus, TreatmentPlan,
};
use cropwatch_core::types::{ImageRef, MonitoringConfig};
use cropwatch_core::{fallback_diagnosis, Error, Result};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

struct ScriptedClient {
    replies: Mutex<VecDeque<Result<Completion>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    fn new(replies: Vec<Result<Completion>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::completion("no scripted reply left")))
    }
}

fn reply(action: &str, urgency: &str, progress: &str, adjustments: &[&str], token: Option<&str>) -> Result<Completion> {
    let text = json!({
        "analysis": {
            "overallProgress": progress,
            "symptomChanges": ["lesion margins"],
            "severityChange": if progress == "worsening" { 2 } else { -1 },
            "confidence": 0.7
        },
        "agentReasoning": format!("{} because progress is {}", action, progress),
        "planAdjustments": adjustments,
        "nextSteps": ["Photograph the same leaf"],
        "decision": {"action": action, "reasoning": "observed trend", "confidence": 75, "urgency": urgency}
    })
    .to_string();
    Ok(Completion {
        text: format!("```json\n{}\n```", text),
        continuity_token: token.map(str::to_string),
    })
}

fn new_plan(engine: &MonitoringEngine) -> MonitoringPlan {
    engine.create_plan(
        fallback_diagnosis(),
        PlanOptions {
            continuity_token: Some("resp_diag".into()),
            start_date: NaiveDate::from_ymd_opt(2026, 5, 1),
            ..Default::default()
        },
    )
}

fn photo(day: u32) -> ImageRef {
    ImageRef::url(format!("https://example.org/day{}.jpg", day))
}

#[tokio::test]
async fn test_critical_then_declared_success() {
    let client = ScriptedClient::new(vec![
        reply("escalate", "critical", "worsening", &["Switch to copper spray"], Some("resp_1")),
        reply("continue_plan", "high", "improving", &[], None),
        reply("declare_success", "low", "improving", &[], Some("resp_3")),
    ]);
    let engine = MonitoringEngine::new(client.clone(), MonitoringConfig::default());
    let plan = new_plan(&engine);

    let (cp, plan) = engine
        .submit_checkpoint(plan, CheckpointInput::new(3, photo(3)).with_notes("spots spreading"))
        .await
        .unwrap();
    assert_eq!(cp.decision.action, DecisionAction::Escalate);
    assert_eq!(cp.analysis.severity_change, 2);
    assert_eq!(cp.analysis.confidence, 70);
    assert_eq!(plan.current_status, PlanStatus::Critical);
    assert_eq!(plan.next_checkpoint_day, 4);

    let (_, plan) = engine
        .submit_checkpoint(plan, CheckpointInput::new(4, photo(4)))
        .await
        .unwrap();
    assert_eq!(plan.current_status, PlanStatus::Active);
    assert_eq!(plan.next_checkpoint_day, 6);

    let (_, plan) = engine
        .submit_checkpoint(plan, CheckpointInput::new(6, photo(6)))
        .await
        .unwrap();
    assert_eq!(plan.current_status, PlanStatus::Completed);
    assert_eq!(plan.checkpoints.len(), 3);
    assert_eq!(plan.continuity_token.as_deref(), Some("resp_3"));

    let statuses: Vec<(PlanStatus, PlanStatus)> =
        plan.status_history.iter().map(|c| (c.from, c.to)).collect();
    assert_eq!(
        statuses,
        vec![
            (PlanStatus::Active, PlanStatus::Critical),
            (PlanStatus::Critical, PlanStatus::Active),
            (PlanStatus::Active, PlanStatus::Completed),
        ]
    );
    assert_eq!(plan.adaptive_insights[0], "Day 3: Switch to copper spray");
    assert!(plan
        .adaptive_insights
        .iter()
        .any(|i| i.contains("2 consecutive checkpoints improving")));

    // token chain: diagnosis token, then the newest one seen
    let requests = client.requests();
    assert_eq!(requests[0].continuity_token.as_deref(), Some("resp_diag"));
    assert_eq!(requests[1].continuity_token.as_deref(), Some("resp_1"));
    assert_eq!(requests[2].continuity_token.as_deref(), Some("resp_1"));
    assert!(requests.iter().all(|r| r.response_shape == Some(ResponseShape::Checkpoint)));

    // later prompts carry earlier reasoning and adjustments
    assert!(requests[0].prompt.contains("Grower notes: spots spreading"));
    assert!(requests[1].prompt.contains("escalate because progress is worsening"));
    assert!(requests[2].prompt.contains("Switch to copper spray"));

    let err = engine
        .submit_checkpoint(plan, CheckpointInput::new(9, photo(9)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::StateTransition(_)));
    assert_eq!(client.requests().len(), 3);
}

#[tokio::test]
async fn test_failed_completion_keeps_plan_moving() {
    let client = ScriptedClient::new(vec![Err(Error::timeout("completion took too long"))]);
    let engine = MonitoringEngine::new(client, MonitoringConfig::default());
    let plan = new_plan(&engine);

    let (cp, plan) = engine
        .submit_checkpoint(plan, CheckpointInput::new(3, photo(3)))
        .await
        .unwrap();
    assert!(cp.fallback);
    assert_eq!(cp.analysis.overall_progress, OverallProgress::Stable);
    assert_eq!(plan.current_status, PlanStatus::Active);
    assert_eq!(plan.continuity_token.as_deref(), Some("resp_diag"));
    assert!(plan.adaptive_insights.is_empty());
}

#[tokio::test]
async fn test_plan_round_trips_through_json() {
    let client = ScriptedClient::new(vec![reply(
        "adjust_treatment",
        "medium",
        "stable",
        &["Add potassium bicarbonate"],
        None,
    )]);
    let engine = MonitoringEngine::new(client, MonitoringConfig::default());
    let explicit = TreatmentPlan {
        summary: "Custom schedule".into(),
        timeline: Vec::new(),
    };
    let plan = engine.create_plan(
        fallback_diagnosis(),
        PlanOptions {
            treatment_plan: Some(explicit.clone()),
            total_duration_days: Some(21),
            ..Default::default()
        },
    );
    assert_eq!(plan.initial_treatment_plan, explicit);

    let (_, plan) = engine
        .submit_checkpoint(plan, CheckpointInput::new(2, photo(2)).with_weather("humid, 28C"))
        .await
        .unwrap();

    let stored = serde_json::to_string(&plan).unwrap();
    let restored: MonitoringPlan = serde_json::from_str(&stored).unwrap();
    assert_eq!(restored, plan);

    let value = serde_json::to_value(&plan).unwrap();
    assert_eq!(value["currentStatus"], "active");
    assert_eq!(value["totalDurationDays"], 21);
    assert_eq!(value["checkpoints"][0]["decision"]["action"], "adjust_treatment");
    assert_eq!(value["checkpoints"][0]["weatherConditions"], "humid, 28C");
}
