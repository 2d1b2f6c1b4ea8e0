//! Checkpoint prompt assembly.

use std::fmt::Write as _;

use super::engine::CheckpointInput;
use super::types::MonitoringPlan;

const RESPONSE_FORMAT: &str = r#"Respond with a single JSON object:
{
  "analysis": {
    "overallProgress": "improving|stable|worsening|new_issues",
    "symptomChanges": [string], "newSymptoms": [string], "resolvedSymptoms": [string],
    "severityChange": integer from -2 (much better) to 2 (much worse),
    "confidence": 0-100
  },
  "agentReasoning": string,
  "planAdjustments": [string],
  "nextSteps": [string],
  "decision": {
    "action": "continue_plan|adjust_treatment|escalate|add_intervention|declare_success",
    "reasoning": string, "confidence": 0-100,
    "suggestedActions": [string],
    "urgency": "low|medium|high|critical"
  }
}"#;

/// Build the checkpoint prompt: the initial diagnosis and treatment timeline,
/// every prior checkpoint's reasoning and adjustments, and today's inputs.
pub fn checkpoint_prompt(plan: &MonitoringPlan, input: &CheckpointInput) -> String {
    let diagnosis = &plan.initial_diagnosis;
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(
        out,
        "You are monitoring a {} crop over a {}-day treatment plan (started {}). \
         Compare today's photo with the history below and decide how to proceed.",
        plan.crop_type, plan.total_duration_days, plan.start_date
    );

    out.push_str("\nInitial diagnosis:\n");
    for disease in &diagnosis.diseases {
        let _ = writeln!(out, "- {} ({}% confidence)", disease.name, disease.confidence);
    }
    if diagnosis.diseases.is_empty() {
        out.push_str("- no specific disease identified\n");
    }
    let _ = writeln!(out, "Severity: {:?}", diagnosis.severity);
    if !diagnosis.symptoms.is_empty() {
        let _ = writeln!(out, "Symptoms: {}", diagnosis.symptoms.join("; "));
    }

    let _ = writeln!(out, "\nTreatment plan: {}", plan.initial_treatment_plan.summary);
    for step in &plan.initial_treatment_plan.timeline {
        let _ = writeln!(out, "- day {} [{:?}]: {}", step.day, step.category, step.action);
    }

    if !plan.checkpoints.is_empty() {
        out.push_str("\nPrevious checkpoints:\n");
        for cp in &plan.checkpoints {
            let _ = writeln!(
                out,
                "- day {}: {:?}, severity change {}, decision {:?} ({:?} urgency). {}",
                cp.day,
                cp.analysis.overall_progress,
                cp.analysis.severity_change,
                cp.decision.action,
                cp.decision.urgency,
                cp.agent_reasoning
            );
            if !cp.plan_adjustments.is_empty() {
                let _ = writeln!(out, "  adjustments: {}", cp.plan_adjustments.join("; "));
            }
        }
    }

    let _ = writeln!(out, "\nToday is day {}. Current status: {:?}.", input.day, plan.current_status);
    if let Some(notes) = input.user_notes.as_deref().filter(|n| !n.trim().is_empty()) {
        let _ = writeln!(out, "Grower notes: {}", notes.trim());
    }
    if let Some(weather) = input.weather_conditions.as_deref().filter(|w| !w.trim().is_empty()) {
        let _ = writeln!(out, "Recent weather: {}", weather.trim());
    }

    out.push('\n');
    out.push_str(RESPONSE_FORMAT);
    out
}
