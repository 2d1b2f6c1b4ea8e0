//! Prompt builders for the diagnosis and refinement passes.

use std::fmt::Write as _;

use crate::diagnosis::NormalizedDiagnosis;
use crate::tools::{ToolRegistry, ToolResult};
use crate::types::GeoLocation;

const DIAGNOSIS_FORMAT: &str = r#"Respond with a single JSON object:
{
  "plantIdentification": {"name": string, "confidence": 0-100},
  "cropType": string,
  "diseases": [{"name": string, "confidence": 0-100, "description": string}],
  "highlightedAreas": [{
    "label": string, "severity": "mild|moderate|severe",
    "center": {"x": 0-1, "y": 0-1}, "radius": 0-0.3, "visualCues": [string]
  }],
  "symptoms": [string], "causes": [string],
  "organicTreatments": [string], "chemicalTreatments": [string], "preventionTips": [string],
  "severity": "low|medium|high",
  "sustainabilityScore": 0-100,
  "agenticReasoning": string,
  "toolCallsPlan": [{"toolName": string, "parameters": object, "reasoning": string}]
}
Coordinates are fractions of the image size measured from the top-left corner.
Only highlight clearly visible lesions away from the image border."#;

/// Prompt for the primary diagnosis completion.
pub fn diagnosis_prompt(
    location: Option<&GeoLocation>,
    language: Option<&str>,
    tools: Option<&ToolRegistry>,
) -> String {
    let mut out = String::from(
        "You are an agronomist diagnosing crop health from a single photo. \
         Identify the plant, any diseases or deficiencies, and mark affected regions.\n",
    );

    // Writing into a String cannot fail.
    if let Some(loc) = location {
        let _ = writeln!(
            out,
            "The photo was taken at latitude {:.4}, longitude {:.4}.",
            loc.latitude, loc.longitude
        );
    }
    if let Some(lang) = language.filter(|l| !l.trim().is_empty()) {
        let _ = writeln!(out, "Write all free-text fields in {}.", lang.trim());
    }

    if let Some(section) = tools.map(ToolRegistry::generate_prompt).filter(|s| !s.is_empty()) {
        out.push('\n');
        out.push_str(&section);
        out.push_str(
            "\nIf extra evidence would change your confidence, list the calls in toolCallsPlan; \
             otherwise leave it empty.\n",
        );
    }

    out.push('\n');
    out.push_str(DIAGNOSIS_FORMAT);
    out
}

/// Prompt for the refinement pass: the prior diagnosis plus every tool outcome.
pub fn refinement_prompt(diagnosis: &NormalizedDiagnosis, tool_results: &[ToolResult]) -> String {
    let mut out = String::from(
        "Refine your earlier diagnosis using the tool results below. \
         Keep what the evidence supports and revise confidences where it doesn't.\n\nEarlier diagnosis:\n",
    );
    let prior = serde_json::to_string_pretty(diagnosis).unwrap_or_default();
    out.push_str(&prior);

    out.push_str("\n\nTool results:\n");
    for result in tool_results {
        let status = if result.is_success() { "ok" } else { "failed" };
        let _ = writeln!(
            out,
            "- {} ({}) input={} output={}",
            result.tool_name, status, result.input, result.output
        );
    }

    out.push('\n');
    out.push_str(DIAGNOSIS_FORMAT);
    out
}
