//! Canonical diagnosis records.
//!
//! Everything downstream of the normalizer works with these types; raw
//! completion text never leaves `crate::normalize`.

mod fallback;

pub use fallback::fallback_diagnosis;

use crate::tools::ToolCall;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Overall severity of the diagnosed condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
}

impl Severity {
    /// Lenient parse; unknown values map to `Medium`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "mild" | "minor" => Severity::Low,
            "high" | "severe" | "critical" => Severity::High,
            _ => Severity::Medium,
        }
    }
}

/// Severity of a single highlighted lesion area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AreaSeverity {
    Mild,
    #[default]
    Moderate,
    Severe,
}

impl AreaSeverity {
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "mild" | "low" | "minor" => AreaSeverity::Mild,
            "severe" | "high" | "critical" => AreaSeverity::Severe,
            _ => AreaSeverity::Moderate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disease {
    pub name: String,
    /// 0..=100
    pub confidence: u8,
    #[serde(default)]
    pub description: String,
}

/// Normalized image coordinate, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightedArea {
    pub label: String,
    pub severity: AreaSeverity,
    pub center: Point,
    pub radius: f64,
    #[serde(default)]
    pub visual_cues: Vec<String>,
}

/// A tool call the model wants made, with its stated reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedToolCall {
    pub tool_name: String,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub reasoning: String,
}

/// The canonical diagnosis record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedDiagnosis {
    pub crop_type: String,
    pub diseases: Vec<Disease>,
    pub highlighted_areas: Vec<HighlightedArea>,
    pub symptoms: Vec<String>,
    pub causes: Vec<String>,
    pub organic_treatments: Vec<String>,
    pub chemical_treatments: Vec<String>,
    pub prevention_tips: Vec<String>,
    pub severity: Severity,
    pub sustainability_score: u8,
    pub agentic_reasoning: String,
    pub tool_calls_plan: Vec<PlannedToolCall>,
    #[serde(default)]
    pub demo_mode: bool,
}

impl NormalizedDiagnosis {
    /// Highest-confidence disease, if any.
    pub fn primary_disease(&self) -> Option<&Disease> {
        self.diseases.iter().max_by_key(|d| d.confidence)
    }

    /// Confidence of the primary disease; 0 when nothing was identified.
    pub fn primary_confidence(&self) -> u8 {
        self.primary_disease().map_or(0, |d| d.confidence)
    }

    /// The tool plan as executable calls.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.tool_calls_plan
            .iter()
            .map(|p| ToolCall::new(p.tool_name.clone(), p.parameters.clone()))
            .collect()
    }
}

/// Map a model-reported confidence onto the 0..=100 integer scale.
///
/// Values strictly between 0 and 1 are ratios and get scaled. Rounding to an
/// integer means a second pass never sees a ratio again.
pub fn confidence_percent(raw: f64) -> u8 {
    if !raw.is_finite() {
        return 0;
    }
    let scaled = if raw > 0.0 && raw < 1.0 { raw * 100.0 } else { raw };
    scaled.clamp(0.0, 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_confidence_percent() {
        assert_eq!(confidence_percent(0.85), 85);
        assert_eq!(confidence_percent(85.0), 85);
        assert_eq!(confidence_percent(1.0), 1);
        assert_eq!(confidence_percent(140.0), 100);
        assert_eq!(confidence_percent(-3.0), 0);
        assert_eq!(confidence_percent(f64::NAN), 0);
        assert_eq!(confidence_percent(f64::from(confidence_percent(0.004))), 0);
    }

    #[test]
    fn test_primary_disease_is_highest_confidence() {
        let diagnosis = NormalizedDiagnosis {
            diseases: vec![
                Disease { name: "Septoria".into(), confidence: 40, description: String::new() },
                Disease { name: "Late Blight".into(), confidence: 78, description: String::new() },
            ],
            ..Default::default()
        };
        assert_eq!(diagnosis.primary_disease().unwrap().name, "Late Blight");
        assert_eq!(diagnosis.primary_confidence(), 78);
        assert_eq!(NormalizedDiagnosis::default().primary_confidence(), 0);
    }

    #[test]
    fn test_severity_lenient() {
        assert_eq!(Severity::parse_lenient("HIGH"), Severity::High);
        assert_eq!(Severity::parse_lenient("whatever"), Severity::Medium);
        assert_eq!(AreaSeverity::parse_lenient(" Mild "), AreaSeverity::Mild);
    }

    #[test]
    fn test_serializes_camel_case() {
        let diagnosis = NormalizedDiagnosis {
            crop_type: "Tomato".into(),
            tool_calls_plan: vec![PlannedToolCall {
                tool_name: "soil_requirements".into(),
                parameters: json!({"crop_type": "tomato"}),
                reasoning: "check pH".into(),
            }],
            ..Default::default()
        };
        let value = serde_json::to_value(&diagnosis).unwrap();
        assert_eq!(value["cropType"], "Tomato");
        assert_eq!(value["toolCallsPlan"][0]["toolName"], "soil_requirements");
        assert_eq!(value["demoMode"], false);
        assert_eq!(diagnosis.tool_calls()[0].tool_name, "soil_requirements");
    }
}
