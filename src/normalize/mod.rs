//! Response normalizer: raw completion text in, canonical records out.
//!
//! The only place that looks at model output. Parsing fails with
//! `Error::Parse` only when no extraction strategy finds a JSON object; a
//! sparse or partially malformed object still normalizes, with defaults
//! filling the gaps. Normalizing a serialized `NormalizedDiagnosis` returns
//! an equal record.

mod extract;
pub mod geometry;
mod repair;

pub use extract::Strategy;
pub use repair::PLANT_IDENTITY_OVERRIDE;

use tracing::debug;

use crate::diagnosis::NormalizedDiagnosis;
use crate::monitoring::CheckpointAssessment;
use crate::types::Result;

/// Normalize a diagnosis completion.
pub fn parse(raw: &str) -> Result<NormalizedDiagnosis> {
    let (obj, strategy) = extract::extract_object(raw)?;
    let diagnosis = repair::diagnosis_from_object(obj);
    debug!(
        ?strategy,
        diseases = diagnosis.diseases.len(),
        areas = diagnosis.highlighted_areas.len(),
        planned_tools = diagnosis.tool_calls_plan.len(),
        "diagnosis_normalized"
    );
    Ok(diagnosis)
}

/// Normalize a monitoring-checkpoint completion.
pub fn parse_checkpoint(raw: &str) -> Result<CheckpointAssessment> {
    let (obj, strategy) = extract::extract_object(raw)?;
    let assessment = repair::checkpoint_from_object(obj);
    debug!(
        ?strategy,
        action = ?assessment.decision.action,
        urgency = ?assessment.decision.urgency,
        "checkpoint_normalized"
    );
    Ok(assessment)
}

/// Which extraction strategy would succeed on `raw`, if any.
pub fn detect_strategy(raw: &str) -> Option<Strategy> {
    extract::extract_object(raw).ok().map(|(_, s)| s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::Strategy;
    use crate::diagnosis::fallback_diagnosis;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn sample() -> serde_json::Value {
        json!({
            "cropType": "Tomato",
            "diseases": [{"name": "Late Blight", "confidence": 0.82, "description": "Water-soaked lesions"}],
            "highlightedAreas": [
                {"label": "lesion", "severity": "severe", "center": {"x": 0.4, "y": 0.5}, "radius": 0.1, "visualCues": ["dark margin"]},
                {"label": "edge", "severity": "mild", "center": {"x": 0.04, "y": 0.5}, "radius": 0.1}
            ],
            "symptoms": ["dark lesions"],
            "severity": "High",
            "sustainabilityScore": 64,
            "agenticReasoning": "Lesion pattern matches Phytophthora.",
            "toolCallsPlan": [{"toolName": "weather_forecast", "parameters": {"latitude": 10.0, "longitude": 20.0}, "reasoning": "humidity"}]
        })
    }

    #[test]
    fn test_fenced_equals_direct() {
        let body = serde_json::to_string_pretty(&sample()).unwrap();
        let direct = parse(&body).unwrap();
        let fenced = parse(&format!("Analysis complete.\n```json\n{}\n```\nLet me know.", body)).unwrap();
        assert_eq!(direct, fenced);
    }

    #[test]
    fn test_prose_wrapped() {
        let body = sample().to_string();
        let wrapped = parse(&format!("Sure! {} That is all.", body)).unwrap();
        assert_eq!(wrapped, parse(&body).unwrap());
        assert_eq!(detect_strategy(&format!("Sure! {}", body)), Some(Strategy::BraceSpan));
    }

    #[test]
    fn test_normalization_rules_applied() {
        let d = parse(&sample().to_string()).unwrap();
        assert_eq!(d.diseases[0].confidence, 82);
        assert_eq!(d.highlighted_areas.len(), 1);
        assert_eq!(d.highlighted_areas[0].label, "lesion");
        assert_eq!(d.severity, crate::diagnosis::Severity::High);
    }

    #[test]
    fn test_idempotent() {
        let once = parse(&sample().to_string()).unwrap();
        let twice = parse(&serde_json::to_string(&once).unwrap()).unwrap();
        assert_eq!(once, twice);

        let fallback = fallback_diagnosis();
        assert_eq!(parse(&serde_json::to_string(&fallback).unwrap()).unwrap(), fallback);
    }

    #[test]
    fn test_sparse_object_is_not_an_error() {
        let d = parse("{}").unwrap();
        assert!(d.crop_type.is_empty());
        assert!(d.diseases.is_empty());
        assert_eq!(d.sustainability_score, 0);
    }

    #[test]
    fn test_unparsable_fails() {
        assert!(parse("I'm sorry, I can't help with that.").is_err());
        assert!(parse_checkpoint("no json here").is_err());
    }

    proptest! {
        #[test]
        fn prop_wrapped_json_parses_and_is_idempotent(
            crop in "[A-Za-z ]{0,20}",
            conf in 0u8..=100,
            prefix in "[a-zA-Z .,:!]{0,40}",
            fenced in any::<bool>(),
        ) {
            let body = json!({
                "cropType": crop,
                "diseases": [{"name": "Leaf Rust", "confidence": conf}]
            }).to_string();
            let raw = if fenced {
                format!("{}\n```json\n{}\n```", prefix, body)
            } else {
                format!("{} {}", prefix, body)
            };
            let once = parse(&raw).unwrap();
            prop_assert_eq!(&once, &parse(&body).unwrap());
            let again = parse(&serde_json::to_string(&once).unwrap()).unwrap();
            prop_assert_eq!(once, again);
        }

        #[test]
        fn prop_edge_areas_never_survive(
            x in prop_oneof![0.0f64..0.1, 0.9000001f64..=1.0],
            y in 0.0f64..=1.0,
            r in 0.01f64..=0.3,
        ) {
            let raw = json!({
                "highlightedAreas": [
                    {"label": "a", "center": {"x": x, "y": y}, "radius": r},
                    {"label": "b", "center": {"x": y, "y": x}, "radius": r}
                ]
            }).to_string();
            prop_assert!(parse(&raw).unwrap().highlighted_areas.is_empty());
        }
    }
}
