//! Lenient field mapping and schema repair.
//!
//! Models drift between camelCase and snake_case, return numbers as strings,
//! and sometimes use older shapes (nested plant identity, quad bounding boxes).
//! Everything here maps those variations onto the canonical records and never
//! fails: absent or malformed fields become defaults.

use serde_json::{Map, Value};
use tracing::debug;

use super::geometry::{box_to_circle, AreaCandidate};
use crate::diagnosis::{
    confidence_percent, AreaSeverity, Disease, HighlightedArea, NormalizedDiagnosis,
    PlannedToolCall, Point, Severity,
};
use crate::monitoring::{
    CheckpointAssessment, Decision, DecisionAction, OverallProgress, ProgressAnalysis, Urgency,
};

/// Plant identity confidence above which it overrides `cropType`.
pub const PLANT_IDENTITY_OVERRIDE: u8 = 70;

/// Default radius for areas that give a center but no size.
const DEFAULT_RADIUS: f64 = 0.1;

type Object = Map<String, Value>;

// =============================================================================
// Field helpers
// =============================================================================

fn field<'a>(obj: &'a Object, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k)).filter(|v| !v.is_null())
}

fn text(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn number(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
}

/// Array of strings, array of objects with a text-ish field, or a single string.
fn text_list(v: Option<&Value>) -> Vec<String> {
    let item_text = |item: &Value| -> Option<String> {
        let s = match item {
            Value::Object(o) => text(field(o, &["name", "text", "description", "action", "title"])),
            other => text(Some(other)),
        };
        (!s.is_empty()).then_some(s)
    };

    match v {
        Some(Value::Array(items)) => items.iter().filter_map(item_text).collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

fn array<'a>(v: Option<&'a Value>) -> &'a [Value] {
    match v {
        Some(Value::Array(items)) => items,
        _ => &[],
    }
}

fn confidence(v: Option<&Value>) -> u8 {
    number(v).map_or(0, confidence_percent)
}

/// Coordinates reported on a 0..100 scale are brought back to 0..1.
fn unit(v: f64) -> f64 {
    if v > 1.0 {
        v / 100.0
    } else {
        v
    }
}

// =============================================================================
// Diagnosis
// =============================================================================

/// Some models wrap the record as `{"diagnosis": {...}}`.
fn unwrap_envelope(mut obj: Object) -> Object {
    let looks_canonical = ["cropType", "crop_type", "diseases"]
        .iter()
        .any(|k| obj.contains_key(*k));
    if !looks_canonical {
        if let Some(Value::Object(inner)) = obj.remove("diagnosis") {
            return inner;
        }
    }
    obj
}

pub fn diagnosis_from_object(obj: Object) -> NormalizedDiagnosis {
    let obj = unwrap_envelope(obj);

    let mut crop_type = text(field(&obj, &["cropType", "crop_type", "crop", "plantName"]));
    if let Some((name, conf)) = plant_identity(&obj) {
        if conf > PLANT_IDENTITY_OVERRIDE || crop_type.is_empty() {
            debug!(from = %crop_type, to = %name, confidence = conf, "crop type taken from plant identity");
            crop_type = name;
        }
    }

    let diseases = match field(&obj, &["diseases"]) {
        Some(v) => array(Some(v)).iter().filter_map(disease_from).collect(),
        None => field(&obj, &["disease"]).and_then(disease_from).into_iter().collect(),
    };

    let treatments = field(&obj, &["treatments"]).and_then(Value::as_object);
    let organic_treatments = match field(&obj, &["organicTreatments", "organic_treatments"]) {
        Some(v) => text_list(Some(v)),
        None => text_list(treatments.and_then(|t| field(t, &["organic"]))),
    };
    let chemical_treatments = match field(&obj, &["chemicalTreatments", "chemical_treatments"]) {
        Some(v) => text_list(Some(v)),
        None => text_list(treatments.and_then(|t| field(t, &["chemical"]))),
    };

    NormalizedDiagnosis {
        crop_type,
        diseases,
        highlighted_areas: highlighted_areas(&obj),
        symptoms: text_list(field(&obj, &["symptoms"])),
        causes: text_list(field(&obj, &["causes"])),
        organic_treatments,
        chemical_treatments,
        prevention_tips: text_list(field(&obj, &["preventionTips", "prevention_tips", "prevention"])),
        severity: field(&obj, &["severity"])
            .and_then(Value::as_str)
            .map(Severity::parse_lenient)
            .unwrap_or_default(),
        sustainability_score: confidence(field(&obj, &["sustainabilityScore", "sustainability_score"])),
        agentic_reasoning: text(field(&obj, &["agenticReasoning", "agentic_reasoning", "reasoning"])),
        tool_calls_plan: array(field(&obj, &["toolCallsPlan", "tool_calls_plan", "toolCalls"]))
            .iter()
            .filter_map(planned_tool_call)
            .collect(),
        demo_mode: field(&obj, &["demoMode", "demo_mode"])
            .and_then(Value::as_bool)
            .unwrap_or(false),
    }
}

fn plant_identity(obj: &Object) -> Option<(String, u8)> {
    let identity = field(
        obj,
        &["plantIdentification", "plantIdentity", "plant_identification", "plant_identity"],
    )?
    .as_object()?;
    let name = text(field(identity, &["name", "commonName", "common_name", "species", "cropType"]));
    if name.is_empty() {
        return None;
    }
    Some((name, confidence(field(identity, &["confidence"]))))
}

fn disease_from(v: &Value) -> Option<Disease> {
    let (name, confidence_value, description) = match v {
        Value::String(s) => (s.trim().to_string(), 0, String::new()),
        Value::Object(o) => (
            text(field(o, &["name", "diseaseName", "disease_name", "disease"])),
            confidence(field(o, &["confidence", "probability"])),
            text(field(o, &["description", "details"])),
        ),
        _ => return None,
    };
    if name.is_empty() {
        return None;
    }
    Some(Disease {
        name,
        confidence: confidence_value,
        description,
    })
}

fn highlighted_areas(obj: &Object) -> Vec<HighlightedArea> {
    let raw = array(field(obj, &["highlightedAreas", "highlighted_areas", "affectedAreas"]));
    let mut kept = Vec::with_capacity(raw.len());
    for item in raw {
        let Some(candidate) = item.as_object().and_then(area_candidate) else {
            debug!("dropping highlighted area without usable geometry");
            continue;
        };
        match candidate.validate() {
            Ok(area) => kept.push(area),
            Err(reason) => debug!(?reason, "dropping highlighted area"),
        }
    }
    kept
}

fn point(v: &Value) -> Option<Point> {
    match v {
        Value::Object(o) => Some(Point {
            x: unit(number(field(o, &["x"]))?),
            y: unit(number(field(o, &["y"]))?),
        }),
        Value::Array(a) if a.len() == 2 => Some(Point {
            x: unit(number(a.first())?),
            y: unit(number(a.get(1))?),
        }),
        _ => None,
    }
}

/// `{x, y, width, height}`, `{xMin, yMin, xMax, yMax}` or `[x, y, w, h]`.
fn legacy_box(v: &Value) -> Option<(f64, f64, f64, f64)> {
    let quad = match v {
        Value::Array(a) if a.len() == 4 => {
            let n: Vec<f64> = a.iter().filter_map(|x| number(Some(x))).collect();
            (n.len() == 4).then(|| (n[0], n[1], n[2], n[3]))?
        }
        Value::Object(o) => {
            if let (Some(x), Some(y), Some(w), Some(h)) = (
                number(field(o, &["x"])),
                number(field(o, &["y"])),
                number(field(o, &["width", "w"])),
                number(field(o, &["height", "h"])),
            ) {
                (x, y, w, h)
            } else {
                let x0 = number(field(o, &["xMin", "x_min", "x1"]))?;
                let y0 = number(field(o, &["yMin", "y_min", "y1"]))?;
                let x1 = number(field(o, &["xMax", "x_max", "x2"]))?;
                let y1 = number(field(o, &["yMax", "y_max", "y2"]))?;
                (x0, y0, x1 - x0, y1 - y0)
            }
        }
        _ => return None,
    };
    let (x, y, w, h) = quad;
    Some((unit(x), unit(y), unit(w), unit(h)))
}

fn area_candidate(o: &Object) -> Option<AreaCandidate> {
    let label = text(field(o, &["label", "name", "description"]));
    let severity = field(o, &["severity"])
        .and_then(Value::as_str)
        .map(AreaSeverity::parse_lenient)
        .unwrap_or_default();
    let visual_cues = text_list(field(o, &["visualCues", "visual_cues", "cues"]));

    let (center, radius, box_extent) = if let Some(c) = field(o, &["center"]).and_then(point) {
        let radius = number(field(o, &["radius"])).map_or(DEFAULT_RADIUS, unit);
        (c, radius, None)
    } else if let Some((x, y, w, h)) = field(o, &["boundingBox", "bounding_box", "bbox", "box"]).and_then(legacy_box) {
        let (c, r) = box_to_circle(x, y, w, h);
        (c, r, Some((w, h)))
    } else {
        let c = Point {
            x: unit(number(field(o, &["x"]))?),
            y: unit(number(field(o, &["y"]))?),
        };
        let radius = number(field(o, &["radius"])).map_or(DEFAULT_RADIUS, unit);
        (c, radius, None)
    };

    Some(AreaCandidate {
        label,
        severity,
        center,
        radius,
        box_extent,
        visual_cues,
    })
}

fn planned_tool_call(v: &Value) -> Option<PlannedToolCall> {
    let o = v.as_object()?;
    let tool_name = text(field(o, &["toolName", "tool_name", "tool", "name"]));
    if tool_name.is_empty() {
        return None;
    }
    let parameters = match field(o, &["parameters", "params", "arguments", "args"]) {
        Some(Value::String(s)) => serde_json::from_str(s).unwrap_or(Value::Object(Map::new())),
        Some(v @ Value::Object(_)) => v.clone(),
        _ => Value::Object(Map::new()),
    };
    Some(PlannedToolCall {
        tool_name,
        parameters,
        reasoning: text(field(o, &["reasoning", "reason", "why"])),
    })
}

// =============================================================================
// Checkpoint
// =============================================================================

pub fn checkpoint_from_object(obj: Object) -> CheckpointAssessment {
    let empty = Object::new();
    let analysis = field(&obj, &["analysis", "progressAnalysis"])
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let decision = field(&obj, &["decision", "agentDecision"])
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let severity_change = number(field(analysis, &["severityChange", "severity_change"]))
        .map_or(0, |v| v.round().clamp(-2.0, 2.0) as i8);

    CheckpointAssessment {
        analysis: ProgressAnalysis {
            overall_progress: field(analysis, &["overallProgress", "overall_progress", "progress"])
                .and_then(Value::as_str)
                .map(OverallProgress::parse_lenient)
                .unwrap_or_default(),
            symptom_changes: text_list(field(analysis, &["symptomChanges", "symptom_changes"])),
            new_symptoms: text_list(field(analysis, &["newSymptoms", "new_symptoms"])),
            resolved_symptoms: text_list(field(analysis, &["resolvedSymptoms", "resolved_symptoms"])),
            severity_change,
            confidence: confidence(field(analysis, &["confidence"])),
        },
        agent_reasoning: text(field(&obj, &["agentReasoning", "agent_reasoning", "reasoning"])),
        plan_adjustments: text_list(field(&obj, &["planAdjustments", "plan_adjustments", "adjustments"])),
        next_steps: text_list(field(&obj, &["nextSteps", "next_steps"])),
        decision: Decision {
            action: field(decision, &["action"])
                .and_then(Value::as_str)
                .map(DecisionAction::parse_lenient)
                .unwrap_or_default(),
            reasoning: text(field(decision, &["reasoning", "reason"])),
            confidence: confidence(field(decision, &["confidence"])),
            suggested_actions: text_list(field(decision, &["suggestedActions", "suggested_actions"])),
            urgency: field(decision, &["urgency"])
                .and_then(Value::as_str)
                .map(Urgency::parse_lenient)
                .unwrap_or_default(),
        },
    }
}
