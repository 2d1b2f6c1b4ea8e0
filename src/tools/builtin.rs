//! Built-in agronomy lookup tools.
//!
//! All four are deterministic functions of their parameters over static
//! tables, so they can be shared freely across concurrent runs.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::catalog::{ParamDef, ParamType, Tool, ToolEntry};
use crate::types::{Error, Result};

pub fn all() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(WeatherForecast),
        Arc::new(DiseaseKnowledge),
        Arc::new(ResearchLookup),
        Arc::new(SoilRequirements),
    ]
}

fn str_param<'a>(params: &'a Value, name: &str) -> Result<&'a str> {
    params
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::tool(format!("'{}' must be a non-empty string", name)))
}

fn f64_param(params: &Value, name: &str) -> Result<f64> {
    params
        .get(name)
        .and_then(Value::as_f64)
        .ok_or_else(|| Error::tool(format!("'{}' must be a number", name)))
}

// =============================================================================
// weather_forecast
// =============================================================================

/// Synthetic climatological forecast. Stands in for a live weather feed while
/// keeping the tool pure: the same coordinates always give the same forecast.
#[derive(Debug)]
pub struct WeatherForecast;

const MAX_FORECAST_DAYS: i64 = 14;

#[async_trait]
impl Tool for WeatherForecast {
    fn entry(&self) -> ToolEntry {
        ToolEntry {
            name: "weather_forecast".to_string(),
            description: "Short-range temperature, humidity and rain outlook with fungal disease risk"
                .to_string(),
            parameters: vec![
                ParamDef::required("latitude", ParamType::Number, "Latitude in degrees"),
                ParamDef::required("longitude", ParamType::Number, "Longitude in degrees"),
                ParamDef::optional("days", ParamType::Int, "Forecast length (1-14)", Some(json!(5))),
            ],
        }
    }

    async fn invoke(&self, params: Value) -> Result<Value> {
        let lat = f64_param(&params, "latitude")?;
        let lon = f64_param(&params, "longitude")?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(Error::tool(format!("coordinates out of range: {}, {}", lat, lon)));
        }
        let days = params
            .get("days")
            .and_then(Value::as_i64)
            .unwrap_or(5)
            .clamp(1, MAX_FORECAST_DAYS);

        // Warmer toward the equator; a small coordinate-seeded wobble per day.
        let base_high = 32.0 - 0.35 * lat.abs();
        let seed = (lat.abs() * 13.0 + lon.abs() * 7.0) as i64;

        let mut risky_days = 0;
        let forecast: Vec<Value> = (0..days)
            .map(|day| {
                let wobble = ((seed + day * 11) % 5 - 2) as f64;
                let high = (base_high + wobble).round();
                let low = (high - 9.0).round();
                let humidity = 50 + (seed + day * 17) % 45;
                let rain_chance = (humidity - 40).clamp(0, 100);
                let favourable = humidity >= 80 && (15.0..=28.0).contains(&((high + low) / 2.0));
                if favourable {
                    risky_days += 1;
                }
                json!({
                    "day": day + 1,
                    "highC": high,
                    "lowC": low,
                    "humidityPercent": humidity,
                    "precipitationProbability": rain_chance,
                })
            })
            .collect();

        let fungal_risk = match risky_days {
            0 => "low",
            1 | 2 => "moderate",
            _ => "high",
        };

        Ok(json!({
            "location": {"latitude": lat, "longitude": lon},
            "forecast": forecast,
            "fungalRisk": fungal_risk,
            "source": "synthetic-climatology",
            "confidence": 55,
        }))
    }
}

// =============================================================================
// disease_knowledge
// =============================================================================

struct DiseaseFact {
    keys: &'static [&'static str],
    name: &'static str,
    pathogen: &'static str,
    hosts: &'static [&'static str],
    conditions: &'static str,
    management: &'static [&'static str],
}

const DISEASES: &[DiseaseFact] = &[
    DiseaseFact {
        keys: &["late blight", "phytophthora"],
        name: "Late blight",
        pathogen: "Phytophthora infestans (oomycete)",
        hosts: &["tomato", "potato"],
        conditions: "Cool (10-25°C), wet weather with prolonged leaf wetness",
        management: &[
            "Destroy infected plants and volunteer potatoes",
            "Protectant fungicides (chlorothalonil, mancozeb) before wet spells",
            "Plant resistant cultivars",
        ],
    },
    DiseaseFact {
        keys: &["early blight", "alternaria"],
        name: "Early blight",
        pathogen: "Alternaria solani (fungus)",
        hosts: &["tomato", "potato", "eggplant"],
        conditions: "Warm (24-29°C), humid weather; older leaves first",
        management: &[
            "Remove lower infected leaves",
            "Mulch and drip irrigate to limit splash",
            "Copper or chlorothalonil sprays at 7-10 day intervals",
        ],
    },
    DiseaseFact {
        keys: &["powdery mildew", "erysiphe", "podosphaera"],
        name: "Powdery mildew",
        pathogen: "Erysiphales (fungi)",
        hosts: &["cucumber", "squash", "grape", "wheat", "pea"],
        conditions: "Warm days, cool nights, high humidity without leaf wetness",
        management: &[
            "Improve air circulation",
            "Sulfur, potassium bicarbonate or neem oil",
            "Resistant varieties",
        ],
    },
    DiseaseFact {
        keys: &["downy mildew", "peronospora", "plasmopara"],
        name: "Downy mildew",
        pathogen: "Peronosporaceae (oomycetes)",
        hosts: &["grape", "cucumber", "lettuce", "basil"],
        conditions: "Cool, wet conditions with leaf wetness over 6 hours",
        management: &[
            "Avoid overhead irrigation",
            "Copper-based fungicides",
            "Remove infected leaves promptly",
        ],
    },
    DiseaseFact {
        keys: &["rust", "puccinia"],
        name: "Rust",
        pathogen: "Puccinia spp. (fungi)",
        hosts: &["wheat", "maize", "bean", "coffee"],
        conditions: "Moderate temperatures with dew or light rain",
        management: &[
            "Resistant cultivars",
            "Triazole fungicides at first pustules",
            "Remove alternate hosts",
        ],
    },
    DiseaseFact {
        keys: &["bacterial spot", "bacterial leaf spot", "xanthomonas"],
        name: "Bacterial leaf spot",
        pathogen: "Xanthomonas spp. (bacteria)",
        hosts: &["tomato", "pepper"],
        conditions: "Warm, wet weather; spread by splashing water and tools",
        management: &[
            "Use certified disease-free seed",
            "Copper sprays with mancozeb",
            "Avoid working plants when wet",
        ],
    },
    DiseaseFact {
        keys: &["septoria"],
        name: "Septoria leaf spot",
        pathogen: "Septoria lycopersici (fungus)",
        hosts: &["tomato"],
        conditions: "Moderate temperatures with frequent rain",
        management: &[
            "Remove infected lower leaves",
            "Three-year rotation",
            "Chlorothalonil or copper sprays",
        ],
    },
    DiseaseFact {
        keys: &["fusarium wilt", "fusarium"],
        name: "Fusarium wilt",
        pathogen: "Fusarium oxysporum (soil-borne fungus)",
        hosts: &["tomato", "banana", "cotton", "melon"],
        conditions: "Warm soils (27-32°C), acidic sandy soils",
        management: &[
            "Resistant rootstocks and varieties",
            "Raise soil pH toward 6.5-7.0",
            "Solarize beds; no effective curative sprays",
        ],
    },
];

#[derive(Debug)]
pub struct DiseaseKnowledge;

#[async_trait]
impl Tool for DiseaseKnowledge {
    fn entry(&self) -> ToolEntry {
        ToolEntry {
            name: "disease_knowledge".to_string(),
            description: "Pathogen, favourable conditions and management for a named crop disease"
                .to_string(),
            parameters: vec![
                ParamDef::required("disease_name", ParamType::String, "Disease or pathogen name"),
                ParamDef::optional("crop_type", ParamType::String, "Host crop", None),
            ],
        }
    }

    async fn invoke(&self, params: Value) -> Result<Value> {
        let query = str_param(&params, "disease_name")?.to_lowercase();
        let crop = params
            .get("crop_type")
            .and_then(Value::as_str)
            .map(|c| c.trim().to_lowercase());

        let Some(fact) = DISEASES
            .iter()
            .find(|d| d.keys.iter().any(|k| query.contains(k)))
        else {
            return Ok(json!({"found": false, "query": query, "confidence": 10}));
        };

        let host_match = crop
            .as_deref()
            .map(|c| fact.hosts.iter().any(|h| c.contains(h)));

        Ok(json!({
            "found": true,
            "name": fact.name,
            "pathogen": fact.pathogen,
            "hosts": fact.hosts,
            "favourableConditions": fact.conditions,
            "management": fact.management,
            "hostMatch": host_match,
            "confidence": if host_match == Some(false) { 50 } else { 85 },
        }))
    }
}

// =============================================================================
// research_lookup
// =============================================================================

struct Reference {
    title: &'static str,
    kind: &'static str,
    summary: &'static str,
    keywords: &'static [&'static str],
}

const REFERENCES: &[Reference] = &[
    Reference {
        title: "Integrated management of late blight in tomato and potato",
        kind: "extension guide",
        summary: "Forecast-driven protectant spraying combined with sanitation and resistant cultivars.",
        keywords: &["late blight", "phytophthora", "tomato", "potato", "fungicide"],
    },
    Reference {
        title: "Biological control of foliar fungal pathogens with Bacillus subtilis",
        kind: "review",
        summary: "Bacillus-based biofungicides reduce early blight and powdery mildew severity under moderate pressure.",
        keywords: &["biocontrol", "bacillus", "organic", "early blight", "powdery mildew"],
    },
    Reference {
        title: "Copper resistance in Xanthomonas populations",
        kind: "research article",
        summary: "Repeated copper use selects for resistant bacterial spot strains; rotate modes of action.",
        keywords: &["copper", "xanthomonas", "bacterial spot", "resistance", "pepper"],
    },
    Reference {
        title: "Leaf wetness duration and fungal infection risk models",
        kind: "research article",
        summary: "Infection risk scales with hours of leaf wetness within pathogen-specific temperature bands.",
        keywords: &["weather", "humidity", "leaf wetness", "risk", "forecast"],
    },
    Reference {
        title: "Wheat rust surveillance and fungicide timing",
        kind: "extension guide",
        summary: "Apply triazoles at first pustule detection on the flag leaf for best yield protection.",
        keywords: &["rust", "wheat", "puccinia", "triazole"],
    },
    Reference {
        title: "Crop rotation effects on soil-borne pathogen inoculum",
        kind: "review",
        summary: "Rotations of three or more years lower inoculum of Fusarium and Septoria in subsequent crops.",
        keywords: &["rotation", "fusarium", "septoria", "soil", "prevention"],
    },
];

#[derive(Debug)]
pub struct ResearchLookup;

#[async_trait]
impl Tool for ResearchLookup {
    fn entry(&self) -> ToolEntry {
        ToolEntry {
            name: "research_lookup".to_string(),
            description: "Find research and extension references relevant to a query".to_string(),
            parameters: vec![
                ParamDef::required("query", ParamType::String, "Keywords to search for"),
                ParamDef::optional("max_results", ParamType::Int, "Maximum references", Some(json!(3))),
            ],
        }
    }

    async fn invoke(&self, params: Value) -> Result<Value> {
        let query = str_param(&params, "query")?.to_lowercase();
        let limit = params
            .get("max_results")
            .and_then(Value::as_u64)
            .unwrap_or(3)
            .clamp(1, REFERENCES.len() as u64) as usize;

        let mut scored: Vec<(usize, &Reference)> = REFERENCES
            .iter()
            .map(|r| (r.keywords.iter().filter(|k| query.contains(*k)).count(), r))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let results: Vec<Value> = scored
            .iter()
            .take(limit)
            .map(|(score, r)| {
                json!({"title": r.title, "type": r.kind, "summary": r.summary, "matchedKeywords": score})
            })
            .collect();
        let confidence = if results.is_empty() { 10 } else { 70 };

        Ok(json!({"query": query, "results": results, "confidence": confidence}))
    }
}

// =============================================================================
// soil_requirements
// =============================================================================

struct SoilProfile {
    crop: &'static str,
    ph: (f64, f64),
    texture: &'static str,
    nutrients: &'static [&'static str],
    notes: &'static str,
}

const SOILS: &[SoilProfile] = &[
    SoilProfile {
        crop: "tomato",
        ph: (6.2, 6.8),
        texture: "well-drained loam",
        nutrients: &["calcium", "potassium", "phosphorus"],
        notes: "Calcium shortfall with uneven watering causes blossom-end rot.",
    },
    SoilProfile {
        crop: "potato",
        ph: (5.0, 6.0),
        texture: "loose sandy loam",
        nutrients: &["potassium", "phosphorus", "magnesium"],
        notes: "Lower pH suppresses common scab.",
    },
    SoilProfile {
        crop: "wheat",
        ph: (6.0, 7.0),
        texture: "loam to clay loam",
        nutrients: &["nitrogen", "phosphorus", "sulfur"],
        notes: "Excess nitrogen increases rust and mildew pressure.",
    },
    SoilProfile {
        crop: "maize",
        ph: (5.8, 7.0),
        texture: "deep well-drained loam",
        nutrients: &["nitrogen", "zinc", "potassium"],
        notes: "Zinc deficiency shows as white striping on young leaves.",
    },
    SoilProfile {
        crop: "rice",
        ph: (5.5, 6.5),
        texture: "clay or silty clay",
        nutrients: &["nitrogen", "silicon", "zinc"],
        notes: "Silicon strengthens resistance to blast.",
    },
    SoilProfile {
        crop: "grape",
        ph: (5.5, 6.5),
        texture: "well-drained gravelly loam",
        nutrients: &["potassium", "magnesium", "boron"],
        notes: "Avoid waterlogging; it favours root rots.",
    },
    SoilProfile {
        crop: "pepper",
        ph: (6.0, 6.8),
        texture: "sandy loam",
        nutrients: &["calcium", "potassium", "nitrogen"],
        notes: "Sensitive to salinity.",
    },
    SoilProfile {
        crop: "cucumber",
        ph: (6.0, 6.8),
        texture: "loose organic-rich loam",
        nutrients: &["nitrogen", "potassium", "magnesium"],
        notes: "Shallow roots need consistent moisture.",
    },
];

#[derive(Debug)]
pub struct SoilRequirements;

#[async_trait]
impl Tool for SoilRequirements {
    fn entry(&self) -> ToolEntry {
        ToolEntry {
            name: "soil_requirements".to_string(),
            description: "Preferred soil pH, texture and key nutrients for a crop".to_string(),
            parameters: vec![ParamDef::required("crop_type", ParamType::String, "Crop name")],
        }
    }

    async fn invoke(&self, params: Value) -> Result<Value> {
        let crop = str_param(&params, "crop_type")?.to_lowercase();
        match SOILS.iter().find(|s| crop.contains(s.crop)) {
            Some(profile) => Ok(json!({
                "found": true,
                "crop": profile.crop,
                "phRange": {"min": profile.ph.0, "max": profile.ph.1},
                "texture": profile.texture,
                "keyNutrients": profile.nutrients,
                "notes": profile.notes,
                "confidence": 80,
            })),
            None => Ok(json!({"found": false, "crop": crop, "confidence": 10})),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_weather_is_deterministic() {
        let params = json!({"latitude": 12.5, "longitude": 78.1, "days": 3});
        let a = WeatherForecast.invoke(params.clone()).await.unwrap();
        let b = WeatherForecast.invoke(params).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a["forecast"].as_array().unwrap().len(), 3);
        assert!(["low", "moderate", "high"].contains(&a["fungalRisk"].as_str().unwrap()));
    }

    #[tokio::test]
    async fn test_weather_rejects_bad_coordinates() {
        let err = WeatherForecast
            .invoke(json!({"latitude": 120.0, "longitude": 0.0}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[tokio::test]
    async fn test_disease_lookup() {
        let out = DiseaseKnowledge
            .invoke(json!({"disease_name": "Tomato Late Blight", "crop_type": "Tomato"}))
            .await
            .unwrap();
        assert_eq!(out["found"], true);
        assert_eq!(out["name"], "Late blight");
        assert_eq!(out["hostMatch"], true);

        let miss = DiseaseKnowledge
            .invoke(json!({"disease_name": "purple sparkle"}))
            .await
            .unwrap();
        assert_eq!(miss["found"], false);
    }

    #[tokio::test]
    async fn test_research_lookup_ranks_by_keyword_hits() {
        let out = ResearchLookup
            .invoke(json!({"query": "copper resistance in xanthomonas bacterial spot", "max_results": 2}))
            .await
            .unwrap();
        let results = out["results"].as_array().unwrap();
        assert!(!results.is_empty() && results.len() <= 2);
        assert_eq!(results[0]["title"], "Copper resistance in Xanthomonas populations");
    }

    #[tokio::test]
    async fn test_soil_requirements() {
        let out = SoilRequirements
            .invoke(json!({"crop_type": "Roma tomato"}))
            .await
            .unwrap();
        assert_eq!(out["phRange"]["min"], 6.2);
        assert!(SoilRequirements.invoke(json!({"crop_type": ""})).await.is_err());
    }
}
