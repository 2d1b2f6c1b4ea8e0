use super::{AreaSeverity, Disease, HighlightedArea, NormalizedDiagnosis, Point, Severity};

/// The deterministic diagnosis used whenever the completion service cannot
/// produce a usable answer (auth/quota failure, transport failure, or a
/// response no extraction strategy could parse).
///
/// Always tagged `demo_mode = true` and never carries a tool plan, so the
/// pipeline skips tools and refinement when it is substituted.
pub fn fallback_diagnosis() -> NormalizedDiagnosis {
    NormalizedDiagnosis {
        crop_type: "Tomato".to_string(),
        diseases: vec![Disease {
            name: "Early Blight (Alternaria solani)".to_string(),
            confidence: 75,
            description: "Sample result: the live analysis service is unavailable. \
                          Concentric dark lesions with yellow halos on lower leaves are \
                          typical of early blight."
                .to_string(),
        }],
        highlighted_areas: vec![HighlightedArea {
            label: "Concentric leaf lesion".to_string(),
            severity: AreaSeverity::Moderate,
            center: Point { x: 0.45, y: 0.55 },
            radius: 0.12,
            visual_cues: vec![
                "target-like rings".to_string(),
                "yellow chlorotic halo".to_string(),
            ],
        }],
        symptoms: vec![
            "Brown lesions with concentric rings on older leaves".to_string(),
            "Yellowing around lesions".to_string(),
        ],
        causes: vec![
            "Fungal pathogen favoured by warm, humid weather".to_string(),
            "Splashing water spreading spores from infected debris".to_string(),
        ],
        organic_treatments: vec![
            "Remove and destroy affected lower leaves".to_string(),
            "Apply copper-based or Bacillus subtilis biofungicide".to_string(),
        ],
        chemical_treatments: vec![
            "Chlorothalonil or mancozeb on a 7-10 day interval, following label rates".to_string(),
        ],
        prevention_tips: vec![
            "Mulch to prevent soil splash".to_string(),
            "Water at the base of plants in the morning".to_string(),
            "Rotate away from solanaceous crops for two seasons".to_string(),
        ],
        severity: Severity::Medium,
        sustainability_score: 70,
        agentic_reasoning: "Demo mode: a sample diagnosis is shown because the analysis \
                            service could not be reached."
            .to_string(),
        tool_calls_plan: Vec::new(),
        demo_mode: true,
    }
}
