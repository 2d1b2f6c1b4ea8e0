//! Analysis orchestrator - one diagnosis run from image to final record.
//!
//! ```text
//!   validate ─┬─▶ preprocessing (spawned, best-effort) ─────────────────────┐
//!             └─▶ completion ─▶ normalize ─▶ tools (fan-out) ─▶ gate ─┬─▶ join ─▶ response
//!                     │                                               │
//!                     └─ failure: abort preprocessing, fallback       └─ refine | audit note
//! ```
//!
//! Only input validation errors reach the caller. Every downstream failure is
//! recovered locally and reported through `StageStatus`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::gate::RefinementGate;
use super::prompt::{diagnosis_prompt, refinement_prompt};
use crate::completion::{CompletionClient, CompletionRequest, ResponseShape};
use crate::diagnosis::{fallback_diagnosis, NormalizedDiagnosis};
use crate::normalize;
use crate::preprocessing::{PreprocessingService, PreprocessingSummary};
use crate::tools::{ToolExecutor, ToolRegistry, ToolResult};
use crate::types::{Error, GeoLocation, ImageRef, PipelineConfig, RequestId, Result};

// =============================================================================
// Request / response
// =============================================================================

/// One diagnosis request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub image: Option<ImageRef>,
    #[serde(default)]
    pub location: Option<GeoLocation>,
    #[serde(default)]
    pub language: Option<String>,
    /// Falls back to `PipelineConfig::enable_preprocessing`.
    #[serde(default)]
    pub enable_preprocessing: Option<bool>,
    /// Falls back to `PipelineConfig::enable_tools`.
    #[serde(default)]
    pub enable_tools: Option<bool>,
}

impl AnalysisRequest {
    pub fn new(image: ImageRef) -> Self {
        Self {
            image: Some(image),
            ..Default::default()
        }
    }

    pub fn with_location(mut self, location: GeoLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_tools(mut self, enabled: bool) -> Self {
        self.enable_tools = Some(enabled);
        self
    }

    pub fn with_preprocessing(mut self, enabled: bool) -> Self {
        self.enable_preprocessing = Some(enabled);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Completed,
    #[default]
    Skipped,
    Failed,
}

/// Per-stage outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StageStatus {
    pub preprocessing: StageOutcome,
    pub completion: StageOutcome,
    pub normalization: StageOutcome,
    pub tools: StageOutcome,
    pub refinement: StageOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub request_id: RequestId,
    /// Always true for a returned response; failures before this point are errors.
    pub success: bool,
    pub demo_mode: bool,
    /// Whether a refinement pass replaced the diagnosis.
    pub refined: bool,
    pub diagnosis: NormalizedDiagnosis,
    pub preprocessing: Option<PreprocessingSummary>,
    pub tool_results: Vec<ToolResult>,
    pub stage_status: StageStatus,
    /// Latest token from the completion service, for seeding a monitoring plan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuity_token: Option<String>,
}

// =============================================================================
// Orchestrator
// =============================================================================

type PreprocessingHandle = JoinHandle<Result<Option<PreprocessingSummary>>>;

pub struct AnalysisOrchestrator {
    client: Arc<dyn CompletionClient>,
    preprocessor: Arc<dyn PreprocessingService>,
    executor: ToolExecutor,
    gate: RefinementGate,
    config: PipelineConfig,
}

impl std::fmt::Debug for AnalysisOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisOrchestrator")
            .field("executor", &self.executor)
            .field("gate", &self.gate)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AnalysisOrchestrator {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        preprocessor: Arc<dyn PreprocessingService>,
        registry: Arc<ToolRegistry>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            client,
            preprocessor,
            executor: ToolExecutor::new(registry, config.tool_timeout),
            gate: RefinementGate::new(config.refinement_threshold),
            config,
        }
    }

    pub fn gate(&self) -> &RefinementGate {
        &self.gate
    }

    /// Run the full pipeline for one request.
    ///
    /// Fails only with `Error::Input`, before any network call is made.
    #[instrument(skip_all, fields(request_id = tracing::field::Empty))]
    pub async fn run(&self, request: AnalysisRequest) -> Result<AnalysisResponse> {
        let request_id = RequestId::new();
        tracing::Span::current().record("request_id", request_id.as_str());
        let started = Instant::now();

        let image = validate(&request)?;
        let use_preprocessing = request
            .enable_preprocessing
            .unwrap_or(self.config.enable_preprocessing);
        let use_tools = request.enable_tools.unwrap_or(self.config.enable_tools);
        info!(image = %image.describe(), use_preprocessing, use_tools, "analysis_started");

        let mut stages = StageStatus::default();

        let preprocessing = use_preprocessing.then(|| {
            let preprocessor = Arc::clone(&self.preprocessor);
            let image = image.clone();
            tokio::spawn(async move { preprocessor.analyze(&image).await })
        });

        let prompt = diagnosis_prompt(
            request.location.as_ref(),
            request.language.as_deref(),
            use_tools.then(|| self.executor.registry()),
        );
        let primary = CompletionRequest::new(prompt)
            .with_image(image)
            .with_shape(ResponseShape::Diagnosis);

        let completion = match self.client.complete(primary).await {
            Ok(completion) => completion,
            Err(e) => {
                if let Some(handle) = preprocessing {
                    handle.abort();
                }
                warn!(error = %e, code = e.code(), "completion_failed_using_fallback");
                stages.completion = StageOutcome::Failed;
                return Ok(AnalysisResponse {
                    request_id,
                    success: true,
                    demo_mode: true,
                    refined: false,
                    diagnosis: fallback_diagnosis(),
                    preprocessing: None,
                    tool_results: Vec::new(),
                    stage_status: stages,
                    continuity_token: None,
                });
            }
        };
        stages.completion = StageOutcome::Completed;
        let mut continuity_token = completion.continuity_token;

        let mut diagnosis = match normalize::parse(&completion.text) {
            Ok(diagnosis) => {
                stages.normalization = StageOutcome::Completed;
                diagnosis
            }
            Err(e) => {
                warn!(error = %e, "normalization_failed_using_fallback");
                stages.normalization = StageOutcome::Failed;
                fallback_diagnosis()
            }
        };

        let calls = diagnosis.tool_calls();
        let tool_results = if use_tools && !calls.is_empty() {
            let results = self.executor.execute_all(calls).await;
            stages.tools = if results.iter().any(ToolResult::is_success) {
                StageOutcome::Completed
            } else {
                StageOutcome::Failed
            };
            results
        } else {
            Vec::new()
        };

        let mut refined = false;
        if self.gate.should_refine(&diagnosis, &tool_results) {
            info!(
                confidence = diagnosis.primary_confidence(),
                threshold = self.gate.threshold(),
                "refinement_started"
            );
            match self.refine(&diagnosis, &tool_results, continuity_token.clone()).await {
                Ok((refined_diagnosis, token)) => {
                    diagnosis = refined_diagnosis;
                    refined = true;
                    if token.is_some() {
                        continuity_token = token;
                    }
                    stages.refinement = StageOutcome::Completed;
                }
                Err(e) => {
                    warn!(error = %e, code = e.code(), "refinement_failed_keeping_diagnosis");
                    stages.refinement = StageOutcome::Failed;
                }
            }
        } else if !tool_results.is_empty() {
            append_audit_note(&mut diagnosis, &tool_results, self.gate.threshold());
            debug!("refinement_skipped_fast_path");
        }

        let preprocessing = match preprocessing {
            Some(handle) => {
                let (summary, outcome) =
                    join_preprocessing(handle, self.config.preprocessing_timeout).await;
                stages.preprocessing = outcome;
                summary
            }
            None => None,
        };

        info!(
            demo_mode = diagnosis.demo_mode,
            refined,
            tools = tool_results.len(),
            confidence = diagnosis.primary_confidence(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "analysis_completed"
        );

        Ok(AnalysisResponse {
            request_id,
            success: true,
            demo_mode: diagnosis.demo_mode,
            refined,
            diagnosis,
            preprocessing,
            tool_results,
            stage_status: stages,
            continuity_token,
        })
    }

    async fn refine(
        &self,
        diagnosis: &NormalizedDiagnosis,
        tool_results: &[ToolResult],
        continuity_token: Option<String>,
    ) -> Result<(NormalizedDiagnosis, Option<String>)> {
        let request = CompletionRequest::new(refinement_prompt(diagnosis, tool_results))
            .with_continuity_token(continuity_token)
            .with_shape(ResponseShape::Diagnosis);
        let completion = self.client.complete(request).await?;
        let refined = normalize::parse(&completion.text)
            .map_err(|e| Error::refinement_parse(e.to_string()))?;
        Ok((refined, completion.continuity_token))
    }
}

fn validate(request: &AnalysisRequest) -> Result<ImageRef> {
    let image = request
        .image
        .as_ref()
        .filter(|image| !image.is_empty())
        .ok_or_else(|| Error::input("an image is required"))?;
    if let Some(location) = &request.location {
        if !location.is_valid() {
            return Err(Error::input(format!(
                "location out of range: {}, {}",
                location.latitude, location.longitude
            )));
        }
    }
    Ok(image.clone())
}

/// Record which tools ran when the gate skips refinement.
fn append_audit_note(diagnosis: &mut NormalizedDiagnosis, tool_results: &[ToolResult], threshold: u8) {
    let mut names: Vec<&str> = Vec::new();
    for result in tool_results {
        if !names.contains(&result.tool_name.as_str()) {
            names.push(&result.tool_name);
        }
    }
    let note = format!(
        "[Tools consulted: {}. Confidence {}% is above the {}% refinement threshold; \
         diagnosis kept without a refinement pass.]",
        names.join(", "),
        diagnosis.primary_confidence(),
        threshold
    );
    if diagnosis.agentic_reasoning.is_empty() {
        diagnosis.agentic_reasoning = note;
    } else {
        diagnosis.agentic_reasoning.push_str("\n\n");
        diagnosis.agentic_reasoning.push_str(&note);
    }
}

/// Wait for the preprocessing task, abandoning it once `deadline` passes.
async fn join_preprocessing(
    mut handle: PreprocessingHandle,
    deadline: Duration,
) -> (Option<PreprocessingSummary>, StageOutcome) {
    let joined = match tokio::time::timeout(deadline, &mut handle).await {
        Ok(joined) => joined,
        Err(_) => {
            handle.abort();
            warn!(timeout_ms = deadline.as_millis() as u64, "preprocessing_timed_out");
            return (None, StageOutcome::Failed);
        }
    };
    match joined {
        Ok(Ok(summary)) => (summary, StageOutcome::Completed),
        Ok(Err(e)) => {
            warn!(error = %e, "preprocessing_failed");
            (None, StageOutcome::Failed)
        }
        Err(e) => {
            warn!(error = %e, "preprocessing_task_failed");
            (None, StageOutcome::Failed)
        }
    }
}
