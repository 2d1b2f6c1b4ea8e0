//! Best-effort image preprocessing.
//!
//! A preprocessing service looks for lesions independently of the reasoning
//! model. Its output is advisory: the orchestrator runs it concurrently with the
//! primary completion and quietly drops it on any failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::diagnosis::AreaSeverity;
use crate::types::{ImageRef, Result};

/// Axis-aligned box in normalized image coordinates, top-left anchored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn area(&self) -> f64 {
        (self.width * self.height).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesion {
    pub bbox: BoundingBox,
    /// 0..=100
    pub confidence: u8,
    pub severity: AreaSeverity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreprocessingSummary {
    pub lesions: Vec<Lesion>,
    pub lesion_count: usize,
    /// 0 (fully affected) ..= 100 (no visible lesions)
    pub overall_health: u8,
    pub method: String,
    pub processing_time_ms: u64,
}

impl PreprocessingSummary {
    /// Summarize detected lesions. Health drops with the severity-weighted
    /// share of the image the lesions cover.
    pub fn from_lesions(lesions: Vec<Lesion>, method: impl Into<String>, processing_time_ms: u64) -> Self {
        let affected: f64 = lesions
            .iter()
            .map(|l| {
                let weight = match l.severity {
                    AreaSeverity::Mild => 1.0,
                    AreaSeverity::Moderate => 2.0,
                    AreaSeverity::Severe => 3.0,
                };
                l.bbox.area() * weight
            })
            .sum();
        let overall_health = (100.0 - affected * 100.0).clamp(0.0, 100.0).round() as u8;

        Self {
            lesion_count: lesions.len(),
            lesions,
            overall_health,
            method: method.into(),
            processing_time_ms,
        }
    }
}

/// Image-analysis capability.
///
/// `Ok(None)` means the service ran but has nothing to report.
#[async_trait]
pub trait PreprocessingService: Send + Sync {
    async fn analyze(&self, image: &ImageRef) -> Result<Option<PreprocessingSummary>>;
}

/// Service that never reports anything; used when no detector is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPreprocessor;

#[async_trait]
impl PreprocessingService for NoopPreprocessor {
    async fn analyze(&self, _image: &ImageRef) -> Result<Option<PreprocessingSummary>> {
        Ok(None)
    }
}
