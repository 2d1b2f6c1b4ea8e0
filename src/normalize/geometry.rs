//! Highlighted-area geometry checks.
//!
//! Candidates that fail are dropped, never clamped: boxes hugging the image
//! border or covering most of the frame are almost always background or
//! framing artifacts rather than lesions.

use crate::diagnosis::{AreaSeverity, HighlightedArea, Point};

/// Minimum distance of an area's center from every image edge.
pub const EDGE_MARGIN: f64 = 0.1;
/// Largest accepted radius, in normalized image units.
pub const MAX_RADIUS: f64 = 0.3;
/// Largest accepted source bounding box, as a fraction of either image dimension.
pub const MAX_BOX_FRACTION: f64 = 0.5;

/// An area as read from the model, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaCandidate {
    pub label: String,
    pub severity: AreaSeverity,
    pub center: Point,
    pub radius: f64,
    /// Width/height of the legacy bounding box this candidate was converted from.
    pub box_extent: Option<(f64, f64)>,
    pub visual_cues: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NonFinite,
    CenterNearEdge,
    NonPositiveRadius,
    RadiusTooLarge,
    BoxTooLarge,
}

impl AreaCandidate {
    pub fn validate(self) -> Result<HighlightedArea, Rejection> {
        let Point { x, y } = self.center;
        if !(x.is_finite() && y.is_finite() && self.radius.is_finite()) {
            return Err(Rejection::NonFinite);
        }
        if !inside_margin(x) || !inside_margin(y) {
            return Err(Rejection::CenterNearEdge);
        }
        if self.radius <= 0.0 {
            return Err(Rejection::NonPositiveRadius);
        }
        if self.radius > MAX_RADIUS {
            return Err(Rejection::RadiusTooLarge);
        }
        if let Some((w, h)) = self.box_extent {
            if w > MAX_BOX_FRACTION || h > MAX_BOX_FRACTION {
                return Err(Rejection::BoxTooLarge);
            }
        }

        Ok(HighlightedArea {
            label: self.label,
            severity: self.severity,
            center: self.center,
            radius: self.radius,
            visual_cues: self.visual_cues,
        })
    }
}

fn inside_margin(v: f64) -> bool {
    (EDGE_MARGIN..=1.0 - EDGE_MARGIN).contains(&v)
}

/// Center and radius of a top-left anchored box.
pub fn box_to_circle(x: f64, y: f64, width: f64, height: f64) -> (Point, f64) {
    let center = Point {
        x: x + width / 2.0,
        y: y + height / 2.0,
    };
    (center, width.max(height) / 2.0)
}
