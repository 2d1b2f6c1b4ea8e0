//! Image references and request geolocation.

use base64::Engine;
use serde::{Deserialize, Serialize};

/// Reference to the photo under analysis.
///
/// Inline images are kept base64-encoded so that checkpoints holding them stay
/// plain JSON documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageRef {
    Url { url: String },
    Inline { mime_type: String, data: String },
}

impl ImageRef {
    pub fn url(url: impl Into<String>) -> Self {
        ImageRef::Url { url: url.into() }
    }

    pub fn inline(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        ImageRef::Inline {
            mime_type: mime_type.into(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    /// True when the reference carries nothing to analyze.
    pub fn is_empty(&self) -> bool {
        match self {
            ImageRef::Url { url } => url.trim().is_empty(),
            ImageRef::Inline { data, .. } => data.is_empty(),
        }
    }

    /// URL form accepted by completion APIs (`data:` URL for inline images).
    pub fn to_url(&self) -> String {
        match self {
            ImageRef::Url { url } => url.clone(),
            ImageRef::Inline { mime_type, data } => format!("data:{};base64,{}", mime_type, data),
        }
    }

    /// Short description for logs; never includes inline payloads.
    pub fn describe(&self) -> String {
        match self {
            ImageRef::Url { url } => url.clone(),
            ImageRef::Inline { mime_type, data } => {
                format!("inline {} ({} b64 chars)", mime_type, data.len())
            }
        }
    }
}

/// Where the photo was taken.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoLocation {
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}
