//! Completion service seam.
//!
//! The vision/text reasoning model sits behind `CompletionClient`. Callers
//! construct a client and inject it; tests substitute fakes.

pub mod http;

pub use http::HttpCompletionClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{ImageRef, Result};

/// Which record shape the prompt asks the model to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    Diagnosis,
    Checkpoint,
}

/// One completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub image: Option<ImageRef>,
    /// Opaque token from a previous completion, forwarded verbatim.
    pub continuity_token: Option<String>,
    pub response_shape: Option<ResponseShape>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
            continuity_token: None,
            response_shape: None,
        }
    }

    pub fn with_image(mut self, image: ImageRef) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_continuity_token(mut self, token: Option<String>) -> Self {
        self.continuity_token = token;
        self
    }

    pub fn with_shape(mut self, shape: ResponseShape) -> Self {
        self.response_shape = Some(shape);
        self
    }
}

/// Raw completion output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub continuity_token: Option<String>,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            continuity_token: None,
        }
    }
}

/// Vision/text reasoning completion capability.
///
/// Implementations report credential or quota rejection as `Error::AuthQuota`
/// and every other failure as `Error::Completion` (or `Error::Timeout`).
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion>;
}
