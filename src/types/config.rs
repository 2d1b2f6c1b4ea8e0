//! Configuration structures.
//!
//! Configuration is loaded from an optional JSON file and then overridden by
//! `CROPWATCH_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::{Error, Result};

/// Global configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Diagnosis pipeline configuration.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Monitoring engine configuration.
    #[serde(default)]
    pub monitoring: MonitoringConfig,

    /// Completion service configuration.
    #[serde(default)]
    pub completion: CompletionConfig,
}

impl Config {
    /// Load configuration from a JSON file. Missing sections fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an optional file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CROPWATCH_*` overrides. The lookup is injected so tests don't
    /// have to touch the process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CROPWATCH_COMPLETION_ENDPOINT") {
            self.completion.endpoint = v;
        }
        if let Some(v) = lookup("CROPWATCH_COMPLETION_MODEL") {
            self.completion.model = v;
        }
        if let Some(v) = lookup("CROPWATCH_TOOL_TIMEOUT") {
            self.pipeline.tool_timeout = humantime_serde::re::humantime::parse_duration(&v)
                .map_err(|e| Error::input(format!("CROPWATCH_TOOL_TIMEOUT: {}", e)))?;
        }
        if let Some(v) = lookup("CROPWATCH_PREPROCESSING_TIMEOUT") {
            self.pipeline.preprocessing_timeout = humantime_serde::re::humantime::parse_duration(&v)
                .map_err(|e| Error::input(format!("CROPWATCH_PREPROCESSING_TIMEOUT: {}", e)))?;
        }
        if let Some(v) = lookup("CROPWATCH_REFINEMENT_THRESHOLD") {
            self.pipeline.refinement_threshold = v
                .parse()
                .map_err(|e| Error::input(format!("CROPWATCH_REFINEMENT_THRESHOLD: {}", e)))?;
        }
        if let Some(v) = lookup("CROPWATCH_LOG_LEVEL") {
            self.observability.log_level = v;
        }
        Ok(())
    }

    /// Reject settings that would break pipeline invariants.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.refinement_threshold > 100 {
            return Err(Error::input(format!(
                "refinement_threshold must be 0..=100, got {}",
                self.pipeline.refinement_threshold
            )));
        }
        if self.pipeline.tool_timeout.is_zero() {
            return Err(Error::input("tool_timeout must be non-zero"));
        }
        if self.pipeline.preprocessing_timeout.is_zero() {
            return Err(Error::input("preprocessing_timeout must be non-zero"));
        }
        if self.monitoring.checkpoint_interval_days == 0 {
            return Err(Error::input("checkpoint_interval_days must be at least 1"));
        }
        if self.monitoring.default_duration_days == 0 {
            return Err(Error::input("default_duration_days must be at least 1"));
        }
        Ok(())
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Diagnosis pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Per-call tool timeout.
    #[serde(with = "humantime_serde")]
    pub tool_timeout: Duration,

    /// How long a finished pipeline waits on the preprocessing task before
    /// abandoning it.
    #[serde(with = "humantime_serde")]
    pub preprocessing_timeout: Duration,

    /// Refine when the primary disease confidence is at or below this value.
    pub refinement_threshold: u8,

    /// Default for requests that don't set `enable_preprocessing`.
    pub enable_preprocessing: bool,

    /// Default for requests that don't set `enable_tools`.
    pub enable_tools: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tool_timeout: Duration::from_secs(10),
            preprocessing_timeout: Duration::from_secs(15),
            refinement_threshold: 85,
            enable_preprocessing: true,
            enable_tools: true,
        }
    }
}

/// Monitoring engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Plan length when the caller doesn't specify one.
    pub default_duration_days: u32,

    /// Days between checkpoints at low/medium urgency.
    pub checkpoint_interval_days: u32,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            default_duration_days: 14,
            checkpoint_interval_days: 3,
        }
    }
}

/// Completion service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Base URL of the Responses-style API.
    pub endpoint: String,

    /// Model identifier sent with each request.
    pub model: String,

    /// Name of the environment variable holding the API key.
    pub api_key_env: String,

    /// Whole-request timeout.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "CROPWATCH_API_KEY".to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.refinement_threshold, 85);
        assert_eq!(config.pipeline.tool_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_from_file_partial_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"pipeline": {{"tool_timeout": "250ms", "refinement_threshold": 70}}}}"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.pipeline.tool_timeout, Duration::from_millis(250));
        assert_eq!(config.pipeline.refinement_threshold, 70);
        assert!(config.pipeline.enable_tools);
        assert_eq!(config.monitoring.checkpoint_interval_days, 3);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("CROPWATCH_COMPLETION_MODEL", "vision-large"),
            ("CROPWATCH_TOOL_TIMEOUT", "2s"),
            ("CROPWATCH_PREPROCESSING_TIMEOUT", "750ms"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.completion.model, "vision-large");
        assert_eq!(config.pipeline.tool_timeout, Duration::from_secs(2));
        assert_eq!(config.pipeline.preprocessing_timeout, Duration::from_millis(750));
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let mut config = Config::default();
        config.pipeline.refinement_threshold = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_preprocessing_timeout_rejected() {
        let mut config = Config::default();
        config.pipeline.preprocessing_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
