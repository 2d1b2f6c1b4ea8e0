//! Cropwatch command-line entry point.
//!
//! `cropwatch diagnose --image leaf.jpg` runs the full pipeline against the
//! configured completion endpoint and prints the response as JSON.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cropwatch_core::completion::HttpCompletionClient;
use cropwatch_core::preprocessing::NoopPreprocessor;
use cropwatch_core::tools::ToolRegistry;
use cropwatch_core::types::{GeoLocation, ImageRef};
use cropwatch_core::{AnalysisOrchestrator, AnalysisRequest, Config, Error};

#[derive(Debug, Parser)]
#[command(name = "cropwatch", version, about = "Crop disease diagnosis")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true, env = "CROPWATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Diagnose a single crop photo
    Diagnose {
        /// Image file path, or an http(s)/data URL
        #[arg(long)]
        image: String,
        #[arg(long, allow_hyphen_values = true, requires = "lon")]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lon: Option<f64>,
        /// Language for free-text fields
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        no_tools: bool,
        #[arg(long)]
        no_preprocessing: bool,
    },
    /// List the built-in tools
    Tools,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    cropwatch_core::observability::init_tracing(&config.observability);

    let registry = Arc::new(ToolRegistry::with_builtin_tools());

    match cli.command {
        Command::Tools => {
            println!("{}", registry.generate_prompt());
        }
        Command::Diagnose {
            image,
            lat,
            lon,
            language,
            no_tools,
            no_preprocessing,
        } => {
            let client = Arc::new(HttpCompletionClient::from_config(&config.completion)?);
            let orchestrator = AnalysisOrchestrator::new(
                client,
                Arc::new(NoopPreprocessor),
                registry,
                config.pipeline.clone(),
            );

            let mut request = AnalysisRequest::new(load_image(&image).await?)
                .with_tools(!no_tools)
                .with_preprocessing(!no_preprocessing);
            if let (Some(latitude), Some(longitude)) = (lat, lon) {
                request = request.with_location(GeoLocation { latitude, longitude });
            }
            if let Some(language) = language {
                request = request.with_language(language);
            }

            let response = orchestrator.run(request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

async fn load_image(arg: &str) -> cropwatch_core::Result<ImageRef> {
    if ["http://", "https://", "data:"].iter().any(|p| arg.starts_with(p)) {
        return Ok(ImageRef::url(arg));
    }
    let path = Path::new(arg);
    let bytes = tokio::fs::read(path).await?;
    let mime = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("jpg" | "jpeg") => "image/jpeg",
        other => {
            return Err(Error::input(format!(
                "unsupported image type: {}",
                other.unwrap_or("none")
            )))
        }
    };
    Ok(ImageRef::inline(mime, &bytes))
}
