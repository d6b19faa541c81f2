//! `medintake preprocess` — Show the context text a file would add.

use std::path::Path;
use medintake_config::AppConfig;
use medintake_core::media::MediaArtifact;
use super::{build_runtime, require_api_key};

pub async fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    require_api_key(&config)?;
    let runtime = build_runtime(config)?;

    let artifact = MediaArtifact::from_path(path).await?;
    eprintln!("  {} ({}, {} bytes)", artifact.file_name, artifact.mime_type, artifact.bytes.len());

    let context = runtime.preprocessor.process(&artifact).await;
    println!("{context}");
    Ok(())
}
