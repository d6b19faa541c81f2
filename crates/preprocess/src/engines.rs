//! Concrete text extraction and OCR collaborators.

use async_trait::async_trait;
use medintake_core::error::MediaError;
use medintake_core::media::{ArtifactKind, ImageDescriber, MediaArtifact, OcrEngine, TextExtractor};
use std::sync::Arc;

const OCR_PROMPT: &str = "\
Extract ALL visible text from this document image exactly as written, \
line by line. Keep numbers, units and reference ranges. \
Output ONLY the extracted text, with no commentary.";

/// Reads text-bearing artifacts without any model.
///
/// Plain text is decoded as UTF-8 (lossy). PDFs are read through their
/// text layer; a scanned PDF yields little or no text and the
/// preprocessor falls through to OCR.
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract_text(&self, artifact: &MediaArtifact) -> Result<String, MediaError> {
        match artifact.kind() {
            ArtifactKind::Text => Ok(sanitize(&String::from_utf8_lossy(&artifact.bytes))),
            ArtifactKind::Pdf => {
                let bytes = artifact.bytes.clone();
                let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
                    .await
                    .map_err(|e| MediaError::Failed(format!("PDF reader stopped: {e}")))?
                    .map_err(|e| MediaError::Failed(format!("PDF text layer: {e}")))?;
                Ok(sanitize(&text))
            }
            _ => Err(MediaError::Unsupported(artifact.mime_type.clone())),
        }
    }
}

/// OCR by asking a vision model to transcribe the image.
pub struct VisionOcr {
    describer: Arc<dyn ImageDescriber>,
}

impl VisionOcr {
    pub fn new(describer: Arc<dyn ImageDescriber>) -> Self {
        Self { describer }
    }
}

#[async_trait]
impl OcrEngine for VisionOcr {
    async fn ocr(&self, artifact: &MediaArtifact) -> Result<String, MediaError> {
        match artifact.kind() {
            ArtifactKind::Image => {}
            // Vision models take images only; pages would need rasterizing first.
            ArtifactKind::Pdf => return Err(MediaError::Unavailable("no PDF rasterizer for scanned pages".into())),
            _ => return Err(MediaError::Unsupported(artifact.mime_type.clone())),
        }
        let text = self.describer.describe_image(artifact, OCR_PROMPT).await?;
        Ok(sanitize(&text))
    }
}

/// Stand-in when no OCR backend is configured.
pub struct UnavailableOcr;

#[async_trait]
impl OcrEngine for UnavailableOcr {
    async fn ocr(&self, _artifact: &MediaArtifact) -> Result<String, MediaError> {
        Err(MediaError::Unavailable("no OCR engine configured".into()))
    }
}

/// Drop control characters and blank lines; trim each line.
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect::<String>()
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
