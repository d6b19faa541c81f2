//! Media collaborators used by the preprocessor.
//!
//! Each trait wraps one external capability (text extraction, OCR,
//! speech-to-text, image understanding). Implementations may fail; the
//! preprocessor turns every failure into placeholder text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::MediaError;

/// Broad artifact category, decided from the MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Pdf,
    Image,
    Audio,
    Text,
    Other,
}

/// An uploaded file held in memory.
#[derive(Clone)]
pub struct MediaArtifact {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for MediaArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaArtifact")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl MediaArtifact {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, guessing the MIME type from its extension.
    pub async fn from_path(path: &Path) -> Result<Self, MediaError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| MediaError::Io(format!("{}: {e}", path.display())))?;
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(file_name, mime_type, bytes))
    }

    pub fn kind(&self) -> ArtifactKind {
        let mime = self.mime_type.to_ascii_lowercase();
        if mime == "application/pdf" {
            ArtifactKind::Pdf
        } else if mime.starts_with("image/") {
            ArtifactKind::Image
        } else if mime.starts_with("audio/") {
            ArtifactKind::Audio
        } else if mime.starts_with("text/") {
            ArtifactKind::Text
        } else {
            ArtifactKind::Other
        }
    }
}

/// Settings for one transcription request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionOptions {
    pub model: String,
    /// Vocabulary hint passed to the speech model
    pub prompt: Option<String>,
    pub temperature: f32,
    /// ISO-639-1 code; `None` lets the model detect it
    pub language: Option<String>,
}

impl Default for TranscriptionOptions {
    fn default() -> Self {
        Self {
            model: "whisper-large-v3".into(),
            prompt: None,
            temperature: 0.0,
            language: None,
        }
    }
}

/// Pulls embedded text out of a document.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, artifact: &MediaArtifact) -> Result<String, MediaError>;
}

/// Optical character recognition over a scanned page or photo.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn ocr(&self, artifact: &MediaArtifact) -> Result<String, MediaError>;
}

/// Speech to text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, artifact: &MediaArtifact, options: &TranscriptionOptions) -> Result<String, MediaError>;
}

/// Free-form description of an image by a vision model.
#[async_trait]
pub trait ImageDescriber: Send + Sync {
    async fn describe_image(&self, artifact: &MediaArtifact, prompt: &str) -> Result<String, MediaError>;
}
