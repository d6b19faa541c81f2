//! Document and media preprocessing for MedIntake.
//!
//! Turns an uploaded file or voice note into a labelled plain-text
//! context string the conversation controller can put in front of the
//! dialogue. Every public entry point returns a `String`: failures come
//! back as bracketed placeholders so the conversation can continue.

pub mod engines;

use medintake_config::PreprocessConfig;
use medintake_core::error::MediaError;
use medintake_core::media::{
    ArtifactKind, ImageDescriber, MediaArtifact, OcrEngine, TextExtractor, Transcriber, TranscriptionOptions,
};
use medintake_core::message::Turn;
use medintake_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;
use tracing::{debug, warn};

pub use engines::{PlainTextExtractor, UnavailableOcr, VisionOcr};

pub const OCR_NOT_INSTALLED: &str = "[System: OCR Module not installed]";
pub const OCR_NO_TEXT: &str = "[OCR: No readable text found]";
pub const NO_SPEECH: &str = "(No speech detected in audio)";
pub const AUDIO_MISSING: &str = "(Error: Audio file missing)";
pub const AUDIO_UNAVAILABLE: &str = "(Audio processing temporarily unavailable)";

const VISION_PROMPT: &str = "Analyze this medical image. Identify scan type, findings, and abnormalities.";

const SCRIPT_PROMPT: &str = "\
You are a translator. Convert the following Hindi/Indian language text into Hinglish (Roman Script) \
exactly as it sounds. Do not translate the meaning to English, just the script. \
Output ONLY the converted text.";

/// Thresholds and model settings.
#[derive(Debug, Clone)]
pub struct PreprocessSettings {
    /// PDFs with fewer extracted characters than this go through OCR
    pub min_text_chars: usize,
    pub max_context_chars: usize,
    pub transcription: TranscriptionOptions,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self::from_config(&PreprocessConfig::default())
    }
}

impl PreprocessSettings {
    pub fn from_config(config: &PreprocessConfig) -> Self {
        Self {
            min_text_chars: config.min_text_chars,
            max_context_chars: config.max_context_chars,
            transcription: TranscriptionOptions {
                model: config.transcription_model.clone(),
                prompt: Some(config.transcription_prompt.clone()).filter(|p| !p.trim().is_empty()),
                temperature: 0.0,
                language: config.transcription_language.clone(),
            },
        }
    }
}

/// Rewrites a transcript into roman script with a chat model.
pub struct ScriptNormalizer {
    provider: Arc<dyn Provider>,
    model: String,
}

impl ScriptNormalizer {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// The converted text, or the input unchanged on any failure.
    async fn normalize(&self, transcript: &str) -> String {
        let request = ProviderRequest::new(
            self.model.clone(),
            vec![Turn::system(SCRIPT_PROMPT), Turn::user(transcript)],
        )
        .with_temperature(0.1);

        match self.provider.complete(request).await {
            Ok(response) => {
                let converted = response.message.content.trim();
                if converted.is_empty() {
                    transcript.to_string()
                } else {
                    converted.to_string()
                }
            }
            Err(e) => {
                warn!(error = %e, "Script normalization failed, keeping raw transcript");
                transcript.to_string()
            }
        }
    }
}

/// Converts artifacts into context strings.
pub struct Preprocessor {
    extractor: Arc<dyn TextExtractor>,
    ocr: Arc<dyn OcrEngine>,
    describer: Option<Arc<dyn ImageDescriber>>,
    transcriber: Option<Arc<dyn Transcriber>>,
    normalizer: Option<ScriptNormalizer>,
    settings: PreprocessSettings,
}

impl Preprocessor {
    pub fn new(extractor: Arc<dyn TextExtractor>, ocr: Arc<dyn OcrEngine>, settings: PreprocessSettings) -> Self {
        Self {
            extractor,
            ocr,
            describer: None,
            transcriber: None,
            normalizer: None,
            settings,
        }
    }

    pub fn with_describer(mut self, describer: Arc<dyn ImageDescriber>) -> Self {
        self.describer = Some(describer);
        self
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn with_normalizer(mut self, normalizer: ScriptNormalizer) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    pub fn settings(&self) -> &PreprocessSettings {
        &self.settings
    }

    /// Context for any artifact. Audio is transcribed.
    pub async fn process(&self, artifact: &MediaArtifact) -> String {
        debug!(
            file = %artifact.file_name,
            mime = %artifact.mime_type,
            bytes = artifact.bytes.len(),
            "Preprocessing artifact"
        );
        match artifact.kind() {
            ArtifactKind::Pdf => self.pdf_context(artifact).await,
            ArtifactKind::Image => self.image_context(artifact).await,
            ArtifactKind::Audio => self.transcribe(artifact).await,
            ArtifactKind::Text => self.text_context(artifact).await,
            ArtifactKind::Other => format!("[SYSTEM: User uploaded file of type {}]", artifact.mime_type),
        }
    }

    async fn pdf_context(&self, artifact: &MediaArtifact) -> String {
        let raw = match self.extractor.extract_text(artifact).await {
            Ok(text) => text,
            Err(e) => {
                debug!(error = %e, "No PDF text layer, treating as scanned");
                String::new()
            }
        };

        if raw.trim().chars().count() < self.settings.min_text_chars {
            let ocr_text = self.ocr_text(artifact).await;
            format!(
                "[SYSTEM: Scanned PDF Content (via OCR)]:\n{}",
                self.truncate(&ocr_text)
            )
        } else {
            format!("[SYSTEM: PDF Content]:\n{}", self.truncate(&raw))
        }
    }

    async fn image_context(&self, artifact: &MediaArtifact) -> String {
        let ocr_text = self.ocr_text(artifact).await;
        let visual = match &self.describer {
            Some(describer) => match describer.describe_image(artifact, VISION_PROMPT).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Vision analysis failed");
                    format!("[Analysis Error: {e}]")
                }
            },
            None => "[System: Vision model not configured]".to_string(),
        };
        format!(
            "[SYSTEM: Visual Analysis]: {}\n\n[SYSTEM: OCR Text]: {}",
            self.truncate(&visual),
            self.truncate(&ocr_text)
        )
    }

    async fn text_context(&self, artifact: &MediaArtifact) -> String {
        match self.extractor.extract_text(artifact).await {
            Ok(text) => format!("[SYSTEM: Text Document]:\n{}", self.truncate(&text)),
            Err(e) => analysis_error(&e),
        }
    }

    /// OCR output, or a placeholder describing why there is none.
    async fn ocr_text(&self, artifact: &MediaArtifact) -> String {
        match self.ocr.ocr(artifact).await {
            Ok(text) if text.trim().is_empty() => OCR_NO_TEXT.to_string(),
            Ok(text) => text,
            Err(MediaError::Unavailable(_)) => OCR_NOT_INSTALLED.to_string(),
            Err(e) => {
                warn!(error = %e, "OCR failed");
                format!("[OCR Error: {e}]")
            }
        }
    }

    /// Transcript of a voice note, optionally converted to roman script.
    pub async fn transcribe(&self, artifact: &MediaArtifact) -> String {
        if artifact.bytes.is_empty() {
            return AUDIO_MISSING.to_string();
        }
        let Some(transcriber) = &self.transcriber else {
            warn!("No transcriber configured");
            return AUDIO_UNAVAILABLE.to_string();
        };

        let text = match transcriber.transcribe(artifact, &self.settings.transcription).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "Transcription failed");
                return AUDIO_UNAVAILABLE.to_string();
            }
        };

        if text.is_empty() {
            return NO_SPEECH.to_string();
        }

        match &self.normalizer {
            Some(normalizer) => normalizer.normalize(&text).await,
            None => text,
        }
    }

    /// Cut to `max_context_chars` characters.
    fn truncate(&self, text: &str) -> String {
        text.chars().take(self.settings.max_context_chars).collect()
    }
}

fn analysis_error(e: &MediaError) -> String {
    format!("[SYSTEM: Analysis Error: {e}]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use medintake_core::error::ProviderError;
    use medintake_core::provider::ProviderResponse;
    use std::sync::Mutex;

    struct FixedExtractor(Result<String, MediaError>);

    #[async_trait]
    impl TextExtractor for FixedExtractor {
        async fn extract_text(&self, _artifact: &MediaArtifact) -> Result<String, MediaError> {
            self.0.clone()
        }
    }

    struct FixedOcr(Result<String, MediaError>);

    #[async_trait]
    impl OcrEngine for FixedOcr {
        async fn ocr(&self, _artifact: &MediaArtifact) -> Result<String, MediaError> {
            self.0.clone()
        }
    }

    struct FixedDescriber(Result<String, MediaError>);

    #[async_trait]
    impl ImageDescriber for FixedDescriber {
        async fn describe_image(&self, _artifact: &MediaArtifact, _prompt: &str) -> Result<String, MediaError> {
            self.0.clone()
        }
    }

    struct FixedTranscriber {
        result: Result<String, MediaError>,
        seen: Mutex<Option<TranscriptionOptions>>,
    }

    #[async_trait]
    impl Transcriber for FixedTranscriber {
        async fn transcribe(&self, _artifact: &MediaArtifact, options: &TranscriptionOptions) -> Result<String, MediaError> {
            *self.seen.lock().unwrap() = Some(options.clone());
            self.result.clone()
        }
    }

    struct FixedProvider(Result<String, ProviderError>);

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.0.clone().map(|text| ProviderResponse {
                message: Turn::assistant(text),
                usage: None,
                model: "fixed".into(),
                metadata: serde_json::Map::new(),
            })
        }
    }

    fn preprocessor(extract: Result<String, MediaError>, ocr: Result<String, MediaError>) -> Preprocessor {
        Preprocessor::new(
            Arc::new(FixedExtractor(extract)),
            Arc::new(FixedOcr(ocr)),
            PreprocessSettings::default(),
        )
    }

    fn pdf() -> MediaArtifact {
        MediaArtifact::new("lab.pdf", "application/pdf", b"%PDF".to_vec())
    }

    fn audio() -> MediaArtifact {
        MediaArtifact::new("note.webm", "audio/webm", vec![1, 2, 3])
    }

    #[tokio::test]
    async fn real_pdf_text_layer_reaches_context() {
        let line = "Hemoglobin 13.5 g/dL, WBC 7.2, Platelets 250, all within reference range";
        let p = Preprocessor::new(
            Arc::new(PlainTextExtractor),
            Arc::new(VisionOcr::new(Arc::new(FixedDescriber(Ok("never".into()))))),
            PreprocessSettings::default(),
        );
        let artifact = MediaArtifact::new("cbc.pdf", "application/pdf", crate::engines::tests::text_pdf(line));

        let context = p.process(&artifact).await;

        assert!(context.starts_with("[SYSTEM: PDF Content]:\n"), "got {context:?}");
        assert!(context.contains("Hemoglobin 13.5"));
    }

    #[tokio::test]
    async fn scanned_pdf_without_rasterizer_says_ocr_missing() {
        let p = Preprocessor::new(
            Arc::new(PlainTextExtractor),
            Arc::new(VisionOcr::new(Arc::new(FixedDescriber(Ok("never".into()))))),
            PreprocessSettings::default(),
        );
        let artifact = MediaArtifact::new("scan.pdf", "application/pdf", crate::engines::tests::text_pdf(""));

        let context = p.process(&artifact).await;

        assert_eq!(context, format!("[SYSTEM: Scanned PDF Content (via OCR)]:\n{OCR_NOT_INSTALLED}"));
    }

    #[tokio::test]
    async fn digital_pdf_uses_text_layer() {
        let text = "Hemoglobin 13.5 g/dL, WBC 7.2, Platelets 250k, all within reference ranges.";
        let p = preprocessor(Ok(text.into()), Ok("never".into()));
        assert_eq!(p.process(&pdf()).await, format!("[SYSTEM: PDF Content]:\n{text}"));
    }

    #[tokio::test]
    async fn short_pdf_text_falls_back_to_ocr() {
        let p = preprocessor(Ok("  page 1 ".into()), Ok("TSH 6.1 mIU/L".into()));
        assert_eq!(
            p.process(&pdf()).await,
            "[SYSTEM: Scanned PDF Content (via OCR)]:\nTSH 6.1 mIU/L"
        );
    }

    #[tokio::test]
    async fn pdf_extraction_error_goes_to_ocr() {
        let p = preprocessor(Err(MediaError::Unsupported("pdf".into())), Err(MediaError::Unavailable("x".into())));
        assert_eq!(
            p.process(&pdf()).await,
            format!("[SYSTEM: Scanned PDF Content (via OCR)]:\n{OCR_NOT_INSTALLED}")
        );
    }

    #[tokio::test]
    async fn ocr_failure_is_labelled() {
        let p = preprocessor(Ok(String::new()), Err(MediaError::Failed("timeout".into())));
        let context = p.process(&pdf()).await;
        assert!(context.contains("[OCR Error: Media processing failed: timeout]"));
    }

    #[tokio::test]
    async fn pdf_content_truncated_on_char_boundary() {
        let long = "é".repeat(7000);
        let p = preprocessor(Ok(long), Ok(String::new()));
        let context = p.process(&pdf()).await;
        let body = context.strip_prefix("[SYSTEM: PDF Content]:\n").unwrap();
        assert_eq!(body.chars().count(), 6000);
    }

    #[tokio::test]
    async fn image_combines_vision_and_ocr() {
        let p = preprocessor(Ok(String::new()), Ok("R L".into()))
            .with_describer(Arc::new(FixedDescriber(Ok("Chest X-ray, no consolidation.".into()))));
        let image = MediaArtifact::new("xray.jpg", "image/jpeg", vec![0xFF]);
        assert_eq!(
            p.process(&image).await,
            "[SYSTEM: Visual Analysis]: Chest X-ray, no consolidation.\n\n[SYSTEM: OCR Text]: R L"
        );
    }

    #[tokio::test]
    async fn image_halves_degrade_independently() {
        let p = preprocessor(Ok(String::new()), Ok(String::new()))
            .with_describer(Arc::new(FixedDescriber(Err(MediaError::Failed("rate limited".into())))));
        let image = MediaArtifact::new("rash.png", "image/png", vec![1]);
        let context = p.process(&image).await;
        assert!(context.starts_with("[SYSTEM: Visual Analysis]: [Analysis Error: "));
        assert!(context.ends_with(&format!("[SYSTEM: OCR Text]: {OCR_NO_TEXT}")));
    }

    #[tokio::test]
    async fn text_documents_are_labelled() {
        let p = preprocessor(Ok("Allergic to penicillin".into()), Ok(String::new()));
        let doc = MediaArtifact::new("notes.txt", "text/plain", b"x".to_vec());
        assert_eq!(p.process(&doc).await, "[SYSTEM: Text Document]:\nAllergic to penicillin");
    }

    #[tokio::test]
    async fn text_extraction_error_is_analysis_error() {
        let p = preprocessor(Err(MediaError::Io("denied".into())), Ok(String::new()));
        let doc = MediaArtifact::new("notes.txt", "text/plain", b"x".to_vec());
        assert_eq!(p.process(&doc).await, "[SYSTEM: Analysis Error: I/O error: denied]");
    }

    #[tokio::test]
    async fn unknown_types_are_described() {
        let p = preprocessor(Ok(String::new()), Ok(String::new()));
        let zip = MediaArtifact::new("scans.zip", "application/zip", vec![1]);
        assert_eq!(p.process(&zip).await, "[SYSTEM: User uploaded file of type application/zip]");
    }

    #[tokio::test]
    async fn transcription_passes_configured_options() {
        let transcriber = Arc::new(FixedTranscriber {
            result: Ok("  mujhe do din se bukhar hai ".into()),
            seen: Mutex::new(None),
        });
        let p = preprocessor(Ok(String::new()), Ok(String::new())).with_transcriber(transcriber.clone());

        assert_eq!(p.process(&audio()).await, "mujhe do din se bukhar hai");
        let seen = transcriber.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.model, "whisper-large-v3");
        assert_eq!(seen.temperature, 0.0);
        assert!(seen.prompt.unwrap().contains("Medical consultation"));
    }

    #[tokio::test]
    async fn audio_placeholders() {
        let silent = Arc::new(FixedTranscriber { result: Ok("   ".into()), seen: Mutex::new(None) });
        let p = preprocessor(Ok(String::new()), Ok(String::new())).with_transcriber(silent);
        assert_eq!(p.transcribe(&audio()).await, NO_SPEECH);

        let empty = MediaArtifact::new("note.webm", "audio/webm", vec![]);
        assert_eq!(p.transcribe(&empty).await, AUDIO_MISSING);

        let failing = Arc::new(FixedTranscriber { result: Err(MediaError::Failed("503".into())), seen: Mutex::new(None) });
        let p = preprocessor(Ok(String::new()), Ok(String::new())).with_transcriber(failing);
        assert_eq!(p.transcribe(&audio()).await, AUDIO_UNAVAILABLE);

        let p = preprocessor(Ok(String::new()), Ok(String::new()));
        assert_eq!(p.transcribe(&audio()).await, AUDIO_UNAVAILABLE);
    }

    #[tokio::test]
    async fn normalizer_rewrites_transcript() {
        let transcriber = Arc::new(FixedTranscriber { result: Ok("मुझे बुखार है".into()), seen: Mutex::new(None) });
        let p = preprocessor(Ok(String::new()), Ok(String::new()))
            .with_transcriber(transcriber)
            .with_normalizer(ScriptNormalizer::new(Arc::new(FixedProvider(Ok(" mujhe bukhar hai ".into()))), "fast"));
        assert_eq!(p.transcribe(&audio()).await, "mujhe bukhar hai");
    }

    #[tokio::test]
    async fn normalizer_failure_keeps_raw_transcript() {
        let transcriber = Arc::new(FixedTranscriber { result: Ok("मुझे बुखार है".into()), seen: Mutex::new(None) });
        let p = preprocessor(Ok(String::new()), Ok(String::new()))
            .with_transcriber(transcriber)
            .with_normalizer(ScriptNormalizer::new(
                Arc::new(FixedProvider(Err(ProviderError::Timeout("slow".into())))),
                "fast",
            ));
        assert_eq!(p.transcribe(&audio()).await, "मुझे बुखार है");
    }
}
