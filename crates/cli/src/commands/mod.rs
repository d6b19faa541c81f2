pub mod chat;
pub mod config_cmd;
pub mod doctor;
pub mod onboard;
pub mod preprocess;

use std::sync::Arc;
use medintake_agent::{AssistService, ConversationController, IntakeAgent, SummaryGenerator};
use medintake_config::AppConfig;
use medintake_core::event::EventBus;
use medintake_core::history::TurnStore;
use medintake_core::media::OcrEngine;
use medintake_memory::{FileTurnStore, InMemoryTurnStore};
use medintake_preprocess::{
    PlainTextExtractor, PreprocessSettings, Preprocessor, ScriptNormalizer, UnavailableOcr, VisionOcr,
};
use medintake_providers::build_from_config;
use medintake_tools::{JsonReportRenderer, default_registry};
use std::time::Duration;
use tracing::debug;

/// Everything a command needs, wired once from the config.
pub struct Runtime {
    pub config: AppConfig,
    pub agent: IntakeAgent,
    pub preprocessor: Preprocessor,
    pub assist: AssistService,
}

pub fn build_runtime(config: AppConfig) -> Result<Runtime, Box<dyn std::error::Error>> {
    let router = build_from_config(&config);
    let provider = router.default_provider().ok_or("No default provider configured")?;
    let timeout = Duration::from_secs(config.intake.model_timeout_secs);

    let renderer = Arc::new(JsonReportRenderer::new(&config.reports.output_dir, &config.reports.url_prefix));
    let tools = Arc::new(default_registry(renderer));

    let store: Arc<dyn TurnStore> = match config.history.backend.as_str() {
        "in_memory" => Arc::new(InMemoryTurnStore::new()),
        _ => Arc::new(FileTurnStore::new(config.history.resolved_path())),
    };

    let event_bus = Arc::new(EventBus::default());
    let controller = ConversationController::from_config(provider.clone(), tools, event_bus.clone(), &config);
    let summarizer = SummaryGenerator::new(provider.clone(), config.default_model.clone()).with_timeout(timeout);
    let agent = IntakeAgent::new(controller, summarizer, store, event_bus);

    let ocr: Arc<dyn OcrEngine> = match router.describer() {
        Some(describer) => Arc::new(VisionOcr::new(describer)),
        None => Arc::new(UnavailableOcr),
    };
    let mut preprocessor = Preprocessor::new(
        Arc::new(PlainTextExtractor),
        ocr,
        PreprocessSettings::from_config(&config.preprocess),
    );
    if let Some(describer) = router.describer() {
        preprocessor = preprocessor.with_describer(describer);
    }
    if let Some(transcriber) = router.transcriber() {
        preprocessor = preprocessor.with_transcriber(transcriber);
    }
    if config.preprocess.normalize_script {
        preprocessor = preprocessor.with_normalizer(ScriptNormalizer::new(provider.clone(), config.fast_model.clone()));
    }

    let assist = AssistService::new(provider, config.fast_model.clone()).with_timeout(timeout);

    debug!(
        provider = %config.default_provider,
        model = %config.default_model,
        history = %config.history.backend,
        vision = router.describer().is_some(),
        "Runtime ready"
    );

    Ok(Runtime {
        config,
        agent,
        preprocessor,
        assist,
    })
}

/// Print setup instructions when no key is available for a hosted provider.
pub fn require_api_key(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.has_api_key() || config.default_provider == "ollama" {
        return Ok(());
    }
    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    MEDINTAKE_API_KEY=...   (generic)");
    eprintln!("    GROQ_API_KEY=gsk_...    (Groq, the default provider)");
    eprintln!("    OPENAI_API_KEY=sk-...   (OpenAI direct)");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_path().display());
    eprintln!();
    Err("No API key found. See above for setup instructions.".into())
}
