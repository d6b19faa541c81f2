//! `medintake doctor` — Diagnose system health.

use medintake_config::AppConfig;
use medintake_providers::build_from_config;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 MedIntake Doctor — System Diagnostics");
    println!("========================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_path();
    if !config_path.exists() {
        println!("  ⚠️  No config file, using defaults — run `medintake onboard`");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  1 blocking issue found.");
            return Ok(());
        }
    };

    if config.has_api_key() || config.default_provider == "ollama" {
        println!("  ✅ API key configured for {}", config.default_provider);
    } else {
        println!("  ❌ No API key — set GROQ_API_KEY or add api_key to config.toml");
        issues += 1;
    }

    let history_dir = config.history.resolved_path();
    if config.history.backend == "in_memory" {
        println!("  ✅ Session history kept in memory (not persisted)");
    } else if history_dir.is_dir() {
        println!("  ✅ Session history directory: {}", history_dir.display());
    } else {
        println!("  ⚠️  No session history directory — run `medintake onboard`");
        issues += 1;
    }

    println!("  ✅ Reports written to {}", config.reports.output_dir);

    let router = build_from_config(&config);
    match router.default_provider() {
        Some(provider) => match provider.health_check().await {
            Ok(true) => println!("  ✅ Provider {} reachable", provider.name()),
            Ok(false) => {
                println!("  ❌ Provider {} rejected the request (check the API key)", provider.name());
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Provider {} unreachable: {e}", provider.name());
                issues += 1;
            }
        },
        None => {
            println!("  ❌ Unknown provider '{}'", config.default_provider);
            issues += 1;
        }
    }

    if router.transcriber().is_some() {
        println!("  ✅ Voice notes: {}", config.preprocess.transcription_model);
    } else {
        println!("  ⚠️  Voice notes unavailable for this provider");
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
