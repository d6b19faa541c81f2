//! `medintake config` — Configuration management commands.

use medintake_config::AppConfig;

const REDACTED: &str = "***";

/// A copy safe to print: every API key replaced.
fn redacted(config: &AppConfig) -> AppConfig {
    let mut config = config.clone();
    if config.api_key.is_some() {
        config.api_key = Some(REDACTED.into());
    }
    for provider in config.providers.values_mut() {
        if provider.api_key.is_some() {
            provider.api_key = Some(REDACTED.into());
        }
    }
    config
}

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();

            if !config.has_api_key() && config.default_provider != "ollama" {
                warnings.push("No API key set (set GROQ_API_KEY or MEDINTAKE_API_KEY)".to_string());
            }

            if config.preprocess.normalize_script && config.fast_model.trim().is_empty() {
                warnings.push("normalize_script is on but fast_model is empty".to_string());
            }

            if config.intake.history_token_budget < 500 {
                warnings.push(format!(
                    "history_token_budget of {} keeps very little of the conversation",
                    config.intake.history_token_budget
                ));
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Provider:    {}", config.default_provider);
            println!("   Model:       {}", config.default_model);
            println!("   Fast model:  {}", config.fast_model);
            println!("   History:     {} ({} turns)", config.history.backend, config.intake.history_window);
            println!("   Reports:     {}", config.reports.output_dir);
            println!("   Role:        {}", config.intake.default_role);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&redacted(&config))?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::config_path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        let path = AppConfig::config_path();
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn show_redacts_keys() {
        let mut config = AppConfig::default();
        config.api_key = Some("gsk_secret".into());
        config.providers.insert(
            "openai".into(),
            medintake_config::ProviderConfig {
                api_key: Some("sk-secret".into()),
                api_url: None,
                default_model: None,
            },
        );
        let text = toml::to_string_pretty(&redacted(&config)).unwrap();
        assert!(!text.contains("secret"));
        assert!(text.contains(REDACTED));
    }
}
