//! `medintake onboard` — First-time setup.

use medintake_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = AppConfig::config_path();

    println!("🩺 MedIntake — First-Time Setup");
    println!("===============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    let config = AppConfig::default();
    let history_dir = config.history.resolved_path();
    if !history_dir.exists() {
        std::fs::create_dir_all(&history_dir)?;
        println!("✅ Created session history directory: {}", history_dir.display());
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
        println!("\n📝 Next steps:");
        println!("   1. Set GROQ_API_KEY or add api_key to {}", config_path.display());
        println!("   2. Run: medintake doctor");
        println!("   3. Run: medintake chat\n");
    }

    println!("🎉 Setup complete! Run `medintake chat` to start an intake session.\n");

    Ok(())
}
