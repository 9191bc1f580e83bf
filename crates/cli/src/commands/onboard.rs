//! `dossier onboard`: first-time setup.

use dossier_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("Dossier: First-Time Setup");
    println!("=========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("  Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\n  Config already exists at: {}", config_path.display());
        println!("  Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    let store_root = AppConfig::default().store.root;
    println!("  Created config.toml at: {}", config_path.display());
    println!("\nNext steps:");
    println!("  1. Set api_key in {} or export DOSSIER_API_KEY", config_path.display());
    println!("  2. Optionally set [compiler] command (e.g. pandoc) for PDF output");
    println!("  3. Run: dossier run AAPL --expertise 5");
    println!("\nSessions will be stored under {}\n", store_root.display());

    Ok(())
}
