//! `dossier doctor`: diagnose config and backend health.

use dossier_config::AppConfig;
use dossier_providers::{build_backend, build_compiler};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("Dossier Doctor");
    println!("==============\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  [warn] No config file, using defaults. Run `dossier onboard`");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  [ok]   Config valid");
            config
        }
        Err(e) => {
            println!("  [fail] Config invalid: {e}");
            println!("\n  1 blocking issue found.");
            return Ok(());
        }
    };

    if config.has_api_key() {
        println!("  [ok]   API key configured");
    } else {
        println!("  [warn] No API key. Set api_key or DOSSIER_API_KEY");
        issues += 1;
    }

    match build_backend(&config) {
        Ok(backend) => match backend.health_check().await {
            Ok(true) => println!("  [ok]   Backend {} reachable", backend.name()),
            Ok(false) => {
                println!("  [fail] Backend {} unhealthy", backend.name());
                issues += 1;
            }
            Err(e) => {
                println!("  [fail] Backend {}: {e}", backend.name());
                issues += 1;
            }
        },
        Err(e) => {
            println!("  [fail] Backend not usable: {e}");
            issues += 1;
        }
    }

    let compiler = build_compiler(&config);
    println!(
        "  [ok]   Compiler {} (.{} output)",
        compiler.name(),
        compiler.extension()
    );

    let root = &config.store.root;
    if root.exists() {
        println!("  [ok]   Store root {}", root.display());
    } else {
        println!("  [info] Store root {} will be created on first run", root.display());
    }

    println!();
    if issues == 0 {
        println!("  All checks passed.");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
