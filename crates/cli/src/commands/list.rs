//! `dossier list`: sessions in the store.

use dossier_config::AppConfig;

use super::open_store;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let store = open_store(&config);

    let sessions = store.list_sessions()?;
    if sessions.is_empty() {
        println!("No sessions under {}", store.root().display());
        return Ok(());
    }

    println!("{} session(s) under {}\n", sessions.len(), store.root().display());
    for key in sessions {
        let index = store.read_index(&key)?;
        let status = store
            .read_state(&key)?
            .map(|s| s.status.as_str())
            .unwrap_or("not started");
        println!(
            "  {:<32} {:>3} artifacts  {:>7} words  {status}",
            key.to_string(),
            index.entries.len(),
            index.total_words()
        );
    }

    Ok(())
}
