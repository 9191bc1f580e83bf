//! `dossier status`: read persisted generation state.
//!
//! Works against a run in another process; state is read from
//! `meta/generation_state.json` in each session directory.

use dossier_config::AppConfig;
use dossier_core::SessionKey;

use super::open_store;

pub async fn run(session: String, ticker: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let store = open_store(&config);

    let keys = match ticker {
        Some(ticker) => vec![SessionKey::new(session.clone(), ticker)?],
        None => store.tickers_for(&session)?,
    };
    if keys.is_empty() {
        println!("No tickers found for session {session}");
        return Ok(());
    }

    for key in keys {
        match store.read_state(&key)? {
            Some(state) => {
                println!("{key}");
                println!("  Status:    {}", state.status.as_str());
                println!(
                    "  Sections:  {}/{} ({:.0}%)",
                    state.sections_completed,
                    state.total_sections,
                    state.percent_complete()
                );
                println!("  Context:   {} tokens", state.cumulative_context);
                println!("  Usage:     {} tokens", state.token_usage);
                println!("  Updated:   {}", state.updated_at.to_rfc3339());
                for entry in &state.error_log {
                    println!("  Error [{}] {}: {}", entry.at.to_rfc3339(), entry.scope, entry.message);
                }
            }
            None => println!("{key}: no generation state yet"),
        }
    }

    Ok(())
}
