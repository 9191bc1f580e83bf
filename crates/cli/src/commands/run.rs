//! `dossier run`: research a ticker and deliver a report.

use chrono::Utc;
use dossier_config::AppConfig;
use dossier_core::{ExpertiseLevel, SessionKey};
use dossier_pipeline::{PipelineSettings, ReportPipeline, ReportRequest};
use dossier_providers::{build_backend, build_compiler};

use super::open_store;

pub struct RunArgs {
    pub ticker: String,
    pub expertise: u8,
    pub session: Option<String>,
    pub skip_research: bool,
    pub json: bool,
}

pub async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let expertise = ExpertiseLevel::new(args.expertise)?;
    let session_id = args
        .session
        .unwrap_or_else(|| Utc::now().format("%Y%m%d-%H%M%S").to_string());
    let key = SessionKey::new(session_id, args.ticker)?;

    let backend = build_backend(&config)?;
    let compiler = build_compiler(&config);
    let settings = PipelineSettings::from_config(&config)?;
    let pipeline = ReportPipeline::new(open_store(&config), backend, compiler, settings);

    if !args.json {
        println!("Researching {} for a level-{expertise} reader ({})", key.ticker, expertise.depth_label());
        println!("  Session: {}", key.session_id);
    }

    let outcome = pipeline
        .run(ReportRequest {
            key,
            expertise,
            skip_research: args.skip_research,
        })
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!("\nReport: {}", outcome.report_path.display());
    if outcome.compiled {
        println!("Markdown: {}", outcome.markdown_path.display());
    }
    println!(
        "Research: {} completed, {} dropped, {} artifacts",
        outcome.research.completed().count(),
        outcome.research.dropped().count(),
        outcome.research.artifacts_written()
    );
    println!(
        "Tokens: {} of {} used",
        outcome.budget.used, outcome.budget.ceiling
    );
    if outcome.manifest.is_clean() {
        println!("Every section was generated in full.");
    } else {
        println!(
            "Degraded: {} incomplete, {} skipped, {} duplicate section(s). See the manifest at the end of the report.",
            outcome.manifest.placeholders.len(),
            outcome.manifest.skipped.len(),
            outcome.manifest.duplicates.len()
        );
    }
    for entry in &outcome.state.error_log {
        println!("  [{}] {}: {}", entry.at.format("%H:%M:%S"), entry.scope, entry.message);
    }

    Ok(())
}
