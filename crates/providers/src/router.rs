//! Backend and compiler selection from configuration.

use std::sync::Arc;
use std::time::Duration;

use dossier_config::AppConfig;
use dossier_core::error::BackendError;
use dossier_core::{DocumentCompiler, GenerationBackend, RetryPolicy};

use crate::compiler::{CommandCompiler, MarkdownCompiler};
use crate::openai_compat::OpenAiCompatBackend;
use crate::retry::RetryingBackend;

/// Transport-level retries for rate limits and 5xx responses.
const TRANSPORT_RETRIES: u32 = 4;

/// Build the configured generation backend, wrapped in transport retries.
///
/// Local endpoints (ollama, vllm, llama.cpp) do not need an API key; every
/// other provider does.
pub fn build_backend(config: &AppConfig) -> Result<Arc<dyn GenerationBackend>, BackendError> {
    let provider = config.backend.provider.as_str();
    let base_url = config
        .backend
        .base_url
        .clone()
        .unwrap_or_else(|| default_base_url(provider));

    let api_key = match (&config.api_key, is_local(provider)) {
        (Some(key), _) => key.clone(),
        (None, true) => provider.to_string(),
        (None, false) => {
            return Err(BackendError::NotConfigured(
                "No API key found. Set DOSSIER_API_KEY or OPENAI_API_KEY, or add api_key to config.toml".into(),
            ));
        }
    };

    let request_timeout = Duration::from_secs(config.backend.request_timeout_secs);
    let http = OpenAiCompatBackend::new(
        provider,
        base_url,
        api_key,
        &config.backend.model,
        request_timeout,
    )?
    .with_temperature(config.backend.temperature);

    let policy = RetryPolicy::new(
        TRANSPORT_RETRIES,
        Duration::from_millis(config.generation.backoff_base_ms),
        Duration::from_millis(config.generation.backoff_max_ms),
    );
    Ok(Arc::new(RetryingBackend::new(
        Arc::new(http),
        policy,
        request_timeout,
    )))
}

/// Build the configured document compiler. No command means markdown
/// passthrough.
pub fn build_compiler(config: &AppConfig) -> Arc<dyn DocumentCompiler> {
    match &config.compiler.command {
        Some(program) if !program.trim().is_empty() => Arc::new(CommandCompiler::new(
            program.clone(),
            config.compiler.args.clone(),
            config.compiler.output_extension.clone(),
            Duration::from_secs(config.compiler.timeout_secs),
        )),
        _ => Arc::new(MarkdownCompiler),
    }
}

fn is_local(provider: &str) -> bool {
    matches!(provider, "ollama" | "vllm" | "llamacpp" | "llama.cpp")
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => "https://api.openai.com/v1".into(),
    }
}
