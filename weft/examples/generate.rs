//! Generate text through the service.
//!
//! ```text
//! GOOGLE_API_KEY=... cargo run --example generate -- google "Where is the Louvre?"
//! ```
//!
//! The first argument names the provider (`bedrock`, `google`, `openai`), the
//! rest is the prompt. With no arguments the default provider is probed and
//! its catalog listed.

use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use weft::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        )
        .init();

    let factory = Arc::new(default_factory(&settings));
    let service = GenerationService::builder(factory)
        .layer(RetryLayer::new().with_max_retries(2))
        .layer(LoggingLayer::new().with_slow_threshold(Duration::from_secs(20)))
        .finish();

    let mut args = std::env::args().skip(1);
    let Some(provider) = args.next() else {
        for (name, healthy) in service.health_check(None).await {
            println!("{name}: {}", if healthy { "healthy" } else { "unavailable" });
        }
        for (name, models) in service.list_models(None) {
            println!("{name}: {}", models.join(", "));
        }
        return Ok(());
    };

    let prompt: Vec<String> = args.collect();
    let prompt = if prompt.is_empty() {
        "Say hello in five words.".to_string()
    } else {
        prompt.join(" ")
    };

    let req = GenerationRequest::new(provider.as_str(), prompt)
        .with_max_tokens(512)
        .with_search(provider == "google");

    match service.generate(&req).await {
        Ok(resp) => {
            println!("{}", resp.text);
            if let Some(usage) = resp.usage {
                tracing::info!(
                    model = %resp.model,
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "done"
                );
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, recovery = ?e.recovery(), "generation failed");
            Err(e.into())
        }
    }
}
