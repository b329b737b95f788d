use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::load_config;
use crate::config::{ResolveOptions, resolve_config};
use crate::document::Document;
use crate::events::EventBus;
use crate::hardware::Detector;
use crate::language::{FallbackDetector, LlmLanguageDetector, validate_language};
use crate::models::{ModelRegistry, select_for_host};
use crate::orchestrator::{BookTranslator, OrchestratorOptions};
use crate::ratelimit::RateLimiter;
use crate::storage;
use crate::translator::{LlmBackend, ManagedTranslator, OpenAiCompatibleBackend};
use crate::ui::{ProgressReporter, Spinner, Style};

pub struct TranslateOptions {
    pub config: Option<PathBuf>,
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub to: Option<String>,
    pub from: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub session_id: Option<String>,
    pub no_strict: bool,
}

pub async fn run_translate(options: TranslateOptions) -> Result<()> {
    for lang in options.to.iter().chain(options.from.iter()) {
        validate_language(lang)?;
    }

    let config_file = load_config(options.config.as_deref())?;

    let mut resolve = ResolveOptions {
        to: options.to.clone(),
        from: options.from.clone(),
        provider: options.provider.clone(),
        model: options.model.clone(),
        strict: options.no_strict.then_some(false),
    };

    if resolve.model.is_none() && config_file.tomes.model.is_none() {
        let languages: Vec<&str> = [resolve.to.as_deref(), config_file.tomes.to.as_deref()]
            .into_iter()
            .flatten()
            .take(1)
            .chain(resolve.from.as_deref())
            .collect();

        let selection = Spinner::run("Detecting hardware...", || {
            select_for_host(
                &Detector::new(),
                ModelRegistry::default_catalog(),
                languages.as_slice(),
            )
        });

        let (_, model) = selection.context("No model configured and none fits this machine")?;
        crate::status!(
            "{} {} ({})",
            Style::label("Selected model:"),
            Style::value(&model.id),
            model.name
        );
        resolve.model = Some(model.id.clone());
    }

    let resolved = resolve_config(&resolve, &config_file)?;
    validate_language(&resolved.target_language)?;

    let mut document = Document::load(&options.input)
        .with_context(|| format!("Failed to load {}", options.input.display()))?;

    let storage = storage::open(&config_file.storage_with_defaults()?)
        .await
        .context("Failed to open storage")?;

    let cancel = CancellationToken::new();
    let limiter = Arc::new(RateLimiter::new(resolved.rate_limit.clone())?);
    let sweeper = limiter.spawn_sweeper(cancel.child_token());

    let backend: Arc<dyn LlmBackend> = Arc::new(OpenAiCompatibleBackend::new(
        &resolved.provider_name,
        &resolved.endpoint,
        resolved.api_key.clone(),
        &resolved.model,
    ));
    let translator = Arc::new(ManagedTranslator::new(
        Arc::clone(&backend),
        limiter,
        Arc::clone(&storage),
    ));
    let detector = FallbackDetector::new(Some(Arc::new(LlmLanguageDetector::new(backend))));

    let orchestrator = BookTranslator::new(
        translator,
        Arc::clone(&storage),
        OrchestratorOptions {
            strict: resolved.strict,
            source_language: resolved.source_language.clone(),
            target_language: resolved.target_language.clone(),
            provider: resolved.provider_name.clone(),
            model: resolved.model.clone(),
            input_file: options.input.display().to_string(),
            output_file: options
                .output
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        },
    )
    .with_detector(Arc::new(detector));

    let session_id = options
        .session_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    crate::status!(
        "{} {} → {} {}",
        Style::label("Translating"),
        document.metadata.title,
        Style::code(&resolved.target_language),
        Style::secondary(format!("(session {session_id})"))
    );

    let bus = EventBus::new();
    let reporter = ProgressReporter::spawn(&bus, &session_id);
    let result = orchestrator
        .translate_book(&cancel, &mut document, &bus, &session_id)
        .await;
    drop(bus);
    reporter.finish().await;

    cancel.cancel();
    if let Err(e) = sweeper.await {
        tracing::debug!(error = %e, "rate limiter sweeper ended abnormally");
    }
    storage.close().await?;

    result.with_context(|| format!("Translation failed (session {session_id})"))?;

    let json = document.to_json()?;
    match &options.output {
        Some(path) => {
            crate::fs::atomic_write(path, &json)?;
            crate::status!("{} {}", Style::success("Wrote"), path.display());
        }
        None => println!("{json}"),
    }

    let stats = orchestrator.stats();
    crate::status!(
        "{} {} translated, {} from cache, {} errors",
        Style::label("Done:"),
        stats.translated,
        stats.cached,
        stats.errors
    );
    if stats.cache_write_errors > 0 {
        crate::status!(
            "{} {} translations could not be cached",
            Style::warning("Warning:"),
            stats.cache_write_errors
        );
    }
    Ok(())
}
