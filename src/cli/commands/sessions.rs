use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::load_config;
use crate::error::Error;
use crate::storage::{self, Storage, TranslationSession};
use crate::ui::Style;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Opens the storage backend named in the config file.
pub async fn open_storage(config_path: Option<&Path>) -> Result<Arc<dyn Storage>> {
    let config = load_config(config_path)?;
    let storage_config = config.storage_with_defaults()?;
    storage::open(&storage_config)
        .await
        .with_context(|| format!("Failed to open {:?} storage", storage_config.backend))
}

fn print_row(session: &TranslationSession) {
    println!(
        "  {} {:<12} {:>5.1}%  {} → {}  {}",
        Style::value(&session.id),
        Style::status(session.status),
        session.progress,
        Style::code(&session.source_language),
        Style::code(&session.target_language),
        session.title
    );
}

pub async fn list_sessions(config_path: Option<&Path>, limit: usize, offset: usize) -> Result<()> {
    let storage = open_storage(config_path).await?;
    let sessions = storage.list_sessions(limit, offset).await?;
    storage.close().await?;

    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    println!("{}\n", Style::header("Sessions"));
    for session in &sessions {
        print_row(session);
    }
    Ok(())
}

pub async fn show_session(config_path: Option<&Path>, id: &str) -> Result<()> {
    let storage = open_storage(config_path).await?;
    let session = storage.get_session(id).await?;
    storage.close().await?;

    let Some(s) = session else {
        return Err(Error::SessionNotFound(id.to_string()).into());
    };

    println!("{} {}", Style::header("Session"), Style::value(&s.id));
    println!("  {}     {}", Style::label("title"), s.title);
    println!("  {}    {}", Style::label("status"), Style::status(s.status));
    println!(
        "  {}  {} → {}",
        Style::label("language"),
        Style::code(&s.source_language),
        Style::code(&s.target_language)
    );
    println!("  {}     {} / {}", Style::label("model"), s.provider, s.model);
    println!("  {}  {:.1}%", Style::label("progress"), s.progress);
    println!(
        "  {}     {} done, {} failed, {} total",
        Style::label("items"),
        s.items_completed,
        s.items_failed,
        s.items_total
    );
    println!(
        "  {}   {}/{}",
        Style::label("chapter"),
        s.current_chapter,
        s.total_chapters
    );
    if !s.input_file.is_empty() {
        println!("  {}     {}", Style::label("input"), s.input_file);
    }
    if !s.output_file.is_empty() {
        println!("  {}    {}", Style::label("output"), s.output_file);
    }
    println!("  {}   {}", Style::label("started"), s.start_time.to_rfc3339());
    if let Some(duration) = s.duration() {
        println!(
            "  {}  {:.1}s",
            Style::label("duration"),
            duration.num_milliseconds() as f64 / 1000.0
        );
    }
    if let Some(message) = &s.error_message {
        println!("  {}     {}", Style::label("error"), Style::error(message));
    }
    Ok(())
}

pub async fn print_stats(config_path: Option<&Path>) -> Result<()> {
    let storage = open_storage(config_path).await?;
    let stats = storage.statistics().await?;
    storage.close().await?;

    println!("{}\n", Style::header("Statistics"));
    println!("  {}      {}", Style::label("sessions"), stats.total_sessions);
    println!("  {}     {}", Style::label("completed"), stats.completed_sessions);
    println!("  {}        {}", Style::label("failed"), stats.failed_sessions);
    println!("  {}   {}", Style::label("in progress"), stats.in_progress_sessions);
    println!("  {}  {}", Style::label("translations"), stats.total_translations);
    println!("  {}  {:.1}%", Style::label("cache hits ~"), stats.cache_hit_rate);
    println!(
        "  {}  {:.1}s",
        Style::label("avg duration"),
        stats.average_duration_secs
    );
    Ok(())
}

pub async fn cleanup(config_path: Option<&Path>, older_than_days: u64) -> Result<()> {
    let storage = open_storage(config_path).await?;
    let older_than = Duration::from_secs(older_than_days.saturating_mul(SECS_PER_DAY));
    let removed = storage.cleanup_old_cache(older_than).await?;
    storage.close().await?;

    crate::status!(
        "{} removed {removed} cached translations older than {older_than_days} days",
        Style::success("Cleanup:")
    );
    Ok(())
}
