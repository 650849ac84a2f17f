//! CLI command implementations.
//!
//! Business logic for each research-core subcommand.

use crate::cli::output::{OutputFormat, format_consensus, format_research_summary, format_status};
use crate::cli::parser::{Cli, Commands};
use crate::error::{CommandError, Result};
use crate::research::backends::{BingBackend, ScrapingBackend, SearchBackend, SerpApiBackend, SerperBackend};
use crate::research::browser::fake::FakeBrowser;
use crate::research::config::{ResearchSettings, SearchBackendKind};
use crate::research::{ConsensusEngine, Executor, PageCache, PagePool, Planner, ProgressSink, RateLimiter, ResultCache, Router};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub async fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let db_path = cli.get_db_path();

    match &cli.command {
        Commands::Init { force } => cmd_init(&db_path, *force),
        Commands::Status => cmd_status(&db_path, format),
        Commands::Prune { days } => cmd_prune(&db_path, *days),
        Commands::Search { query } => cmd_search(query, format).await,
        Commands::Research { prompt, criteria, max_actions } => {
            cmd_research(&db_path, prompt, criteria, *max_actions, format).await
        }
    }
}

/// Settings for the research pipeline's own machinery (page pool sizing,
/// cache horizons) for commands that never touch a search backend. Forcing
/// `Playwright` sidesteps the default backend's API-key requirement — these
/// commands don't select a backend, so they shouldn't fail on one being
/// unconfigured.
fn ambient_settings() -> ResearchSettings {
    ResearchSettings::builder()
        .search_backend(SearchBackendKind::Playwright)
        .build()
        .expect("playwright backend needs no api key")
}

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_millis() as i64)
}

// ==================== Command Implementations ====================

fn cmd_init(db_path: &std::path::Path, force: bool) -> Result<String> {
    if db_path.exists() && !force {
        return Err(CommandError::ExecutionFailed(
            "Database already exists. Use --force to reinitialize.".to_string(),
        )
        .into());
    }

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| CommandError::ExecutionFailed(format!("Failed to create directory: {e}")))?;
    }

    if force && db_path.exists() {
        std::fs::remove_file(db_path)
            .map_err(|e| CommandError::ExecutionFailed(format!("Failed to remove existing database: {e}")))?;
    }

    let cache = PageCache::open(db_path, ambient_settings().cache_open_retries);
    if cache.is_unavailable() {
        return Err(CommandError::ExecutionFailed("page cache failed to open".to_string()).into());
    }

    Ok(format!("Initialized page cache at: {}\n", db_path.display()))
}

fn cmd_status(db_path: &std::path::Path, format: OutputFormat) -> Result<String> {
    let cache = PageCache::open(db_path, ambient_settings().cache_open_retries);
    Ok(format_status(&db_path.display().to_string(), cache.stats(), format))
}

fn cmd_prune(db_path: &std::path::Path, days: Option<i64>) -> Result<String> {
    let settings = ambient_settings();
    let horizon_days = days.unwrap_or(settings.prune_days);
    let cutoff_ms = now_ms() - horizon_days * 24 * 60 * 60 * 1000;

    let cache = PageCache::open(db_path, settings.cache_open_retries);
    if cache.is_unavailable() {
        return Err(CommandError::ExecutionFailed("page cache unavailable".to_string()).into());
    }
    cache.prune_older_than(cutoff_ms);

    Ok(format!("Pruned pages and searches older than {horizon_days} days.\n"))
}

/// Builds the consensus backend set from whatever API keys are configured in
/// the environment, in canonical priority order (Serper, `SerpApi`, Bing),
/// with a scraping fallback driven by a page pool always appended last.
fn configured_backends(limiter: Arc<RateLimiter>, pool: Arc<PagePool>) -> Vec<Arc<dyn SearchBackend>> {
    let mut backends: Vec<Arc<dyn SearchBackend>> = Vec::new();

    if let Ok(key) = std::env::var("SERPER_API_KEY") {
        backends.push(Arc::new(SerperBackend::new(key, limiter.clone())));
    }
    if let Ok(key) = std::env::var("SERPAPI_API_KEY") {
        backends.push(Arc::new(SerpApiBackend::new(key, limiter.clone())));
    }
    if let Ok(key) = std::env::var("BING_API_KEY") {
        backends.push(Arc::new(BingBackend::new(key, limiter)));
    }
    backends.push(Arc::new(ScrapingBackend::new(pool)));
    backends
}

async fn cmd_search(query: &str, format: OutputFormat) -> Result<String> {
    let settings = ambient_settings();
    let limiter = Arc::new(RateLimiter::new(
        settings.bucket_capacity,
        settings.refill_rate_per_sec,
        settings.max_queue_depth,
        settings.max_wait_ms,
    ));
    let browser: Arc<dyn crate::research::Browser> = Arc::new(FakeBrowser::new());
    let pool = Arc::new(PagePool::new(browser, settings.discovery_slots, settings.evidence_slots, settings.discovery_slots + settings.evidence_slots));
    let cache = Arc::new(ResultCache::new(settings.result_cache_capacity));

    let engine = ConsensusEngine::new(configured_backends(limiter, pool), cache);
    let result = engine.resolve(query).await?;

    Ok(format_consensus(query, &result, format))
}

async fn cmd_research(
    // The executor drives the page pool directly and doesn't persist through
    // the page cache; kept for a uniform command signature and future wiring.
    _db_path: &std::path::Path,
    prompt: &str,
    criteria: &[String],
    max_actions: Option<usize>,
    format: OutputFormat,
) -> Result<String> {
    let settings = ambient_settings();
    let browser: Arc<dyn crate::research::Browser> = Arc::new(FakeBrowser::new());
    let pool = Arc::new(PagePool::new(browser, settings.discovery_slots, settings.evidence_slots, settings.discovery_slots + settings.evidence_slots));

    let router_result = Router::classify(prompt);
    let success_criteria = if criteria.is_empty() { vec![prompt.to_string()] } else { criteria.to_vec() };
    let mut spec = Planner::plan(prompt, &router_result, success_criteria);
    if let Some(cap) = max_actions {
        spec.planned_actions.truncate(cap);
        spec.budget.max_actions = spec.budget.max_actions.min(cap);
    }

    let (progress, mut receiver) = ProgressSink::channel();
    let drain = tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            info!(phase = ?event.phase, message = %event.message, "research progress");
        }
    });

    let executor = Executor::new(pool, progress);
    let summary = executor.run(&spec).await;
    drop(executor);
    let _ = drain.await;

    Ok(format_research_summary(prompt, &summary, format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, std::path::PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        (temp_dir, db_path)
    }

    #[test]
    fn test_cmd_init() {
        let (_temp_dir, db_path) = setup();
        let result = cmd_init(&db_path, false);
        assert!(result.is_ok());
        assert!(db_path.exists());
    }

    #[test]
    fn test_cmd_init_already_exists() {
        let (_temp_dir, db_path) = setup();

        cmd_init(&db_path, false).unwrap();

        let result = cmd_init(&db_path, false);
        assert!(result.is_err());

        let result = cmd_init(&db_path, true);
        assert!(result.is_ok());
    }

    #[test]
    fn test_cmd_status_reports_empty_cache() {
        let (_temp_dir, db_path) = setup();
        cmd_init(&db_path, false).unwrap();

        let result = cmd_status(&db_path, OutputFormat::Text);
        assert!(result.is_ok());
        assert!(result.unwrap().contains("pages:    0"));
    }

    #[test]
    fn test_cmd_prune_runs_without_error() {
        let (_temp_dir, db_path) = setup();
        cmd_init(&db_path, false).unwrap();

        let result = cmd_prune(&db_path, Some(0));
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_cmd_research_runs_end_to_end_with_fake_browser() {
        let (_temp_dir, db_path) = setup();
        let result = cmd_research(&db_path, "best pesto recipe", &[], None, OutputFormat::Text).await;
        assert!(result.is_ok());
        assert!(result.unwrap().contains("Research: best pesto recipe"));
    }

    #[tokio::test]
    async fn test_cmd_search_falls_back_to_scraping_without_keys() {
        // SAFETY: tests in this module don't run in parallel with anything
        // that reads these vars; clearing them confirms search still works
        // via the scraping backend when no API key is configured.
        unsafe {
            std::env::remove_var("SERPER_API_KEY");
            std::env::remove_var("SERPAPI_API_KEY");
            std::env::remove_var("BING_API_KEY");
        }
        let result = cmd_search("rust async runtimes", OutputFormat::Text).await;
        assert!(result.is_ok());
    }
}
