use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mint_adapters::{build_client, HtmlContentFetcher, HtmlSourceCatalog, HttpClientConfig};
use mint_rewrite::{CredentialRotator, OpenRouterBackend, RewriteClientConfig};
use mint_store::PgArticleStore;
use mint_sync::{build_scheduler, load_source_registry, Pipeline, RunOutcome, SyncConfig};
use mint_web::AppState;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "mint-cli")]
#[command(about = "NewsMint command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one full pipeline pass and exit.
    Sync,
    /// Ensure the article schema exists and exit.
    Migrate,
    /// Run the scheduler and the JSON API (default).
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = SyncConfig::from_env();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Sync => {
            let (pipeline, _store) = build_runtime(&config).await?;
            match pipeline.try_run().await {
                RunOutcome::Completed(summary) => println!(
                    "sync complete: run_id={} discovered={} stored={} skipped={} failed={}",
                    summary.run_id,
                    summary.discovered,
                    summary.stored,
                    summary.skipped_existing,
                    summary.failed
                ),
                RunOutcome::AlreadyRunning => println!("sync skipped: run already in progress"),
            }
        }
        Commands::Migrate => {
            let store = PgArticleStore::connect(&config.database_url)
                .await
                .context("connecting to database")?;
            store.migrate().await.context("running schema migration")?;
            println!("schema ensured");
        }
        Commands::Serve => {
            let (pipeline, store) = build_runtime(&config).await?;

            // Initial pass at process start, off the serving path.
            let initial = pipeline.clone();
            tokio::spawn(async move {
                if let RunOutcome::Completed(summary) = initial.try_run().await {
                    info!(stored = summary.stored, "initial pipeline run finished");
                }
            });

            if config.scheduler_enabled {
                let scheduler = build_scheduler(pipeline.clone(), config.sync_interval).await?;
                scheduler.start().await.context("starting scheduler")?;
                info!(interval_secs = config.sync_interval.as_secs(), "scheduler started");
            } else {
                warn!("scheduler disabled; runs occur only via the trigger endpoint");
            }

            let port: u16 = std::env::var("MINT_WEB_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000);
            info!(port, "serving JSON API");
            mint_web::serve(AppState::new(store, pipeline), port).await?;
        }
    }

    Ok(())
}

async fn build_runtime(config: &SyncConfig) -> Result<(Arc<Pipeline>, Arc<PgArticleStore>)> {
    let store = Arc::new(
        PgArticleStore::connect(&config.database_url)
            .await
            .context("connecting to database")?,
    );
    store.migrate().await.context("running schema migration")?;

    let registry = load_source_registry(&config.sources_path).await?;
    info!(sources = registry.sources.len(), "source registry loaded");

    let client = build_client(&HttpClientConfig {
        timeout: Duration::from_secs(config.http_timeout_secs),
        user_agent: config.user_agent.clone(),
    })
    .context("building http client")?;
    let catalog = Arc::new(HtmlSourceCatalog::new(
        client.clone(),
        registry.sources.clone(),
    ));
    let fetcher = Arc::new(HtmlContentFetcher::new(client, registry.sources));

    if config.api_keys.is_empty() {
        warn!("OPENROUTER_API_KEYS is empty; every rewrite will fail");
    }
    let backend = Arc::new(
        OpenRouterBackend::new(RewriteClientConfig {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            timeout: mint_rewrite::GENERATION_TIMEOUT,
        })
        .context("building rewrite client")?,
    );
    let rewriter = Arc::new(CredentialRotator::new(backend, config.api_keys.clone()));

    let pipeline = Arc::new(Pipeline::new(catalog, fetcher, rewriter, store.clone()));
    Ok((pipeline, store))
}
