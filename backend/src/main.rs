//! WeatherGuard - Backend Server
//!
//! Runs the scheduled weather-risk pipeline and serves the operational
//! health and status endpoints.

use std::{sync::Arc, time::Duration};

use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use weatherguard_backend::{
    create_app,
    external::{OpenAiAlertFormatter, OpenWeatherClient},
    services::{
        AlertFormatter, BroadcastPublisher, LocalAttestationJournal, MemoryStore, PgStore,
        PipelineContext, ReadingStore, Scheduler, TemplateAlertFormatter,
    },
    AppState, Config,
};

const DEFAULT_LOG_FILTER: &str =
    "wg_server=debug,weatherguard_backend=debug,tower_http=debug,sqlx=warn";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::load()?;

    tracing::info!("Starting WeatherGuard Server");
    tracing::info!("Environment: {}", config.environment);

    let store = connect_store(&config).await?;

    let formatter: Arc<dyn AlertFormatter> = match non_empty(&config.alert_text.api_key) {
        Some(api_key) => {
            tracing::info!(model = %config.alert_text.model, "Alert text generated by chat completions");
            Arc::new(OpenAiAlertFormatter::new(
                api_key,
                config.alert_text.base_url.clone(),
                config.alert_text.model.clone(),
                Duration::from_secs(config.alert_text.timeout_secs),
            )?)
        }
        None => {
            tracing::info!("No alert text API key, using templates");
            Arc::new(TemplateAlertFormatter)
        }
    };

    let mut ctx = PipelineContext::new(
        config.scheduler.clone(),
        &config.engine,
        store.clone(),
        Arc::new(BroadcastPublisher::default()),
        formatter,
    );

    match non_empty(&config.weather_api.api_key) {
        Some(api_key) => {
            let client = OpenWeatherClient::new(
                api_key,
                config.weather_api.base_url.clone(),
                Duration::from_secs(config.weather_api.timeout_secs),
            )?;
            ctx = ctx.with_source(Arc::new(client));
        }
        None => tracing::warn!("No weather API key configured, collection will be skipped"),
    }

    if config.attestation.enabled {
        let journal = LocalAttestationJournal::new(
            config.attestation.signing_key.clone(),
            config.attestation.journal_capacity,
        );
        ctx = ctx.with_attestation(Arc::new(journal));
    }

    tracing::info!(
        locations = config.scheduler.locations.len(),
        "Starting scheduler"
    );
    let scheduler = Scheduler::new(ctx).start();

    let state = AppState {
        store,
        scheduler: scheduler.shared_status(),
        config: Arc::new(config.clone()),
    };
    let app = create_app(state);

    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(scheduler.token()))
        .await?;

    let status = scheduler.shutdown().await;
    if let Some(error) = status.fatal_error {
        anyhow::bail!("Scheduler stopped after a fatal error: {}", error);
    }

    Ok(())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json = std::env::var("WG_LOG_FORMAT").is_ok_and(|format| format == "json");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// PostgreSQL when a URL is configured, otherwise the in-memory store
async fn connect_store(config: &Config) -> anyhow::Result<Arc<dyn ReadingStore>> {
    let Some(url) = non_empty(&config.database.url) else {
        tracing::warn!(
            history = config.database.memory_history,
            "No database configured, using in-memory store"
        );
        return Ok(Arc::new(MemoryStore::new(config.database.memory_history)));
    };

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&url)
        .await?;

    tracing::info!("Database connection established");

    // Run migrations in development
    if config.is_development() {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&db_pool).await?;
        tracing::info!("Migrations completed");
    }

    Ok(Arc::new(PgStore::new(db_pool)))
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.trim().is_empty())
}

/// Resolves on Ctrl+C or when the scheduler cancels itself
async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                token.cancelled().await;
            }
        },
        _ = token.cancelled() => tracing::warn!("Scheduler cancelled, stopping server"),
    }
}
