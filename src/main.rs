//! LLM Gateway - Main entry point
//!
//! This binary creates and runs the HTTP server with all configured routes
//! and middleware. Configuration is loaded from a YAML file.

use anyhow::Result;
use chrono::Local;
use llm_gateway::{
    api::{app_router, AppState},
    core::{init_metrics, resources, AppConfig},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Load .env file if present (before reading any environment variables)
    dotenvy::dotenv().ok();

    let worker_threads = resources::worker_threads();
    println!("Tokio runtime: using {} worker threads", worker_threads);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

/// Custom time formatter that uses local timezone (respects TZ environment variable)
struct LocalTime;

impl tracing_subscriber::fmt::time::FormatTime for LocalTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%d %H:%M:%S"))
    }
}

async fn async_main() -> Result<()> {
    // Check if NO_COLOR environment variable is set (for file logging without ANSI codes)
    let no_color = std::env::var("NO_COLOR").is_ok();

    // Default filter: info level for most crates, debug for llm_gateway.
    // Noise-suppression filters for hyper/h2/reqwest are always appended so
    // a broad RUST_LOG cannot re-enable their chatty logs.
    let base_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,llm_gateway=debug".to_string());
    let filter_str = format!(
        "{},hyper=warn,hyper::proto=warn,h2=warn,reqwest=warn",
        base_filter
    );
    let filter = tracing_subscriber::EnvFilter::new(filter_str);

    if no_color {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_timer(LocalTime)
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_timer(LocalTime))
            .init();
    }

    init_metrics();

    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
    let config = AppConfig::load(&config_path)?;

    if config.endpoints.is_empty() {
        tracing::warn!(
            "No upstream endpoints configured; every request will fail with service_down"
        );
    } else {
        for (index, endpoint) in config.endpoints.iter().enumerate() {
            tracing::info!(
                order = index,
                name = %endpoint.name,
                base_url = %endpoint.base_url,
                "Configured upstream endpoint"
            );
        }
    }

    let cache_capacity = resources::cache_capacity();
    tracing::info!(cache_capacity, "Response cache sized from host memory");

    let http_client = create_http_client(&config);
    let port = config.server.port;
    let state = Arc::new(AppState::new(config, http_client, cache_capacity));

    let app = app_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Starting LLM Gateway on {}", addr);
    tracing::info!("Unary API: POST /api/v1/chat/completions");
    tracing::info!("Streaming API: GET /ws/v1/chat/completions (WebSocket)");
    tracing::info!("Metrics endpoint: /metrics");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the shared HTTP client with connection pooling.
///
/// No client-level timeout: deadlines are attempt-scoped and set per
/// request by the upstream client.
fn create_http_client(config: &AppConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(!config.verify_ssl)
        .pool_max_idle_per_host(100)
        .pool_idle_timeout(std::time::Duration::from_secs(90))
        .tcp_keepalive(std::time::Duration::from_secs(60))
        .build()
        .expect("Failed to build HTTP client")
}
