//! Faculty Directory Backend
//!
//! Scrapes department faculty listings into a cached snapshot and serves it over REST.

mod api;
mod auth;
mod cache;
mod config;
mod directory;
mod errors;
mod models;
mod scrape;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use api::HealthResponse;
use config::Config;
use directory::DirectoryService;
use scrape::{DepartmentWorker, HttpFetcher, ScrapeCoordinator};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<DirectoryService>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Faculty Directory Backend");
    tracing::info!(
        "Departments: {}",
        config
            .departments
            .iter()
            .map(|d| d.code.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    tracing::info!(
        "Worker pool size: {} (per-department budget {:?}, refresh ceiling {:?})",
        config.max_concurrency,
        config.department_timeout,
        config.refresh_timeout
    );
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (FACULTY_API_PSK). Refresh endpoint is open!");
    }

    // Initialize cache store
    let cache = cache::open_store(&config).await?;
    tracing::info!("Cache store: {}", cache.describe());

    // Assemble the refresh pipeline
    let fetcher = Arc::new(HttpFetcher::from_config(&config)?);
    let worker = DepartmentWorker::new(fetcher, config.fetch_retries, config.fetch_profiles)
        .with_time_budget(config.department_timeout);
    let coordinator = ScrapeCoordinator::new(worker, config.max_concurrency);
    let directory = Arc::new(DirectoryService::new(
        coordinator,
        Arc::clone(&cache),
        config.departments.clone(),
        config.refresh_timeout,
    ));

    if config.refresh_on_startup && cache.read().await?.is_none() {
        let directory = Arc::clone(&directory);
        tokio::spawn(async move {
            if let Err(e) = directory.refresh_now().await {
                tracing::warn!("Startup refresh failed: {}", e);
            }
        });
    }

    let state = AppState {
        directory,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.api_psk.clone();

    // Refresh scrapes the remote site; guard it when a PSK is configured
    let refresh_routes = Router::new()
        .route(
            "/faculty/refresh",
            post(api::refresh_faculty).get(api::refresh_faculty),
        )
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    let api_routes = Router::new()
        .route("/faculty", get(api::get_faculty))
        .merge(refresh_routes);

    let health_routes = Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "online",
        message: "Faculty Scraper API",
    })
}
