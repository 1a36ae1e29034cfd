use axum::{routing::get, Router};
use clap::Parser;
use common::config::Config;
use http::header;
use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::admin_handlers;
use crate::handlers::{self, AppState};
use crate::model::GenericError;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to config file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: String,
}

/// Parse arguments and load the config; `.env` is read first so the
/// DATABASE_URL override works in local runs.
pub fn initialize_executable() -> Result<Config, GenericError> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    tracing::debug!("Loading config from: {}", args.config);
    let config = Config::load(&args.config)?;
    Ok(config)
}

pub fn initialize_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Storefront + admin routes with request tracing. Kept separate from
/// [`run_server`] so test suites can drive the same router in-process.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(handlers::storefront_router())
        .nest("/admin", admin_handlers::admin_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(config: &Config, state: AppState) -> Result<(), GenericError> {
    let metrics_handle = PrometheusBuilder::new().install_recorder()?;

    let cors_origin = config
        .server
        .cors_origin
        .parse::<header::HeaderValue>()
        .map_err(|e| -> GenericError {
            format!("invalid cors_origin {}: {}", config.server.cors_origin, e).into()
        })?;

    let app = build_router(state)
        .route(
            "/metrics",
            get(move || {
                let handle = metrics_handle.clone();
                async move { handle.render() }
            }),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(cors_origin)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    tracing::info!(
        "Starting {} at {}",
        config.common.project_name,
        config.server.server_address
    );
    let listener = tokio::net::TcpListener::bind(&config.server.server_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
