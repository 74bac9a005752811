mod configuration;
mod error;
mod routes;
mod state;

use configuration::Settings;
use reqwest::Client;
use scout::tools::WebResearcher;
use state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::new()?;

    // tokenizer download and parsing block
    let harvest = settings.harvest.clone();
    let counter = tokio::task::spawn_blocking(move || harvest.load_token_counter()).await?;
    if !counter.is_loaded() {
        tracing::warn!(
            model = counter.model(),
            "Tokenizer unavailable, evidence will not be budgeted"
        );
    }

    let researcher = WebResearcher::new(
        Client::new(),
        settings.search,
        settings.harvest,
        Arc::new(counter),
    )?;

    let provider_config = settings.provider.into_config();
    if provider_config.is_none() {
        tracing::warn!("SCOUT_PROVIDER__API_KEY is not set, requests will fail");
    }

    let state = AppState {
        provider_config,
        researcher: Arc::new(researcher),
        analysis: settings.analysis,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::configure(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(settings.server.socket_addr()?).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
