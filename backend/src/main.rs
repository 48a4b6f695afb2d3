use std::net::SocketAddr;

use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use frontdesk_backend::{db, rest};

const DEFAULT_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_FRONTEND_ORIGIN: &str = "http://localhost:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Setting up store");
    let db = match std::env::var("FRONTDESK_DATABASE_URL") {
        Ok(url) => db::DbConnection::new(&url).await?,
        Err(_) => db::DbConnection::init().await?,
    };

    let state = rest::AppState::new(&db);

    // CORS setup to allow the dashboard frontend to make requests
    let cors = CorsLayer::new()
        .allow_origin(DEFAULT_FRONTEND_ORIGIN.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let app = rest::router(state).layer(cors);

    let addr: SocketAddr = std::env::var("FRONTDESK_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()?;
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
