mod handlers;
mod routes;
mod state;

use anyhow::Result;
use mediabox_core::Settings;
use std::env;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mediabox_web=info,mediabox_core=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Configuration problems stop the process here, never per request
    let settings = Settings::from_env()?;
    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());

    let state = AppState::new(&settings).await?;
    tracing::info!(
        "Storage backend: {}, max upload size: {} bytes",
        state.storage.kind(),
        state.policy.max_size()
    );

    let app = routes::router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Mediabox web server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
