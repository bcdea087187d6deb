use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;

pub fn init_tracing() {
    tracing_subscriber::fmt().init();
}

pub fn init_env() {
    dotenvy::dotenv().ok();
}

/// Binds the listener and runs the HTTP server until it exits.
pub async fn serve(service_name: &str, app: Router, port: u16) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    tracing::info!("{service_name} listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .await
        .context("Server exited with an error")?;

    Ok(())
}
