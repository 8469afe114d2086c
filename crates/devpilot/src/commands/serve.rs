//! The `serve` command.

use devpilot_core::RepoSession;
use devpilot_server::{create_router, AppState};
use std::net::SocketAddr;
use tracing::info;

/// Run the HTTP server until it is stopped.
pub async fn run_server(address: SocketAddr, session: RepoSession) -> anyhow::Result<()> {
    let app = create_router(AppState::new(session));

    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("Engine listening on http://{}", address);

    axum::serve(listener, app).await?;
    Ok(())
}
