//! HTTP API for Snap2Listing.
//!
//! [`router`] builds the axum app over a [`SharedState`]; [`serve`] binds
//! it and runs until Ctrl-C.

pub mod error;
pub mod routes;
pub mod state;

use tracing::info;

use snap2listing_shared::{Result, Snap2ListingError};

pub use error::ApiError;
pub use routes::{MIGRATION_TARGET, router};
pub use state::{AppState, Limits, SharedState};

/// Bind `addr` and serve until Ctrl-C, then drain in-flight requests.
pub async fn serve(state: SharedState, addr: &str, body_limit: usize) -> Result<()> {
    let app = router(state, body_limit);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Snap2ListingError::Network(format!("failed to bind {addr}: {e}")))?;
    let local = listener
        .local_addr()
        .map_err(|e| Snap2ListingError::Network(e.to_string()))?;
    info!(addr = %local, "Snap2Listing API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Snap2ListingError::Network(format!("server error: {e}")))?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
