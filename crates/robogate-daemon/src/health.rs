//! Local health endpoint.
//!
//! A loopback-only HTTP surface for on-device diagnostics: peer decode
//! counters, identity presence, uptime. Deliberately not the public
//! front door.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use robogate_core::token::TokenAuthority;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::peers::{EnginePeer, EnvelopePeer, SecdPeer};

/// Shared state behind the health routes.
pub struct HealthState {
    started: Instant,
    engine: Arc<EnginePeer>,
    envelope: Arc<EnvelopePeer>,
    secd: Arc<SecdPeer>,
    authority: Option<TokenAuthority>,
}

impl HealthState {
    /// Capture the daemon's observable pieces.
    #[must_use]
    pub fn new(
        engine: Arc<EnginePeer>,
        envelope: Arc<EnvelopePeer>,
        secd: Arc<SecdPeer>,
        authority: Option<TokenAuthority>,
    ) -> Self {
        Self {
            started: Instant::now(),
            engine,
            envelope,
            secd,
            authority,
        }
    }
}

/// Build the health router.
#[must_use]
pub fn router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz(State(state): State<Arc<HealthState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "uptime_sec": state.started.elapsed().as_secs(),
        "has_identity": state.authority.as_ref().is_some_and(TokenAuthority::has_identity),
        "decode_failures": {
            "engine": state.engine.decode_failures(),
            "envelope": state.envelope.decode_failures(),
            "secd": state.secd.decode_failures(),
        },
    }))
}

/// Serve the health endpoint on loopback until shutdown.
///
/// # Errors
///
/// Returns an error when the port cannot be bound.
pub async fn serve(
    port: u16,
    state: Arc<HealthState>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    info!(port, "health endpoint listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}
