//! The gateway's three local peers.
//!
//! All three share the generic peer shape from `robogate-core` and
//! differ only in socket path, decoder, and tag/message types. The
//! security-daemon peer additionally answers request-style messages
//! in-process ([`secd`]), and [`bridge`] republishes engine events on
//! the structured registry.

pub mod bridge;
pub mod secd;

use std::path::Path;

use robogate_core::peer::Peer;
use robogate_core::schema::engine::{self, EngineReport, EngineReportTag};
use robogate_core::schema::envelope::{self, EnvelopeTag, GatewayEnvelope};
use robogate_core::schema::secd::{self as secd_schema, SecdRequest, SecdRequestTag};
use tokio_util::sync::CancellationToken;

/// Socket name of the engine wire-schema endpoint.
pub const ENGINE_SOCKET: &str = "_engine_gateway_server_";
/// Socket name of the engine structured-schema endpoint.
pub const ENVELOPE_SOCKET: &str = "_engine_gateway_proto_server_";
/// Socket name of the security-daemon endpoint.
pub const SECD_SOCKET: &str = "_switchboard_gateway_server_";
/// Client name every peer connects under.
pub const CLIENT_NAME: &str = "client";

/// Peer speaking the legacy engine wire schema.
pub type EnginePeer = Peer<EngineReportTag, EngineReport>;
/// Peer speaking the structured envelope schema.
pub type EnvelopePeer = Peer<EnvelopeTag, GatewayEnvelope>;
/// Peer speaking the security-daemon schema.
pub type SecdPeer = Peer<SecdRequestTag, SecdRequest>;

/// Connect the engine wire-schema peer.
///
/// Retries until the socket appears; `None` when shutdown fires first.
pub async fn connect_engine(socket_dir: &Path, shutdown: CancellationToken) -> Option<EnginePeer> {
    Peer::connect(
        &socket_dir.join(ENGINE_SOCKET),
        CLIENT_NAME,
        engine::decode_report,
        shutdown,
    )
    .await
}

/// Connect the structured envelope peer.
pub async fn connect_envelope(
    socket_dir: &Path,
    shutdown: CancellationToken,
) -> Option<EnvelopePeer> {
    Peer::connect(
        &socket_dir.join(ENVELOPE_SOCKET),
        CLIENT_NAME,
        envelope::decode_envelope,
        shutdown,
    )
    .await
}

/// Connect the security-daemon peer.
pub async fn connect_secd(socket_dir: &Path, shutdown: CancellationToken) -> Option<SecdPeer> {
    Peer::connect(
        &socket_dir.join(SECD_SOCKET),
        CLIENT_NAME,
        secd_schema::decode_request,
        shutdown,
    )
    .await
}
