//! In-process responder for the security-daemon peer.
//!
//! Three request tags are answered by the gateway itself: SDK proxy
//! requests (delegated to a proxy callback), external-connection
//! queries (answered from the current connection id), and forced token
//! refreshes (a blocking round-trip through the token authority's
//! request queue). The responder is an ordinary registry subscriber,
//! so observing handlers still see every message.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use robogate_core::schema::secd::{SdkProxyRequest, SecdReply, SecdRequest, SecdRequestTag};
use robogate_core::token::TokenAuthority;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::SecdPeer;

/// Queue depth for the responder's subscriptions. Daemon requests are
/// rare; the depth only needs to ride out a blocking refresh.
const RESPONDER_CAPACITY: usize = 8;

/// Outcome of a proxied SDK request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkProxyOutcome {
    /// HTTP-style status code.
    pub status_code: u16,
    /// Reply content type.
    pub content_type: String,
    /// Reply body.
    pub content: String,
}

/// Proxy callback answering SDK requests carried over BLE.
#[async_trait]
pub trait SdkProxy: Send + Sync {
    /// Handle one proxied request.
    async fn handle(&self, request: &SdkProxyRequest) -> SdkProxyOutcome;
}

/// Proxy stand-in used when no local proxy target is wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableProxy;

#[async_trait]
impl SdkProxy for UnavailableProxy {
    async fn handle(&self, request: &SdkProxyRequest) -> SdkProxyOutcome {
        warn!(path = %request.path, "sdk proxy request with no proxy target");
        SdkProxyOutcome {
            status_code: 503,
            content_type: "text/plain".to_owned(),
            content: "proxy target not available".to_owned(),
        }
    }
}

/// The gateway's current external connection, if any.
#[derive(Debug, Default)]
pub struct ConnectionInfo {
    id: RwLock<String>,
}

impl ConnectionInfo {
    /// Record the id of the connected external client; empty clears it.
    pub fn set_connection_id(&self, id: impl Into<String>) {
        *self.id.write().expect("connection id lock poisoned") = id.into();
    }

    /// Current connection id; empty when no client is connected.
    #[must_use]
    pub fn connection_id(&self) -> String {
        self.id.read().expect("connection id lock poisoned").clone()
    }
}

/// Start the responder task for the security-daemon peer.
pub fn spawn_responder(
    peer: Arc<SecdPeer>,
    proxy: Arc<dyn SdkProxy>,
    connection: Arc<ConnectionInfo>,
    authority: Option<TokenAuthority>,
) -> JoinHandle<()> {
    let mut proxy_sub = peer
        .registry()
        .subscribe(SecdRequestTag::SdkProxyRequest, RESPONDER_CAPACITY);
    let mut conn_sub = peer
        .registry()
        .subscribe(SecdRequestTag::ExternalConnectionRequest, RESPONDER_CAPACITY);
    let mut refresh_sub = peer
        .registry()
        .subscribe(SecdRequestTag::TokenRefreshRequest, RESPONDER_CAPACITY);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                request = proxy_sub.recv() => {
                    let Some(SecdRequest::SdkProxy(request)) = request else { break };
                    // Proxy calls can be slow; answer off the loop so
                    // connection and refresh requests keep flowing.
                    let peer = Arc::clone(&peer);
                    let proxy = Arc::clone(&proxy);
                    tokio::spawn(async move {
                        let outcome = proxy.handle(&request).await;
                        let reply = SecdReply::SdkProxy {
                            message_id: request.message_id,
                            status_code: outcome.status_code,
                            content_type: outcome.content_type,
                            content: outcome.content,
                        };
                        if let Err(err) = peer.send(&reply.encode()).await {
                            warn!(error = %err, "could not write sdk proxy reply");
                        }
                    });
                }
                request = conn_sub.recv() => {
                    if request.is_none() { break }
                    let connection_id = connection.connection_id();
                    let reply = SecdReply::ExternalConnection {
                        is_connected: !connection_id.is_empty(),
                        connection_id,
                    };
                    if let Err(err) = peer.send(&reply.encode()).await {
                        warn!(error = %err, "could not write external connection reply");
                    }
                }
                request = refresh_sub.recv() => {
                    if request.is_none() { break }
                    if let Some(authority) = &authority {
                        // Block until the refresh lands; the daemon
                        // reads the token file right after our reply.
                        if let Err(err) = authority.force_update().await {
                            warn!(error = %err, "forced token refresh did not complete");
                        }
                    }
                    if let Err(err) = peer.send(&SecdReply::TokenRefresh.encode()).await {
                        warn!(error = %err, "could not write token refresh reply");
                    }
                }
            }
        }
        debug!("security-daemon responder stopped");
    })
}
