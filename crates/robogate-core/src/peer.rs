//! A peer: one framed link, one registry, one inbound pump.
//!
//! The three local endpoints (engine wire schema, engine structured
//! schema, security daemon) share this shape and differ only in socket
//! path, decode function, and tag/message types.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::link::{DatagramLink, LinkError, ReadOutcome};
use crate::registry::{MessageTag, Registry};

/// Inbound frame could not be turned into a tagged message.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The schema does not know this message.
    #[error("unknown message: {0}")]
    Unknown(String),

    /// The payload is malformed for its claimed message.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Decode one frame payload into a `(tag, message)` pair.
pub type Decoder<T, M> = fn(&[u8]) -> Result<(T, M), DecodeError>;

/// One local endpoint: link + registry + decoder.
///
/// The peer owns exactly one inbound pump ([`Peer::run_pump`]), which
/// is the registry's only producer; everything a handler observes from
/// this peer arrives through a [`Registry`] subscription.
pub struct Peer<T: MessageTag, M> {
    link: Arc<DatagramLink>,
    registry: Registry<T, M>,
    decoder: Decoder<T, M>,
    decode_failures: AtomicU64,
}

impl<T: MessageTag, M: Clone + Send + 'static> Peer<T, M> {
    /// Connect the underlying link and assemble a peer around it.
    ///
    /// Blocks (with the link's retry backoff) until the socket is
    /// reachable; returns `None` when `shutdown` fires first.
    pub async fn connect(
        socket_path: &Path,
        client_name: &str,
        decoder: Decoder<T, M>,
        shutdown: CancellationToken,
    ) -> Option<Self> {
        let link = DatagramLink::connect(socket_path, client_name, shutdown).await?;
        Some(Self::with_link(link, decoder))
    }

    /// Assemble a peer around an already-connected link.
    #[must_use]
    pub fn with_link(link: DatagramLink, decoder: Decoder<T, M>) -> Self {
        Self {
            link: Arc::new(link),
            registry: Registry::new(),
            decoder,
            decode_failures: AtomicU64::new(0),
        }
    }

    /// This peer's subscription registry.
    #[must_use]
    pub fn registry(&self) -> &Registry<T, M> {
        &self.registry
    }

    /// Number of inbound frames dropped because they did not decode.
    #[must_use]
    pub fn decode_failures(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
    }

    /// Write one already-encoded payload to the peer.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError`] when framing or the datagram send fails.
    pub async fn send(&self, payload: &[u8]) -> Result<(), LinkError> {
        self.link.write(payload).await.map(|_| ())
    }

    /// Run the inbound pump until the link closes.
    ///
    /// Frames that fail to decode are counted and dropped; the pump
    /// only exits on the link's fatal end-of-stream signal, at which
    /// point the peer is degraded until the process reconnects.
    pub async fn run_pump(&self) {
        loop {
            match self.link.read_frame().await {
                ReadOutcome::Closed => {
                    error!(
                        server = %self.link.server_path().display(),
                        "peer link closed, stopping inbound pump",
                    );
                    return;
                }
                ReadOutcome::Frame(payload) => match (self.decoder)(&payload) {
                    Ok((tag, msg)) => {
                        debug!(?tag, "inbound message");
                        self.registry.deliver(tag, msg).await;
                    }
                    Err(err) => {
                        self.decode_failures.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            server = %self.link.server_path().display(),
                            error = %err,
                            "dropping undecodable frame",
                        );
                    }
                },
            }
        }
    }
}
