//! Framed datagram link to a local peer process.
//!
//! The engine and the security daemon each listen on a Unix datagram
//! socket. A [`DatagramLink`] binds its own client socket next to the
//! server's (`<server>_<name>`), connects, and then exchanges
//! length-prefixed frames.
//!
//! Construction retries forever: the gateway usually starts before the
//! engine has created its sockets, so every failure is logged and
//! retried after a fixed backoff until the surrounding shutdown signal
//! fires.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::net::UnixDatagram;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::framing::{self, FrameError, MAX_DATAGRAM};

/// Delay between connection attempts while a peer socket is missing.
pub const CONNECT_RETRY: Duration = Duration::from_secs(5);

/// Link failures surfaced to callers of [`DatagramLink::write`].
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The payload could not be framed.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The datagram send failed.
    #[error("datagram write failed: {0}")]
    Write(#[source] io::Error),
}

/// Result of reading one frame from the link.
#[derive(Debug)]
pub enum ReadOutcome {
    /// One frame payload, header already stripped.
    Frame(Vec<u8>),
    /// The peer signalled end-of-stream; the link is unusable and the
    /// reader must exit.
    Closed,
}

/// A connected client socket speaking length-prefixed datagrams.
///
/// Writes are mutually exclusive so that two concurrent senders never
/// interleave header and body on the wire. Reads are expected from a
/// single pump task and take no lock.
#[derive(Debug)]
pub struct DatagramLink {
    socket: UnixDatagram,
    write_lock: Mutex<()>,
    local_path: PathBuf,
    server_path: PathBuf,
}

impl DatagramLink {
    /// Connect to the datagram server at `server_path`, binding the
    /// client end at `<server_path>_<name>`.
    ///
    /// Retries with [`CONNECT_RETRY`] backoff until the connection
    /// succeeds or `shutdown` fires; returns `None` on shutdown.
    pub async fn connect(
        server_path: &Path,
        name: &str,
        shutdown: CancellationToken,
    ) -> Option<Self> {
        let mut local = server_path.as_os_str().to_owned();
        local.push("_");
        local.push(name);
        let local_path = PathBuf::from(local);

        loop {
            match Self::try_connect(server_path, &local_path) {
                Ok(link) => {
                    debug!(server = %server_path.display(), "datagram link established");
                    return Some(link);
                }
                Err(err) => {
                    warn!(
                        server = %server_path.display(),
                        client = %local_path.display(),
                        error = %err,
                        "could not create gateway sockets, retrying",
                    );
                }
            }

            tokio::select! {
                () = tokio::time::sleep(CONNECT_RETRY) => {}
                () = shutdown.cancelled() => return None,
            }
        }
    }

    fn try_connect(server_path: &Path, local_path: &Path) -> io::Result<Self> {
        // A stale client socket from a previous run blocks the bind.
        if local_path.exists() {
            std::fs::remove_file(local_path)?;
        }
        let socket = UnixDatagram::bind(local_path)?;
        socket.connect(server_path)?;
        Ok(Self {
            socket,
            write_lock: Mutex::new(()),
            local_path: local_path.to_path_buf(),
            server_path: server_path.to_path_buf(),
        })
    }

    /// Path of the server socket this link is connected to.
    #[must_use]
    pub fn server_path(&self) -> &Path {
        &self.server_path
    }

    /// Frame `payload` and send it as one datagram.
    ///
    /// Holding the write lock across the single `send` keeps frames
    /// atomic on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Frame`] for unframeable payloads and
    /// [`LinkError::Write`] when the send fails.
    pub async fn write(&self, payload: &[u8]) -> Result<usize, LinkError> {
        let frame = framing::encode_frame(payload)?;
        let _guard = self.write_lock.lock().await;
        self.socket.send(&frame).await.map_err(LinkError::Write)
    }

    /// Read the next frame.
    ///
    /// Datagrams shorter than the frame header are logged and skipped.
    /// A zero-length datagram is the peer's end-of-stream signal and a
    /// read error means the socket is gone; both yield
    /// [`ReadOutcome::Closed`].
    pub async fn read_frame(&self) -> ReadOutcome {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let len = match self.socket.recv(&mut buf).await {
                Ok(len) => len,
                Err(err) => {
                    error!(
                        server = %self.server_path.display(),
                        error = %err,
                        "datagram read failed",
                    );
                    return ReadOutcome::Closed;
                }
            };
            if len == 0 {
                error!(
                    server = %self.server_path.display(),
                    "peer socket returned empty datagram",
                );
                return ReadOutcome::Closed;
            }
            match framing::decode_frame(&buf[..len]) {
                Ok(payload) => return ReadOutcome::Frame(payload.to_vec()),
                Err(err) => {
                    warn!(
                        server = %self.server_path.display(),
                        error = %err,
                        "dropping undersized datagram",
                    );
                }
            }
        }
    }
}

impl Drop for DatagramLink {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.local_path);
    }
}
