//! Voice-stream establishment.
//!
//! Opening a stream to the remote intent service is a layered
//! sequence, and every layer has its own failure category so the
//! caller (and the fleet dashboards behind the error hook) can tell a
//! dead network from a bad certificate from a missing token:
//!
//! 1. connection-check mode first dials the OTA host over plain TCP
//!    (`Connectivity`), then over TLS with the system roots (`Tls`);
//! 2. credentials come from the token authority (`Token`);
//! 3. the service connection is dialled with session metadata
//!    (`Connecting`);
//! 4. the mode's stream kind is opened on it (`NewStream`).
//!
//! The returned [`StreamSession`] is the open notification; a caller
//! that never receives it treats the attempt as a server-side timeout.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use robogate_core::token::{Credential, RemoteError, TokenAuthority};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info, warn};

use crate::config::VoiceSection;

/// Length of a stream session identifier.
const SESSION_ID_LEN: usize = 16;

/// The kinds of stream a caller can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// Full intent recognition.
    Intent,
    /// Knowledge-graph query.
    KnowledgeGraph,
    /// Connectivity validation only.
    ConnectionCheck,
}

/// Stream-open failures, one category per layer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StreamOpenError {
    /// Plain TCP to the check host failed.
    #[error("connectivity check failed: {0}")]
    Connectivity(String),

    /// TLS to the check host failed.
    #[error("tls check failed: {0}")]
    Tls(String),

    /// Credentials were required and unavailable.
    #[error("token acquisition failed: {0}")]
    Token(String),

    /// The intent service connection could not be established.
    #[error("connecting to intent service failed: {0}")]
    Connecting(String),

    /// The connection is up but the stream kind would not open.
    #[error("opening stream failed: {0}")]
    NewStream(String),
}

/// Metadata attached to every intent-service connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMetadata {
    /// Random per-session identifier.
    pub session_id: String,
    /// Robot firmware version.
    pub firmware_version: String,
    /// Current boot id.
    pub boot_id: String,
}

/// One recognised intent from the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IntentResult {
    /// Transcription of the query.
    pub query: String,
    /// Recognised intent identifier.
    pub intent: String,
    /// Intent parameters, serialised.
    pub parameters: String,
    /// Whether this is the final result for the utterance.
    pub is_final: bool,
}

/// A live bidirectional stream to the intent service.
#[async_trait]
pub trait IntentStream: Send {
    /// Push one audio chunk upstream.
    async fn send_audio(&mut self, chunk: Vec<u8>) -> Result<(), RemoteError>;

    /// Await the next result; `None` when the server ends the stream.
    async fn next_result(&mut self) -> Result<Option<IntentResult>, RemoteError>;
}

/// An established connection that can open streams.
#[async_trait]
pub trait IntentConnection: Send {
    /// Open the stream kind for `mode`.
    async fn open(self: Box<Self>, mode: StreamMode) -> Result<Box<dyn IntentStream>, RemoteError>;
}

/// The remote intent service, as seen by the streamer.
#[async_trait]
pub trait IntentService: Send + Sync {
    /// Dial the service with credentials and session metadata.
    async fn connect(
        &self,
        credential: Option<&Credential>,
        metadata: &StreamMetadata,
    ) -> Result<Box<dyn IntentConnection>, RemoteError>;
}

/// Intent service stand-in for deployments without cloud access.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisconnectedIntent;

#[async_trait]
impl IntentService for DisconnectedIntent {
    async fn connect(
        &self,
        _credential: Option<&Credential>,
        _metadata: &StreamMetadata,
    ) -> Result<Box<dyn IntentConnection>, RemoteError> {
        Err(RemoteError::Unavailable("no intent service configured".into()))
    }
}

/// An open stream session, owned by the caller until drop.
pub struct StreamSession {
    /// Random per-session identifier.
    pub session_id: String,
    /// The mode the stream was opened in.
    pub mode: StreamMode,
    /// The live stream.
    pub stream: Box<dyn IntentStream>,
}

/// Hook receiving every categorised open failure.
pub type ErrorHook = Arc<dyn Fn(&StreamOpenError) + Send + Sync>;

/// Establishes streams to the remote intent service.
pub struct VoiceStreamer {
    config: VoiceSection,
    app_key: String,
    authority: Option<TokenAuthority>,
    intent: Arc<dyn IntentService>,
    error_hook: Option<ErrorHook>,
}

impl VoiceStreamer {
    /// Assemble a streamer.
    #[must_use]
    pub fn new(
        config: VoiceSection,
        app_key: String,
        authority: Option<TokenAuthority>,
        intent: Arc<dyn IntentService>,
    ) -> Self {
        Self {
            config,
            app_key,
            authority,
            intent,
            error_hook: None,
        }
    }

    /// Install a hook that observes every categorised failure.
    #[must_use]
    pub fn with_error_hook(mut self, hook: ErrorHook) -> Self {
        self.error_hook = Some(hook);
        self
    }

    /// Open a stream in `mode`.
    ///
    /// # Errors
    ///
    /// A [`StreamOpenError`] naming the layer that failed; the error
    /// hook observes it before it is returned.
    pub async fn open(&self, mode: StreamMode) -> Result<StreamSession, StreamOpenError> {
        if mode == StreamMode::ConnectionCheck {
            self.check_connectivity().await?;
        }

        let credential = self.fetch_credential().await?;

        let session_id = new_session_id();
        let metadata = StreamMetadata {
            session_id: session_id.clone(),
            firmware_version: self.config.firmware_version.clone(),
            boot_id: self.config.boot_id.clone(),
        };

        let connect_start = Instant::now();
        let connection = match self.intent.connect(credential.as_ref(), &metadata).await {
            Ok(connection) => connection,
            Err(err) => return Err(self.fail(StreamOpenError::Connecting(err.to_string()))),
        };
        let stream = match connection.open(mode).await {
            Ok(stream) => stream,
            Err(err) => return Err(self.fail(StreamOpenError::NewStream(err.to_string()))),
        };
        info!(
            session_id,
            ?mode,
            connect_ms = connect_start.elapsed().as_millis() as u64,
            "voice stream open",
        );

        Ok(StreamSession {
            session_id,
            mode,
            stream,
        })
    }

    /// Dial the OTA host over plain TCP, then over TLS.
    async fn check_connectivity(&self) -> Result<(), StreamOpenError> {
        let host = &self.config.check_host;
        let tcp = match TcpStream::connect(host).await {
            Ok(tcp) => tcp,
            Err(err) => {
                return Err(self.fail(StreamOpenError::Connectivity(format!("{host}: {err}"))))
            }
        };
        debug!(host, "plain tcp check passed");

        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        let connector = TlsConnector::from(Arc::new(tls_config));

        let server_name = host.split(':').next().unwrap_or(host).to_owned();
        let server_name = match ServerName::try_from(server_name) {
            Ok(name) => name,
            Err(err) => return Err(self.fail(StreamOpenError::Tls(err.to_string()))),
        };
        if let Err(err) = connector.connect(server_name, tcp).await {
            return Err(self.fail(StreamOpenError::Tls(format!("{host}: {err}"))));
        }
        debug!(host, "tls check passed");
        Ok(())
    }

    /// Fetch per-stream credentials from the token authority.
    async fn fetch_credential(&self) -> Result<Option<Credential>, StreamOpenError> {
        let token_start = Instant::now();
        let current = self.authority.as_ref().and_then(TokenAuthority::current);
        match current {
            Some(record) => {
                debug!(
                    token_ms = token_start.elapsed().as_millis() as u64,
                    "token acquisition finished",
                );
                Ok(Some(Credential::for_token(&self.app_key, record.raw())))
            }
            None if self.config.require_token => {
                Err(self.fail(StreamOpenError::Token("no identity token available".into())))
            }
            None => {
                warn!("opening voice stream without credentials");
                Ok(None)
            }
        }
    }

    fn fail(&self, err: StreamOpenError) -> StreamOpenError {
        if let Some(hook) = &self.error_hook {
            hook(&err);
        }
        err
    }
}

fn new_session_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn streamer(config: VoiceSection) -> VoiceStreamer {
        VoiceStreamer::new(config, "app-key".into(), None, Arc::new(DisconnectedIntent))
    }

    #[test]
    fn test_session_id_shape() {
        let id = new_session_id();
        assert_eq!(id.len(), SESSION_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, new_session_id());
    }

    #[tokio::test]
    async fn test_open_without_service_reports_connecting() {
        let result = streamer(VoiceSection::default()).open(StreamMode::Intent).await;
        assert!(matches!(result, Err(StreamOpenError::Connecting(_))));
    }

    #[tokio::test]
    async fn test_required_token_missing_reports_token() {
        let config = VoiceSection {
            require_token: true,
            ..VoiceSection::default()
        };
        let result = streamer(config).open(StreamMode::Intent).await;
        assert!(matches!(result, Err(StreamOpenError::Token(_))));
    }

    #[tokio::test]
    async fn test_connection_check_reports_connectivity_first() {
        // Nothing listens on this port; the plain TCP layer must be the
        // one that reports.
        let config = VoiceSection {
            check_host: "127.0.0.1:1".into(),
            ..VoiceSection::default()
        };
        let result = streamer(config).open(StreamMode::ConnectionCheck).await;
        assert!(matches!(result, Err(StreamOpenError::Connectivity(_))));
    }

    #[tokio::test]
    async fn test_error_hook_observes_failures() {
        let seen = Arc::new(AtomicUsize::new(0));
        let hook: ErrorHook = {
            let seen = Arc::clone(&seen);
            Arc::new(move |_err| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
        };
        let streamer = streamer(VoiceSection::default()).with_error_hook(hook);

        let _ = streamer.open(StreamMode::Intent).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
