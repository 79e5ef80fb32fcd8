//! Token authority: the single owner of the robot's cloud identity.
//!
//! All token-mutating work (auth, secondary auth, reassociation,
//! refresh) is funnelled through one request channel and handled by a
//! single mutator task, so there is never more than one mutation in
//! flight. Reads take a lock-free snapshot of the current record
//! through a watch channel.
//!
//! A background refresher task keeps the token fresh ahead of expiry;
//! see [`refresher`] for its schedule.

pub mod identity;
pub mod jwt;
mod refresher;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use identity::{Credential, DisconnectedIdentity, IdentityService, RemoteError, TokenBundle};
pub use jwt::{TokenParseError, TokenRecord};

/// Backoff between retries of a blocking forced refresh.
const FORCE_UPDATE_RETRY: Duration = Duration::from_secs(5);

/// Token authority configuration.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Directory holding the persisted token file.
    pub token_dir: PathBuf,
    /// Static application key attached to every cloud call.
    pub app_key: String,
    /// Delete persisted tokens whose user id is empty (factory-test
    /// leftovers) instead of loading them.
    pub purge_legacy_tokens: bool,
}

/// Token authority failures, as surfaced to callers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TokenError {
    /// The identity service could not be reached.
    #[error("could not reach identity service: {0}")]
    Connection(String),

    /// The identity service returned an unparseable token.
    #[error("identity service returned an invalid token: {0}")]
    InvalidToken(String),

    /// The operation needs a current token and there is none.
    #[error("no identity token")]
    NullToken,

    /// The session belongs to a different account.
    #[error("session belongs to a different account")]
    WrongAccount,

    /// The authority has shut down.
    #[error("token authority terminated")]
    Terminated,
}

/// Result of an auth-style operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    /// The robot's identity token.
    pub jwt_token: String,
    /// The per-client app token minted for the caller.
    pub client_token: String,
}

/// Callback invoked after any successful remote round-trip except a
/// pure refresh, re-arming the external error handler.
pub type SuccessCallback = Arc<dyn Fn() + Send + Sync>;

enum TokenOp {
    Auth {
        session_token: String,
    },
    SecondaryAuth {
        session_token: String,
        client_name: String,
        app_id: String,
    },
    Reassociate {
        session_token: String,
        client_name: String,
        app_id: String,
    },
    Refresh {
        force: bool,
    },
}

enum TokenReply {
    Auth(AuthOutcome),
    Jwt(String),
}

struct TokenRequest {
    op: TokenOp,
    reply: oneshot::Sender<Result<TokenReply, TokenError>>,
}

/// Cloneable handle to the token authority.
#[derive(Clone)]
pub struct TokenAuthority {
    tx: mpsc::Sender<TokenRequest>,
    current: watch::Receiver<Option<Arc<TokenRecord>>>,
    shutdown: CancellationToken,
}

impl TokenAuthority {
    /// Initialise storage and start the mutator and refresher tasks.
    ///
    /// Creates the token directory, loads a persisted token if one
    /// exists, and purges empty-user-id leftovers when the
    /// compatibility flag says so.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from creating the token directory.
    pub fn spawn(
        config: TokenConfig,
        identity: Arc<dyn IdentityService>,
        on_success: SuccessCallback,
        shutdown: CancellationToken,
    ) -> io::Result<Self> {
        std::fs::create_dir_all(&config.token_dir)?;
        let initial = load_initial(&config);
        if initial.is_some() {
            info!("loaded persisted identity token");
        } else {
            info!("no identity token yet");
        }

        let (tx, rx) = mpsc::channel(16);
        let (current_tx, current_rx) = watch::channel(initial);

        let authority = Self {
            tx,
            current: current_rx,
            shutdown: shutdown.clone(),
        };

        let mutator = Mutator {
            config,
            identity,
            on_success,
            current: current_tx,
        };
        tokio::spawn(mutator.run(rx, shutdown));

        Ok(authority)
    }

    /// Start the background refresher task.
    ///
    /// Separate from [`TokenAuthority::spawn`] so the daemon controls
    /// when scheduled refreshes begin; the task runs until the
    /// authority's shutdown signal fires.
    pub fn start_refresher(&self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(refresher::run(self.clone(), self.shutdown.clone()))
    }

    /// Lock-free snapshot of the current token record.
    #[must_use]
    pub fn current(&self) -> Option<Arc<TokenRecord>> {
        self.current.borrow().clone()
    }

    /// Whether the robot currently has an identity.
    #[must_use]
    pub fn has_identity(&self) -> bool {
        self.current.borrow().is_some()
    }

    /// Exchange a user session for a fresh primary token bundle.
    ///
    /// # Errors
    ///
    /// [`TokenError::WrongAccount`] when the service rejects the
    /// session, [`TokenError::Connection`] on transport failure, and
    /// [`TokenError::InvalidToken`] when the returned token does not
    /// parse.
    pub async fn authenticate(&self, session_token: String) -> Result<AuthOutcome, TokenError> {
        match self.request(TokenOp::Auth { session_token }).await? {
            TokenReply::Auth(outcome) => Ok(outcome),
            TokenReply::Jwt(_) => unreachable!("auth op replies with an auth outcome"),
        }
    }

    /// Mint a client token for an additional client, using the
    /// existing identity token as the credential.
    ///
    /// # Errors
    ///
    /// [`TokenError::NullToken`] without a current token; otherwise as
    /// [`TokenAuthority::authenticate`].
    pub async fn secondary_auth(
        &self,
        session_token: String,
        client_name: String,
        app_id: String,
    ) -> Result<AuthOutcome, TokenError> {
        match self
            .request(TokenOp::SecondaryAuth {
                session_token,
                client_name,
                app_id,
            })
            .await?
        {
            TokenReply::Auth(outcome) => Ok(outcome),
            TokenReply::Jwt(_) => unreachable!("secondary auth replies with an auth outcome"),
        }
    }

    /// Re-associate the robot with the account behind a new session.
    ///
    /// # Errors
    ///
    /// As [`TokenAuthority::authenticate`].
    pub async fn reassociate(
        &self,
        session_token: String,
        client_name: String,
        app_id: String,
    ) -> Result<AuthOutcome, TokenError> {
        match self
            .request(TokenOp::Reassociate {
                session_token,
                client_name,
                app_id,
            })
            .await?
        {
            TokenReply::Auth(outcome) => Ok(outcome),
            TokenReply::Jwt(_) => unreachable!("reassociate replies with an auth outcome"),
        }
    }

    /// Refresh the identity token, returning the current encoded
    /// string.
    ///
    /// A non-forced refresh before the refresh time is a no-op that
    /// returns the existing string unchanged.
    ///
    /// # Errors
    ///
    /// [`TokenError::NullToken`] without a current token;
    /// [`TokenError::Connection`] / [`TokenError::InvalidToken`] when
    /// the remote refresh fails.
    pub async fn refresh(&self, force: bool) -> Result<String, TokenError> {
        match self.request(TokenOp::Refresh { force }).await? {
            TokenReply::Jwt(raw) => Ok(raw),
            TokenReply::Auth(_) => unreachable!("refresh replies with a token string"),
        }
    }

    /// Force a refresh and block until one succeeds.
    ///
    /// Used by the security-daemon peer, which must not reply to the
    /// daemon before the refreshed token is on disk. Connection
    /// failures are retried with a short backoff; failures that cannot
    /// resolve themselves (no token, unparseable token) are returned
    /// immediately.
    ///
    /// # Errors
    ///
    /// [`TokenError::NullToken`] / [`TokenError::InvalidToken`] as
    /// above, or [`TokenError::Terminated`] when shutdown interrupts
    /// the retry loop.
    pub async fn force_update(&self) -> Result<(), TokenError> {
        loop {
            match self.refresh(true).await {
                Ok(_) => return Ok(()),
                Err(err @ (TokenError::Connection(_) | TokenError::WrongAccount)) => {
                    warn!(error = %err, "forced token refresh failed, retrying");
                    tokio::select! {
                        () = tokio::time::sleep(FORCE_UPDATE_RETRY) => {}
                        () = self.shutdown.cancelled() => return Err(TokenError::Terminated),
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn request(&self, op: TokenOp) -> Result<TokenReply, TokenError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(TokenRequest { op, reply: reply_tx })
            .await
            .map_err(|_| TokenError::Terminated)?;
        reply_rx.await.map_err(|_| TokenError::Terminated)?
    }
}

fn load_initial(config: &TokenConfig) -> Option<Arc<TokenRecord>> {
    let raw = match jwt::load(&config.token_dir) {
        Ok(raw) => raw?,
        Err(err) => {
            warn!(error = %err, "could not read persisted token");
            return None;
        }
    };
    match TokenRecord::parse(&raw) {
        Ok(record) if record.user_id().is_empty() && config.purge_legacy_tokens => {
            warn!("purging persisted token without a user id");
            if let Err(err) = jwt::purge(&config.token_dir) {
                warn!(error = %err, "could not purge legacy token");
            }
            None
        }
        Ok(record) => Some(Arc::new(record)),
        Err(err) => {
            warn!(error = %err, "persisted token does not parse, ignoring it");
            None
        }
    }
}

struct Mutator {
    config: TokenConfig,
    identity: Arc<dyn IdentityService>,
    on_success: SuccessCallback,
    current: watch::Sender<Option<Arc<TokenRecord>>>,
}

impl Mutator {
    async fn run(self, mut rx: mpsc::Receiver<TokenRequest>, shutdown: CancellationToken) {
        loop {
            let request = tokio::select! {
                () = shutdown.cancelled() => return,
                request = rx.recv() => match request {
                    Some(request) => request,
                    None => return,
                },
            };

            let is_refresh = matches!(request.op, TokenOp::Refresh { .. });
            let result = self.handle(request.op).await;
            match &result {
                Ok(_) if !is_refresh => (self.on_success)(),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "token request failed"),
            }
            // The requester may have given up; that is fine.
            let _ = request.reply.send(result);
        }
    }

    async fn handle(&self, op: TokenOp) -> Result<TokenReply, TokenError> {
        match op {
            TokenOp::Auth { session_token } => {
                let credential = Credential::for_session(&self.config.app_key, &session_token);
                let bundle = self
                    .identity
                    .associate_primary(&credential, &session_token)
                    .await
                    .map_err(map_auth_error)?;
                let record = TokenRecord::parse(&bundle.token)
                    .map_err(|err| TokenError::InvalidToken(err.to_string()))?;
                self.install(record);
                Ok(TokenReply::Auth(AuthOutcome {
                    jwt_token: bundle.token,
                    client_token: bundle.client_token,
                }))
            }
            TokenOp::SecondaryAuth {
                session_token,
                client_name,
                app_id,
            } => {
                let existing = self.current.borrow().clone().ok_or(TokenError::NullToken)?;
                let credential = Credential::for_token(&self.config.app_key, existing.raw());
                let bundle = self
                    .identity
                    .associate_secondary(&credential, &session_token, &client_name, &app_id)
                    .await
                    .map_err(map_auth_error)?;
                Ok(TokenReply::Auth(AuthOutcome {
                    jwt_token: bundle.token,
                    client_token: bundle.client_token,
                }))
            }
            TokenOp::Reassociate {
                session_token,
                client_name,
                app_id,
            } => {
                let credential = Credential::for_session(&self.config.app_key, &session_token);
                let bundle = self
                    .identity
                    .reassociate_primary(&credential, &client_name, &app_id)
                    .await
                    .map_err(map_auth_error)?;
                Ok(TokenReply::Auth(AuthOutcome {
                    jwt_token: bundle.token,
                    client_token: bundle.client_token,
                }))
            }
            TokenOp::Refresh { force } => {
                let existing = self.current.borrow().clone().ok_or(TokenError::NullToken)?;
                if !force && Utc::now() < existing.refresh_time() {
                    return Ok(TokenReply::Jwt(existing.raw().to_owned()));
                }
                let credential = Credential::for_token(&self.config.app_key, existing.raw());
                let bundle = self
                    .identity
                    .refresh_token(&credential)
                    .await
                    .map_err(|err| TokenError::Connection(err.to_string()))?;
                let record = TokenRecord::parse(&bundle.token)
                    .map_err(|err| TokenError::InvalidToken(err.to_string()))?;
                let raw = record.raw().to_owned();
                self.install(record);
                Ok(TokenReply::Jwt(raw))
            }
        }
    }

    fn install(&self, record: TokenRecord) {
        debug!(user_id = record.user_id(), "installing identity token");
        if let Err(err) = jwt::persist(&self.config.token_dir, record.raw()) {
            // The in-memory token is still good; disk catches up on the
            // next successful mutation.
            warn!(error = %err, "could not persist identity token");
        }
        self.current.send_replace(Some(Arc::new(record)));
    }
}

fn map_auth_error(err: RemoteError) -> TokenError {
    match err {
        RemoteError::InvalidArgument(_) => TokenError::WrongAccount,
        RemoteError::Unavailable(message) => TokenError::Connection(message),
    }
}
