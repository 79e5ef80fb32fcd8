//! RPC handler shims.
//!
//! Every public RPC is one of three shapes:
//!
//! - **fire-and-forget**: translate, write to a peer, return a canned
//!   acknowledgement ([`motion`], most of [`animation`]);
//! - **request/response**: subscribe to the expected response tag,
//!   write, await the first delivery or the deadline ([`system`],
//!   [`settings`], plus the multi-message collection in [`animation`]);
//! - **server-streaming**: subscribe and forward every delivery to the
//!   client until it cancels or the queue closes ([`streams`]).
//!
//! Handlers never talk to sockets directly; they subscribe and send
//! through the peers, which keeps correlation, timeouts, and slow-
//! consumer handling in one place.

pub mod animation;
pub mod messages;
pub mod motion;
pub mod settings;
pub mod streams;
pub mod system;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use robogate_core::link::LinkError;
use robogate_core::registry::{MessageTag, Subscription};
use robogate_core::schema::engine::EngineCommand;
use robogate_core::schema::envelope::{encode_envelope, GatewayEnvelope};
use robogate_core::token::TokenAuthority;

use crate::peers::{EnginePeer, EnvelopePeer};

/// Default window a unary handler waits for its correlated response.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Window for collecting a multi-message response sequence.
pub const COLLECT_TIMEOUT: Duration = Duration::from_secs(5);

/// RPC status codes surfaced to the front door.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcCode {
    /// Nil or untranslatable request.
    InvalidArgument,
    /// Encoding or link failure.
    Internal,
    /// The correlated response never arrived.
    DeadlineExceeded,
    /// The operation needs state the gateway does not have.
    FailedPrecondition,
    /// Missing or rejected client credentials.
    Unauthenticated,
    /// The method exists but is not wired up.
    Unimplemented,
    /// The client went away mid-stream.
    Cancelled,
}

impl fmt::Display for RpcCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidArgument => "invalid argument",
            Self::Internal => "internal",
            Self::DeadlineExceeded => "deadline exceeded",
            Self::FailedPrecondition => "failed precondition",
            Self::Unauthenticated => "unauthenticated",
            Self::Unimplemented => "unimplemented",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// An RPC failure: a status code plus a human-readable message.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct RpcError {
    /// Status code.
    pub code: RpcCode,
    /// Detail for the caller.
    pub message: String,
}

impl RpcError {
    fn new(code: RpcCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Nil or untranslatable request.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(RpcCode::InvalidArgument, message)
    }

    /// Encoding or link failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Internal, message)
    }

    /// The correlated response never arrived.
    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(RpcCode::DeadlineExceeded, message)
    }

    /// The operation needs state the gateway does not have.
    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(RpcCode::FailedPrecondition, message)
    }

    /// Missing or rejected client credentials.
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Unauthenticated, message)
    }

    /// The method exists but is not wired up.
    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Unimplemented, message)
    }

    /// The client went away mid-stream.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Cancelled, message)
    }
}

impl From<LinkError> for RpcError {
    fn from(err: LinkError) -> Self {
        Self::internal(err.to_string())
    }
}

/// The public RPC surface, mounted by the (external) front door.
pub struct ExternalService {
    engine: Arc<EnginePeer>,
    envelope: Arc<EnvelopePeer>,
    authority: Option<TokenAuthority>,
    response_timeout: Duration,
}

impl ExternalService {
    /// Assemble the service over connected peers.
    #[must_use]
    pub fn new(
        engine: Arc<EnginePeer>,
        envelope: Arc<EnvelopePeer>,
        authority: Option<TokenAuthority>,
    ) -> Self {
        Self {
            engine,
            envelope,
            authority,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    /// Override the unary response window.
    #[must_use]
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub(crate) fn engine(&self) -> &EnginePeer {
        &self.engine
    }

    pub(crate) fn envelope(&self) -> &EnvelopePeer {
        &self.envelope
    }

    pub(crate) fn authority(&self) -> Option<&TokenAuthority> {
        self.authority.as_ref()
    }

    /// Encode a command and write it to the engine socket.
    pub(crate) async fn send_engine(&self, command: &EngineCommand) -> Result<(), RpcError> {
        self.engine.send(&command.encode()).await.map_err(RpcError::from)
    }

    /// Encode an envelope and write it to the structured socket.
    pub(crate) async fn send_envelope(&self, envelope: &GatewayEnvelope) -> Result<(), RpcError> {
        self.envelope
            .send(&encode_envelope(envelope))
            .await
            .map_err(RpcError::from)
    }

    /// Await the next delivery on `sub` within the response window.
    pub(crate) async fn await_response<T: MessageTag, M>(
        &self,
        sub: &mut Subscription<T, M>,
    ) -> Result<M, RpcError> {
        match tokio::time::timeout(self.response_timeout, sub.recv()).await {
            Ok(Some(message)) => Ok(message),
            Ok(None) => Err(RpcError::internal("response queue closed")),
            Err(_) => Err(RpcError::deadline_exceeded(format!(
                "no {:?} response within {:?}",
                sub.tag(),
                self.response_timeout,
            ))),
        }
    }
}
