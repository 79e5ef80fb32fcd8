//! Boundary to the remote cloud identity service.
//!
//! The gateway never speaks the identity service's transport itself;
//! it hands a [`Credential`] and the request parameters to whatever
//! [`IdentityService`] implementation the deployment wires in, and
//! maps the two remote failure classes into its own token errors.

use async_trait::async_trait;

/// Per-request credential headers for outbound cloud calls.
///
/// Every call carries the static app key plus either the user session
/// (before the robot has a token) or the current token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    headers: Vec<(String, String)>,
}

impl Credential {
    /// Header carrying the static application key.
    pub const APP_KEY_HEADER: &'static str = "app-key";
    /// Header carrying a user session token.
    pub const USER_SESSION_HEADER: &'static str = "user-session";
    /// Header carrying the robot's identity token.
    pub const ACCESS_TOKEN_HEADER: &'static str = "access-token";

    /// Credential for calls authenticated by a user session.
    #[must_use]
    pub fn for_session(app_key: &str, session_token: &str) -> Self {
        Self {
            headers: vec![
                (Self::APP_KEY_HEADER.to_owned(), app_key.to_owned()),
                (Self::USER_SESSION_HEADER.to_owned(), session_token.to_owned()),
            ],
        }
    }

    /// Credential for calls authenticated by the current token.
    #[must_use]
    pub fn for_token(app_key: &str, token: &str) -> Self {
        Self {
            headers: vec![
                (Self::APP_KEY_HEADER.to_owned(), app_key.to_owned()),
                (Self::ACCESS_TOKEN_HEADER.to_owned(), token.to_owned()),
            ],
        }
    }

    /// The headers to attach to the outbound request.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

/// Token material returned by the identity service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBundle {
    /// The robot's identity token (a JWT).
    pub token: String,
    /// The per-client app token minted alongside it.
    pub client_token: String,
}

/// Failure classes at the identity-service boundary.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    /// The service rejected the request arguments.
    #[error("identity service rejected request: {0}")]
    InvalidArgument(String),

    /// The service could not be reached or failed in transport.
    #[error("identity service unreachable: {0}")]
    Unavailable(String),
}

/// The remote identity service, as seen by the token authority.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Exchange a user session for the robot's primary token bundle.
    async fn associate_primary(
        &self,
        credential: &Credential,
        session_token: &str,
    ) -> Result<TokenBundle, RemoteError>;

    /// Mint a client token for an additional client of this robot.
    async fn associate_secondary(
        &self,
        credential: &Credential,
        session_token: &str,
        client_name: &str,
        app_id: &str,
    ) -> Result<TokenBundle, RemoteError>;

    /// Re-associate the robot with the account behind a new session.
    async fn reassociate_primary(
        &self,
        credential: &Credential,
        client_name: &str,
        app_id: &str,
    ) -> Result<TokenBundle, RemoteError>;

    /// Refresh the robot's identity token.
    async fn refresh_token(&self, credential: &Credential) -> Result<TokenBundle, RemoteError>;
}

/// Identity service stand-in for deployments without cloud access.
///
/// Every call fails with [`RemoteError::Unavailable`]; the authority's
/// normal connection-error handling and the refresher's retry backoff
/// take it from there.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisconnectedIdentity;

#[async_trait]
impl IdentityService for DisconnectedIdentity {
    async fn associate_primary(
        &self,
        _credential: &Credential,
        _session_token: &str,
    ) -> Result<TokenBundle, RemoteError> {
        Err(RemoteError::Unavailable("no identity service configured".into()))
    }

    async fn associate_secondary(
        &self,
        _credential: &Credential,
        _session_token: &str,
        _client_name: &str,
        _app_id: &str,
    ) -> Result<TokenBundle, RemoteError> {
        Err(RemoteError::Unavailable("no identity service configured".into()))
    }

    async fn reassociate_primary(
        &self,
        _credential: &Credential,
        _client_name: &str,
        _app_id: &str,
    ) -> Result<TokenBundle, RemoteError> {
        Err(RemoteError::Unavailable("no identity service configured".into()))
    }

    async fn refresh_token(&self, _credential: &Credential) -> Result<TokenBundle, RemoteError> {
        Err(RemoteError::Unavailable("no identity service configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_credential_headers() {
        let credential = Credential::for_session("key-1", "sess-1");
        assert_eq!(
            credential.headers(),
            &[
                ("app-key".to_owned(), "key-1".to_owned()),
                ("user-session".to_owned(), "sess-1".to_owned()),
            ]
        );
    }

    #[test]
    fn test_token_credential_headers() {
        let credential = Credential::for_token("key-1", "jwt-1");
        assert!(credential
            .headers()
            .iter()
            .any(|(name, value)| name == Credential::ACCESS_TOKEN_HEADER && value == "jwt-1"));
    }
}
