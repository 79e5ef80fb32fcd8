//! Bearer-token gate for incoming RPCs.
//!
//! The front door calls [`AuthGate::check`] with the method name and
//! the `authorization` header before dispatching. Enforcement is
//! controlled by the `enforce_client_auth` configuration flag; with
//! the flag off the gate logs the verdict and admits everyone, so a
//! deployment can observe what enforcement would do before turning it
//! on. The user-authentication bootstrap is always exempt: it is how a
//! client obtains credentials in the first place.

use robogate_core::token::TokenAuthority;
use tracing::debug;

use crate::service::RpcError;

/// Method name exempt from authorization.
pub const AUTH_EXEMPT_METHOD: &str = "UserAuthentication";

/// Scheme prefix of an acceptable authorization header.
const BEARER_PREFIX: &str = "Bearer ";

/// Authorization gate over the token authority.
pub struct AuthGate {
    authority: Option<TokenAuthority>,
    enforce: bool,
}

impl AuthGate {
    /// Build a gate. `enforce = false` logs but admits.
    #[must_use]
    pub fn new(authority: Option<TokenAuthority>, enforce: bool) -> Self {
        Self { authority, enforce }
    }

    /// Validate one request's credentials.
    ///
    /// Returns a client description for logging on success.
    ///
    /// # Errors
    ///
    /// `unauthenticated` with the reason, when enforcement is on.
    pub fn check(&self, method: &str, authorization: Option<&str>) -> Result<String, RpcError> {
        if method == AUTH_EXEMPT_METHOD {
            return Ok("auth bypass".to_owned());
        }

        match self.validate(authorization) {
            Ok(client) => Ok(client),
            Err(err) if self.enforce => Err(err),
            Err(err) => {
                debug!(method, error = %err, "admitting request, auth enforcement is off");
                Ok("unenforced".to_owned())
            }
        }
    }

    fn validate(&self, authorization: Option<&str>) -> Result<String, RpcError> {
        let Some(header) = authorization else {
            return Err(RpcError::unauthenticated("no auth token"));
        };
        let Some(token) = header.strip_prefix(BEARER_PREFIX) else {
            return Err(RpcError::unauthenticated("unknown auth header type"));
        };
        if token.is_empty() {
            return Err(RpcError::unauthenticated("empty auth token"));
        }

        let current = self
            .authority
            .as_ref()
            .and_then(TokenAuthority::current)
            .ok_or_else(|| RpcError::unauthenticated("robot has no identity token"))?;
        Ok(current.user_id().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use robogate_core::token::{jwt, DisconnectedIdentity, TokenConfig};
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::service::RpcCode;

    fn enforcing_gate_without_identity() -> AuthGate {
        AuthGate::new(None, true)
    }

    fn unsigned_jwt(user_id: &str) -> String {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let claims = URL_SAFE_NO_PAD.encode(
            serde_json::json!({ "iat": now, "exp": now + 86_400, "user_id": user_id }).to_string(),
        );
        format!("{header}.{claims}.unsigned")
    }

    #[test]
    fn test_exempt_method_bypasses_everything() {
        let gate = enforcing_gate_without_identity();
        assert!(gate.check(AUTH_EXEMPT_METHOD, None).is_ok());
    }

    #[test]
    fn test_missing_header_rejected_when_enforcing() {
        let gate = enforcing_gate_without_identity();
        let err = gate.check("DriveWheels", None).unwrap_err();
        assert_eq!(err.code, RpcCode::Unauthenticated);
    }

    #[test]
    fn test_non_bearer_header_rejected() {
        let gate = enforcing_gate_without_identity();
        let err = gate
            .check("DriveWheels", Some("Basic dXNlcjpwdw=="))
            .unwrap_err();
        assert_eq!(err.code, RpcCode::Unauthenticated);
    }

    #[test]
    fn test_bearer_without_identity_rejected() {
        let gate = enforcing_gate_without_identity();
        let err = gate
            .check("DriveWheels", Some("Bearer some-client-token"))
            .unwrap_err();
        assert_eq!(err.code, RpcCode::Unauthenticated);
    }

    #[test]
    fn test_disabled_enforcement_admits_everyone() {
        let gate = AuthGate::new(None, false);
        assert!(gate.check("DriveWheels", None).is_ok());
        assert!(gate.check("DriveWheels", Some("garbage")).is_ok());
    }

    #[tokio::test]
    async fn test_bearer_with_identity_admitted() {
        let dir = tempfile::tempdir().unwrap();
        jwt::persist(dir.path(), &unsigned_jwt("user-7")).unwrap();

        let authority = TokenAuthority::spawn(
            TokenConfig {
                token_dir: dir.path().to_path_buf(),
                app_key: String::new(),
                purge_legacy_tokens: true,
            },
            Arc::new(DisconnectedIdentity),
            Arc::new(|| {}),
            CancellationToken::new(),
        )
        .unwrap();
        let gate = AuthGate::new(Some(authority), true);

        let client = gate
            .check("DriveWheels", Some("Bearer some-client-token"))
            .unwrap();
        assert_eq!(client, "user-7");
    }
}
