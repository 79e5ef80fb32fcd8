//! Identity token record: claim extraction and on-disk persistence.
//!
//! The gateway does not verify the token's signature; verification is
//! the cloud's job. It only needs the timing claims to schedule
//! refreshes and the user id to detect leftover factory-test tokens.

use std::io;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// File name of the persisted token inside the token directory.
pub const TOKEN_FILE: &str = "token.jwt";

/// How far ahead of expiry the token is refreshed.
#[must_use]
pub fn refresh_lead() -> Duration {
    Duration::hours(3)
}

/// The token string could not be parsed.
#[derive(Debug, thiserror::Error)]
pub enum TokenParseError {
    /// Not a three-segment JWT.
    #[error("token is not a three-segment JWT")]
    Format,

    /// Claims segment is not valid base64.
    #[error("claims segment is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Claims JSON is missing or malformed.
    #[error("claims are malformed: {0}")]
    Claims(#[from] serde_json::Error),

    /// A timestamp claim is out of range.
    #[error("timestamp claim out of range")]
    Timestamp,
}

#[derive(Debug, Deserialize)]
struct Claims {
    iat: i64,
    exp: i64,
    #[serde(default)]
    user_id: String,
}

/// A parsed identity token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    raw: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    user_id: String,
}

impl TokenRecord {
    /// Extract the timing and identity claims from an encoded token.
    ///
    /// # Errors
    ///
    /// Returns [`TokenParseError`] when the string is not a JWT or its
    /// claims segment does not carry usable `iat`/`exp` values.
    pub fn parse(raw: &str) -> Result<Self, TokenParseError> {
        let mut segments = raw.split('.');
        let (Some(_header), Some(claims), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(TokenParseError::Format);
        };

        let decoded = URL_SAFE_NO_PAD.decode(claims)?;
        let claims: Claims = serde_json::from_slice(&decoded)?;

        Ok(Self {
            raw: raw.to_owned(),
            issued_at: DateTime::from_timestamp(claims.iat, 0).ok_or(TokenParseError::Timestamp)?,
            expires_at: DateTime::from_timestamp(claims.exp, 0).ok_or(TokenParseError::Timestamp)?,
            user_id: claims.user_id,
        })
    }

    /// The opaque encoded token.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The account this token belongs to; empty on factory-test tokens.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// When the token was issued.
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// When the token expires.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// When the token should be refreshed: expiry minus the lead.
    #[must_use]
    pub fn refresh_time(&self) -> DateTime<Utc> {
        self.expires_at - refresh_lead()
    }
}

fn token_path(dir: &Path) -> PathBuf {
    dir.join(TOKEN_FILE)
}

/// Read the persisted token string, if one exists.
///
/// # Errors
///
/// Propagates I/O errors other than the file being absent.
pub fn load(dir: &Path) -> io::Result<Option<String>> {
    match std::fs::read_to_string(token_path(dir)) {
        Ok(raw) => Ok(Some(raw.trim().to_owned())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Write the token string to disk.
///
/// The file is world-accessible: other on-device processes read it to
/// authenticate their own cloud calls.
///
/// # Errors
///
/// Propagates I/O errors from the write or the permission change.
pub fn persist(dir: &Path, raw: &str) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let path = token_path(dir);
    std::fs::write(&path, raw)?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o777))
}

/// Delete the persisted token, ignoring absence.
///
/// # Errors
///
/// Propagates I/O errors other than the file being absent.
pub fn purge(dir: &Path) -> io::Result<()> {
    match std::fs::remove_file(token_path(dir)) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
pub(crate) fn make_test_jwt(iat: i64, exp: i64, user_id: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let claims = URL_SAFE_NO_PAD.encode(
        serde_json::json!({ "iat": iat, "exp": exp, "user_id": user_id }).to_string(),
    );
    format!("{header}.{claims}.unsigned")
}
