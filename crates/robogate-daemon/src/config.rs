//! Gateway configuration.
//!
//! Loaded from a TOML file; every field has a default so a missing or
//! partial file still yields a runnable configuration. CLI flags
//! override the file. The gateway reads no environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context;
use robogate_core::token::TokenConfig;
use serde::{Deserialize, Serialize};

/// Top-level gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Directory the local peer sockets live in.
    #[serde(default = "default_socket_dir")]
    pub socket_dir: PathBuf,

    /// Directory holding the persisted identity token.
    #[serde(default = "default_token_dir")]
    pub token_dir: PathBuf,

    /// TLS certificate presented by the front door.
    #[serde(default = "default_cert_path")]
    pub cert_path: PathBuf,

    /// TLS key for [`cert_path`](Self::cert_path).
    #[serde(default = "default_key_path")]
    pub key_path: PathBuf,

    /// Front-door listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Reject RPCs without a valid bearer token. Off by default;
    /// turning it on is a deployment decision.
    #[serde(default)]
    pub enforce_client_auth: bool,

    /// Delete persisted tokens without a user id (factory leftovers).
    #[serde(default = "default_true")]
    pub purge_legacy_tokens: bool,

    /// Static application key attached to outbound cloud calls.
    #[serde(default)]
    pub app_key: String,

    /// Port of the local health endpoint; 0 disables it.
    #[serde(default = "default_health_port")]
    pub health_port: u16,

    /// Voice-stream establishment settings.
    #[serde(default)]
    pub voice: VoiceSection,
}

/// Voice-stream establishment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceSection {
    /// Host dialled by the layered connectivity check, `host:port`.
    #[serde(default = "default_check_host")]
    pub check_host: String,

    /// Refuse to open a stream without credentials.
    #[serde(default)]
    pub require_token: bool,

    /// Firmware version reported in stream metadata.
    #[serde(default)]
    pub firmware_version: String,

    /// Boot id reported in stream metadata.
    #[serde(default)]
    pub boot_id: String,
}

impl Default for VoiceSection {
    fn default() -> Self {
        Self {
            check_host: default_check_host(),
            require_token: false,
            firmware_version: String::new(),
            boot_id: String::new(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            socket_dir: default_socket_dir(),
            token_dir: default_token_dir(),
            cert_path: default_cert_path(),
            key_path: default_key_path(),
            port: default_port(),
            enforce_client_auth: false,
            purge_legacy_tokens: true,
            app_key: String::new(),
            health_port: default_health_port(),
            voice: VoiceSection::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// The token authority's slice of this configuration.
    #[must_use]
    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            token_dir: self.token_dir.clone(),
            app_key: self.app_key.clone(),
            purge_legacy_tokens: self.purge_legacy_tokens,
        }
    }
}

fn default_socket_dir() -> PathBuf {
    PathBuf::from("/run/robogate")
}

fn default_token_dir() -> PathBuf {
    PathBuf::from("/var/lib/robogate")
}

fn default_cert_path() -> PathBuf {
    PathBuf::from("/etc/robogate/gateway.crt")
}

fn default_key_path() -> PathBuf {
    PathBuf::from("/etc/robogate/gateway.key")
}

const fn default_port() -> u16 {
    443
}

const fn default_health_port() -> u16 {
    8889
}

const fn default_true() -> bool {
    true
}

fn default_check_host() -> String {
    "ota.robogate.example.com:443".to_owned()
}
