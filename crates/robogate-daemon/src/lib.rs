//! # robogate-daemon
//!
//! The robot gateway process. It connects the three local datagram
//! peers (engine wire schema, engine structured schema, security
//! daemon), runs their inbound pumps, owns the token authority and the
//! voice-stream establisher, and exposes the RPC handler surface
//! ([`service::ExternalService`]) that the TLS/HTTP front door mounts.
//!
//! The front door itself (TLS termination, HTTP/2, JSON transcoding)
//! is not part of this crate; it consumes [`service`] and [`auth`] as
//! a library boundary.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod config;
pub mod health;
pub mod peers;
pub mod service;
pub mod voice;

pub use config::GatewayConfig;
