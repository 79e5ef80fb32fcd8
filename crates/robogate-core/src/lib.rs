//! # robogate-core
//!
//! Core library for the robot gateway: the pieces that sit between the
//! public RPC surface and the on-device processes reachable over local
//! datagram sockets.
//!
//! ## Building blocks
//!
//! - **Framing**: length-prefixed datagram payloads ([`framing`])
//! - **Link**: a connected datagram socket with single-writer discipline
//!   and an auto-reconnect constructor ([`link`])
//! - **Registry**: tag-keyed fan-out of inbound messages to bounded
//!   per-handler queues, with slow-consumer eviction ([`registry`])
//! - **Peer**: one link plus one registry plus one decode function,
//!   driven by a single inbound pump task ([`peer`])
//! - **Schemas**: the two engine wire schemas and the security-daemon
//!   schema ([`schema`])
//! - **Token authority**: the serialised lifecycle of the robot's cloud
//!   identity token ([`token`])
//!
//! ## Example
//!
//! ```rust,no_run
//! use robogate_core::peer::Peer;
//! use robogate_core::schema::envelope::{decode_envelope, EnvelopeTag, GatewayEnvelope};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Option<()> {
//! let shutdown = CancellationToken::new();
//! let peer: Peer<EnvelopeTag, GatewayEnvelope> = Peer::connect(
//!     "/run/gateway/_engine_gateway_proto_server_".as_ref(),
//!     "client",
//!     decode_envelope,
//!     shutdown.clone(),
//! )
//! .await?;
//! let mut sub = peer.registry().subscribe(EnvelopeTag::Pong, 1);
//! # Some(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod framing;
pub mod link;
pub mod peer;
pub mod registry;
pub mod schema;
pub mod token;

pub use framing::{decode_frame, encode_frame, FrameError, MAX_PAYLOAD};
pub use link::{DatagramLink, LinkError, ReadOutcome};
pub use peer::{DecodeError, Peer};
pub use registry::{Registry, Subscription, TagBusy};
pub use token::{Credential, TokenAuthority, TokenError, TokenRecord};
