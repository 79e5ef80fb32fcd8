//! Wire schemas for the three local peers.
//!
//! Two schemas cross the engine boundary: the legacy hand-packed wire
//! schema ([`engine`]) and the protobuf envelope schema ([`envelope`]).
//! The security daemon speaks its own small hand-packed schema
//! ([`secd`]).
//!
//! The gateway core never interprets message bodies; it dispatches on
//! the explicit tag enums defined here. Handlers own whatever
//! translation their RPC needs.

pub mod engine;
pub mod envelope;
pub mod secd;

mod wire;
