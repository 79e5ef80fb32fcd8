//! Security-daemon wire schema.
//!
//! The daemon pushes request-style messages at the gateway and expects
//! a reply written back on the same link. Requests flow daemon →
//! gateway ([`SecdRequest`]), replies flow gateway → daemon
//! ([`SecdReply`]).

use bytes::BufMut;

use super::wire::{put_string, take_bool, take_string, take_u16, take_u8};
use crate::peer::DecodeError;

/// Dispatch tags for daemon-originated messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecdRequestTag {
    /// Proxy an SDK HTTP request on behalf of a BLE client.
    SdkProxyRequest,
    /// Ask whether an external client is connected, and which.
    ExternalConnectionRequest,
    /// Ask the gateway to force-refresh the client token.
    TokenRefreshRequest,
}

impl SecdRequestTag {
    const WIRE_SDK_PROXY: u8 = 0x01;
    const WIRE_EXTERNAL_CONNECTION: u8 = 0x02;
    const WIRE_TOKEN_REFRESH: u8 = 0x03;

    fn from_wire(value: u8) -> Option<Self> {
        match value {
            Self::WIRE_SDK_PROXY => Some(Self::SdkProxyRequest),
            Self::WIRE_EXTERNAL_CONNECTION => Some(Self::ExternalConnectionRequest),
            Self::WIRE_TOKEN_REFRESH => Some(Self::TokenRefreshRequest),
            _ => None,
        }
    }

    const fn to_wire(self) -> u8 {
        match self {
            Self::SdkProxyRequest => Self::WIRE_SDK_PROXY,
            Self::ExternalConnectionRequest => Self::WIRE_EXTERNAL_CONNECTION,
            Self::TokenRefreshRequest => Self::WIRE_TOKEN_REFRESH,
        }
    }
}

/// A proxied SDK request carried over BLE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkProxyRequest {
    /// Correlates the reply with the daemon-side caller.
    pub message_id: String,
    /// Client identity presented by the BLE peer.
    pub client_guid: String,
    /// Request path.
    pub path: String,
    /// JSON request body.
    pub json: String,
}

/// Messages the security daemon sends to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecdRequest {
    /// Proxy an SDK HTTP request on behalf of a BLE client.
    SdkProxy(SdkProxyRequest),
    /// Ask whether an external client is connected, and which.
    ExternalConnection,
    /// Ask the gateway to force-refresh the client token.
    TokenRefresh,
}

impl SecdRequest {
    /// Tag of this request.
    #[must_use]
    pub fn tag(&self) -> SecdRequestTag {
        match self {
            Self::SdkProxy(_) => SecdRequestTag::SdkProxyRequest,
            Self::ExternalConnection => SecdRequestTag::ExternalConnectionRequest,
            Self::TokenRefresh => SecdRequestTag::TokenRefreshRequest,
        }
    }

    /// Pack this request into a frame payload.
    ///
    /// Production traffic in this direction originates in the daemon;
    /// the encoder exists so tests can stand in for it.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32);
        out.put_u8(self.tag().to_wire());
        if let Self::SdkProxy(req) = self {
            put_string(&mut out, &req.message_id);
            put_string(&mut out, &req.client_guid);
            put_string(&mut out, &req.path);
            put_string(&mut out, &req.json);
        }
        out
    }
}

/// Replies the gateway writes back to the security daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecdReply {
    /// Outcome of a proxied SDK request.
    SdkProxy {
        /// Correlates with the originating request.
        message_id: String,
        /// HTTP-style status code.
        status_code: u16,
        /// Reply content type.
        content_type: String,
        /// Reply body.
        content: String,
    },
    /// Current external connection state.
    ExternalConnection {
        /// Whether an external client is connected.
        is_connected: bool,
        /// Identifier of the connected client, empty when none.
        connection_id: String,
    },
    /// The forced token refresh finished.
    TokenRefresh,
}

impl SecdReply {
    const WIRE_SDK_PROXY: u8 = 0x81;
    const WIRE_EXTERNAL_CONNECTION: u8 = 0x82;
    const WIRE_TOKEN_REFRESH: u8 = 0x83;

    /// Pack this reply into a frame payload.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32);
        match self {
            Self::SdkProxy {
                message_id,
                status_code,
                content_type,
                content,
            } => {
                out.put_u8(Self::WIRE_SDK_PROXY);
                put_string(&mut out, message_id);
                out.put_u16_le(*status_code);
                put_string(&mut out, content_type);
                put_string(&mut out, content);
            }
            Self::ExternalConnection {
                is_connected,
                connection_id,
            } => {
                out.put_u8(Self::WIRE_EXTERNAL_CONNECTION);
                out.put_u8(u8::from(*is_connected));
                put_string(&mut out, connection_id);
            }
            Self::TokenRefresh => out.put_u8(Self::WIRE_TOKEN_REFRESH),
        }
        out
    }

    /// Decode a reply payload; the inverse of [`SecdReply::encode`],
    /// used by tests standing in for the daemon.
    ///
    /// # Errors
    ///
    /// [`DecodeError`] when the payload is not a well-formed reply.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut cursor = payload;
        let tag = take_u8(&mut cursor)?;
        match tag {
            Self::WIRE_SDK_PROXY => Ok(Self::SdkProxy {
                message_id: take_string(&mut cursor)?,
                status_code: take_u16(&mut cursor)?,
                content_type: take_string(&mut cursor)?,
                content: take_string(&mut cursor)?,
            }),
            Self::WIRE_EXTERNAL_CONNECTION => Ok(Self::ExternalConnection {
                is_connected: take_bool(&mut cursor)?,
                connection_id: take_string(&mut cursor)?,
            }),
            Self::WIRE_TOKEN_REFRESH => Ok(Self::TokenRefresh),
            other => Err(DecodeError::Unknown(format!("secd reply tag {other:#04x}"))),
        }
    }
}

/// Decode one daemon frame payload into a tagged request.
///
/// # Errors
///
/// [`DecodeError::Unknown`] for unmodelled tags and
/// [`DecodeError::Malformed`] for truncated bodies.
pub fn decode_request(payload: &[u8]) -> Result<(SecdRequestTag, SecdRequest), DecodeError> {
    let mut cursor = payload;
    let wire_tag = take_u8(&mut cursor)?;
    let tag = SecdRequestTag::from_wire(wire_tag)
        .ok_or_else(|| DecodeError::Unknown(format!("secd request tag {wire_tag:#04x}")))?;

    let request = match tag {
        SecdRequestTag::SdkProxyRequest => SecdRequest::SdkProxy(SdkProxyRequest {
            message_id: take_string(&mut cursor)?,
            client_guid: take_string(&mut cursor)?,
            path: take_string(&mut cursor)?,
            json: take_string(&mut cursor)?,
        }),
        SecdRequestTag::ExternalConnectionRequest => SecdRequest::ExternalConnection,
        SecdRequestTag::TokenRefreshRequest => SecdRequest::TokenRefresh,
    };
    Ok((tag, request))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_roundtrip() {
        let requests = [
            SecdRequest::SdkProxy(SdkProxyRequest {
                message_id: "m-17".into(),
                client_guid: "guid".into(),
                path: "/v1/battery".into(),
                json: "{}".into(),
            }),
            SecdRequest::ExternalConnection,
            SecdRequest::TokenRefresh,
        ];
        for request in requests {
            let (tag, decoded) = decode_request(&request.encode()).unwrap();
            assert_eq!(tag, request.tag());
            assert_eq!(decoded, request);
        }
    }

    #[test]
    fn test_reply_roundtrip() {
        let replies = [
            SecdReply::SdkProxy {
                message_id: "m-17".into(),
                status_code: 200,
                content_type: "application/json".into(),
                content: "{\"ok\":true}".into(),
            },
            SecdReply::ExternalConnection {
                is_connected: true,
                connection_id: "conn-1".into(),
            },
            SecdReply::TokenRefresh,
        ];
        for reply in replies {
            assert_eq!(SecdReply::decode(&reply.encode()).unwrap(), reply);
        }
    }

    #[test]
    fn test_unknown_request_tag() {
        assert!(matches!(
            decode_request(&[0x44]),
            Err(DecodeError::Unknown(_))
        ));
    }
}
