//! Structured engine schema: the protobuf envelope.
//!
//! Messages crossing the structured engine socket are wrapped in a
//! single [`GatewayEnvelope`] with a oneof payload, mirroring the
//! external interface types. The message structs are written by hand
//! against the wire contract; tag numbers are part of that contract
//! and must not be reshuffled.

use prost::Message;

use crate::peer::DecodeError;

/// Envelope wrapping every message on the structured engine socket.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GatewayEnvelope {
    /// The wrapped message.
    #[prost(
        oneof = "gateway_envelope::Payload",
        tags = "1, 2, 3, 4, 5, 6, 7, 8, 9, 10"
    )]
    pub payload: Option<gateway_envelope::Payload>,
}

/// Nested types for [`GatewayEnvelope`].
pub mod gateway_envelope {
    /// The envelope's oneof payload.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        /// Connectivity probe.
        #[prost(message, tag = "1")]
        Ping(super::Ping),
        /// Connectivity probe reply.
        #[prost(message, tag = "2")]
        Pong(super::Pong),
        /// Battery snapshot request.
        #[prost(message, tag = "3")]
        BatteryStateRequest(super::BatteryStateRequest),
        /// Battery snapshot reply.
        #[prost(message, tag = "4")]
        BatteryStateResponse(super::BatteryStateResponse),
        /// Settings update request.
        #[prost(message, tag = "5")]
        UpdateSettingsRequest(super::UpdateSettingsRequest),
        /// Settings update reply.
        #[prost(message, tag = "6")]
        UpdateSettingsResponse(super::UpdateSettingsResponse),
        /// Onboarding stage request.
        #[prost(message, tag = "7")]
        OnboardingStateRequest(super::OnboardingStateRequest),
        /// Onboarding stage reply.
        #[prost(message, tag = "8")]
        OnboardingState(super::OnboardingState),
        /// Animation start acknowledgement.
        #[prost(message, tag = "9")]
        PlayAnimationResponse(super::PlayAnimationResponse),
        /// Engine-originated event.
        #[prost(message, tag = "10")]
        Event(super::Event),
    }
}

/// Connectivity probe.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Ping {
    /// Echoed by the engine in the matching [`Pong`].
    #[prost(uint32, tag = "1")]
    pub value: u32,
}

/// Connectivity probe reply.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Pong {
    /// Value from the originating [`Ping`].
    #[prost(uint32, tag = "1")]
    pub value: u32,
}

/// Battery snapshot request.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct BatteryStateRequest {}

/// Battery snapshot reply.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct BatteryStateResponse {
    /// Battery voltage.
    #[prost(float, tag = "1")]
    pub battery_volts: f32,
    /// Whether the robot is charging.
    #[prost(bool, tag = "2")]
    pub is_charging: bool,
    /// Whether the robot is on the charger platform.
    #[prost(bool, tag = "3")]
    pub is_on_charger_platform: bool,
    /// Suggested time on charger, in seconds.
    #[prost(float, tag = "4")]
    pub suggested_charger_sec: f32,
}

/// Robot settings document.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RobotSettings {
    /// 24-hour clock display.
    #[prost(bool, tag = "1")]
    pub clock_24_hour: bool,
    /// Fahrenheit temperature display.
    #[prost(bool, tag = "2")]
    pub temp_is_fahrenheit: bool,
    /// Default location string.
    #[prost(string, tag = "3")]
    pub default_location: ::prost::alloc::string::String,
    /// BCP-47 locale.
    #[prost(string, tag = "4")]
    pub locale: ::prost::alloc::string::String,
    /// Master volume level.
    #[prost(uint32, tag = "5")]
    pub master_volume: u32,
    /// Eye color index.
    #[prost(uint32, tag = "6")]
    pub eye_color: u32,
}

/// Settings update request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateSettingsRequest {
    /// The settings document to apply.
    #[prost(message, optional, tag = "1")]
    pub settings: Option<RobotSettings>,
}

/// Settings update reply.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct UpdateSettingsResponse {
    /// Outcome of the update.
    #[prost(enumeration = "ResultCode", tag = "1")]
    pub code: i32,
}

/// Domain outcome codes carried inside responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ResultCode {
    /// Request applied.
    Ok = 0,
    /// A settings update is already in flight.
    UpdateInProgress = 1,
}

/// Onboarding stage request.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct OnboardingStateRequest {}

/// Onboarding stage reply.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct OnboardingState {
    /// Current onboarding stage.
    #[prost(uint32, tag = "1")]
    pub stage: u32,
}

/// Animation start acknowledgement.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PlayAnimationResponse {
    /// Name of the animation the engine started.
    #[prost(string, tag = "1")]
    pub animation_name: ::prost::alloc::string::String,
}

/// Engine-originated event published to streaming clients.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Event {
    /// The concrete event.
    #[prost(oneof = "event::Kind", tags = "1, 2, 3")]
    pub kind: Option<event::Kind>,
}

/// Nested types for [`Event`].
pub mod event {
    /// The concrete event kind.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Kind {
        /// A connected object was tapped.
        #[prost(message, tag = "1")]
        ObjectTapped(super::ObjectTapped),
        /// A connected object moved.
        #[prost(message, tag = "2")]
        ObjectMoved(super::ObjectMoved),
        /// Wake word detection started.
        #[prost(message, tag = "3")]
        WakeWordBegin(super::WakeWordBegin),
    }
}

/// A connected object was tapped.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ObjectTapped {
    /// Engine-assigned object id.
    #[prost(uint32, tag = "1")]
    pub object_id: u32,
}

/// A connected object moved.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ObjectMoved {
    /// Engine-assigned object id.
    #[prost(uint32, tag = "1")]
    pub object_id: u32,
}

/// Wake word detection started.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct WakeWordBegin {}

/// Dispatch tags for envelope payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)] // names mirror the payload variants
pub enum EnvelopeTag {
    Ping,
    Pong,
    BatteryStateRequest,
    BatteryStateResponse,
    UpdateSettingsRequest,
    UpdateSettingsResponse,
    OnboardingStateRequest,
    OnboardingState,
    PlayAnimationResponse,
    Event,
}

impl GatewayEnvelope {
    /// Wrap a payload.
    #[must_use]
    pub fn new(payload: gateway_envelope::Payload) -> Self {
        Self {
            payload: Some(payload),
        }
    }

    /// Dispatch tag of the wrapped payload, if any.
    #[must_use]
    pub fn tag(&self) -> Option<EnvelopeTag> {
        use gateway_envelope::Payload;
        self.payload.as_ref().map(|payload| match payload {
            Payload::Ping(_) => EnvelopeTag::Ping,
            Payload::Pong(_) => EnvelopeTag::Pong,
            Payload::BatteryStateRequest(_) => EnvelopeTag::BatteryStateRequest,
            Payload::BatteryStateResponse(_) => EnvelopeTag::BatteryStateResponse,
            Payload::UpdateSettingsRequest(_) => EnvelopeTag::UpdateSettingsRequest,
            Payload::UpdateSettingsResponse(_) => EnvelopeTag::UpdateSettingsResponse,
            Payload::OnboardingStateRequest(_) => EnvelopeTag::OnboardingStateRequest,
            Payload::OnboardingState(_) => EnvelopeTag::OnboardingState,
            Payload::PlayAnimationResponse(_) => EnvelopeTag::PlayAnimationResponse,
            Payload::Event(_) => EnvelopeTag::Event,
        })
    }
}

/// Serialize an envelope into a frame payload.
#[must_use]
pub fn encode_envelope(envelope: &GatewayEnvelope) -> Vec<u8> {
    envelope.encode_to_vec()
}

/// Decode one structured-socket frame payload.
///
/// # Errors
///
/// [`DecodeError::Malformed`] when the bytes are not a valid envelope
/// and [`DecodeError::Unknown`] when the envelope carries no payload
/// this build models. Neither is fatal to the pump; unknown messages
/// from a newer engine are expected and merely counted.
pub fn decode_envelope(payload: &[u8]) -> Result<(EnvelopeTag, GatewayEnvelope), DecodeError> {
    let envelope = GatewayEnvelope::decode(payload)
        .map_err(|err| DecodeError::Malformed(err.to_string()))?;
    match envelope.tag() {
        Some(tag) => Ok((tag, envelope)),
        None => Err(DecodeError::Unknown("envelope without known payload".into())),
    }
}
