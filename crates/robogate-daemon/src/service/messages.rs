//! Request and response types of the RPC surface.
//!
//! These mirror the external interface schema. Engine-bound requests
//! are distinct from the wire types and get translated in their
//! handlers; envelope-bound RPCs reuse the envelope message types
//! directly, as the wire envelope wraps the external types unchanged.

use robogate_core::schema::engine::RobotState;
use robogate_core::schema::envelope::{BatteryStateResponse, Event, ResultCode};

/// Per-response status envelope every unary success carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultStatus {
    /// Human-readable outcome description.
    pub description: String,
}

impl ResultStatus {
    /// Build a status from a description.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }

    /// The canned acknowledgement for fire-and-forget requests.
    #[must_use]
    pub fn sent_to_engine() -> Self {
        Self::new("Message sent to engine")
    }
}

/// Direct wheel control request.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DriveWheelsRequest {
    /// Left wheel speed in mm/s.
    pub left_wheel_mmps: f32,
    /// Right wheel speed in mm/s.
    pub right_wheel_mmps: f32,
    /// Left wheel acceleration in mm/s².
    pub left_wheel_mmps2: f32,
    /// Right wheel acceleration in mm/s².
    pub right_wheel_mmps2: f32,
}

/// Direct wheel control acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveWheelsResponse {
    /// Outcome status.
    pub status: ResultStatus,
}

/// Head motor request.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MoveHeadRequest {
    /// Signed speed in rad/s.
    pub speed_rad_per_sec: f32,
}

/// Head motor acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveHeadResponse {
    /// Outcome status.
    pub status: ResultStatus,
}

/// Lift motor request.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MoveLiftRequest {
    /// Signed speed in rad/s.
    pub speed_rad_per_sec: f32,
}

/// Lift motor acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveLiftResponse {
    /// Outcome status.
    pub status: ResultStatus,
}

/// Arc drive request.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DriveArcRequest {
    /// Target speed in mm/s.
    pub speed_mmps: f32,
    /// Acceleration in mm/s².
    pub accel_mmps2: f32,
    /// Signed curvature radius in mm.
    pub curvature_radius_mm: f32,
}

/// Arc drive acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveArcResponse {
    /// Outcome status.
    pub status: ResultStatus,
}

/// App intent request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppIntentRequest {
    /// Intent identifier.
    pub intent: String,
    /// Intent parameter payload.
    pub param: String,
}

/// App intent acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIntentResponse {
    /// Outcome status.
    pub status: ResultStatus,
}

/// Backpack light request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SetBackpackLedsRequest {
    /// RGBA colors; must name exactly one color per light.
    pub colors: Vec<u32>,
}

/// Backpack light acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetBackpackLedsResponse {
    /// Outcome status.
    pub status: ResultStatus,
}

/// Animation start request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlayAnimationRequest {
    /// Canned animation name.
    pub name: String,
    /// Number of loops to play.
    pub loops: u32,
}

/// Animation start result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayAnimationResult {
    /// Outcome status.
    pub status: ResultStatus,
    /// Name of the animation the engine started.
    pub animation_name: String,
}

/// Animation list request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListAnimationsRequest {}

/// Animation list result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListAnimationsResult {
    /// Outcome status.
    pub status: ResultStatus,
    /// Names of every available animation.
    pub animation_names: Vec<String>,
}

/// Battery snapshot result.
#[derive(Debug, Clone, PartialEq)]
pub struct BatteryStateResult {
    /// Outcome status.
    pub status: ResultStatus,
    /// The engine's battery snapshot.
    pub state: BatteryStateResponse,
}

/// Onboarding stage result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingStateResult {
    /// Outcome status.
    pub status: ResultStatus,
    /// Current onboarding stage.
    pub stage: u32,
}

/// Settings update result. Carries a domain code rather than an RPC
/// error so an in-flight update is an answer, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateSettingsResult {
    /// Outcome of the update.
    pub code: ResultCode,
}

/// User authentication bootstrap request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserAuthenticationRequest {
    /// The app user's session id.
    pub user_session_id: String,
    /// Name of the connecting client.
    pub client_name: String,
}

/// User authentication bootstrap response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAuthenticationResponse {
    /// Outcome status.
    pub status: ResultStatus,
    /// Client token minted for the caller.
    pub client_token_guid: String,
}

/// Wifi scan request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WifiScanRequest {}

/// Wifi scan response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiScanResponse {
    /// Outcome status.
    pub status: ResultStatus,
}

/// Robot state stream request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RobotStateRequest {}

/// One robot state stream item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobotStateResult {
    /// The engine's state snapshot.
    pub state: RobotState,
}

/// Event stream request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventRequest {}

/// One event stream item.
#[derive(Debug, Clone, PartialEq)]
pub struct EventResult {
    /// The event.
    pub event: Event,
}
