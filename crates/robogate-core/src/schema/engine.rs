//! Legacy engine wire schema.
//!
//! Hand-packed messages with a one-byte tag followed by little-endian
//! fields. Commands flow gateway → engine, reports flow engine →
//! gateway. Only the variants the RPC surface actually uses are
//! modelled; everything else the engine emits decodes to an unknown
//! tag and is dropped by the pump.

use bytes::BufMut;

use super::wire::{put_string, take_f32, take_string, take_u32, take_u8};
use crate::peer::DecodeError;

/// Commands the gateway writes to the engine socket.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    /// Direct wheel control.
    DriveWheels {
        /// Left wheel speed in mm/s.
        left_wheel_mmps: f32,
        /// Right wheel speed in mm/s.
        right_wheel_mmps: f32,
        /// Left wheel acceleration in mm/s².
        left_wheel_mmps2: f32,
        /// Right wheel acceleration in mm/s².
        right_wheel_mmps2: f32,
    },
    /// Head motor speed.
    MoveHead {
        /// Signed speed in rad/s.
        speed_rad_per_sec: f32,
    },
    /// Lift motor speed.
    MoveLift {
        /// Signed speed in rad/s.
        speed_rad_per_sec: f32,
    },
    /// Arc drive along a curvature.
    DriveArc {
        /// Target speed in mm/s.
        speed_mmps: f32,
        /// Acceleration in mm/s².
        accel_mmps2: f32,
        /// Signed curvature radius in mm.
        curvature_radius_mm: f32,
    },
    /// Start a canned animation by name.
    PlayAnimation {
        /// Number of loops to play.
        loops: u32,
        /// Canned animation name.
        name: String,
    },
    /// Ask the engine to enumerate available animations.
    ListAnimations,
    /// Forward an app-initiated intent.
    AppIntent {
        /// Intent identifier.
        intent: String,
        /// Intent parameter payload.
        param: String,
    },
    /// Backpack light columns.
    SetBackpackLeds {
        /// RGBA colors, one per light.
        colors: [u32; 3],
    },
}

impl EngineCommand {
    const TAG_DRIVE_WHEELS: u8 = 0x20;
    const TAG_MOVE_HEAD: u8 = 0x21;
    const TAG_MOVE_LIFT: u8 = 0x22;
    const TAG_DRIVE_ARC: u8 = 0x23;
    const TAG_PLAY_ANIMATION: u8 = 0x24;
    const TAG_LIST_ANIMATIONS: u8 = 0x25;
    const TAG_APP_INTENT: u8 = 0x26;
    const TAG_SET_BACKPACK_LEDS: u8 = 0x27;

    /// Pack this command into a frame payload.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32);
        match self {
            Self::DriveWheels {
                left_wheel_mmps,
                right_wheel_mmps,
                left_wheel_mmps2,
                right_wheel_mmps2,
            } => {
                out.put_u8(Self::TAG_DRIVE_WHEELS);
                out.put_f32_le(*left_wheel_mmps);
                out.put_f32_le(*right_wheel_mmps);
                out.put_f32_le(*left_wheel_mmps2);
                out.put_f32_le(*right_wheel_mmps2);
            }
            Self::MoveHead { speed_rad_per_sec } => {
                out.put_u8(Self::TAG_MOVE_HEAD);
                out.put_f32_le(*speed_rad_per_sec);
            }
            Self::MoveLift { speed_rad_per_sec } => {
                out.put_u8(Self::TAG_MOVE_LIFT);
                out.put_f32_le(*speed_rad_per_sec);
            }
            Self::DriveArc {
                speed_mmps,
                accel_mmps2,
                curvature_radius_mm,
            } => {
                out.put_u8(Self::TAG_DRIVE_ARC);
                out.put_f32_le(*speed_mmps);
                out.put_f32_le(*accel_mmps2);
                out.put_f32_le(*curvature_radius_mm);
            }
            Self::PlayAnimation { loops, name } => {
                out.put_u8(Self::TAG_PLAY_ANIMATION);
                out.put_u32_le(*loops);
                put_string(&mut out, name);
            }
            Self::ListAnimations => {
                out.put_u8(Self::TAG_LIST_ANIMATIONS);
            }
            Self::AppIntent { intent, param } => {
                out.put_u8(Self::TAG_APP_INTENT);
                put_string(&mut out, intent);
                put_string(&mut out, param);
            }
            Self::SetBackpackLeds { colors } => {
                out.put_u8(Self::TAG_SET_BACKPACK_LEDS);
                for color in colors {
                    out.put_u32_le(*color);
                }
            }
        }
        out
    }
}

/// Tags of the engine reports the gateway dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineReportTag {
    /// One animation name from an enumeration run.
    AnimationAvailable,
    /// Terminator for a repeated-report sequence.
    EndOfReports,
    /// Periodic robot state snapshot.
    RobotState,
    /// Behaviour event.
    Event,
}

impl EngineReportTag {
    const WIRE_ANIMATION_AVAILABLE: u8 = 0x90;
    const WIRE_END_OF_REPORTS: u8 = 0x91;
    const WIRE_ROBOT_STATE: u8 = 0x92;
    const WIRE_EVENT: u8 = 0x93;

    fn from_wire(value: u8) -> Option<Self> {
        match value {
            Self::WIRE_ANIMATION_AVAILABLE => Some(Self::AnimationAvailable),
            Self::WIRE_END_OF_REPORTS => Some(Self::EndOfReports),
            Self::WIRE_ROBOT_STATE => Some(Self::RobotState),
            Self::WIRE_EVENT => Some(Self::Event),
            _ => None,
        }
    }

    const fn to_wire(self) -> u8 {
        match self {
            Self::AnimationAvailable => Self::WIRE_ANIMATION_AVAILABLE,
            Self::EndOfReports => Self::WIRE_END_OF_REPORTS,
            Self::RobotState => Self::WIRE_ROBOT_STATE,
            Self::Event => Self::WIRE_EVENT,
        }
    }
}

/// Reports the engine writes back to the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineReport {
    /// One animation name from an enumeration run.
    AnimationAvailable {
        /// Canned animation name.
        name: String,
    },
    /// Terminator for a repeated-report sequence.
    EndOfReports {
        /// Which repeated report the sequence carried.
        report: EngineReportTag,
    },
    /// Periodic robot state snapshot.
    RobotState(RobotState),
    /// Behaviour event.
    Event(EngineEvent),
}

/// Robot pose and status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RobotState {
    /// Pose x in mm.
    pub pose_x_mm: f32,
    /// Pose y in mm.
    pub pose_y_mm: f32,
    /// Heading in radians.
    pub pose_angle_rad: f32,
    /// Head angle in radians.
    pub head_angle_rad: f32,
    /// Lift height in mm.
    pub lift_height_mm: f32,
    /// Battery voltage.
    pub battery_voltage: f32,
    /// Bitmask of engine status flags.
    pub status: u32,
}

/// Behaviour events the engine reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// A connected object was tapped.
    ObjectTapped {
        /// Engine-assigned object id.
        object_id: u32,
    },
    /// A connected object moved.
    ObjectMoved {
        /// Engine-assigned object id.
        object_id: u32,
    },
    /// Wake word detection started.
    WakeWordBegin,
}

impl EngineEvent {
    const KIND_OBJECT_TAPPED: u8 = 0x01;
    const KIND_OBJECT_MOVED: u8 = 0x02;
    const KIND_WAKE_WORD_BEGIN: u8 = 0x03;
}

impl EngineReport {
    /// Tag of this report.
    #[must_use]
    pub fn tag(&self) -> EngineReportTag {
        match self {
            Self::AnimationAvailable { .. } => EngineReportTag::AnimationAvailable,
            Self::EndOfReports { .. } => EngineReportTag::EndOfReports,
            Self::RobotState(_) => EngineReportTag::RobotState,
            Self::Event(_) => EngineReportTag::Event,
        }
    }

    /// Pack this report into a frame payload.
    ///
    /// The gateway never writes reports in production; this is the
    /// other half of [`decode_report`] and is used to stand in for the
    /// engine in tests.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32);
        out.put_u8(self.tag().to_wire());
        match self {
            Self::AnimationAvailable { name } => put_string(&mut out, name),
            Self::EndOfReports { report } => out.put_u8(report.to_wire()),
            Self::RobotState(state) => {
                out.put_f32_le(state.pose_x_mm);
                out.put_f32_le(state.pose_y_mm);
                out.put_f32_le(state.pose_angle_rad);
                out.put_f32_le(state.head_angle_rad);
                out.put_f32_le(state.lift_height_mm);
                out.put_f32_le(state.battery_voltage);
                out.put_u32_le(state.status);
            }
            Self::Event(event) => match event {
                EngineEvent::ObjectTapped { object_id } => {
                    out.put_u8(EngineEvent::KIND_OBJECT_TAPPED);
                    out.put_u32_le(*object_id);
                }
                EngineEvent::ObjectMoved { object_id } => {
                    out.put_u8(EngineEvent::KIND_OBJECT_MOVED);
                    out.put_u32_le(*object_id);
                }
                EngineEvent::WakeWordBegin => {
                    out.put_u8(EngineEvent::KIND_WAKE_WORD_BEGIN);
                }
            },
        }
        out
    }
}

/// Decode one engine frame payload into a tagged report.
///
/// # Errors
///
/// [`DecodeError::Unknown`] for tags outside the modelled subset
/// (dropped silently upstream) and [`DecodeError::Malformed`] for
/// truncated bodies.
pub fn decode_report(payload: &[u8]) -> Result<(EngineReportTag, EngineReport), DecodeError> {
    let mut cursor = payload;
    let wire_tag = take_u8(&mut cursor)?;
    let tag = EngineReportTag::from_wire(wire_tag)
        .ok_or_else(|| DecodeError::Unknown(format!("engine report tag {wire_tag:#04x}")))?;

    let report = match tag {
        EngineReportTag::AnimationAvailable => EngineReport::AnimationAvailable {
            name: take_string(&mut cursor)?,
        },
        EngineReportTag::EndOfReports => {
            let inner = take_u8(&mut cursor)?;
            EngineReport::EndOfReports {
                report: EngineReportTag::from_wire(inner).ok_or_else(|| {
                    DecodeError::Malformed(format!("end-of-reports for unknown tag {inner:#04x}"))
                })?,
            }
        }
        EngineReportTag::RobotState => EngineReport::RobotState(RobotState {
            pose_x_mm: take_f32(&mut cursor)?,
            pose_y_mm: take_f32(&mut cursor)?,
            pose_angle_rad: take_f32(&mut cursor)?,
            head_angle_rad: take_f32(&mut cursor)?,
            lift_height_mm: take_f32(&mut cursor)?,
            battery_voltage: take_f32(&mut cursor)?,
            status: take_u32(&mut cursor)?,
        }),
        EngineReportTag::Event => {
            let kind = take_u8(&mut cursor)?;
            let event = match kind {
                EngineEvent::KIND_OBJECT_TAPPED => EngineEvent::ObjectTapped {
                    object_id: take_u32(&mut cursor)?,
                },
                EngineEvent::KIND_OBJECT_MOVED => EngineEvent::ObjectMoved {
                    object_id: take_u32(&mut cursor)?,
                },
                EngineEvent::KIND_WAKE_WORD_BEGIN => EngineEvent::WakeWordBegin,
                other => {
                    return Err(DecodeError::Malformed(format!(
                        "unknown engine event kind {other:#04x}",
                    )))
                }
            };
            EngineReport::Event(event)
        }
    };
    Ok((tag, report))
}
