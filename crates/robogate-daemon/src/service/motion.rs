//! Motion and intent handlers: the fire-and-forget shape.
//!
//! Translate the request into an engine command, write it, return the
//! canned acknowledgement. A write failure is the RPC error; there is
//! no engine response to wait for.

use robogate_core::schema::engine::EngineCommand;
use tracing::debug;

use super::messages::{
    AppIntentRequest, AppIntentResponse, DriveArcRequest, DriveArcResponse, DriveWheelsRequest,
    DriveWheelsResponse, MoveHeadRequest, MoveHeadResponse, MoveLiftRequest, MoveLiftResponse,
    ResultStatus, SetBackpackLedsRequest, SetBackpackLedsResponse,
};
use super::{ExternalService, RpcError};

/// Number of backpack lights.
const BACKPACK_LIGHT_COUNT: usize = 3;

fn translate_drive_wheels(request: &DriveWheelsRequest) -> EngineCommand {
    EngineCommand::DriveWheels {
        left_wheel_mmps: request.left_wheel_mmps,
        right_wheel_mmps: request.right_wheel_mmps,
        left_wheel_mmps2: request.left_wheel_mmps2,
        right_wheel_mmps2: request.right_wheel_mmps2,
    }
}

impl ExternalService {
    /// Drive the wheels directly.
    ///
    /// # Errors
    ///
    /// `internal` when the engine write fails.
    pub async fn drive_wheels(
        &self,
        request: DriveWheelsRequest,
    ) -> Result<DriveWheelsResponse, RpcError> {
        debug!(?request, "rpc drive_wheels");
        self.send_engine(&translate_drive_wheels(&request)).await?;
        Ok(DriveWheelsResponse {
            status: ResultStatus::sent_to_engine(),
        })
    }

    /// Move the head motor.
    ///
    /// # Errors
    ///
    /// `internal` when the engine write fails.
    pub async fn move_head(&self, request: MoveHeadRequest) -> Result<MoveHeadResponse, RpcError> {
        debug!(?request, "rpc move_head");
        self.send_engine(&EngineCommand::MoveHead {
            speed_rad_per_sec: request.speed_rad_per_sec,
        })
        .await?;
        Ok(MoveHeadResponse {
            status: ResultStatus::sent_to_engine(),
        })
    }

    /// Move the lift motor.
    ///
    /// # Errors
    ///
    /// `internal` when the engine write fails.
    pub async fn move_lift(&self, request: MoveLiftRequest) -> Result<MoveLiftResponse, RpcError> {
        debug!(?request, "rpc move_lift");
        self.send_engine(&EngineCommand::MoveLift {
            speed_rad_per_sec: request.speed_rad_per_sec,
        })
        .await?;
        Ok(MoveLiftResponse {
            status: ResultStatus::sent_to_engine(),
        })
    }

    /// Drive along an arc.
    ///
    /// # Errors
    ///
    /// `internal` when the engine write fails.
    pub async fn drive_arc(&self, request: DriveArcRequest) -> Result<DriveArcResponse, RpcError> {
        debug!(?request, "rpc drive_arc");
        self.send_engine(&EngineCommand::DriveArc {
            speed_mmps: request.speed_mmps,
            accel_mmps2: request.accel_mmps2,
            curvature_radius_mm: request.curvature_radius_mm,
        })
        .await?;
        Ok(DriveArcResponse {
            status: ResultStatus::sent_to_engine(),
        })
    }

    /// Forward an app-initiated intent to the behaviour system.
    ///
    /// # Errors
    ///
    /// `invalid-argument` for an empty intent, `internal` when the
    /// engine write fails.
    pub async fn app_intent(
        &self,
        request: AppIntentRequest,
    ) -> Result<AppIntentResponse, RpcError> {
        debug!(?request, "rpc app_intent");
        if request.intent.is_empty() {
            return Err(RpcError::invalid_argument("intent must not be empty"));
        }
        self.send_engine(&EngineCommand::AppIntent {
            intent: request.intent,
            param: request.param,
        })
        .await?;
        Ok(AppIntentResponse {
            status: ResultStatus::sent_to_engine(),
        })
    }

    /// Set the backpack light colors.
    ///
    /// # Errors
    ///
    /// `invalid-argument` unless exactly one color per light is given,
    /// `internal` when the engine write fails.
    pub async fn set_backpack_leds(
        &self,
        request: SetBackpackLedsRequest,
    ) -> Result<SetBackpackLedsResponse, RpcError> {
        debug!(?request, "rpc set_backpack_leds");
        let colors: [u32; BACKPACK_LIGHT_COUNT] =
            request.colors.as_slice().try_into().map_err(|_| {
                RpcError::invalid_argument(format!(
                    "expected {BACKPACK_LIGHT_COUNT} colors, got {}",
                    request.colors.len(),
                ))
            })?;
        self.send_engine(&EngineCommand::SetBackpackLeds { colors })
            .await?;
        Ok(SetBackpackLedsResponse {
            status: ResultStatus::sent_to_engine(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_wheels_translation() {
        let cmd = translate_drive_wheels(&DriveWheelsRequest {
            left_wheel_mmps: 100.0,
            right_wheel_mmps: -100.0,
            left_wheel_mmps2: 0.0,
            right_wheel_mmps2: 0.0,
        });
        assert_eq!(
            cmd,
            EngineCommand::DriveWheels {
                left_wheel_mmps: 100.0,
                right_wheel_mmps: -100.0,
                left_wheel_mmps2: 0.0,
                right_wheel_mmps2: 0.0,
            }
        );
    }
}
