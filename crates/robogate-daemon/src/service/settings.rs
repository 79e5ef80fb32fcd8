//! Settings handler: the unique-subscription shape.
//!
//! Only one settings update may be in flight at a time; a second
//! caller gets a domain status back, not an error, so apps can retry
//! on their own schedule.

use robogate_core::schema::envelope::{
    gateway_envelope::Payload, EnvelopeTag, GatewayEnvelope, ResultCode, UpdateSettingsRequest,
};
use tracing::debug;

use super::messages::UpdateSettingsResult;
use super::{ExternalService, RpcError};

impl ExternalService {
    /// Apply a settings document.
    ///
    /// # Errors
    ///
    /// `invalid-argument` without a settings document, `internal` when
    /// the write fails, `deadline-exceeded` when the engine never
    /// answers.
    pub async fn update_settings(
        &self,
        request: UpdateSettingsRequest,
    ) -> Result<UpdateSettingsResult, RpcError> {
        debug!("rpc update_settings");
        if request.settings.is_none() {
            return Err(RpcError::invalid_argument("request carries no settings"));
        }

        let Ok(mut response) = self
            .envelope()
            .registry()
            .subscribe_unique(EnvelopeTag::UpdateSettingsResponse, 1)
        else {
            debug!("settings update already in flight");
            return Ok(UpdateSettingsResult {
                code: ResultCode::UpdateInProgress,
            });
        };

        self.send_envelope(&GatewayEnvelope::new(Payload::UpdateSettingsRequest(request)))
            .await?;

        let envelope = self.await_response(&mut response).await?;
        match envelope.payload {
            Some(Payload::UpdateSettingsResponse(reply)) => Ok(UpdateSettingsResult {
                code: ResultCode::try_from(reply.code).unwrap_or(ResultCode::Ok),
            }),
            _ => Err(RpcError::internal("unexpected payload on response tag")),
        }
    }
}
