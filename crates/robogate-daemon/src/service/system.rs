//! System-level handlers: probes, battery, onboarding, auth bootstrap.

use robogate_core::schema::envelope::{
    gateway_envelope::Payload, BatteryStateRequest, EnvelopeTag, GatewayEnvelope,
    OnboardingStateRequest, Ping, Pong,
};
use robogate_core::token::TokenError;
use tracing::debug;

use super::messages::{
    BatteryStateResult, OnboardingStateResult, ResultStatus, UserAuthenticationRequest,
    UserAuthenticationResponse, WifiScanRequest, WifiScanResponse,
};
use super::{ExternalService, RpcError};

impl ExternalService {
    /// Round-trip a probe value through the engine.
    ///
    /// # Errors
    ///
    /// `internal` when the write fails, `deadline-exceeded` when no
    /// pong arrives in the response window.
    pub async fn pang(&self, request: Ping) -> Result<Pong, RpcError> {
        debug!(?request, "rpc pang");
        let mut response = self.envelope().registry().subscribe(EnvelopeTag::Pong, 1);

        self.send_envelope(&GatewayEnvelope::new(Payload::Ping(request)))
            .await?;

        let envelope = self.await_response(&mut response).await?;
        match envelope.payload {
            Some(Payload::Pong(pong)) => Ok(pong),
            _ => Err(RpcError::internal("unexpected payload on response tag")),
        }
    }

    /// Fetch the engine's battery snapshot.
    ///
    /// # Errors
    ///
    /// `internal` when the write fails, `deadline-exceeded` when no
    /// snapshot arrives in the response window.
    pub async fn battery_state(&self) -> Result<BatteryStateResult, RpcError> {
        debug!("rpc battery_state");
        let mut response = self
            .envelope()
            .registry()
            .subscribe(EnvelopeTag::BatteryStateResponse, 1);

        self.send_envelope(&GatewayEnvelope::new(Payload::BatteryStateRequest(
            BatteryStateRequest {},
        )))
        .await?;

        let envelope = self.await_response(&mut response).await?;
        match envelope.payload {
            Some(Payload::BatteryStateResponse(state)) => Ok(BatteryStateResult {
                status: ResultStatus::sent_to_engine(),
                state,
            }),
            _ => Err(RpcError::internal("unexpected payload on response tag")),
        }
    }

    /// Fetch the current onboarding stage.
    ///
    /// # Errors
    ///
    /// `internal` when the write fails, `deadline-exceeded` when no
    /// reply arrives in the response window.
    pub async fn onboarding_state(&self) -> Result<OnboardingStateResult, RpcError> {
        debug!("rpc onboarding_state");
        let mut response = self
            .envelope()
            .registry()
            .subscribe(EnvelopeTag::OnboardingState, 1);

        self.send_envelope(&GatewayEnvelope::new(Payload::OnboardingStateRequest(
            OnboardingStateRequest {},
        )))
        .await?;

        let envelope = self.await_response(&mut response).await?;
        match envelope.payload {
            Some(Payload::OnboardingState(state)) => Ok(OnboardingStateResult {
                status: ResultStatus::sent_to_engine(),
                stage: state.stage,
            }),
            _ => Err(RpcError::internal("unexpected payload on response tag")),
        }
    }

    /// Exchange an app user session for a client token. The one method
    /// the authorization gate exempts.
    ///
    /// # Errors
    ///
    /// `failed-precondition` when the gateway runs without a token
    /// authority, `unauthenticated` when the session belongs to a
    /// different account, `internal` for cloud failures.
    pub async fn user_authentication(
        &self,
        request: UserAuthenticationRequest,
    ) -> Result<UserAuthenticationResponse, RpcError> {
        debug!(client_name = %request.client_name, "rpc user_authentication");
        let Some(authority) = self.authority() else {
            return Err(RpcError::failed_precondition(
                "gateway is running without a token authority",
            ));
        };
        if request.user_session_id.is_empty() {
            return Err(RpcError::invalid_argument("user session id must not be empty"));
        }

        match authority.authenticate(request.user_session_id).await {
            Ok(outcome) => Ok(UserAuthenticationResponse {
                status: ResultStatus::new("Authentication succeeded"),
                client_token_guid: outcome.client_token,
            }),
            Err(TokenError::WrongAccount) => Err(RpcError::unauthenticated(
                "session belongs to a different account",
            )),
            Err(err) => Err(RpcError::internal(err.to_string())),
        }
    }

    /// Wifi scanning is handled by a different on-device service.
    ///
    /// # Errors
    ///
    /// Always `unimplemented`.
    pub async fn wifi_scan(&self, _request: WifiScanRequest) -> Result<WifiScanResponse, RpcError> {
        debug!("rpc wifi_scan");
        Err(RpcError::unimplemented("WifiScan not yet implemented"))
    }
}
