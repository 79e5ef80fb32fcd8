//! Animation handlers.
//!
//! `play_animation` correlates across peers: the command goes out on
//! the legacy engine socket, the acknowledgement comes back on the
//! structured one. `list_animations` collects a repeated-item sequence
//! terminated by an end-of-reports marker.

use robogate_core::schema::engine::{EngineCommand, EngineReport, EngineReportTag};
use robogate_core::schema::envelope::{gateway_envelope::Payload, EnvelopeTag};
use tracing::debug;

use super::messages::{
    ListAnimationsRequest, ListAnimationsResult, PlayAnimationRequest, PlayAnimationResult,
    ResultStatus,
};
use super::{ExternalService, RpcError, COLLECT_TIMEOUT};

/// Queue depth for the repeated animation-name reports. The engine
/// bursts the whole list before the handler gets scheduled again, so
/// the queue must absorb it.
const ANIMATION_LIST_CAPACITY: usize = 1000;

/// Queue depth for the end-of-reports marker.
const END_OF_REPORTS_CAPACITY: usize = 5;

impl ExternalService {
    /// Start a canned animation and wait for the engine to acknowledge
    /// it.
    ///
    /// # Errors
    ///
    /// `invalid-argument` for an empty name, `internal` when the write
    /// fails, `deadline-exceeded` when no acknowledgement arrives.
    pub async fn play_animation(
        &self,
        request: PlayAnimationRequest,
    ) -> Result<PlayAnimationResult, RpcError> {
        debug!(?request, "rpc play_animation");
        if request.name.is_empty() {
            return Err(RpcError::invalid_argument("animation name must not be empty"));
        }

        let mut response = self
            .envelope()
            .registry()
            .subscribe(EnvelopeTag::PlayAnimationResponse, 1);

        self.send_engine(&EngineCommand::PlayAnimation {
            loops: request.loops,
            name: request.name,
        })
        .await?;

        let envelope = self.await_response(&mut response).await?;
        let Some(Payload::PlayAnimationResponse(ack)) = envelope.payload else {
            return Err(RpcError::internal("unexpected payload on response tag"));
        };
        Ok(PlayAnimationResult {
            status: ResultStatus::sent_to_engine(),
            animation_name: ack.animation_name,
        })
    }

    /// Enumerate the canned animations the engine knows.
    ///
    /// The engine answers with one report per animation followed by an
    /// end-of-reports marker; the handler accumulates until the marker
    /// or the collection deadline.
    ///
    /// # Errors
    ///
    /// `internal` when the write fails, `deadline-exceeded` when the
    /// sequence does not finish within [`COLLECT_TIMEOUT`].
    pub async fn list_animations(
        &self,
        request: ListAnimationsRequest,
    ) -> Result<ListAnimationsResult, RpcError> {
        debug!(?request, "rpc list_animations");

        let mut items = self
            .engine()
            .registry()
            .subscribe(EngineReportTag::AnimationAvailable, ANIMATION_LIST_CAPACITY);
        let mut end = self
            .engine()
            .registry()
            .subscribe(EngineReportTag::EndOfReports, END_OF_REPORTS_CAPACITY);

        self.send_engine(&EngineCommand::ListAnimations).await?;

        let mut names = Vec::new();
        let collect = async {
            loop {
                tokio::select! {
                    item = items.recv() => match item {
                        Some(EngineReport::AnimationAvailable { name }) => names.push(name),
                        Some(_) => {}
                        None => return Err(RpcError::internal("animation queue closed")),
                    },
                    marker = end.recv() => match marker {
                        Some(EngineReport::EndOfReports { report })
                            if report == EngineReportTag::AnimationAvailable =>
                        {
                            return Ok(());
                        }
                        Some(_) => {}
                        None => return Err(RpcError::internal("end-of-reports queue closed")),
                    },
                }
            }
        };
        match tokio::time::timeout(COLLECT_TIMEOUT, collect).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                return Err(RpcError::deadline_exceeded("ListAnimations request timed out"));
            }
        }

        debug!(count = names.len(), "final animation list report received");
        Ok(ListAnimationsResult {
            status: ResultStatus::new("Available animations returned"),
            animation_names: names,
        })
    }
}
