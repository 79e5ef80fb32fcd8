//! Server-streaming handlers.
//!
//! A streaming handler subscribes with headroom, then forwards every
//! delivery into the caller's sink. It ends in one of two ways: the
//! client goes away (sink refuses the item, surfaced as `cancelled`
//! so the client learns it if it did not mean to hang up), or the
//! delivery queue closes underneath us (eviction or shutdown), which
//! is a normal end of stream.

use async_trait::async_trait;
use robogate_core::schema::engine::{EngineReport, EngineReportTag};
use robogate_core::schema::envelope::{gateway_envelope::Payload, EnvelopeTag};
use tokio::sync::mpsc;
use tracing::debug;

use super::messages::{EventRequest, EventResult, RobotStateRequest, RobotStateResult};
use super::{ExternalService, RpcError};

/// Queue depth for streaming subscriptions.
const STREAM_CAPACITY: usize = 16;

/// The receiving side of a server stream went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkClosed;

/// Where a streaming handler writes its items.
#[async_trait]
pub trait ResponseSink<T: Send>: Send {
    /// Hand one item to the client.
    async fn send(&mut self, item: T) -> Result<(), SinkClosed>;
}

#[async_trait]
impl<T: Send> ResponseSink<T> for mpsc::Sender<T> {
    async fn send(&mut self, item: T) -> Result<(), SinkClosed> {
        mpsc::Sender::send(self, item).await.map_err(|_| SinkClosed)
    }
}

impl ExternalService {
    /// Stream robot state snapshots until the client hangs up.
    ///
    /// # Errors
    ///
    /// `cancelled` when the sink closes mid-stream.
    pub async fn robot_state_stream<S: ResponseSink<RobotStateResult>>(
        &self,
        request: RobotStateRequest,
        sink: &mut S,
    ) -> Result<(), RpcError> {
        debug!(?request, "rpc robot_state_stream");
        let mut sub = self
            .engine()
            .registry()
            .subscribe(EngineReportTag::RobotState, STREAM_CAPACITY);

        while let Some(report) = sub.recv().await {
            let EngineReport::RobotState(state) = report else {
                continue;
            };
            if sink.send(RobotStateResult { state }).await.is_err() {
                return Err(RpcError::cancelled("client closed the state stream"));
            }
        }
        debug!("robot state queue closed, ending stream");
        Ok(())
    }

    /// Stream behaviour events until the client hangs up.
    ///
    /// # Errors
    ///
    /// `cancelled` when the sink closes mid-stream.
    pub async fn event_stream<S: ResponseSink<EventResult>>(
        &self,
        request: EventRequest,
        sink: &mut S,
    ) -> Result<(), RpcError> {
        debug!(?request, "rpc event_stream");
        let mut sub = self
            .envelope()
            .registry()
            .subscribe(EnvelopeTag::Event, STREAM_CAPACITY);

        while let Some(envelope) = sub.recv().await {
            let Some(Payload::Event(event)) = envelope.payload else {
                continue;
            };
            if sink.send(EventResult { event }).await.is_err() {
                return Err(RpcError::cancelled("client closed the event stream"));
            }
        }
        debug!("event queue closed, ending stream");
        Ok(())
    }
}
