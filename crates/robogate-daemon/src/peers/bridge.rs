//! Event bridge: engine wire-schema events, republished as envelope
//! events.
//!
//! Event traffic still originates on the legacy engine socket, but
//! streaming clients subscribe to the structured registry. The bridge
//! is a thin adapter owned by the daemon; neither peer knows about the
//! other. It subscribes like any other listener, translates, and
//! delivers on the envelope registry.

use std::sync::Arc;

use robogate_core::schema::engine::{EngineEvent, EngineReport, EngineReportTag};
use robogate_core::schema::envelope::{
    event, gateway_envelope, Event, GatewayEnvelope, ObjectMoved, ObjectTapped, WakeWordBegin,
};
use robogate_core::schema::envelope::EnvelopeTag;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{EnginePeer, EnvelopePeer};

/// Queue depth for the bridge's own event subscription.
const BRIDGE_CAPACITY: usize = 16;

/// Translate an engine event into its envelope form.
#[must_use]
pub fn translate_event(event: EngineEvent) -> Event {
    let kind = match event {
        EngineEvent::ObjectTapped { object_id } => {
            event::Kind::ObjectTapped(ObjectTapped { object_id })
        }
        EngineEvent::ObjectMoved { object_id } => {
            event::Kind::ObjectMoved(ObjectMoved { object_id })
        }
        EngineEvent::WakeWordBegin => event::Kind::WakeWordBegin(WakeWordBegin {}),
    };
    Event { kind: Some(kind) }
}

/// Start the bridge task.
///
/// Runs until the engine-side subscription closes (pump gone or the
/// bridge evicted for falling behind).
pub fn spawn(engine: &EnginePeer, envelope: Arc<EnvelopePeer>) -> JoinHandle<()> {
    let mut sub = engine
        .registry()
        .subscribe(EngineReportTag::Event, BRIDGE_CAPACITY);
    tokio::spawn(async move {
        while let Some(report) = sub.recv().await {
            let EngineReport::Event(engine_event) = report else {
                continue;
            };
            debug!(?engine_event, "bridging engine event to envelope registry");
            let wrapped = GatewayEnvelope::new(gateway_envelope::Payload::Event(translate_event(
                engine_event,
            )));
            envelope
                .registry()
                .deliver(EnvelopeTag::Event, wrapped)
                .await;
        }
        debug!("event bridge stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_preserves_object_ids() {
        let translated = translate_event(EngineEvent::ObjectTapped { object_id: 77 });
        assert_eq!(
            translated.kind,
            Some(event::Kind::ObjectTapped(ObjectTapped { object_id: 77 }))
        );
    }
}
