//! End-to-end handler tests over real sockets: one test per handler
//! shape, plus the correlation edge cases.

mod common;

use std::time::Duration;

use common::FakeRobot;
use robogate_core::framing;
use robogate_core::schema::engine::{EngineCommand, EngineEvent, EngineReport, EngineReportTag, RobotState};
use robogate_core::schema::envelope::{
    decode_envelope, event, gateway_envelope::Payload, EnvelopeTag, GatewayEnvelope, ObjectTapped,
    Ping, PlayAnimationResponse, Pong, ResultCode, RobotSettings, UpdateSettingsRequest,
    UpdateSettingsResponse,
};
use robogate_daemon::peers::bridge;
use robogate_daemon::service::messages::{
    DriveWheelsRequest, ListAnimationsRequest, PlayAnimationRequest, SetBackpackLedsRequest,
    WifiScanRequest,
};
use robogate_daemon::service::{RpcCode, RpcError};
use tokio::sync::mpsc;

#[tokio::test]
async fn fire_and_forget_emits_one_framed_command() {
    let robot = FakeRobot::start().await;
    let service = robot.service();

    let response = service
        .drive_wheels(DriveWheelsRequest {
            left_wheel_mmps: 100.0,
            right_wheel_mmps: -100.0,
            left_wheel_mmps2: 0.0,
            right_wheel_mmps2: 0.0,
        })
        .await
        .unwrap();
    assert_eq!(response.status.description, "Message sent to engine");

    let expected = framing::encode_frame(
        &EngineCommand::DriveWheels {
            left_wheel_mmps: 100.0,
            right_wheel_mmps: -100.0,
            left_wheel_mmps2: 0.0,
            right_wheel_mmps2: 0.0,
        }
        .encode(),
    )
    .unwrap();
    assert_eq!(robot.recv_engine_datagram().await, expected);

    // Exactly one frame.
    assert!(robot.engine_quiet_for(Duration::from_millis(100)).await);
}

#[tokio::test]
async fn request_response_returns_the_correlated_delivery() {
    let robot = FakeRobot::start().await;
    let service = robot.service();

    let call = tokio::spawn({
        let service = service.clone();
        async move { service.pang(Ping { value: 42 }).await }
    });

    let outbound = robot.recv_envelope_payload().await;
    let (tag, envelope) = decode_envelope(&outbound).unwrap();
    assert_eq!(tag, EnvelopeTag::Ping);
    let Some(Payload::Ping(ping)) = envelope.payload else {
        panic!("expected a ping on the wire");
    };
    robot
        .inject_envelope(&GatewayEnvelope::new(Payload::Pong(Pong { value: ping.value })))
        .await;

    let pong = call.await.unwrap().unwrap();
    assert_eq!(pong.value, 42);
}

#[tokio::test]
async fn request_response_times_out_without_a_delivery() {
    let robot = FakeRobot::start().await;
    let service = robot.service();

    let err = service.pang(Ping { value: 1 }).await.unwrap_err();
    assert_eq!(err.code, RpcCode::DeadlineExceeded);
}

#[tokio::test]
async fn multi_message_collection_accumulates_until_end_marker() {
    let robot = FakeRobot::start().await;
    let service = robot.service();

    let call = tokio::spawn({
        let service = service.clone();
        async move { service.list_animations(ListAnimationsRequest {}).await }
    });

    // Wait for the request frame, then play the enumeration back.
    let payload = robot.recv_engine_payload().await;
    assert_eq!(payload, EngineCommand::ListAnimations.encode());

    for name in ["anim_wave_01", "anim_blink_02"] {
        robot
            .inject_report(&EngineReport::AnimationAvailable { name: name.into() })
            .await;
    }
    robot
        .inject_report(&EngineReport::EndOfReports {
            report: EngineReportTag::AnimationAvailable,
        })
        .await;

    let result = call.await.unwrap().unwrap();
    assert_eq!(result.status.description, "Available animations returned");
    assert_eq!(result.animation_names, vec!["anim_wave_01", "anim_blink_02"]);
}

#[tokio::test]
async fn unique_subscription_reports_in_progress_to_the_second_caller() {
    let robot = FakeRobot::start().await;
    let service = robot.service();

    let request = UpdateSettingsRequest {
        settings: Some(RobotSettings {
            locale: "en-US".into(),
            ..RobotSettings::default()
        }),
    };

    let first = tokio::spawn({
        let service = service.clone();
        let request = request.clone();
        async move { service.update_settings(request).await }
    });

    // The first call owns the response tag once its request hits the
    // wire.
    let _ = robot.recv_envelope_payload().await;

    let second = service.update_settings(request).await.unwrap();
    assert_eq!(second.code, ResultCode::UpdateInProgress);

    robot
        .inject_envelope(&GatewayEnvelope::new(Payload::UpdateSettingsResponse(
            UpdateSettingsResponse {
                code: ResultCode::Ok as i32,
            },
        )))
        .await;
    assert_eq!(first.await.unwrap().unwrap().code, ResultCode::Ok);

    // Released after completion: a new update may start.
    let third = tokio::spawn({
        let service = service.clone();
        async move {
            service
                .update_settings(UpdateSettingsRequest {
                    settings: Some(RobotSettings::default()),
                })
                .await
        }
    });
    let _ = robot.recv_envelope_payload().await;
    robot
        .inject_envelope(&GatewayEnvelope::new(Payload::UpdateSettingsResponse(
            UpdateSettingsResponse {
                code: ResultCode::Ok as i32,
            },
        )))
        .await;
    assert_eq!(third.await.unwrap().unwrap().code, ResultCode::Ok);
}

#[tokio::test]
async fn update_settings_without_document_is_invalid_argument() {
    let robot = FakeRobot::start().await;
    let service = robot.service();

    let err = service
        .update_settings(UpdateSettingsRequest { settings: None })
        .await
        .unwrap_err();
    assert_eq!(err.code, RpcCode::InvalidArgument);
}

#[tokio::test]
async fn cross_peer_correlation_for_play_animation() {
    let robot = FakeRobot::start().await;
    let service = robot.service();

    let call = tokio::spawn({
        let service = service.clone();
        async move {
            service
                .play_animation(PlayAnimationRequest {
                    name: "anim_wave_01".into(),
                    loops: 1,
                })
                .await
        }
    });

    // Command goes out on the legacy socket...
    let payload = robot.recv_engine_payload().await;
    assert_eq!(
        payload,
        EngineCommand::PlayAnimation {
            loops: 1,
            name: "anim_wave_01".into(),
        }
        .encode()
    );

    // ...and the acknowledgement comes back on the structured one.
    robot
        .inject_envelope(&GatewayEnvelope::new(Payload::PlayAnimationResponse(
            PlayAnimationResponse {
                animation_name: "anim_wave_01".into(),
            },
        )))
        .await;

    let result = call.await.unwrap().unwrap();
    assert_eq!(result.animation_name, "anim_wave_01");
    assert_eq!(result.status.description, "Message sent to engine");
}

#[tokio::test]
async fn robot_state_stream_forwards_until_client_hangs_up() {
    let robot = FakeRobot::start().await;
    let service = robot.service();

    let (tx, mut rx) = mpsc::channel(4);
    let stream = tokio::spawn({
        let service = service.clone();
        async move {
            let mut sink = tx;
            service
                .robot_state_stream(Default::default(), &mut sink)
                .await
        }
    });

    // Give the handler a beat to subscribe before injecting.
    tokio::time::sleep(Duration::from_millis(50)).await;

    for voltage in [3.9f32, 4.0] {
        robot
            .inject_report(&EngineReport::RobotState(RobotState {
                battery_voltage: voltage,
                ..RobotState::default()
            }))
            .await;
    }
    assert_eq!(rx.recv().await.unwrap().state.battery_voltage, 3.9);
    assert_eq!(rx.recv().await.unwrap().state.battery_voltage, 4.0);

    // Hang up; the next delivery fails the sink and cancels the call.
    drop(rx);
    robot
        .inject_report(&EngineReport::RobotState(RobotState::default()))
        .await;

    let err = stream.await.unwrap().unwrap_err();
    assert_eq!(err.code, RpcCode::Cancelled);
}

#[tokio::test]
async fn event_stream_sees_bridged_engine_events() {
    let robot = FakeRobot::start().await;
    let service = robot.service();

    bridge::spawn(&robot.engine, std::sync::Arc::clone(&robot.envelope));

    let (tx, mut rx) = mpsc::channel(4);
    let _stream = tokio::spawn({
        let service = service.clone();
        async move {
            let mut sink = tx;
            service.event_stream(Default::default(), &mut sink).await
        }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    robot
        .inject_report(&EngineReport::Event(EngineEvent::ObjectTapped {
            object_id: 7,
        }))
        .await;

    let item = rx.recv().await.unwrap();
    assert_eq!(
        item.event.kind,
        Some(event::Kind::ObjectTapped(ObjectTapped { object_id: 7 }))
    );
}

#[tokio::test]
async fn invalid_inputs_map_to_invalid_argument() {
    let robot = FakeRobot::start().await;
    let service = robot.service();

    let err: RpcError = service
        .set_backpack_leds(SetBackpackLedsRequest {
            colors: vec![0xFF0000FF, 0x00FF00FF],
        })
        .await
        .unwrap_err();
    assert_eq!(err.code, RpcCode::InvalidArgument);
}

#[tokio::test]
async fn unimplemented_methods_say_so() {
    let robot = FakeRobot::start().await;
    let service = robot.service();

    let err = service.wifi_scan(WifiScanRequest {}).await.unwrap_err();
    assert_eq!(err.code, RpcCode::Unimplemented);
    assert!(err.message.contains("WifiScan"));
}
