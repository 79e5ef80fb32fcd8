//! Test harness: a fake robot on real datagram sockets.
//!
//! Binds the engine and envelope server sockets in a temp directory,
//! connects real peers against them, and runs the inbound pumps, so
//! handler tests exercise the same framing, link, and registry paths
//! as production.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use robogate_core::framing;
use robogate_core::schema::engine::EngineReport;
use robogate_core::schema::envelope::{encode_envelope, GatewayEnvelope};
use robogate_daemon::peers::{self, EnginePeer, EnvelopePeer};
use robogate_daemon::service::ExternalService;
use tokio::net::UnixDatagram;
use tokio_util::sync::CancellationToken;

/// Response window used by harness services; long enough for the test
/// runner, short enough to keep deadline tests quick.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(2);

pub struct FakeRobot {
    _dir: tempfile::TempDir,
    pub engine: Arc<EnginePeer>,
    pub envelope: Arc<EnvelopePeer>,
    pub engine_sock: UnixDatagram,
    pub envelope_sock: UnixDatagram,
    engine_client: PathBuf,
    envelope_client: PathBuf,
}

impl FakeRobot {
    pub async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let engine_path = dir.path().join(peers::ENGINE_SOCKET);
        let envelope_path = dir.path().join(peers::ENVELOPE_SOCKET);

        let engine_sock = UnixDatagram::bind(&engine_path).unwrap();
        let envelope_sock = UnixDatagram::bind(&envelope_path).unwrap();

        let shutdown = CancellationToken::new();
        let engine = Arc::new(
            peers::connect_engine(dir.path(), shutdown.clone())
                .await
                .unwrap(),
        );
        let envelope = Arc::new(
            peers::connect_envelope(dir.path(), shutdown)
                .await
                .unwrap(),
        );

        {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.run_pump().await });
        }
        {
            let envelope = Arc::clone(&envelope);
            tokio::spawn(async move { envelope.run_pump().await });
        }

        let engine_client = PathBuf::from(format!(
            "{}_{}",
            engine_path.display(),
            peers::CLIENT_NAME
        ));
        let envelope_client = PathBuf::from(format!(
            "{}_{}",
            envelope_path.display(),
            peers::CLIENT_NAME
        ));

        Self {
            _dir: dir,
            engine,
            envelope,
            engine_sock,
            envelope_sock,
            engine_client,
            envelope_client,
        }
    }

    /// A service over this robot's peers, without a token authority.
    pub fn service(&self) -> Arc<ExternalService> {
        Arc::new(
            ExternalService::new(Arc::clone(&self.engine), Arc::clone(&self.envelope), None)
                .with_response_timeout(TEST_TIMEOUT),
        )
    }

    /// Next frame payload the gateway wrote to the engine socket.
    pub async fn recv_engine_payload(&self) -> Vec<u8> {
        recv_payload(&self.engine_sock).await
    }

    /// Next raw datagram the gateway wrote to the engine socket.
    pub async fn recv_engine_datagram(&self) -> Vec<u8> {
        recv_datagram(&self.engine_sock).await
    }

    /// Next envelope the gateway wrote to the structured socket.
    pub async fn recv_envelope_payload(&self) -> Vec<u8> {
        recv_payload(&self.envelope_sock).await
    }

    /// True when the engine socket stays quiet for `window`.
    pub async fn engine_quiet_for(&self, window: Duration) -> bool {
        tokio::time::timeout(window, recv_datagram(&self.engine_sock))
            .await
            .is_err()
    }

    /// Inject one engine report as the robot would send it.
    pub async fn inject_report(&self, report: &EngineReport) {
        let frame = framing::encode_frame(&report.encode()).unwrap();
        self.engine_sock
            .send_to(&frame, &self.engine_client)
            .await
            .unwrap();
    }

    /// Inject one envelope as the robot would send it.
    pub async fn inject_envelope(&self, envelope: &GatewayEnvelope) {
        let frame = framing::encode_frame(&encode_envelope(envelope)).unwrap();
        self.envelope_sock
            .send_to(&frame, &self.envelope_client)
            .await
            .unwrap();
    }
}

async fn recv_datagram(sock: &UnixDatagram) -> Vec<u8> {
    let mut buf = vec![0u8; framing::MAX_DATAGRAM];
    let (len, _) = sock.recv_from(&mut buf).await.unwrap();
    buf.truncate(len);
    buf
}

async fn recv_payload(sock: &UnixDatagram) -> Vec<u8> {
    let datagram = recv_datagram(sock).await;
    framing::decode_frame(&datagram).unwrap().to_vec()
}
