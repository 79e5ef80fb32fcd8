//! Security-daemon responder tests: every in-peer answered tag, over a
//! real socket.

use std::path::PathBuf;
use std::sync::Arc;

use robogate_core::framing;
use robogate_core::schema::secd::{SdkProxyRequest, SecdReply, SecdRequest};
use robogate_core::token::{DisconnectedIdentity, TokenAuthority, TokenConfig};
use robogate_daemon::peers::secd::{spawn_responder, ConnectionInfo, UnavailableProxy};
use robogate_daemon::peers::{self, SecdPeer};
use tokio::net::UnixDatagram;
use tokio_util::sync::CancellationToken;

struct FakeSecd {
    _dir: tempfile::TempDir,
    sock: UnixDatagram,
    client: PathBuf,
    peer: Arc<SecdPeer>,
    connection: Arc<ConnectionInfo>,
}

impl FakeSecd {
    async fn start(authority: Option<TokenAuthority>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(peers::SECD_SOCKET);
        let sock = UnixDatagram::bind(&path).unwrap();

        let peer = Arc::new(
            peers::connect_secd(dir.path(), CancellationToken::new())
                .await
                .unwrap(),
        );
        let connection = Arc::new(ConnectionInfo::default());
        spawn_responder(
            Arc::clone(&peer),
            Arc::new(UnavailableProxy),
            Arc::clone(&connection),
            authority,
        );
        {
            let peer = Arc::clone(&peer);
            tokio::spawn(async move { peer.run_pump().await });
        }

        let client = PathBuf::from(format!("{}_{}", path.display(), peers::CLIENT_NAME));
        Self {
            _dir: dir,
            sock,
            client,
            peer,
            connection,
        }
    }

    async fn send_request(&self, request: &SecdRequest) {
        let frame = framing::encode_frame(&request.encode()).unwrap();
        self.sock.send_to(&frame, &self.client).await.unwrap();
    }

    async fn recv_reply(&self) -> SecdReply {
        let mut buf = vec![0u8; framing::MAX_DATAGRAM];
        let (len, _) = self.sock.recv_from(&mut buf).await.unwrap();
        let payload = framing::decode_frame(&buf[..len]).unwrap();
        SecdReply::decode(payload).unwrap()
    }
}

#[tokio::test]
async fn connection_query_answers_from_current_connection_id() {
    let secd = FakeSecd::start(None).await;

    secd.send_request(&SecdRequest::ExternalConnection).await;
    assert_eq!(
        secd.recv_reply().await,
        SecdReply::ExternalConnection {
            is_connected: false,
            connection_id: String::new(),
        }
    );

    secd.connection.set_connection_id("conn-42");
    secd.send_request(&SecdRequest::ExternalConnection).await;
    assert_eq!(
        secd.recv_reply().await,
        SecdReply::ExternalConnection {
            is_connected: true,
            connection_id: "conn-42".to_owned(),
        }
    );
}

#[tokio::test]
async fn proxy_request_is_answered_by_the_proxy_callback() {
    let secd = FakeSecd::start(None).await;

    secd.send_request(&SecdRequest::SdkProxy(SdkProxyRequest {
        message_id: "m-9".into(),
        client_guid: "guid".into(),
        path: "/v1/battery".into(),
        json: "{}".into(),
    }))
    .await;

    let SecdReply::SdkProxy {
        message_id,
        status_code,
        ..
    } = secd.recv_reply().await
    else {
        panic!("expected a proxy reply");
    };
    assert_eq!(message_id, "m-9");
    assert_eq!(status_code, 503);
}

#[tokio::test]
async fn token_refresh_request_is_acknowledged() {
    // No persisted token: the forced refresh resolves immediately with
    // a null-token outcome, and the daemon still gets its reply.
    let token_dir = tempfile::tempdir().unwrap();
    let authority = TokenAuthority::spawn(
        TokenConfig {
            token_dir: token_dir.path().to_path_buf(),
            app_key: String::new(),
            purge_legacy_tokens: true,
        },
        Arc::new(DisconnectedIdentity),
        Arc::new(|| {}),
        CancellationToken::new(),
    )
    .unwrap();

    let secd = FakeSecd::start(Some(authority)).await;
    secd.send_request(&SecdRequest::TokenRefresh).await;
    assert_eq!(secd.recv_reply().await, SecdReply::TokenRefresh);
}

#[tokio::test]
async fn responder_traffic_is_still_published_to_observers() {
    let secd = FakeSecd::start(None).await;

    let mut observer = secd.peer.registry().subscribe(
        robogate_core::schema::secd::SecdRequestTag::ExternalConnectionRequest,
        4,
    );

    secd.send_request(&SecdRequest::ExternalConnection).await;

    // Both the responder (reply on the wire) and the observer see it.
    assert!(matches!(
        secd.recv_reply().await,
        SecdReply::ExternalConnection { .. }
    ));
    assert_eq!(observer.recv().await, Some(SecdRequest::ExternalConnection));
}
