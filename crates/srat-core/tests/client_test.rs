// End-to-end tests for `SratClient`: real transports, coordinator merges.
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use srat_core::{
    ClientConfig, ConnectionState, ReconnectPolicy, SnapshotStream, SratClient, StateSnapshot,
    StreamTransport,
};

// ── Helpers ─────────────────────────────────────────────────────────

const WAIT: Duration = Duration::from_secs(5);

fn config(host: &str, port: u16, transport: StreamTransport) -> ClientConfig {
    ClientConfig {
        transport,
        reconnect: ReconnectPolicy::Fixed {
            delay: Duration::from_millis(50),
        },
        ..ClientConfig::new(host, port)
    }
}

async fn wait_until(
    stream: &mut SnapshotStream,
    predicate: impl Fn(&StateSnapshot) -> bool,
) -> Arc<StateSnapshot> {
    if predicate(&**stream.current()) {
        return Arc::clone(stream.current());
    }
    timeout(WAIT, async {
        loop {
            let snap = stream.changed().await.unwrap();
            if predicate(&*snap) {
                return snap;
            }
        }
    })
    .await
    .unwrap()
}

// ── WebSocket ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_reconnect_preserves_disks_across_sessions() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        // Session 1: volumes, then the server goes away.
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        ws.send(Message::text(
            "id: 1\nevent: volumes\ndata: [{\"id\":\"sda\",\"model\":\"WD Red\",\"partitions\":[{\"id\":\"sda1\"}]}]\n\n",
        ))
        .await
        .unwrap();
        drop(ws);

        // Session 2: heartbeat only.
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        ws.send(Message::text(
            "id: 2\nevent: heartbeat\ndata: {\"alive\":true,\"samba_status\":{\"version\":\"4.20\"},\"samba_process_status\":{\"smbd\":{\"pid\":7}},\"disk_health\":{\"per_disk_io\":[]}}\n\n",
        ))
        .await
        .unwrap();
        while ws.next().await.is_some() {}
    });

    let client = SratClient::new(config("127.0.0.1", port, StreamTransport::WebSocket)).unwrap();
    let mut snapshots = client.subscribe();
    assert!(snapshots.current().is_empty());

    client.connect().await.unwrap();

    let snap = wait_until(&mut snapshots, StateSnapshot::has_volumes).await;
    assert_eq!(snap.disks()[0].label(), "WD Red");

    let snap = wait_until(&mut snapshots, StateSnapshot::has_heartbeat).await;
    assert_eq!(snap.disks()[0].id.as_deref(), Some("sda"));
    assert_eq!(
        snap.samba_status.as_ref().unwrap().version.as_deref(),
        Some("4.20")
    );
    assert_eq!(snap.process_status.as_ref().unwrap()["smbd"].pid, Some(7));
    assert!(snap.disk_health.is_some());
    assert!(client.is_connected());

    client.disconnect().await;
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    // The snapshot survives a disconnect.
    assert!(client.snapshot().has_volumes());
}

// ── SSE ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sse_shares_and_malformed_volumes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sse"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            concat!(
                "event: hello\ndata: {\"message\":\"welcome\"}\n\n",
                "event: volumes\ndata: [{\"id\":\"sdb\"}]\n\n",
                "event: shares\ndata: [{\"name\":\"media\",\"usage\":\"media\"}]\n\n",
                "event: volumes\ndata: \"garbage\"\n\n",
                "event: heartbeat\ndata: 42\n\n",
            ),
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let address = server.address();
    let mut client_config = config(&address.ip().to_string(), address.port(), StreamTransport::Sse);
    client_config.reconnect = ReconnectPolicy::Fixed {
        delay: Duration::from_secs(60),
    };
    let client = SratClient::new(client_config).unwrap();

    let (tx, mut hello) = tokio::sync::mpsc::unbounded_channel::<Value>();
    let _tap = client.register_listener("hello", move |payload: &Value| {
        tx.send(payload.clone())?;
        Ok(())
    });

    let mut snapshots = client.subscribe();
    client.connect().await.unwrap();

    let greeting = timeout(WAIT, hello.recv()).await.unwrap().unwrap();
    assert_eq!(greeting["message"], "welcome");

    let snap = wait_until(&mut snapshots, |s| s.shares.is_some() && s.disks.is_none()).await;
    assert_eq!(snap.shares()[0].name.as_deref(), Some("media"));
    assert!(!snap.has_heartbeat());

    client.shutdown().await;
    assert!(client.coordinator().is_shut_down());
}
