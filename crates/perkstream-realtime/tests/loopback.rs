//! The default WebSocket connector against a local tungstenite server.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use perkstream_core::{channels, ConnectionPhase, Message, MessageCallback, MessageType};
use perkstream_realtime::{RealtimeClient, RealtimeConfig};

const WAIT: Duration = Duration::from_secs(5);

/// Server side of a single accepted connection.
struct LocalServer {
    uri: oneshot::Receiver<String>,
    received: mpsc::UnboundedReceiver<Message>,
    outgoing: mpsc::UnboundedSender<WsMessage>,
}

async fn start_server() -> (String, LocalServer) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (uri_tx, uri_rx) = oneshot::channel();
    let (received_tx, received_rx) = mpsc::unbounded_channel();
    let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<WsMessage>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let capture_uri = move |request: &Request,
                                response: Response|
              -> Result<Response, ErrorResponse> {
            let _ = uri_tx.send(request.uri().to_string());
            Ok(response)
        };
        let mut ws = accept_hdr_async(stream, capture_uri).await.unwrap();

        loop {
            tokio::select! {
                frame = ws.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        let _ = received_tx.send(Message::from_json(text.as_str()).unwrap());
                    }
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
                Some(frame) = outgoing_rx.recv() => {
                    if ws.send(frame).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    (
        format!("ws://{addr}/realtime"),
        LocalServer {
            uri: uri_rx,
            received: received_rx,
            outgoing: outgoing_tx,
        },
    )
}

impl LocalServer {
    fn push(&self, message: &Message) {
        let text = message.to_json().unwrap();
        self.outgoing.send(WsMessage::Text(text.into())).unwrap();
    }

    async fn next_received(&mut self) -> Message {
        timeout(WAIT, self.received.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("server stopped")
    }
}

fn loopback_config(url: &str) -> RealtimeConfig {
    let mut config = RealtimeConfig::new(url);
    config.heartbeat.enabled = false;
    config.reconnect.interval_ms = 100;
    config.reconnect.max_attempts = 1;
    config
}

#[tokio::test]
async fn test_round_trip_over_local_socket() {
    let (url, mut server) = start_server().await;
    let client = RealtimeClient::builder(loopback_config(&url))
        .spawn()
        .unwrap();

    client.update_auth_token(Some("tok-1")).await.unwrap();

    let (offers_tx, mut offers_rx) = mpsc::unbounded_channel();
    let callback: MessageCallback = Arc::new(move |message: &Message| {
        let _ = offers_tx.send(message.clone());
    });
    client.subscribe(channels::OFFERS, callback).await.unwrap();

    client.initialize().await.unwrap();

    // Token travels in the query string.
    let uri = timeout(WAIT, &mut server.uri).await.unwrap().unwrap();
    assert_eq!(uri, "/realtime?token=tok-1");

    // The subscription queued while offline is flushed on open.
    let control = server.next_received().await;
    assert_eq!(control.kind, MessageType::Subscribe);
    assert_eq!(control.channel(), Some("offers"));

    // Server push reaches the subscription.
    server.push(&Message::new(
        "offer_update",
        json!({ "channel": "offers", "offerId": "o-9", "action": "created" }),
    ));
    let delivered = timeout(WAIT, offers_rx.recv()).await.unwrap().unwrap();
    assert_eq!(delivered.data["offerId"], "o-9");

    // Heartbeat request is answered with the same timestamp.
    server.push(&Message::new("heartbeat", json!({ "timestamp": 99 })));
    let ack = server.next_received().await;
    assert_eq!(ack.kind, MessageType::HeartbeatAck);
    assert_eq!(ack.data["timestamp"], 99);

    // A normal close from the server ends the session without a retry.
    server
        .outgoing
        .send(WsMessage::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "bye".to_string().into(),
        })))
        .unwrap();

    let mut changes = client.status_changes();
    timeout(WAIT, changes.wait_for(|s| s.phase == ConnectionPhase::Closed))
        .await
        .unwrap()
        .unwrap();

    sleep(Duration::from_millis(300)).await;
    let status = client.status();
    assert_eq!(status.phase, ConnectionPhase::Closed);
    assert_eq!(status.reconnect_attempts, 0);
    assert_eq!(client.history().await.unwrap().total_connections, 1);

    client.destroy().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_server_gives_up() {
    // Bind then release a port so nothing is listening on it.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = RealtimeClient::builder(loopback_config(&format!("ws://{addr}/realtime")))
        .spawn()
        .unwrap();
    client.initialize().await.unwrap();

    let mut changes = client.status_changes();
    let status = timeout(WAIT, changes.wait_for(|s| s.phase == ConnectionPhase::Closed))
        .await
        .unwrap()
        .unwrap()
        .clone();

    assert_eq!(status.reconnect_attempts, 1);
    assert!(status.last_error.is_some());
    assert!(client.history().await.unwrap().last_error.is_some());
}
