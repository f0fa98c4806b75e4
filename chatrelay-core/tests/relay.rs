use chatrelay_core::prelude::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start(server: Server) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server.serve(listener));
    addr
}

async fn next_frame(ws: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        if let WsMessage::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn assert_silent(ws: &mut Client) {
    let waited = tokio::time::timeout(Duration::from_millis(200), ws.next()).await;
    assert!(waited.is_err(), "unexpected frame: {:?}", waited);
}

async fn send(ws: &mut Client, frame: Value) {
    ws.send(WsMessage::Text(frame.to_string())).await.unwrap();
}

async fn connect(addr: SocketAddr) -> (Client, Value) {
    let (mut ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
    let first = next_frame(&mut ws).await;
    (ws, first)
}

/// Connects, completes the handshake and consumes the join announcements.
async fn join(addr: SocketAddr, channel: &str, name: &str) -> (Client, String) {
    let (mut ws, ack) = connect(addr).await;
    assert_eq!(ack["init"], true);
    let id = ack["uuid"].as_str().unwrap().to_string();

    send(
        &mut ws,
        json!({ "init": true, "uuid": &id, "channel": channel, "name": name, "message": "" }),
    )
    .await;
    assert_eq!(next_frame(&mut ws).await["type"], "info");
    assert_eq!(next_frame(&mut ws).await["type"], "headcount");
    (ws, id)
}

async fn say(ws: &mut Client, id: &str, channel: &str, text: &str) {
    send(
        ws,
        json!({ "init": false, "uuid": &id, "channel": channel, "name": "x", "message": text }),
    )
    .await;
}

#[tokio::test]
async fn chat_reaches_channel_members() {
    let addr = start(Server::new()).await;
    let (mut alice, alice_id) = join(addr, "42", "Alice").await;
    let (mut bob, _) = join(addr, "42", "Bob").await;

    let announce = next_frame(&mut alice).await;
    assert!(announce["message"].as_str().unwrap().starts_with("Bobさん("));
    assert_eq!(next_frame(&mut alice).await["count"], 2);

    say(&mut alice, &alice_id, "42", "hi").await;

    let to_bob = next_frame(&mut bob).await;
    assert_eq!(to_bob["message"], "hi");
    assert_eq!(to_bob["type"], "other");
    assert_eq!(to_bob["name"], "Alice");

    let to_alice = next_frame(&mut alice).await;
    assert_eq!(to_alice["message"], "hi");
    assert_eq!(to_alice["type"], "mine");
}

#[tokio::test]
async fn other_channels_hear_nothing() {
    let addr = start(Server::new()).await;
    let (mut alice, alice_id) = join(addr, "42", "Alice").await;
    let (mut bob, _) = join(addr, "7", "Bob").await;

    say(&mut alice, &alice_id, "42", "only 42").await;

    assert_eq!(next_frame(&mut alice).await["type"], "mine");
    assert_silent(&mut bob).await;
}

#[tokio::test]
async fn departure_is_announced_with_headcount() {
    let addr = start(Server::new()).await;
    let (mut alice, alice_id) = join(addr, "42", "Alice").await;
    let (mut bob, _) = join(addr, "42", "Bob").await;
    next_frame(&mut alice).await;
    next_frame(&mut alice).await;

    alice.close(None).await.unwrap();

    let notice = next_frame(&mut bob).await;
    assert_eq!(notice["type"], "info");
    assert_eq!(notice["message"], format!("Aliceさん({alice_id})が退室しました"));
    let count = next_frame(&mut bob).await;
    assert_eq!(count["type"], "headcount");
    assert_eq!(count["count"], 1);
}

#[tokio::test]
async fn script_is_neutralized() {
    let addr = start(Server::new()).await;
    let (mut alice, alice_id) = join(addr, "1", "Alice").await;

    say(&mut alice, &alice_id, "1", "<script>alert(1)</script>").await;

    let echo = next_frame(&mut alice).await;
    let message = echo["message"].as_str().unwrap();
    assert!(!message.contains("<script>"));
    assert!(!message.contains('<'));
}

#[tokio::test]
async fn duplicate_identifier_asks_to_reconnect() {
    let addr = start(Server::new().with_id_generator(|| "collision0".to_string())).await;
    let (mut first, _) = join(addr, "42", "First").await;

    let (mut second, notice) = connect(addr).await;
    assert_eq!(notice["type"], "info");
    assert!(notice.get("init").is_none());

    send(
        &mut second,
        json!({ "init": true, "uuid": "collision0", "channel": "42", "name": "Second" }),
    )
    .await;
    second.close(None).await.unwrap();

    assert_silent(&mut first).await;
    say(&mut first, "collision0", "42", "still here").await;
    assert_eq!(next_frame(&mut first).await["type"], "mine");
}

#[tokio::test]
async fn plain_http_get_identifies_server() {
    let addr = start(Server::new()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200 OK"));
    assert!(response.ends_with("websocket-server"));
}

#[tokio::test]
async fn handshake_split_across_segments_upgrades() {
    let addr = start(Server::new()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n")
        .await
        .unwrap();
    stream.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    stream
        .write_all(
            b"Connection: Upgrade\r\nUpgrade: websocket\r\nSec-WebSocket-Version: 13\r\n\
              Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n",
        )
        .await
        .unwrap();

    let mut response = Vec::new();
    let mut chunk = [0u8; 512];
    while !response.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut chunk))
            .await
            .expect("timed out waiting for the handshake response")
            .unwrap();
        assert!(n > 0, "connection closed before the handshake response");
        response.extend_from_slice(&chunk[..n]);
    }

    let response = String::from_utf8_lossy(&response);
    assert!(
        response.starts_with("HTTP/1.1 101"),
        "unexpected response: {response}"
    );
}
