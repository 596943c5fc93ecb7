//! End-to-end client/server exchanges over loopback TCP.

use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use json_socket::{
    EchoHandler, Framing, JsonClient, JsonServer, Message, SocketConfig, SocketError,
    ThreadedServer,
};

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

fn loopback() -> SocketConfig {
    SocketConfig::new("127.0.0.1", 0).with_timeout_secs(5.0)
}

async fn connected_client(port: u16, framing: Framing) -> JsonClient {
    let config = SocketConfig::new("127.0.0.1", port)
        .with_timeout_secs(5.0)
        .with_framing(framing);
    let mut client = JsonClient::configure(config).await.unwrap();
    assert!(client.connect().await);
    client
}

async fn start<H>(config: SocketConfig, handler: H) -> (ThreadedServer<H>, u16)
where
    H: json_socket::MessageHandler + 'static,
{
    let mut server = ThreadedServer::bind(config, handler).await.unwrap();
    let port = server.local_addr().unwrap().port();
    server.start().unwrap();
    (server, port)
}

async fn finish<H>(mut client: JsonClient, mut server: ThreadedServer<H>)
where
    H: json_socket::MessageHandler + 'static,
{
    client.close().await;
    tokio::time::timeout(TEST_TIMEOUT, server.join())
        .await
        .expect("server did not exit after client closed")
        .unwrap();
    assert!(server.is_shut_down());
}

#[tokio::test]
async fn test_echo_sequential_messages_then_peer_close() {
    let (server, port) = start(loopback(), EchoHandler).await;
    let mut client = connected_client(port, Framing::Marker).await;

    let first = json!({"message": "new connection"});
    client.send_obj(&first).await.unwrap();
    assert_eq!(client.read_obj().await.unwrap(), Some(first));

    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = json!({"echo": "hello", "i": 1});
    client.send_obj(&second).await.unwrap();
    assert_eq!(client.read_obj().await.unwrap(), Some(second));

    finish(client, server).await;
}

#[tokio::test]
async fn test_round_trip_every_json_shape() {
    let echo_all = |message: Message| -> anyhow::Result<Option<Message>> { Ok(Some(message)) };
    let (server, port) = start(loopback(), echo_all).await;
    let mut client = connected_client(port, Framing::Marker).await;

    let values = [
        json!({"nested": {"list": [1, 2.5, "three"], "flag": false}}),
        json!([1, "two", null, {"k": "v"}]),
        json!("just a string"),
        json!(-17),
        json!(3.25),
        json!(true),
        json!(null),
        json!({"unicode": "Grüße, 世界 🚀"}),
        json!({"text": "</message> inside a string"}),
    ];

    for value in values {
        client.send_obj(&value).await.unwrap();
        assert_eq!(client.read_obj().await.unwrap(), Some(value));
    }

    finish(client, server).await;
}

#[tokio::test]
async fn test_large_message_spans_many_reads() {
    let (server, port) = start(loopback(), EchoHandler).await;
    let mut client = connected_client(port, Framing::Marker).await;

    let big = json!({"payload": "x".repeat(64 * 1024), "items": (0..500).collect::<Vec<_>>()});
    client.send_obj(&big).await.unwrap();
    assert_eq!(client.read_obj().await.unwrap(), Some(big));

    finish(client, server).await;
}

#[tokio::test]
async fn test_non_object_input_gets_status_reply() {
    let (server, port) = start(loopback(), EchoHandler).await;
    let mut client = connected_client(port, Framing::Marker).await;

    client.send_obj(&json!("bare string")).await.unwrap();
    assert_eq!(
        client.read_obj().await.unwrap(),
        Some(json!({"Status": "NoObject"}))
    );

    client.send_obj(&json!(42)).await.unwrap();
    assert_eq!(
        client.read_obj().await.unwrap(),
        Some(json!({"Status": "NoObject"}))
    );

    finish(client, server).await;
}

#[tokio::test]
async fn test_handler_failure_and_silence_do_not_stop_server() {
    let handler = |message: Message| -> anyhow::Result<Option<Message>> {
        if message.get("fail").is_some() {
            anyhow::bail!("refusing {}", message);
        }
        if message.get("quiet").is_some() {
            return Ok(None);
        }
        Ok(Some(json!({"ok": message})))
    };
    let (server, port) = start(loopback(), handler).await;
    let mut client = connected_client(port, Framing::Marker).await;

    client.send_obj(&json!({"fail": true})).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    client.send_obj(&json!({"quiet": true})).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    client.send_obj(&json!({"n": 3})).await.unwrap();

    assert_eq!(
        client.read_obj().await.unwrap(),
        Some(json!({"ok": {"n": 3}}))
    );

    finish(client, server).await;
}

#[tokio::test]
async fn test_bad_frame_is_logged_and_skipped() {
    let (mut server, port) = start(loopback(), EchoHandler).await;

    let mut raw = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    raw.write_all(b"<message>{\"unterminated\": </message>").await.unwrap();
    raw.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    raw.write_all(b"<message>{\"after\":\"bad\"}</message>").await.unwrap();
    let mut reply = vec![0u8; 64];
    let read = tokio::time::timeout(TEST_TIMEOUT, raw.read(&mut reply))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&reply[..read], b"<message>{\"after\":\"bad\"}</message>");

    drop(raw);
    tokio::time::timeout(TEST_TIMEOUT, server.join())
        .await
        .unwrap()
        .unwrap();
    assert!(server.is_shut_down());
}

#[tokio::test]
async fn test_length_prefixed_framing() {
    let config = loopback().with_framing(Framing::LengthPrefixed);
    let (server, port) = start(config, EchoHandler).await;
    let mut client = connected_client(port, Framing::LengthPrefixed).await;

    let message = json!({"framing": "length-prefixed", "data": "y".repeat(4096)});
    client.send_obj(&message).await.unwrap();
    assert_eq!(client.read_obj().await.unwrap(), Some(message));

    finish(client, server).await;
}

#[tokio::test]
async fn test_synchronous_serve_loop() {
    let mut server = JsonServer::bind(loopback(), EchoHandler).await.unwrap();
    let port = server.local_addr().unwrap().port();

    let client_side = async move {
        let mut client = connected_client(port, Framing::Marker).await;
        let message = json!({"message": "new connection"});
        client.send_obj(&message).await.unwrap();
        let reply = client.read_obj().await.unwrap();
        client.close().await;
        reply
    };

    let ((), reply) = tokio::time::timeout(TEST_TIMEOUT, async {
        tokio::join!(server.serve_loop(), client_side)
    })
    .await
    .unwrap();

    assert_eq!(reply, Some(json!({"message": "new connection"})));
    assert!(server.is_shut_down());
    assert!(server.local_addr().is_none());
}

#[tokio::test]
async fn test_second_server_on_same_port_fails() {
    let (mut first, port) = start(loopback(), EchoHandler).await;

    let second = ThreadedServer::bind(SocketConfig::new("127.0.0.1", port), EchoHandler).await;
    assert!(matches!(second, Err(SocketError::Bind { .. })));

    first.stop();
    first.join().await.unwrap();
}

#[tokio::test]
async fn test_client_sees_server_close() {
    let mut server = JsonServer::bind(loopback(), EchoHandler).await.unwrap();
    let port = server.local_addr().unwrap().port();

    let mut client = connected_client(port, Framing::Marker).await;
    server.accept_connection().await.unwrap();
    server.close().await;

    assert_eq!(client.read_obj().await.unwrap(), None);
    assert!(client.transport().is_shut_down());
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_oversized_frame_drops_connection_and_server_recovers() {
    let (server, port) = start(loopback().with_max_frame_bytes(2048), EchoHandler).await;
    let mut client = connected_client(port, Framing::Marker).await;

    client
        .send_obj(&json!({"big": "x".repeat(5000)}))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    // The server may already have reset the connection.
    let _ = client.send_obj(&json!({"small": 1})).await;

    let outcome = tokio::time::timeout(TEST_TIMEOUT, client.read_obj())
        .await
        .expect("client hung on a connection the server gave up on");
    assert!(!matches!(outcome, Ok(Some(_))), "unexpected reply: {:?}", outcome);
    client.close().await;

    let mut next = connected_client(port, Framing::Marker).await;
    let message = json!({"small": 2});
    next.send_obj(&message).await.unwrap();
    assert_eq!(next.read_obj().await.unwrap(), Some(message));

    finish(next, server).await;
}

#[tokio::test]
async fn test_short_timeout_server_accepts_late_client() {
    let config = SocketConfig::new("127.0.0.1", 0).with_timeout_secs(0.05);
    let (server, port) = start(config, EchoHandler).await;

    // Several accept timeouts elapse before anyone connects.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(server.is_running());

    let mut client = connected_client(port, Framing::Marker).await;
    let message = json!({"late": true});
    client.send_obj(&message).await.unwrap();
    assert_eq!(client.read_obj().await.unwrap(), Some(message));

    finish(client, server).await;
}

#[tokio::test]
async fn test_short_timeout_server_keeps_idle_client() {
    let config = SocketConfig::new("127.0.0.1", 0).with_timeout_secs(0.05);
    let (server, port) = start(config, EchoHandler).await;
    let mut client = connected_client(port, Framing::Marker).await;

    let first = json!({"n": 1});
    client.send_obj(&first).await.unwrap();
    assert_eq!(client.read_obj().await.unwrap(), Some(first));

    // Idle well past the server's read timeout; those timeouts are not failures.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(server.is_running());

    let second = json!({"n": 2});
    client.send_obj(&second).await.unwrap();
    assert_eq!(client.read_obj().await.unwrap(), Some(second));

    finish(client, server).await;
}
