//! End-to-end WebSocket relaying through the proxy.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rewrite_proxy::config::{RelayConfig, RouteConfig};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

mod common;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn ws_route(backend: std::net::SocketAddr, relay: Option<RelayConfig>) -> RouteConfig {
    let mut route = RouteConfig::new("^/ws", "^/ws(.*)$", "$1", format!("ws://{backend}"));
    route.websocket = relay;
    route
}

/// Next data frame, skipping control frames. `None` once the peer closed.
async fn next_data(client: &mut Client) -> Option<Message> {
    loop {
        match tokio::time::timeout(Duration::from_secs(5), client.next()).await {
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => continue,
            Ok(Some(Ok(Message::Close(_)))) | Ok(Some(Err(_))) | Ok(None) => return None,
            Ok(Some(Ok(message))) => return Some(message),
            Err(_) => panic!("no frame within 5s"),
        }
    }
}

#[tokio::test]
async fn test_echo_preserves_order() {
    let backend = common::start_ws_echo_backend().await;
    let proxy = common::start_proxy(vec![ws_route(backend, None)]).await;

    let (mut client, response) = connect_async(proxy.ws_url("/ws/echo")).await.unwrap();
    assert_eq!(response.status(), 101);

    for i in 0..100 {
        client.send(Message::text(format!("message {i}"))).await.unwrap();
    }
    for i in 0..100 {
        match next_data(&mut client).await {
            Some(Message::Text(text)) => assert_eq!(text.as_str(), format!("message {i}")),
            other => panic!("unexpected frame {:?}", other),
        }
    }

    client.send(Message::binary(vec![0u8, 1, 2, 255])).await.unwrap();
    match next_data(&mut client).await {
        Some(Message::Binary(data)) => assert_eq!(&data[..], &[0u8, 1, 2, 255]),
        other => panic!("unexpected frame {:?}", other),
    }

    client.close(None).await.unwrap();
    assert!(proxy.relays.wait_idle(Duration::from_secs(5)).await);
}

#[tokio::test]
async fn test_backend_sees_rewritten_path_and_query() {
    let backend = common::start_ws_echo_backend().await;
    let proxy = common::start_proxy(vec![ws_route(backend, None)]).await;

    let (mut client, _) = connect_async(proxy.ws_url("/ws/chat?room=7")).await.unwrap();
    client.send(Message::text("whoami")).await.unwrap();
    match next_data(&mut client).await {
        Some(Message::Text(text)) => assert_eq!(text.as_str(), "/chat?room=7"),
        other => panic!("unexpected frame {:?}", other),
    }
}

#[tokio::test]
async fn test_plain_request_on_ws_route_is_400() {
    let backend = common::start_ws_echo_backend().await;
    let proxy = common::start_proxy(vec![ws_route(backend, None)]).await;

    let response = reqwest::Client::builder()
        .no_proxy()
        .build()
        .unwrap()
        .get(proxy.url("/ws/echo"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(response.text().await.unwrap(), "could not upgrade to websocket");
    assert_eq!(proxy.relays.active_count(), 0);
}

#[tokio::test]
async fn test_dial_failure_is_500_without_relay() {
    let dead = common::closed_port().await;
    let proxy = common::start_proxy(vec![ws_route(dead, None)]).await;

    match connect_async(proxy.ws_url("/ws/echo")).await {
        Err(WsError::Http(response)) => {
            assert_eq!(response.status(), 500);
            let body = response.body().as_deref().unwrap_or_default();
            // The handshake error only carries the bytes read alongside the headers.
            assert!(b"could not upgrade internal connection".starts_with(body));
        }
        other => panic!("expected HTTP 500, got {:?}", other.map(|(_, r)| r.status())),
    }
    assert_eq!(proxy.relays.active_count(), 0);
}

#[tokio::test]
async fn test_backend_rejection_is_forwarded() {
    let backend = common::start_rejecting_backend().await;
    let proxy = common::start_proxy(vec![ws_route(backend, None)]).await;

    match connect_async(proxy.ws_url("/ws/echo")).await {
        Err(WsError::Http(response)) => {
            assert_eq!(response.status(), 403);
            assert_eq!(response.headers()["x-reason"], "denied");
            let body = response.body().as_deref().unwrap_or_default();
            // The handshake error only carries the bytes read alongside the headers.
            assert!(b"forbidden by backend".starts_with(body));
        }
        other => panic!("expected HTTP 403, got {:?}", other.map(|(_, r)| r.status())),
    }
    assert_eq!(proxy.relays.active_count(), 0);
}

#[tokio::test]
async fn test_silent_backend_closes_relay() {
    let backend = common::start_silent_ws_backend().await;
    let proxy =
        common::start_proxy(vec![ws_route(backend, Some(common::fast_relay(300, 100, 1024)))]).await;

    let (mut client, _) = connect_async(proxy.ws_url("/ws/quiet")).await.unwrap();

    // The client keeps answering pings; only the backend goes quiet.
    assert!(next_data(&mut client).await.is_none());
    assert!(proxy.relays.wait_idle(Duration::from_secs(3)).await);
}

#[tokio::test]
async fn test_traffic_keeps_relay_open_past_pong_wait() {
    let backend = common::start_ws_echo_backend().await;
    let proxy =
        common::start_proxy(vec![ws_route(backend, Some(common::fast_relay(300, 100, 1024)))]).await;

    let (mut client, _) = connect_async(proxy.ws_url("/ws/echo")).await.unwrap();

    // Four pong windows of chatter.
    for i in 0..24 {
        client.send(Message::text(format!("tick {i}"))).await.unwrap();
        match next_data(&mut client).await {
            Some(Message::Text(text)) => assert_eq!(text.as_str(), format!("tick {i}")),
            other => panic!("relay closed early at tick {i}: {:?}", other),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(proxy.relays.active_count(), 1);
}

#[tokio::test]
async fn test_oversized_message_ends_relay() {
    let backend = common::start_ws_echo_backend().await;
    let proxy =
        common::start_proxy(vec![ws_route(backend, Some(common::fast_relay(60_000, 54_000, 64)))])
            .await;

    let (mut client, _) = connect_async(proxy.ws_url("/ws/echo")).await.unwrap();

    client.send(Message::text("small")).await.unwrap();
    assert!(matches!(next_data(&mut client).await, Some(Message::Text(_))));

    let _ = client.send(Message::text("x".repeat(128))).await;
    assert!(next_data(&mut client).await.is_none());
    assert!(proxy.relays.wait_idle(Duration::from_secs(3)).await);
}
