//! End-to-end tests against a gateway listening on an ephemeral port.
//!
//! HTTP is driven with `reqwest`, subscriptions with `tokio-tungstenite`
//! speaking `graphql-transport-ws`.

#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_graphql::dynamic::{Field, FieldFuture, Object, TypeRef};
use async_trait::async_trait;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use messenger_gateway::app_state::SharedServices;
use messenger_gateway::auth::SessionProvider;
use messenger_gateway::config::GatewayConfig;
use messenger_gateway::domain::{BusEvent, EventBus, Message, Session, User};
use messenger_gateway::error::GatewayError;
use messenger_gateway::graphql::SchemaDefinition;
use messenger_gateway::lifecycle::{Gateway, LifecycleState, RunningGateway};
use messenger_gateway::persistence::{Database, MemoryRepository};

const CLIENT_ORIGIN: &str = "https://app.example";

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Default)]
struct CountingSessions {
    calls: AtomicUsize,
}

#[async_trait]
impl SessionProvider for CountingSessions {
    async fn resolve(&self, _cookies: &str) -> Result<Option<Session>, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Session::new(User::new("cookie-user"))))
    }
}

struct Harness {
    gateway: RunningGateway,
    sessions: Arc<CountingSessions>,
    bus: EventBus,
    http: reqwest::Client,
}

impl Harness {
    async fn start() -> Self {
        Self::start_with(test_config()).await
    }

    async fn start_with(config: GatewayConfig) -> Self {
        let sessions = Arc::new(CountingSessions::default());
        let bus = EventBus::new(64);
        let services = SharedServices::new(
            Database::new(MemoryRepository::new()),
            bus.clone(),
            Arc::clone(&sessions) as Arc<dyn SessionProvider>,
        );
        let Ok(gateway) = Gateway::new(config, services)
            .start(SchemaDefinition::messenger())
            .await
        else {
            panic!("gateway failed to start");
        };
        Self {
            gateway,
            sessions,
            bus,
            http: reqwest::Client::new(),
        }
    }

    fn addr(&self) -> SocketAddr {
        self.gateway.local_addr()
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr())
    }

    fn provider_calls(&self) -> usize {
        self.sessions.calls.load(Ordering::SeqCst)
    }

    async fn post_json(&self, body: Value, origin: &str, cookie: Option<&str>) -> reqwest::Response {
        let mut request = self
            .http
            .post(self.url("/graphql"))
            .header("origin", origin)
            .json(&body);
        if let Some(cookie) = cookie {
            request = request.header("cookie", cookie);
        }
        let Ok(response) = request.send().await else {
            panic!("request failed");
        };
        response
    }

    async fn ws_init(&self, payload: Value) -> Socket {
        let Ok(mut socket) = ws_connect(self.addr(), CLIENT_ORIGIN).await else {
            panic!("ws connect failed");
        };
        send(&mut socket, json!({ "type": "connection_init", "payload": payload })).await;
        let ack = next_json(&mut socket).await;
        assert_eq!(ack["type"], "connection_ack");
        socket
    }
}

fn test_config() -> GatewayConfig {
    GatewayConfig {
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        client_origin: CLIENT_ORIGIN.to_string(),
        ..GatewayConfig::default()
    }
}

async fn ws_connect(addr: SocketAddr, origin: &str) -> Result<Socket, WsError> {
    let url = format!("ws://{addr}/graphql/subscriptions");
    let Ok(mut request) = url.into_client_request() else {
        panic!("invalid ws url");
    };
    request.headers_mut().insert(
        "sec-websocket-protocol",
        HeaderValue::from_static("graphql-transport-ws"),
    );
    let Ok(origin) = HeaderValue::from_str(origin) else {
        panic!("invalid origin");
    };
    request.headers_mut().insert("origin", origin);
    connect_async(request).await.map(|(socket, _)| socket)
}

async fn send(socket: &mut Socket, frame: Value) {
    if socket.send(WsMessage::text(frame.to_string())).await.is_err() {
        panic!("ws send failed");
    }
}

async fn next_json(socket: &mut Socket) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next()).await;
        let Ok(Some(Ok(message))) = frame else {
            panic!("expected a frame, got {frame:?}");
        };
        if message.is_ping() || message.is_pong() {
            continue;
        }
        let Ok(text) = message.to_text() else {
            panic!("expected a text frame");
        };
        let Ok(value) = serde_json::from_str(text) else {
            panic!("expected json, got {text}");
        };
        return value;
    }
}

async fn me_over_ws(socket: &mut Socket, id: &str) -> Value {
    me_over_ws_with(socket, id, json!({})).await
}

/// Runs `{ me { id } }` with `extra` merged into the subscribe payload.
async fn me_over_ws_with(socket: &mut Socket, id: &str, extra: Value) -> Value {
    let mut payload = json!({ "query": "{ me { id } }" });
    if let (Some(payload), Some(extra)) = (payload.as_object_mut(), extra.as_object()) {
        payload.extend(extra.clone());
    }
    send(
        socket,
        json!({ "id": id, "type": "subscribe", "payload": payload }),
    )
    .await;
    let next = next_json(socket).await;
    assert_eq!(next["type"], "next");
    assert_eq!(next["id"], id);
    let complete = next_json(socket).await;
    assert_eq!(complete["type"], "complete");
    next["payload"]["data"]["me"].clone()
}

#[tokio::test]
async fn anonymous_query_returns_null_me() {
    let harness = Harness::start().await;

    let response = harness
        .post_json(json!({ "query": "{ me { id } }" }), CLIENT_ORIGIN, None)
        .await;

    assert_eq!(response.status(), 200);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some(CLIENT_ORIGIN)
    );
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-credentials")
            .and_then(|v| v.to_str().ok()),
        Some("true")
    );
    let Ok(body) = response.json::<Value>().await else {
        panic!("json body");
    };
    assert_eq!(body["data"]["me"], Value::Null);
    assert_eq!(harness.provider_calls(), 0);

    harness.gateway.shutdown().await;
}

#[tokio::test]
async fn session_cookie_resolves_identity() {
    let harness = Harness::start().await;

    let response = harness
        .post_json(
            json!({ "query": "{ me { id } }" }),
            CLIENT_ORIGIN,
            Some("next-auth.session-token=abc"),
        )
        .await;

    let Ok(body) = response.json::<Value>().await else {
        panic!("json body");
    };
    assert_eq!(body["data"]["me"]["id"], "cookie-user");
    assert_eq!(harness.provider_calls(), 1);

    harness.gateway.shutdown().await;
}

#[tokio::test]
async fn foreign_origin_is_rejected_before_context() {
    let harness = Harness::start().await;

    let response = harness
        .post_json(
            json!({ "query": "{ me { id } }" }),
            "https://evil.example",
            Some("next-auth.session-token=abc"),
        )
        .await;

    assert_eq!(response.status(), 403);
    assert_eq!(harness.provider_calls(), 0);

    let upgrade = ws_connect(harness.addr(), "https://evil.example").await;
    let Err(WsError::Http(rejected)) = upgrade else {
        panic!("foreign origin upgrade should fail");
    };
    assert_eq!(rejected.status(), 403);

    harness.gateway.shutdown().await;
}

#[tokio::test]
async fn simple_requests_without_preflight_header_are_rejected() {
    let harness = Harness::start().await;

    let Ok(text_plain) = harness
        .http
        .post(harness.url("/graphql"))
        .header("origin", CLIENT_ORIGIN)
        .header("content-type", "text/plain")
        .body(r#"{"query":"{ me { id } }"}"#)
        .send()
        .await
    else {
        panic!("request failed");
    };
    assert_eq!(text_plain.status(), 400);

    let Ok(with_header) = harness
        .http
        .get(harness.url("/graphql?query=%7B%20me%20%7B%20id%20%7D%20%7D"))
        .header("apollo-require-preflight", "true")
        .send()
        .await
    else {
        panic!("request failed");
    };
    assert_eq!(with_header.status(), 200);

    harness.gateway.shutdown().await;
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let harness = Harness::start().await;
    let padding = "x".repeat(200 * 1024);

    let response = harness
        .post_json(
            json!({ "query": "{ me { id } }", "variables": { "padding": padding } }),
            CLIENT_ORIGIN,
            None,
        )
        .await;

    assert_eq!(response.status(), 413);
    harness.gateway.shutdown().await;
}

#[tokio::test]
async fn chunked_body_over_limit_gets_413() {
    let harness = Harness::start_with(GatewayConfig {
        max_body_bytes: 1024,
        ..test_config()
    })
    .await;
    let body = json!({ "query": "{ me { id } }", "variables": { "padding": "x".repeat(4096) } })
        .to_string();
    let request = format!(
        "POST /graphql HTTP/1.1\r\nHost: {addr}\r\nOrigin: {CLIENT_ORIGIN}\r\nContent-Type: application/json\r\n\
         Transfer-Encoding: chunked\r\nConnection: close\r\n\r\n{len:x}\r\n{body}\r\n0\r\n\r\n",
        addr = harness.addr(),
        len = body.len(),
    );

    let Ok(mut stream) = TcpStream::connect(harness.addr()).await else {
        panic!("connect failed");
    };
    if stream.write_all(request.as_bytes()).await.is_err() {
        panic!("write failed");
    }
    let mut response = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response)).await;
    assert!(matches!(read, Ok(Ok(_))), "response not read: {read:?}");
    let response = String::from_utf8_lossy(&response);

    assert!(response.starts_with("HTTP/1.1 413"), "got: {response}");
    assert!(response.contains("request body too large"));
    assert!(!response.contains("Custom {"));

    harness.gateway.shutdown().await;
}

#[tokio::test]
async fn malformed_request_is_rejected_before_context() {
    let harness = Harness::start().await;

    let Ok(response) = harness
        .http
        .post(harness.url("/graphql"))
        .header("origin", CLIENT_ORIGIN)
        .header("content-type", "application/json")
        .header("cookie", "next-auth.session-token=abc")
        .body(r#"{ query: "{ me { id } }" "#)
        .send()
        .await
    else {
        panic!("request failed");
    };

    assert_eq!(response.status(), 400);
    let Ok(body) = response.json::<Value>().await else {
        panic!("error body should be json");
    };
    assert_eq!(body["error"]["code"], 4002);
    let message = body["error"]["message"].as_str().unwrap_or_default();
    assert!(message.starts_with("invalid GraphQL request"), "got: {message}");
    assert!(!message.contains("InvalidRequest("));
    assert_eq!(harness.provider_calls(), 0);

    harness.gateway.shutdown().await;
}

#[tokio::test]
async fn create_username_works_on_a_fresh_in_memory_store() {
    let harness = Harness::start().await;

    let response = harness
        .post_json(
            json!({ "query": r#"mutation { createUsername(username: "ada") { success error } }"# }),
            CLIENT_ORIGIN,
            Some("next-auth.session-token=abc"),
        )
        .await;

    let Ok(body) = response.json::<Value>().await else {
        panic!("json body");
    };
    assert_eq!(
        body["data"]["createUsername"],
        json!({ "success": true, "error": null }),
        "got: {body}"
    );

    harness.gateway.shutdown().await;
}

#[tokio::test]
async fn subscription_connection_without_session_is_anonymous() {
    let harness = Harness::start().await;
    let mut socket = harness.ws_init(json!({ "session": null })).await;

    assert_eq!(me_over_ws(&mut socket, "1").await, Value::Null);
    assert_eq!(harness.gateway.subscriptions().active(), 1);
    assert_eq!(harness.provider_calls(), 0);

    harness.gateway.shutdown().await;
}

#[tokio::test]
async fn subscription_identity_is_fixed_for_the_connection() {
    let harness = Harness::start().await;
    let mut socket = harness
        .ws_init(json!({ "session": { "user": { "id": "alice" } } }))
        .await;

    let first = me_over_ws(&mut socket, "1").await;
    let second = me_over_ws_with(
        &mut socket,
        "2",
        json!({
            "extensions": { "session": { "user": { "id": "mallory" } } },
            "variables": { "session": { "user": { "id": "mallory" } } }
        }),
    )
    .await;

    assert_eq!(first["id"], "alice");
    assert_eq!(second["id"], "alice");
    assert_eq!(harness.provider_calls(), 0);

    harness.gateway.shutdown().await;
}

#[tokio::test]
async fn health_reports_listening() {
    let harness = Harness::start().await;

    let Ok(response) = harness.http.get(harness.url("/health")).send().await else {
        panic!("request failed");
    };
    assert_eq!(response.status(), 200);
    let Ok(body) = response.json::<Value>().await else {
        panic!("json body");
    };
    assert_eq!(body["lifecycle"], "listening");

    harness.gateway.shutdown().await;
}

#[tokio::test]
async fn shutdown_disposes_subscriptions_then_stops_http() {
    let harness = Harness::start().await;
    let addr = harness.addr();
    let monitor = harness.gateway.monitor();
    let registry = harness.gateway.subscriptions().clone();

    let mut socket = harness
        .ws_init(json!({ "session": { "user": { "id": "alice" } } }))
        .await;
    send(
        &mut socket,
        json!({
            "id": "live",
            "type": "subscribe",
            "payload": { "query": "subscription { messageSent(conversationId: \"c1\") { body } }" }
        }),
    )
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(registry.active(), 1);

    let bus = harness.bus.clone();
    let done = tokio::time::timeout(Duration::from_secs(5), harness.gateway.shutdown()).await;
    assert!(done.is_ok(), "shutdown should complete");

    bus.publish(BusEvent::MessageSent(Message {
        id: uuid::Uuid::new_v4(),
        conversation_id: "c1".to_string(),
        sender_id: "bob".to_string(),
        body: "too late".to_string(),
        created_at: Utc::now(),
    }));

    loop {
        match tokio::time::timeout(Duration::from_secs(5), socket.next()).await {
            Ok(Some(Ok(WsMessage::Close(frame)))) => {
                if let Some(frame) = frame {
                    assert_eq!(u16::from(frame.code), 1001);
                }
                break;
            }
            Ok(Some(Ok(WsMessage::Text(text)))) => {
                panic!("no frames may be delivered after dispose, got {text:?}");
            }
            Ok(Some(Ok(_))) => {}
            Ok(None | Some(Err(_))) => break,
            Err(_) => panic!("socket was not closed"),
        }
    }

    assert_eq!(registry.active(), 0);
    assert_eq!(monitor.current(), LifecycleState::Stopped);
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn requests_during_drain_get_service_unavailable() {
    let harness = Harness::start().await;
    let addr = harness.addr();
    let registry = harness.gateway.subscriptions().clone();
    let mut monitor = harness.gateway.monitor();

    // An open slot holds the dispose step, so HTTP keeps serving meanwhile.
    let Some(slot) = registry.register() else {
        panic!("registry should accept before shutdown");
    };
    let shutdown = tokio::spawn(harness.gateway.shutdown());
    monitor.reached(LifecycleState::Draining).await;
    while !registry.is_draining() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let upgrade = ws_connect(addr, CLIENT_ORIGIN).await;
    let Err(WsError::Http(rejected)) = upgrade else {
        panic!("upgrade during drain should be refused");
    };
    assert_eq!(rejected.status(), 503);

    let Ok(health) = harness.http.get(format!("http://{addr}/health")).send().await else {
        panic!("request failed");
    };
    assert_eq!(health.status(), 503);

    drop(slot);
    let done = tokio::time::timeout(Duration::from_secs(5), shutdown).await;
    assert!(matches!(done, Ok(Ok(()))));
    assert_eq!(monitor.current(), LifecycleState::Stopped);
}

#[tokio::test]
async fn schema_failure_never_binds() {
    let Ok(placeholder) = std::net::TcpListener::bind("127.0.0.1:0") else {
        panic!("could not reserve a port");
    };
    let Ok(addr) = placeholder.local_addr() else {
        panic!("no local addr");
    };
    drop(placeholder);

    let config = GatewayConfig {
        listen_addr: addr,
        ..test_config()
    };
    let services = SharedServices::new(
        Database::new(MemoryRepository::new()),
        EventBus::new(1),
        Arc::new(CountingSessions::default()),
    );
    let gateway = Gateway::new(config, services);
    let monitor = gateway.monitor();
    let broken = SchemaDefinition::new(Object::new("Query").field(Field::new(
        "ghost",
        TypeRef::named_nn("Undefined"),
        |_| FieldFuture::new(async { Ok(None::<async_graphql::Value>) }),
    )));

    let result = gateway.start(broken).await;

    assert!(matches!(result, Err(GatewayError::SchemaCompilation(_))));
    assert!(!monitor.has_listened());
    assert!(TcpStream::connect(addr).await.is_err());
}
