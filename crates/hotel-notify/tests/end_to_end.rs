//! End-to-end tests against an in-process axum server that speaks the dashboard's
//! websocket and REST protocol.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, put},
};
use hotel_notify::{
    ConnectionState, HttpNotificationApi, NotificationApi, NotificationCenter, NotifyConfig,
    NotifyError, NotifyEvent, PollOutcome, PushTransport, WebSocketTransport,
};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;

const TOKEN: &str = "secret";

#[derive(Clone, Default)]
struct ServerState {
    notifications: Arc<Mutex<Vec<Value>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ServerState {
    fn seeded() -> Self {
        let state = Self::default();
        *state.notifications.lock() = vec![
            notification_json("rest-1", "booking_reminder", "2026-03-01T08:00:00Z"),
            notification_json("rest-2", "payment_confirmation", "2026-03-01T09:00:00Z"),
        ];
        state
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

fn notification_json(id: &str, kind: &str, timestamp: &str) -> Value {
    json!({
        "id": id,
        "type": kind,
        "title": format!("title {id}"),
        "message": "message",
        "timestamp": timestamp,
        "read": false,
        "data": { "booking_id": 42, "room_name": "Suite 4" }
    })
}

#[derive(Deserialize)]
struct TokenQuery {
    #[serde(default)]
    token: String,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

async fn ws_handler(ws: WebSocketUpgrade, Query(query): Query<TokenQuery>) -> Response {
    if query.token != TOKEN {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(handle_socket)
}

async fn handle_socket(mut socket: WebSocket) {
    let frame = json!({
        "type": "notification",
        "payload": notification_json("ws-1", "booking_confirmation", "2026-03-01T10:00:00Z"),
    })
    .to_string();

    // A malformed frame and an unknown type must not break the channel.
    for text in ["not json".to_string(), r#"{"type":"heartbeat"}"#.to_string(), frame] {
        if socket.send(Message::Text(text.into())).await.is_err() {
            return;
        }
    }

    while let Some(Ok(message)) = socket.recv().await {
        if let Message::Close(_) = message {
            break;
        }
    }
}

async fn list(State(state): State<ServerState>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    state.calls.lock().push("list".to_string());
    let notifications = state.notifications.lock().clone();
    Json(json!({ "notifications": notifications })).into_response()
}

async fn read_one(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> StatusCode {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    state.calls.lock().push(format!("read:{id}"));
    let mut notifications = state.notifications.lock();
    match notifications.iter_mut().find(|n| n["id"] == id.as_str()) {
        Some(n) => {
            n["read"] = Value::Bool(true);
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

async fn read_all(State(state): State<ServerState>, headers: HeaderMap) -> StatusCode {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    state.calls.lock().push("read-all".to_string());
    for n in state.notifications.lock().iter_mut() {
        n["read"] = Value::Bool(true);
    }
    StatusCode::NO_CONTENT
}

async fn remove(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    state.calls.lock().push(format!("delete:{id}"));
    let mut notifications = state.notifications.lock();
    let before = notifications.len();
    notifications.retain(|n| n["id"] != id.as_str());
    if notifications.len() == before {
        (StatusCode::NOT_FOUND, "no such notification").into_response()
    } else {
        StatusCode::NO_CONTENT.into_response()
    }
}

async fn spawn_server(state: ServerState) -> String {
    let app = Router::new()
        .route("/api/ws", get(ws_handler))
        .route("/api/notifications", get(list))
        .route("/api/notifications/read-all", put(read_all))
        .route("/api/notifications/{id}", delete(remove))
        .route("/api/notifications/{id}/read", put(read_one))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api")
}

async fn next_event<F>(events: &mut tokio::sync::broadcast::Receiver<NotifyEvent>, pred: F) -> NotifyEvent
where
    F: Fn(&NotifyEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.unwrap();
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event not received in time")
}

#[tokio::test]
async fn test_center_over_websocket_and_rest() {
    let state = ServerState::seeded();
    let base_url = spawn_server(state.clone()).await;
    let center = NotificationCenter::with_websocket(NotifyConfig::new(&base_url).unwrap()).unwrap();
    let mut events = center.subscribe();

    center.start(TOKEN);

    next_event(&mut events, |e| matches!(e, NotifyEvent::ConnectionChanged { connected: true })).await;
    assert_eq!(center.connection_state(), ConnectionState::Connected);

    let alert = next_event(&mut events, |e| matches!(e, NotifyEvent::Alert(_))).await;
    let NotifyEvent::Alert(pushed) = alert else {
        unreachable!()
    };
    assert_eq!(pushed.id, "ws-1");
    assert_eq!(
        pushed.data.as_ref().and_then(|d| d.booking_id.as_deref()),
        Some("42")
    );
    assert_eq!(center.notifications().len(), 1);

    // ws-1 was pushed before this fetch began and the server does not list it.
    assert_eq!(center.refresh().await, PollOutcome::Applied(2));
    let ids: Vec<String> = center.notifications().into_iter().map(|n| n.id).collect();
    assert_eq!(ids, vec!["rest-2", "rest-1"]);

    assert!(center.mark_read("rest-1"));
    assert_eq!(center.unread_count(), 1);

    assert_eq!(center.mark_all_read().await.unwrap(), 1);
    assert_eq!(center.unread_count(), 0);

    center.delete("rest-2").await.unwrap();
    assert_eq!(center.notifications().len(), 1);
    assert!(center.delete("missing").await.is_err());

    tokio::time::timeout(Duration::from_secs(5), async {
        while !state.calls().contains(&"read:rest-1".to_string()) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("mark-read never reached the server");

    let calls = state.calls();
    assert!(calls.contains(&"read-all".to_string()));
    assert!(calls.contains(&"delete:rest-2".to_string()));

    center.stop();
    assert_eq!(center.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_http_api_maps_errors() {
    let base_url = spawn_server(ServerState::seeded()).await;
    let config = NotifyConfig::new(&base_url).unwrap();
    let api = HttpNotificationApi::new(config).unwrap();

    api.set_token(Some("wrong".to_string()));
    match api.fetch_notifications().await {
        Err(NotifyError::Api { status, .. }) => assert_eq!(status, 401),
        other => panic!("expected 401, got {other:?}"),
    }

    api.set_token(Some(TOKEN.to_string()));
    assert_eq!(api.fetch_notifications().await.unwrap().len(), 2);

    match api.delete("missing").await {
        Err(NotifyError::Api { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "no such notification");
        }
        other => panic!("expected 404, got {other:?}"),
    }
}

#[tokio::test]
async fn test_websocket_rejects_bad_token() {
    let base_url = spawn_server(ServerState::default()).await;
    let config = NotifyConfig::new(&base_url).unwrap();
    let transport = WebSocketTransport::new();

    let url = config.websocket_url("wrong").unwrap();
    assert!(transport.open(&url).await.is_err());

    let url = config.websocket_url(TOKEN).unwrap();
    let mut stream = transport.open(&url).await.unwrap();
    let first = stream.next_frame().await.unwrap().unwrap();
    assert_eq!(first, "not json");
    stream.close().await;
}

#[tokio::test]
async fn test_fetch_skips_unknown_notification_kind() {
    let state = ServerState::default();
    *state.notifications.lock() = vec![
        notification_json("known", "system_message", "2026-03-01T08:00:00Z"),
        notification_json("future", "room_cleaned", "2026-03-01T09:00:00Z"),
    ];
    let base_url = spawn_server(state).await;
    let config = NotifyConfig::new(&base_url).unwrap();
    let api = Arc::new(HttpNotificationApi::new(config.clone()).unwrap());
    api.set_token(Some(TOKEN.to_string()));
    let center = NotificationCenter::new(config, Arc::new(WebSocketTransport::new()), api).unwrap();

    assert_eq!(center.refresh().await, PollOutcome::Applied(1));
    let ids: Vec<String> = center.notifications().into_iter().map(|n| n.id).collect();
    assert_eq!(ids, vec!["known"]);
}
