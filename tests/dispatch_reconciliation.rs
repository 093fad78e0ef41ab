// tests/dispatch_reconciliation.rs
// Integration tests for chat dispatch against an in-process mock backend.

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use nut_chat::config::DispatchConfig;
use nut_chat::dispatch::{listen_app_responses, send_chat_message};
use nut_chat::messages::{
    ChatMode, ChatResponse, ChatTurn, Message, MessageCategory, ResponseKind,
};
use nut_chat::protocol::NutClient;
use nut_chat::session::{SessionEvent, SessionManager, SessionState};
use nut_chat::NutError;

#[derive(Clone, Default)]
struct MockState {
    get_responses_calls: Arc<AtomicUsize>,
    listen_attempts: Arc<AtomicUsize>,
    finish_calls: Arc<AtomicUsize>,
    sent_payloads: Arc<Mutex<Vec<Value>>>,
    /// (delay before line, line) pairs streamed by send-chat-message
    stream_script: Arc<Vec<(u64, String)>>,
    /// When set, listen-app-responses fails on every attempt
    listen_always_fails: bool,
}

fn response_line(id: &str, secs: u32, kind: &str, content: Value) -> String {
    format!(
        "{}\n",
        json!({
            "responseId": id,
            "time": format!("2026-01-05T10:00:{:02}Z", secs),
            "kind": kind,
            "content": content,
        })
    )
}

async fn nut_handler(
    State(state): State<MockState>,
    Path(method): Path<String>,
    Json(params): Json<Value>,
) -> Response {
    match method.as_str() {
        "start-chat" => Json(json!({ "chatId": "chat-1" })).into_response(),
        "finish-chat" => {
            state.finish_calls.fetch_add(1, Ordering::SeqCst);
            Json(json!({})).into_response()
        }
        "get-app-responses" => {
            state.get_responses_calls.fetch_add(1, Ordering::SeqCst);
            Json(json!({ "responses": [] })).into_response()
        }
        "send-chat-message" => {
            state.sent_payloads.lock().unwrap().push(params);
            let script = Arc::clone(&state.stream_script);
            let stream = async_stream::stream! {
                for (delay_ms, line) in script.iter() {
                    tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                    yield Ok::<_, Infallible>(line.clone());
                }
            };
            Response::builder()
                .status(StatusCode::OK)
                .body(Body::from_stream(stream))
                .unwrap()
        }
        "listen-app-responses" => {
            let attempt = state.listen_attempts.fetch_add(1, Ordering::SeqCst);
            if state.listen_always_fails || attempt < 2 {
                return (StatusCode::INTERNAL_SERVER_ERROR, "transient backend error")
                    .into_response();
            }
            let line = response_line("r-listen", 9, "response-part", json!({"text": "resumed"}));
            Response::builder()
                .status(StatusCode::OK)
                .body(Body::from(line))
                .unwrap()
        }
        _ => (StatusCode::NOT_FOUND, "unknown method").into_response(),
    }
}

async fn spawn_backend(state: MockState) -> String {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let app = Router::new()
        .route("/nut/{method}", post(nut_handler))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn fast_config() -> DispatchConfig {
    DispatchConfig {
        short_poll_interval: Duration::from_millis(30),
        listen_retry_delay: Duration::from_millis(20),
        first_response_timeout: Duration::from_millis(500),
    }
}

fn two_part_script() -> Arc<Vec<(u64, String)>> {
    Arc::new(vec![
        (
            10,
            response_line("r-1", 0, "response-part", json!({"text": "first"})),
        ),
        (
            50,
            response_line("r-2", 1, "response-part", json!({"text": "second"})),
        ),
    ])
}

#[tokio::test]
async fn outbound_payload_excludes_internal_messages() {
    let state = MockState {
        stream_script: two_part_script(),
        ..Default::default()
    };
    let base_url = spawn_backend(state.clone()).await;
    let client = NutClient::new(base_url, "u-1", Some("token-1".to_string()));

    let turn = ChatTurn::new(
        ChatMode::BuildApp,
        vec![
            Message::user("add a login page"),
            Message::assistant("scratch state", MessageCategory::InternalNote),
            Message::assistant("found 2 screens", MessageCategory::DiscoveryResponse),
        ],
    );

    send_chat_message(&client, &fast_config(), "chat-1", &turn, |_| {})
        .await
        .unwrap();

    let payloads = state.sent_payloads.lock().unwrap();
    let messages = payloads[0]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2, "internal note must not be transmitted");
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["category"], "discovery-response");
    assert_eq!(payloads[0]["mode"], "build-app");
}

#[tokio::test]
async fn streamed_responses_arrive_in_order() {
    let state = MockState {
        stream_script: two_part_script(),
        ..Default::default()
    };
    let base_url = spawn_backend(state).await;
    let client = NutClient::new(base_url, "u-1", None);

    let mut seen: Vec<ChatResponse> = Vec::new();
    let turn = ChatTurn::new(ChatMode::BuildApp, vec![Message::user("hi")]);
    send_chat_message(&client, &fast_config(), "chat-1", &turn, |resp| {
        seen.push(resp)
    })
    .await
    .unwrap();

    let texts: Vec<_> = seen
        .iter()
        .filter(|r| r.kind == ResponseKind::ResponsePart)
        .map(|r| r.text().unwrap().to_string())
        .collect();
    assert_eq!(texts, vec!["first", "second"]);
}

#[tokio::test]
async fn short_poll_stops_after_send_resolves() {
    let state = MockState {
        stream_script: Arc::new(vec![
            (
                10,
                response_line("r-1", 0, "response-part", json!({"text": "first"})),
            ),
            (
                100,
                response_line("r-2", 1, "response-part", json!({"text": "second"})),
            ),
        ]),
        ..Default::default()
    };
    let base_url = spawn_backend(state.clone()).await;
    let client = NutClient::new(base_url, "u-1", None);

    let turn = ChatTurn::new(ChatMode::BuildApp, vec![Message::user("hi")]);
    send_chat_message(&client, &fast_config(), "chat-1", &turn, |_| {})
        .await
        .unwrap();

    // Give an already-queued poll request a moment to drain before
    // snapshotting the counter.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let calls_at_resolution = state.get_responses_calls.load(Ordering::SeqCst);
    assert!(
        calls_at_resolution >= 1,
        "the cleanup fetch must always run"
    );

    // The interval was 30ms; if the timer were still alive it would fire
    // several more times in this window.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(
        state.get_responses_calls.load(Ordering::SeqCst),
        calls_at_resolution,
        "no short-poll fetches may happen after the send resolves"
    );
}

#[tokio::test]
async fn send_fails_fast_without_active_chat() {
    let client = NutClient::new("http://127.0.0.1:9", "u-1", None);
    let turn = ChatTurn::new(ChatMode::Discovery, vec![Message::user("hi")]);
    let result = send_chat_message(&client, &fast_config(), "", &turn, |_| {}).await;
    assert!(matches!(result, Err(NutError::NoActiveChat)));
}

#[tokio::test]
async fn rpc_error_carries_method_status_and_body() {
    let base_url = spawn_backend(MockState::default()).await;
    let client = NutClient::new(base_url, "u-1", None);

    let err = client.call("no-such-method", json!({})).await.unwrap_err();
    match err {
        NutError::Rpc {
            method,
            status,
            body,
        } => {
            assert_eq!(method, "no-such-method");
            assert_eq!(status, 404);
            assert_eq!(body, "unknown method");
        }
        other => panic!("expected Rpc error, got {:?}", other),
    }
}

#[tokio::test]
async fn listen_retries_until_clean_completion() {
    let state = MockState::default();
    let base_url = spawn_backend(state.clone()).await;
    let client = NutClient::new(base_url, "u-1", None);

    let mut seen = Vec::new();
    listen_app_responses(
        &client,
        &fast_config(),
        "chat-1",
        CancellationToken::new(),
        |resp| seen.push(resp),
    )
    .await
    .unwrap();

    assert_eq!(
        state.listen_attempts.load(Ordering::SeqCst),
        3,
        "two failures then one clean stream"
    );
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].text(), Some("resumed"));
}

#[tokio::test]
async fn listen_stops_on_cancellation() {
    // Every attempt fails, so without the token this would retry forever.
    let state = MockState {
        listen_always_fails: true,
        ..Default::default()
    };
    let base_url = spawn_backend(state).await;
    let client = NutClient::new(base_url, "u-1", None);

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(60)).await;
        canceller.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(2),
        listen_app_responses(&client, &fast_config(), "chat-1", cancel, |_| {}),
    )
    .await
    .expect("listen must terminate once cancelled");
    assert!(matches!(result, Err(NutError::Cancelled)));
}

#[tokio::test]
async fn session_delivers_typed_events_and_finishes() {
    let state = MockState {
        stream_script: Arc::new(vec![
            (
                5,
                response_line("r-t", 0, "title", json!({"title": "Login Page"})),
            ),
            (
                5,
                response_line("r-1", 1, "response-part", json!({"text": "building"})),
            ),
            (
                5,
                response_line("r-s", 2, "status", json!({"status": "done"})),
            ),
        ]),
        ..Default::default()
    };
    let base_url = spawn_backend(state.clone()).await;
    let client = NutClient::new(base_url, "u-1", None);

    let mut manager = SessionManager::new(client, fast_config());
    let session = manager.start_new().await.unwrap();
    let mut subscription = session.subscribe();

    let turn = ChatTurn::new(ChatMode::BuildApp, vec![Message::user("make a login page")]);
    session.send_message(&turn).await.unwrap();
    assert_eq!(session.state(), SessionState::Finished);
    assert_eq!(session.chat_id(), Some("chat-1"));

    let mut events = Vec::new();
    while let Some(event) = subscription.next().await {
        let done = event == SessionEvent::Finished;
        events.push(event);
        if done {
            break;
        }
    }

    assert_eq!(events[0], SessionEvent::Title("Login Page".to_string()));
    assert!(matches!(events[1], SessionEvent::ResponsePart(_)));
    assert_eq!(events[2], SessionEvent::Status("done".to_string()));
    assert_eq!(events.last(), Some(&SessionEvent::Finished));

    // Starting a new session destroys the previous one on the backend.
    manager.start_new().await.unwrap();
    assert_eq!(state.finish_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn first_response_timeout_does_not_abort() {
    // The stream stays silent past the timeout; the send must still finish
    // and deliver the late response.
    let state = MockState {
        stream_script: Arc::new(vec![(
            90,
            response_line("r-late", 0, "response-part", json!({"text": "late"})),
        )]),
        ..Default::default()
    };
    let base_url = spawn_backend(state).await;
    let client = NutClient::new(base_url, "u-1", None);

    let config = DispatchConfig {
        first_response_timeout: Duration::from_millis(30),
        ..fast_config()
    };
    let mut seen = Vec::new();
    let turn = ChatTurn::new(ChatMode::BuildApp, vec![Message::user("hi")]);
    send_chat_message(&client, &config, "chat-1", &turn, |resp| seen.push(resp))
        .await
        .unwrap();

    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].text(), Some("late"));
}
