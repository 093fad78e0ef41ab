//! Chat dispatch and response reconciliation
//!
//! One turn is delivered over two concurrent paths:
//! - a long-poll stream (`send-chat-message`) parsed line by line, and
//! - a short-poll safety net (`get-app-responses`) that re-queries for
//!   anything the stream missed on a fixed interval.
//!
//! The safety net always runs one final cleanup fetch after the stream
//! finishes, success or failure, and its timer is then cancelled
//! unconditionally. Delivery to the caller is at-least-once: the two paths
//! may hand over the same response unit and no deduplication is performed
//! (response identity is `response_id`; callers that need exactly-once can
//! dedupe on it).

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::error::{NutError, Result};
use crate::messages::{ChatResponse, ChatTurn, Message};
use crate::protocol::NutClient;

type LastSeen = Arc<Mutex<Option<DateTime<Utc>>>>;

/// Deliver one chat turn and reconcile asynchronous response delivery.
///
/// Invokes `on_response` once per response unit received, in per-path arrival
/// order. Fails fast when no chat id is active. Only messages passing
/// [`Message::should_transmit`] are sent; internal bookkeeping never leaves
/// the client.
pub async fn send_chat_message<F>(
    client: &NutClient,
    config: &DispatchConfig,
    chat_id: &str,
    turn: &ChatTurn,
    mut on_response: F,
) -> Result<()>
where
    F: FnMut(ChatResponse) + Send,
{
    if chat_id.is_empty() {
        return Err(NutError::NoActiveChat);
    }

    let outbound: Vec<Message> = turn
        .messages
        .iter()
        .filter(|m| m.should_transmit())
        .cloned()
        .collect();
    let params = json!({
        "chatId": chat_id,
        "responseId": Uuid::new_v4().to_string(),
        "mode": turn.mode,
        "messages": outbound,
        "references": turn.references,
        "sessionData": turn.session_data,
    });

    let last_seen: LastSeen = Arc::new(Mutex::new(None));
    let (tx, mut rx) = mpsc::unbounded_channel::<ChatResponse>();

    // Short-poll safety net, cancelled unconditionally once the stream ends.
    let poll_client = client.clone();
    let poll_chat = chat_id.to_string();
    let poll_seen = Arc::clone(&last_seen);
    let poll_tx = tx.clone();
    let poll_interval = config.short_poll_interval;
    // AbortOnDropHandle makes the cancellation unconditional: the timer dies
    // with this scope no matter how the send resolves.
    let poll_task = AbortOnDropHandle::new(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so polling starts
        // one full interval after the send.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            replay_missed(&poll_client, &poll_chat, &poll_seen, &poll_tx).await;
        }
    }));

    // Long-poll path: one streaming call held open for the whole turn.
    let stream_seen = Arc::clone(&last_seen);
    let stream_tx = tx;
    let long_poll = client.call_streaming("send-chat-message", params, move |value| {
        match serde_json::from_value::<ChatResponse>(value) {
            Ok(resp) => {
                bump_last_seen(&stream_seen, resp.time);
                let _ = stream_tx.send(resp);
            }
            Err(e) => warn!("dropping unrecognized response unit: {}", e),
        }
    });
    tokio::pin!(long_poll);

    let first_response_deadline = tokio::time::sleep(config.first_response_timeout);
    tokio::pin!(first_response_deadline);
    let mut any_response = false;
    let mut timeout_reported = false;

    let stream_result = loop {
        tokio::select! {
            result = &mut long_poll => break result,
            Some(resp) = rx.recv() => {
                any_response = true;
                on_response(resp);
            }
            _ = &mut first_response_deadline, if !any_response && !timeout_reported => {
                // Telemetry only; the request keeps waiting.
                timeout_reported = true;
                warn!(
                    "no response part after {:?} on chat {}",
                    config.first_response_timeout, chat_id
                );
            }
        }
    };

    // The stream is done, success or failure: stop the timer, drain what is
    // already queued, then run the one guaranteed cleanup fetch.
    drop(poll_task);
    while let Ok(resp) = rx.try_recv() {
        on_response(resp);
    }
    let since = *last_seen.lock().unwrap();
    match client.get_app_responses(chat_id, since).await {
        Ok(responses) => {
            for resp in responses {
                on_response(resp);
            }
        }
        Err(e) => warn!("cleanup fetch failed for chat {}: {}", chat_id, e),
    }

    stream_result
}

/// Re-attach to an in-flight turn and replay its responses.
///
/// Reconnects the `listen-app-responses` stream with a fixed delay on any
/// error, until the stream completes without failing or the token is
/// cancelled. Meant to run for the lifetime of a page view: errors are
/// swallowed and retried, never propagated.
pub async fn listen_app_responses<F>(
    client: &NutClient,
    config: &DispatchConfig,
    chat_id: &str,
    cancel: CancellationToken,
    mut on_response: F,
) -> Result<()>
where
    F: FnMut(ChatResponse) + Send,
{
    if chat_id.is_empty() {
        return Err(NutError::NoActiveChat);
    }

    loop {
        let params = json!({ "chatId": chat_id });
        let attempt = client.call_streaming("listen-app-responses", params, |value| {
            match serde_json::from_value::<ChatResponse>(value) {
                Ok(resp) => on_response(resp),
                Err(e) => warn!("dropping unrecognized response unit: {}", e),
            }
        });

        tokio::select! {
            result = attempt => match result {
                Ok(()) => return Ok(()),
                Err(e) => warn!(
                    "listen stream for chat {} failed, retrying in {:?}: {}",
                    chat_id, config.listen_retry_delay, e
                ),
            },
            _ = cancel.cancelled() => return Err(NutError::Cancelled),
        }

        tokio::select! {
            _ = tokio::time::sleep(config.listen_retry_delay) => {}
            _ = cancel.cancelled() => return Err(NutError::Cancelled),
        }
    }
}

async fn replay_missed(
    client: &NutClient,
    chat_id: &str,
    last_seen: &LastSeen,
    tx: &mpsc::UnboundedSender<ChatResponse>,
) {
    let since = *last_seen.lock().unwrap();
    match client.get_app_responses(chat_id, since).await {
        Ok(responses) => {
            for resp in responses {
                bump_last_seen(last_seen, resp.time);
                if tx.send(resp).is_err() {
                    break;
                }
            }
        }
        Err(e) => debug!("short-poll fetch failed for chat {}: {}", chat_id, e),
    }
}

fn bump_last_seen(last_seen: &Mutex<Option<DateTime<Utc>>>, time: DateTime<Utc>) {
    let mut seen = last_seen.lock().unwrap();
    if seen.map_or(true, |t| time > t) {
        *seen = Some(time);
    }
}
