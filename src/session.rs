//! Managed chat sessions
//!
//! A [`ChatSession`] owns the lifecycle of one backend chat: it registers the
//! chat, drives a single turn through dispatch, and force-terminates on
//! destroy. Consumers observe it through typed subscriptions rather than
//! string-keyed listeners. [`SessionManager`] enforces at-most-one-active:
//! starting a new session destroys the previous one first.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::DispatchConfig;
use crate::dispatch::send_chat_message;
use crate::error::{NutError, Result};
use crate::messages::{ChatResponse, ChatTurn, ResponseKind};
use crate::protocol::NutClient;

/// Lifecycle of a single managed chat session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Sending,
    Finished,
}

/// Typed event delivered to session subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A streamed piece of the assistant's contribution
    ResponsePart(ChatResponse),
    /// The backend assigned or updated the chat title
    Title(String),
    /// Backend-side status change for the in-flight turn
    Status(String),
    /// The turn's round-trip resolved; no further events for this turn
    Finished,
}

struct Subscriber {
    id: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

type Subscribers = Arc<Mutex<Vec<Subscriber>>>;

/// Receiving end of a session subscription.
///
/// Dropping the subscription stops delivery; `unsubscribe` removes it
/// eagerly instead of on the next failed send.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<SessionEvent>,
    subscribers: Subscribers,
}

impl Subscription {
    /// Wait for the next event; `None` once the session is gone
    pub async fn next(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }

    /// Detach from the session eagerly
    pub fn unsubscribe(self) {
        self.subscribers
            .lock()
            .unwrap()
            .retain(|s| s.id != self.id);
    }

    /// Consume the subscription as a stream of events
    pub fn into_stream(self) -> UnboundedReceiverStream<SessionEvent> {
        UnboundedReceiverStream::new(self.rx)
    }
}

/// One managed chat session: register, send one turn, destroy
pub struct ChatSession {
    client: NutClient,
    config: DispatchConfig,
    state: SessionState,
    chat_id: Option<String>,
    cancel: CancellationToken,
    subscribers: Subscribers,
    next_subscriber_id: AtomicU64,
}

impl ChatSession {
    pub fn new(client: NutClient, config: DispatchConfig) -> Self {
        Self {
            client,
            config,
            state: SessionState::Idle,
            chat_id: None,
            cancel: CancellationToken::new(),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            next_subscriber_id: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    /// Attach a typed subscription for this session's events
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().unwrap().push(Subscriber { id, tx });
        Subscription {
            id,
            rx,
            subscribers: Arc::clone(&self.subscribers),
        }
    }

    /// Send one chat turn through this session.
    ///
    /// Drives Idle -> Starting (registers with the backend and obtains a chat
    /// id) -> Sending (responses flow to subscribers) -> Finished (the
    /// round-trip resolved; subscribers get [`SessionEvent::Finished`]
    /// unconditionally). A session carries exactly one turn; start a new
    /// session for the next turn.
    pub async fn send_message(&mut self, turn: &ChatTurn) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(NutError::Other(format!(
                "session already used (state {:?})",
                self.state
            )));
        }

        self.state = SessionState::Starting;
        let chat_id = match self.client.start_chat().await {
            Ok(started) => started.chat_id,
            Err(e) => {
                self.state = SessionState::Finished;
                return Err(e);
            }
        };
        info!("chat {} registered", chat_id);
        self.chat_id = Some(chat_id.clone());

        self.state = SessionState::Sending;
        let subscribers = Arc::clone(&self.subscribers);
        let result = tokio::select! {
            result = send_chat_message(
                &self.client,
                &self.config,
                &chat_id,
                turn,
                move |resp| emit(&subscribers, event_for(resp)),
            ) => result,
            _ = self.cancel.cancelled() => Err(NutError::Cancelled),
        };

        self.state = SessionState::Finished;
        emit(&self.subscribers, SessionEvent::Finished);
        result
    }

    /// Force-terminate this session.
    ///
    /// Cancels any in-flight send, tells the backend to finish the chat, and
    /// moves to Finished. Callable from any state; repeated calls are no-ops.
    pub async fn destroy(&mut self) -> Result<()> {
        self.cancel.cancel();
        if let Some(chat_id) = self.chat_id.take() {
            if let Err(e) = self.client.finish_chat(&chat_id).await {
                warn!("finish-chat failed for {}: {}", chat_id, e);
            }
        }
        self.state = SessionState::Finished;
        Ok(())
    }
}

/// Owns the single active chat session.
///
/// `start_new` destroys whatever session was active before handing out a new
/// one, so at most one session talks to the backend at a time.
pub struct SessionManager {
    client: NutClient,
    config: DispatchConfig,
    active: Option<ChatSession>,
}

impl SessionManager {
    pub fn new(client: NutClient, config: DispatchConfig) -> Self {
        Self {
            client,
            config,
            active: None,
        }
    }

    /// Destroy the previous session, if any, and start a fresh one
    pub async fn start_new(&mut self) -> Result<&mut ChatSession> {
        if let Some(mut previous) = self.active.take() {
            if let Err(e) = previous.destroy().await {
                warn!("failed to destroy previous session: {}", e);
            }
        }
        let session = self
            .active
            .insert(ChatSession::new(self.client.clone(), self.config.clone()));
        Ok(session)
    }

    /// The currently active session, if any
    pub fn active(&mut self) -> Option<&mut ChatSession> {
        self.active.as_mut()
    }

    /// Destroy the active session, if any
    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(mut session) = self.active.take() {
            session.destroy().await?;
        }
        Ok(())
    }
}

fn event_for(resp: ChatResponse) -> SessionEvent {
    match resp.kind {
        ResponseKind::Title => SessionEvent::Title(text_field(&resp, "title")),
        ResponseKind::Status => SessionEvent::Status(text_field(&resp, "status")),
        _ => SessionEvent::ResponsePart(resp),
    }
}

fn text_field(resp: &ChatResponse, key: &str) -> String {
    resp.content
        .get(key)
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn emit(subscribers: &Subscribers, event: SessionEvent) {
    subscribers
        .lock()
        .unwrap()
        .retain(|s| s.tx.send(event.clone()).is_ok());
}
