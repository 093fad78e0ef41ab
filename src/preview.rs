//! Preview-frame bridge
//!
//! Request/response correlation with the embedded app preview. Each request
//! carries a monotonically increasing numeric id and the fixed source tag;
//! exactly one pending waiter is resolved per (id, source) pair. Replies
//! with unknown ids or a foreign source tag are ignored.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{NutError, Result};

/// Source tag identifying our traffic on the shared message channel
pub const PREVIEW_SOURCE: &str = "@@replay-nut";

/// Request kinds understood by the preview frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PreviewRequestKind {
    /// Fetch the current interaction recording as a binary buffer
    RecordingData,
    /// Resolve a viewport position to element data
    MouseData { x: f64, y: f64 },
    /// Fetch errors the preview detected while running the app
    GetDetectedErrors,
}

/// Envelope posted to the preview frame
#[derive(Debug, Clone, Serialize)]
pub struct PreviewRequest {
    pub id: u64,
    pub source: &'static str,
    #[serde(flatten)]
    pub kind: PreviewRequestKind,
}

/// Envelope received back from the preview frame
#[derive(Debug, Clone, Deserialize)]
pub struct PreviewReply {
    pub id: u64,
    pub source: String,
    #[serde(default)]
    pub payload: Value,
}

/// An error the preview frame observed while the app was running
#[derive(Debug, Clone, Deserialize)]
pub struct DetectedError {
    pub time: DateTime<Utc>,
    pub message: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Outbound side of the preview channel.
///
/// Implementations wrap whatever actually carries the message (webview
/// postMessage glue, a test channel).
#[async_trait]
pub trait PreviewTransport: Send + Sync {
    async fn post(&self, request: &PreviewRequest) -> anyhow::Result<()>;
}

/// Correlates preview requests with their replies
pub struct PreviewBridge<T: PreviewTransport> {
    transport: T,
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, oneshot::Sender<PreviewReply>>>,
}

impl<T: PreviewTransport> PreviewBridge<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Send one request and wait for its reply
    pub async fn request(&self, kind: PreviewRequestKind) -> Result<PreviewReply> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(id, tx);

        let request = PreviewRequest {
            id,
            source: PREVIEW_SOURCE,
            kind,
        };
        if let Err(e) = self.transport.post(&request).await {
            self.pending.lock().unwrap().remove(&id);
            return Err(NutError::Anyhow(e));
        }

        rx.await.map_err(|_| NutError::Cancelled)
    }

    /// Feed a message received from the preview frame.
    ///
    /// Resolves the matching waiter, if any. Foreign source tags and unknown
    /// ids are dropped silently so the bridge can share a channel with other
    /// listeners.
    pub fn handle_reply(&self, reply: PreviewReply) {
        if reply.source != PREVIEW_SOURCE {
            return;
        }
        match self.pending.lock().unwrap().remove(&reply.id) {
            Some(tx) => {
                let _ = tx.send(reply);
            }
            None => debug!("ignoring preview reply for unknown request id {}", reply.id),
        }
    }

    /// Fetch the current interaction recording
    pub async fn recording_data(&self) -> Result<Vec<u8>> {
        let reply = self.request(PreviewRequestKind::RecordingData).await?;
        Ok(serde_json::from_value(reply.payload)?)
    }

    /// Resolve a mouse position to element data
    pub async fn mouse_data(&self, x: f64, y: f64) -> Result<Value> {
        let reply = self.request(PreviewRequestKind::MouseData { x, y }).await?;
        Ok(reply.payload)
    }

    /// Fetch errors the preview detected
    pub async fn detected_errors(&self) -> Result<Vec<DetectedError>> {
        let reply = self.request(PreviewRequestKind::GetDetectedErrors).await?;
        Ok(serde_json::from_value(reply.payload)?)
    }
}
