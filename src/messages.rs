//! Chat data model
//!
//! Wire types for one chat turn and the response units streamed back for it.
//! Messages are append-only: the UI layer creates them, this crate only
//! filters and transmits them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Message payload, either plain text or an inline image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageContent {
    Text {
        text: String,
    },
    Image {
        #[serde(rename = "mimeType")]
        mime_type: String,
        data: String,
    },
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        MessageContent::Text { text: text.into() }
    }
}

/// Category tag controlling whether a message is ever transmitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageCategory {
    /// Ordinary conversational message
    #[default]
    Conversation,
    /// Assistant answer produced during discovery, shown to the user
    DiscoveryResponse,
    /// Assistant answer addressed directly to the user
    UserResponse,
    /// Client-side bookkeeping, never sent to the backend
    InternalNote,
}

/// One exchange unit in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: MessageRole,
    pub content: MessageContent,
    #[serde(default)]
    pub category: MessageCategory,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::text(text),
            category: MessageCategory::Conversation,
        }
    }

    pub fn assistant(text: impl Into<String>, category: MessageCategory) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: MessageContent::text(text),
            category,
        }
    }

    /// Whether this message may ever be sent to the backend.
    ///
    /// User messages always go; assistant messages only when their category
    /// marks them as a discovery or user-facing response. Everything else is
    /// internal bookkeeping and stays on the client.
    pub fn should_transmit(&self) -> bool {
        self.role == MessageRole::User
            || matches!(
                self.category,
                MessageCategory::DiscoveryResponse | MessageCategory::UserResponse
            )
    }
}

/// What the user is asking the backend to do with this turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChatMode {
    BuildApp,
    Discovery,
    DevelopApp,
}

/// A pointer into the running preview the user is talking about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ChatReference {
    ElementSelector { selector: String },
    MousePosition { x: f64, y: f64 },
}

/// One user-initiated exchange sent to the backend.
///
/// Constructed fresh per send; immutable once sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub mode: ChatMode,
    pub messages: Vec<Message>,
    pub references: Vec<ChatReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_data: Option<Value>,
}

impl ChatTurn {
    pub fn new(mode: ChatMode, messages: Vec<Message>) -> Self {
        Self {
            mode,
            messages,
            references: Vec::new(),
            session_data: None,
        }
    }

    pub fn with_references(mut self, references: Vec<ChatReference>) -> Self {
        self.references = references;
        self
    }

    pub fn with_session_data(mut self, data: Value) -> Self {
        self.session_data = Some(data);
        self
    }
}

/// Kind tag on a streamed response unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseKind {
    ResponsePart,
    Title,
    Status,
    #[serde(other)]
    Unknown,
}

/// A single streamed unit sent back from the backend for a chat turn.
///
/// The aggregate of all responses for one turn forms the assistant's
/// contribution. Both delivery paths may hand the same unit to the caller;
/// delivery is at-least-once and identity is `response_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    #[serde(default)]
    pub response_id: String,
    pub time: DateTime<Utc>,
    pub kind: ResponseKind,
    #[serde(default)]
    pub content: Value,
}

impl ChatResponse {
    /// Extract the text payload for response-part units, when present
    pub fn text(&self) -> Option<&str> {
        self.content.get("text").and_then(Value::as_str)
    }
}
