//! nut-chat - chat dispatch and prompt rule injection for the Nut backend
//!
//! Two loosely coupled subsystems behind one crate:
//! - Chat dispatch: delivers a user's turn over a long-poll NDJSON stream
//!   with a short-poll safety net, plus managed session lifecycle
//! - Prompt rule injector: assembles the system prompt from a static rule
//!   table with verbosity selection and token-budget trimming

pub mod config;
pub mod dispatch;
pub mod error;
pub mod messages;
pub mod preview;
pub mod prompt;
pub mod protocol;
pub mod session;

pub use config::{Config, DispatchConfig};
pub use dispatch::{listen_app_responses, send_chat_message};
pub use error::{NutError, Result};
pub use messages::{
    ChatMode, ChatReference, ChatResponse, ChatTurn, Message, MessageCategory, MessageContent,
    MessageRole, ResponseKind,
};
pub use prompt::{GeneratedPrompt, PromptOptions, generate_prompt};
pub use protocol::NutClient;
pub use session::{ChatSession, SessionEvent, SessionManager, SessionState, Subscription};
