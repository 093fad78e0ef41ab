//! Backend RPC client
//!
//! Every backend method is a `POST /nut/<method>` with a JSON body and the
//! `x-user-id` / `Authorization: Bearer` headers. Non-streaming calls return
//! one parsed JSON body; streaming calls return newline-delimited JSON read
//! incrementally off the response body.

use std::pin::Pin;

use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

use crate::error::{NutError, Result};
use crate::messages::ChatResponse;

/// Stream of JSON payloads parsed from an NDJSON response body
pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<Value>> + Send>>;

/// Client for the Nut backend RPC surface
#[derive(Debug, Clone)]
pub struct NutClient {
    http: reqwest::Client,
    base_url: String,
    user_id: String,
    token: Option<String>,
}

impl NutClient {
    /// Create a new client
    pub fn new(
        base_url: impl Into<String>,
        user_id: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            user_id: user_id.into(),
            token,
        }
    }

    /// Build a client from a loaded config file
    pub fn from_config(config: &crate::config::Config) -> Result<Self> {
        let base_url = config
            .backend_url()
            .ok_or_else(|| NutError::Config("backend_url is not set".to_string()))?;
        let user_id = config
            .user_id()
            .ok_or_else(|| NutError::Config("user_id is not set".to_string()))?;
        Ok(Self::new(base_url, user_id, config.api_token()))
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/nut/{}", self.base_url.trim_end_matches('/'), method)
    }

    async fn post_raw(&self, method: &str, params: &Value) -> Result<reqwest::Response> {
        let mut request = self
            .http
            .post(self.method_url(method))
            .header("x-user-id", &self.user_id)
            .json(params);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_else(|_| "<no body>".into());
            return Err(NutError::Rpc {
                method: method.to_string(),
                status,
                body,
            });
        }
        Ok(response)
    }

    /// Invoke a non-streaming backend method and parse the JSON body
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let response = self.post_raw(method, &params).await?;
        Ok(response.json().await?)
    }

    /// Invoke a streaming backend method.
    ///
    /// The body is consumed incrementally; each complete newline-delimited
    /// JSON payload is yielded as it arrives. Malformed lines are dropped
    /// with a warning rather than failing the stream; transport errors end it.
    pub async fn open_stream(&self, method: &str, params: Value) -> Result<ResponseStream> {
        let response = self.post_raw(method, &params).await?;
        let method = method.to_string();

        let stream = async_stream::stream! {
            let mut bytes_stream = response.bytes_stream();
            let mut byte_buffer: Vec<u8> = Vec::new();
            let mut buffer = String::new();

            while let Some(chunk) = bytes_stream.next().await {
                match chunk {
                    Ok(bytes) => {
                        byte_buffer.extend_from_slice(&bytes);

                        // Only push complete UTF-8 sequences; a chunk can end
                        // mid-codepoint.
                        let valid_up_to = match std::str::from_utf8(&byte_buffer) {
                            Ok(s) => {
                                buffer.push_str(s);
                                byte_buffer.len()
                            }
                            Err(e) => {
                                let valid = e.valid_up_to();
                                if valid > 0 {
                                    buffer.push_str(
                                        std::str::from_utf8(&byte_buffer[..valid]).unwrap(),
                                    );
                                }
                                valid
                            }
                        };
                        if valid_up_to < byte_buffer.len() {
                            byte_buffer = byte_buffer[valid_up_to..].to_vec();
                        } else {
                            byte_buffer.clear();
                        }

                        while let Some(pos) = buffer.find('\n') {
                            let line: String = buffer.drain(..=pos).collect();
                            if let Some(value) = parse_stream_line(line.trim(), &method) {
                                yield Ok(value);
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(NutError::Http(e));
                        return;
                    }
                }
            }

            // Final flush of a trailing fragment without a newline
            let tail = buffer.trim().to_string();
            if !tail.is_empty() {
                if let Some(value) = parse_stream_line(&tail, &method) {
                    yield Ok(value);
                }
            }
        };

        Ok(Box::pin(stream))
    }

    /// Drive a streaming method to completion, invoking the callback per line
    pub async fn call_streaming<F>(&self, method: &str, params: Value, mut on_line: F) -> Result<()>
    where
        F: FnMut(Value) + Send,
    {
        let mut stream = self.open_stream(method, params).await?;
        while let Some(item) = stream.next().await {
            on_line(item?);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Typed wrappers for the chat lifecycle
    // ------------------------------------------------------------------

    /// Register a new chat with the backend and obtain its id
    pub async fn start_chat(&self) -> Result<StartChatResult> {
        let value = self.call("start-chat", json!({})).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Force-terminate a chat on the backend
    pub async fn finish_chat(&self, chat_id: &str) -> Result<()> {
        self.call("finish-chat", json!({ "chatId": chat_id })).await?;
        Ok(())
    }

    /// Fetch all responses for a chat since the given response time
    pub async fn get_app_responses(
        &self,
        chat_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ChatResponse>> {
        let mut params = json!({ "chatId": chat_id });
        if let Some(since) = since {
            params["since"] = json!(since);
        }
        let value = self.call("get-app-responses", params).await?;
        let result: AppResponses = serde_json::from_value(value)?;
        Ok(result.responses)
    }

    /// One-shot, non-streaming chat completion
    pub async fn chat(&self, params: Value) -> Result<Value> {
        self.call("chat", params).await
    }

    /// Kick off a deployment of the current app
    pub async fn deploy_app(&self, params: Value) -> Result<Value> {
        self.call("deploy-app", params).await
    }

    /// Fetch the file tree of a backend-hosted repository
    pub async fn get_repository_contents(&self, repository_id: &str) -> Result<Value> {
        self.call(
            "get-repository-contents",
            json!({ "repositoryId": repository_id }),
        )
        .await
    }
}

/// Result of `start-chat`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartChatResult {
    pub chat_id: String,
}

#[derive(Debug, Deserialize)]
struct AppResponses {
    #[serde(default)]
    responses: Vec<ChatResponse>,
}

/// Parse one NDJSON line, dropping malformed input with a warning
fn parse_stream_line(line: &str, method: &str) -> Option<Value> {
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(line) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(
                "dropping malformed stream line from '{}': {} - data: {:?}",
                method,
                e,
                &line[..line.len().min(100)]
            );
            None
        }
    }
}
