use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    /// Plain text content (convenience — concatenation of Text blocks).
    pub content: String,
    /// Structured content blocks (tool-call protocol).
    /// Empty means the message is plain text only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content_blocks: Vec<ContentBlock>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into(), content_blocks: vec![] }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), content_blocks: vec![] }
    }

    /// Build a message from structured content blocks.
    pub fn from_content_blocks(role: Role, blocks: Vec<ContentBlock>) -> Self {
        let text: String = blocks.iter().filter_map(|b| match b {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        }).collect::<Vec<_>>().join("");
        Self { role, content: text, content_blocks: blocks }
    }

    /// Build a User message carrying tool results.
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self { role: Role::User, content: String::new(), content_blocks: results }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    System,
    User,
    Assistant,
}

// ── Tool use types ──

/// Tool definition sent in requests (name + description + JSON Schema).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// A content block in a message — text, tool call, or tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: serde_json::Value },
    ToolResult { tool_use_id: String, content: String, is_error: bool },
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    #[default]
    EndTurn,
    ToolUse,
    MaxTokens,
}

/// LLM completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Tool definitions for native tool calling (empty = no tools).
    pub tools: Vec<ToolDefinition>,
}

/// LLM completion response.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Convenience: concatenation of all Text blocks.
    pub content: String,
    /// Structured content blocks from the model.
    pub content_blocks: Vec<ContentBlock>,
    /// Why the model stopped.
    pub stop_reason: StopReason,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl CompletionResponse {
    /// First tool call in the response, if the model requested one.
    pub fn first_tool_use(&self) -> Option<(&str, &str, &serde_json::Value)> {
        self.content_blocks.iter().find_map(|b| match b {
            ContentBlock::ToolUse { id, name, input } => {
                Some((id.as_str(), name.as_str(), input))
            }
            _ => None,
        })
    }
}

/// Error type for LLM operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("rate limited")]
    RateLimited,
    #[error("request failed: {0}")]
    RequestFailed(String),
}

/// Trait for LLM providers (any OpenAI-compatible chat endpoint).
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    fn complete(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>>;
}

/// Mock provider for testing — returns a fixed response.
#[derive(Debug, Clone)]
pub struct MockProvider {
    pub response: String,
    pub response_blocks: Vec<ContentBlock>,
    pub stop_reason: StopReason,
}

impl MockProvider {
    pub fn new(response: impl Into<String>) -> Self {
        let text = response.into();
        Self {
            response: text.clone(),
            response_blocks: vec![ContentBlock::Text { text }],
            stop_reason: StopReason::EndTurn,
        }
    }

    /// Create a mock that returns specific content blocks and stop reason.
    pub fn with_blocks(blocks: Vec<ContentBlock>, stop_reason: StopReason) -> Self {
        let text: String = blocks.iter().filter_map(|b| match b {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        }).collect::<Vec<_>>().join("");
        Self { response: text, response_blocks: blocks, stop_reason }
    }
}

impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>> {
        let content = self.response.clone();
        let blocks = self.response_blocks.clone();
        let stop = self.stop_reason;
        Box::pin(async move {
            Ok(CompletionResponse {
                content,
                content_blocks: blocks,
                stop_reason: stop,
                input_tokens: 10,
                output_tokens: 20,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_provider_returns_response() {
        let mock = MockProvider::new("merhaba");
        let req = CompletionRequest {
            messages: vec![ChatMessage::user("selam")],
            max_tokens: 100,
            temperature: 0.2,
            tools: vec![],
        };
        let resp = mock.complete(req).await.unwrap();
        assert_eq!(resp.content, "merhaba");
        assert_eq!(resp.stop_reason, StopReason::EndTurn);
        assert!(resp.first_tool_use().is_none());
    }

    #[tokio::test]
    async fn first_tool_use_skips_text_blocks() {
        let mock = MockProvider::with_blocks(
            vec![
                ContentBlock::Text { text: "checking".into() },
                ContentBlock::ToolUse {
                    id: "call_1".into(),
                    name: "get_accounts".into(),
                    input: serde_json::json!({}),
                },
            ],
            StopReason::ToolUse,
        );
        let resp = mock
            .complete(CompletionRequest {
                messages: vec![ChatMessage::user("hesaplarım")],
                max_tokens: 100,
                temperature: 0.2,
                tools: vec![],
            })
            .await
            .unwrap();
        let (id, name, _) = resp.first_tool_use().unwrap();
        assert_eq!(id, "call_1");
        assert_eq!(name, "get_accounts");
    }
}
