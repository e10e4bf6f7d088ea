//! HTTP-based LLM provider.
//!
//! Speaks the OpenAI-compatible chat-completions dialect with native
//! function calling, which covers OpenAI itself as well as the
//! HuggingFace router and vLLM-style self-hosted endpoints.

use crate::provider::{
    CompletionRequest, CompletionResponse, ContentBlock, LlmError, LlmProvider, Role, StopReason,
    ToolDefinition,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

// ── Request types ──

#[derive(Serialize)]
struct OaiRequest {
    model: String,
    messages: Vec<OaiMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OaiToolDef>,
}

#[derive(Serialize)]
struct OaiMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OaiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl OaiMessage {
    fn plain(role: &'static str, content: String) -> Self {
        Self { role, content: Some(content), tool_calls: None, tool_call_id: None }
    }
}

#[derive(Serialize, Deserialize)]
struct OaiToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: OaiFunctionCall,
}

#[derive(Serialize, Deserialize)]
struct OaiFunctionCall {
    name: String,
    /// JSON-encoded argument object, per the wire format.
    arguments: String,
}

#[derive(Serialize)]
struct OaiToolDef {
    #[serde(rename = "type")]
    kind: &'static str,
    function: OaiFunctionDef,
}

#[derive(Serialize)]
struct OaiFunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

impl From<&ToolDefinition> for OaiToolDef {
    fn from(td: &ToolDefinition) -> Self {
        Self {
            kind: "function",
            function: OaiFunctionDef {
                name: td.name.clone(),
                description: td.description.clone(),
                parameters: td.input_schema.clone(),
            },
        }
    }
}

// ── Response types ──

#[derive(Deserialize)]
struct OaiResponse {
    choices: Vec<OaiChoice>,
    usage: Option<OaiUsage>,
}

#[derive(Deserialize)]
struct OaiChoice {
    message: OaiChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OaiChoiceMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OaiToolCall>>,
}

#[derive(Deserialize)]
struct OaiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

// ── Provider ──

/// OpenAI-compatible chat provider.
pub struct HttpProvider {
    model: String,
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpProvider {
    /// Build from model name + API key + optional base URL override.
    pub fn new(model: String, api_key: String, base_url: Option<String>) -> Self {
        let base = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        Self {
            model,
            client: reqwest::Client::new(),
            base_url: base.trim_end_matches('/').to_owned(),
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_messages(request: &CompletionRequest) -> Vec<OaiMessage> {
        let mut out = Vec::with_capacity(request.messages.len());
        for m in &request.messages {
            if m.content_blocks.is_empty() {
                out.push(OaiMessage::plain(role_str(&m.role), m.content.clone()));
                continue;
            }
            match m.role {
                Role::Assistant => {
                    // Assistant turn that requested tool calls: text plus tool_calls array.
                    let tool_calls: Vec<OaiToolCall> = m.content_blocks.iter().filter_map(|b| {
                        if let ContentBlock::ToolUse { id, name, input } = b {
                            Some(OaiToolCall {
                                id: id.clone(),
                                kind: "function".into(),
                                function: OaiFunctionCall {
                                    name: name.clone(),
                                    arguments: input.to_string(),
                                },
                            })
                        } else {
                            None
                        }
                    }).collect();
                    out.push(OaiMessage {
                        role: "assistant",
                        content: if m.content.is_empty() { None } else { Some(m.content.clone()) },
                        tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
                        tool_call_id: None,
                    });
                }
                _ => {
                    // Tool results ride as one role:"tool" message each.
                    for b in &m.content_blocks {
                        match b {
                            ContentBlock::ToolResult { tool_use_id, content, .. } => {
                                out.push(OaiMessage {
                                    role: "tool",
                                    content: Some(content.clone()),
                                    tool_calls: None,
                                    tool_call_id: Some(tool_use_id.clone()),
                                });
                            }
                            ContentBlock::Text { text } => {
                                out.push(OaiMessage::plain(role_str(&m.role), text.clone()));
                            }
                            ContentBlock::ToolUse { .. } => {}
                        }
                    }
                }
            }
        }
        out
    }
}

fn role_str(role: &Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Parse error response, returning RateLimited for 429.
fn check_error(status: reqwest::StatusCode, body: String) -> LlmError {
    if status.as_u16() == 429 {
        LlmError::RateLimited
    } else {
        LlmError::RequestFailed(format!("{status}: {body}"))
    }
}

impl LlmProvider for HttpProvider {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn complete(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>> {
        Box::pin(self.complete_inner(request))
    }
}

impl HttpProvider {
    async fn complete_inner(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        let body = OaiRequest {
            model: self.model.clone(),
            messages: Self::build_messages(&request),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            tools: request.tools.iter().map(OaiToolDef::from).collect(),
        };
        debug!(
            model = %self.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            "chat completion request"
        );

        let resp = self.client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(check_error(status, text));
        }

        let api: OaiResponse = resp.json().await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let (input_tokens, output_tokens) = api.usage
            .map(|u| (u.prompt_tokens, u.completion_tokens)).unwrap_or((0, 0));

        let Some(choice) = api.choices.into_iter().next() else {
            return Err(LlmError::RequestFailed("empty choices array".into()));
        };

        let mut content_blocks = Vec::new();
        let content = choice.message.content.unwrap_or_default();
        if !content.is_empty() {
            content_blocks.push(ContentBlock::Text { text: content.clone() });
        }
        for tc in choice.message.tool_calls.unwrap_or_default() {
            let input = serde_json::from_str(&tc.function.arguments)
                .unwrap_or(serde_json::Value::Null);
            content_blocks.push(ContentBlock::ToolUse {
                id: tc.id,
                name: tc.function.name,
                input,
            });
        }

        let stop_reason = match choice.finish_reason.as_deref() {
            Some("tool_calls") => StopReason::ToolUse,
            Some("length") => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        };

        Ok(CompletionResponse { content, content_blocks, stop_reason, input_tokens, output_tokens })
    }
}

/// Build an LlmProvider from environment variables.
/// Reads `FORTUNA_LLM_MODEL`, `FORTUNA_LLM_API_KEY`, optionally
/// `FORTUNA_LLM_BASE_URL`. Returns `None` if model or key is not set.
pub fn from_env() -> Option<HttpProvider> {
    let model = std::env::var("FORTUNA_LLM_MODEL").ok()?;
    let api_key = std::env::var("FORTUNA_LLM_API_KEY").ok()?;
    let base_url = std::env::var("FORTUNA_LLM_BASE_URL").ok();
    Some(HttpProvider::new(model, api_key, base_url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ChatMessage;

    #[test]
    fn default_endpoint() {
        let p = HttpProvider::new("gpt-4o".into(), "sk-test".into(), None);
        assert_eq!(p.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn custom_base_url_override() {
        let p = HttpProvider::new(
            "Qwen/Qwen3-30B-A3B".into(),
            "hf-test".into(),
            Some("https://router.huggingface.co/v1/".into()),
        );
        assert_eq!(p.endpoint(), "https://router.huggingface.co/v1/chat/completions");
    }

    #[test]
    fn tool_results_become_tool_role_messages() {
        let req = CompletionRequest {
            messages: vec![
                ChatMessage::user("hesap 1 bakiye"),
                ChatMessage::from_content_blocks(
                    Role::Assistant,
                    vec![ContentBlock::ToolUse {
                        id: "call_1".into(),
                        name: "get_balance".into(),
                        input: serde_json::json!({"account_id": 1}),
                    }],
                ),
                ChatMessage::tool_results(vec![ContentBlock::ToolResult {
                    tool_use_id: "call_1".into(),
                    content: r#"{"balance": 100.0}"#.into(),
                    is_error: false,
                }]),
            ],
            max_tokens: 256,
            temperature: 0.2,
            tools: vec![],
        };
        let messages = HttpProvider::build_messages(&req);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[1].role, "assistant");
        assert!(messages[1].tool_calls.is_some());
        assert_eq!(messages[2].role, "tool");
        assert_eq!(messages[2].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn parses_tool_call_arguments() {
        let raw = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "get_accounts", "arguments": "{\"customer_id\": 7}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 4}
        }"#;
        let api: OaiResponse = serde_json::from_str(raw).unwrap();
        let choice = &api.choices[0];
        assert_eq!(choice.finish_reason.as_deref(), Some("tool_calls"));
        let calls = choice.message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "get_accounts");
    }
}
