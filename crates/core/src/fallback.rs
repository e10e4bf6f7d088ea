//! Model fallback loop: at most two model rounds per turn.
//!
//! Round one offers the tool catalog and takes the first tool call
//! only. The call runs through the same identity injection as planned
//! flows. Round two sees the tool result without a catalog and may
//! rephrase the display text; the normalized payload is authoritative
//! for everything else.

use crate::config::FortunaCfg;
use crate::inject::invoke_with_identity;
use crate::normalize::normalize;
use crate::tool::{Args, ToolError, ToolRegistry};
use crate::types::{CallerContext, Intent, NormalizedReply, ToolReply};
use llm::provider::{
    ChatMessage, CompletionRequest, ContentBlock, LlmProvider, Role,
};
use tracing::{debug, info};

const SYSTEM_PROMPT: &str = "\
Sen bir bankacılık asistanısın. Müşterinin sorusunu yanıtlamak için \
gerekiyorsa sana verilen araçlardan en uygun TEK aracı çağır. Müşteri \
kimliği sistem tarafından eklenir; kimlik parametresi uydurma. Araç \
sonucu geldikten sonra kısa ve net bir Türkçe yanıt yaz. Bankacılık \
dışı konulara girme.";

const NO_ANSWER: &str =
    "Bu konuda yardımcı olamıyorum. Bankacılık işlemlerinizle ilgili sorabilirsiniz.";

fn request(messages: Vec<ChatMessage>, tools: Vec<llm::provider::ToolDefinition>, cfg: &FortunaCfg) -> CompletionRequest {
    CompletionRequest {
        messages,
        max_tokens: cfg.llm_max_tokens,
        temperature: cfg.llm_temperature,
        tools,
    }
}

/// Run the bounded model loop and produce the final reply.
pub async fn run(
    provider: &dyn LlmProvider,
    registry: &ToolRegistry,
    intent: Intent,
    ctx: &CallerContext,
    cfg: &FortunaCfg,
) -> NormalizedReply {
    let base_messages = vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(ctx.raw_utterance.clone()),
    ];

    let round1 = match provider
        .complete(request(base_messages.clone(), registry.tool_definitions(), cfg))
        .await
    {
        Ok(resp) => resp,
        Err(e) => {
            info!(provider = provider.name(), error = %e, "model round one failed");
            return normalize(intent, &ToolReply::Error(ToolError::Transport(e.to_string())), cfg);
        }
    };

    let Some((call_id, tool_name, input)) = round1.first_tool_use() else {
        // No tool requested: the model's text is the whole answer.
        let text = round1.content.trim();
        return NormalizedReply::text_only(if text.is_empty() { NO_ANSWER } else { text });
    };
    let call_id = call_id.to_owned();
    let tool_name = tool_name.to_owned();
    let args: Args = input.as_object().cloned().unwrap_or_default();
    debug!(tool = %tool_name, "model requested tool");

    let reply = match registry.get_by_name(&tool_name) {
        Some(tool) => invoke_with_identity(tool, args, ctx, cfg.tool_timeout_ms).await,
        None => {
            info!(tool = %tool_name, "model requested unknown tool");
            ToolReply::Error(ToolError::NotFound(format!("Araç bulunamadı: {tool_name}")))
        }
    };
    let normalized = normalize(intent, &reply, cfg);

    // Round two: same conversation plus the tool exchange, no catalog,
    // so the model can only phrase, not act.
    let (feedback, is_error) = reply.to_feedback();
    let mut messages = base_messages;
    messages.push(ChatMessage::from_content_blocks(
        Role::Assistant,
        vec![ContentBlock::ToolUse {
            id: call_id.clone(),
            name: tool_name,
            input: serde_json::Value::Object(
                input.as_object().cloned().unwrap_or_default(),
            ),
        }],
    ));
    messages.push(ChatMessage::tool_results(vec![ContentBlock::ToolResult {
        tool_use_id: call_id,
        content: feedback,
        is_error,
    }]));

    match provider.complete(request(messages, vec![], cfg)).await {
        Ok(resp) if !resp.content.trim().is_empty() => NormalizedReply {
            text: resp.content.trim().to_owned(),
            structured_ui: normalized.structured_ui,
        },
        Ok(_) => normalized,
        Err(e) => {
            // The tool already answered; a phrasing failure is not a
            // turn failure.
            info!(provider = provider.name(), error = %e, "model round two failed");
            normalized
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::ASK_ACCOUNT;
    use crate::repo::sqlite::SqliteRepo;
    use crate::tool::banking_registry;
    use llm::provider::{CompletionResponse, LlmError, StopReason};
    use serde_json::json;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Provider scripted per round: a tool call first, then text.
    struct TwoStepProvider {
        calls: AtomicUsize,
        tool_name: String,
        tool_input: serde_json::Value,
        final_text: String,
    }

    impl TwoStepProvider {
        fn new(tool_name: &str, tool_input: serde_json::Value, final_text: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                tool_name: tool_name.into(),
                tool_input,
                final_text: final_text.into(),
            }
        }
    }

    impl LlmProvider for TwoStepProvider {
        fn name(&self) -> &str {
            "two-step"
        }

        fn complete(
            &self,
            request: CompletionRequest,
        ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>>
        {
            let round = self.calls.fetch_add(1, Ordering::SeqCst);
            let resp = if round == 0 {
                assert!(!request.tools.is_empty(), "round one must carry the catalog");
                CompletionResponse {
                    content: String::new(),
                    content_blocks: vec![ContentBlock::ToolUse {
                        id: "call_1".into(),
                        name: self.tool_name.clone(),
                        input: self.tool_input.clone(),
                    }],
                    stop_reason: StopReason::ToolUse,
                    input_tokens: 1,
                    output_tokens: 1,
                }
            } else {
                assert!(request.tools.is_empty(), "round two must not carry the catalog");
                CompletionResponse {
                    content: self.final_text.clone(),
                    content_blocks: vec![ContentBlock::Text { text: self.final_text.clone() }],
                    stop_reason: StopReason::EndTurn,
                    input_tokens: 1,
                    output_tokens: 1,
                }
            };
            Box::pin(async move { Ok(resp) })
        }
    }

    async fn setup() -> (ToolRegistry, FortunaCfg) {
        let repo = SqliteRepo::connect_memory().await.unwrap();
        repo.seed_demo().await.unwrap();
        let cfg = FortunaCfg::default();
        (banking_registry(Arc::new(repo), &cfg), cfg)
    }

    fn ctx(customer_id: i64, utterance: &str) -> CallerContext {
        CallerContext::new(customer_id, "s-test", utterance)
    }

    #[tokio::test]
    async fn two_rounds_tool_then_phrasing() {
        let (registry, cfg) = setup().await;
        let provider = TwoStepProvider::new(
            "get_balance",
            json!({"account_id": 1}),
            "Hesabınızda 15.423,50 TL var.",
        );

        let reply = run(&provider, &registry, Intent::Unknown, &ctx(1, "param ne kadar"), &cfg).await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(reply.text, "Hesabınızda 15.423,50 TL var.");
        // UI payload comes from the tool, not the model.
        assert_eq!(reply.structured_ui.unwrap()["type"], "balance_card");
    }

    #[tokio::test]
    async fn model_supplied_identity_is_overridden() {
        let (registry, cfg) = setup().await;
        // The model claims to be customer 999; the injector must pin
        // the context identity, so customer 2's single account answers.
        let provider = TwoStepProvider::new(
            "get_accounts",
            json!({"customer_id": 999}),
            "",
        );

        let reply = run(&provider, &registry, Intent::Unknown, &ctx(2, "hesabım"), &cfg).await;

        // Round two returned empty text, so the normalized reply stands.
        assert!(reply.text.contains("bakiye"));
        assert_eq!(reply.structured_ui.unwrap()["variant"], "single_account");
    }

    #[tokio::test]
    async fn text_only_answer_skips_round_two() {
        let (registry, cfg) = setup().await;
        let provider = llm::provider::MockProvider::new("Size nasıl yardımcı olabilirim?");

        let reply = run(&provider, &registry, Intent::Unknown, &ctx(1, "merhaba"), &cfg).await;

        assert_eq!(reply.text, "Size nasıl yardımcı olabilirim?");
        assert!(reply.structured_ui.is_none());
    }

    #[tokio::test]
    async fn unknown_tool_name_surfaces_not_found() {
        let (registry, cfg) = setup().await;
        let provider = TwoStepProvider::new("open_vault", json!({}), "");

        let reply = run(&provider, &registry, Intent::Unknown, &ctx(1, "kasayı aç"), &cfg).await;

        assert!(reply.text.contains("Araç bulunamadı"));
    }

    #[tokio::test]
    async fn misrouted_listing_hits_transactions_safety_net() {
        let (registry, cfg) = setup().await;
        // Model answers a history question with the account list tool.
        let provider = TwoStepProvider::new("get_accounts", json!({}), "");

        let reply = run(
            &provider,
            &registry,
            Intent::Transactions,
            &ctx(1, "işlemlerimi göster"),
            &cfg,
        )
        .await;

        assert_eq!(reply.text, ASK_ACCOUNT);
    }

    #[tokio::test]
    async fn tool_hungry_provider_is_cut_off_after_two_rounds() {
        struct AlwaysToolProvider {
            calls: Arc<AtomicUsize>,
        }
        impl LlmProvider for AlwaysToolProvider {
            fn name(&self) -> &str {
                "always-tool"
            }
            fn complete(
                &self,
                _request: CompletionRequest,
            ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>>
            {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Box::pin(async {
                    Ok(CompletionResponse {
                        content: String::new(),
                        content_blocks: vec![ContentBlock::ToolUse {
                            id: "call_n".into(),
                            name: "get_accounts".into(),
                            input: json!({}),
                        }],
                        stop_reason: StopReason::ToolUse,
                        input_tokens: 1,
                        output_tokens: 1,
                    })
                })
            }
        }

        let (registry, cfg) = setup().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = AlwaysToolProvider { calls: calls.clone() };

        let reply = run(&provider, &registry, Intent::Unknown, &ctx(2, "hesabım"), &cfg).await;

        // One catalog round, one executed call, one phrasing round.
        // The round-two tool request is ignored, not executed.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(reply.structured_ui.unwrap()["variant"], "single_account");
    }

    #[tokio::test]
    async fn provider_failure_reads_as_retry() {
        struct FailingProvider;
        impl LlmProvider for FailingProvider {
            fn name(&self) -> &str {
                "failing"
            }
            fn complete(
                &self,
                _request: CompletionRequest,
            ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>>
            {
                Box::pin(async { Err(LlmError::Unavailable("down".into())) })
            }
        }

        let (registry, cfg) = setup().await;
        let reply = run(&FailingProvider, &registry, Intent::Unknown, &ctx(1, "selam"), &cfg).await;
        assert_eq!(reply.text, crate::normalize::RETRY);
    }
}
