//! End-to-end chat turns against a seeded in-memory bank.

use async_trait::async_trait;
use fortuna::config::FortunaCfg;
use fortuna::handler::ChatHandler;
use fortuna::normalize::{ASK_ACCOUNT, NO_ACCESS, RETRY};
use fortuna::repo::sqlite::SqliteRepo;
use fortuna::tool::{banking_registry, Args, BankingTool, ToolError, ToolRegistry};
use fortuna::types::ToolOutput;
use llm::provider::{
    CompletionRequest, CompletionResponse, ContentBlock, LlmError, LlmProvider, StopReason,
};
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

async fn seeded_handler(provider: Option<Arc<dyn LlmProvider>>) -> ChatHandler {
    let cfg = FortunaCfg::default();
    let repo = SqliteRepo::connect_memory().await.unwrap();
    repo.seed_demo().await.unwrap();
    ChatHandler::new(Arc::new(banking_registry(Arc::new(repo), &cfg)), provider, cfg)
}

#[tokio::test]
async fn balance_for_named_account() {
    let handler = seeded_handler(None).await;
    let reply = handler.handle("hesap 1 bakiye", 1, "s-1").await;
    assert!(reply.text.contains("15.423,50"));
    let ui = reply.structured_ui.unwrap();
    assert_eq!(ui["type"], "balance_card");
    assert_eq!(ui["variant"], "single_account");
}

#[tokio::test]
async fn balance_with_three_accounts_asks_which() {
    let handler = seeded_handler(None).await;
    let reply = handler.handle("bakiyem ne kadar", 1, "s-1").await;
    assert_eq!(
        reply.text,
        "3 hesabınız var. Hangi hesabı kullanayım? Örn: 1, 2, 3"
    );
    assert_eq!(reply.structured_ui.unwrap()["variant"], "multiple_accounts");
}

#[tokio::test]
async fn single_account_customer_resolves_directly() {
    let handler = seeded_handler(None).await;
    let reply = handler.handle("bakiyem ne kadar", 2, "s-1").await;
    assert!(reply.text.contains("999,99"));
}

#[tokio::test]
async fn transactions_without_account_ask_for_one() {
    let handler = seeded_handler(None).await;
    let reply = handler.handle("son işlemlerimi göster", 1, "s-1").await;
    assert_eq!(reply.text, ASK_ACCOUNT);
    assert!(reply.structured_ui.is_none());
}

#[tokio::test]
async fn transactions_with_marker_and_range() {
    let handler = seeded_handler(None).await;
    let reply = handler.handle("hesap 1 son 30 gün işlemleri", 1, "s-1").await;
    assert!(reply.text.contains("işlem listelendi"));
}

#[tokio::test]
async fn foreign_account_history_is_denied() {
    let handler = seeded_handler(None).await;
    // Account 4 belongs to customer 2.
    let reply = handler.handle("hesap 4 işlemleri", 1, "s-1").await;
    assert_eq!(reply.text, NO_ACCESS);
}

#[tokio::test]
async fn foreign_account_balance_reads_as_missing() {
    let handler = seeded_handler(None).await;
    let reply = handler.handle("hesap 4 bakiye", 1, "s-1").await;
    assert!(reply.text.contains("bulunamadı"));
    assert!(!reply.text.to_lowercase().contains("erişim"));
}

#[tokio::test]
async fn fee_lookup_by_code() {
    let handler = seeded_handler(None).await;
    let reply = handler.handle("EFT ücreti ne kadar", 1, "s-1").await;
    assert!(reply.text.contains("EFT"));
    assert_eq!(reply.structured_ui.unwrap()["type"], "fees_card");
}

#[tokio::test]
async fn fx_rates_flow() {
    let handler = seeded_handler(None).await;
    let reply = handler.handle("dolar kuru kaç", 1, "s-1").await;
    assert_eq!(reply.structured_ui.unwrap()["type"], "exchange_rates_card");
}

#[tokio::test]
async fn branch_search_flow() {
    let handler = seeded_handler(None).await;
    let reply = handler.handle("İstanbul Kadıköy ATM", 1, "s-1").await;
    assert!(reply.text.contains("sonuç"));
    assert_eq!(reply.structured_ui.unwrap()["type"], "atm_card");
}

#[tokio::test]
async fn loan_calculation_flow() {
    let handler = seeded_handler(None).await;
    let reply = handler
        .handle("100.000 TL kredi 24 ay taksit %48 faizle", 1, "s-1")
        .await;
    assert!(reply.text.contains("taksiti"));
    assert_eq!(
        reply.structured_ui.unwrap()["type"],
        "amortization_table_card"
    );
}

#[tokio::test]
async fn card_debt_flow() {
    let handler = seeded_handler(None).await;
    let reply = handler.handle("kart borcum ne kadar", 1, "s-1").await;
    assert!(reply.text.contains("4.521,75"));
    assert_eq!(reply.structured_ui.unwrap()["type"], "card_info_card");
}

#[tokio::test]
async fn unknown_without_model_gives_usage_hint() {
    let handler = seeded_handler(None).await;
    let reply = handler.handle("bana bir fıkra anlat", 1, "s-1").await;
    assert!(reply.text.contains("hesap 1 bakiye"));
}

/// Provider that always calls one scripted tool, then stays silent.
struct ScriptedProvider {
    rounds: AtomicUsize,
    tool_name: String,
    tool_input: serde_json::Value,
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>> {
        let round = self.rounds.fetch_add(1, Ordering::SeqCst);
        let resp = if round == 0 {
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
            CompletionResponse {
                content: String::new(),
                content_blocks: vec![],
                stop_reason: StopReason::EndTurn,
                input_tokens: 1,
                output_tokens: 1,
            }
        };
        Box::pin(async move { Ok(resp) })
    }
}

#[tokio::test]
async fn model_cannot_impersonate_another_customer() {
    // The model asks for customer 1's accounts, but the session belongs
    // to customer 2: the injector pins identity to the context.
    let provider = Arc::new(ScriptedProvider {
        rounds: AtomicUsize::new(0),
        tool_name: "get_accounts".into(),
        tool_input: json!({"customer_id": 1}),
    });
    let handler = seeded_handler(Some(provider)).await;

    let reply = handler.handle("hmm her şeyi göster bakalım", 2, "s-1").await;

    // Customer 2 has exactly one account; three would mean the
    // impersonation worked.
    let ui = reply.structured_ui.unwrap();
    assert_eq!(ui["variant"], "single_account");
    assert_eq!(ui["accounts"][0]["account_id"], 4);
}

/// get_balance that never completes, for the timeout bound.
struct StuckBalance;

#[async_trait]
impl BankingTool for StuckBalance {
    fn name(&self) -> &str {
        "get_balance"
    }
    fn description(&self) -> &str {
        "stuck"
    }
    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "account_id": {"type": "integer"},
                "customer_id": {"type": "integer"}
            }
        })
    }
    async fn call(&self, _args: Args) -> Result<ToolOutput, ToolError> {
        std::future::pending::<()>().await;
        unreachable!()
    }
}

#[tokio::test(start_paused = true)]
async fn stuck_tool_resolves_as_retry_within_timeout() {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(StuckBalance));
    let handler = ChatHandler::new(Arc::new(registry), None, FortunaCfg::default());

    let started = tokio::time::Instant::now();
    let reply = handler.handle("hesap 1 bakiye", 1, "s-1").await;
    let elapsed = started.elapsed();

    assert_eq!(reply.text, RETRY);
    // One attempt, one timeout window; paused time makes this exact.
    assert!(elapsed >= std::time::Duration::from_millis(4_000));
    assert!(elapsed < std::time::Duration::from_millis(4_100));
}
