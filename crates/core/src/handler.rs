//! Chat turn handler: parse, plan, fall back, normalize, one reply.

use crate::config::FortunaCfg;
use crate::fallback;
use crate::normalize::normalize;
use crate::parse::parse;
use crate::plan;
use crate::redact::mask;
use crate::tool::ToolRegistry;
use crate::types::{CallerContext, Intent, NormalizedReply, PlanOutcome, ToolReply};
use llm::provider::LlmProvider;
use std::sync::Arc;
use tracing::{debug, info};

const NO_MODEL: &str =
    "Bu isteği şu anda anlayamadım. Örn: 'hesap 1 bakiye' veya 'hesap 1 son işlemler' deneyin.";

pub struct ChatHandler {
    registry: Arc<ToolRegistry>,
    provider: Option<Arc<dyn LlmProvider>>,
    cfg: FortunaCfg,
}

impl ChatHandler {
    pub fn new(
        registry: Arc<ToolRegistry>,
        provider: Option<Arc<dyn LlmProvider>>,
        cfg: FortunaCfg,
    ) -> Self {
        Self { registry, provider, cfg }
    }

    /// Handle one user turn end to end.
    pub async fn handle(
        &self,
        user_text: &str,
        customer_id: i64,
        session_id: &str,
    ) -> NormalizedReply {
        let ctx = CallerContext::new(customer_id, session_id, user_text);
        info!(
            event = "chat_request",
            customer_id,
            session = %session_id,
            message = %mask(user_text),
        );

        let (intent, slots) = parse(user_text);
        debug!(?intent, "parsed utterance");

        let reply = if intent == Intent::Unknown {
            self.run_fallback(intent, &ctx).await
        } else {
            match plan::execute(intent, &slots, &ctx, &self.registry, &self.cfg).await {
                PlanOutcome::Resolved(tool_reply) => normalize(intent, &tool_reply, &self.cfg),
                PlanOutcome::NeedsDisambiguation { set, .. } => {
                    normalize(intent, &ToolReply::Disambiguation(set), &self.cfg)
                }
                PlanOutcome::Fallback(reason) => {
                    debug!(%reason, "planned flow deferred to model");
                    self.run_fallback(intent, &ctx).await
                }
            }
        };

        info!(
            event = "chat_response",
            session = %session_id,
            response = %mask(&reply.text),
            has_ui = reply.structured_ui.is_some(),
        );
        reply
    }

    async fn run_fallback(&self, intent: Intent, ctx: &CallerContext) -> NormalizedReply {
        match &self.provider {
            Some(provider) => {
                fallback::run(provider.as_ref(), &self.registry, intent, ctx, &self.cfg).await
            }
            None => NormalizedReply::text_only(NO_MODEL),
        }
    }
}
