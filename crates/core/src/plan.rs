//! Planned deterministic flows. One recognized intent maps to one
//! short tool sequence; anything the sequence cannot resolve is handed
//! to the model loop as a fallback.

use crate::config::FortunaCfg;
use crate::inject::invoke_with_identity;
use crate::normalize::{self, disambiguation_text};
use crate::tool::{Args, ToolRegistry};
use crate::types::{CallerContext, Intent, PlanOutcome, Slots, ToolReply};
use serde_json::json;
use tracing::debug;

fn args_from(pairs: Vec<(&str, serde_json::Value)>) -> Args {
    pairs.into_iter().map(|(k, v)| (k.to_owned(), v)).collect()
}

/// Resolve a planned reply carrying only a clarification text.
fn clarify(text: &str) -> PlanOutcome {
    PlanOutcome::Resolved(ToolReply::Data(json!({ "text": text })))
}

struct Flow<'a> {
    registry: &'a ToolRegistry,
    cfg: &'a FortunaCfg,
    ctx: &'a CallerContext,
}

impl Flow<'_> {
    async fn call(&self, candidates: &[&str], args: Args) -> Result<ToolReply, PlanOutcome> {
        let Some(tool) = self.registry.find(candidates) else {
            return Err(PlanOutcome::Fallback(format!(
                "no tool for {}",
                candidates.join("/")
            )));
        };
        Ok(invoke_with_identity(tool, args, self.ctx, self.cfg.tool_timeout_ms).await)
    }

    async fn balance(&self, slots: &Slots) -> PlanOutcome {
        if let Some(account_id) = slots.account_id {
            return match self
                .call(&["get_balance"], args_from(vec![("account_id", json!(account_id))]))
                .await
            {
                Ok(reply) => PlanOutcome::Resolved(reply),
                Err(fb) => fb,
            };
        }
        // No account named: list first, auto-pick only a sole account.
        let listed = match self.call(&["get_accounts"], Args::new()).await {
            Ok(reply) => reply,
            Err(fb) => return fb,
        };
        match listed {
            ToolReply::Disambiguation(set) => {
                let prompt = disambiguation_text(&set, self.cfg.disambiguation_examples);
                PlanOutcome::NeedsDisambiguation { set, prompt }
            }
            ToolReply::Data(v) => {
                // Single account came back with its balance inline.
                if v.get("balance").is_some() {
                    PlanOutcome::Resolved(ToolReply::Data(v))
                } else if let Some(id) = v.get("account_id").and_then(|x| x.as_i64()) {
                    match self
                        .call(&["get_balance"], args_from(vec![("account_id", json!(id))]))
                        .await
                    {
                        Ok(reply) => PlanOutcome::Resolved(reply),
                        Err(fb) => fb,
                    }
                } else {
                    PlanOutcome::Fallback("unexpected accounts shape".into())
                }
            }
            err @ ToolReply::Error(_) => PlanOutcome::Resolved(err),
        }
    }

    async fn accounts_list(&self) -> PlanOutcome {
        match self.call(&["get_accounts"], Args::new()).await {
            Ok(ToolReply::Disambiguation(set)) => {
                let prompt = disambiguation_text(&set, self.cfg.disambiguation_examples);
                PlanOutcome::NeedsDisambiguation { set, prompt }
            }
            Ok(reply) => PlanOutcome::Resolved(reply),
            Err(fb) => fb,
        }
    }

    async fn card_info(&self, slots: &Slots) -> PlanOutcome {
        if let Some(card_id) = slots.card_id {
            return match self
                .call(&["get_card_info"], args_from(vec![("card_id", json!(card_id))]))
                .await
            {
                Ok(reply) => PlanOutcome::Resolved(reply),
                Err(fb) => fb,
            };
        }
        let listed = match self.call(&["list_customer_cards"], Args::new()).await {
            Ok(reply) => reply,
            Err(fb) => return fb,
        };
        match listed {
            ToolReply::Disambiguation(set) => {
                let prompt = disambiguation_text(&set, self.cfg.disambiguation_examples);
                PlanOutcome::NeedsDisambiguation { set, prompt }
            }
            ToolReply::Data(v) => {
                if let Some(id) = v.get("card_id").and_then(|x| x.as_i64()) {
                    match self
                        .call(&["get_card_info"], args_from(vec![("card_id", json!(id))]))
                        .await
                    {
                        Ok(reply) => PlanOutcome::Resolved(reply),
                        Err(fb) => fb,
                    }
                } else {
                    PlanOutcome::Fallback("unexpected cards shape".into())
                }
            }
            err @ ToolReply::Error(_) => PlanOutcome::Resolved(err),
        }
    }

    async fn transactions(&self, slots: &Slots) -> PlanOutcome {
        if slots.invalid_date {
            return clarify(normalize::INVALID_DATE);
        }
        // A history request without an account never reaches the tool.
        let Some(account_id) = slots.account_id else {
            return clarify(normalize::ASK_ACCOUNT);
        };
        let mut pairs = vec![("account_id", json!(account_id))];
        if let Some(range) = &slots.date_range {
            pairs.push(("from_date", json!(range.from.format("%Y-%m-%d").to_string())));
            pairs.push(("to_date", json!(range.to.format("%Y-%m-%d").to_string())));
        }
        let limit = slots
            .limit
            .unwrap_or(self.cfg.transactions_default_limit)
            .min(self.cfg.transactions_max_limit);
        pairs.push(("limit", json!(limit)));
        match self.call(&["transactions_list"], args_from(pairs)).await {
            Ok(reply) => PlanOutcome::Resolved(reply),
            Err(fb) => fb,
        }
    }

    async fn fees(&self, slots: &Slots) -> PlanOutcome {
        let result = match &slots.service_code {
            Some(code) => {
                self.call(&["get_fee"], args_from(vec![("service_code", json!(code))]))
                    .await
            }
            None => self.call(&["list_fees"], Args::new()).await,
        };
        match result {
            Ok(reply) => PlanOutcome::Resolved(reply),
            Err(fb) => fb,
        }
    }

    async fn branch_atm(&self, slots: &Slots) -> PlanOutcome {
        // Without a city there is nothing to search deterministically;
        // let the model ask for one.
        let Some(city) = &slots.city else {
            return PlanOutcome::Fallback("branch/atm search without city".into());
        };
        let mut pairs = vec![
            ("city", json!(city)),
            ("limit", json!(self.cfg.branch_results_limit)),
        ];
        if let Some(district) = &slots.district {
            pairs.push(("district", json!(district)));
        }
        if let Some(kind) = &slots.place_kind {
            pairs.push(("type", json!(kind)));
        }
        if slots.nearby {
            pairs.push(("nearby", json!(true)));
        }
        match self.call(&["branch_atm_search"], args_from(pairs)).await {
            Ok(reply) => PlanOutcome::Resolved(reply),
            Err(fb) => fb,
        }
    }

    async fn calculator(&self, slots: &Slots) -> PlanOutcome {
        let (Some(amount), Some(rate), Some(term)) =
            (slots.amount, slots.annual_rate, slots.term_months)
        else {
            return PlanOutcome::Fallback("calculator parameters incomplete".into());
        };
        let tool = if slots.deposit { "deposit_interest" } else { "loan_amortization" };
        let mut pairs = vec![
            ("principal", json!(amount)),
            ("annual_rate", json!(rate)),
            ("term_months", json!(term)),
        ];
        if let Some(currency) = &slots.currency {
            pairs.push(("currency", json!(currency)));
        }
        match self.call(&[tool], args_from(pairs)).await {
            Ok(reply) => PlanOutcome::Resolved(reply),
            Err(fb) => fb,
        }
    }
}

/// Run the planned flow for a recognized intent.
pub async fn execute(
    intent: Intent,
    slots: &Slots,
    ctx: &CallerContext,
    registry: &ToolRegistry,
    cfg: &FortunaCfg,
) -> PlanOutcome {
    debug!(?intent, "planned flow start");
    let flow = Flow { registry, cfg, ctx };
    match intent {
        Intent::Balance => flow.balance(slots).await,
        Intent::AccountsList => flow.accounts_list().await,
        Intent::CardInfo => flow.card_info(slots).await,
        Intent::Transactions => flow.transactions(slots).await,
        Intent::Fees => flow.fees(slots).await,
        Intent::FxRates => {
            match flow.call(&["fx_rates"], Args::new()).await {
                Ok(reply) => PlanOutcome::Resolved(reply),
                Err(fb) => fb,
            }
        }
        Intent::InterestRates => {
            match flow.call(&["interest_rates"], Args::new()).await {
                Ok(reply) => PlanOutcome::Resolved(reply),
                Err(fb) => fb,
            }
        }
        Intent::BranchAtmSearch => flow.branch_atm(slots).await,
        Intent::LoanOrDepositCalc => flow.calculator(slots).await,
        Intent::Unknown => PlanOutcome::Fallback("unrecognized intent".into()),
    }
}
