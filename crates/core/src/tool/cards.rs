//! Card listing and card detail tools.

use super::{fmt_amount, reject_unknown, require_i64, Args, BankingTool, ToolError};
use crate::repo::{BankRepo, Card};
use crate::types::{Candidate, DisambiguationSet, EntityKind, ToolOutput};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

fn card_json(c: &Card) -> serde_json::Value {
    json!({
        "card_id": c.card_id,
        "card_type": c.card_type,
        "limit": c.credit_limit,
        "limit_formatted": fmt_amount(c.credit_limit),
        "borc": c.current_debt,
        "borc_formatted": fmt_amount(c.current_debt),
        "kullanilabilir_limit": c.credit_limit - c.current_debt,
        "kesim_tarihi": format!("Her ayın {}. günü", c.statement_day),
        "son_odeme_tarihi": format!("Her ayın {}. günü", c.due_day),
        "status": c.status,
    })
}

fn card_info_card(cards: &[Card], variant: &str) -> serde_json::Value {
    json!({
        "type": "card_info_card",
        "variant": variant,
        "cards": cards.iter().map(card_json).collect::<Vec<_>>(),
    })
}

pub struct ListCustomerCards {
    repo: Arc<dyn BankRepo>,
}

impl ListCustomerCards {
    pub fn new(repo: Arc<dyn BankRepo>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl BankingTool for ListCustomerCards {
    fn name(&self) -> &str {
        "list_customer_cards"
    }

    fn description(&self) -> &str {
        "Müşterinin kartlarını listeler. Tek kart varsa özet bilgisini döner, \
         birden fazla kart varsa seçim listesi döner."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "customer_id": {"type": "integer", "description": "Müşteri numarası"}
            },
            "required": ["customer_id"]
        })
    }

    async fn call(&self, args: Args) -> Result<ToolOutput, ToolError> {
        reject_unknown(&args, &["customer_id"])?;
        let customer_id = require_i64(&args, "customer_id")?;
        let cards = self
            .repo
            .cards_for_customer(customer_id)
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        match cards.len() {
            0 => Err(ToolError::NotFound(format!(
                "Müşteri bulunamadı veya kart yok: {customer_id}"
            ))),
            1 => {
                let mut body = card_json(&cards[0]);
                body["ui_component"] = card_info_card(&cards, "single_card");
                Ok(ToolOutput::Data(body))
            }
            _ => Ok(ToolOutput::Disambiguation(DisambiguationSet {
                kind: EntityKind::Card,
                candidates: cards
                    .iter()
                    .map(|c| Candidate {
                        id: c.card_id,
                        label: c.card_type.clone(),
                        preview: format!("borç {}", fmt_amount(c.current_debt)),
                    })
                    .collect(),
                ui: Some(card_info_card(&cards, "multiple_cards")),
            })),
        }
    }
}

pub struct GetCardInfo {
    repo: Arc<dyn BankRepo>,
}

impl GetCardInfo {
    pub fn new(repo: Arc<dyn BankRepo>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl BankingTool for GetCardInfo {
    fn name(&self) -> &str {
        "get_card_info"
    }

    fn description(&self) -> &str {
        "Belirli bir kredi kartının limit, borç ve ödeme tarihlerini döner."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "card_id": {"type": "integer", "description": "Kart numarası"},
                "customer_id": {"type": "integer", "description": "Müşteri numarası"}
            },
            "required": ["card_id", "customer_id"]
        })
    }

    async fn call(&self, args: Args) -> Result<ToolOutput, ToolError> {
        reject_unknown(&args, &["card_id", "customer_id"])?;
        let card_id = require_i64(&args, "card_id")?;
        let customer_id = require_i64(&args, "customer_id")?;

        let card = self
            .repo
            .card_details(card_id, customer_id)
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        match card {
            Some(c) => {
                let cards = [c];
                let mut body = card_json(&cards[0]);
                body["ui_component"] = card_info_card(&cards, "single_card");
                body["text"] = json!(format!(
                    "Kartınızın güncel borcu {} TL, kullanılabilir limiti {} TL.",
                    fmt_amount(cards[0].current_debt),
                    fmt_amount(cards[0].credit_limit - cards[0].current_debt)
                ));
                Ok(ToolOutput::Data(body))
            }
            None => Err(ToolError::NotFound(format!(
                "Kart bulunamadı veya bu müşteriye ait değil: {card_id}"
            ))),
        }
    }
}
