//! Account listing and balance tools.

use super::{fmt_amount, reject_unknown, require_i64, Args, BankingTool, ToolError};
use crate::repo::{Account, BankRepo};
use crate::types::{Candidate, DisambiguationSet, EntityKind, ToolOutput};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

fn account_json(a: &Account) -> serde_json::Value {
    json!({
        "account_id": a.account_id,
        "account_type": a.account_type,
        "balance": a.balance,
        "balance_formatted": format!("{} {}", fmt_amount(a.balance), a.currency),
        "currency": a.currency,
        "iban_tail": a.iban_tail(),
        "status": a.status,
    })
}

fn balance_card(accounts: &[Account], variant: &str) -> serde_json::Value {
    json!({
        "type": "balance_card",
        "variant": variant,
        "accounts": accounts.iter().map(account_json).collect::<Vec<_>>(),
    })
}

pub struct GetAccounts {
    repo: Arc<dyn BankRepo>,
}

impl GetAccounts {
    pub fn new(repo: Arc<dyn BankRepo>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl BankingTool for GetAccounts {
    fn name(&self) -> &str {
        "get_accounts"
    }

    fn description(&self) -> &str {
        "Müşterinin hesaplarını listeler. Tek hesap varsa bakiyesiyle birlikte döner, \
         birden fazla hesap varsa seçim listesi döner."
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
        let accounts = self
            .repo
            .accounts_by_customer(customer_id)
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        match accounts.len() {
            0 => Err(ToolError::NotFound(format!(
                "Müşteri bulunamadı veya hesap yok: {customer_id}"
            ))),
            1 => {
                let a = &accounts[0];
                let mut body = account_json(a);
                body["ui_component"] = balance_card(&accounts, "single_account");
                body["text"] = json!(format!(
                    "{} hesabınızın bakiyesi: {} {}",
                    a.account_type,
                    fmt_amount(a.balance),
                    a.currency
                ));
                Ok(ToolOutput::Data(body))
            }
            _ => Ok(ToolOutput::Disambiguation(DisambiguationSet {
                kind: EntityKind::Account,
                candidates: accounts
                    .iter()
                    .map(|a| Candidate {
                        id: a.account_id,
                        label: format!("**{}", a.iban_tail()),
                        preview: format!("{} {}", fmt_amount(a.balance), a.currency),
                    })
                    .collect(),
                ui: Some(balance_card(&accounts, "multiple_accounts")),
            })),
        }
    }
}

pub struct GetBalance {
    repo: Arc<dyn BankRepo>,
}

impl GetBalance {
    pub fn new(repo: Arc<dyn BankRepo>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl BankingTool for GetBalance {
    fn name(&self) -> &str {
        "get_balance"
    }

    fn description(&self) -> &str {
        "Belirli bir hesabın güncel bakiyesini döner."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "account_id": {"type": "integer", "description": "Hesap numarası"},
                "customer_id": {"type": "integer", "description": "Müşteri numarası"}
            },
            "required": ["account_id", "customer_id"]
        })
    }

    async fn call(&self, args: Args) -> Result<ToolOutput, ToolError> {
        reject_unknown(&args, &["account_id", "customer_id"])?;
        let account_id = require_i64(&args, "account_id")?;
        let customer_id = require_i64(&args, "customer_id")?;

        let account = self
            .repo
            .get_account(account_id)
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        match account {
            // A foreign account reads as missing, never as "exists but
            // belongs to someone else".
            Some(a) if a.customer_id == customer_id => {
                let accounts = [a];
                let mut body = account_json(&accounts[0]);
                body["ui_component"] = balance_card(&accounts, "single_account");
                body["text"] = json!(format!(
                    "Hesap {} bakiyesi: {} {}",
                    accounts[0].account_id,
                    fmt_amount(accounts[0].balance),
                    accounts[0].currency
                ));
                Ok(ToolOutput::Data(body))
            }
            Some(_) | None => Err(ToolError::NotFound(format!(
                "Hesap bulunamadı: {account_id}"
            ))),
        }
    }
}
