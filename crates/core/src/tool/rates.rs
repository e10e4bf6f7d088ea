//! Rate and fee lookup tools. None of these take an account, and the
//! fee/rate tools take no identity parameter at all.

use super::{opt_str, reject_unknown, Args, BankingTool, ToolError};
use crate::repo::BankRepo;
use crate::types::ToolOutput;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub struct FxRates {
    repo: Arc<dyn BankRepo>,
}

impl FxRates {
    pub fn new(repo: Arc<dyn BankRepo>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl BankingTool for FxRates {
    fn name(&self) -> &str {
        "fx_rates"
    }

    fn description(&self) -> &str {
        "Güncel döviz alış/satış kurlarını listeler."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({"type": "object", "properties": {}})
    }

    async fn call(&self, args: Args) -> Result<ToolOutput, ToolError> {
        reject_unknown(&args, &[])?;
        let rates = self
            .repo
            .fx_rates()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;
        Ok(ToolOutput::Data(json!({
            "rates": rates,
            "text": "Güncel döviz kurları aşağıdadır.",
            "ui_component": {"type": "exchange_rates_card", "rates": rates},
        })))
    }
}

pub struct InterestRates {
    repo: Arc<dyn BankRepo>,
}

impl InterestRates {
    pub fn new(repo: Arc<dyn BankRepo>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl BankingTool for InterestRates {
    fn name(&self) -> &str {
        "interest_rates"
    }

    fn description(&self) -> &str {
        "Mevduat ve kredi ürünlerinin güncel faiz oranlarını listeler."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({"type": "object", "properties": {}})
    }

    async fn call(&self, args: Args) -> Result<ToolOutput, ToolError> {
        reject_unknown(&args, &[])?;
        let rates = self
            .repo
            .interest_rates()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;
        Ok(ToolOutput::Data(json!({
            "rates": rates,
            "text": "Güncel faiz oranları aşağıdadır.",
            "ui_component": {"type": "interest_rates_card", "rates": rates},
        })))
    }
}

pub struct GetFee {
    repo: Arc<dyn BankRepo>,
}

impl GetFee {
    pub fn new(repo: Arc<dyn BankRepo>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl BankingTool for GetFee {
    fn name(&self) -> &str {
        "get_fee"
    }

    fn description(&self) -> &str {
        "Bir bankacılık hizmetinin ücret tarifesini döner. Hizmet kodu \
         büyük/küçük harf duyarsızdır (örn. eft, havale, fast, swift)."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "service_code": {"type": "string", "description": "Hizmet kodu, örn. eft"}
            },
            "required": ["service_code"]
        })
    }

    async fn call(&self, args: Args) -> Result<ToolOutput, ToolError> {
        reject_unknown(&args, &["service_code"])?;
        let code = opt_str(&args, "service_code")
            .ok_or_else(|| ToolError::InvalidInput("eksik parametre: service_code".into()))?;

        let fee = self
            .repo
            .get_fee(&code)
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        match fee {
            Some(f) => {
                let pricing: serde_json::Value =
                    serde_json::from_str(&f.pricing_json).unwrap_or(json!({}));
                Ok(ToolOutput::Data(json!({
                    "service_code": f.service_code,
                    "description": f.description,
                    "pricing": pricing,
                    "updated_at": f.updated_at,
                    "text": format!("{}: tarife detayı aşağıdadır.", f.description),
                    "ui_component": {"type": "fees_card", "fees": [f]},
                })))
            }
            None => {
                let known = self
                    .repo
                    .list_fees()
                    .await
                    .map_err(|e| ToolError::Transport(e.to_string()))?;
                let codes: Vec<String> =
                    known.into_iter().map(|f| f.service_code).collect();
                Err(ToolError::NotFound(format!(
                    "Ücret bulunamadı: {code}. Desteklenen kodlar: {}",
                    codes.join(", ")
                )))
            }
        }
    }
}

pub struct ListFees {
    repo: Arc<dyn BankRepo>,
}

impl ListFees {
    pub fn new(repo: Arc<dyn BankRepo>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl BankingTool for ListFees {
    fn name(&self) -> &str {
        "list_fees"
    }

    fn description(&self) -> &str {
        "Tüm bankacılık hizmet ücretlerini listeler."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({"type": "object", "properties": {}})
    }

    async fn call(&self, args: Args) -> Result<ToolOutput, ToolError> {
        reject_unknown(&args, &[])?;
        let fees = self
            .repo
            .list_fees()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;
        Ok(ToolOutput::Data(json!({
            "fees": fees,
            "text": "Hizmet ücretleri aşağıdadır.",
            "ui_component": {"type": "fees_card", "fees": fees},
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::sqlite::SqliteRepo;

    async fn seeded() -> Arc<dyn BankRepo> {
        let repo = SqliteRepo::connect_memory().await.unwrap();
        repo.seed_demo().await.unwrap();
        Arc::new(repo)
    }

    #[tokio::test]
    async fn fee_lookup_lists_known_codes_on_miss() {
        let tool = GetFee::new(seeded().await);
        let mut args = Args::new();
        args.insert("service_code".into(), serde_json::json!("yok"));
        let err = tool.call(args).await.unwrap_err();
        match err {
            ToolError::NotFound(msg) => {
                assert!(msg.contains("eft"));
                assert!(msg.contains("swift"));
            }
            other => panic!("expected not-found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fx_rates_have_ui_payload() {
        let tool = FxRates::new(seeded().await);
        let out = tool.call(Args::new()).await.unwrap();
        match out {
            ToolOutput::Data(v) => {
                assert_eq!(v["ui_component"]["type"], "exchange_rates_card");
                assert!(v["rates"].as_array().unwrap().len() >= 3);
            }
            other => panic!("expected data, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn identity_alias_rejected_on_identity_free_tool() {
        let tool = FxRates::new(seeded().await);
        let mut args = Args::new();
        args.insert("customer_id".into(), serde_json::json!(1));
        let err = tool.call(args).await.unwrap_err();
        assert!(matches!(err, ToolError::SchemaMismatch(_)));
    }
}
