//! Transaction listing tool.

use super::{opt_i64, opt_str, reject_unknown, require_i64, Args, BankingTool, ToolError};
use crate::repo::BankRepo;
use crate::types::ToolOutput;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

pub struct TransactionsList {
    repo: Arc<dyn BankRepo>,
    default_limit: i64,
    max_limit: i64,
}

impl TransactionsList {
    pub fn new(repo: Arc<dyn BankRepo>, default_limit: i64, max_limit: i64) -> Self {
        Self { repo, default_limit, max_limit }
    }
}

fn clamp_limit(requested: Option<i64>, default: i64, max: i64) -> i64 {
    match requested {
        Some(n) if n > max => max,
        Some(n) if n > 0 => n,
        _ => default,
    }
}

/// Dates arrive as ISO strings; anything shorter is dropped rather
/// than guessed at.
fn valid_date(s: Option<String>) -> Option<String> {
    s.filter(|d| d.len() >= 10)
}

#[async_trait]
impl BankingTool for TransactionsList {
    fn name(&self) -> &str {
        "transactions_list"
    }

    fn description(&self) -> &str {
        "Bir hesabın işlem geçmişini listeler. Tarih aralığı ve adet sınırı \
         verilebilir; tarihler YYYY-MM-DD biçimindedir."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "account_id": {"type": "integer", "description": "Hesap numarası"},
                "customer_id": {"type": "integer", "description": "Müşteri numarası"},
                "from_date": {"type": "string", "description": "Başlangıç tarihi (YYYY-MM-DD)"},
                "to_date": {"type": "string", "description": "Bitiş tarihi (YYYY-MM-DD)"},
                "limit": {"type": "integer", "description": format!(
                    "En fazla kayıt sayısı (varsayılan {}, üst sınır {})",
                    self.default_limit, self.max_limit
                )}
            },
            "required": ["account_id", "customer_id"]
        })
    }

    async fn call(&self, args: Args) -> Result<ToolOutput, ToolError> {
        reject_unknown(
            &args,
            &["account_id", "customer_id", "from_date", "to_date", "limit"],
        )?;
        let account_id = require_i64(&args, "account_id")?;
        let customer_id = require_i64(&args, "customer_id")?;
        let from_date = valid_date(opt_str(&args, "from_date"));
        let to_date = valid_date(opt_str(&args, "to_date"));
        let limit = clamp_limit(opt_i64(&args, "limit")?, self.default_limit, self.max_limit);

        let account = self
            .repo
            .get_account(account_id)
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;
        match account {
            None => {
                return Err(ToolError::NotFound(format!(
                    "Hesap bulunamadı: {account_id}"
                )))
            }
            Some(a) if a.customer_id != customer_id => {
                return Err(ToolError::Forbidden(format!(
                    "Hesap erişimi reddedildi: {account_id}"
                )))
            }
            Some(_) => {}
        }

        let txns = self
            .repo
            .list_transactions(account_id, from_date.as_deref(), to_date.as_deref(), limit)
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        // Audit trail; a failed snapshot never fails the listing.
        if let Err(e) = self
            .repo
            .save_transaction_snapshot(
                account_id,
                from_date.as_deref(),
                to_date.as_deref(),
                limit,
                txns.len(),
            )
            .await
        {
            warn!(account_id, error = %e, "transaction snapshot write failed");
        }

        let text = if txns.is_empty() {
            format!("Hesap {account_id} için bu aralıkta işlem bulunamadı.")
        } else {
            format!("Hesap {account_id} için {} işlem listelendi.", txns.len())
        };
        Ok(ToolOutput::Data(json!({
            "account_id": account_id,
            "from_date": from_date,
            "to_date": to_date,
            "limit": limit,
            "count": txns.len(),
            "transactions": txns,
            "text": text,
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

    fn args(pairs: &[(&str, serde_json::Value)]) -> Args {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn limit_clamping() {
        assert_eq!(clamp_limit(None, 50, 500), 50);
        assert_eq!(clamp_limit(Some(0), 50, 500), 50);
        assert_eq!(clamp_limit(Some(-3), 50, 500), 50);
        assert_eq!(clamp_limit(Some(20), 50, 500), 20);
        assert_eq!(clamp_limit(Some(9_999), 50, 500), 500);
        // The cap is the configured one, not a constant.
        assert_eq!(clamp_limit(Some(400), 50, 10), 10);
    }

    #[tokio::test]
    async fn lists_own_transactions() {
        let tool = TransactionsList::new(seeded().await, 50, 500);
        let out = tool
            .call(args(&[
                ("account_id", serde_json::json!(1)),
                ("customer_id", serde_json::json!(1)),
            ]))
            .await
            .unwrap();
        match out {
            ToolOutput::Data(v) => {
                assert_eq!(v["count"], 3);
                assert_eq!(v["limit"], 50);
            }
            other => panic!("expected data, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn foreign_account_is_forbidden() {
        let tool = TransactionsList::new(seeded().await, 50, 500);
        let err = tool
            .call(args(&[
                ("account_id", serde_json::json!(4)),
                ("customer_id", serde_json::json!(1)),
            ]))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Forbidden(_)));
    }

    #[tokio::test]
    async fn short_date_is_dropped() {
        let tool = TransactionsList::new(seeded().await, 50, 500);
        let out = tool
            .call(args(&[
                ("account_id", serde_json::json!(1)),
                ("customer_id", serde_json::json!(1)),
                ("from_date", serde_json::json!("dün")),
            ]))
            .await
            .unwrap();
        match out {
            ToolOutput::Data(v) => assert!(v["from_date"].is_null()),
            other => panic!("expected data, got {other:?}"),
        }
    }
}
