//! Branch and ATM search tool.

use super::{opt_i64, opt_str, reject_unknown, Args, BankingTool, ToolError};
use crate::repo::BankRepo;
use crate::types::ToolOutput;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

const DEFAULT_LIMIT: i64 = 3;
const MAX_LIMIT: i64 = 5;

pub struct BranchAtmSearch {
    repo: Arc<dyn BankRepo>,
}

impl BranchAtmSearch {
    pub fn new(repo: Arc<dyn BankRepo>) -> Self {
        Self { repo }
    }
}

fn clamp_limit(requested: Option<i64>) -> i64 {
    requested.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

#[async_trait]
impl BankingTool for BranchAtmSearch {
    fn name(&self) -> &str {
        "branch_atm_search"
    }

    fn description(&self) -> &str {
        "Şehre göre şube ve ATM arar. Şehir zorunludur; ilçe ve tür \
         (branch/atm) ile daraltılabilir."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "city": {"type": "string", "description": "Şehir adı, zorunlu"},
                "district": {"type": "string", "description": "İlçe adı"},
                "type": {"type": "string", "enum": ["branch", "atm"], "description": "Sonuç türü"},
                "nearby": {"type": "boolean", "description": "Yakındakileri öne al"},
                "limit": {"type": "integer", "description": "Sonuç sayısı (1-5, varsayılan 3)"}
            },
            "required": ["city"]
        })
    }

    async fn call(&self, args: Args) -> Result<ToolOutput, ToolError> {
        reject_unknown(&args, &["city", "district", "type", "nearby", "limit"])?;
        let city = opt_str(&args, "city")
            .ok_or_else(|| ToolError::InvalidInput("Lütfen şehir belirtin.".into()))?;
        let district = opt_str(&args, "district");
        let kind = opt_str(&args, "type");
        let nearby = args.get("nearby").and_then(|v| v.as_bool()).unwrap_or(false);
        let limit = clamp_limit(opt_i64(&args, "limit")?);

        let hits = self
            .repo
            .find_branch_atm(&city, district.as_deref(), kind.as_deref(), limit)
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        if hits.is_empty() {
            return Err(ToolError::NotFound(format!(
                "Bu bölgede sonuç bulunamadı: {city}"
            )));
        }

        Ok(ToolOutput::Data(json!({
            "query": {
                "city": city,
                "district": district,
                "type": kind,
                "nearby": nearby,
                "limit": limit,
            },
            "count": hits.len(),
            "results": hits,
            "text": format!("{} içinde {} sonuç bulundu.", city, hits.len()),
            "ui_component": {"type": "atm_card", "items": hits},
        })))
    }
}
