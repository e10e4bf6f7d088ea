//! Banking tool surface: the trait every tool implements, the shared
//! registry, and the closed error taxonomy tools report through.

pub mod accounts;
pub mod branches;
pub mod calc;
pub mod cards;
pub mod rates;
pub mod transactions;

use crate::types::ToolOutput;
use async_trait::async_trait;
use llm::provider::ToolDefinition;

/// Identity parameter spellings tools are known to use, in the order
/// the injector tries them.
pub const CUSTOMER_ALIASES: [&str; 4] = ["customer_id", "customerId", "user_id", "customer"];

pub type Args = serde_json::Map<String, serde_json::Value>;

/// Closed set of tool failure classes. Tools report what went wrong
/// through this type; nothing downstream inspects message strings.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    /// An argument key the tool's schema does not declare.
    #[error("beklenmeyen parametre: {0}")]
    SchemaMismatch(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("araç çağrısı {0} ms içinde tamamlanamadı")]
    Timeout(u64),
    #[error("bağlantı hatası: {0}")]
    Transport(String),
}

/// A single invocable banking operation.
#[async_trait]
pub trait BankingTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the accepted arguments.
    fn input_schema(&self) -> serde_json::Value;

    /// Declared parameter names, derived from the schema properties.
    fn param_names(&self) -> Vec<String> {
        self.input_schema()
            .get("properties")
            .and_then(|p| p.as_object())
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default()
    }

    async fn call(&self, args: Args) -> Result<ToolOutput, ToolError>;
}

/// Reject argument keys the schema does not declare. Tools call this
/// first so the injector's alias probing gets a clean schema-mismatch
/// signal instead of a silent ignore.
pub fn reject_unknown(args: &Args, allowed: &[&str]) -> Result<(), ToolError> {
    for key in args.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(ToolError::SchemaMismatch(key.clone()));
        }
    }
    Ok(())
}

pub fn require_i64(args: &Args, key: &str) -> Result<i64, ToolError> {
    opt_i64(args, key)?
        .ok_or_else(|| ToolError::InvalidInput(format!("eksik parametre: {key}")))
}

pub fn opt_i64(args: &Args, key: &str) -> Result<Option<i64>, ToolError> {
    match args.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
            .map(Some)
            .ok_or_else(|| ToolError::InvalidInput(format!("geçersiz sayı: {key}"))),
    }
}

pub fn opt_f64(args: &Args, key: &str) -> Result<Option<f64>, ToolError> {
    match args.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .or_else(|| v.as_str().and_then(|s| s.trim().replace(',', ".").parse().ok()))
            .map(Some)
            .ok_or_else(|| ToolError::InvalidInput(format!("geçersiz sayı: {key}"))),
    }
}

pub fn opt_str(args: &Args, key: &str) -> Option<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

/// Turkish money formatting: thousands with '.', decimals with ','.
pub fn fmt_amount(value: f64) -> String {
    let negative = value < 0.0;
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let frac = cents % 100;
    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    let sign = if negative { "-" } else { "" };
    format!("{sign}{grouped},{frac:02}")
}

/// All registered tools, looked up by name or by capability keywords.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn BankingTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Box<dyn BankingTool>) {
        self.tools.push(tool);
    }

    pub fn get_by_name(&self, name: &str) -> Option<&dyn BankingTool> {
        self.tools.iter().find(|t| t.name() == name).map(Box::as_ref)
    }

    /// First tool matching any candidate name, exact match preferred,
    /// then substring over name + description.
    pub fn find(&self, candidates: &[&str]) -> Option<&dyn BankingTool> {
        for cand in candidates {
            if let Some(t) = self.get_by_name(cand) {
                return Some(t);
            }
        }
        for cand in candidates {
            let needle = cand.to_lowercase();
            for t in &self.tools {
                let haystack = format!("{} {}", t.name(), t.description()).to_lowercase();
                if haystack.contains(&needle) {
                    return Some(t.as_ref());
                }
            }
        }
        None
    }

    /// Definitions handed to the model loop as its tool catalog.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_owned(),
                description: t.description().to_owned(),
                input_schema: t.input_schema(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn list_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.iter().map(|t| t.name()).collect();
        names.sort_unstable();
        names
    }
}

/// Registry preloaded with the full banking tool set.
pub fn banking_registry(
    repo: std::sync::Arc<dyn crate::repo::BankRepo>,
    cfg: &crate::config::FortunaCfg,
) -> ToolRegistry {
    let mut reg = ToolRegistry::new();
    reg.register(Box::new(accounts::GetAccounts::new(repo.clone())));
    reg.register(Box::new(accounts::GetBalance::new(repo.clone())));
    reg.register(Box::new(cards::ListCustomerCards::new(repo.clone())));
    reg.register(Box::new(cards::GetCardInfo::new(repo.clone())));
    reg.register(Box::new(transactions::TransactionsList::new(
        repo.clone(),
        cfg.transactions_default_limit,
        cfg.transactions_max_limit,
    )));
    reg.register(Box::new(rates::FxRates::new(repo.clone())));
    reg.register(Box::new(rates::InterestRates::new(repo.clone())));
    reg.register(Box::new(rates::GetFee::new(repo.clone())));
    reg.register(Box::new(rates::ListFees::new(repo.clone())));
    reg.register(Box::new(branches::BranchAtmSearch::new(repo)));
    reg.register(Box::new(calc::LoanAmortization));
    reg.register(Box::new(calc::DepositInterest));
    reg
}
