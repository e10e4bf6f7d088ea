//! Runtime configuration with environment overrides.

use std::str::FromStr;

fn get_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Tunables for the orchestration layer. Every field can be overridden
/// through a `FORTUNA_*` environment variable.
#[derive(Debug, Clone)]
pub struct FortunaCfg {
    /// Per-attempt tool call timeout.
    pub tool_timeout_ms: u64,
    /// Default page size for transaction listings.
    pub transactions_default_limit: i64,
    /// Hard cap for transaction listings.
    pub transactions_max_limit: i64,
    /// Default result count for branch/ATM search.
    pub branch_results_limit: i64,
    /// How many example identifiers a disambiguation prompt shows.
    pub disambiguation_examples: usize,
    pub llm_max_tokens: u32,
    pub llm_temperature: f32,
}

impl Default for FortunaCfg {
    fn default() -> Self {
        Self {
            tool_timeout_ms: 4_000,
            transactions_default_limit: 50,
            transactions_max_limit: 500,
            branch_results_limit: 3,
            disambiguation_examples: 3,
            llm_max_tokens: 2_048,
            llm_temperature: 0.2,
        }
    }
}

impl FortunaCfg {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            tool_timeout_ms: get_or("FORTUNA_TOOL_TIMEOUT_MS", d.tool_timeout_ms),
            transactions_default_limit: get_or(
                "FORTUNA_TXN_DEFAULT_LIMIT",
                d.transactions_default_limit,
            ),
            transactions_max_limit: get_or("FORTUNA_TXN_MAX_LIMIT", d.transactions_max_limit),
            branch_results_limit: get_or("FORTUNA_BRANCH_LIMIT", d.branch_results_limit),
            disambiguation_examples: get_or(
                "FORTUNA_DISAMBIGUATION_EXAMPLES",
                d.disambiguation_examples,
            ),
            llm_max_tokens: get_or("FORTUNA_LLM_MAX_TOKENS", d.llm_max_tokens),
            llm_temperature: get_or("FORTUNA_LLM_TEMPERATURE", d.llm_temperature),
        }
    }
}
