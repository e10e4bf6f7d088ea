//! Core types shared across the orchestration layer.

use crate::tool::ToolError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Server-side identity of the caller. Threaded through every tool
/// invocation so that identity never depends on model output.
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub customer_id: i64,
    pub session_id: String,
    pub raw_utterance: String,
}

impl CallerContext {
    pub fn new(customer_id: i64, session_id: impl Into<String>, utterance: impl Into<String>) -> Self {
        Self {
            customer_id,
            session_id: session_id.into(),
            raw_utterance: utterance.into(),
        }
    }
}

/// Recognized banking intents. `Unknown` routes to the model fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Balance,
    AccountsList,
    CardInfo,
    Transactions,
    Fees,
    FxRates,
    InterestRates,
    BranchAtmSearch,
    LoanOrDepositCalc,
    Unknown,
}

/// Inclusive date range extracted from the utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Slots filled by the utterance parser. All optional; the planner
/// decides what each flow actually needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slots {
    pub account_id: Option<i64>,
    pub card_id: Option<i64>,
    pub date_range: Option<DateRange>,
    /// A dd.mm.yyyy-style date was present and rejected.
    pub invalid_date: bool,
    pub limit: Option<i64>,
    pub service_code: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    /// "atm" or "branch" when the utterance names one of them.
    pub place_kind: Option<String>,
    pub nearby: bool,
    pub amount: Option<f64>,
    pub annual_rate: Option<f64>,
    pub term_months: Option<i64>,
    pub currency: Option<String>,
    pub deposit: bool,
}

/// Which entity a disambiguation set selects over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Account,
    Card,
}

/// One selectable entity in a disambiguation set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: i64,
    /// Masked identifier, e.g. last four digits of an IBAN.
    pub label: String,
    /// Short human preview, e.g. formatted balance.
    pub preview: String,
}

/// A multi-match result that needs a user choice before proceeding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisambiguationSet {
    pub kind: EntityKind,
    pub candidates: Vec<Candidate>,
    /// Optional UI payload built by the tool (e.g. a multi-account card).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui: Option<serde_json::Value>,
}

/// What a tool returns on success.
#[derive(Debug, Clone)]
pub enum ToolOutput {
    Data(serde_json::Value),
    Disambiguation(DisambiguationSet),
}

/// The single reply shape every tool invocation collapses into.
/// Discriminated exactly once, in the normalizer.
#[derive(Debug, Clone)]
pub enum ToolReply {
    Data(serde_json::Value),
    Disambiguation(DisambiguationSet),
    Error(ToolError),
}

impl From<ToolOutput> for ToolReply {
    fn from(out: ToolOutput) -> Self {
        match out {
            ToolOutput::Data(v) => ToolReply::Data(v),
            ToolOutput::Disambiguation(set) => ToolReply::Disambiguation(set),
        }
    }
}

impl ToolReply {
    /// Serialized feedback for the model loop: payload text plus an
    /// error flag for the tool-result block.
    pub fn to_feedback(&self) -> (String, bool) {
        match self {
            ToolReply::Data(v) => (v.to_string(), false),
            ToolReply::Disambiguation(set) => (
                serde_json::to_string(set).unwrap_or_else(|_| "{}".into()),
                false,
            ),
            ToolReply::Error(e) => (e.to_string(), true),
        }
    }
}

/// Outcome of a planned deterministic flow.
#[derive(Debug)]
pub enum PlanOutcome {
    Resolved(ToolReply),
    NeedsDisambiguation {
        set: DisambiguationSet,
        prompt: String,
    },
    /// The flow could not complete deterministically; hand the turn to
    /// the model loop. Carries the reason for the log.
    Fallback(String),
}

/// Final chat-facing reply: display text plus optional UI payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedReply {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_ui: Option<serde_json::Value>,
}

impl NormalizedReply {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self { text: text.into(), structured_ui: None }
    }
}
