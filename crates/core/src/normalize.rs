//! Reply normalization: every tool reply, planned or model-initiated,
//! collapses into display text plus an optional UI payload here.

use crate::config::FortunaCfg;
use crate::tool::ToolError;
use crate::types::{
    DisambiguationSet, EntityKind, Intent, NormalizedReply, ToolReply,
};

pub const ASK_ACCOUNT: &str =
    "Hangi hesabın işlem geçmişini listeleyeyim? Örn: 'hesap 123 son işlemler'";
pub const DONE: &str = "İşlem tamamlandı.";
pub const NOT_FOUND_ACCOUNT: &str = "Hesap bilgisi bulunamadı.";
pub const NO_ACCESS: &str = "Bu hesap için erişim izniniz yok.";
pub const RETRY: &str = "Şu anda isteğinizi tamamlayamadım. Lütfen tekrar deneyin.";
pub const INVALID_DATE: &str =
    "Tarihi anlayamadım. Lütfen YYYY-AA-GG biçiminde yazın, örn: 2026-08-01";

/// Selection prompt for a multi-match set, e.g.
/// "3 hesabınız var. Hangi hesabı kullanayım? Örn: 1, 2, 3".
/// `examples` bounds how many identifiers the prompt shows.
pub fn disambiguation_text(set: &DisambiguationSet, examples: usize) -> String {
    let ids: Vec<String> = set
        .candidates
        .iter()
        .take(examples.max(1))
        .map(|c| c.id.to_string())
        .collect();
    let (noun, question) = match set.kind {
        EntityKind::Account => ("hesabınız", "Hangi hesabı kullanayım?"),
        EntityKind::Card => ("kartınız", "Hangi kartı kullanayım?"),
    };
    format!(
        "{} {noun} var. {question} Örn: {}",
        set.candidates.len(),
        ids.join(", ")
    )
}

fn error_text(err: &ToolError) -> String {
    match err {
        ToolError::SchemaMismatch(_) | ToolError::InvalidInput(_) => NOT_FOUND_ACCOUNT.into(),
        ToolError::Forbidden(_) => NO_ACCESS.into(),
        ToolError::Timeout(_) | ToolError::Transport(_) => RETRY.into(),
        ToolError::NotFound(msg) => msg.clone(),
    }
}

/// Pull the UI payload out of a data reply, descending through at most
/// two nesting levels of "data".
fn find_ui(v: &serde_json::Value) -> Option<serde_json::Value> {
    let roots = [
        v,
        v.get("data").unwrap_or(&serde_json::Value::Null),
        v.get("data")
            .and_then(|d| d.get("data"))
            .unwrap_or(&serde_json::Value::Null),
    ];
    for root in roots {
        for key in ["ui_component", "structured_ui"] {
            if let Some(ui) = root.get(key) {
                if !ui.is_null() {
                    return Some(ui.clone());
                }
            }
        }
    }
    None
}

fn find_text(v: &serde_json::Value) -> Option<String> {
    let roots = [v, v.get("data").unwrap_or(&serde_json::Value::Null)];
    for root in roots {
        for key in ["text", "response", "message"] {
            if let Some(s) = root.get(key).and_then(|t| t.as_str()) {
                if !s.trim().is_empty() {
                    return Some(s.to_owned());
                }
            }
        }
    }
    None
}

/// True when a transactions request came back with an account list
/// instead of transactions. Happens when a listing tool answered a
/// history question; asking which account is the only useful reply.
fn is_account_list_shape(v: &serde_json::Value) -> bool {
    let has_account_array = v
        .get("accounts")
        .and_then(|a| a.as_array())
        .map(|a| !a.is_empty())
        .unwrap_or(false);
    let is_balance_ui = find_ui(v)
        .and_then(|ui| ui.get("type").and_then(|t| t.as_str()).map(String::from))
        .map(|t| t == "balance_card")
        .unwrap_or(false);
    has_account_array || is_balance_ui
}

/// Collapse a tool reply into the final chat-facing shape.
pub fn normalize(intent: Intent, reply: &ToolReply, cfg: &FortunaCfg) -> NormalizedReply {
    match reply {
        ToolReply::Error(err) => NormalizedReply::text_only(error_text(err)),
        ToolReply::Disambiguation(set) => {
            if intent == Intent::Transactions && set.kind == EntityKind::Account {
                // Misrouted history request: don't offer a selection
                // over balances, ask for the account instead.
                return NormalizedReply::text_only(ASK_ACCOUNT);
            }
            let ui = set.ui.clone().unwrap_or_else(|| {
                serde_json::json!({
                    "type": "selection",
                    "kind": set.kind,
                    "candidates": set.candidates,
                })
            });
            NormalizedReply {
                text: disambiguation_text(set, cfg.disambiguation_examples),
                structured_ui: Some(ui),
            }
        }
        ToolReply::Data(v) => {
            if intent == Intent::Transactions && is_account_list_shape(v) {
                return NormalizedReply::text_only(ASK_ACCOUNT);
            }
            let ui = find_ui(v);
            let text = find_text(v).unwrap_or_else(|| DONE.into());
            NormalizedReply { text, structured_ui: ui }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Candidate;
    use serde_json::json;

    fn cfg() -> FortunaCfg {
        FortunaCfg::default()
    }

    fn three_accounts() -> DisambiguationSet {
        DisambiguationSet {
            kind: EntityKind::Account,
            candidates: vec![
                Candidate { id: 1, label: "**1326".into(), preview: "15.423,50 TRY".into() },
                Candidate { id: 2, label: "**5678".into(), preview: "2.150,00 USD".into() },
                Candidate { id: 3, label: "**4321".into(), preview: "80.000,00 TRY".into() },
            ],
            ui: None,
        }
    }

    #[test]
    fn error_table() {
        let cases = [
            (ToolError::InvalidInput("x".into()), NOT_FOUND_ACCOUNT),
            (ToolError::SchemaMismatch("customerId".into()), NOT_FOUND_ACCOUNT),
            (ToolError::Forbidden("x".into()), NO_ACCESS),
            (ToolError::Timeout(4000), RETRY),
            (ToolError::Transport("io".into()), RETRY),
        ];
        for (err, expected) in cases {
            assert_eq!(normalize(Intent::Balance, &ToolReply::Error(err), &cfg()).text, expected);
        }
        // Not-found carries its own message through.
        let reply = normalize(
            Intent::Balance,
            &ToolReply::Error(ToolError::NotFound("Hesap bulunamadı: 9".into())),
            &cfg(),
        );
        assert_eq!(reply.text, "Hesap bulunamadı: 9");
    }

    #[test]
    fn disambiguation_prompt_lists_three_ids() {
        let reply = normalize(Intent::Balance, &ToolReply::Disambiguation(three_accounts()), &cfg());
        assert_eq!(reply.text, "3 hesabınız var. Hangi hesabı kullanayım? Örn: 1, 2, 3");
        assert!(reply.structured_ui.is_some());
    }

    #[test]
    fn disambiguation_example_count_is_configurable() {
        let cfg = FortunaCfg { disambiguation_examples: 2, ..FortunaCfg::default() };
        let reply = normalize(Intent::Balance, &ToolReply::Disambiguation(three_accounts()), &cfg);
        assert_eq!(reply.text, "3 hesabınız var. Hangi hesabı kullanayım? Örn: 1, 2");
    }

    #[test]
    fn transactions_never_show_account_selection() {
        let reply = normalize(Intent::Transactions, &ToolReply::Disambiguation(three_accounts()), &cfg());
        assert_eq!(reply.text, ASK_ACCOUNT);
        assert!(reply.structured_ui.is_none());
    }

    #[test]
    fn transactions_safety_net_on_account_list_data() {
        let reply = normalize(
            Intent::Transactions,
            &ToolReply::Data(json!({"accounts": [{"account_id": 1}]})),
            &cfg(),
        );
        assert_eq!(reply.text, ASK_ACCOUNT);

        let reply = normalize(
            Intent::Transactions,
            &ToolReply::Data(json!({"ui_component": {"type": "balance_card"}})),
            &cfg(),
        );
        assert_eq!(reply.text, ASK_ACCOUNT);
    }

    #[test]
    fn nested_ui_is_found() {
        let reply = normalize(
            Intent::Balance,
            &ToolReply::Data(json!({
                "data": {"data": {"ui_component": {"type": "balance_card"}}},
                "text": "bakiye"
            })),
            &cfg(),
        );
        assert_eq!(reply.structured_ui.unwrap()["type"], "balance_card");
    }

    #[test]
    fn data_without_text_says_done() {
        let reply = normalize(Intent::Unknown, &ToolReply::Data(json!({"ok": true})), &cfg());
        assert_eq!(reply.text, DONE);
        assert!(reply.structured_ui.is_none());
    }

    #[test]
    fn normalize_is_idempotent() {
        let first = normalize(
            Intent::Balance,
            &ToolReply::Data(json!({
                "text": "Hesap 1 bakiyesi: 15.423,50 TRY",
                "ui_component": {"type": "balance_card"}
            })),
            &cfg(),
        );
        let again = normalize(
            Intent::Balance,
            &ToolReply::Data(serde_json::to_value(&first).unwrap()),
            &cfg(),
        );
        assert_eq!(first, again);
    }
}
