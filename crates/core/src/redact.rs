//! Log redaction. Everything that reaches a log line about a user
//! message, a tool argument set, or a reply text passes through here.

use regex::Regex;
use std::sync::OnceLock;

fn iban_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bTR\d{20,26}\b").expect("static regex"))
}

fn long_digits_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{11,}\b").expect("static regex"))
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").expect("static regex")
    })
}

/// Mask IBANs, long digit runs (national ids, card numbers) and email
/// addresses. Short identifiers like account numbers stay readable.
pub fn mask(text: &str) -> String {
    let masked = iban_re().replace_all(text, "TR************");
    let masked = long_digits_re().replace_all(&masked, "***");
    email_re().replace_all(&masked, "***@***").into_owned()
}

/// Redact a tool argument map down to its keys for logging.
pub fn arg_keys(args: &serde_json::Map<String, serde_json::Value>) -> Vec<&str> {
    args.keys().map(String::as_str).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_iban() {
        let out = mask("IBAN TR330006100519786457841326 uygun mu");
        assert!(!out.contains("TR33"));
        assert!(out.contains("TR************"));
    }

    #[test]
    fn masks_national_id_but_keeps_account_numbers() {
        let out = mask("TC 12345678901 hesap 123");
        assert!(out.contains("***"));
        assert!(!out.contains("12345678901"));
        assert!(out.contains("hesap 123"));
    }

    #[test]
    fn masks_email() {
        assert_eq!(mask("mail: ayse@example.com"), "mail: ***@***");
    }

    #[test]
    fn plain_text_untouched() {
        assert_eq!(mask("hesap 42 bakiye"), "hesap 42 bakiye");
    }
}
