//! Deterministic utterance parser: Turkish banking requests in, intent
//! plus slots out. Pure string work, no I/O.
//!
//! Numbers are claimed by at most one slot. Date expressions and
//! explicit account/card markers consume their spans first; a single
//! leftover bounded number then falls back to an account id for the
//! intents where that reading is safe.

use crate::types::{DateRange, Intent, Slots};
use chrono::{Datelike, Days, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

macro_rules! static_re {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("static regex"))
        }
    };
}

static_re!(account_marker_re, r"hesa\p{L}*\s*(?:no|numaras[ıi])?\s*[:#]?\s*(\d{1,10})");
static_re!(account_suffix_re, r"(\d{1,10})\s*(?:numaral[ıi]|nolu)\s*hesa");
static_re!(card_marker_re, r"kart\p{L}*\s*(?:no)?\s*[:#]?\s*(\d{1,10})");
static_re!(card_suffix_re, r"(\d{1,10})\s*(?:numaral[ıi]|nolu)\s*kart");
static_re!(iso_date_re, r"\b(\d{4}-\d{2}-\d{2})\b");
static_re!(dotted_date_re, r"\b\d{1,2}[./]\d{1,2}[./]\d{2,4}\b");
static_re!(last_n_re, r"son\s+(\d{1,3})\s*(gün|gun|hafta|ay)\b");
static_re!(yesterday_re, r"\b(?:dün|dun|yesterday)\b");
static_re!(limit_re, r"(?:son|ilk)?\s*(\d{1,4})\s*(?:işlem|islem|adet|kayıt|kayit|hareket)");
static_re!(number_re, r"\b(\d{1,10})\b");
static_re!(percent_re, r"%\s*(\d{1,3}(?:[.,]\d+)?)");
static_re!(rate_word_re, r"(?:faiz(?:le|i|iyle)?)\s*(?:oran[ıi])?\s*:?\s*(\d{1,3}(?:[.,]\d+)?)");
static_re!(term_re, r"(\d{1,3})\s*(?:ay|taksit)\b");
static_re!(
    amount_re,
    r"(\d{1,3}(?:\.\d{3})+(?:,\d+)?|\d+(?:,\d+)?)\s*(?:tl|try|lira|₺|usd|dolar|eur|euro)\b"
);

const CITIES: [&str; 8] = [
    "istanbul", "ankara", "izmir", "bursa", "antalya", "adana", "konya", "eskişehir",
];
const DISTRICTS: [&str; 8] = [
    "kadıköy", "beşiktaş", "üsküdar", "şişli", "çankaya", "keçiören", "konak", "nilüfer",
];

/// Lowercasing that keeps Turkish dotted/dotless I distinct, so
/// "İşlem" folds to "işlem" and not "i̇şlem"/"Işlem" artifacts.
fn turkish_lower(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'İ' => 'i',
            'I' => 'ı',
            _ => c,
        })
        .collect::<String>()
        .to_lowercase()
}

/// Byte ranges already claimed by a slot.
#[derive(Default)]
struct SpanSet(Vec<(usize, usize)>);

impl SpanSet {
    fn claim(&mut self, start: usize, end: usize) {
        self.0.push((start, end));
    }

    fn overlaps(&self, start: usize, end: usize) -> bool {
        self.0.iter().any(|&(s, e)| start < e && end > s)
    }
}

fn parse_tr_number(s: &str) -> Option<f64> {
    s.replace('.', "").replace(',', ".").parse().ok()
}

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

fn month_start(d: NaiveDate) -> NaiveDate {
    d.with_day(1).unwrap_or(d)
}

fn days_back(d: NaiveDate, n: u64) -> NaiveDate {
    d.checked_sub_days(Days::new(n)).unwrap_or(d)
}

fn detect_intent(t: &str, slots: &Slots) -> Intent {
    let has_txn = contains_any(t, &["işlem", "islem", "hareket", "transaction", "ekstre"]);
    let has_balance_word = contains_any(t, &["bakiye", "balance", "kalan para"]);

    if has_txn && !has_balance_word {
        return Intent::Transactions;
    }
    if contains_any(t, &["ücret", "ucret", "masraf", "komisyon", "fee"]) {
        return Intent::Fees;
    }
    if contains_any(t, &["döviz", "doviz", "kur", "exchange", "parite"]) {
        return Intent::FxRates;
    }
    let wants_calc = contains_any(t, &["taksit", "amortisman", "geri ödeme planı", "loan"])
        || (t.contains("kredi") && (slots.amount.is_some() || slots.term_months.is_some()))
        || (contains_any(t, &["mevduat", "vadeli"])
            && (slots.amount.is_some() || slots.term_months.is_some()));
    if wants_calc {
        return Intent::LoanOrDepositCalc;
    }
    if contains_any(t, &["faiz", "interest"]) {
        return Intent::InterestRates;
    }
    if contains_any(t, &["atm", "şube", "sube", "branch"]) {
        return Intent::BranchAtmSearch;
    }
    if contains_any(t, &["kart", "card"]) {
        return Intent::CardInfo;
    }
    if t.contains("hesa") && contains_any(t, &["listele", "listesi", "göster", "hangileri"]) {
        return Intent::AccountsList;
    }
    if has_balance_word || t.contains("hesa") {
        return Intent::Balance;
    }
    Intent::Unknown
}

/// Parse an utterance against a fixed "today", for determinism.
pub fn parse_with_today(utterance: &str, today: NaiveDate) -> (Intent, Slots) {
    let t = turkish_lower(utterance);
    let mut slots = Slots::default();
    let mut claimed = SpanSet::default();

    // Rejected date formats still claim their digits so they cannot
    // leak into the limit or account slots.
    for m in dotted_date_re().find_iter(&t) {
        slots.invalid_date = true;
        claimed.claim(m.start(), m.end());
    }

    // A number glued to '-' is part of an ISO date, not an entity id.
    let part_of_date = |end: usize| t[end..].starts_with('-');

    // Explicit entity markers claim their numbers first.
    for re in [account_marker_re(), account_suffix_re()] {
        if slots.account_id.is_none() {
            if let Some(caps) = re.captures(&t) {
                if let (Some(m), Ok(id)) = (caps.get(1), caps[1].parse()) {
                    if !part_of_date(m.end()) {
                        slots.account_id = Some(id);
                        claimed.claim(m.start(), m.end());
                    }
                }
            }
        }
    }
    for re in [card_marker_re(), card_suffix_re()] {
        if slots.card_id.is_none() {
            if let Some(caps) = re.captures(&t) {
                if let (Some(m), Ok(id)) = (caps.get(1), caps[1].parse()) {
                    if !claimed.overlaps(m.start(), m.end()) && !part_of_date(m.end()) {
                        slots.card_id = Some(id);
                        claimed.claim(m.start(), m.end());
                    }
                }
            }
        }
    }

    // Date expressions.
    let iso_dates: Vec<(NaiveDate, usize, usize)> = iso_date_re()
        .captures_iter(&t)
        .filter_map(|caps| {
            let m = caps.get(1)?;
            let d = NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok()?;
            Some((d, m.start(), m.end()))
        })
        .collect();
    match iso_dates.as_slice() {
        [] => {}
        [(d, s, e)] => {
            slots.date_range = Some(DateRange { from: *d, to: today });
            claimed.claim(*s, *e);
        }
        [(a, s1, e1), (b, s2, e2), ..] => {
            let (from, to) = if a <= b { (*a, *b) } else { (*b, *a) };
            slots.date_range = Some(DateRange { from, to });
            claimed.claim(*s1, *e1);
            claimed.claim(*s2, *e2);
        }
    }
    if slots.date_range.is_none() {
        if let Some(caps) = last_n_re().captures(&t) {
            if let (Some(whole), Ok(n)) = (caps.get(0), caps[1].parse::<u64>()) {
                let days = match &caps[2] {
                    "hafta" => n * 7,
                    "ay" => n * 30,
                    _ => n,
                };
                slots.date_range = Some(DateRange { from: days_back(today, days), to: today });
                claimed.claim(whole.start(), whole.end());
            }
        } else if contains_any(&t, &["bugün", "bugun", "today"]) {
            slots.date_range = Some(DateRange { from: today, to: today });
        } else if yesterday_re().is_match(&t) {
            let y = days_back(today, 1);
            slots.date_range = Some(DateRange { from: y, to: y });
        } else if t.contains("bu ay") {
            slots.date_range = Some(DateRange { from: month_start(today), to: today });
        } else if contains_any(&t, &["geçen ay", "gecen ay"]) {
            let last_of_prev = days_back(month_start(today), 1);
            slots.date_range = Some(DateRange {
                from: month_start(last_of_prev),
                to: last_of_prev,
            });
        }
    }

    // Result limit: a count right before a "records" word.
    if let Some(caps) = limit_re().captures(&t) {
        if let Some(m) = caps.get(1) {
            if !claimed.overlaps(m.start(), m.end()) {
                if let Ok(n) = caps[1].parse::<i64>() {
                    slots.limit = Some(n.clamp(1, 500));
                    claimed.claim(m.start(), m.end());
                }
            }
        }
    }
    if slots.limit.is_none()
        && contains_any(&t, &["tüm işlem", "tum islem", "bütün işlem", "butun islem"])
    {
        slots.limit = Some(500);
    }

    // Calculator slots.
    if let Some(caps) = amount_re().captures(&t) {
        if let Some(m) = caps.get(1) {
            if !claimed.overlaps(m.start(), m.end()) {
                slots.amount = parse_tr_number(m.as_str());
                claimed.claim(m.start(), m.end());
            }
        }
    }
    for re in [percent_re(), rate_word_re()] {
        if slots.annual_rate.is_none() {
            if let Some(caps) = re.captures(&t) {
                if let Some(m) = caps.get(1) {
                    if !claimed.overlaps(m.start(), m.end()) {
                        slots.annual_rate = parse_tr_number(m.as_str());
                        claimed.claim(m.start(), m.end());
                    }
                }
            }
        }
    }
    if let Some(caps) = term_re().captures(&t) {
        if let Some(m) = caps.get(1) {
            if !claimed.overlaps(m.start(), m.end()) {
                if let Ok(n) = caps[1].parse() {
                    slots.term_months = Some(n);
                    claimed.claim(m.start(), m.end());
                }
            }
        }
    }
    slots.deposit = t.contains("mevduat");

    // Lookup slots.
    if t.contains("kredi kart") && contains_any(&t, &["yıllık", "yillik"]) {
        slots.service_code = Some("kredi_karti_yillik".into());
    } else {
        for code in ["eft", "havale", "fast", "swift"] {
            if t.contains(code) {
                slots.service_code = Some(code.into());
                break;
            }
        }
    }
    for c in CITIES {
        if t.contains(c) {
            slots.city = Some(c.into());
            break;
        }
    }
    for d in DISTRICTS {
        if t.contains(d) {
            slots.district = Some(d.into());
            break;
        }
    }
    if t.contains("atm") {
        slots.place_kind = Some("atm".into());
    } else if contains_any(&t, &["şube", "sube", "branch"]) {
        slots.place_kind = Some("branch".into());
    }
    slots.nearby = contains_any(&t, &["yakın", "yakin", "en yakın", "nearby"]);
    for (words, code) in [
        (["dolar", "usd"], "USD"),
        (["euro", "eur"], "EUR"),
        (["sterlin", "gbp"], "GBP"),
    ] {
        if contains_any(&t, &words) {
            slots.currency = Some(code.into());
            break;
        }
    }

    let intent = detect_intent(&t, &slots);

    // A single leftover bounded number reads as an account id, but only
    // where that reading cannot misfire.
    if slots.account_id.is_none()
        && matches!(intent, Intent::Balance | Intent::Transactions)
    {
        let leftovers: Vec<i64> = number_re()
            .captures_iter(&t)
            .filter_map(|caps| {
                let m = caps.get(1)?;
                if claimed.overlaps(m.start(), m.end()) {
                    return None;
                }
                caps[1].parse().ok()
            })
            .collect();
        if let [id] = leftovers.as_slice() {
            slots.account_id = Some(*id);
        }
    }

    (intent, slots)
}

/// Parse an utterance against the current local date.
pub fn parse(utterance: &str) -> (Intent, Slots) {
    parse_with_today(utterance, chrono::Local::now().date_naive())
}
