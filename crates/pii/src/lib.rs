//! aegis_pii
//!
//! Best-effort PII detection and redaction over plain text.
//! - `detect` never mutates input; it only reports positioned matches.
//! - `redact` is a pure rewrite and is idempotent: redacting already-redacted
//!   text is a no-op.
//!
//! Detectors are deterministic regex/heuristic rules, not a statistical
//! model. False negatives are expected; the taxonomy is intentionally small.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PiiError {
    #[error("invalid detection span: start {start} end {end} len {len}")]
    InvalidSpan { start: usize, end: usize, len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiType {
    Email,
    Phone,
    Ssn,
    CreditCard,
    IpAddress,
    Name,
    Address,
    DateOfBirth,
    Custom,
}

impl PiiType {
    /// Upper-case tag used inside `[<TAG>_REDACTED]` placeholders.
    pub fn tag(&self) -> &'static str {
        match self {
            PiiType::Email => "EMAIL",
            PiiType::Phone => "PHONE",
            PiiType::Ssn => "SSN",
            PiiType::CreditCard => "CREDIT_CARD",
            PiiType::IpAddress => "IP_ADDRESS",
            PiiType::Name => "NAME",
            PiiType::Address => "ADDRESS",
            PiiType::DateOfBirth => "DATE_OF_BIRTH",
            PiiType::Custom => "CUSTOM",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiiDetection {
    pub kind: PiiType,
    pub value: String,
    pub start: usize,
    pub end: usize,
    pub confidence: f32,
}

impl PiiDetection {
    fn new(
        kind: PiiType,
        value: impl Into<String>,
        start: usize,
        end: usize,
        confidence: f32,
        len: usize,
    ) -> Result<Self, PiiError> {
        if start >= end || end > len {
            return Err(PiiError::InvalidSpan { start, end, len });
        }
        Ok(Self { kind, value: value.into(), start, end, confidence })
    }
}

/// Which low-confidence, opt-in detector families to run.
///
/// `name` and `address` are disabled by default: both rely on shallow
/// heuristics with a high false-positive rate on ordinary prose.
#[derive(Debug, Clone, Copy)]
pub struct DetectorConfig {
    pub enable_name: bool,
    pub enable_address: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self { enable_name: false, enable_address: false }
    }
}

fn regex_cell<'a>(cell: &'a OnceLock<Regex>, pattern: &str) -> &'a Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static pii pattern must compile"))
}

fn email_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex_cell(&CELL, r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
}

fn ssn_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex_cell(&CELL, r"\b\d{3}-\d{2}-\d{4}\b")
}

fn credit_card_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex_cell(&CELL, r"\b(?:\d[ -]?){12,18}\d\b")
}

fn phone_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex_cell(&CELL, r"\+?\d{1,3}[- .]?(?:\d{3,4}[- .]?){2,3}\d")
}

fn ipv4_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex_cell(
        &CELL,
        r"\b(?:(?:25[0-5]|2[0-4]\d|1?\d?\d)\.){3}(?:25[0-5]|2[0-4]\d|1?\d?\d)\b",
    )
}

fn ipv6_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex_cell(&CELL, r"\b(?:[A-Fa-f0-9]{1,4}:){2,7}[A-Fa-f0-9]{1,4}\b")
}

fn dob_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex_cell(
        &CELL,
        r"\b(?:19\d{2}|20[0-2]\d)-(?:0[1-9]|1[0-2])-(?:0[1-9]|[12]\d|3[01])\b|\b(?:0[1-9]|1[0-2])/(?:0[1-9]|[12]\d|3[01])/(?:19\d{2}|20[0-2]\d)\b",
    )
}

/// Luhn check for credit-card-shaped digit runs.
fn passes_luhn(digits: &str) -> bool {
    let digits: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 13 || digits.len() > 19 {
        return false;
    }
    let mut sum = 0u32;
    let mut double = false;
    for &d in digits.iter().rev() {
        let mut v = d;
        if double {
            v *= 2;
            if v > 9 {
                v -= 9;
            }
        }
        sum += v;
        double = !double;
    }
    sum % 10 == 0
}

fn all_zero_group(value: &str) -> bool {
    value.split('-').any(|g| g.chars().all(|c| c == '0'))
}

/// Run every enabled detector family over `text` and return matches ordered
/// by `start` ascending, then length descending.
pub fn detect(text: &str, config: &DetectorConfig) -> Vec<PiiDetection> {
    let len = text.len();
    let mut out = Vec::new();

    for m in email_re().find_iter(text) {
        if let Ok(d) = PiiDetection::new(PiiType::Email, m.as_str(), m.start(), m.end(), 0.95, len) {
            out.push(d);
        }
    }

    for m in ssn_re().find_iter(text) {
        if all_zero_group(m.as_str()) {
            continue;
        }
        if let Ok(d) = PiiDetection::new(PiiType::Ssn, m.as_str(), m.start(), m.end(), 0.9, len) {
            out.push(d);
        }
    }

    for m in credit_card_re().find_iter(text) {
        if !passes_luhn(m.as_str()) {
            continue;
        }
        if let Ok(d) = PiiDetection::new(PiiType::CreditCard, m.as_str(), m.start(), m.end(), 0.95, len) {
            out.push(d);
        }
    }

    for m in phone_re().find_iter(text) {
        if let Ok(d) = PiiDetection::new(PiiType::Phone, m.as_str(), m.start(), m.end(), 0.7, len) {
            out.push(d);
        }
    }

    for m in ipv4_re().find_iter(text) {
        if let Ok(d) = PiiDetection::new(PiiType::IpAddress, m.as_str(), m.start(), m.end(), 0.9, len) {
            out.push(d);
        }
    }
    for m in ipv6_re().find_iter(text) {
        if let Ok(d) = PiiDetection::new(PiiType::IpAddress, m.as_str(), m.start(), m.end(), 0.9, len) {
            out.push(d);
        }
    }

    for m in dob_re().find_iter(text) {
        if let Ok(d) = PiiDetection::new(PiiType::DateOfBirth, m.as_str(), m.start(), m.end(), 0.5, len) {
            out.push(d);
        }
    }

    if config.enable_name {
        out.extend(detect_names(text, len));
    }
    if config.enable_address {
        out.extend(detect_addresses(text, len));
    }

    out.sort_by(|a, b| a.start.cmp(&b.start).then((b.end - b.start).cmp(&(a.end - a.start))));
    out
}

/// Heuristic: two or three capitalized words in a row.
fn detect_names(text: &str, len: usize) -> Vec<PiiDetection> {
    static CELL: OnceLock<Regex> = OnceLock::new();
    let re = regex_cell(&CELL, r"\b[A-Z][a-z]+(?:\s[A-Z][a-z]+){1,2}\b");
    re.find_iter(text)
        .filter_map(|m| PiiDetection::new(PiiType::Name, m.as_str(), m.start(), m.end(), 0.4, len).ok())
        .collect()
}

/// Heuristic: a leading number followed by a short street-like suffix.
fn detect_addresses(text: &str, len: usize) -> Vec<PiiDetection> {
    static CELL: OnceLock<Regex> = OnceLock::new();
    let re = regex_cell(
        &CELL,
        r"\b\d{1,5}\s+[A-Za-z0-9.'\s]{2,40}\s(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr)\b",
    );
    re.find_iter(text)
        .filter_map(|m| PiiDetection::new(PiiType::Address, m.as_str(), m.start(), m.end(), 0.4, len).ok())
        .collect()
}

/// Rewrite `text`, replacing each chosen detection with `[<TYPE>_REDACTED]`.
///
/// Overlaps are resolved greedily: sort by `start` asc, length desc, and keep
/// the first interval that does not overlap an already-kept one. Non-redacted
/// spans keep their original bytes untouched.
pub fn redact(text: &str, detections: &[PiiDetection]) -> (String, BTreeSet<PiiType>) {
    let mut sorted: Vec<&PiiDetection> = detections.iter().collect();
    sorted.sort_by(|a, b| a.start.cmp(&b.start).then((b.end - b.start).cmp(&(a.end - a.start))));

    let mut chosen: Vec<&PiiDetection> = Vec::new();
    let mut cursor = 0usize;
    for d in sorted {
        if d.start >= cursor {
            chosen.push(d);
            cursor = d.end;
        }
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;
    let mut types = BTreeSet::new();
    for d in chosen {
        out.push_str(&text[last..d.start]);
        out.push_str(&format!("[{}_REDACTED]", d.kind.tag()));
        types.insert(d.kind);
        last = d.end;
    }
    out.push_str(&text[last..]);
    (out, types)
}
