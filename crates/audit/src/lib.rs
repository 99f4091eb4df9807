//! aegis_audit
//!
//! Append-only, hash-chained JSON Lines audit log for the privacy gate.
//! Every record embeds the hash of its predecessor, so `verify_log` can
//! detect any line that was edited, reordered, or dropped after the fact.

use aegis_common::sha256_canonical_json;
use aegis_pii::PiiType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("canonical json error: {0}")]
    Canon(#[from] aegis_common::CanonError),
    #[error("hash mismatch at line {line}: expected {expected}, got {got}")]
    HashMismatch { line: usize, expected: String, got: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outbound,
    Inbound,
}

/// One gated call, as recorded in the log. Never mutated after append.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub timestamp_ms: u64,
    pub provider: String,
    pub model: String,
    pub endpoint: String,
    pub direction: Direction,
    pub pii_detected: u32,
    pub pii_redacted: bool,
    pub redacted_types: BTreeSet<PiiType>,
    pub estimated_tokens: u64,
    pub latency_ms: u64,
    pub session_id: String,
    pub channel: String,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub prev_hash: String,
    pub hash: String,
    pub entry: AuditEntry,
}

#[derive(Debug, Clone, Serialize)]
struct HashPayload<'a> {
    prev_hash: &'a str,
    entry: &'a AuditEntry,
}

pub fn genesis_hash() -> String {
    "sha256:0000000000000000000000000000000000000000000000000000000000000000".to_string()
}

pub fn compute_record_hash(prev_hash: &str, entry: &AuditEntry) -> Result<String, AuditError> {
    let payload = HashPayload { prev_hash, entry };
    Ok(sha256_canonical_json(&payload)?)
}

/// Single-writer append handle. Callers should keep exactly one of these
/// alive per audit log file within a process.
pub struct AuditAppender {
    file: File,
    last_hash: String,
}

impl AuditAppender {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let last_hash = last_hash_of(path)?.unwrap_or_else(genesis_hash);
        Ok(Self { file, last_hash })
    }

    pub fn append(&mut self, entry: AuditEntry) -> Result<AuditRecord, AuditError> {
        let prev_hash = self.last_hash.clone();
        let hash = compute_record_hash(&prev_hash, &entry)?;
        let record = AuditRecord { prev_hash, hash: hash.clone(), entry };
        let line = serde_json::to_string(&record)?;
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.file.flush()?;
        self.last_hash = hash;
        Ok(record)
    }
}

fn last_hash_of(path: &Path) -> Result<Option<String>, AuditError> {
    if !path.exists() {
        return Ok(None);
    }
    let mut last = None;
    for rec in read_records(path)? {
        last = Some(rec.hash);
    }
    Ok(last)
}

fn read_records(path: impl AsRef<Path>) -> Result<Vec<AuditRecord>, AuditError> {
    let f = File::open(path)?;
    let reader = BufReader::new(f);
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        out.push(serde_json::from_str(&line)?);
    }
    Ok(out)
}

/// Load every entry in the log, in append order.
pub fn get_entries(path: impl AsRef<Path>) -> Result<Vec<AuditEntry>, AuditError> {
    Ok(read_records(path)?.into_iter().map(|r| r.entry).collect())
}

/// Replay the hash chain; on success return the final hash, else the first
/// break found (expected vs. actual prev/self hash).
pub fn verify_log(path: impl AsRef<Path>) -> Result<String, AuditError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(genesis_hash());
    }
    let f = File::open(path)?;
    let reader = BufReader::new(f);
    let mut expected_prev = genesis_hash();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let rec: AuditRecord = serde_json::from_str(&line)?;
        if rec.prev_hash != expected_prev {
            return Err(AuditError::HashMismatch { line: line_no, expected: expected_prev, got: rec.prev_hash });
        }
        let computed = compute_record_hash(&rec.prev_hash, &rec.entry)?;
        if computed != rec.hash {
            return Err(AuditError::HashMismatch { line: line_no, expected: computed, got: rec.hash });
        }
        expected_prev = rec.hash;
    }

    Ok(expected_prev)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PrivacyScore {
    pub total_calls: u64,
    pub pii_caught: u64,
    pub redaction_rate: f64,
    pub score: u8,
}

/// Aggregate outbound-call redaction coverage across a set of entries.
pub fn privacy_score(entries: &[AuditEntry]) -> PrivacyScore {
    let outbound: Vec<&AuditEntry> = entries.iter().filter(|e| e.direction == Direction::Outbound).collect();
    let total_calls = outbound.len() as u64;
    let pii_caught = outbound.iter().filter(|e| e.pii_detected > 0).count() as u64;
    let redacted = outbound.iter().filter(|e| e.pii_detected > 0 && e.pii_redacted).count() as u64;

    let redaction_rate = if pii_caught > 0 { redacted as f64 / pii_caught as f64 } else { 1.0 };
    let score = if pii_caught > 0 { (redaction_rate * 100.0).round() as u8 } else { 100 };

    PrivacyScore { total_calls, pii_caught, redaction_rate, score }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pii_detected: u32, pii_redacted: bool) -> AuditEntry {
        AuditEntry {
            timestamp_ms: 1,
            provider: "openai".into(),
            model: "gpt-4o".into(),
            endpoint: "/v1/chat/completions".into(),
            direction: Direction::Outbound,
            pii_detected,
            pii_redacted,
            redacted_types: BTreeSet::new(),
            estimated_tokens: 10,
            latency_ms: 5,
            session_id: "s1".into(),
            channel: "cli".into(),
            success: true,
        }
    }

    #[test]
    fn hash_chain_verifies_and_detects_tamper() {
        let tmp = std::env::temp_dir().join(format!("aegis_audit_test_{}.jsonl", std::process::id()));
        let _ = std::fs::remove_file(&tmp);

        let mut app = AuditAppender::open(&tmp).unwrap();
        app.append(entry(2, true)).unwrap();
        app.append(entry(0, false)).unwrap();

        let last = verify_log(&tmp).unwrap();
        assert!(last.starts_with("sha256:"));

        let mut lines: Vec<String> = std::fs::read_to_string(&tmp).unwrap().lines().map(String::from).collect();
        let mut rec: AuditRecord = serde_json::from_str(&lines[0]).unwrap();
        rec.entry.pii_detected = 99;
        lines[0] = serde_json::to_string(&rec).unwrap();
        std::fs::write(&tmp, lines.join("\n") + "\n").unwrap();

        assert!(verify_log(&tmp).is_err());
        let _ = std::fs::remove_file(&tmp);
    }

    #[test]
    fn privacy_score_all_redacted_is_100() {
        let entries = vec![entry(2, true), entry(1, true), entry(0, false)];
        let score = privacy_score(&entries);
        assert_eq!(score.total_calls, 3);
        assert_eq!(score.pii_caught, 2);
        assert_eq!(score.score, 100);
    }

    #[test]
    fn privacy_score_partial_redaction() {
        let entries = vec![entry(2, true), entry(1, false)];
        let score = privacy_score(&entries);
        assert_eq!(score.pii_caught, 2);
        assert_eq!(score.score, 50);
    }
}
