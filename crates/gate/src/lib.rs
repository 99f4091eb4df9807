//! aegis_gate
//!
//! The privacy gate is the in-process chokepoint every outbound model call
//! must pass through. For each message it runs PII detection, redacts what
//! it finds, and appends a single audit entry — unless the destination is a
//! local-class provider, in which case the call is let through unmodified
//! and no audit entry is written at all.

use aegis_audit::{AuditAppender, AuditEntry, AuditError, Direction};
use aegis_pii::{detect, redact, DetectorConfig, PiiDetection, PiiType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("audit log error: {0}")]
    Audit(#[from] AuditError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundRequest {
    pub provider: String,
    pub model: String,
    pub endpoint: String,
    pub session_id: String,
    pub channel: String,
    pub messages: Vec<GateMessage>,
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    /// When false, the gate behaves as if every provider were local: no
    /// detection, no redaction, but an audit id is still minted.
    pub enabled: bool,
    /// Case-insensitive provider names exempt from gating entirely (no
    /// detection, no redaction, no audit entry at all).
    pub local_providers: BTreeSet<String>,
    pub detectors: DetectorConfig,
}

impl Default for GateConfig {
    fn default() -> Self {
        let mut local_providers = BTreeSet::new();
        for p in ["ollama", "lmstudio", "local", "llamacpp"] {
            local_providers.insert(p.to_string());
        }
        Self { enabled: true, local_providers, detectors: DetectorConfig::default() }
    }
}

impl GateConfig {
    fn is_local(&self, provider: &str) -> bool {
        self.local_providers.contains(&provider.to_lowercase())
    }
}

#[derive(Debug, Clone)]
pub struct GateOutcome {
    pub sanitized: OutboundRequest,
    pub detections: Vec<PiiDetection>,
    pub was_redacted: bool,
    pub audit_id: Option<String>,
}

/// Character-count / 4 estimator, rounded up; matches the context
/// assembler's token estimate so the two subsystems agree on cost.
fn estimate_tokens(text: &str) -> u64 {
    ((text.len() as u64) + 3) / 4
}

/// Gate a single outbound request. `now_ms` and `started` let callers supply
/// their own clock (no `Instant::now()`/wall-clock call is made internally),
/// which keeps the function fully deterministic for tests.
pub fn gate_outbound(
    request: OutboundRequest,
    audit: Option<&mut AuditAppender>,
    config: &GateConfig,
    now_ms: u64,
    elapsed: std::time::Duration,
) -> Result<GateOutcome, GateError> {
    if config.is_local(&request.provider) {
        tracing::debug!(provider = %request.provider, "gate bypass: local provider");
        return Ok(GateOutcome { sanitized: request, detections: vec![], was_redacted: false, audit_id: None });
    }

    if !config.enabled {
        let audit_id = match audit {
            Some(a) => Some(mint_audit_id(a, &request, 0, false, BTreeSet::new(), now_ms, elapsed, true)?),
            None => None,
        };
        return Ok(GateOutcome { sanitized: request, detections: vec![], was_redacted: false, audit_id });
    }

    let mut all_detections = Vec::new();
    let mut redacted_types = BTreeSet::new();
    let mut sanitized_messages = Vec::with_capacity(request.messages.len());

    for msg in &request.messages {
        let dets = detect(&msg.content, &config.detectors);
        let (content, types) = redact(&msg.content, &dets);
        redacted_types.extend(types);
        all_detections.extend(dets);
        sanitized_messages.push(GateMessage { role: msg.role.clone(), content });
    }

    let pii_detected = all_detections.len() as u32;
    let was_redacted = pii_detected > 0;

    let sanitized = OutboundRequest { messages: sanitized_messages, ..request };

    let audit_id = match audit {
        Some(a) => Some(mint_audit_id(
            a,
            &sanitized,
            pii_detected,
            was_redacted,
            redacted_types,
            now_ms,
            elapsed,
            true,
        )?),
        None => None,
    };

    tracing::info!(
        provider = %sanitized.provider,
        pii_detected,
        was_redacted,
        "gated outbound call"
    );

    Ok(GateOutcome { sanitized, detections: all_detections, was_redacted, audit_id })
}

#[allow(clippy::too_many_arguments)]
fn mint_audit_id(
    audit: &mut AuditAppender,
    request: &OutboundRequest,
    pii_detected: u32,
    pii_redacted: bool,
    redacted_types: BTreeSet<PiiType>,
    timestamp_ms: u64,
    elapsed: std::time::Duration,
    success: bool,
) -> Result<String, GateError> {
    let estimated_tokens: u64 = request.messages.iter().map(|m| estimate_tokens(&m.content)).sum();
    let record = audit.append(AuditEntry {
        timestamp_ms,
        provider: request.provider.clone(),
        model: request.model.clone(),
        endpoint: request.endpoint.clone(),
        direction: Direction::Outbound,
        pii_detected,
        pii_redacted,
        redacted_types,
        estimated_tokens,
        latency_ms: elapsed.as_millis() as u64,
        session_id: request.session_id.clone(),
        channel: request.channel.clone(),
        success,
    })?;
    Ok(record.hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn req(provider: &str, content: &str) -> OutboundRequest {
        OutboundRequest {
            provider: provider.into(),
            model: "gpt-4o".into(),
            endpoint: "/v1/chat/completions".into(),
            session_id: "sess-1".into(),
            channel: "cli".into(),
            messages: vec![GateMessage { role: "user".into(), content: content.into() }],
        }
    }

    #[test]
    fn cloud_call_with_pii_is_redacted_and_audited() {
        let tmp = std::env::temp_dir().join(format!("aegis_gate_test_{}.jsonl", std::process::id()));
        let _ = std::fs::remove_file(&tmp);
        let mut audit = AuditAppender::open(&tmp).unwrap();

        let outcome = gate_outbound(
            req("openai", "My SSN is 123-45-6789 and email is test@example.com"),
            Some(&mut audit),
            &GateConfig::default(),
            1,
            Duration::from_millis(5),
        )
        .unwrap();

        assert_eq!(outcome.detections.len(), 2);
        assert!(outcome.was_redacted);
        assert!(outcome.audit_id.is_some());
        assert!(!outcome.sanitized.messages[0].content.contains("123-45-6789"));
        assert!(!outcome.sanitized.messages[0].content.contains("test@example.com"));

        let entries = aegis_audit::get_entries(&tmp).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].pii_redacted);
        let _ = std::fs::remove_file(&tmp);
    }

    #[test]
    fn local_provider_bypasses_gate_entirely() {
        let tmp = std::env::temp_dir().join(format!("aegis_gate_local_{}.jsonl", std::process::id()));
        let _ = std::fs::remove_file(&tmp);
        let mut audit = AuditAppender::open(&tmp).unwrap();

        let outcome = gate_outbound(
            req("ollama", "My SSN is 123-45-6789"),
            Some(&mut audit),
            &GateConfig::default(),
            1,
            Duration::from_millis(1),
        )
        .unwrap();

        assert!(outcome.detections.is_empty());
        assert!(outcome.audit_id.is_none());
        assert_eq!(outcome.sanitized.messages[0].content, "My SSN is 123-45-6789");
        assert!(aegis_audit::get_entries(&tmp).unwrap().is_empty());
        let _ = std::fs::remove_file(&tmp);
    }

    #[test]
    fn no_pii_still_writes_audit_entry_for_cloud_provider() {
        let tmp = std::env::temp_dir().join(format!("aegis_gate_clean_{}.jsonl", std::process::id()));
        let _ = std::fs::remove_file(&tmp);
        let mut audit = AuditAppender::open(&tmp).unwrap();

        let outcome = gate_outbound(
            req("anthropic", "hello there"),
            Some(&mut audit),
            &GateConfig::default(),
            1,
            Duration::from_millis(1),
        )
        .unwrap();

        assert!(!outcome.was_redacted);
        assert!(outcome.audit_id.is_some());
        let _ = std::fs::remove_file(&tmp);
    }
}
