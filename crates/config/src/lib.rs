//! aegis_config
//!
//! Validates an assistant configuration document: a JSON-level structural
//! check first, then a loose `serde` decode (fields default rather than
//! fail), then business rules layered on top. Warnings never invalidate a
//! config; errors do.

use aegis_modelaudit::{audit_model, Severity as ModelSeverity};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    pub id: String,
    #[serde(default)]
    pub identity: String,
    pub model: String,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub subagent: bool,
    pub max_tokens: Option<u64>,
    pub context_window: Option<u64>,
    #[serde(default)]
    pub fallbacks: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MemoryConfig {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PlaybookConfig {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PrivacyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub audit_log_path: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AssistantConfig {
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub forge: serde_json::Value,
    #[serde(default)]
    pub playbook: PlaybookConfig,
    #[serde(default)]
    pub privacy: PrivacyConfig,
    #[serde(default)]
    pub channels: serde_json::Value,
    #[serde(default)]
    pub tools: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub config: AssistantConfig,
}

fn model_id_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+/[A-Za-z0-9._-]+$").unwrap())
}

/// Structural pre-check: required keys present with the right JSON type.
/// Independent of the `serde` decode below; failures here become errors but
/// never prevent the decode from also running.
fn schema_errors(raw: &serde_json::Value) -> Vec<String> {
    let mut errors = Vec::new();
    let Some(obj) = raw.as_object() else {
        errors.push("config document must be a JSON object".to_string());
        return errors;
    };

    match obj.get("agents") {
        Some(serde_json::Value::Array(agents)) => {
            for (i, agent) in agents.iter().enumerate() {
                let Some(agent_obj) = agent.as_object() else {
                    errors.push(format!("agents[{i}] must be an object"));
                    continue;
                };
                for field in ["id", "model"] {
                    match agent_obj.get(field) {
                        Some(serde_json::Value::String(_)) => {}
                        Some(_) => errors.push(format!("agents[{i}].{field} must be a string")),
                        None => errors.push(format!("agents[{i}].{field} is required")),
                    }
                }
            }
        }
        Some(_) => errors.push("agents must be an array".to_string()),
        None => {} // agents defaults to empty; absence is not an error
    }

    errors
}

/// Validate a raw JSON config document. `home` is used to resolve
/// relative paths referenced by `memory`, `playbook`, and `privacy`.
pub fn validate(raw: &serde_json::Value, home: &Path) -> Result<ValidationResult, ConfigError> {
    let mut errors = schema_errors(raw);
    let mut warnings = Vec::new();

    let mut config: AssistantConfig = serde_json::from_value(raw.clone()).unwrap_or_default();

    let mut seen_ids: HashSet<String> = HashSet::new();
    for agent in &mut config.agents {
        if !seen_ids.insert(agent.id.clone()) {
            errors.push(format!("duplicate agent id: {}", agent.id));
        }

        if !agent.model.is_empty() && !model_id_re().is_match(&agent.model) {
            errors.push(format!("agent {}: model \"{}\" is not in provider/model form", agent.id, agent.model));
        } else if !agent.model.is_empty() {
            let report = audit_model(&agent.model);
            if matches!(report.overall_risk, Some(ModelSeverity::High)) {
                warnings.push(format!("agent {}: model \"{}\" is high-risk ({:?})", agent.id, agent.model, report.warnings));
            }
        }

        for fb in &agent.fallbacks {
            if !model_id_re().is_match(fb) {
                errors.push(format!("agent {}: fallback \"{}\" is not in provider/model form", agent.id, fb));
            }
        }

        if let (Some(max_tokens), Some(context_window)) = (agent.max_tokens, agent.context_window) {
            if max_tokens > context_window {
                warnings.push(format!(
                    "agent {}: maxTokens {} exceeds contextWindow {}, clamping",
                    agent.id, max_tokens, context_window
                ));
                agent.max_tokens = Some(context_window);
            }
        }
    }

    for (label, rel_path) in [
        ("memory.path", config.memory.path.as_deref()),
        ("playbook.path", config.playbook.path.as_deref()),
        ("privacy.audit_log_path", config.privacy.audit_log_path.as_deref()),
    ] {
        if let Some(rel) = rel_path {
            let resolved = home.join(rel);
            if !resolved.exists() {
                warnings.push(format!("{label} (\"{rel}\") does not exist under {}", home.display()));
            }
        }
    }

    Ok(ValidationResult { valid: errors.is_empty(), errors, warnings, config })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn home() -> TempDir {
        TempDir::new().unwrap()
    }

    #[test]
    fn minimal_valid_config_passes() {
        let raw = serde_json::json!({
            "agents": [{"id": "a1", "model": "openai/gpt-4o"}]
        });
        let result = validate(&raw, home().path()).unwrap();
        assert!(result.valid, "{:?}", result.errors);
    }

    #[test]
    fn missing_required_agent_field_is_an_error() {
        let raw = serde_json::json!({ "agents": [{"id": "a1"}] });
        let result = validate(&raw, home().path()).unwrap();
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("model")));
    }

    #[test]
    fn duplicate_agent_ids_is_an_error() {
        let raw = serde_json::json!({
            "agents": [
                {"id": "a1", "model": "openai/gpt-4o"},
                {"id": "a1", "model": "anthropic/claude-4-sonnet"},
            ]
        });
        let result = validate(&raw, home().path()).unwrap();
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("duplicate")));
    }

    #[test]
    fn max_tokens_clamped_to_context_window_with_warning() {
        let raw = serde_json::json!({
            "agents": [{"id": "a1", "model": "openai/gpt-4o", "maxTokens": 9000, "contextWindow": 4000}]
        });
        let result = validate(&raw, home().path()).unwrap();
        assert!(result.valid);
        assert!(result.warnings.iter().any(|w| w.contains("clamping")));
        assert_eq!(result.config.agents[0].max_tokens, Some(4000));
    }

    #[test]
    fn bad_model_format_is_an_error() {
        let raw = serde_json::json!({ "agents": [{"id": "a1", "model": "not-a-valid-model"}] });
        let result = validate(&raw, home().path()).unwrap();
        assert!(!result.valid);
    }

    #[test]
    fn missing_referenced_path_is_a_warning_not_an_error() {
        let raw = serde_json::json!({
            "agents": [],
            "memory": {"path": "does/not/exist"}
        });
        let result = validate(&raw, home().path()).unwrap();
        assert!(result.valid);
        assert!(result.warnings.iter().any(|w| w.contains("memory.path")));
    }
}
