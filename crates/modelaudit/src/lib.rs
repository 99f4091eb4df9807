//! aegis_modelaudit
//!
//! Static, offline advisory over a `provider/model` identifier: flags
//! deprecated, weak, small-parameter, or unrecognized-provider choices
//! before a request ever goes out. Never calls out to a network.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const KNOWN_PROVIDERS: &[&str] = &[
    "openai", "anthropic", "ollama", "google", "meta", "mistral", "cohere", "voyage", "local", "lmstudio",
];

const DEPRECATED_PATTERNS: &[&str] = &["text-davinci", "code-davinci", "gpt-3", "claude-1", "claude-2.0"];
const WEAK_PATTERNS: &[&str] = &["gpt-3.5", "babbage", "ada", "curie"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelWarning {
    pub category: String,
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelAuditReport {
    pub warnings: Vec<ModelWarning>,
    pub overall_risk: Option<Severity>,
    pub is_known_provider: bool,
    pub parameters_billions: Option<f64>,
}

fn param_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)b").unwrap())
}

fn extract_parameters_billions(model: &str) -> Option<f64> {
    param_re().captures(model).and_then(|c| c.get(1)).and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Audit a `"provider/model"` identifier.
pub fn audit_model(identifier: &str) -> ModelAuditReport {
    let mut warnings = Vec::new();

    let parts: Vec<&str> = identifier.splitn(2, '/').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        warnings.push(ModelWarning {
            category: "format".to_string(),
            message: format!("\"{identifier}\" is not in provider/model form"),
            severity: Severity::Low,
        });
        return ModelAuditReport {
            warnings,
            overall_risk: Some(Severity::Low),
            is_known_provider: false,
            parameters_billions: None,
        };
    }

    let (provider, model) = (parts[0], parts[1]);
    let provider_lower = provider.to_lowercase();
    let model_lower = model.to_lowercase();

    let is_known_provider = KNOWN_PROVIDERS.contains(&provider_lower.as_str());
    if !is_known_provider {
        warnings.push(ModelWarning {
            category: "unknown-provider".to_string(),
            message: format!("\"{provider}\" is not a recognized provider"),
            severity: Severity::Medium,
        });
    }

    if DEPRECATED_PATTERNS.iter().any(|p| model_lower.contains(p)) {
        warnings.push(ModelWarning {
            category: "deprecated".to_string(),
            message: format!("\"{model}\" is a deprecated model"),
            severity: Severity::High,
        });
    }

    if WEAK_PATTERNS.iter().any(|p| model_lower.contains(p)) || model_lower.contains("mini") {
        let severity = if model_lower.contains("mini") { Severity::Low } else { Severity::Medium };
        warnings.push(ModelWarning {
            category: "weak-model".to_string(),
            message: format!("\"{model}\" is a known-weak or lightweight model"),
            severity,
        });
    }

    let parameters_billions = extract_parameters_billions(&model_lower);
    if let Some(params) = parameters_billions {
        if params < 7.0 {
            let severity = if params < 1.0 {
                Severity::High
            } else if params < 3.0 {
                Severity::Medium
            } else {
                Severity::Low
            };
            warnings.push(ModelWarning {
                category: "small-model".to_string(),
                message: format!("\"{model}\" has only ~{params}B parameters"),
                severity,
            });
        }
    }

    let overall_risk = warnings.iter().map(|w| w.severity).max();

    ModelAuditReport { warnings, overall_risk, is_known_provider, parameters_billions }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_identifier_flags_format_warning() {
        let report = audit_model("not-a-valid-identifier");
        assert!(report.warnings.iter().any(|w| w.category == "format"));
    }

    #[test]
    fn unknown_provider_is_flagged() {
        let report = audit_model("acme/gpt-whatever");
        assert!(!report.is_known_provider);
        assert!(report.warnings.iter().any(|w| w.category == "unknown-provider"));
    }

    #[test]
    fn deprecated_model_is_high_severity() {
        let report = audit_model("openai/text-davinci-003");
        assert_eq!(report.overall_risk, Some(Severity::High));
    }

    #[test]
    fn small_model_severity_scales_with_size() {
        let tiny = audit_model("meta/llama-0.5b");
        let small = audit_model("meta/llama-2b");
        let medium = audit_model("meta/llama-5b");
        assert_eq!(tiny.overall_risk, Some(Severity::High));
        assert_eq!(small.overall_risk, Some(Severity::Medium));
        assert_eq!(medium.overall_risk, Some(Severity::Low));
    }

    #[test]
    fn known_large_model_has_no_warnings() {
        let report = audit_model("anthropic/claude-4-sonnet");
        assert!(report.warnings.is_empty());
        assert!(report.overall_risk.is_none());
    }
}
