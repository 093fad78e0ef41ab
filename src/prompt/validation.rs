//! Prompt content validation
//!
//! Informational checks over a generated prompt. Findings annotate the
//! prompt's metadata and never block generation.

use serde::Serialize;

use super::rules::{RuleCategory, WORK_DIR_PLACEHOLDER};

/// How serious a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// One validation finding attached to prompt metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationFinding {
    pub severity: Severity,
    pub message: String,
}

impl ValidationFinding {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
        }
    }
}

/// Characters above which a prompt is worth flagging as long
const LONG_PROMPT_CHARS: usize = 24_000;

/// Validate generated content against the rule set that went into it
pub fn validate(content: &str, included: &[RuleCategory]) -> Vec<ValidationFinding> {
    let mut findings = Vec::new();

    if content.trim().is_empty() {
        findings.push(ValidationFinding::error("generated prompt is empty"));
        return findings;
    }

    if content.contains(WORK_DIR_PLACEHOLDER) || content.contains("{{") {
        findings.push(ValidationFinding::error(
            "unsubstituted placeholder left in prompt content",
        ));
    }

    if included.is_empty() {
        findings.push(ValidationFinding::warning(
            "no rule categories made it into the prompt",
        ));
    }

    if content.chars().count() > LONG_PROMPT_CHARS {
        findings.push(ValidationFinding::info(format!(
            "prompt is unusually long ({} chars)",
            content.chars().count()
        )));
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_content_has_no_findings() {
        let findings = validate(
            "You are an expert app builder.",
            &[RuleCategory::WebcontainerConstraints],
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn test_empty_content_is_an_error() {
        let findings = validate("   ", &[]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Error);
    }

    #[test]
    fn test_leftover_placeholder_is_an_error() {
        let findings = validate(
            "write files under {{WORK_DIR}}",
            &[RuleCategory::ArtifactCreation],
        );
        assert!(findings
            .iter()
            .any(|f| f.severity == Severity::Error && f.message.contains("placeholder")));
    }

    #[test]
    fn test_no_rules_is_only_a_warning() {
        let findings = validate("some content", &[]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
    }

    #[test]
    fn test_long_prompt_is_informational() {
        let long = "x".repeat(LONG_PROMPT_CHARS + 1);
        let findings = validate(&long, &[RuleCategory::CodeQuality]);
        assert!(findings.iter().any(|f| f.severity == Severity::Info));
    }
}
