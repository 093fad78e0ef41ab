//! Verbosity selection for generated prompts
//!
//! Precedence, strictly decreasing: explicit override > provider preference >
//! detected-intent complexity > token budget. Later constraints can only
//! lower verbosity, never raise it.

use serde::{Deserialize, Serialize};

use super::intent::{Complexity, Confidence, DetectedIntent, IntentCategory};
use super::providers::ProviderProfile;

/// Budget below which only minimal verbosity fits
const MINIMAL_BUDGET_TOKENS: u32 = 4000;

/// Budget below which detailed verbosity never fits
const STANDARD_BUDGET_TOKENS: u32 = 8000;

/// How much instructional text a generated prompt carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Minimal,
    Standard,
    Detailed,
}

impl Verbosity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Standard => "standard",
            Self::Detailed => "detailed",
        }
    }

    /// One level more text; detailed is the ceiling
    pub fn step_up(self) -> Self {
        match self {
            Self::Minimal => Self::Standard,
            Self::Standard | Self::Detailed => Self::Detailed,
        }
    }

    /// The rebuild target when a prompt does not fit its budget:
    /// detailed drops to standard, anything else drops to minimal
    pub fn step_down(self) -> Self {
        match self {
            Self::Detailed => Self::Standard,
            Self::Standard | Self::Minimal => Self::Minimal,
        }
    }
}

impl std::fmt::Display for Verbosity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pick the verbosity for one request.
///
/// An explicit `force` short-circuits everything else.
pub fn determine(
    provider: &ProviderProfile,
    intent: Option<&DetectedIntent>,
    max_tokens: Option<u32>,
    force: Option<Verbosity>,
) -> Verbosity {
    if let Some(forced) = force {
        return forced;
    }

    let mut verbosity = provider.preferred_verbosity;

    if let Some(intent) = intent {
        if intent.confidence == Confidence::High && intent.context.complexity == Complexity::Simple
        {
            verbosity = Verbosity::Minimal;
        } else if intent.context.complexity == Complexity::Complex
            || intent.confidence == Confidence::Low
        {
            verbosity = verbosity.step_up();
        }

        // Bug fixes are assumed simple; this wins over the escalation above.
        if intent.category == IntentCategory::FixBug && intent.confidence == Confidence::High {
            verbosity = Verbosity::Minimal;
        }
    }

    if let Some(budget) = max_tokens {
        if budget < MINIMAL_BUDGET_TOKENS {
            verbosity = Verbosity::Minimal;
        } else if budget < STANDARD_BUDGET_TOKENS {
            verbosity = verbosity.min(Verbosity::Standard);
        }
    }

    verbosity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::intent::IntentContext;
    use crate::prompt::providers;

    fn intent(category: IntentCategory, confidence: Confidence, complexity: Complexity) -> DetectedIntent {
        DetectedIntent {
            category,
            confidence,
            context: IntentContext {
                requires_database: false,
                requires_design: false,
                complexity,
            },
        }
    }

    #[test]
    fn test_force_short_circuits_everything() {
        let provider = providers::lookup("OpenAI");
        let low = intent(IntentCategory::CreateProject, Confidence::Low, Complexity::Complex);
        let chosen = determine(provider, Some(&low), Some(1000), Some(Verbosity::Detailed));
        assert_eq!(chosen, Verbosity::Detailed);
    }

    #[test]
    fn test_tight_budget_forces_minimal() {
        let provider = providers::lookup("Anthropic");
        let low = intent(IntentCategory::CreateProject, Confidence::Low, Complexity::Complex);
        // Low confidence alone would escalate, but the budget wins.
        assert_eq!(determine(provider, Some(&low), Some(3999), None), Verbosity::Minimal);
        assert_eq!(determine(provider, None, Some(3000), None), Verbosity::Minimal);
    }

    #[test]
    fn test_mid_budget_caps_at_standard() {
        let provider = providers::lookup("Anthropic");
        assert_eq!(determine(provider, None, Some(7999), None), Verbosity::Standard);
    }

    #[test]
    fn test_high_confidence_simple_forces_minimal() {
        let provider = providers::lookup("OpenAI");
        let simple = intent(IntentCategory::AddFeature, Confidence::High, Complexity::Simple);
        assert_eq!(determine(provider, Some(&simple), None, None), Verbosity::Minimal);
    }

    #[test]
    fn test_complex_or_low_confidence_steps_up() {
        let provider = providers::lookup("OpenAI"); // prefers standard
        let complex = intent(IntentCategory::AddFeature, Confidence::High, Complexity::Complex);
        assert_eq!(determine(provider, Some(&complex), None, None), Verbosity::Detailed);

        let low = intent(IntentCategory::AddFeature, Confidence::Low, Complexity::Moderate);
        assert_eq!(determine(provider, Some(&low), None, None), Verbosity::Detailed);
    }

    #[test]
    fn test_high_confidence_bug_fix_overrides_escalation() {
        let provider = providers::lookup("OpenAI");
        let bug = intent(IntentCategory::FixBug, Confidence::High, Complexity::Complex);
        assert_eq!(determine(provider, Some(&bug), None, None), Verbosity::Minimal);
    }

    #[test]
    fn test_step_down_ladder() {
        assert_eq!(Verbosity::Detailed.step_down(), Verbosity::Standard);
        assert_eq!(Verbosity::Standard.step_down(), Verbosity::Minimal);
        assert_eq!(Verbosity::Minimal.step_down(), Verbosity::Minimal);
    }

    #[test]
    fn test_step_up_never_skips_to_detailed() {
        assert_eq!(Verbosity::Minimal.step_up(), Verbosity::Standard);
        assert_eq!(Verbosity::Standard.step_up(), Verbosity::Detailed);
        assert_eq!(Verbosity::Detailed.step_up(), Verbosity::Detailed);
    }
}
