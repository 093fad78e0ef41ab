//! Provider registry
//!
//! Maps a model provider's name to its category, preferred verbosity, and
//! token-optimization profile. Unknown names resolve to a generic profile
//! rather than failing; the lookup never errors.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::verbosity::Verbosity;

/// Coarse provider classification attached to prompt metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderCategory {
    OpenAi,
    Anthropic,
    Google,
    OpenSource,
    Generic,
}

/// How aggressively to trim a prompt for this provider under a token budget
#[derive(Debug, Clone, Copy)]
pub struct OptimizationProfile {
    /// Fraction of the prompt the provider is willing to lose; zero disables
    /// budget trimming entirely
    pub reduction_target: f32,
    /// Section names dropped first when over budget
    pub excluded_sections: &'static [&'static str],
}

/// Everything prompt generation needs to know about a provider
#[derive(Debug, Clone, Copy)]
pub struct ProviderProfile {
    pub category: ProviderCategory,
    pub preferred_verbosity: Verbosity,
    pub optimization: OptimizationProfile,
}

static OPENAI: ProviderProfile = ProviderProfile {
    category: ProviderCategory::OpenAi,
    preferred_verbosity: Verbosity::Standard,
    optimization: OptimizationProfile {
        reduction_target: 0.3,
        excluded_sections: &["design", "mobile"],
    },
};

static ANTHROPIC: ProviderProfile = ProviderProfile {
    category: ProviderCategory::Anthropic,
    preferred_verbosity: Verbosity::Detailed,
    optimization: OptimizationProfile {
        reduction_target: 0.2,
        excluded_sections: &["optional_rules"],
    },
};

static GOOGLE: ProviderProfile = ProviderProfile {
    category: ProviderCategory::Google,
    preferred_verbosity: Verbosity::Standard,
    optimization: OptimizationProfile {
        reduction_target: 0.3,
        excluded_sections: &["design"],
    },
};

static OPEN_SOURCE: ProviderProfile = ProviderProfile {
    category: ProviderCategory::OpenSource,
    preferred_verbosity: Verbosity::Minimal,
    optimization: OptimizationProfile {
        reduction_target: 0.5,
        excluded_sections: &["optional_rules", "design", "mobile"],
    },
};

static GENERIC: ProviderProfile = ProviderProfile {
    category: ProviderCategory::Generic,
    preferred_verbosity: Verbosity::Standard,
    optimization: OptimizationProfile {
        reduction_target: 0.25,
        excluded_sections: &["optional_rules"],
    },
};

static REGISTRY: Lazy<HashMap<&'static str, &'static ProviderProfile>> = Lazy::new(|| {
    HashMap::from([
        ("openai", &OPENAI),
        ("gpt", &OPENAI),
        ("anthropic", &ANTHROPIC),
        ("claude", &ANTHROPIC),
        ("google", &GOOGLE),
        ("gemini", &GOOGLE),
        ("mistral", &OPEN_SOURCE),
        ("llama", &OPEN_SOURCE),
        ("deepseek", &OPEN_SOURCE),
    ])
});

/// Resolve a provider name to its profile.
///
/// Matching is case-insensitive and tolerant of model-style names
/// ("gpt-4.1", "claude-sonnet"): an exact registry hit wins, then a
/// substring match, then the generic default.
pub fn lookup(provider_name: &str) -> &'static ProviderProfile {
    let normalized = provider_name.trim().to_lowercase();

    if let Some(profile) = REGISTRY.get(normalized.as_str()) {
        return profile;
    }
    for (key, profile) in REGISTRY.iter() {
        if normalized.contains(key) {
            return profile;
        }
    }
    &GENERIC
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_lookup() {
        assert_eq!(lookup("OpenAI").category, ProviderCategory::OpenAi);
        assert_eq!(lookup("anthropic").category, ProviderCategory::Anthropic);
    }

    #[test]
    fn test_model_style_names_resolve() {
        assert_eq!(lookup("gpt-4.1-mini").category, ProviderCategory::OpenAi);
        assert_eq!(lookup("claude-sonnet-4").category, ProviderCategory::Anthropic);
        assert_eq!(lookup("Llama-3.3-70B").category, ProviderCategory::OpenSource);
    }

    #[test]
    fn test_unknown_name_falls_back_to_generic() {
        let profile = lookup("totally-new-lab");
        assert_eq!(profile.category, ProviderCategory::Generic);
        assert!(profile.optimization.reduction_target > 0.0);
    }

    #[test]
    fn test_profiles_expose_droppable_sections() {
        let profile = lookup("OpenAI");
        assert!(profile.optimization.excluded_sections.contains(&"design"));
    }
}
