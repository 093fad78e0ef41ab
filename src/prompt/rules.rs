//! Static rule table
//!
//! Named fragments of prompt text, each rendered at three verbosity levels.
//! Intents map to required/optional/forbidden category sets; the injector
//! renders required and optional fragments in order and substitutes the
//! `{{WORK_DIR}}` placeholder.

use serde::{Deserialize, Serialize};

use super::PromptMode;
use super::intent::IntentCategory;
use super::verbosity::Verbosity;

/// Placeholder replaced with the project working directory
pub const WORK_DIR_PLACEHOLDER: &str = "{{WORK_DIR}}";

/// A named fragment of prompt text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    WebcontainerConstraints,
    TechnologyPreferences,
    ArtifactCreation,
    CodeQuality,
    DatabaseSafety,
    DesignSystem,
    MobileAdaptation,
}

/// Which categories apply to one intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    pub required: Vec<RuleCategory>,
    pub optional: Vec<RuleCategory>,
    pub forbidden: Vec<RuleCategory>,
}

/// Look up the rule-category sets for a detected intent.
///
/// Unknown intent gets the default set; in build mode the default also pulls
/// in artifact and quality rules since the model will be writing files.
pub fn rules_for(intent: Option<IntentCategory>, mode: PromptMode) -> RuleSet {
    use RuleCategory::*;

    match intent {
        Some(IntentCategory::FixBug) => RuleSet {
            required: vec![WebcontainerConstraints, CodeQuality],
            optional: vec![TechnologyPreferences],
            forbidden: vec![DesignSystem],
        },
        Some(IntentCategory::CreateProject) => RuleSet {
            required: vec![WebcontainerConstraints, TechnologyPreferences, ArtifactCreation],
            optional: vec![CodeQuality, DesignSystem],
            forbidden: vec![],
        },
        Some(IntentCategory::AddFeature) => RuleSet {
            required: vec![WebcontainerConstraints, TechnologyPreferences, CodeQuality],
            optional: vec![ArtifactCreation, DesignSystem],
            forbidden: vec![],
        },
        Some(IntentCategory::Refactor) => RuleSet {
            required: vec![WebcontainerConstraints, CodeQuality],
            optional: vec![TechnologyPreferences],
            forbidden: vec![DesignSystem],
        },
        Some(IntentCategory::DesignUi) => RuleSet {
            required: vec![WebcontainerConstraints, DesignSystem],
            optional: vec![TechnologyPreferences, CodeQuality],
            forbidden: vec![DatabaseSafety],
        },
        Some(IntentCategory::DatabaseOps) => RuleSet {
            required: vec![WebcontainerConstraints, DatabaseSafety],
            optional: vec![TechnologyPreferences],
            forbidden: vec![DesignSystem],
        },
        Some(IntentCategory::Deploy) => RuleSet {
            required: vec![WebcontainerConstraints],
            optional: vec![TechnologyPreferences],
            forbidden: vec![ArtifactCreation, DesignSystem],
        },
        Some(IntentCategory::Discuss) => RuleSet {
            required: vec![WebcontainerConstraints],
            optional: vec![TechnologyPreferences],
            forbidden: vec![ArtifactCreation],
        },
        None => {
            let mut required = vec![WebcontainerConstraints, TechnologyPreferences];
            if mode == PromptMode::Build {
                required.push(ArtifactCreation);
                required.push(CodeQuality);
            }
            RuleSet {
                required,
                optional: vec![],
                forbidden: vec![],
            }
        }
    }
}

/// The text of one rule category at one verbosity level
pub fn rule_text(category: RuleCategory, verbosity: Verbosity) -> &'static str {
    use RuleCategory::*;
    use Verbosity::*;

    match (category, verbosity) {
        (WebcontainerConstraints, Minimal) => {
            "The app runs in an in-browser WebContainer: Node.js and web APIs only, no native \
             binaries, no Docker. All files live under {{WORK_DIR}}."
        }
        (WebcontainerConstraints, Standard) => {
            "The app runs in an in-browser WebContainer. Only Node.js and standard web APIs are \
             available: no native binaries, no system package manager, no Docker, and no \
             processes that outlive the page. Use npm for dependencies and keep every file \
             under {{WORK_DIR}}. Prefer packages with no native addons; anything requiring \
             node-gyp will not install."
        }
        (WebcontainerConstraints, Detailed) => {
            "The app runs in an in-browser WebContainer, a sandboxed Node.js environment inside \
             the user's tab. Constraints:\n\
             - Only Node.js and standard web APIs; no native binaries, no node-gyp addons, no \
             Docker, no system package manager.\n\
             - The filesystem is virtual and rooted at {{WORK_DIR}}; write all project files \
             there and use relative imports within the project.\n\
             - Servers must bind to the port the dev server assigns; never hardcode privileged \
             ports.\n\
             - Long-running background processes do not survive a page reload; persist anything \
             important to storage, not memory."
        }

        (TechnologyPreferences, Minimal) => {
            "Default stack: Vite + React + TypeScript, Tailwind for styling."
        }
        (TechnologyPreferences, Standard) => {
            "Default to Vite + React + TypeScript with Tailwind for styling unless the project \
             already uses something else. Keep the dependency footprint small; reach for a \
             library only when hand-rolling would be clearly worse."
        }
        (TechnologyPreferences, Detailed) => {
            "Technology choices, in order of preference:\n\
             - Build tooling: Vite. Do not introduce webpack or custom build scripts.\n\
             - UI: React function components with TypeScript; hooks over classes.\n\
             - Styling: Tailwind utility classes; extract a component before extracting CSS.\n\
             - State: component state first, then a small store (zustand) only when state is \
             genuinely shared.\n\
             - Keep the dependency footprint small and mainstream; avoid packages with native \
             addons or postinstall scripts."
        }

        (ArtifactCreation, Minimal) => {
            "Emit complete files as artifacts with full paths relative to {{WORK_DIR}}."
        }
        (ArtifactCreation, Standard) => {
            "When changing the project, emit complete files as artifacts: one file per artifact, \
             full path relative to {{WORK_DIR}}, entire file content, never a diff or an \
             ellipsis. Include every file the change touches."
        }
        (ArtifactCreation, Detailed) => {
            "File output rules:\n\
             - One file per artifact with its full path relative to {{WORK_DIR}}.\n\
             - Always the entire file content; never diffs, placeholders, or \"rest unchanged\" \
             ellipses.\n\
             - Include every file the change touches, including config and package.json when \
             dependencies change.\n\
             - Order artifacts so the project builds after each one is applied in sequence."
        }

        (CodeQuality, Minimal) => {
            "Keep components small and typed; handle errors at boundaries."
        }
        (CodeQuality, Standard) => {
            "Keep components small with typed props, hoist shared logic into hooks, and handle \
             errors where they can actually be presented to the user. Avoid premature \
             abstraction; duplicate once before extracting."
        }
        (CodeQuality, Detailed) => {
            "Code quality expectations:\n\
             - Small components with explicitly typed props; no `any` in exported signatures.\n\
             - Shared logic lives in hooks or plain modules, not copied between components.\n\
             - Errors are handled where they can be shown to the user; add an error boundary \
             around each route-level view.\n\
             - Loading and empty states are designed, not an afterthought.\n\
             - Avoid premature abstraction; duplicate once before extracting."
        }

        (DatabaseSafety, Minimal) => {
            "Database changes must be additive migrations; never destructive SQL."
        }
        (DatabaseSafety, Standard) => {
            "All schema changes go through additive migrations: no DROP, TRUNCATE, or column \
             type rewrites on tables with data. Enable row-level security on new tables and \
             scope policies to the authenticated user."
        }
        (DatabaseSafety, Detailed) => {
            "Database rules:\n\
             - Every schema change is an additive migration; never DROP, TRUNCATE, or rewrite a \
             column type on a table holding data.\n\
             - New tables get row-level security enabled immediately, with policies scoped to \
             the authenticated user.\n\
             - Never write raw SQL against production from the client; all access goes through \
             the generated client with parameterized queries.\n\
             - Seed data belongs in a separate, re-runnable script."
        }

        (DesignSystem, Minimal) => {
            "Follow the existing spacing scale and color tokens; keep contrast accessible."
        }
        (DesignSystem, Standard) => {
            "Stay on the project's spacing scale and color tokens rather than inventing one-off \
             values. Maintain WCAG AA contrast, visible focus states, and responsive behavior \
             from 320px up."
        }
        (DesignSystem, Detailed) => {
            "Design rules:\n\
             - Use the project's spacing scale and color tokens; no one-off pixel values or hex \
             colors outside the token set.\n\
             - Typography: at most two font families, with a deliberate size ramp.\n\
             - Accessibility: WCAG AA contrast, visible focus states, touch targets of at least \
             44px, semantic landmarks.\n\
             - Responsive from 320px up; test the narrowest breakpoint first.\n\
             - Motion is subtle and respects prefers-reduced-motion."
        }

        (MobileAdaptation, Minimal) => {
            "Mobile project: touch-first interactions, safe-area insets, no hover-only UI."
        }
        (MobileAdaptation, Standard) => {
            "This is a mobile project: design touch-first with 44px minimum targets, respect \
             safe-area insets, and never gate functionality behind hover. Keep the main action \
             reachable with one thumb."
        }
        (MobileAdaptation, Detailed) => {
            "Mobile adaptation rules:\n\
             - Touch-first interactions with 44px minimum targets; no hover-only affordances.\n\
             - Respect safe-area insets on notched devices for fixed headers and footers.\n\
             - Primary actions sit in the bottom third of the screen, reachable with one thumb.\n\
             - Virtual keyboard: inputs scroll into view and the layout does not jump when it \
             opens.\n\
             - Test at 320px width; horizontal scrolling is a bug."
        }
    }
}
