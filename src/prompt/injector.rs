//! Prompt assembly
//!
//! Builds the system prompt for one request: picks a verbosity, renders the
//! intent's rule fragments, injects context-specific sections, and trims to
//! the token budget by dropping the provider's excluded sections and, when
//! that is not enough, rebuilding one verbosity level down.
//!
//! Pure function of its inputs plus the static rule/provider tables: no I/O,
//! identical inputs produce byte-identical output.

use tracing::debug;

use super::intent::{Complexity, DetectedIntent, IntentCategory};
use super::providers::{self, ProviderCategory};
use super::rules::{self, RuleCategory, WORK_DIR_PLACEHOLDER};
use super::validation::{self, ValidationFinding};
use super::verbosity::{self, Verbosity};

/// HTML elements the frontend renders in chat messages
const ALLOWED_MESSAGE_ELEMENTS: &str =
    "a, b, blockquote, br, code, em, h1, h2, h3, i, li, ol, p, pre, strong, ul";

/// Whether the prompt targets a conversation or a build turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    Discuss,
    Build,
}

/// What kind of app the project is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectType {
    #[default]
    Web,
    Mobile,
}

/// Live database connection state, supplied by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseContext {
    pub connected: bool,
    pub project_selected: bool,
    pub credentials_present: bool,
}

/// Design context for UI-heavy turns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesignContext {
    pub new_project: bool,
    pub target_complexity: Complexity,
}

/// Everything prompt generation needs for one request
#[derive(Debug, Clone)]
pub struct PromptOptions {
    pub provider_name: String,
    pub detected_intent: Option<DetectedIntent>,
    pub chat_mode: PromptMode,
    pub max_tokens: Option<u32>,
    pub force_verbosity: Option<Verbosity>,
    pub work_dir: String,
    pub database: Option<DatabaseContext>,
    pub design: Option<DesignContext>,
    pub project_type: ProjectType,
}

impl PromptOptions {
    pub fn new(provider_name: impl Into<String>, chat_mode: PromptMode) -> Self {
        Self {
            provider_name: provider_name.into(),
            detected_intent: None,
            chat_mode,
            max_tokens: None,
            force_verbosity: None,
            work_dir: "/home/project".to_string(),
            database: None,
            design: None,
            project_type: ProjectType::Web,
        }
    }
}

/// Output of prompt generation: the prompt plus metadata about what went in
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPrompt {
    pub content: String,
    /// ceil(chars / 4); a heuristic, not exact tokenization
    pub estimated_tokens: u32,
    pub verbosity: Verbosity,
    pub provider_category: ProviderCategory,
    pub included_rules: Vec<RuleCategory>,
    pub excluded_rules: Vec<RuleCategory>,
    pub findings: Vec<ValidationFinding>,
}

struct Section {
    name: &'static str,
    text: String,
    rules: Vec<RuleCategory>,
}

impl Section {
    fn plain(name: &'static str, text: String) -> Self {
        Self {
            name,
            text,
            rules: Vec::new(),
        }
    }
}

/// Generate the system prompt for one request.
///
/// Never fails: unknown providers resolve to the generic profile and every
/// table lookup has a default. Token estimates use the chars/4 heuristic; a
/// budget that cannot be met even at minimal verbosity is reported through
/// the validation findings rather than hidden.
pub fn generate_prompt(options: &PromptOptions) -> GeneratedPrompt {
    let profile = providers::lookup(&options.provider_name);
    let mut verbosity = verbosity::determine(
        profile,
        options.detected_intent.as_ref(),
        options.max_tokens,
        options.force_verbosity,
    );

    let (content, included_rules, excluded_rules) = loop {
        let (mut sections, considered) = assemble(options, verbosity);
        let mut content = render(&sections, &options.work_dir);

        if let Some(budget) = options.max_tokens {
            if profile.optimization.reduction_target > 0.0 && estimate_tokens(&content) > budget {
                sections.retain(|s| {
                    !profile
                        .optimization
                        .excluded_sections
                        .iter()
                        .any(|pattern| s.name.contains(pattern))
                });
                content = render(&sections, &options.work_dir);

                if estimate_tokens(&content) > budget && verbosity != Verbosity::Minimal {
                    debug!(
                        "prompt over budget at {} verbosity, rebuilding lower",
                        verbosity
                    );
                    verbosity = verbosity.step_down();
                    continue;
                }
            }
        }

        let included: Vec<RuleCategory> = sections.iter().flat_map(|s| s.rules.clone()).collect();
        let excluded: Vec<RuleCategory> = considered
            .into_iter()
            .filter(|c| !included.contains(c))
            .collect();
        break (content, included, excluded);
    };

    let estimated_tokens = estimate_tokens(&content);
    let mut findings = validation::validate(&content, &included_rules);
    if let Some(budget) = options.max_tokens {
        if estimated_tokens > budget {
            findings.push(ValidationFinding::warning(format!(
                "estimated {} tokens exceeds the {} budget even at minimal verbosity",
                estimated_tokens, budget
            )));
        }
    }

    GeneratedPrompt {
        content,
        estimated_tokens,
        verbosity,
        provider_category: profile.category,
        included_rules,
        excluded_rules,
        findings,
    }
}

/// Estimate tokens as ceil(chars / 4).
pub fn estimate_tokens(content: &str) -> u32 {
    (content.chars().count() as u32).div_ceil(4)
}

/// Build the ordered section list for one verbosity level.
///
/// Returns the sections plus every rule category that was considered
/// (required, optional, and forbidden), so the caller can report what ended
/// up excluded.
fn assemble(options: &PromptOptions, verbosity: Verbosity) -> (Vec<Section>, Vec<RuleCategory>) {
    let intent = options.detected_intent.as_ref();
    let rule_set = rules::rules_for(intent.map(|i| i.category), options.chat_mode);

    let mut considered: Vec<RuleCategory> = Vec::new();
    considered.extend(&rule_set.required);
    considered.extend(&rule_set.optional);
    considered.extend(&rule_set.forbidden);

    let mut sections = Vec::new();
    sections.push(Section::plain(
        "system_header",
        system_header(verbosity).to_string(),
    ));
    sections.push(rule_section("intent_rules", &rule_set.required, verbosity));

    if let Some(section) = database_section(options) {
        sections.push(section);
    }
    if let Some(section) = design_section(options) {
        sections.push(section);
    }
    if options.project_type == ProjectType::Mobile {
        sections.push(Section {
            name: "mobile",
            text: rules::rule_text(RuleCategory::MobileAdaptation, verbosity).to_string(),
            rules: vec![RuleCategory::MobileAdaptation],
        });
        considered.push(RuleCategory::MobileAdaptation);
    }
    sections.push(Section::plain("formatting", formatting_footer()));

    if verbosity != Verbosity::Minimal && !rule_set.optional.is_empty() {
        sections.push(rule_section("optional_rules", &rule_set.optional, verbosity));
    }

    sections.push(Section::plain(
        "mode_instructions",
        mode_instructions(options.chat_mode, verbosity).to_string(),
    ));

    sections.retain(|s| !s.text.is_empty());
    (sections, considered)
}

fn rule_section(name: &'static str, categories: &[RuleCategory], verbosity: Verbosity) -> Section {
    let text = categories
        .iter()
        .map(|&c| rules::rule_text(c, verbosity))
        .collect::<Vec<_>>()
        .join("\n\n");
    Section {
        name,
        text,
        rules: categories.to_vec(),
    }
}

fn render(sections: &[Section], work_dir: &str) -> String {
    sections
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
        .replace(WORK_DIR_PLACEHOLDER, work_dir)
}

fn system_header(verbosity: Verbosity) -> &'static str {
    match verbosity {
        Verbosity::Minimal => {
            "You are an expert app builder working inside the user's browser workspace."
        }
        Verbosity::Standard => {
            "You are an expert app builder working inside the user's browser workspace. You \
             turn requests into working web applications, explaining decisions briefly and \
             asking only when genuinely blocked."
        }
        Verbosity::Detailed => {
            "You are an expert app builder working inside the user's browser workspace. You \
             turn requests into working web applications end to end: you plan the change, \
             write the code, and verify it fits the running project. Explain significant \
             decisions briefly, surface trade-offs when they matter, and ask a question only \
             when you are genuinely blocked rather than guessing at intent."
        }
    }
}

fn mode_instructions(mode: PromptMode, verbosity: Verbosity) -> &'static str {
    match (mode, verbosity) {
        (PromptMode::Discuss, Verbosity::Minimal) => {
            "Discussion mode: answer and advise; do not produce file artifacts."
        }
        (PromptMode::Discuss, Verbosity::Standard) => {
            "Discussion mode: the user wants to think, not build. Answer questions, sketch \
             approaches, and compare options; do not produce file artifacts or modify the \
             project."
        }
        (PromptMode::Discuss, Verbosity::Detailed) => {
            "Discussion mode: the user wants to think, not build. Answer questions, sketch \
             approaches, and compare options with concrete trade-offs. Reference project files \
             by path when discussing them, but do not produce file artifacts or modify the \
             project in any way; end with a clear recommendation when the user asked for one."
        }
        (PromptMode::Build, Verbosity::Minimal) => {
            "Build mode: make the change now and emit the affected files."
        }
        (PromptMode::Build, Verbosity::Standard) => {
            "Build mode: the user wants the change made, not described. State the plan in a \
             sentence or two, then emit the affected files. Prefer the smallest change that \
             fully solves the request."
        }
        (PromptMode::Build, Verbosity::Detailed) => {
            "Build mode: the user wants the change made, not described. State the plan in a \
             sentence or two, then emit every affected file. Prefer the smallest change that \
             fully solves the request, keep the project runnable after every artifact, and \
             close with what the user should see once the change is applied."
        }
    }
}

fn database_section(options: &PromptOptions) -> Option<Section> {
    let intent = options.detected_intent.as_ref()?;
    let wanted =
        intent.context.requires_database || intent.category == IntentCategory::DatabaseOps;
    if !wanted {
        return None;
    }

    let text = match options.database {
        Some(db) if db.connected && db.project_selected => format!(
            "Supabase is connected with a project selected. {}",
            rules::rule_text(RuleCategory::DatabaseSafety, Verbosity::Standard)
        ),
        Some(db) if db.connected => "Supabase is connected but no project is selected. Ask the \
             user to pick a project in the connection panel before generating any database \
             code."
            .to_string(),
        Some(db) if db.credentials_present => "Supabase credentials are saved but the \
             connection is down. Ask the user to reconnect before generating any database \
             code."
            .to_string(),
        _ => "No database is connected. If this feature needs persistence, ask the user to \
             connect Supabase first; until then, mock the data layer behind a typed interface."
            .to_string(),
    };

    Some(Section {
        name: "database",
        text,
        rules: vec![RuleCategory::DatabaseSafety],
    })
}

fn design_section(options: &PromptOptions) -> Option<Section> {
    let intent = options.detected_intent.as_ref()?;
    let wanted = intent.context.requires_design || intent.category == IntentCategory::DesignUi;
    if !wanted {
        return None;
    }

    let design = options.design.unwrap_or(DesignContext {
        new_project: false,
        target_complexity: Complexity::Moderate,
    });
    let mut text = String::new();
    if design.new_project {
        text.push_str(
            "This is a new project: establish the visual language now (tokens, spacing scale, \
             type ramp) rather than retrofitting it later.\n\n",
        );
    } else {
        text.push_str("Match the project's existing visual language; do not restyle screens the \
             user did not ask about.\n\n");
    }
    match design.target_complexity {
        Complexity::Simple => {
            text.push_str("Target a clean, minimal layout; resist adding decorative elements.")
        }
        Complexity::Moderate => text.push_str(
            "Target a polished standard layout with deliberate hierarchy and spacing.",
        ),
        Complexity::Complex => text.push_str(
            "This is a rich interface: plan the information architecture before styling, and \
             keep interactive density manageable on small screens.",
        ),
    }

    Some(Section {
        name: "design",
        text,
        rules: vec![RuleCategory::DesignSystem],
    })
}

fn formatting_footer() -> String {
    format!(
        "Format chat messages with plain HTML limited to these elements: {}. Anything else is \
         stripped before rendering.",
        ALLOWED_MESSAGE_ELEMENTS
    )
}
