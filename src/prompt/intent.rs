//! Detected user intent
//!
//! Classification of what the user is trying to do, produced upstream of
//! prompt generation and consumed here to pick rule fragments and verbosity.

use serde::{Deserialize, Serialize};

/// What the user is trying to accomplish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntentCategory {
    FixBug,
    CreateProject,
    AddFeature,
    Refactor,
    DesignUi,
    DatabaseOps,
    Deploy,
    Discuss,
}

/// How sure the classifier is about the category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Estimated size of the task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

/// Flags the classifier attaches to an intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentContext {
    pub requires_database: bool,
    pub requires_design: bool,
    pub complexity: Complexity,
}

/// One classified intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedIntent {
    pub category: IntentCategory,
    pub confidence: Confidence,
    pub context: IntentContext,
}

impl DetectedIntent {
    pub fn new(category: IntentCategory, confidence: Confidence, complexity: Complexity) -> Self {
        Self {
            category,
            confidence,
            context: IntentContext {
                requires_database: false,
                requires_design: false,
                complexity,
            },
        }
    }

    pub fn requiring_database(mut self) -> Self {
        self.context.requires_database = true;
        self
    }

    pub fn requiring_design(mut self) -> Self {
        self.context.requires_design = true;
        self
    }
}
