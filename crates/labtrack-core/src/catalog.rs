//! # Lab Catalog
//!
//! Immutable registry of lab definitions.
//!
//! The catalog is parsed from TOML and validated exactly once, when it is
//! built. After that every lookup is infallible except for unknown ids:
//! a lab with zero questions, an out-of-range correct-choice index or a
//! threshold outside `[0, 1]` never makes it past construction.
//!
//! ## Source Format
//!
//! ```toml
//! [[lab]]
//! id = "bb84"
//! title = "BB84 Quantum Key Distribution"
//! category = "Quantum Communication Protocols"
//! difficulty = "advanced"
//! passing_threshold = "0.70"   # optional, defaults to 0.70
//! theory = """
//! Alice sends qubits in random bases; Bob measures in random bases.
//! """
//!
//! [[lab.question]]
//! prompt = "What does BB84 distribute?"
//! choices = ["Entanglement", "A secret key"]
//! correct = 1
//! explanation = "BB84 is a key distribution protocol."
//! ```

use crate::primitives::{MAX_CATALOG_LABS, MAX_CHOICES_PER_QUESTION, MAX_QUESTIONS_PER_LAB};
use crate::{LabId, LabtrackError, Score};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The catalog shipped with Labtrack.
const BUILTIN_CATALOG: &str = include_str!("../catalog/labs.toml");

// =============================================================================
// DEFINITIONS
// =============================================================================

/// Declared difficulty of a lab.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

/// One multiple-choice quiz question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub prompt: String,
    /// Ordered answer choices; answers refer to them by index.
    pub choices: Vec<String>,
    /// Index into `choices` of the correct answer.
    pub correct: usize,
    pub explanation: String,
}

/// A validated lab definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabDefinition {
    pub id: LabId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub difficulty: Difficulty,
    /// Markdown reading shown before the quiz. Display only.
    pub theory: String,
    /// Ordered question sequence; submissions align to it by position.
    pub questions: Vec<QuizQuestion>,
    /// Minimum score that passes the quiz (inclusive).
    pub threshold: Score,
}

impl LabDefinition {
    /// Check the structural rules every catalog entry must satisfy.
    pub fn validate(&self) -> Result<(), LabtrackError> {
        let invalid =
            |msg: String| LabtrackError::InvalidCatalog(format!("lab '{}': {}", self.id, msg));

        if self.title.trim().is_empty() {
            return Err(invalid("title is empty".to_string()));
        }
        if self.questions.is_empty() {
            return Err(invalid("quiz has no questions".to_string()));
        }
        if self.questions.len() > MAX_QUESTIONS_PER_LAB {
            return Err(invalid(format!(
                "{} questions exceeds maximum {}",
                self.questions.len(),
                MAX_QUESTIONS_PER_LAB
            )));
        }

        for (i, question) in self.questions.iter().enumerate() {
            let number = i.saturating_add(1);
            if question.prompt.trim().is_empty() {
                return Err(invalid(format!("question {} has an empty prompt", number)));
            }
            if question.choices.len() < 2 {
                return Err(invalid(format!(
                    "question {} needs at least 2 choices, has {}",
                    number,
                    question.choices.len()
                )));
            }
            if question.choices.len() > MAX_CHOICES_PER_QUESTION {
                return Err(invalid(format!(
                    "question {} has {} choices, maximum is {}",
                    number,
                    question.choices.len(),
                    MAX_CHOICES_PER_QUESTION
                )));
            }
            if question.correct >= question.choices.len() {
                return Err(invalid(format!(
                    "question {} marks choice {} correct but has only {} choices",
                    number,
                    question.correct,
                    question.choices.len()
                )));
            }
        }

        Ok(())
    }

    /// Metadata view of this lab (no questions or answers).
    #[must_use]
    pub fn summary(&self) -> LabSummary {
        LabSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            difficulty: self.difficulty,
            question_count: self.questions.len(),
            threshold: self.threshold,
        }
    }
}

/// Display metadata for one lab, as listed on a dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabSummary {
    pub id: LabId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub question_count: usize,
    pub threshold: Score,
}

// =============================================================================
// RAW (UNVALIDATED) SOURCE FORMAT
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawCatalog {
    #[serde(default, rename = "lab")]
    labs: Vec<RawLab>,
}

#[derive(Debug, Deserialize)]
struct RawLab {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    difficulty: Difficulty,
    #[serde(default)]
    theory: String,
    #[serde(default)]
    passing_threshold: Option<RawThreshold>,
    #[serde(default, rename = "question")]
    questions: Vec<QuizQuestion>,
}

/// Thresholds may be written as `"0.70"` or `0.7`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawThreshold {
    Text(String),
    Number(f64),
}

impl RawThreshold {
    fn to_score(&self) -> Result<Score, LabtrackError> {
        match self {
            RawThreshold::Text(text) => text.parse(),
            // Formatting keeps the conversion integer-only.
            RawThreshold::Number(n) => n.to_string().parse(),
        }
    }
}

impl RawLab {
    fn into_definition(self) -> Result<LabDefinition, LabtrackError> {
        let id = LabId::new(self.id)
            .map_err(|e| LabtrackError::InvalidCatalog(format!("bad lab id: {}", e)))?;
        let threshold = match &self.passing_threshold {
            Some(raw) => raw.to_score().map_err(|e| {
                LabtrackError::InvalidCatalog(format!("lab '{}': passing_threshold: {}", id, e))
            })?,
            None => Score::DEFAULT_THRESHOLD,
        };
        Ok(LabDefinition {
            id,
            title: self.title,
            description: self.description,
            category: self.category,
            difficulty: self.difficulty,
            theory: self.theory.trim().to_string(),
            questions: self.questions,
            threshold,
        })
    }
}

// =============================================================================
// CATALOG
// =============================================================================

/// Immutable, validated set of labs in catalog order.
#[derive(Debug, Clone)]
pub struct LabCatalog {
    labs: Vec<LabDefinition>,
    index: BTreeMap<LabId, usize>,
}

impl LabCatalog {
    /// Build a catalog from already-constructed definitions, validating each.
    pub fn from_definitions(labs: Vec<LabDefinition>) -> Result<Self, LabtrackError> {
        if labs.is_empty() {
            return Err(LabtrackError::InvalidCatalog(
                "catalog contains no labs".to_string(),
            ));
        }
        if labs.len() > MAX_CATALOG_LABS {
            return Err(LabtrackError::InvalidCatalog(format!(
                "{} labs exceeds maximum {}",
                labs.len(),
                MAX_CATALOG_LABS
            )));
        }

        let mut index = BTreeMap::new();
        for (position, lab) in labs.iter().enumerate() {
            lab.validate()?;
            if index.insert(lab.id.clone(), position).is_some() {
                return Err(LabtrackError::InvalidCatalog(format!(
                    "duplicate lab id '{}'",
                    lab.id
                )));
            }
        }

        Ok(Self { labs, index })
    }

    /// Parse and validate a TOML catalog.
    pub fn from_toml_str(source: &str) -> Result<Self, LabtrackError> {
        let raw: RawCatalog = toml::from_str(source)
            .map_err(|e| LabtrackError::InvalidCatalog(format!("TOML parse error: {}", e)))?;
        let labs = raw
            .labs
            .into_iter()
            .map(RawLab::into_definition)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_definitions(labs)
    }

    /// The catalog embedded in this crate.
    pub fn builtin() -> Result<Self, LabtrackError> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    /// Look up a lab by id.
    pub fn get(&self, id: &LabId) -> Result<&LabDefinition, LabtrackError> {
        self.index
            .get(id)
            .and_then(|&position| self.labs.get(position))
            .ok_or_else(|| LabtrackError::lab_not_found(id))
    }

    /// Metadata for every lab, in catalog order.
    #[must_use]
    pub fn list(&self) -> Vec<LabSummary> {
        self.labs.iter().map(LabDefinition::summary).collect()
    }

    /// Iterate over the full definitions in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &LabDefinition> {
        self.labs.iter()
    }

    /// Labs grouped by category; catalog order is kept within each group.
    #[must_use]
    pub fn by_category(&self) -> BTreeMap<String, Vec<LabSummary>> {
        let mut groups: BTreeMap<String, Vec<LabSummary>> = BTreeMap::new();
        for lab in &self.labs {
            groups
                .entry(lab.category.clone())
                .or_default()
                .push(lab.summary());
        }
        groups
    }

    /// Number of labs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labs.len()
    }

    /// Always false for a constructed catalog; present for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labs.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
