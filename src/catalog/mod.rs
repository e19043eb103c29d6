//! Read-only survey catalog.
//!
//! Survey definitions are loaded once at startup, validated, and then
//! shared immutably for the lifetime of the process.

pub mod draft;

pub use draft::{DraftError, SurveyDraft};

use crate::models::{QuestionKind, Survey, SurveyId, SurveyListing};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Definitions compiled into the binary.
const BUILTIN_SURVEYS: &str = include_str!("../../surveys.json");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read survey catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse survey catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid survey '{survey}': {reason}")]
    Invalid { survey: String, reason: String },

    #[error("duplicate survey id '{0}'")]
    DuplicateSurvey(String),
}

/// Immutable collection of survey definitions.
#[derive(Debug, Clone)]
pub struct SurveyCatalog {
    surveys: Vec<Survey>,
}

impl SurveyCatalog {
    /// The catalog bundled with the application.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_SURVEYS)
    }

    /// Load a catalog from a JSON file holding an array of surveys.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        info!("Loading survey catalog from: {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, CatalogError> {
        let surveys: Vec<Survey> = serde_json::from_str(content)?;
        Self::from_surveys(surveys)
    }

    /// Validate every definition and build the catalog.
    pub fn from_surveys(surveys: Vec<Survey>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for survey in &surveys {
            validate_survey(survey)?;
            if !seen.insert(survey.id.clone()) {
                return Err(CatalogError::DuplicateSurvey(survey.id.to_string()));
            }
        }

        debug!("Survey catalog holds {} surveys", surveys.len());
        Ok(Self { surveys })
    }

    pub fn get(&self, id: &SurveyId) -> Option<&Survey> {
        self.surveys.iter().find(|s| &s.id == id)
    }

    pub fn surveys(&self) -> &[Survey] {
        &self.surveys
    }

    pub fn listings(&self) -> Vec<SurveyListing> {
        self.surveys.iter().map(SurveyListing::from).collect()
    }

    pub fn len(&self) -> usize {
        self.surveys.len()
    }

    #[allow(dead_code)] // Pairs with len()
    pub fn is_empty(&self) -> bool {
        self.surveys.is_empty()
    }
}

/// Check the structural invariants of a survey definition.
pub fn validate_survey(survey: &Survey) -> Result<(), CatalogError> {
    let invalid = |reason: String| CatalogError::Invalid {
        survey: survey.id.to_string(),
        reason,
    };

    if survey.id.as_str().trim().is_empty() {
        return Err(invalid("survey id is empty".to_string()));
    }
    if survey.title.trim().is_empty() {
        return Err(invalid("title is empty".to_string()));
    }
    if survey.answerable_questions().next().is_none() {
        return Err(invalid("survey has no answerable questions".to_string()));
    }

    let mut question_ids = HashSet::new();
    for question in &survey.questions {
        if !question_ids.insert(&question.id) {
            return Err(invalid(format!("duplicate question id '{}'", question.id)));
        }
        if question.text.trim().is_empty() {
            return Err(invalid(format!("question '{}' has no text", question.id)));
        }

        match question.kind {
            QuestionKind::SingleChoice | QuestionKind::MultipleChoice => {
                if question.options.is_empty() {
                    return Err(invalid(format!(
                        "choice question '{}' declares no options",
                        question.id
                    )));
                }
            }
            QuestionKind::SectionHeader | QuestionKind::FreeText => {
                if !question.options.is_empty() {
                    return Err(invalid(format!(
                        "{} question '{}' must not declare options",
                        question.kind, question.id
                    )));
                }
            }
        }

        let mut option_ids = HashSet::new();
        for option in &question.options {
            if !option_ids.insert(&option.id) {
                return Err(invalid(format!(
                    "duplicate option id '{}' in question '{}'",
                    option.id, question.id
                )));
            }
            if option.text.trim().is_empty() {
                return Err(invalid(format!(
                    "option '{}' in question '{}' has no text",
                    option.id, question.id
                )));
            }
        }
    }

    Ok(())
}
