//! Survey builder drafts.
//!
//! A draft is what the survey-builder form submits. It is validated
//! locally and expanded into a full definition with generated ids, but
//! never stored: the catalog has no edit flow.

use super::validate_survey;
use crate::models::{OptionId, Question, QuestionId, QuestionKind, QuestionOption, Survey, SurveyId};
use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;

const MIN_TITLE_LEN: usize = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct SurveyDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub questions: Vec<QuestionDraft>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionDraft {
    pub text: String,
    pub kind: QuestionKind,
    #[serde(default)]
    pub options: Vec<OptionDraft>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptionDraft {
    pub text: String,
}

/// Every problem found in a draft, one message per field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .issues.join("; "))]
pub struct DraftError {
    pub issues: Vec<String>,
}

impl SurveyDraft {
    /// Collect field-level problems without building anything.
    pub fn validate(&self) -> Result<(), DraftError> {
        let mut issues = Vec::new();

        if self.title.trim().chars().count() < MIN_TITLE_LEN {
            issues.push(format!(
                "title: Title must be at least {} characters",
                MIN_TITLE_LEN
            ));
        }

        if !self.questions.iter().any(|q| q.kind != QuestionKind::SectionHeader) {
            issues.push("questions: Survey must have at least one question".to_string());
        }

        for (i, question) in self.questions.iter().enumerate() {
            if question.text.trim().is_empty() {
                issues.push(format!("questions[{}].text: Question text cannot be empty", i));
            }

            if !question.kind.is_choice() {
                continue;
            }

            if question.options.is_empty() {
                issues.push(format!(
                    "questions[{}].options: Choice questions need at least one option",
                    i
                ));
            }
            for (j, option) in question.options.iter().enumerate() {
                if option.text.trim().is_empty() {
                    issues.push(format!(
                        "questions[{}].options[{}].text: Option text cannot be empty",
                        i, j
                    ));
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(DraftError { issues })
        }
    }

    /// Validate and expand into a full survey definition.
    pub fn build(&self) -> Result<Survey, DraftError> {
        self.validate()?;

        let questions = self
            .questions
            .iter()
            .enumerate()
            .map(|(i, draft)| {
                let n = i + 1;
                let id = if draft.kind == QuestionKind::SectionHeader {
                    format!("s{}", n)
                } else {
                    format!("q{}", n)
                };
                let options = if draft.kind.is_choice() {
                    draft
                        .options
                        .iter()
                        .enumerate()
                        .map(|(j, o)| QuestionOption {
                            id: OptionId(format!("{}-o{}", id, j + 1)),
                            text: o.text.trim().to_string(),
                        })
                        .collect()
                } else {
                    Vec::new()
                };

                Question {
                    id: QuestionId(id),
                    text: draft.text.trim().to_string(),
                    kind: draft.kind,
                    options,
                }
            })
            .collect();

        let survey = Survey {
            id: SurveyId(slugify(&self.title)),
            title: self.title.trim().to_string(),
            description: self.description.clone().unwrap_or_default(),
            created_at: Utc::now(),
            questions,
        };

        // Draft validation already covers every catalog rule; this keeps
        // the two in step.
        validate_survey(&survey).map_err(|e| DraftError {
            issues: vec![e.to_string()],
        })?;

        Ok(survey)
    }
}

/// Lowercase, alphanumeric words joined by dashes.
fn slugify(title: &str) -> String {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}
