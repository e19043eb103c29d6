//! Response filtering.
//!
//! A [`FilterConfig`] is an immutable value describing the admin's current
//! filter selection. Filtering is a pure function of the configuration and
//! the response collection.

use crate::models::{Answer, QuestionId, QuestionKind, QuestionOption, Response, Survey};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Expected value that disables a predicate.
pub const WILDCARD: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    /// Single-choice or free-text answer equals the expected value.
    Equals,
    /// Multiple-choice answer includes the expected value.
    Contains,
}

impl Comparison {
    /// The comparison that fits a question kind.
    pub fn for_kind(kind: QuestionKind) -> Self {
        match kind {
            QuestionKind::MultipleChoice => Comparison::Contains,
            _ => Comparison::Equals,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub question_id: QuestionId,
    pub mode: Comparison,
    pub expected: String,
}

impl Predicate {
    #[allow(dead_code)] // Builder for configurations assembled in code
    pub fn equals(question_id: &str, expected: &str) -> Self {
        Self {
            question_id: QuestionId::from(question_id),
            mode: Comparison::Equals,
            expected: expected.to_string(),
        }
    }

    #[allow(dead_code)] // Builder for configurations assembled in code
    pub fn contains(question_id: &str, expected: &str) -> Self {
        Self {
            question_id: QuestionId::from(question_id),
            mode: Comparison::Contains,
            expected: expected.to_string(),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.expected == WILDCARD
    }

    /// Unanswered questions never match.
    pub fn matches(&self, response: &Response) -> bool {
        if self.is_wildcard() {
            return true;
        }

        match (self.mode, response.answer(&self.question_id)) {
            (Comparison::Equals, Some(Answer::SingleChoice(id))) => id.as_str() == self.expected,
            (Comparison::Equals, Some(Answer::Text(text))) => text == &self.expected,
            (Comparison::Contains, Some(Answer::MultipleChoice(ids))) => {
                ids.iter().any(|id| id.as_str() == self.expected)
            }
            _ => false,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("cannot filter on unknown question '{0}'")]
    UnknownQuestion(String),

    #[error("cannot filter on section header '{0}'")]
    SectionHeader(String),

    #[error("'{value}' is not an option of question '{question}'")]
    UnknownOption { question: String, value: String },

    #[error("malformed filter '{0}', expected QUESTION=VALUE")]
    Malformed(String),
}

/// The active filter selection. Predicates are combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    predicates: Vec<Predicate>,
}

impl FilterConfig {
    #[allow(dead_code)] // Builder for configurations assembled in code
    pub fn new(predicates: Vec<Predicate>) -> Self {
        Self { predicates }
    }

    /// Configuration with no predicates: everything matches.
    #[allow(dead_code)] // Builder for configurations assembled in code
    pub fn all() -> Self {
        Self::default()
    }

    #[allow(dead_code)] // Builder for configurations assembled in code
    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    #[allow(dead_code)] // Accessor, predicates are serialized directly
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Whether any predicate actually restricts the result.
    pub fn is_active(&self) -> bool {
        self.predicates.iter().any(|p| !p.is_wildcard())
    }

    pub fn matches(&self, response: &Response) -> bool {
        self.predicates.iter().all(|p| p.matches(response))
    }

    /// Build from `question_id=value` pairs against a survey.
    ///
    /// The comparison mode follows the question kind. For choice questions
    /// the value may be an option id or an option's display text.
    pub fn from_params<'a, I>(survey: &Survey, params: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut predicates = Vec::new();

        for (question_id, value) in params {
            let question = survey
                .question(&QuestionId::from(question_id))
                .ok_or_else(|| FilterError::UnknownQuestion(question_id.to_string()))?;

            if question.is_section() {
                return Err(FilterError::SectionHeader(question_id.to_string()));
            }

            let expected = if value == WILDCARD || !question.kind.is_choice() {
                value.to_string()
            } else {
                resolve_option(&question.options, value)
                    .ok_or_else(|| FilterError::UnknownOption {
                        question: question_id.to_string(),
                        value: value.to_string(),
                    })?
            };

            predicates.push(Predicate {
                question_id: question.id.clone(),
                mode: Comparison::for_kind(question.kind),
                expected,
            });
        }

        // Declaration order keeps configurations built from unordered
        // parameter maps comparable.
        predicates.sort_by_key(|p| {
            survey
                .questions
                .iter()
                .position(|q| q.id == p.question_id)
                .unwrap_or(usize::MAX)
        });

        Ok(Self { predicates })
    }
}

fn resolve_option(options: &[QuestionOption], value: &str) -> Option<String> {
    options
        .iter()
        .find(|o| o.id.as_str() == value)
        .or_else(|| options.iter().find(|o| o.text == value))
        .map(|o| o.id.to_string())
}

/// Parse a `QUESTION=VALUE` command-line filter.
pub fn parse_filter_arg(arg: &str) -> Result<(String, String), FilterError> {
    match arg.split_once('=') {
        Some((q, v)) if !q.trim().is_empty() && !v.trim().is_empty() => {
            Ok((q.trim().to_string(), v.trim().to_string()))
        }
        _ => Err(FilterError::Malformed(arg.to_string())),
    }
}

/// Responses matching every predicate, in their original order.
pub fn filter_responses(responses: &[Response], config: &FilterConfig) -> Vec<Response> {
    responses
        .iter()
        .filter(|r| config.matches(r))
        .cloned()
        .collect()
}

/// A question offered to the admin as a filter.
#[derive(Debug, Clone, Serialize)]
pub struct FilterFacet {
    pub question_id: QuestionId,
    pub label: String,
    pub mode: Comparison,
    pub options: Vec<QuestionOption>,
}

/// Facets for the configured filter questions.
///
/// Ids that do not name a choice question of this survey are skipped.
pub fn filter_facets(survey: &Survey, question_ids: &[String]) -> Vec<FilterFacet> {
    question_ids
        .iter()
        .filter_map(|id| {
            let question = survey.question(&QuestionId::from(id.as_str()));
            match question {
                Some(q) if q.kind.is_choice() => Some(FilterFacet {
                    question_id: q.id.clone(),
                    label: q.text.clone(),
                    mode: Comparison::for_kind(q.kind),
                    options: q.options.clone(),
                }),
                _ => {
                    warn!("Filter question '{}' is not a choice question of {}", id, survey.id);
                    None
                }
            }
        })
        .collect()
}
