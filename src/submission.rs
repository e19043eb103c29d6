//! Parsing of raw respondent submissions.
//!
//! Form data arrives as loosely typed `question id -> string | [string]`
//! pairs. This is the one place where those values are checked against the
//! survey definition and turned into typed [`Answer`]s.

use crate::models::{Answer, OptionId, Question, QuestionId, QuestionKind, Response, ResponseId, Survey};
use chrono::Utc;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::debug;

/// A submitted value before it is matched to a question kind.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawAnswer {
    One(String),
    Many(Vec<String>),
}

impl RawAnswer {
    fn values(&self) -> Vec<&str> {
        match self {
            RawAnswer::One(v) => vec![v.as_str()],
            RawAnswer::Many(vs) => vs.iter().map(String::as_str).collect(),
        }
    }
}

/// Body of a submission request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSubmission {
    #[serde(default)]
    pub answers: HashMap<String, RawAnswer>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("unknown question '{0}'")]
    UnknownQuestion(String),

    #[error("question '{0}' is a section header and cannot be answered")]
    SectionAnswered(String),

    #[error("option '{option}' is not declared on question '{question}'")]
    UndeclaredOption { question: String, option: String },
}

/// Match raw values to the survey's questions.
///
/// Empty text and empty selections are treated as unanswered and leave no
/// entry in the returned map.
pub fn parse_answers(
    survey: &Survey,
    raw: &RawSubmission,
) -> Result<BTreeMap<QuestionId, Answer>, SubmissionError> {
    let mut answers = BTreeMap::new();

    for (question_id, value) in &raw.answers {
        let question = survey
            .question(&QuestionId::from(question_id.as_str()))
            .ok_or_else(|| SubmissionError::UnknownQuestion(question_id.clone()))?;

        if let Some(answer) = parse_answer(question, value)? {
            answers.insert(question.id.clone(), answer);
        }
    }

    Ok(answers)
}

fn parse_answer(question: &Question, value: &RawAnswer) -> Result<Option<Answer>, SubmissionError> {
    let values = value.values();

    match question.kind {
        QuestionKind::SectionHeader => Err(SubmissionError::SectionAnswered(question.id.to_string())),
        QuestionKind::FreeText => Ok(values
            .first()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(|v| Answer::Text(v.to_string()))),
        QuestionKind::SingleChoice => match values.first() {
            Some(id) => {
                let option = declared_option(question, id)?;
                Ok(Some(Answer::SingleChoice(option)))
            }
            None => Ok(None),
        },
        QuestionKind::MultipleChoice => {
            for id in &values {
                declared_option(question, id)?;
            }
            // Declaration order, duplicates collapse.
            let selected: Vec<OptionId> = question
                .options
                .iter()
                .filter(|o| values.contains(&o.id.as_str()))
                .map(|o| o.id.clone())
                .collect();

            if selected.is_empty() {
                Ok(None)
            } else {
                Ok(Some(Answer::MultipleChoice(selected)))
            }
        }
    }
}

fn declared_option(question: &Question, id: &str) -> Result<OptionId, SubmissionError> {
    let id = OptionId::from(id);
    if question.option(&id).is_some() {
        Ok(id)
    } else {
        Err(SubmissionError::UndeclaredOption {
            question: question.id.to_string(),
            option: id.to_string(),
        })
    }
}

/// Build a new response for the survey from a raw submission.
pub fn build_response(survey: &Survey, raw: &RawSubmission) -> Result<Response, SubmissionError> {
    let answers = parse_answers(survey, raw)?;
    debug!(
        "Parsed submission for {} with {} answers",
        survey.id,
        answers.len()
    );

    Ok(Response {
        id: ResponseId::new(),
        survey_id: survey.id.clone(),
        submitted_at: Utc::now(),
        answers,
    })
}
