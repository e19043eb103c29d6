//! Data models for surveys and responses.
//!
//! This module contains the core data structures shared by the catalog,
//! the response store, the aggregator and the exporters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Identifier of a survey in the catalog.
    SurveyId
);
string_id!(
    /// Identifier of a question, unique within its survey.
    QuestionId
);
string_id!(
    /// Identifier of an option, unique within its question.
    OptionId
);

/// Identifier of a stored response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseId(pub Uuid);

impl ResponseId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ResponseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResponseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    /// Structural marker that starts a new section; never answered.
    SectionHeader,
    /// Free-form text answer.
    #[serde(rename = "text")]
    FreeText,
    /// Exactly one option may be selected.
    SingleChoice,
    /// Any subset of the options may be selected.
    MultipleChoice,
}

impl QuestionKind {
    /// Whether answers to this kind reference declared options.
    pub fn is_choice(&self) -> bool {
        matches!(self, QuestionKind::SingleChoice | QuestionKind::MultipleChoice)
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionKind::SectionHeader => write!(f, "Section"),
            QuestionKind::FreeText => write!(f, "Text"),
            QuestionKind::SingleChoice => write!(f, "Single Choice"),
            QuestionKind::MultipleChoice => write!(f, "Multiple Choice"),
        }
    }
}

/// A selectable choice belonging to a choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: OptionId,
    pub text: String,
}

/// A single prompt within a survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub kind: QuestionKind,
    /// Declared options, in display order. Empty for non-choice kinds.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<QuestionOption>,
}

impl Question {
    pub fn is_section(&self) -> bool {
        self.kind == QuestionKind::SectionHeader
    }

    /// Look up a declared option.
    pub fn option(&self, id: &OptionId) -> Option<&QuestionOption> {
        self.options.iter().find(|o| &o.id == id)
    }

    /// Display text for an option id, falling back to the raw id.
    pub fn option_text<'a>(&'a self, id: &'a OptionId) -> &'a str {
        self.option(id).map(|o| o.text.as_str()).unwrap_or(id.as_str())
    }
}

/// A named, ordered set of questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Survey {
    pub id: SurveyId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub questions: Vec<Question>,
}

/// A section of a survey: a header followed by its questions.
#[derive(Debug, Clone, Serialize)]
pub struct Section<'a> {
    pub title: &'a str,
    pub questions: Vec<&'a Question>,
}

impl Survey {
    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| &q.id == id)
    }

    /// Questions that can carry an answer (everything except section headers).
    pub fn answerable_questions(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter().filter(|q| !q.is_section())
    }

    /// Single- and multiple-choice questions, in declaration order.
    pub fn choice_questions(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter().filter(|q| q.kind.is_choice())
    }

    /// Group questions under their section headers.
    ///
    /// Questions declared before the first header belong to no section and
    /// are not part of the sectioned view.
    pub fn sections(&self) -> Vec<Section<'_>> {
        let mut sections: Vec<Section<'_>> = Vec::new();

        for question in &self.questions {
            if question.is_section() {
                sections.push(Section {
                    title: &question.text,
                    questions: Vec::new(),
                });
            } else if let Some(current) = sections.last_mut() {
                current.questions.push(question);
            }
        }

        sections
    }

    /// File-name friendly title (spaces replaced by underscores).
    pub fn file_stem(&self) -> String {
        self.title.replace(' ', "_")
    }
}

/// Listing entry for the survey catalog.
#[derive(Debug, Clone, Serialize)]
pub struct SurveyListing {
    pub id: SurveyId,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub question_count: usize,
}

impl From<&Survey> for SurveyListing {
    fn from(survey: &Survey) -> Self {
        Self {
            id: survey.id.clone(),
            title: survey.title.clone(),
            description: survey.description.clone(),
            created_at: survey.created_at,
            question_count: survey.answerable_questions().count(),
        }
    }
}

/// One answer, shaped by the kind of the question it answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum Answer {
    Text(String),
    SingleChoice(OptionId),
    /// Deduplicated, in option declaration order.
    MultipleChoice(Vec<OptionId>),
}

/// Human-readable form of an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AnswerText {
    One(String),
    Many(Vec<String>),
}

impl AnswerText {
    /// Flatten to a single display string.
    pub fn joined(&self) -> String {
        match self {
            AnswerText::One(s) => s.clone(),
            AnswerText::Many(items) => items.join(", "),
        }
    }
}

impl Answer {
    /// Resolve option ids against the question's declared options.
    ///
    /// Ids that no longer resolve fall back to the raw id.
    pub fn resolve(&self, question: &Question) -> AnswerText {
        match self {
            Answer::Text(text) => AnswerText::One(text.clone()),
            Answer::SingleChoice(id) => AnswerText::One(question.option_text(id).to_string()),
            Answer::MultipleChoice(ids) => AnswerText::Many(
                ids.iter()
                    .map(|id| question.option_text(id).to_string())
                    .collect(),
            ),
        }
    }
}

/// One respondent's submitted answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub id: ResponseId,
    pub survey_id: SurveyId,
    pub submitted_at: DateTime<Utc>,
    /// Unanswered questions have no entry.
    #[serde(default)]
    pub answers: BTreeMap<QuestionId, Answer>,
}

impl Response {
    pub fn answer(&self, question_id: &QuestionId) -> Option<&Answer> {
        self.answers.get(question_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice(id: &str, kind: QuestionKind, options: &[(&str, &str)]) -> Question {
        Question {
            id: QuestionId::from(id),
            text: format!("Question {}", id),
            kind,
            options: options
                .iter()
                .map(|(id, text)| QuestionOption {
                    id: OptionId::from(*id),
                    text: text.to_string(),
                })
                .collect(),
        }
    }

    fn section(id: &str, text: &str) -> Question {
        Question {
            id: QuestionId::from(id),
            text: text.to_string(),
            kind: QuestionKind::SectionHeader,
            options: vec![],
        }
    }

    #[test]
    fn test_question_kind_serde_names() {
        let json = serde_json::to_string(&QuestionKind::FreeText).unwrap();
        assert_eq!(json, "\"text\"");
        let kind: QuestionKind = serde_json::from_str("\"multiple-choice\"").unwrap();
        assert_eq!(kind, QuestionKind::MultipleChoice);
        let kind: QuestionKind = serde_json::from_str("\"section-header\"").unwrap();
        assert!(!kind.is_choice());
    }

    #[test]
    fn test_sections_group_questions_under_headers() {
        let survey = Survey {
            id: SurveyId::from("s"),
            title: "Test Survey".to_string(),
            description: String::new(),
            created_at: Utc::now(),
            questions: vec![
                choice("q0", QuestionKind::FreeText, &[]),
                section("s1", "Basics"),
                choice("q1", QuestionKind::SingleChoice, &[("a", "A")]),
                choice("q2", QuestionKind::FreeText, &[]),
                section("s2", "Habits"),
                choice("q3", QuestionKind::MultipleChoice, &[("b", "B")]),
            ],
        };

        let sections = survey.sections();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "Basics");
        assert_eq!(sections[0].questions.len(), 2);
        assert_eq!(sections[1].questions[0].id.as_str(), "q3");
        assert_eq!(survey.answerable_questions().count(), 4);
        assert_eq!(survey.file_stem(), "Test_Survey");
    }

    #[test]
    fn test_answer_resolution_falls_back_to_raw_id() {
        let q = choice(
            "q8",
            QuestionKind::MultipleChoice,
            &[("q8-o1", "Facebook"), ("q8-o2", "Instagram")],
        );

        let answer = Answer::MultipleChoice(vec![OptionId::from("q8-o2"), OptionId::from("gone")]);
        assert_eq!(
            answer.resolve(&q),
            AnswerText::Many(vec!["Instagram".to_string(), "gone".to_string()])
        );
        assert_eq!(answer.resolve(&q).joined(), "Instagram, gone");

        let single = Answer::SingleChoice(OptionId::from("q8-o1"));
        assert_eq!(single.resolve(&q), AnswerText::One("Facebook".to_string()));
    }

    #[test]
    fn test_answer_serde_is_tagged() {
        let answer = Answer::SingleChoice(OptionId::from("q2-o2"));
        let json = serde_json::to_value(&answer).unwrap();
        assert_eq!(json["kind"], "single-choice");
        assert_eq!(json["value"], "q2-o2");

        let back: Answer = serde_json::from_value(json).unwrap();
        assert_eq!(back, answer);
    }
}
