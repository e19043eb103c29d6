//! Request assembly and prompt templates.

use super::{AdviceRequest, SummaryRequest};
use crate::models::{Answer, AnswerText, QuestionId, Response, Survey};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;

/// System prompt for the survey summary.
pub const SUMMARY_SYSTEM_PROMPT: &str = r#"You are a data analyst. You read survey questions and the anonymous answers given to them and write an objective overview of the findings.

Respond with a single JSON object of the form {"summary": "<text>"} and nothing else."#;

/// System prompt for usage advice.
pub const ADVICE_SYSTEM_PROMPT: &str = r#"You are a digital wellbeing coach. You read a student's answers about their smartphone and social media habits and give short, encouraging and practical advice.

Respond with a single JSON object of the form
{"summary": "<text>", "advice": {"english": "<markdown list>", "sinhala": "<markdown list>"}}
and nothing else."#;

/// One `{question, answer}` entry of the usage data.
#[derive(Debug, Serialize)]
struct UsageEntry<'a> {
    question: &'a str,
    answer: AnswerText,
}

/// Map a response to `question text -> readable answer`, in question order.
pub fn readable_answers<'a>(survey: &'a Survey, response: &Response) -> IndexMap<&'a str, AnswerText> {
    survey
        .answerable_questions()
        .filter_map(|q| {
            response
                .answer(&q.id)
                .map(|answer| (q.text.as_str(), answer.resolve(q)))
        })
        .collect()
}

/// Build the summary request for a non-empty response collection.
pub fn build_summary_request(
    survey: &Survey,
    responses: &[Response],
) -> Result<SummaryRequest, serde_json::Error> {
    let questions: Vec<&str> = survey.answerable_questions().map(|q| q.text.as_str()).collect();
    let formatted: Vec<IndexMap<&str, AnswerText>> = responses
        .iter()
        .map(|r| readable_answers(survey, r))
        .collect();

    Ok(SummaryRequest {
        survey_questions: serde_json::to_string(&questions)?,
        survey_responses: serde_json::to_string(&formatted)?,
    })
}

/// Build the advice request from one respondent's answers.
///
/// Only the configured usage questions are considered. Returns `None` when
/// none of them was answered.
pub fn build_advice_request(
    survey: &Survey,
    answers: &BTreeMap<QuestionId, Answer>,
    usage_questions: &[String],
) -> Result<Option<AdviceRequest>, serde_json::Error> {
    let usage: Vec<_> = survey
        .answerable_questions()
        .filter(|q| usage_questions.iter().any(|id| id == q.id.as_str()))
        .collect();

    let entries: Vec<UsageEntry<'_>> = usage
        .iter()
        .filter_map(|q| {
            answers.get(&q.id).map(|answer| UsageEntry {
                question: q.text.as_str(),
                answer: answer.resolve(q),
            })
        })
        .collect();

    if entries.is_empty() {
        return Ok(None);
    }

    let questions: Vec<&str> = usage.iter().map(|q| q.text.as_str()).collect();
    Ok(Some(AdviceRequest {
        usage_data: serde_json::to_string_pretty(&entries)?,
        questions: serde_json::to_string(&questions)?,
    }))
}

/// User prompt for chat-style backends.
pub fn render_summary_prompt(request: &SummaryRequest) -> String {
    format!(
        "The survey questions were:\n{}\n\nThe responses are:\n{}\n\n\
         Based on all of the responses, write a high-level summary. Identify key trends, \
         common themes in the text answers, and any interesting patterns or contradictions. \
         Keep it objective and give a clear overview of the findings.",
        request.survey_questions, request.survey_responses
    )
}

/// User prompt for chat-style backends.
pub fn render_advice_prompt(request: &AdviceRequest) -> String {
    format!(
        "The questions were:\n{}\n\nThe student's answers are:\n{}\n\n\
         Based on these answers provide:\n\
         1. A concise, non-judgmental summary of their habits in English.\n\
         2. Three to five personalised pieces of advice for a healthy digital-life balance.\n\
         3. The advice in both English and Sinhala, each formatted as a markdown list.",
        request.questions, request.usage_data
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SurveyCatalog;
    use crate::models::{OptionId, ResponseId, SurveyId};
    use chrono::Utc;
    use serde_json::Value;

    fn survey() -> Survey {
        SurveyCatalog::builtin()
            .unwrap()
            .get(&SurveyId::from("student-lifestyle-survey"))
            .unwrap()
            .clone()
    }

    fn response(answers: Vec<(&str, Answer)>) -> Response {
        Response {
            id: ResponseId::new(),
            survey_id: SurveyId::from("student-lifestyle-survey"),
            submitted_at: Utc::now(),
            answers: answers
                .into_iter()
                .map(|(q, a)| (QuestionId::from(q), a))
                .collect(),
        }
    }

    #[test]
    fn test_summary_request_uses_question_and_option_text() {
        let survey = survey();
        let responses = vec![response(vec![
            ("q8", Answer::MultipleChoice(vec![OptionId::from("q8-o2")])),
            ("q2", Answer::SingleChoice(OptionId::from("q2-o2"))),
        ])];

        let request = build_summary_request(&survey, &responses).unwrap();

        let questions: Vec<String> = serde_json::from_str(&request.survey_questions).unwrap();
        assert_eq!(questions.len(), survey.answerable_questions().count());
        assert!(!questions.iter().any(|q| q == "Basic Information"));

        let parsed: Value = serde_json::from_str(&request.survey_responses).unwrap();
        let first = parsed[0].as_object().unwrap();
        let q2 = survey.question(&QuestionId::from("q2")).unwrap();
        let q8 = survey.question(&QuestionId::from("q8")).unwrap();
        assert_eq!(first[&q2.text], "21-23");
        assert_eq!(first[&q8.text], serde_json::json!(["Instagram"]));

        // Keys follow question order, not answer-map order.
        let keys: Vec<&String> = first.keys().collect();
        assert_eq!(keys, vec![&q2.text, &q8.text]);
    }

    #[test]
    fn test_summary_request_serializes_camel_case() {
        let request = SummaryRequest {
            survey_questions: "[]".to_string(),
            survey_responses: "[]".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("surveyQuestions").is_some());
        assert!(json.get("surveyResponses").is_some());
    }

    #[test]
    fn test_advice_request_limits_to_usage_questions() {
        let survey = survey();
        let mut answers = BTreeMap::new();
        answers.insert(QuestionId::from("q2"), Answer::SingleChoice(OptionId::from("q2-o1")));
        answers.insert(
            QuestionId::from("q8"),
            Answer::MultipleChoice(vec![OptionId::from("q8-o1"), OptionId::from("q8-o2")]),
        );

        let usage = vec!["q5".to_string(), "q8".to_string()];
        let request = build_advice_request(&survey, &answers, &usage).unwrap().unwrap();

        let entries: Value = serde_json::from_str(&request.usage_data).unwrap();
        let entries = entries.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["answer"], serde_json::json!(["Facebook", "Instagram"]));

        let questions: Vec<String> = serde_json::from_str(&request.questions).unwrap();
        assert_eq!(questions.len(), 2);

        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("usageData").is_some());
    }

    #[test]
    fn test_advice_request_none_without_usage_answers() {
        let survey = survey();
        let answers = BTreeMap::new();
        let usage = vec!["q5".to_string()];
        assert!(build_advice_request(&survey, &answers, &usage).unwrap().is_none());
    }

    #[test]
    fn test_rendered_prompts_embed_payloads() {
        let request = SummaryRequest {
            survey_questions: "[\"Age?\"]".to_string(),
            survey_responses: "[{\"Age?\":\"21-23\"}]".to_string(),
        };
        let prompt = render_summary_prompt(&request);
        assert!(prompt.contains("[\"Age?\"]"));
        assert!(prompt.contains("21-23"));

        let advice = AdviceRequest {
            usage_data: "[]".to_string(),
            questions: "[\"Hours?\"]".to_string(),
        };
        assert!(render_advice_prompt(&advice).contains("Sinhala"));
    }
}
