//! Response aggregation.
//!
//! Turns a (filtered) response collection into per-option counts for the
//! charts and per-question lists of free-text answers. Everything here is a
//! pure function of the survey and the responses.

use crate::models::{Answer, OptionId, Question, QuestionId, QuestionKind, Response, Survey};
use serde::Serialize;
use std::collections::HashMap;

/// How a tally is best charted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Pie,
    Bar,
}

/// Selection count for one declared option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionCount {
    pub option_id: OptionId,
    /// Option display text.
    pub name: String,
    pub value: usize,
}

/// Counts for one choice question, one entry per declared option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionTally {
    pub question_id: QuestionId,
    pub question_text: String,
    pub kind: QuestionKind,
    pub chart: ChartKind,
    pub data: Vec<OptionCount>,
    /// False when no response selected any option.
    pub any_selected: bool,
}

impl QuestionTally {
    #[allow(dead_code)] // Lookup helper for callers holding a single tally
    pub fn count(&self, option_id: &OptionId) -> Option<usize> {
        self.data
            .iter()
            .find(|c| &c.option_id == option_id)
            .map(|c| c.value)
    }
}

/// Non-empty free-text answers for one question, in response order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextAnswers {
    pub question_id: QuestionId,
    pub question_text: String,
    pub answers: Vec<String>,
}

/// Everything the results view, the charts and the exports are drawn from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Aggregation {
    pub response_count: usize,
    pub tallies: Vec<QuestionTally>,
    pub text_answers: Vec<TextAnswers>,
}

impl Aggregation {
    #[allow(dead_code)] // Lookup helper, the views serialize all tallies
    pub fn tally_for(&self, question_id: &QuestionId) -> Option<&QuestionTally> {
        self.tallies.iter().find(|t| &t.question_id == question_id)
    }

    #[allow(dead_code)] // Utility for views that hide empty answer lists
    pub fn has_text_answers(&self) -> bool {
        self.text_answers.iter().any(|t| !t.answers.is_empty())
    }
}

/// Count selections for one choice question.
pub fn tally_question(question: &Question, responses: &[Response]) -> QuestionTally {
    let index: HashMap<&OptionId, usize> = question
        .options
        .iter()
        .enumerate()
        .map(|(i, o)| (&o.id, i))
        .collect();
    let mut counts = vec![0usize; question.options.len()];

    for response in responses {
        match response.answer(&question.id) {
            Some(Answer::SingleChoice(id)) => {
                // Undeclared ids cannot pass submission parsing; skip them
                // if an old record still carries one.
                if let Some(&i) = index.get(id) {
                    counts[i] += 1;
                }
            }
            Some(Answer::MultipleChoice(ids)) => {
                for id in ids {
                    if let Some(&i) = index.get(id) {
                        counts[i] += 1;
                    }
                }
            }
            _ => {}
        }
    }

    let data: Vec<OptionCount> = question
        .options
        .iter()
        .zip(counts)
        .map(|(option, value)| OptionCount {
            option_id: option.id.clone(),
            name: option.text.clone(),
            value,
        })
        .collect();

    QuestionTally {
        question_id: question.id.clone(),
        question_text: question.text.clone(),
        kind: question.kind,
        chart: match question.kind {
            QuestionKind::MultipleChoice => ChartKind::Bar,
            _ => ChartKind::Pie,
        },
        any_selected: data.iter().any(|c| c.value > 0),
        data,
    }
}

/// Tallies for every choice question, in declaration order.
pub fn tally(survey: &Survey, responses: &[Response]) -> Vec<QuestionTally> {
    survey
        .choice_questions()
        .map(|q| tally_question(q, responses))
        .collect()
}

/// Free-text answers for every text question, in declaration order.
pub fn collect_text_answers(survey: &Survey, responses: &[Response]) -> Vec<TextAnswers> {
    survey
        .questions
        .iter()
        .filter(|q| q.kind == QuestionKind::FreeText)
        .map(|q| TextAnswers {
            question_id: q.id.clone(),
            question_text: q.text.clone(),
            answers: responses
                .iter()
                .filter_map(|r| match r.answer(&q.id) {
                    Some(Answer::Text(text)) if !text.is_empty() => Some(text.clone()),
                    _ => None,
                })
                .collect(),
        })
        .collect()
}

/// Aggregate a response collection for display and export.
pub fn aggregate(survey: &Survey, responses: &[Response]) -> Aggregation {
    Aggregation {
        response_count: responses.len(),
        tallies: tally(survey, responses),
        text_answers: collect_text_answers(survey, responses),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QuestionOption, ResponseId, SurveyId};
    use chrono::Utc;
    use proptest::prelude::*;
    use std::collections::{BTreeMap, HashSet};

    fn test_survey() -> Survey {
        let options = |prefix: &str, n: usize| {
            (1..=n)
                .map(|i| QuestionOption {
                    id: OptionId(format!("{}-o{}", prefix, i)),
                    text: format!("{} option {}", prefix, i),
                })
                .collect::<Vec<_>>()
        };

        Survey {
            id: SurveyId::from("test"),
            title: "Test".to_string(),
            description: String::new(),
            created_at: Utc::now(),
            questions: vec![
                Question {
                    id: QuestionId::from("s1"),
                    text: "Section".to_string(),
                    kind: QuestionKind::SectionHeader,
                    options: vec![],
                },
                Question {
                    id: QuestionId::from("q1"),
                    text: "Age".to_string(),
                    kind: QuestionKind::SingleChoice,
                    options: options("q1", 3),
                },
                Question {
                    id: QuestionId::from("q2"),
                    text: "Platforms".to_string(),
                    kind: QuestionKind::MultipleChoice,
                    options: options("q2", 5),
                },
                Question {
                    id: QuestionId::from("q3"),
                    text: "Comments".to_string(),
                    kind: QuestionKind::FreeText,
                    options: vec![],
                },
            ],
        }
    }

    fn make_response(single: Option<usize>, multi: &[usize], text: Option<&str>) -> Response {
        let mut answers = BTreeMap::new();
        if let Some(i) = single {
            answers.insert(
                QuestionId::from("q1"),
                Answer::SingleChoice(OptionId(format!("q1-o{}", i + 1))),
            );
        }
        if !multi.is_empty() {
            let mut ids: Vec<usize> = multi.to_vec();
            ids.sort_unstable();
            ids.dedup();
            answers.insert(
                QuestionId::from("q2"),
                Answer::MultipleChoice(ids.iter().map(|i| OptionId(format!("q2-o{}", i + 1))).collect()),
            );
        }
        if let Some(text) = text {
            answers.insert(QuestionId::from("q3"), Answer::Text(text.to_string()));
        }
        Response {
            id: ResponseId::new(),
            survey_id: SurveyId::from("test"),
            submitted_at: Utc::now(),
            answers,
        }
    }

    #[test]
    fn test_tally_counts_and_keeps_zero_options() {
        let survey = test_survey();
        let responses = vec![
            make_response(Some(0), &[1, 3], None),
            make_response(Some(0), &[1], Some("great")),
            make_response(Some(2), &[], Some("")),
        ];

        let aggregation = aggregate(&survey, &responses);
        assert_eq!(aggregation.response_count, 3);
        assert_eq!(aggregation.tallies.len(), 2);

        let ages = aggregation.tally_for(&QuestionId::from("q1")).unwrap();
        let values: Vec<usize> = ages.data.iter().map(|c| c.value).collect();
        assert_eq!(values, vec![2, 0, 1]);
        assert_eq!(ages.chart, ChartKind::Pie);

        let platforms = aggregation.tally_for(&QuestionId::from("q2")).unwrap();
        assert_eq!(platforms.count(&OptionId::from("q2-o2")), Some(2));
        assert_eq!(platforms.count(&OptionId::from("q2-o4")), Some(1));
        assert_eq!(platforms.count(&OptionId::from("q2-o5")), Some(0));
        assert_eq!(platforms.chart, ChartKind::Bar);

        assert_eq!(aggregation.text_answers.len(), 1);
        assert_eq!(aggregation.text_answers[0].answers, vec!["great".to_string()]);
        assert!(aggregation.has_text_answers());
    }

    #[test]
    fn test_tally_has_exactly_declared_options() {
        let survey = test_survey();
        let responses = vec![make_response(Some(1), &[0, 4], None)];

        for tally in tally(&survey, &responses) {
            let question = survey.question(&tally.question_id).unwrap();
            let declared: Vec<&OptionId> = question.options.iter().map(|o| &o.id).collect();
            let tallied: Vec<&OptionId> = tally.data.iter().map(|c| &c.option_id).collect();
            assert_eq!(declared, tallied);
        }
    }

    #[test]
    fn test_unknown_single_choice_id_is_ignored() {
        let survey = test_survey();
        let mut response = make_response(None, &[], None);
        response.answers.insert(
            QuestionId::from("q1"),
            Answer::SingleChoice(OptionId::from("q1-o9")),
        );

        let t = tally_question(survey.question(&QuestionId::from("q1")).unwrap(), &[response]);
        assert!(t.data.iter().all(|c| c.value == 0));
        assert!(!t.any_selected);
    }

    #[test]
    fn test_empty_collection_gives_all_zero_tally() {
        let survey = test_survey();
        let aggregation = aggregate(&survey, &[]);

        assert_eq!(aggregation.response_count, 0);
        assert_eq!(aggregation.tallies.len(), 2);
        assert!(aggregation
            .tallies
            .iter()
            .all(|t| !t.any_selected && t.data.iter().all(|c| c.value == 0)));
        assert!(!aggregation.has_text_answers());
    }

    #[test]
    fn test_text_answers_keep_response_order() {
        let survey = test_survey();
        let responses = vec![
            make_response(None, &[], Some("first")),
            make_response(None, &[], None),
            make_response(None, &[], Some("second")),
        ];

        let texts = collect_text_answers(&survey, &responses);
        assert_eq!(texts[0].answers, vec!["first", "second"]);
    }

    fn response_spec() -> impl Strategy<Value = Vec<(Option<usize>, Vec<usize>)>> {
        prop::collection::vec(
            (
                prop::option::of(0usize..3),
                prop::collection::vec(0usize..5, 0..5),
            ),
            0..40,
        )
    }

    proptest! {
        #[test]
        fn prop_tally_is_order_independent(
            (specs, shuffled) in response_spec()
                .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
        ) {
            let survey = test_survey();
            let build = |specs: &[(Option<usize>, Vec<usize>)]| -> Vec<Response> {
                specs.iter().map(|(s, m)| make_response(*s, m, None)).collect()
            };

            let a = tally(&survey, &build(&specs));
            let b = tally(&survey, &build(&shuffled));
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_tally_has_no_extraneous_keys(specs in response_spec()) {
            let survey = test_survey();
            let responses: Vec<Response> =
                specs.iter().map(|(s, m)| make_response(*s, m, None)).collect();

            for t in tally(&survey, &responses) {
                let keys: HashSet<&OptionId> = t.data.iter().map(|c| &c.option_id).collect();
                prop_assert_eq!(keys.len(), t.data.len());
                let q = survey.question(&t.question_id).unwrap();
                prop_assert_eq!(t.data.len(), q.options.len());
            }
        }
    }
}
