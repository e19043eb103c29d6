//! CSV export.

use crate::models::{Response, Survey};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `<title with spaces as underscores>_responses.csv`
pub fn csv_file_name(survey: &Survey) -> String {
    format!("{}_responses.csv", survey.file_stem())
}

/// One header row plus one row per response.
///
/// Answer fields are always quoted; header cells only when they need it.
/// Unanswered questions leave the field empty.
pub fn export_csv(survey: &Survey, responses: &[Response]) -> String {
    let questions: Vec<_> = survey.answerable_questions().collect();
    let mut output = String::new();

    let mut header = vec![
        "Response ID".to_string(),
        "Submission Date".to_string(),
    ];
    header.extend(questions.iter().map(|q| header_cell(&q.text)));
    output.push_str(&header.join(","));
    output.push('\n');

    for response in responses {
        let mut row = vec![
            response.id.to_string(),
            response.submitted_at.format(DATE_FORMAT).to_string(),
        ];
        row.extend(questions.iter().map(|q| match response.answer(&q.id) {
            Some(answer) => quote(&answer.resolve(q).joined()),
            None => String::new(),
        }));
        output.push_str(&row.join(","));
        output.push('\n');
    }

    output
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

fn header_cell(text: &str) -> String {
    if text.contains([',', '"', '\n', '\r']) {
        quote(text)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SurveyCatalog;
    use crate::models::{Answer, OptionId, QuestionId, ResponseId, SurveyId};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

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
            submitted_at: Utc.with_ymd_and_hms(2024, 8, 1, 9, 30, 5).unwrap(),
            answers: answers
                .into_iter()
                .map(|(q, a)| (QuestionId::from(q), a))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_header_lists_answerable_questions() {
        let survey = survey();
        let csv = export_csv(&survey, &[]);
        let header = csv.lines().next().unwrap();

        assert!(header.starts_with("Response ID,Submission Date,Age,Gender,Year of Study,"));
        assert!(!header.contains("Basic Information"));
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn test_row_quotes_answers_and_leaves_missing_empty() {
        let survey = survey();
        let r = response(vec![
            ("q2", Answer::SingleChoice(OptionId::from("q2-o2"))),
            (
                "q8",
                Answer::MultipleChoice(vec![OptionId::from("q8-o1"), OptionId::from("q8-o2")]),
            ),
        ]);
        let csv = export_csv(&survey, std::slice::from_ref(&r));
        let row = csv.lines().nth(1).unwrap();

        // q3..q7 empty, q8 joined, q9..q13 empty.
        let expected = format!(
            "{},2024-08-01 09:30:05,\"21-23\",,,,,,\"Facebook, Instagram\",,,,,",
            r.id
        );
        assert_eq!(row, expected);
    }

    #[test]
    fn test_internal_quotes_are_doubled() {
        assert_eq!(quote("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(header_cell("Plain"), "Plain");
        assert_eq!(header_cell("Yes, or no"), "\"Yes, or no\"");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(csv_file_name(&survey()), "Student_Lifestyle_Survey_responses.csv");
    }
}
