//! Paginated analysis report.
//!
//! The report is laid out as a sequence of blocks (title, summary, one table
//! per choice question, one answer list per text question) which are then
//! packed into pages with a fixed line budget. A block that does not fit on
//! the current page starts a new one; answer lists and summaries longer than
//! a whole page are split into continuation blocks first.

use crate::analysis::Aggregation;
use crate::config::ReportConfig;
use crate::models::Survey;
use chrono::{DateTime, Utc};
use serde::Serialize;

const SUMMARY_HEADING: &str = "AI-Generated Summary";

/// Lines taken by a block's heading and trailing blank line.
const BLOCK_OVERHEAD: usize = 3;

/// Layout settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    pub lines_per_page: usize,
    pub wrap_width: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self::from(&ReportConfig::default())
    }
}

impl From<&ReportConfig> for ReportOptions {
    fn from(config: &ReportConfig) -> Self {
        Self {
            lines_per_page: config.lines_per_page.max(1),
            wrap_width: config.wrap_width.max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRow {
    pub option: String,
    pub count: usize,
}

/// One unit of report content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Title {
        text: String,
        response_count: Option<usize>,
    },
    Summary {
        heading: String,
        lines: Vec<String>,
    },
    Table {
        question: String,
        rows: Vec<TableRow>,
    },
    /// One entry per answer, each already wrapped.
    Answers {
        question: String,
        items: Vec<Vec<String>>,
    },
}

impl Block {
    /// Lines the block occupies when rendered.
    pub fn line_count(&self) -> usize {
        match self {
            Block::Title { response_count, .. } => 2 + response_count.map_or(0, |_| 2),
            Block::Summary { lines, .. } => BLOCK_OVERHEAD + lines.len(),
            // Header and separator rows.
            Block::Table { rows, .. } => BLOCK_OVERHEAD + 2 + rows.len(),
            Block::Answers { items, .. } => {
                BLOCK_OVERHEAD + items.iter().map(Vec::len).sum::<usize>()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub number: usize,
    pub blocks: Vec<Block>,
}

impl Page {
    #[allow(dead_code)] // Utility for checking page budgets
    pub fn line_count(&self) -> usize {
        self.blocks.iter().map(Block::line_count).sum()
    }
}

/// A report laid out into pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentReport {
    pub title: String,
    pub file_name: String,
    pub generated_at: DateTime<Utc>,
    pub pages: Vec<Page>,
}

impl DocumentReport {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// `<title>_analysis_report.<extension>`
pub fn report_file_name(survey: &Survey, extension: &str) -> String {
    format!("{}_analysis_report.{}", survey.file_stem(), extension)
}

/// `<title>_summary.<extension>`
pub fn summary_file_name(survey: &Survey, extension: &str) -> String {
    format!("{}_summary.{}", survey.file_stem(), extension)
}

/// Full analysis report for an aggregated (filtered) response collection.
pub fn build_report(
    survey: &Survey,
    aggregation: &Aggregation,
    summary: Option<&str>,
    options: ReportOptions,
) -> DocumentReport {
    let mut blocks = vec![Block::Title {
        text: survey.title.clone(),
        response_count: Some(aggregation.response_count),
    }];

    if let Some(summary) = summary.filter(|s| !s.trim().is_empty()) {
        blocks.push(summary_block(summary, options.wrap_width));
    }

    for tally in &aggregation.tallies {
        blocks.push(Block::Table {
            question: tally.question_text.clone(),
            rows: tally
                .data
                .iter()
                .map(|c| TableRow {
                    option: c.name.clone(),
                    count: c.value,
                })
                .collect(),
        });
    }

    for text in aggregation.text_answers.iter().filter(|t| !t.answers.is_empty()) {
        blocks.push(Block::Answers {
            question: text.question_text.clone(),
            items: text
                .answers
                .iter()
                .map(|a| wrap_text(a, options.wrap_width.saturating_sub(2).max(1)))
                .collect(),
        });
    }

    DocumentReport {
        title: survey.title.clone(),
        file_name: report_file_name(survey, "md"),
        generated_at: Utc::now(),
        pages: paginate(blocks, options.lines_per_page),
    }
}

/// Report holding only the title and the narrative summary.
pub fn build_summary_report(survey: &Survey, summary: &str, options: ReportOptions) -> DocumentReport {
    let blocks = vec![
        Block::Title {
            text: survey.title.clone(),
            response_count: None,
        },
        summary_block(summary, options.wrap_width),
    ];

    DocumentReport {
        title: survey.title.clone(),
        file_name: summary_file_name(survey, "md"),
        generated_at: Utc::now(),
        pages: paginate(blocks, options.lines_per_page),
    }
}

fn summary_block(summary: &str, width: usize) -> Block {
    Block::Summary {
        heading: SUMMARY_HEADING.to_string(),
        lines: wrap_text(summary, width),
    }
}

/// Pack blocks into pages of at most `lines_per_page` lines.
///
/// A single table taller than a page still gets a page of its own.
pub fn paginate(blocks: Vec<Block>, lines_per_page: usize) -> Vec<Page> {
    let mut pages: Vec<Page> = Vec::new();
    let mut current: Vec<Block> = Vec::new();
    let mut used = 0;

    for block in blocks.into_iter().flat_map(|b| split_oversized(b, lines_per_page)) {
        let lines = block.line_count();
        if !current.is_empty() && used + lines > lines_per_page {
            pages.push(Page {
                number: pages.len() + 1,
                blocks: std::mem::take(&mut current),
            });
            used = 0;
        }
        used += lines;
        current.push(block);
    }

    if !current.is_empty() || pages.is_empty() {
        pages.push(Page {
            number: pages.len() + 1,
            blocks: current,
        });
    }

    pages
}

/// Split summaries and answer lists that cannot fit on one page.
fn split_oversized(block: Block, budget: usize) -> Vec<Block> {
    if block.line_count() <= budget {
        return vec![block];
    }

    match block {
        Block::Answers { question, items } => {
            chunk_by_lines(items, budget, Vec::len)
                .into_iter()
                .map(|items| Block::Answers {
                    question: question.clone(),
                    items,
                })
                .collect()
        }
        Block::Summary { heading, lines } => chunk_by_lines(lines, budget, |_| 1)
            .into_iter()
            .map(|lines| Block::Summary {
                heading: heading.clone(),
                lines,
            })
            .collect(),
        other => vec![other],
    }
}

fn chunk_by_lines<T>(items: Vec<T>, budget: usize, lines_of: impl Fn(&T) -> usize) -> Vec<Vec<T>> {
    let mut chunks = Vec::new();
    let mut current = Vec::new();
    let mut used = BLOCK_OVERHEAD;

    for item in items {
        let lines = lines_of(&item);
        if !current.is_empty() && used + lines > budget {
            chunks.push(std::mem::take(&mut current));
            used = BLOCK_OVERHEAD;
        }
        used += lines;
        current.push(item);
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Greedy word wrap. Paragraph breaks are kept; words longer than the width
/// are not broken.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let needed = if line.is_empty() {
                word.chars().count()
            } else {
                line.chars().count() + 1 + word.chars().count()
            };
            if !line.is_empty() && needed > width {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        lines.push(line);
    }

    lines
}

/// Render the report as Markdown, one `---` break and footer per page.
pub fn render_markdown(report: &DocumentReport) -> String {
    let mut output = String::new();
    let total = report.page_count();

    for (i, page) in report.pages.iter().enumerate() {
        if i > 0 {
            output.push_str("---\n\n");
        }
        for block in &page.blocks {
            output.push_str(&render_block(block));
        }
        output.push_str(&generate_page_footer(page.number, total, report.generated_at));
    }

    output
}

fn render_block(block: &Block) -> String {
    let mut section = String::new();

    match block {
        Block::Title {
            text,
            response_count,
        } => {
            section.push_str(&format!("# {}\n\n", text));
            if let Some(count) = response_count {
                section.push_str(&format!("**Total responses:** {}\n\n", count));
            }
        }
        Block::Summary { heading, lines } => {
            section.push_str(&format!("## {}\n\n", heading));
            for line in lines {
                section.push_str(line);
                section.push('\n');
            }
            section.push('\n');
        }
        Block::Table { question, rows } => {
            section.push_str(&format!("### {}\n\n", question));
            section.push_str("| Option | Count |\n");
            section.push_str("|:---|---:|\n");
            for row in rows {
                section.push_str(&format!("| {} | {} |\n", escape_cell(&row.option), row.count));
            }
            section.push('\n');
        }
        Block::Answers { question, items } => {
            section.push_str(&format!("### {}\n\n", question));
            for item in items {
                for (j, line) in item.iter().enumerate() {
                    if j == 0 {
                        section.push_str(&format!("- {}\n", line));
                    } else {
                        section.push_str(&format!("  {}\n", line));
                    }
                }
            }
            section.push('\n');
        }
    }

    section
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

fn generate_page_footer(number: usize, total: usize, generated_at: DateTime<Utc>) -> String {
    format!(
        "*Page {} of {} · generated {}*\n\n",
        number,
        total,
        generated_at.format("%Y-%m-%d %H:%M UTC")
    )
}

/// Render the report as pretty JSON.
pub fn render_json(report: &DocumentReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{aggregate, ChartKind, OptionCount, QuestionTally, TextAnswers};
    use crate::catalog::SurveyCatalog;
    use crate::models::{OptionId, QuestionId, QuestionKind, SurveyId};

    fn survey() -> Survey {
        SurveyCatalog::builtin()
            .unwrap()
            .get(&SurveyId::from("student-lifestyle-survey"))
            .unwrap()
            .clone()
    }

    fn answers_block(n: usize) -> Block {
        Block::Answers {
            question: "Comments".to_string(),
            items: (0..n).map(|i| vec![format!("answer {}", i)]).collect(),
        }
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(
            wrap_text("the quick brown fox jumps", 10),
            vec!["the quick", "brown fox", "jumps"]
        );
        assert_eq!(wrap_text("a\n\nb", 10), vec!["a", "", "b"]);
        assert_eq!(wrap_text("supercalifragilistic x", 5), vec!["supercalifragilistic", "x"]);
    }

    #[test]
    fn test_block_that_does_not_fit_starts_new_page() {
        let blocks = vec![
            Block::Title {
                text: "T".to_string(),
                response_count: Some(1),
            },
            answers_block(4),
            answers_block(4),
        ];
        // Title 4 lines, each answers block 7 lines.
        let pages = paginate(blocks, 12);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].blocks.len(), 2);
        assert_eq!(pages[0].line_count(), 11);
        assert_eq!(pages[1].number, 2);
        assert!(pages.iter().all(|p| p.line_count() <= 12));
    }

    #[test]
    fn test_oversized_answer_list_is_split() {
        let pages = paginate(vec![answers_block(25)], 10);
        assert!(pages.len() > 1);
        assert!(pages.iter().all(|p| p.line_count() <= 10));

        let total: usize = pages
            .iter()
            .flat_map(|p| &p.blocks)
            .map(|b| match b {
                Block::Answers { items, .. } => items.len(),
                _ => 0,
            })
            .sum();
        assert_eq!(total, 25);
    }

    #[test]
    fn test_empty_report_has_one_page() {
        let pages = paginate(vec![], 10);
        assert_eq!(pages.len(), 1);
        assert!(pages[0].blocks.is_empty());
    }

    #[test]
    fn test_build_report_from_aggregation() {
        let survey = survey();
        let mut aggregation = aggregate(&survey, &[]);
        aggregation.response_count = 2;
        aggregation.tallies = vec![QuestionTally {
            question_id: QuestionId::from("q2"),
            question_text: "Age".to_string(),
            kind: QuestionKind::SingleChoice,
            chart: ChartKind::Pie,
            data: vec![
                OptionCount {
                    option_id: OptionId::from("q2-o1"),
                    name: "18-20".to_string(),
                    value: 2,
                },
                OptionCount {
                    option_id: OptionId::from("q2-o2"),
                    name: "21-23".to_string(),
                    value: 0,
                },
            ],
            any_selected: true,
        }];
        aggregation.text_answers = vec![
            TextAnswers {
                question_id: QuestionId::from("t1"),
                question_text: "Anything else?".to_string(),
                answers: vec!["More sleep | less scrolling".to_string()],
            },
            TextAnswers {
                question_id: QuestionId::from("t2"),
                question_text: "Unanswered".to_string(),
                answers: vec![],
            },
        ];

        let report = build_report(
            &survey,
            &aggregation,
            Some("Most students sleep late."),
            ReportOptions::default(),
        );
        assert_eq!(report.file_name, "Student_Lifestyle_Survey_analysis_report.md");

        let markdown = render_markdown(&report);
        assert!(markdown.starts_with("# Student Lifestyle Survey\n"));
        assert!(markdown.contains("**Total responses:** 2"));
        assert!(markdown.contains("## AI-Generated Summary"));
        assert!(markdown.contains("| 18-20 | 2 |"));
        assert!(markdown.contains("| 21-23 | 0 |"));
        assert!(markdown.contains("- More sleep | less scrolling"));
        assert!(!markdown.contains("Unanswered"));
        assert!(markdown.contains("*Page 1 of 1"));
    }

    #[test]
    fn test_report_without_summary_and_multiple_pages() {
        let survey = survey();
        let aggregation = aggregate(&survey, &[]);
        let options = ReportOptions {
            lines_per_page: 20,
            wrap_width: 80,
        };

        let report = build_report(&survey, &aggregation, None, options);
        assert!(report.page_count() > 1);

        let markdown = render_markdown(&report);
        assert!(!markdown.contains(SUMMARY_HEADING));
        assert_eq!(markdown.matches("---\n\n").count(), report.page_count() - 1);
        assert!(markdown.contains(&format!("*Page {} of {}", report.page_count(), report.page_count())));
    }

    #[test]
    fn test_summary_report() {
        let survey = survey();
        let report = build_summary_report(&survey, "Short summary.", ReportOptions::default());
        assert_eq!(report.file_name, "Student_Lifestyle_Survey_summary.md");

        let markdown = render_markdown(&report);
        assert!(markdown.contains("## AI-Generated Summary"));
        assert!(markdown.contains("Short summary."));
        assert!(!markdown.contains("Total responses"));
    }

    #[test]
    fn test_render_json() {
        let survey = survey();
        let report = build_summary_report(&survey, "Short summary.", ReportOptions::default());
        let json: serde_json::Value = serde_json::from_str(&render_json(&report).unwrap()).unwrap();

        assert_eq!(json["pages"][0]["blocks"][0]["type"], "title");
        assert_eq!(json["pages"][0]["blocks"][1]["type"], "summary");
    }
}
