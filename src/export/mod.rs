//! CSV and document exports of filtered responses.

pub mod csv;
pub mod report;

pub use self::csv::{csv_file_name, export_csv};
pub use self::report::{
    build_report, build_summary_report, render_json, render_markdown, report_file_name,
    ReportOptions,
};
