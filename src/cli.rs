//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::analysis::parse_filter_arg;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Survey Insights - survey responses, charts and AI summaries
///
/// Collect responses over HTTP, filter and tally them, export CSV or
/// paginated reports, and ask an AI service for a narrative summary.
///
/// Examples:
///   survey-insights serve --port 3030
///   survey-insights export --survey student-lifestyle-survey --format csv
///   survey-insights export --survey student-lifestyle-survey --filter q2=21-23 --format markdown
///   survey-insights summarize --survey student-lifestyle-survey --filter q8=Instagram
///   survey-insights --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .survey-insights.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// AI summarization service base URL
    #[arg(long, value_name = "URL", env = "SURVEY_INSIGHTS_AI_URL", global = true)]
    pub ai_url: Option<String>,

    /// Model name passed to the AI service
    #[arg(long, value_name = "MODEL", env = "SURVEY_INSIGHTS_MODEL", global = true)]
    pub model: Option<String>,

    /// Response store file (overrides [store] path)
    #[arg(long, value_name = "FILE", global = true)]
    pub store: Option<PathBuf>,

    /// Generate a default .survey-insights.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP API
    Serve {
        /// Address to bind
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,

        /// Port to listen on
        #[arg(short, long, value_name = "PORT")]
        port: Option<u16>,

        /// Admin session token required on admin routes
        #[arg(long, value_name = "TOKEN", env = "SURVEY_INSIGHTS_ADMIN_TOKEN", hide_env_values = true)]
        admin_token: Option<String>,
    },

    /// Export filtered responses as CSV or a report
    Export {
        /// Survey id
        #[arg(short, long, value_name = "ID")]
        survey: String,

        /// Output format (csv, markdown, json)
        #[arg(long, default_value = "csv", value_name = "FORMAT")]
        format: ExportFormat,

        /// Filter as QUESTION=VALUE; repeatable, combined with AND
        #[arg(short = 'f', long = "filter", value_name = "QUESTION=VALUE")]
        filters: Vec<String>,

        /// Output file (defaults to a name derived from the survey title)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Narrative summary to embed in the report
        #[arg(long, value_name = "FILE")]
        summary_file: Option<PathBuf>,
    },

    /// Ask the AI service to summarize filtered responses
    Summarize {
        /// Survey id
        #[arg(short, long, value_name = "ID")]
        survey: String,

        /// Filter as QUESTION=VALUE; repeatable, combined with AND
        #[arg(short = 'f', long = "filter", value_name = "QUESTION=VALUE")]
        filters: Vec<String>,

        /// Write the summary to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Write a Markdown summary report instead of plain text
        #[arg(long)]
        report: bool,
    },

    /// Validate the survey catalog and report stored response counts
    Check,
}

/// Export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExportFormat {
    /// Comma-separated values (default)
    #[default]
    Csv,
    /// Paginated Markdown report
    Markdown,
    /// Paginated report as JSON
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        let command = match self.command {
            Some(ref command) => command,
            None => return Err("A subcommand is required (try --help)".to_string()),
        };

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.ai_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("AI service URL must start with 'http://' or 'https://'".to_string());
            }
        }

        match command {
            Command::Serve { port: Some(0), .. } => {
                return Err("Port must be at least 1".to_string());
            }
            Command::Serve {
                admin_token: Some(token),
                ..
            } if token.trim().is_empty() => {
                return Err("Admin token must not be empty".to_string());
            }
            Command::Export { filters, .. } | Command::Summarize { filters, .. } => {
                for filter in filters {
                    parse_filter_arg(filter).map_err(|e| e.to_string())?;
                }
            }
            _ => {}
        }

        Ok(())
    }
}
