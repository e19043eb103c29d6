//! Survey Insights - survey response aggregation, filtering and AI summaries
//!
//! Serves surveys and collects responses over HTTP, tallies and filters
//! them for the admin results view, exports CSV and paginated reports, and
//! asks an external AI service for narrative summaries.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (configuration, store, AI service, etc.)

mod analysis;
mod catalog;
mod cli;
mod config;
mod error;
mod export;
mod models;
mod server;
mod store;
mod submission;
mod summary;

use analysis::{aggregate, filter_responses, parse_filter_arg, FilterConfig};
use anyhow::{Context, Result};
use catalog::SurveyCatalog;
use cli::{Args, Command, ExportFormat};
use config::Config;
use export::ReportOptions;
use indicatif::{ProgressBar, ProgressStyle};
use models::{Survey, SurveyId};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config comes first so `[general] verbose` can pick the log level
    let (mut config, source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(config.log_level(args.quiet));

    info!("Survey Insights v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match source {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }

    if let Err(e) = run(args, config).await {
        error!("Command failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .survey-insights.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE);
    println!("   Edit it to set the admin token, AI service, store and filters.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Dispatch the subcommand.
async fn run(args: Args, config: Config) -> Result<()> {
    let catalog = Arc::new(load_catalog(&config)?);

    let command = args
        .command
        .clone()
        .context("A subcommand is required (try --help)")?;

    match command {
        Command::Serve { .. } => run_server(config, catalog).await,
        Command::Export {
            survey,
            format,
            filters,
            output,
            summary_file,
        } => {
            run_export(
                &config,
                &catalog,
                &survey,
                format,
                &filters,
                output,
                summary_file,
            )
            .await
        }
        Command::Summarize {
            survey,
            filters,
            output,
            report,
        } => run_summarize(&config, &catalog, &survey, &filters, output, report, args.quiet).await,
        Command::Check => run_check(&config, &catalog).await,
    }
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so it reports where the config came
/// from instead of logging it.
fn load_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, Some(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, Some(PathBuf::from(config::CONFIG_FILE)))),
        Ok(None) => Ok((Config::default(), None)),
        Err(e) => {
            eprintln!("⚠️  Failed to load {}: {:#}", config::CONFIG_FILE, e);
            Ok((Config::default(), None))
        }
    }
}

fn load_catalog(config: &Config) -> Result<SurveyCatalog> {
    match config.catalog.path {
        Some(ref path) => SurveyCatalog::load(Path::new(path))
            .with_context(|| format!("Failed to load survey catalog from {}", path)),
        None => SurveyCatalog::builtin().context("Bundled survey catalog is invalid"),
    }
}

fn find_survey<'a>(catalog: &'a SurveyCatalog, id: &str) -> Result<&'a Survey> {
    catalog
        .get(&SurveyId::from(id))
        .with_context(|| format!("Survey '{}' not found", id))
}

/// Turn repeated `--filter QUESTION=VALUE` arguments into a filter.
fn resolve_filters(survey: &Survey, filters: &[String]) -> Result<FilterConfig> {
    let pairs = filters
        .iter()
        .map(|f| parse_filter_arg(f))
        .collect::<Result<Vec<_>, _>>()?;

    let filter = FilterConfig::from_params(
        survey,
        pairs.iter().map(|(q, v)| (q.as_str(), v.as_str())),
    )?;
    Ok(filter)
}

async fn run_server(config: Config, catalog: Arc<SurveyCatalog>) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid bind address {}:{}",
                config.server.bind, config.server.port
            )
        })?;

    let store = store::open(&config.store).context("Failed to open response store")?;
    let summarizer =
        summary::from_config(&config.model).context("Failed to set up AI service client")?;

    println!("🚀 Starting Survey Insights API");
    println!("   Surveys: {}", catalog.len());
    println!("   Store: {:?} ({})", config.store.backend, config.store.path);
    println!("   AI service: {} ({:?})", config.model.service_url, config.model.backend);

    let state = server::AppState::new(
        catalog,
        store,
        summarizer,
        server::Settings::from_config(&config),
    );
    server::serve(state, addr).await;

    Ok(())
}

async fn run_export(
    config: &Config,
    catalog: &SurveyCatalog,
    survey_id: &str,
    format: ExportFormat,
    filters: &[String],
    output: Option<PathBuf>,
    summary_file: Option<PathBuf>,
) -> Result<()> {
    let survey = find_survey(catalog, survey_id)?;
    let filter = resolve_filters(survey, filters)?;

    let store = store::open(&config.store).context("Failed to open response store")?;
    let all = store.query_by_survey(&survey.id).await?;
    let responses = filter_responses(&all, &filter);
    if filter.is_active() {
        info!("{} of {} responses match the filters", responses.len(), all.len());
    }

    let (content, default_name) = match format {
        ExportFormat::Csv => (
            export::export_csv(survey, &responses),
            export::csv_file_name(survey),
        ),
        ExportFormat::Markdown | ExportFormat::Json => {
            let summary = match summary_file {
                Some(ref path) => Some(std::fs::read_to_string(path).with_context(|| {
                    format!("Failed to read summary file {}", path.display())
                })?),
                None => None,
            };

            let aggregation = aggregate(survey, &responses);
            let document = export::build_report(
                survey,
                &aggregation,
                summary.as_deref(),
                ReportOptions::from(&config.report),
            );

            if format == ExportFormat::Json {
                (
                    export::render_json(&document)?,
                    export::report_file_name(survey, "json"),
                )
            } else {
                (export::render_markdown(&document), document.file_name.clone())
            }
        }
    };

    let path = output.unwrap_or_else(|| PathBuf::from(default_name));
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write export to {}", path.display()))?;

    println!(
        "✅ Exported {} of {} responses to {}",
        responses.len(),
        all.len(),
        path.display()
    );
    Ok(())
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

async fn run_summarize(
    config: &Config,
    catalog: &SurveyCatalog,
    survey_id: &str,
    filters: &[String],
    output: Option<PathBuf>,
    as_report: bool,
    quiet: bool,
) -> Result<()> {
    let survey = find_survey(catalog, survey_id)?;
    let filter = resolve_filters(survey, filters)?;

    let store = store::open(&config.store).context("Failed to open response store")?;
    let all = store.query_by_survey(&survey.id).await?;
    let responses = filter_responses(&all, &filter);

    let summarizer =
        summary::from_config(&config.model).context("Failed to set up AI service client")?;

    let progress = (!quiet && !responses.is_empty()).then(|| {
        spinner(&format!(
            "Summarizing {} responses with {}...",
            responses.len(),
            config.model.service_url
        ))
    });

    let result = summary::summarize_responses(summarizer.as_ref(), survey, &responses).await;
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    let outcome = result.context("Could not connect to the AI service or process the data")?;

    let text = if as_report {
        let document =
            export::build_summary_report(survey, outcome.text(), ReportOptions::from(&config.report));
        export::render_markdown(&document)
    } else {
        outcome.text().to_string()
    };

    match output {
        Some(path) => {
            std::fs::write(&path, &text)
                .with_context(|| format!("Failed to write summary to {}", path.display()))?;
            println!("✅ Summary saved to: {}", path.display());
        }
        None => println!("{}", text),
    }

    Ok(())
}

async fn run_check(config: &Config, catalog: &SurveyCatalog) -> Result<()> {
    let store = store::open(&config.store).context("Failed to open response store")?;

    println!("🔍 Survey catalog: {} surveys", catalog.len());
    for survey in catalog.surveys() {
        let responses = store
            .query_by_survey(&survey.id)
            .await
            .with_context(|| format!("Failed to read responses of {}", survey.id))?;
        let facets = analysis::filter_facets(survey, &config.filters.questions);

        println!("   📋 {} ({})", survey.title, survey.id);
        println!(
            "      Questions: {} | Sections: {} | Responses: {}",
            survey.answerable_questions().count(),
            survey.sections().len(),
            responses.len()
        );
        println!("      Filters: {}", facets.len());
    }

    println!("\n✅ Catalog and store look good.");
    Ok(())
}
