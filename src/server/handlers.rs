//! Route handlers.

use super::AppState;
use crate::analysis::{aggregate, filter_responses, Aggregation, FilterConfig, FilterFacet};
use crate::catalog::SurveyDraft;
use crate::error::Error;
use crate::export::{self, report};
use crate::models::{Response, ResponseId, Section, Survey, SurveyId};
use crate::submission::{self, RawSubmission};
use crate::summary;
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

/// Query keys on the report route that are not filters.
const REPORT_SUMMARY_PARAM: &str = "summary";
const REPORT_FORMAT_PARAM: &str = "format";

fn reject(e: impl Into<Error>) -> Rejection {
    warp::reject::custom(e.into())
}

fn find_survey<'a>(state: &'a AppState, id: &str) -> Result<&'a Survey, Rejection> {
    let id = SurveyId::from(id);
    state
        .catalog
        .get(&id)
        .ok_or_else(|| reject(Error::SurveyNotFound(id)))
}

fn filter_config(survey: &Survey, params: &HashMap<String, String>) -> Result<FilterConfig, Rejection> {
    FilterConfig::from_params(
        survey,
        params.iter().map(|(k, v)| (k.as_str(), v.as_str())),
    )
    .map_err(reject)
}

/// Stored responses of a survey narrowed by the filter.
async fn filtered_responses(
    state: &AppState,
    survey: &Survey,
    filter: &FilterConfig,
) -> Result<(usize, Vec<Response>), Rejection> {
    let all = state
        .store
        .query_by_survey(&survey.id)
        .await
        .map_err(reject)?;
    let filtered = filter_responses(&all, filter);
    Ok((all.len(), filtered))
}

#[derive(Debug, Serialize)]
struct SurveyView<'a> {
    #[serde(flatten)]
    survey: &'a Survey,
    sections: Vec<Section<'a>>,
}

#[derive(Debug, Serialize)]
struct Submitted {
    id: ResponseId,
}

#[derive(Debug, Serialize)]
struct ResultsView<'a> {
    survey_id: &'a SurveyId,
    total_count: usize,
    filtered_count: usize,
    filters: &'a FilterConfig,
    #[serde(flatten)]
    aggregation: Aggregation,
}

#[derive(Debug, Serialize)]
struct SummaryView {
    summary: String,
    generated: bool,
    response_count: usize,
}

#[derive(Debug, Serialize)]
struct FacetsView<'a> {
    survey_id: &'a SurveyId,
    facets: Vec<FilterFacet>,
}

#[derive(Debug, Serialize)]
struct Deleted {
    deleted: usize,
}

pub async fn list_surveys(state: AppState) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&state.catalog.listings()))
}

pub async fn get_survey(id: String, state: AppState) -> Result<impl Reply, Rejection> {
    let survey = find_survey(&state, &id)?;
    Ok(warp::reply::json(&SurveyView {
        survey,
        sections: survey.sections(),
    }))
}

pub async fn submit_response(
    id: String,
    raw: RawSubmission,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let survey = find_survey(&state, &id)?;
    let response = submission::build_response(survey, &raw).map_err(reject)?;
    let response_id = state.store.add(response).await.map_err(reject)?;

    info!("Stored response {} for {}", response_id, survey.id);
    Ok(warp::reply::with_status(
        warp::reply::json(&Submitted { id: response_id }),
        StatusCode::CREATED,
    ))
}

pub async fn request_advice(
    id: String,
    raw: RawSubmission,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let survey = find_survey(&state, &id)?;
    let answers = submission::parse_answers(survey, &raw).map_err(reject)?;

    let advice = summary::advise(
        state.summarizer.as_ref(),
        survey,
        &answers,
        &state.settings.advice_questions,
    )
    .await
    .map_err(reject)?;

    Ok(warp::reply::json(&advice))
}

pub async fn build_draft(draft: SurveyDraft) -> Result<impl Reply, Rejection> {
    let survey = draft.build().map_err(reject)?;
    Ok(warp::reply::json(&survey))
}

pub async fn filter_facets(id: String, state: AppState) -> Result<impl Reply, Rejection> {
    let survey = find_survey(&state, &id)?;
    Ok(warp::reply::json(&FacetsView {
        survey_id: &survey.id,
        facets: crate::analysis::filter_facets(survey, &state.settings.filter_questions),
    }))
}

pub async fn results(
    id: String,
    params: HashMap<String, String>,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let survey = find_survey(&state, &id)?;
    let filter = filter_config(survey, &params)?;
    let (total_count, filtered) = filtered_responses(&state, survey, &filter).await?;

    Ok(warp::reply::json(&ResultsView {
        survey_id: &survey.id,
        total_count,
        filtered_count: filtered.len(),
        filters: &filter,
        aggregation: aggregate(survey, &filtered),
    }))
}

pub async fn summarize(
    id: String,
    params: HashMap<String, String>,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let survey = find_survey(&state, &id)?;
    let filter = filter_config(survey, &params)?;

    let _guard = state
        .in_flight
        .try_acquire(&survey.id)
        .ok_or_else(|| reject(Error::SummaryInProgress(survey.id.clone())))?;

    let (_, filtered) = filtered_responses(&state, survey, &filter).await?;
    let outcome = summary::summarize_responses(state.summarizer.as_ref(), survey, &filtered)
        .await
        .map_err(reject)?;

    Ok(warp::reply::json(&SummaryView {
        summary: outcome.text().to_string(),
        generated: outcome.is_generated(),
        response_count: filtered.len(),
    }))
}

fn attachment(body: String, content_type: &str, file_name: &str) -> impl Reply {
    let reply = warp::reply::with_header(body, "content-type", content_type.to_string());
    warp::reply::with_header(
        reply,
        "content-disposition",
        format!("attachment; filename=\"{}\"", file_name),
    )
}

pub async fn export_csv(
    id: String,
    params: HashMap<String, String>,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let survey = find_survey(&state, &id)?;
    let filter = filter_config(survey, &params)?;
    let (_, filtered) = filtered_responses(&state, survey, &filter).await?;

    info!("Exporting {} responses of {} as CSV", filtered.len(), survey.id);
    Ok(attachment(
        export::export_csv(survey, &filtered),
        "text/csv; charset=utf-8",
        &export::csv_file_name(survey),
    ))
}

pub async fn export_report(
    id: String,
    mut params: HashMap<String, String>,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let survey = find_survey(&state, &id)?;
    let summary = params.remove(REPORT_SUMMARY_PARAM);
    let format = params.remove(REPORT_FORMAT_PARAM);
    let filter = filter_config(survey, &params)?;
    let (_, filtered) = filtered_responses(&state, survey, &filter).await?;

    let aggregation = aggregate(survey, &filtered);
    let document = report::build_report(
        survey,
        &aggregation,
        summary.as_deref(),
        state.settings.report,
    );

    let reply = match format.as_deref() {
        None | Some("markdown") | Some("md") => attachment(
            report::render_markdown(&document),
            "text/markdown; charset=utf-8",
            &document.file_name,
        ),
        Some("json") => {
            let body = report::render_json(&document).map_err(reject)?;
            attachment(
                body,
                "application/json",
                &report::report_file_name(survey, "json"),
            )
        }
        Some(other) => {
            return Err(reject(Error::Validation(format!(
                "unsupported report format '{}'",
                other
            ))))
        }
    };

    info!(
        "Exported {} page report of {} ({} responses)",
        document.page_count(),
        survey.id,
        filtered.len()
    );
    Ok(reply)
}

pub async fn delete_responses(id: String, state: AppState) -> Result<impl Reply, Rejection> {
    let survey = find_survey(&state, &id)?;
    let deleted = state
        .store
        .delete_by_survey(&survey.id)
        .await
        .map_err(reject)?;

    info!("Deleted {} responses of {}", deleted, survey.id);
    Ok(warp::reply::json(&Deleted { deleted }))
}
