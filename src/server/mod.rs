//! HTTP API.
//!
//! Public routes serve the catalog, accept submissions and hand out usage
//! advice. Everything under the admin gate (results, summaries, exports,
//! deletion, drafts) requires a bearer token.

pub mod handlers;

use crate::catalog::{SurveyCatalog, SurveyDraft};
use crate::config::Config;
use crate::error::{Error, ErrorBody};
use crate::export::ReportOptions;
use crate::store::ResponseStore;
use crate::submission::RawSubmission;
use crate::summary::{InFlight, SummaryService};
use serde_json::json;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use warp::filters::body::BodyDeserializeError;
use warp::http::{Method, StatusCode};
use warp::{Filter, Rejection, Reply};

/// Largest accepted JSON body.
const MAX_BODY_BYTES: u64 = 64 * 1024;

/// Settings the handlers read on every request.
#[derive(Debug, Clone)]
pub struct Settings {
    pub admin_token: Option<String>,
    pub filter_questions: Vec<String>,
    pub advice_questions: Vec<String>,
    pub report: ReportOptions,
}

impl Settings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            admin_token: config
                .auth
                .admin_token
                .clone()
                .filter(|t| !t.trim().is_empty()),
            filter_questions: config.filters.questions.clone(),
            advice_questions: config.advice.questions.clone(),
            report: ReportOptions::from(&config.report),
        }
    }
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<SurveyCatalog>,
    pub store: Arc<dyn ResponseStore>,
    pub summarizer: Arc<dyn SummaryService>,
    pub settings: Arc<Settings>,
    pub in_flight: InFlight,
}

impl AppState {
    pub fn new(
        catalog: Arc<SurveyCatalog>,
        store: Arc<dyn ResponseStore>,
        summarizer: Arc<dyn SummaryService>,
        settings: Settings,
    ) -> Self {
        Self {
            catalog,
            store,
            summarizer,
            settings: Arc::new(settings),
            in_flight: InFlight::new(),
        }
    }
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn json_body<T: serde::de::DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

/// Check an `Authorization` header against the configured admin token.
pub fn authorize(settings: &Settings, header: Option<&str>) -> Result<(), Error> {
    let expected = match settings.admin_token.as_deref() {
        Some(token) => token,
        None => {
            warn!("Admin route requested but no admin token is configured");
            return Err(Error::Unauthorized);
        }
    };

    let presented = header
        .and_then(|h| h.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim());

    match presented {
        Some(token) if token == expected => Ok(()),
        _ => Err(Error::Unauthorized),
    }
}

/// Rejects the request unless it carries the admin token.
fn admin(state: AppState) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and_then(move |header: Option<String>| {
            let settings = Arc::clone(&state.settings);
            async move {
                authorize(&settings, header.as_deref()).map_err(warp::reject::custom)
            }
        })
        .untuple_one()
}

/// All routes, with error recovery and CORS applied.
pub fn routes(state: AppState) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type", "authorization"])
        .allow_methods(&[Method::GET, Method::POST, Method::DELETE]);

    let health = warp::path!("health")
        .and(warp::get())
        .map(|| warp::reply::json(&json!({ "status": "ok" })));

    let list_surveys = warp::path!("api" / "surveys")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::list_surveys);

    let get_survey = warp::path!("api" / "surveys" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::get_survey);

    let submit = warp::path!("api" / "surveys" / String / "responses")
        .and(warp::post())
        .and(json_body::<RawSubmission>())
        .and(with_state(state.clone()))
        .and_then(handlers::submit_response);

    let advice = warp::path!("api" / "surveys" / String / "advice")
        .and(warp::post())
        .and(json_body::<RawSubmission>())
        .and(with_state(state.clone()))
        .and_then(handlers::request_advice);

    let drafts = warp::path!("api" / "surveys" / "drafts")
        .and(warp::post())
        .and(admin(state.clone()))
        .and(json_body::<SurveyDraft>())
        .and_then(handlers::build_draft);

    let facets = warp::path!("api" / "surveys" / String / "filters")
        .and(warp::get())
        .and(admin(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::filter_facets);

    let results = warp::path!("api" / "surveys" / String / "results")
        .and(warp::get())
        .and(admin(state.clone()))
        .and(warp::query::<HashMap<String, String>>())
        .and(with_state(state.clone()))
        .and_then(handlers::results);

    let summary = warp::path!("api" / "surveys" / String / "summary")
        .and(warp::post())
        .and(admin(state.clone()))
        .and(warp::query::<HashMap<String, String>>())
        .and(with_state(state.clone()))
        .and_then(handlers::summarize);

    let export_csv = warp::path!("api" / "surveys" / String / "export" / "csv")
        .and(warp::get())
        .and(admin(state.clone()))
        .and(warp::query::<HashMap<String, String>>())
        .and(with_state(state.clone()))
        .and_then(handlers::export_csv);

    let export_report = warp::path!("api" / "surveys" / String / "export" / "report")
        .and(warp::get())
        .and(admin(state.clone()))
        .and(warp::query::<HashMap<String, String>>())
        .and(with_state(state.clone()))
        .and_then(handlers::export_report);

    let delete = warp::path!("api" / "surveys" / String / "responses")
        .and(warp::delete())
        .and(admin(state.clone()))
        .and(with_state(state))
        .and_then(handlers::delete_responses);

    health
        .or(list_surveys)
        .or(get_survey)
        .or(submit)
        .or(advice)
        .or(drafts)
        .or(facets)
        .or(results)
        .or(summary)
        .or(export_csv)
        .or(export_report)
        .or(delete)
        .with(warp::trace::request())
        .recover(handle_rejection)
        .with(cors)
}

/// Turn rejections into JSON error replies.
pub async fn handle_rejection(r: Rejection) -> Result<impl Reply, Infallible> {
    let (status, body) = if let Some(e) = r.find::<Error>() {
        if e.is_internal() {
            error!("Request failed: {}", e);
        } else {
            debug!("Request rejected: {}", e);
        }
        (e.status(), e.body())
    } else if r.is_not_found() {
        (
            StatusCode::NOT_FOUND,
            ErrorBody {
                error: "not_found",
                message: "Route not found".to_string(),
            },
        )
    } else if let Some(e) = r.find::<BodyDeserializeError>() {
        (
            StatusCode::BAD_REQUEST,
            ErrorBody {
                error: "invalid_request",
                message: e.to_string(),
            },
        )
    } else if let Some(e) = r.find::<warp::reject::InvalidQuery>() {
        (
            StatusCode::BAD_REQUEST,
            ErrorBody {
                error: "invalid_request",
                message: e.to_string(),
            },
        )
    } else if r.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            ErrorBody {
                error: "invalid_request",
                message: "Request body too large".to_string(),
            },
        )
    } else if r.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            ErrorBody {
                error: "method_not_allowed",
                message: "Method not allowed".to_string(),
            },
        )
    } else {
        error!("Unhandled rejection: {:?}", r);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody {
                error: "internal",
                message: "Internal server error".to_string(),
            },
        )
    };

    Ok(warp::reply::with_status(warp::reply::json(&body), status))
}

/// Serve the API until the process is stopped.
pub async fn serve(state: AppState, addr: SocketAddr) {
    if state.settings.admin_token.is_none() {
        warn!("No admin token configured; admin routes will refuse every request");
    }
    info!("Listening on http://{}", addr);
    warp::serve(routes(state)).run(addr).await;
}
