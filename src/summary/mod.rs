//! AI-generated summaries and usage advice.
//!
//! Request assembly is local and deterministic (see [`prompt`]); the
//! summarization itself is delegated to an external service through the
//! [`SummaryService`] trait.

pub mod client;
pub mod prompt;

pub use client::from_config;

use crate::models::{Answer, QuestionId, Response, Survey, SurveyId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info};

/// Returned instead of calling the service when nothing matches the filters.
pub const NO_MATCHING_RESPONSES: &str = "No responses match the current filters.";

/// Input of the survey summary flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRequest {
    /// JSON array of question texts.
    pub survey_questions: String,
    /// JSON array of per-response `question text -> answer` maps.
    pub survey_responses: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub summary: String,
}

/// Input of the usage advice flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdviceRequest {
    /// JSON array of `{question, answer}` objects.
    pub usage_data: String,
    /// JSON array of question texts.
    pub questions: String,
}

/// Bullet-list advice in both languages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advice {
    pub english: String,
    pub sinhala: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdviceResponse {
    pub summary: String,
    pub advice: Advice,
}

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("cannot connect to AI service at {0}")]
    Connect(String),

    #[error("AI service request timed out after {0}s")]
    Timeout(u64),

    #[error("AI service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("AI service returned malformed output: {0}")]
    Malformed(String),

    #[error("AI service request failed: {0}")]
    Request(String),

    #[error("failed to encode AI request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("No usage data provided.")]
    NoUsageData,
}

/// External summarization service.
#[async_trait]
pub trait SummaryService: Send + Sync {
    async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryResponse, SummaryError>;

    async fn advise(&self, request: &AdviceRequest) -> Result<AdviceResponse, SummaryError>;
}

/// Result of a summary request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    Generated(String),
    /// The filtered collection was empty; the service was not called.
    NoMatchingResponses,
}

impl SummaryOutcome {
    pub fn text(&self) -> &str {
        match self {
            SummaryOutcome::Generated(s) => s,
            SummaryOutcome::NoMatchingResponses => NO_MATCHING_RESPONSES,
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, SummaryOutcome::Generated(_))
    }
}

/// Summarize an already filtered response collection.
pub async fn summarize_responses(
    service: &dyn SummaryService,
    survey: &Survey,
    responses: &[Response],
) -> Result<SummaryOutcome, SummaryError> {
    if responses.is_empty() {
        debug!("No responses to summarize for {}", survey.id);
        return Ok(SummaryOutcome::NoMatchingResponses);
    }

    let request = prompt::build_summary_request(survey, responses)?;
    info!(
        "Requesting AI summary of {} responses for {}",
        responses.len(),
        survey.id
    );
    let response = service.summarize(&request).await?;

    Ok(SummaryOutcome::Generated(response.summary))
}

/// Personalised advice from one respondent's usage answers.
pub async fn advise(
    service: &dyn SummaryService,
    survey: &Survey,
    answers: &BTreeMap<QuestionId, Answer>,
    usage_questions: &[String],
) -> Result<AdviceResponse, SummaryError> {
    let request = prompt::build_advice_request(survey, answers, usage_questions)?
        .ok_or(SummaryError::NoUsageData)?;

    info!("Requesting usage advice for {}", survey.id);
    service.advise(&request).await
}

/// Tracks surveys with a summarization call in progress.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    active: Arc<Mutex<HashSet<SurveyId>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the survey; `None` if a call for it is already pending.
    pub fn try_acquire(&self, survey_id: &SurveyId) -> Option<InFlightGuard> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.insert(survey_id.clone()) {
            Some(InFlightGuard {
                active: Arc::clone(&self.active),
                survey_id: survey_id.clone(),
            })
        } else {
            None
        }
    }

    #[allow(dead_code)] // Utility for status checks
    pub fn is_active(&self, survey_id: &SurveyId) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(survey_id)
    }
}

/// Releases the claim when dropped, whether the call succeeded or failed.
#[derive(Debug)]
pub struct InFlightGuard {
    active: Arc<Mutex<HashSet<SurveyId>>>,
    survey_id: SurveyId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.survey_id);
    }
}
