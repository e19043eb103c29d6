//! Request-scoped errors and their HTTP mapping.

use crate::analysis::FilterError;
use crate::catalog::DraftError;
use crate::models::SurveyId;
use crate::store::StoreError;
use crate::submission::SubmissionError;
use crate::summary::SummaryError;
use serde::Serialize;
use thiserror::Error;
use warp::http::StatusCode;
use warp::reject::Reject;

#[derive(Debug, Error)]
pub enum Error {
    #[error("survey '{0}' not found")]
    SurveyNotFound(SurveyId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Summary(#[from] SummaryError),

    #[error("{0}")]
    Validation(String),

    #[error("invalid survey draft: {0}")]
    Draft(#[from] DraftError),

    #[error("invalid submission: {0}")]
    InvalidSubmission(#[from] SubmissionError),

    #[error("invalid filter: {0}")]
    InvalidFilter(#[from] FilterError),

    #[error("admin login required")]
    Unauthorized,

    #[error("a summary for survey '{0}' is already being generated")]
    SummaryInProgress(SurveyId),

    #[error("failed to encode reply: {0}")]
    Encode(#[from] serde_json::Error),
}

impl Reject for Error {}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::SurveyNotFound(_) => StatusCode::NOT_FOUND,
            Error::Store(_) | Error::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Summary(SummaryError::NoUsageData) => StatusCode::BAD_REQUEST,
            Error::Summary(_) => StatusCode::BAD_GATEWAY,
            Error::Validation(_) | Error::InvalidFilter(_) => StatusCode::BAD_REQUEST,
            Error::Draft(_) | Error::InvalidSubmission(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::SummaryInProgress(_) => StatusCode::CONFLICT,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Error::SurveyNotFound(_) => "not_found",
            Error::Store(_) | Error::Encode(_) => "operation_failed",
            Error::Summary(SummaryError::NoUsageData) => "invalid_request",
            Error::Summary(_) => "summary_failed",
            Error::Validation(_)
            | Error::Draft(_)
            | Error::InvalidSubmission(_)
            | Error::InvalidFilter(_) => "invalid_request",
            Error::Unauthorized => "login_required",
            Error::SummaryInProgress(_) => "summary_in_progress",
        }
    }

    /// Message safe to show to clients. Store and AI details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Error::Store(_) | Error::Encode(_) => {
                "The operation failed. Please try again.".to_string()
            }
            Error::Summary(SummaryError::NoUsageData) => self.to_string(),
            Error::Summary(_) => {
                "Could not connect to the AI service or process the data.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Whether the failure is on our side (or upstream) rather than the client's.
    pub fn is_internal(&self) -> bool {
        self.status().is_server_error()
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.code(),
            message: self.public_message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            Error::SurveyNotFound(SurveyId::from("x")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(Error::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            Error::SummaryInProgress(SurveyId::from("x")).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::from(SummaryError::Timeout(30)).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            Error::from(SummaryError::NoUsageData).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_internal_details_are_not_exposed() {
        let err = Error::from(StoreError::Io {
            path: PathBuf::from("/srv/data/responses.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        });
        assert!(err.is_internal());
        assert!(!err.public_message().contains("/srv/data"));
        assert_eq!(err.code(), "operation_failed");

        let err = Error::from(SummaryError::Status {
            status: 500,
            body: "stack trace".to_string(),
        });
        assert!(!err.public_message().contains("stack trace"));
    }

    #[test]
    fn test_unauthorized_body() {
        let body = Error::Unauthorized.body();
        assert_eq!(body.error, "login_required");
        assert!(!Error::Unauthorized.is_internal());
    }
}
