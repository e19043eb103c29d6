//! Response persistence.
//!
//! The application only needs three operations from its document store:
//! add a response, query responses by survey id, and delete every response
//! of a survey as one batch.

pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use crate::config::{StoreBackend, StoreConfig};
use crate::models::{Response, ResponseId, SurveyId};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store file {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize responses: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("store task failed: {0}")]
    Task(String),
}

#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// Persist a new response.
    async fn add(&self, response: Response) -> Result<ResponseId, StoreError>;

    /// All responses of a survey, in insertion order.
    async fn query_by_survey(&self, survey_id: &SurveyId) -> Result<Vec<Response>, StoreError>;

    /// Delete every response of a survey. Either all of them go or none do.
    /// Returns the number deleted.
    async fn delete_by_survey(&self, survey_id: &SurveyId) -> Result<usize, StoreError>;
}

/// Open the store selected by configuration.
pub fn open(config: &StoreConfig) -> Result<Arc<dyn ResponseStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory response store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::File => {
            let store = JsonFileStore::new(PathBuf::from(&config.path));
            info!("Using JSON file response store at {}", store.path().display());
            Ok(Arc::new(store))
        }
    }
}
