use super::{ResponseStore, StoreError};
use crate::models::{Response, ResponseId, SurveyId};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

/// Process-local store, lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    responses: RwLock<Vec<Response>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_responses(responses: Vec<Response>) -> Self {
        Self {
            responses: RwLock::new(responses),
        }
    }
}

#[async_trait]
impl ResponseStore for MemoryStore {
    async fn add(&self, response: Response) -> Result<ResponseId, StoreError> {
        let id = response.id;
        self.responses.write().await.push(response);
        Ok(id)
    }

    async fn query_by_survey(&self, survey_id: &SurveyId) -> Result<Vec<Response>, StoreError> {
        Ok(self
            .responses
            .read()
            .await
            .iter()
            .filter(|r| &r.survey_id == survey_id)
            .cloned()
            .collect())
    }

    async fn delete_by_survey(&self, survey_id: &SurveyId) -> Result<usize, StoreError> {
        let mut responses = self.responses.write().await;
        let before = responses.len();
        responses.retain(|r| &r.survey_id != survey_id);
        let deleted = before - responses.len();
        debug!("Deleted {} responses for {}", deleted, survey_id);
        Ok(deleted)
    }
}
