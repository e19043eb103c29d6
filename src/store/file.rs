//! JSON file backed response store.
//!
//! The whole collection lives in one JSON array. Every write goes to a
//! temporary file in the same directory which is then renamed over the
//! original, so a failed write never leaves a half-written file behind.

use super::{ResponseStore, StoreError};
use crate::models::{Response, ResponseId, SurveyId};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<Response>, StoreError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || load_all(&path))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    async fn save(&self, responses: Vec<Response>) -> Result<(), StoreError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_all(&path, &responses))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn load_all(path: &Path) -> Result<Vec<Response>, StoreError> {
    if !path.exists() {
        debug!("Store file {} does not exist yet", path.display());
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

fn write_all(path: &Path, responses: &[Response]) -> Result<(), StoreError> {
    let io_err = |source: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let content = serde_json::to_string_pretty(responses)?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
    tmp.write_all(content.as_bytes()).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    Ok(())
}

#[async_trait]
impl ResponseStore for JsonFileStore {
    async fn add(&self, response: Response) -> Result<ResponseId, StoreError> {
        let _guard = self.write_lock.lock().await;
        let id = response.id;

        let mut responses = self.load().await?;
        responses.push(response);
        self.save(responses).await?;

        debug!("Stored response {}", id);
        Ok(id)
    }

    async fn query_by_survey(&self, survey_id: &SurveyId) -> Result<Vec<Response>, StoreError> {
        let responses = self.load().await?;
        Ok(responses
            .into_iter()
            .filter(|r| &r.survey_id == survey_id)
            .collect())
    }

    async fn delete_by_survey(&self, survey_id: &SurveyId) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock().await;

        let responses = self.load().await?;
        let before = responses.len();
        let kept: Vec<Response> = responses
            .into_iter()
            .filter(|r| &r.survey_id != survey_id)
            .collect();
        let deleted = before - kept.len();

        if deleted == 0 {
            debug!("No responses found to delete for {}", survey_id);
            return Ok(0);
        }

        if let Err(e) = self.save(kept).await {
            warn!("Batch delete for {} failed, store unchanged: {}", survey_id, e);
            return Err(e);
        }

        Ok(deleted)
    }
}
