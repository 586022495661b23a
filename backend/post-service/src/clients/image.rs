//! Image service client
//!
//! Talks to the image service REST API. Attachment groups are keyed by the
//! parent entity id (the post id); upload is multipart, reads are JSON.

use crate::config::ImageServiceConfig;
use crate::error::{AppError, Result};
use crate::models::{Attachment, AttachmentGroup, ImageType, Page};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Contract for the remote image service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageClient: Send + Sync {
    /// Store files under the given parent id.
    async fn upload(
        &self,
        image_type: ImageType,
        parent_id: Uuid,
        files: Vec<Attachment>,
    ) -> Result<AttachmentGroup>;

    /// Fetch the attachment group for one parent id; None when the service
    /// holds nothing for it.
    async fn get_by_parent(&self, parent_id: Uuid) -> Result<Option<AttachmentGroup>>;

    /// Fetch the attachment groups for exactly the given parent ids in one
    /// call. Parents with no attachments are simply absent from the result.
    async fn get_by_parents(&self, parent_ids: Vec<Uuid>) -> Result<Vec<AttachmentGroup>>;

    /// Remove everything stored under the given parent id.
    async fn delete_by_parent(&self, parent_id: Uuid) -> Result<()>;
}

/// reqwest-backed image service client
pub struct HttpImageClient {
    base_url: String,
    http: Client,
}

impl HttpImageClient {
    pub fn new(cfg: &ImageServiceConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: format!("{}/api/v1/images", cfg.base_url.trim_end_matches('/')),
            http,
        })
    }

    async fn check_status(response: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(AppError::Upstream(format!(
            "{context} failed with status {status}: {body}"
        )))
    }
}

#[async_trait]
impl ImageClient for HttpImageClient {
    async fn upload(
        &self,
        image_type: ImageType,
        parent_id: Uuid,
        files: Vec<Attachment>,
    ) -> Result<AttachmentGroup> {
        let mut form = reqwest::multipart::Form::new()
            .text("imageType", image_type.as_str())
            .text("parentEntityId", parent_id.to_string());
        for file in files {
            let part = reqwest::multipart::Part::bytes(file.data).file_name(file.name);
            form = form.part("file", part);
        }

        debug!(%parent_id, "uploading attachments to image service");

        let response = self
            .http
            .post(&self.base_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("image upload failed: {e}")))?;

        let response = Self::check_status(response, "image upload").await?;

        response
            .json::<AttachmentGroup>()
            .await
            .map_err(|e| AppError::Upstream(format!("invalid image upload response: {e}")))
    }

    async fn get_by_parent(&self, parent_id: Uuid) -> Result<Option<AttachmentGroup>> {
        let response = self
            .http
            .get(format!("{}/parent", self.base_url))
            .query(&[("id", parent_id.to_string())])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("image fetch failed: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = Self::check_status(response, "image fetch").await?;

        let group = response
            .json::<AttachmentGroup>()
            .await
            .map_err(|e| AppError::Upstream(format!("invalid image fetch response: {e}")))?;

        Ok(Some(group))
    }

    async fn get_by_parents(&self, parent_ids: Vec<Uuid>) -> Result<Vec<AttachmentGroup>> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = parent_ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");

        // One page sized to the id set: the batch is keyed by exactly these
        // ids and never coupled to the caller's pagination.
        let response = self
            .http
            .get(format!("{}/parents", self.base_url))
            .query(&[
                ("ids", ids),
                ("page_number", "0".to_string()),
                ("size", parent_ids.len().to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("image batch fetch failed: {e}")))?;

        let response = Self::check_status(response, "image batch fetch").await?;

        let page = response
            .json::<Page<AttachmentGroup>>()
            .await
            .map_err(|e| AppError::Upstream(format!("invalid image batch response: {e}")))?;

        Ok(page.items)
    }

    async fn delete_by_parent(&self, parent_id: Uuid) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}/parent", self.base_url))
            .query(&[("id", parent_id.to_string())])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("image delete failed: {e}")))?;

        Self::check_status(response, "image delete").await?;

        Ok(())
    }
}
