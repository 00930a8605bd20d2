//! HTTP client for the generation backend: job submission and status polling.

use std::time::Instant;

use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use studio_core::types::DbId;

use crate::config::ExecutorConfig;

use super::error::ExecutorError;

pub const GENERATE_IMAGES_PATH: &str = "/api/images/generate-images";
pub const GENERATE_VTO_PATH: &str = "/api/images/generate-images-for-vto";
pub const GENERATE_VIDEOS_PATH: &str = "/api/videos/generate-videos";
pub const GENERATE_AUDIO_PATH: &str = "/api/audios/generate";

/// Backend answer to a job submission.
#[derive(Debug, Deserialize)]
struct CreatedMedia {
    #[serde(default)]
    id: Option<Value>,
}

/// The fields of a gallery item the poller looks at.
#[derive(Debug, Deserialize)]
struct GalleryItem {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default, rename = "errorMessage")]
    error_message_camel: Option<String>,
}

#[derive(Debug, PartialEq)]
enum JobStatus {
    Pending,
    Completed,
    Failed(String),
}

impl From<GalleryItem> for JobStatus {
    fn from(item: GalleryItem) -> Self {
        match item.status.as_deref() {
            Some("completed") => JobStatus::Completed,
            Some("failed") => JobStatus::Failed(
                item.error_message
                    .or(item.error_message_camel)
                    .unwrap_or_else(|| "Unknown error".to_string()),
            ),
            _ => JobStatus::Pending,
        }
    }
}

pub struct BackendClient {
    client: reqwest::Client,
    config: ExecutorConfig,
}

impl BackendClient {
    pub fn new(config: ExecutorConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// Submit a generation job and return the id of the media it creates.
    ///
    /// `what` names the media in the error raised when no id comes back.
    pub async fn submit<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        authorization: Option<&str>,
        what: &'static str,
    ) -> Result<DbId, ExecutorError> {
        let url = format!("{}{path}", self.config.backend_url);
        let mut request = self.client.post(url.as_str()).json(body);
        if let Some(authorization) = authorization {
            request = request.header(AUTHORIZATION, authorization);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::error!(%url, status = status.as_u16(), %body, "Backend rejected generation job");
            return Err(ExecutorError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let created: CreatedMedia = response.json().await?;
        let media_id = created
            .id
            .as_ref()
            .and_then(parse_media_id)
            .ok_or(ExecutorError::MissingId(what))?;
        tracing::info!(%url, media_id, "Submitted generation job");
        Ok(media_id)
    }

    /// Poll the gallery item until the job completes or fails.
    ///
    /// Transport errors while polling are logged and retried; an error
    /// status from the backend ends the wait.
    pub async fn wait_for_completion(
        &self,
        media_id: DbId,
        authorization: Option<&str>,
    ) -> Result<(), ExecutorError> {
        let url = format!("{}/api/gallery/item/{media_id}", self.config.backend_url);

        tokio::time::sleep(self.config.poll_initial_delay).await;
        let started = Instant::now();

        loop {
            if started.elapsed() > self.config.poll_timeout {
                tracing::warn!(media_id, "Generation job timed out");
                return Err(ExecutorError::Timeout(self.config.poll_timeout.as_secs()));
            }

            match self.poll_once(&url, authorization).await {
                Ok(JobStatus::Completed) => {
                    tracing::info!(media_id, "Generation job completed");
                    return Ok(());
                }
                Ok(JobStatus::Failed(message)) => {
                    return Err(ExecutorError::GenerationFailed(message));
                }
                Ok(JobStatus::Pending) => {}
                Err(ExecutorError::Request(err)) => {
                    tracing::warn!(media_id, error = %err, "Status poll failed, retrying");
                }
                Err(err) => return Err(err),
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn poll_once(
        &self,
        url: &str,
        authorization: Option<&str>,
    ) -> Result<JobStatus, ExecutorError> {
        let mut request = self.client.get(url);
        if let Some(authorization) = authorization {
            request = request.header(AUTHORIZATION, authorization);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExecutorError::Polling {
                status: status.as_u16(),
                body,
            });
        }

        let item: GalleryItem = response.json().await?;
        Ok(item.into())
    }
}

/// Media ids come back as numbers, occasionally as numeric strings.
fn parse_media_id(value: &Value) -> Option<DbId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .filter(|id| *id > 0)
}
