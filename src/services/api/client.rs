use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

use super::manifest::{decode_manifest, MediaManifest};
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::kernel::event::ResumePosition;
use crate::kernel::heartbeat::{Heartbeat, HeartbeatSink};

/// HTTP transport to the reading backend.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn fetch_manifest(&self, job_id: &str) -> Result<MediaManifest> {
        let response = self
            .client
            .get(format!("{}/api/jobs/{}/media", self.base_url, job_id))
            .send()
            .await?;
        let value: Value = check(response).await?.json().await?;
        let manifest = decode_manifest(&value)?;
        info!("Fetched manifest for {} ({} chunks)", job_id, manifest.chunks.len());
        Ok(manifest)
    }

    /// `None` when nothing was saved for this job.
    pub async fn fetch_resume_position(&self, job_id: &str) -> Result<Option<ResumePosition>> {
        let response = self
            .client
            .get(format!("{}/api/jobs/{}/resume", self.base_url, job_id))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("No resume position for {}", job_id);
            return Ok(None);
        }
        Ok(check(response).await?.json().await?)
    }
}

impl HeartbeatSink for ApiClient {
    fn send_heartbeat(&self, heartbeat: Heartbeat) -> impl Future<Output = Result<()>> + Send {
        async move {
            let response = self
                .client
                .post(format!("{}/api/playback/heartbeat", self.base_url))
                .json(&heartbeat)
                .send()
                .await?;
            check(response).await?;
            debug!("Heartbeat sent: {:.1}s for {}", heartbeat.delta_seconds, heartbeat.job_id);
            Ok(())
        }
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.ok().filter(|body| !body.trim().is_empty());
    Err(Error::Transport {
        status: status.as_u16(),
        message,
    })
}
