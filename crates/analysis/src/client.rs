use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};
use url::Url;

use crate::error::AnalysisError;
use crate::types::{AnalysisRequest, AnalysisResult};

const ANALYZE_PATH: [&str; 3] = ["vision", "v3.2", "analyze"];

/// Runs image analysis for one request. Implementations make a single call
/// and never retry.
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError>;
}

/// Computer Vision v3.2 `analyze` over HTTP.
#[derive(Debug, Clone)]
pub struct ComputerVisionClient {
    http: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl ComputerVisionClient {
    pub fn new(http: reqwest::Client, endpoint: Url) -> Self {
        Self {
            http,
            endpoint,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn analyze_url(&self, request: &AnalysisRequest) -> Result<Url, AnalysisError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| {
                AnalysisError::Transport(format!("endpoint '{}' cannot be a base", self.endpoint))
            })?
            .pop_if_empty()
            .extend(ANALYZE_PATH);
        url.query_pairs_mut()
            .append_pair("visualFeatures", &request.features_param());
        Ok(url)
    }
}

#[async_trait]
impl ImageAnalyzer for ComputerVisionClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let url = self.analyze_url(request)?;
        let started = Instant::now();

        let response = self
            .http
            .post(url)
            .header("Ocp-Apim-Subscription-Key", request.subscription_key.as_str())
            .timeout(self.timeout)
            .json(&json!({ "url": request.image_url }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AnalysisError::Transport(format!("request timed out after {:?}: {e}", self.timeout))
                } else {
                    AnalysisError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = AnalysisError::from_response(status.as_u16(), &body);
            warn!(status = status.as_u16(), error = %err, "analysis_failure");
            return Err(err);
        }

        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;
        let result: AnalysisResult = serde_json::from_str(&body)
            .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))?;

        info!(
            faces = result.face_count(),
            face_data = result.faces.is_some(),
            request_id = result.request_id.as_deref().unwrap_or(""),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "analysis_success"
        );
        Ok(result)
    }
}
