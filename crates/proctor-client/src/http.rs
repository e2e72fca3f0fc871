//! HTTP attempt backend.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use tracing::instrument;

use proctor_core::error::BackendError;
use proctor_core::model::TimeRemaining;
use proctor_core::traits::AttemptBackend;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Talks to the LMS attempt endpoints:
/// `POST /start_assessment/{id}` and `GET /time_remaining/{id}`.
pub struct HttpBackend {
    base_url: Url,
    token: Option<String>,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: &str, token: Option<String>, timeout_secs: u64) -> anyhow::Result<Self> {
        let parsed =
            Url::parse(base_url).with_context(|| format!("invalid base URL: {base_url}"))?;
        anyhow::ensure!(
            !parsed.cannot_be_a_base(),
            "base URL cannot be used as an API root: {base_url}"
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: parsed,
            token: token.filter(|t| !t.is_empty()),
            timeout_secs,
            client,
        })
    }

    /// `{base_url}/{action}/{assessment_id}`, with the id encoded as one segment.
    fn endpoint(&self, action: &str, assessment_id: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(action).push(assessment_id);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let req = self
            .client
            .request(method, url)
            .header("accept", "application/json");
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder, assessment_id: &str) -> anyhow::Result<Response> {
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(self.timeout_secs)
            } else {
                BackendError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Unauthorized(body).into());
        }
        if status == StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(assessment_id.to_string()).into());
        }
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: body,
            }
            .into());
        }

        Ok(response)
    }
}

#[async_trait]
impl AttemptBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self))]
    async fn begin_attempt(&self, assessment_id: &str) -> anyhow::Result<()> {
        let url = self.endpoint("start_assessment", assessment_id);
        self.send(self.request(Method::POST, url), assessment_id)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn time_remaining(&self, assessment_id: &str) -> anyhow::Result<TimeRemaining> {
        let url = self.endpoint("time_remaining", assessment_id);
        let response = self
            .send(self.request(Method::GET, url), assessment_id)
            .await?;

        let report: TimeRemaining = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        Ok(report)
    }
}
