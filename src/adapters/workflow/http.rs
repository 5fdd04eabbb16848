//! HTTP workflow engine client
//!
//! Talks to the refresh workflow service over its JSON API:
//!
//! * `POST {base}/refreshes` with `{"platform": "..."}` returns
//!   `{"execution_id": "..."}`
//! * `GET {base}/refreshes/{execution_id}` returns `{"status": "..."}`

use super::{WorkflowEngine, WorkflowStatus};
use crate::config::WorkflowConfig;
use crate::domain::{PlatformId, ReportFlowError, Result, WorkflowError};
use crate::log_retry_attempt;
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::time::Duration;
use tracing::Span;
use url::Url;

#[derive(Debug, Deserialize)]
struct StartResponse {
    execution_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
}

/// Workflow engine reached over HTTP
pub struct HttpWorkflowEngine {
    base_url: Url,
    client: Client,
    config: WorkflowConfig,
    span: Span,
}

impl HttpWorkflowEngine {
    /// Create a new client
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: WorkflowConfig) -> Result<Self> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|e| {
            ReportFlowError::Configuration(format!("Invalid workflow.base_url '{base}': {e}"))
        })?;

        let mut client_builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(10));

        if !config.tls_verify {
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder.build().map_err(|e| {
            ReportFlowError::Configuration(format!("Failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            base_url,
            client,
            config,
            span: tracing::info_span!("workflow_engine"),
        })
    }

    /// Replace the span events are emitted under
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|e| {
            ReportFlowError::Configuration(format!("Invalid workflow endpoint '{path}': {e}"))
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.bearer_auth(token.expose_secret().as_ref()),
            None => request,
        }
    }

    /// Retry a request with exponential backoff
    ///
    /// Only errors classified as retryable are retried.
    async fn retry_request<F, T, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, WorkflowError>>,
    {
        let max_retries = self.config.retry.max_retries;
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    attempt += 1;
                    log_retry_attempt!(parent: &self.span, attempt, max_retries, e);
                    tokio::time::sleep(self.config.retry.delay_for(attempt)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Maps a non-success response onto the error taxonomy
async fn error_for(response: Response, subject: &str) -> WorkflowError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            WorkflowError::AuthenticationFailed(format!("{status}: {body}"))
        }
        StatusCode::NOT_FOUND => WorkflowError::ExecutionNotFound(subject.to_string()),
        StatusCode::TOO_MANY_REQUESTS => WorkflowError::RateLimitExceeded(body),
        s if s.is_server_error() => WorkflowError::ServerError {
            status: s.as_u16(),
            message: body,
        },
        s => WorkflowError::ClientError {
            status: s.as_u16(),
            message: body,
        },
    }
}

#[async_trait]
impl WorkflowEngine for HttpWorkflowEngine {
    async fn start_refresh(&self, platform: &PlatformId) -> Result<String> {
        let url = self.endpoint("refreshes")?;
        let body = serde_json::json!({ "platform": platform.as_str() });

        let started = self
            .retry_request(|| async {
                let response = self
                    .authorize(self.client.post(url.clone()).json(&body))
                    .send()
                    .await
                    .map_err(|e| WorkflowError::ConnectionFailed(e.to_string()))?;

                if !response.status().is_success() {
                    return Err(error_for(response, platform.as_str()).await);
                }

                response
                    .json::<StartResponse>()
                    .await
                    .map_err(|e| WorkflowError::InvalidResponse(e.to_string()))
            })
            .await?;

        tracing::info!(
            parent: &self.span,
            platform = %platform,
            execution_id = %started.execution_id,
            "Started refresh workflow"
        );
        Ok(started.execution_id)
    }

    async fn status(&self, execution_id: &str) -> Result<WorkflowStatus> {
        let url = self.endpoint(&format!("refreshes/{execution_id}"))?;

        let response = self
            .retry_request(|| async {
                let response = self
                    .authorize(self.client.get(url.clone()))
                    .send()
                    .await
                    .map_err(|e| WorkflowError::ConnectionFailed(e.to_string()))?;

                if !response.status().is_success() {
                    return Err(error_for(response, execution_id).await);
                }

                response
                    .json::<StatusResponse>()
                    .await
                    .map_err(|e| WorkflowError::InvalidResponse(e.to_string()))
            })
            .await?;

        WorkflowStatus::parse(&response.status).ok_or_else(|| {
            WorkflowError::InvalidResponse(format!(
                "unknown status '{}' for execution {execution_id}",
                response.status
            ))
            .into()
        })
    }
}
