//! Common utilities for the Resource Manager client
//!
//! Bearer authentication, error mapping and long-running operation polling
//! shared by every sub-resource client.

use crate::auth::TokenProvider;
use crate::error::AzureError;
use crate::models::{ErrorResponse, OperationStatus};
use crate::azure_trait::{OperationHandle, PollStrategy};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Poll interval when the service sends no `Retry-After`
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Upper bound on waiting for a single long-running operation
pub const OPERATION_TIMEOUT: Duration = Duration::from_secs(60 * 60);

const ASYNC_OPERATION_HEADER: &str = "Azure-AsyncOperation";
const CLIENT_REQUEST_ID_HEADER: &str = "x-ms-client-request-id";

/// HTTP client wrapper with bearer authentication
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    tokens: Arc<TokenProvider>,
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: String, tokens: Arc<TokenProvider>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// Build a full URL from a path
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Response, AzureError> {
        let token = self.tokens.token().await?;
        let request_id = Uuid::new_v4().to_string();
        debug!("{} {} (request id {})", method, url, request_id);

        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .header(CLIENT_REQUEST_ID_HEADER, request_id);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(error_from_response(url, response).await)
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AzureError> {
        let url = self.build_url(path);
        let response = self.send(Method::GET, &url, None).await?;
        Ok(response.json().await?)
    }

    /// Make a HEAD request; a 404 means the resource is absent
    pub async fn head(&self, path: &str) -> Result<bool, AzureError> {
        let url = self.build_url(path);
        match self.send(Method::HEAD, &url, None).await {
            Ok(_) => Ok(true),
            Err(AzureError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Make a POST request and decode the response body
    pub async fn post<T: DeserializeOwned>(&self, path: &str) -> Result<T, AzureError> {
        let url = self.build_url(path);
        let response = self.send(Method::POST, &url, None).await?;
        Ok(response.json().await?)
    }

    /// Make a PUT request and decode the response body
    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, AzureError> {
        let url = self.build_url(path);
        let response = self.send(Method::PUT, &url, Some(body)).await?;
        Ok(response.json().await?)
    }

    /// Start a long-running operation (PUT, PATCH or DELETE)
    pub async fn begin(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<OperationHandle, AzureError> {
        let url = self.build_url(path);
        let response = self.send(method, &url, body).await?;
        Ok(operation_handle(url, response.status(), response.headers()))
    }

    /// Poll a long-running operation until it finishes
    pub async fn wait(&self, operation: &OperationHandle) -> Result<(), AzureError> {
        let deadline = tokio::time::Instant::now() + OPERATION_TIMEOUT;
        loop {
            let delay = match &operation.poll {
                PollStrategy::Done => return Ok(()),
                PollStrategy::AsyncOperation(url) => {
                    let response = self.send(Method::GET, url, None).await?;
                    let delay = retry_after(response.headers());
                    let status: OperationStatus = response.json().await?;
                    match status.status.as_str() {
                        "Succeeded" => return Ok(()),
                        "Failed" | "Canceled" => {
                            let detail = status
                                .error
                                .map(|e| format!("{}: {}", e.code, e.message))
                                .unwrap_or_default();
                            return Err(AzureError::OperationFailed(format!(
                                "{} {} {}",
                                operation.resource_url, status.status, detail
                            )));
                        }
                        _ => delay,
                    }
                }
                PollStrategy::Location(url) => {
                    let response = self.send(Method::GET, url, None).await?;
                    if response.status() != StatusCode::ACCEPTED {
                        return Ok(());
                    }
                    retry_after(response.headers())
                }
            };

            if tokio::time::Instant::now() + delay > deadline {
                return Err(AzureError::OperationTimeout(operation.resource_url.clone()));
            }
            debug!("Operation on {} still running, polling again in {:?}", operation.resource_url, delay);
            tokio::time::sleep(delay).await;
        }
    }
}

async fn error_from_response(url: &str, response: Response) -> AzureError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorResponse>(&body)
        .ok()
        .and_then(|e| e.error)
        .unwrap_or_default();

    match status {
        StatusCode::NOT_FOUND => AzureError::NotFound(format!("{url} - {}", detail.message)),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AzureError::Authentication(format!("{status} {}: {}", detail.code, detail.message))
        }
        _ => AzureError::Api {
            status: status.as_u16(),
            code: detail.code,
            message: if detail.message.is_empty() { body } else { detail.message },
        },
    }
}

/// Build the handle for a long-running operation from its initial response
pub fn operation_handle(resource_url: String, status: StatusCode, headers: &HeaderMap) -> OperationHandle {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let poll = if let Some(url) = header(ASYNC_OPERATION_HEADER) {
        PollStrategy::AsyncOperation(url)
    } else if status == StatusCode::ACCEPTED {
        header("Location").map_or(PollStrategy::Done, PollStrategy::Location)
    } else {
        PollStrategy::Done
    };
    OperationHandle { resource_url, poll }
}

fn retry_after(headers: &HeaderMap) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(DEFAULT_POLL_INTERVAL, Duration::from_secs)
}
