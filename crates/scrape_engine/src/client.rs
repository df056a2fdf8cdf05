use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{StatusCode, Url};
use scrape_core::{extract_domain, ScrapeJob};
use scrape_logging::scrape_debug;
use serde::de::DeserializeOwned;

use crate::store::URL_REQUIRED;
use crate::wire::{ErrorBody, SubmitRequest, SubmitResponse};
use crate::{ApiError, ApiErrorKind};

pub const INVALID_URL_HINT: &str = "Please enter a valid URL (e.g., https://example.com)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Remote job store as seen by the dashboard.
#[async_trait::async_trait]
pub trait ScrapeApi: Send + Sync {
    /// Full job list, newest first.
    async fn list_scrapes(&self) -> Result<Vec<ScrapeJob>, ApiError>;

    /// One job; `Ok(None)` when the store does not know `id`.
    async fn get_scrape(&self, id: &str) -> Result<Option<ScrapeJob>, ApiError>;

    async fn submit(&self, url: &str) -> Result<SubmitResponse, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestScrapeApi {
    client: reqwest::Client,
    base_url: Url,
}

impl ReqwestScrapeApi {
    pub fn new(settings: &ClientSettings) -> Result<Self, ApiError> {
        let mut base_url = Url::parse(&settings.base_url).map_err(|err| {
            ApiError::new(
                ApiErrorKind::InvalidInput,
                format!("invalid API base url {:?}: {err}", settings.base_url),
            )
        })?;
        // Keep the base path when joining relative endpoints.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(ApiErrorKind::Transport, err.to_string()))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|err| ApiError::new(ApiErrorKind::InvalidInput, err.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        scrape_debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;
        read_json(response).await
    }
}

#[async_trait::async_trait]
impl ScrapeApi for ReqwestScrapeApi {
    async fn list_scrapes(&self) -> Result<Vec<ScrapeJob>, ApiError> {
        self.get_json(self.endpoint("scrapes")?).await
    }

    async fn get_scrape(&self, id: &str) -> Result<Option<ScrapeJob>, ApiError> {
        let mut url = self.endpoint("scrapes")?;
        url.path_segments_mut()
            .map_err(|_| ApiError::new(ApiErrorKind::InvalidInput, "base url cannot hold a path"))?
            .push(id);

        match self.get_json(url).await {
            Ok(job) => Ok(Some(job)),
            Err(err) if err.kind == ApiErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn submit(&self, url: &str) -> Result<SubmitResponse, ApiError> {
        if url.trim().is_empty() {
            return Err(ApiError::new(ApiErrorKind::InvalidInput, URL_REQUIRED));
        }
        if extract_domain(url).is_none() {
            return Err(ApiError::new(ApiErrorKind::InvalidInput, INVALID_URL_HINT));
        }

        let body = serde_json::to_vec(&SubmitRequest::new(url))
            .map_err(|err| ApiError::new(ApiErrorKind::Decode, err.to_string()))?;
        let endpoint = self.endpoint("scrape")?;
        scrape_debug!("POST {} url={}", endpoint, url);

        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let receipt: SubmitResponse = read_json(response).await?;

        if !receipt.success {
            return Err(ApiError::new(
                ApiErrorKind::Internal,
                "Failed to initiate scraping",
            ));
        }
        Ok(receipt)
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.bytes().await.map_err(map_reqwest_error)?;
    if !status.is_success() {
        return Err(status_error(status, &body));
    }
    serde_json::from_slice(&body).map_err(|err| ApiError::new(ApiErrorKind::Decode, err.to_string()))
}

fn status_error(status: StatusCode, body: &[u8]) -> ApiError {
    let message = serde_json::from_slice::<ErrorBody>(body)
        .map(|body| body.error)
        .unwrap_or_else(|_| status.to_string());
    let kind = match status {
        StatusCode::BAD_REQUEST => ApiErrorKind::InvalidInput,
        StatusCode::NOT_FOUND => ApiErrorKind::NotFound,
        status if status.is_server_error() => ApiErrorKind::Internal,
        _ => ApiErrorKind::Transport,
    };
    ApiError::new(kind, message)
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(ApiErrorKind::Timeout, err.to_string());
    }
    ApiError::new(ApiErrorKind::Transport, err.to_string())
}
