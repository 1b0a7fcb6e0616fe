//! Minimal authenticated JSON client bound to one platform's API root.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::auth::AuthProvider;
use crate::error::{ErrorCode, ProviderError, Result};
use crate::provider::Platform;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("forge-bridge/", env!("CARGO_PKG_VERSION"));

pub type Query = Vec<(&'static str, String)>;

#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
    platform: Platform,
    auth: Arc<dyn AuthProvider>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("platform", &self.platform)
            .finish()
    }
}

impl HttpClient {
    /// `default_headers` are sent on every request (Accept, API version, ...).
    pub fn new(
        platform: Platform,
        base_url: &str,
        auth: Arc<dyn AuthProvider>,
        timeout: Duration,
        default_headers: &[(&str, &str)],
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in default_headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ProviderError::new(platform, ErrorCode::Platform, format!("invalid header name: {}", e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                ProviderError::new(platform, ErrorCode::Platform, format!("invalid header value: {}", e))
            })?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::from_transport(platform, e))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            platform,
            auth,
        })
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &Query) -> Result<T> {
        let response = self.send(Method::GET, path, query, None::<&()>, None).await?;
        self.decode(response).await
    }

    /// Like [`get`](Self::get) but a 404 yields `None`.
    pub async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &Query,
    ) -> Result<Option<T>> {
        match self.get(path, query).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.code == ErrorCode::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn get_with_accept<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &Query,
        accept: &str,
    ) -> Result<T> {
        let response = self
            .send(Method::GET, path, query, None::<&()>, Some(accept))
            .await?;
        self.decode(response).await
    }

    /// Raw text body, used for job logs.
    pub async fn get_text(&self, path: &str, query: &Query) -> Result<String> {
        let response = self
            .send(Method::GET, path, query, None::<&()>, Some("text/plain"))
            .await?;
        response
            .text()
            .await
            .map_err(|e| ProviderError::from_transport(self.platform, e))
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        query: &Query,
        body: &B,
    ) -> Result<T> {
        let response = self.send(Method::POST, path, query, Some(body), None).await?;
        self.decode(response).await
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .send(Method::PUT, path, &Query::new(), Some(body), None)
            .await?;
        self.decode(response).await
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .send(Method::PATCH, path, &Query::new(), Some(body), None)
            .await?;
        self.decode(response).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(Method::DELETE, path, &Query::new(), None::<&()>, None)
            .await?;
        Ok(())
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &Query,
        body: Option<&B>,
        accept: Option<&str>,
    ) -> Result<Response> {
        if !self.auth.is_valid() {
            return Err(ProviderError {
                status: Some(401),
                ..ProviderError::new(
                    self.platform,
                    ErrorCode::Unauthorized,
                    "authentication provider is not valid",
                )
            });
        }

        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method.clone(), &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        for (name, value) in self.auth.headers().await? {
            request = request.header(name, value);
        }
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(method = %method, path, "sending request");
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(self.platform, e))?;
        let status = response.status();
        debug!(method = %method, path, status = status.as_u16(), "received response");

        if status.is_success() {
            return Ok(response);
        }

        let rate_limited = status == StatusCode::FORBIDDEN
            && response
                .headers()
                .get("x-ratelimit-remaining")
                .is_some_and(|v| v.as_bytes() == b"0");
        let body = response.text().await.unwrap_or_default();
        let mut err = ProviderError::from_response(self.platform, status.as_u16(), &body);
        if rate_limited {
            err.code = ErrorCode::RateLimited;
        }
        Err(err)
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::from_transport(self.platform, e))?;
        serde_json::from_str(&text).map_err(|e| {
            ProviderError::new(
                self.platform,
                ErrorCode::Platform,
                format!("unexpected response body: {}", e),
            )
        })
    }
}
