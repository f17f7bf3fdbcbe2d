//! HTTP client shared by the connectors.
//!
//! Each call is a single attempt: a non-success status, a network failure
//! or an unparseable body is returned to the caller as a
//! [`ConnectorError`]. Authentication, optional rate limiting and JWT
//! session caching happen here so connectors only deal with paths, query
//! parameters and bodies.

use crate::secure_string::SecureString;
use crate::traits::{AuthConfig, ConnectorConfig, ConnectorError, ConnectorResult};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

type RateLimiterType = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Query parameters in the order they are sent.
pub type QueryParams = Vec<(String, String)>;

/// HTTP client with authentication and rate limiting.
pub struct HttpClient {
    client: Client,
    config: ConnectorConfig,
    /// JWT from the last successful login (JWT auth only).
    session_token: Arc<RwLock<Option<SecureString>>>,
    rate_limiter: Option<Arc<RateLimiterType>>,
}

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per period.
    pub max_requests: u32,
    pub period: Duration,
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            period: Duration::from_secs(60),
            burst_size: 10,
        }
    }
}

impl HttpClient {
    /// Creates a new HTTP client from connector configuration.
    pub fn new(config: ConnectorConfig) -> ConnectorResult<Self> {
        Self::with_rate_limit(config, None)
    }

    /// Creates a new HTTP client with rate limiting.
    pub fn with_rate_limit(
        config: ConnectorConfig,
        rate_limit: Option<RateLimitConfig>,
    ) -> ConnectorResult<Self> {
        if !config.verify_tls {
            warn!(
                base_url = %config.base_url,
                connector_name = %config.name,
                "TLS certificate verification disabled"
            );
        }

        let mut headers = reqwest::header::HeaderMap::new();
        for (key, value) in &config.headers {
            let name = reqwest::header::HeaderName::try_from(key.as_str())
                .map_err(|e| ConnectorError::ConfigError(format!("header '{}': {}", key, e)))?;
            let value = reqwest::header::HeaderValue::try_from(value.as_str())
                .map_err(|e| ConnectorError::ConfigError(format!("header '{}': {}", key, e)))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_tls)
            .default_headers(headers)
            .build()
            .map_err(|e| ConnectorError::ConfigError(e.to_string()))?;

        let rate_limiter = match rate_limit {
            Some(rl) => {
                let per_request = rl.period / rl.max_requests.max(1);
                let quota = Quota::with_period(per_request)
                    .ok_or_else(|| {
                        ConnectorError::ConfigError("rate limit period must be non-zero".into())
                    })?
                    .allow_burst(NonZeroU32::new(rl.burst_size).unwrap_or(NonZeroU32::MIN));
                Some(Arc::new(GovernorRateLimiter::direct(quota)))
            }
            None => None,
        };

        Ok(Self {
            client,
            config,
            session_token: Arc::new(RwLock::new(None)),
            rate_limiter,
        })
    }

    /// Builds a URL from a path. An empty path addresses the base URL itself
    /// and absolute URLs pass through unchanged.
    pub fn build_url(&self, path: &str) -> String {
        if path.is_empty() {
            return self.config.base_url.clone();
        }
        if path.starts_with("https://") || path.starts_with("http://") {
            return path.to_string();
        }
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Executes a GET request and deserializes the JSON response.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ConnectorResult<T> {
        self.get_json_with_query(path, &[]).await
    }

    /// Executes a GET request with query parameters.
    pub async fn get_json_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> ConnectorResult<T> {
        let url = self.build_url(path);
        debug!(url = %url, params = query.len(), "GET");
        let request = self.client.get(&url).query(query);
        let response = self.execute_once(request).await?;
        parse_json_response(response).await
    }

    /// Executes a POST request with a JSON body.
    pub async fn post_json<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ConnectorResult<R> {
        let url = self.build_url(path);
        debug!(url = %url, "POST");
        let request = self.client.post(&url).json(body);
        let response = self.execute_once(request).await?;
        parse_json_response(response).await
    }

    /// Executes a POST request whose arguments travel as query parameters.
    pub async fn post_query_json<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> ConnectorResult<R> {
        let url = self.build_url(path);
        debug!(url = %url, params = query.len(), "POST");
        let request = self.client.post(&url).query(query);
        let response = self.execute_once(request).await?;
        parse_json_response(response).await
    }

    /// Forces a JWT login, replacing any cached session.
    pub async fn login(&self) -> ConnectorResult<()> {
        if let AuthConfig::JwtLogin {
            username,
            password,
            login_path,
            ..
        } = &self.config.auth
        {
            self.session_token.write().await.take();
            self.get_session_token(username, password, login_path)
                .await?;
        }
        Ok(())
    }

    /// Executes a request once with authentication and rate limiting.
    async fn execute_once(
        &self,
        mut request: reqwest::RequestBuilder,
    ) -> ConnectorResult<Response> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        request = self.add_auth(request).await?;

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ConnectorError::Timeout(e.to_string())
            } else if e.is_connect() {
                ConnectorError::ConnectionFailed(e.to_string())
            } else {
                ConnectorError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            // A rejected session is dropped so the next call logs in again.
            self.session_token.write().await.take();
        }

        Err(error_for_status(response).await)
    }

    /// Adds authentication to a request.
    async fn add_auth(
        &self,
        request: reqwest::RequestBuilder,
    ) -> ConnectorResult<reqwest::RequestBuilder> {
        match &self.config.auth {
            AuthConfig::None => Ok(request),

            AuthConfig::Basic { username, password } => {
                Ok(request.basic_auth(username, Some(password.expose_secret())))
            }

            AuthConfig::JwtLogin {
                username,
                password,
                login_path,
                header_name,
            } => {
                let token = self
                    .get_session_token(username, password, login_path)
                    .await?;
                Ok(request.header(header_name.as_str(), token.expose_secret()))
            }
        }
    }

    /// Returns the cached JWT or logs in for a new one.
    async fn get_session_token(
        &self,
        username: &str,
        password: &SecureString,
        login_path: &str,
    ) -> ConnectorResult<SecureString> {
        {
            let token = self.session_token.read().await;
            if let Some(t) = &*token {
                return Ok(t.clone());
            }
        }

        info!(connector = %self.config.name, "Logging in for a new session token");

        let body = serde_json::json!({
            "data": {
                "userName": BASE64.encode(username),
                "passphrase": BASE64.encode(password.expose_secret()),
            }
        });

        let response = self
            .client
            .post(self.build_url(login_path))
            .json(&body)
            .send()
            .await
            .map_err(|e| ConnectorError::ConnectionFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ConnectorError::AuthenticationFailed(format!(
                "login request failed: {}",
                response.status()
            )));
        }

        #[derive(serde::Deserialize)]
        struct LoginResponse {
            data: LoginData,
        }

        #[derive(serde::Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct LoginData {
            jwt_token: String,
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::InvalidResponse(format!("login response: {}", e)))?;

        let token = SecureString::new(login.data.jwt_token);
        *self.session_token.write().await = Some(token.clone());
        Ok(token)
    }
}

/// Maps a non-success response to an error, keeping the status.
async fn error_for_status(response: Response) -> ConnectorError {
    let status = response.status();
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            ConnectorError::RateLimited(retry_after)
        }
        StatusCode::UNAUTHORIZED => ConnectorError::AuthenticationFailed("Unauthorized".into()),
        StatusCode::FORBIDDEN => ConnectorError::AuthorizationDenied("Forbidden".into()),
        StatusCode::NOT_FOUND => {
            let url = response.url().path().to_string();
            ConnectorError::NotFound(format!("Resource not found: {}", url))
        }
        _ => {
            let body = response.text().await.unwrap_or_default();
            ConnectorError::Http {
                status: status.as_u16(),
                body: truncate(&body),
            }
        }
    }
}

/// Parses a JSON response body.
async fn parse_json_response<T: DeserializeOwned>(response: Response) -> ConnectorResult<T> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;

    serde_json::from_str(&text).map_err(|e| {
        ConnectorError::InvalidResponse(format!(
            "Failed to parse response (status {}): {} - Body: {}",
            status,
            e,
            truncate(&text)
        ))
    })
}

fn truncate(body: &str) -> String {
    body.chars().take(500).collect()
}

/// Appends a parameter when the value is present and non-empty.
pub fn push_param(params: &mut QueryParams, key: &str, value: Option<&str>) {
    if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
        params.push((key.to_string(), v.to_string()));
    }
}
