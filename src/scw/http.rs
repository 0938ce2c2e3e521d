//! HTTP utilities for Scaleway REST API calls

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::{Result, ScwError};

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

const AUTH_HEADER: &str = "X-Auth-Token";

/// Sanitize response body for logging
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Error document returned by the Scaleway API
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    resource: Option<String>,
}

fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => {
            let mut message = parsed
                .message
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
            if let Some(kind) = parsed.kind {
                message = format!("{message} ({kind})");
            }
            if let Some(resource) = parsed.resource {
                message = format!("{message} [resource: {resource}]");
            }
            message
        }
        Err(_) => status.canonical_reason().unwrap_or("unknown").to_string(),
    }
}

/// HTTP client wrapper for Scaleway API calls
#[derive(Clone)]
pub struct ScwHttpClient {
    client: Client,
}

impl ScwHttpClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("scw-provider/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    /// Send a request and return the raw body of a successful response
    async fn send(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<String> {
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method.clone(), url)
            .header(AUTH_HEADER, token);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            // 404 is routine (resource already gone), keep it out of error logs
            if status == StatusCode::NOT_FOUND {
                tracing::debug!("{} {} -> 404", method, url);
            } else {
                tracing::error!("API error: {} - {}", status, sanitize_for_log(&text));
            }
            return Err(ScwError::Api {
                status,
                message: error_message(status, &text),
            });
        }

        Ok(text)
    }

    /// Request returning a JSON document
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        let text = self.send(method, url, token, body).await?;
        // Some endpoints answer 204 with no body
        let text = if text.trim().is_empty() { "null" } else { &text };
        Ok(serde_json::from_str(text)?)
    }

    /// Request whose response body is ignored
    pub async fn request_empty(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<()> {
        self.send(method, url, token, body).await.map(|_| ())
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str, token: &str) -> Result<T> {
        self.request(Method::GET, url, token, None).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        token: &str,
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, url, token, Some(&body)).await
    }

    pub async fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        token: &str,
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_value(body)?;
        self.request(Method::PATCH, url, token, Some(&body)).await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        token: &str,
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_value(body)?;
        self.request(Method::PUT, url, token, Some(&body)).await
    }

    pub async fn delete(&self, url: &str, token: &str) -> Result<()> {
        self.request_empty(Method::DELETE, url, token, None).await
    }
}

/// Append query parameters to a URL, skipping empty values
pub fn with_query(url: &str, params: &[(&str, String)]) -> String {
    let query_parts: Vec<String> = params
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect();

    if query_parts.is_empty() {
        url.to_string()
    } else if url.contains('?') {
        format!("{}&{}", url, query_parts.join("&"))
    } else {
        format!("{}?{}", url, query_parts.join("&"))
    }
}

/// Format a Scaleway API error for display
pub fn format_scw_error(error: &anyhow::Error) -> String {
    let status = error
        .chain()
        .filter_map(|cause| cause.downcast_ref::<ScwError>())
        .find_map(ScwError::status);

    match status.map(|s| s.as_u16()) {
        Some(401) => "Authentication failed. Check SCW_SECRET_KEY.".to_string(),
        Some(403) => "Permission denied. Check the IAM policy attached to your API key.".to_string(),
        Some(404) => "Resource not found.".to_string(),
        Some(409) => "Resource conflict. The resource may be in a transient state.".to_string(),
        Some(429) => "Rate limit exceeded. Please try again later.".to_string(),
        Some(500..=599) => "Scaleway service temporarily unavailable. Please try again.".to_string(),
        _ => format!("{error:#}"),
    }
}
