use super::{ProbeError, ProbeResult};
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

/// Single-shot HTTP caller that times every request.
#[derive(Debug, Clone)]
pub struct ProbeClient {
    client: Client,
}

impl ProbeClient {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProbeError::Client)?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Perform one request and time it up to the end of the response body.
    ///
    /// A non-success status is reported through the returned [`ProbeResult`]
    /// with no body; it is not an error here.
    pub async fn probe(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Option<&Value>,
    ) -> Result<(Option<Value>, ProbeResult), ProbeError> {
        let mut request = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            request = request.json(body);
        }

        let start_time = Utc::now();
        let start = Instant::now();

        let response = match request.send().await {
            Ok(r) => r,
            Err(source) => {
                debug!(%url, error = %source, "Request failed without a response");
                return Err(ProbeError::Transport {
                    url: url.to_string(),
                    result: ProbeResult::transport_failure(start_time, start.elapsed(), source.to_string()),
                    source,
                });
            }
        };

        debug!(url = %response.url(), "Request URL");

        let status = response.status();
        let reason = status.canonical_reason().unwrap_or_default();
        let bytes = response.bytes().await;
        let result = ProbeResult::new(start_time, start.elapsed(), status.as_u16(), reason);

        let bytes = match bytes {
            Ok(b) => b,
            Err(source) => {
                return Err(ProbeError::Transport {
                    url: url.to_string(),
                    result,
                    source,
                })
            }
        };

        if !status.is_success() {
            return Ok((None, result));
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok((Some(Value::Null), result));
        }

        match serde_json::from_slice(&bytes) {
            Ok(v) => Ok((Some(v), result)),
            Err(source) => Err(ProbeError::Decode {
                url: url.to_string(),
                result,
                source,
            }),
        }
    }

    pub async fn get(&self, url: &str, headers: HeaderMap) -> Result<(Option<Value>, ProbeResult), ProbeError> {
        self.probe(Method::GET, url, headers, None).await
    }

    pub async fn post(&self, url: &str, headers: HeaderMap, body: &Value) -> Result<(Option<Value>, ProbeResult), ProbeError> {
        self.probe(Method::POST, url, headers, Some(body)).await
    }
}

/// JSON headers without credentials.
pub fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers
}

/// JSON headers carrying `authorization: Bearer <token>`.
pub fn bearer_headers(token: &str) -> Result<HeaderMap, ProbeError> {
    let mut headers = json_headers();
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| ProbeError::InvalidToken)?;
    value.set_sensitive(true);
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

/// Bearer headers that also accept any content type.
pub fn bearer_headers_any(token: &str) -> Result<HeaderMap, ProbeError> {
    let mut headers = bearer_headers(token)?;
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    Ok(headers)
}
