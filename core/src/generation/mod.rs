//! Generation backend client
//!
//! One client is bound to one access grant. Every operation is a single
//! JSON POST; transport and protocol failures are folded into
//! [`GenerationResult`] instead of being returned as errors.

pub mod retry;

pub use retry::RetryPolicy;

use crate::access_broker::AccessGrant;
use crate::{GateError, Result};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

pub const IMAGE_MIME_TYPE: &str = "image/jpeg";
pub const VIDEO_MIME_TYPE: &str = "video/mp4";

/// A validated generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GenerationRequest {
    Text2Image {
        prompt: String,
    },
    Image2Image {
        input_image_url: String,
        prompt: String,
    },
    Text2Video {
        prompt: String,
        image_urls: Option<Vec<String>>,
        duration_seconds: Option<f64>,
    },
}

impl GenerationRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationRequest::Text2Image { .. } => "text2image",
            GenerationRequest::Image2Image { .. } => "image2image",
            GenerationRequest::Text2Video { .. } => "text2video",
        }
    }

    /// Fixed per tool, never taken from the backend response
    pub fn mime_type(&self) -> &'static str {
        match self {
            GenerationRequest::Text2Video { .. } => VIDEO_MIME_TYPE,
            _ => IMAGE_MIME_TYPE,
        }
    }

    /// Response field carrying the produced artifact's URI
    pub fn result_field(&self) -> &'static str {
        match self {
            GenerationRequest::Text2Video { .. } => "url",
            _ => "imageUrl",
        }
    }

    pub fn body(&self) -> Value {
        match self {
            GenerationRequest::Text2Image { prompt } => json!({ "prompt": prompt }),
            GenerationRequest::Image2Image {
                input_image_url,
                prompt,
            } => json!({ "inputImageUrl": input_image_url, "prompt": prompt }),
            GenerationRequest::Text2Video {
                prompt,
                image_urls,
                duration_seconds,
            } => {
                let mut body = Map::new();
                body.insert("prompt".into(), json!(prompt));
                if let Some(urls) = image_urls {
                    body.insert("imageUrls".into(), json!(urls));
                }
                if let Some(duration) = duration_seconds {
                    let value = if duration.fract() == 0.0 && *duration <= u64::MAX as f64 {
                        json!(*duration as u64)
                    } else {
                        json!(duration)
                    };
                    body.insert("duration".into(), value);
                }
                Value::Object(body)
            }
        }
    }
}

/// Uniform outcome of a generation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GenerationResult {
    pub success: bool,
    pub primary_uri: Option<String>,
    pub message: Option<String>,
    /// HTTP status when a response was received
    #[serde(skip)]
    pub status: Option<u16>,
}

impl GenerationResult {
    pub fn succeeded(uri: String, status: u16) -> Self {
        Self {
            success: true,
            primary_uri: Some(uri),
            message: None,
            status: Some(status),
        }
    }

    pub fn failed(message: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            success: false,
            primary_uri: None,
            message: Some(message.into()),
            status,
        }
    }
}

/// Endpoint paths relative to the grant's base URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationEndpoints {
    pub text2image: String,
    pub image2image: String,
    pub text2video: String,
}

impl Default for GenerationEndpoints {
    fn default() -> Self {
        Self {
            text2image: "/text2image".to_string(),
            image2image: "/image2image".to_string(),
            text2video: "/text2video".to_string(),
        }
    }
}

impl GenerationEndpoints {
    pub fn path_for(&self, request: &GenerationRequest) -> &str {
        match request {
            GenerationRequest::Text2Image { .. } => &self.text2image,
            GenerationRequest::Image2Image { .. } => &self.image2image,
            GenerationRequest::Text2Video { .. } => &self.text2video,
        }
    }
}

/// Configuration shared by every generation client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub endpoints: GenerationEndpoints,
    /// Timeout per request in milliseconds
    pub request_timeout_ms: u64,
    pub retry: RetryPolicy,
    pub user_agent: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoints: GenerationEndpoints::default(),
            request_timeout_ms: std::env::var("GENERATION_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(300_000),
            retry: RetryPolicy {
                max_retries: std::env::var("GENERATION_MAX_RETRIES")
                    .ok()
                    .and_then(|v| v.parse::<u32>().ok())
                    .unwrap_or(0),
                ..RetryPolicy::default()
            },
            user_agent: format!("creditgate/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// HTTP client bound to a single access grant
pub struct GenerationClient {
    grant: AccessGrant,
    config: GenerationConfig,
    http: Client,
}

impl GenerationClient {
    pub fn new(grant: AccessGrant, config: GenerationConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| GateError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            grant,
            config,
            http,
        })
    }

    pub fn base_uri(&self) -> &str {
        &self.grant.base_uri
    }

    pub async fn text2image(&self, prompt: &str) -> GenerationResult {
        self.generate(&GenerationRequest::Text2Image {
            prompt: prompt.to_string(),
        })
        .await
    }

    pub async fn image2image(&self, input_image_url: &str, prompt: &str) -> GenerationResult {
        self.generate(&GenerationRequest::Image2Image {
            input_image_url: input_image_url.to_string(),
            prompt: prompt.to_string(),
        })
        .await
    }

    pub async fn text2video(
        &self,
        prompt: &str,
        image_urls: Option<Vec<String>>,
        duration_seconds: Option<f64>,
    ) -> GenerationResult {
        self.generate(&GenerationRequest::Text2Video {
            prompt: prompt.to_string(),
            image_urls,
            duration_seconds,
        })
        .await
    }

    /// Issue the request matching the variant
    /// Contract:
    /// - non-2xx → `success=false`, message `HTTP error! status: <code>`
    /// - transport/parse failure → `success=false`, message is the error text
    /// - 2xx with the result field → `success=true`, `primary_uri` set
    #[tracing::instrument(skip(self, request), fields(kind = request.kind()))]
    pub async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        let url = self.endpoint_url(request);
        debug!(target: "generation_client", url = %url, "POST generation request");

        let response = match self.post_with_retry(&url, &request.body()).await {
            Ok(response) => response,
            Err(e) => {
                warn!(target: "generation_client", error = %e, "Generation request failed");
                return GenerationResult::failed(e.to_string(), None);
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(target: "generation_client", %status, "Generation backend returned error status");
            return GenerationResult::failed(
                format!("HTTP error! status: {}", status.as_u16()),
                Some(status.as_u16()),
            );
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!(target: "generation_client", error = %e, "Failed to parse generation response");
                return GenerationResult::failed(e.to_string(), Some(status.as_u16()));
            }
        };

        let field = request.result_field();
        match body
            .get(field)
            .and_then(Value::as_str)
            .filter(|uri| !uri.trim().is_empty())
        {
            Some(uri) => GenerationResult::succeeded(uri.to_string(), status.as_u16()),
            None => GenerationResult::failed(
                format!("Generation response is missing '{}'", field),
                Some(status.as_u16()),
            ),
        }
    }

    fn endpoint_url(&self, request: &GenerationRequest) -> String {
        format!(
            "{}/{}",
            self.grant.base_uri.trim_end_matches('/'),
            self.config
                .endpoints
                .path_for(request)
                .trim_start_matches('/')
        )
    }

    async fn post_with_retry(&self, url: &str, body: &Value) -> reqwest::Result<Response> {
        let policy = self.config.retry;
        let mut attempt = 0;
        loop {
            let result = self
                .http
                .post(url)
                .bearer_auth(&self.grant.token)
                .json(body)
                .send()
                .await;

            match result {
                Err(e) if policy.should_retry(attempt, &e) => {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        target: "generation_client",
                        error = %e,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Transient failure; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_body_omits_absent_options() {
        let request = GenerationRequest::Text2Video {
            prompt: "waves".into(),
            image_urls: None,
            duration_seconds: None,
        };
        assert_eq!(request.body(), json!({"prompt": "waves"}));
    }

    #[test]
    fn video_body_keeps_integer_durations_integral() {
        let request = GenerationRequest::Text2Video {
            prompt: "waves".into(),
            image_urls: Some(vec!["https://img.example/a.png".into()]),
            duration_seconds: Some(5.0),
        };
        assert_eq!(
            request.body(),
            json!({"prompt": "waves", "imageUrls": ["https://img.example/a.png"], "duration": 5})
        );
    }

    #[test]
    fn image_to_image_body_uses_camel_case() {
        let request = GenerationRequest::Image2Image {
            input_image_url: "https://img.example/in.jpg".into(),
            prompt: "make it blue".into(),
        };
        assert_eq!(
            request.body(),
            json!({"inputImageUrl": "https://img.example/in.jpg", "prompt": "make it blue"})
        );
    }

    #[test]
    fn mime_types_and_fields_are_fixed_per_variant() {
        let image = GenerationRequest::Text2Image { prompt: "a".into() };
        let video = GenerationRequest::Text2Video {
            prompt: "a".into(),
            image_urls: None,
            duration_seconds: None,
        };
        assert_eq!(image.mime_type(), "image/jpeg");
        assert_eq!(image.result_field(), "imageUrl");
        assert_eq!(video.mime_type(), "video/mp4");
        assert_eq!(video.result_field(), "url");
    }

    #[test]
    fn endpoint_join_handles_slashes() {
        let client = GenerationClient::new(
            AccessGrant {
                base_uri: "http://backend.example/proxy/".into(),
                token: "tok".into(),
                expires_at: None,
            },
            GenerationConfig::default(),
        )
        .unwrap();
        let request = GenerationRequest::Text2Image { prompt: "a".into() };
        assert_eq!(
            client.endpoint_url(&request),
            "http://backend.example/proxy/text2image"
        );
    }
}
