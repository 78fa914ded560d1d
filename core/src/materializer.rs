//! Content materialization
//!
//! Downloads a produced artifact and decides whether it travels inline
//! (base64) or as a reference URI. Artifacts of `INLINE_LIMIT_BYTES` or more
//! stay references.

use crate::{GateError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// 1 MiB; an artifact of exactly this size is already too large to inline
pub const INLINE_LIMIT_BYTES: usize = 1_048_576;

/// A produced artifact, either embedded or referenced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializedContent {
    pub uri: String,
    /// Base64 of the full artifact; `None` means reference only
    pub inline: Option<String>,
    pub mime_type: String,
    /// Unknown when an unsized body was abandoned at the inline limit
    pub size_bytes: Option<u64>,
}

impl MaterializedContent {
    pub fn is_inline(&self) -> bool {
        self.inline.is_some()
    }

    /// Decoded inline bytes, if any
    pub fn inline_bytes(&self) -> Option<Vec<u8>> {
        self.inline
            .as_deref()
            .and_then(|data| STANDARD.decode(data).ok())
    }
}

/// Configuration for artifact downloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterializerConfig {
    pub inline_limit_bytes: usize,
    /// Download timeout in milliseconds
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for MaterializerConfig {
    fn default() -> Self {
        Self {
            inline_limit_bytes: INLINE_LIMIT_BYTES,
            timeout_ms: 120_000,
            user_agent: format!("creditgate/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

pub struct ContentMaterializer {
    config: MaterializerConfig,
    http_client: Client,
}

impl ContentMaterializer {
    pub fn new() -> Result<Self> {
        Self::with_config(MaterializerConfig::default())
    }

    pub fn with_config(config: MaterializerConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| GateError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Fetch `uri` and embed it when smaller than the inline limit.
    /// A failed download is an error, never a silent "too large".
    #[tracing::instrument(skip(self))]
    pub async fn materialize(&self, uri: &str, mime_type: &str) -> Result<MaterializedContent> {
        let mut response = self.http_client.get(uri).send().await.map_err(|e| {
            warn!(target: "materializer", error = %e, "Artifact download failed");
            GateError::Materialize(format!("failed to download {}: {}", uri, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(target: "materializer", %status, "Artifact download returned error status");
            return Err(GateError::Materialize(format!(
                "download of {} returned HTTP {}",
                uri,
                status.as_u16()
            )));
        }

        let limit = self.config.inline_limit_bytes;
        let advertised = response.content_length();

        if let Some(advertised) = advertised {
            if advertised >= limit as u64 {
                debug!(target: "materializer", size = advertised, "Advertised size over inline limit; skipping body");
                return Ok(self.reference(uri, mime_type, Some(advertised)));
            }
        }

        // Advertised sizes are below the limit here, so the reservation is bounded
        let mut body = Vec::with_capacity(advertised.unwrap_or(0) as usize);
        while let Some(chunk) = response.chunk().await.map_err(|e| {
            GateError::Materialize(format!("failed to read body of {}: {}", uri, e))
        })? {
            if body.len() + chunk.len() >= limit {
                debug!(target: "materializer", read = body.len() + chunk.len(), "Body reached inline limit; returning reference");
                return Ok(self.reference(uri, mime_type, None));
            }
            body.extend_from_slice(&chunk);
        }
        let size = body.len() as u64;

        debug!(target: "materializer", size, "Embedding artifact inline");
        Ok(MaterializedContent {
            uri: uri.to_string(),
            inline: Some(STANDARD.encode(&body)),
            mime_type: mime_type.to_string(),
            size_bytes: Some(size),
        })
    }

    fn reference(&self, uri: &str, mime_type: &str, size: Option<u64>) -> MaterializedContent {
        MaterializedContent {
            uri: uri.to_string(),
            inline: None,
            mime_type: mime_type.to_string(),
            size_bytes: size,
        }
    }
}
