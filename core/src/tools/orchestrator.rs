use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::access_broker::AccessBroker;
use crate::generation::{GenerationRequest, GenerationResult};
use crate::materializer::{ContentMaterializer, MaterializedContent};
use crate::mcp::{CallToolResult, ResourceContents, ToolContent};

use super::error::ToolResult;

/// Per-invocation control flow shared by every generation tool:
/// check balance → obtain grant → generate → materialize.
///
/// Holds no state across invocations beyond the shared broker.
pub struct ToolOrchestrator {
    broker: Arc<AccessBroker>,
    materializer: ContentMaterializer,
    plan_did: String,
    agent_did: String,
}

impl ToolOrchestrator {
    pub fn new(
        broker: Arc<AccessBroker>,
        materializer: ContentMaterializer,
        plan_did: impl Into<String>,
        agent_did: impl Into<String>,
    ) -> Self {
        Self {
            broker,
            materializer,
            plan_did: plan_did.into(),
            agent_did: agent_did.into(),
        }
    }

    pub fn plan_did(&self) -> &str {
        &self.plan_did
    }

    pub fn broker(&self) -> &Arc<AccessBroker> {
        &self.broker
    }

    /// Run one generation tool invocation.
    ///
    /// Errors only for a missing access grant or an unreachable artifact;
    /// every other outcome is a well-formed envelope.
    #[tracing::instrument(skip(self, request), fields(tool = request.kind()))]
    pub async fn run(&self, request: GenerationRequest) -> ToolResult<CallToolResult> {
        let started = Instant::now();

        if !self
            .broker
            .check_balance(&self.plan_did, &self.agent_did)
            .await
        {
            info!(target: "tool_orchestrator", plan = %self.plan_did, "Insufficient credits; asking for purchase");
            return Ok(insufficient_credits(&self.plan_did));
        }

        let client = self.broker.get_generation_client(&self.agent_did).await?;
        debug!(target: "tool_orchestrator", backend = %client.base_uri(), "Access granted");
        let result = client.generate(&request).await;

        let uri = match result {
            GenerationResult {
                success: true,
                primary_uri: Some(uri),
                ..
            } => uri,
            failed => {
                if matches!(failed.status, Some(401) | Some(403)) {
                    self.broker.invalidate_grant(&self.agent_did);
                }
                let message = failed
                    .message
                    .unwrap_or_else(|| format!("{} generation failed", request.kind()));
                warn!(target: "tool_orchestrator", error = %message, "Generation failed");
                return Ok(CallToolResult::error(message));
            }
        };

        debug!(target: "tool_orchestrator", uri = %uri, "Generation succeeded; materializing");
        let content = self
            .materializer
            .materialize(&uri, request.mime_type())
            .await?;

        info!(
            target: "tool_orchestrator",
            inline = content.is_inline(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generation delivered"
        );
        Ok(delivered(content))
    }

    /// Purchase a plan; failures come back as error envelopes
    #[tracing::instrument(skip(self))]
    pub async fn purchase(&self, plan_did: &str) -> CallToolResult {
        let outcome = self.broker.order_plan(plan_did).await;
        if !outcome.success {
            return CallToolResult::error(outcome.message);
        }

        let metadata = json!({
            "planDid": plan_did,
            "agreementId": outcome.agreement_id,
        });
        CallToolResult::text(outcome.message).with_metadata(metadata)
    }
}

/// Purchase prompt returned instead of generating
pub fn insufficient_credits(plan_did: &str) -> CallToolResult {
    CallToolResult::text(format!(
        "Insufficient credits to use this tool. Purchase plan {} with the purchase_plan tool, then try again.",
        plan_did
    ))
    .with_metadata(json!({
        "needsPurchase": true,
        "planDid": plan_did,
    }))
}

fn delivered(content: MaterializedContent) -> CallToolResult {
    let MaterializedContent {
        uri,
        inline,
        mime_type,
        size_bytes,
    } = content;

    let metadata = json!({
        "uri": uri,
        "mimeType": mime_type,
        "inline": inline.is_some(),
        "sizeBytes": size_bytes,
    });

    let blocks = match inline {
        Some(data) if mime_type.starts_with("image/") => vec![ToolContent::Image {
            data,
            mime_type,
        }],
        Some(data) => vec![ToolContent::Resource {
            resource: ResourceContents {
                uri,
                mime_type: Some(mime_type),
                text: None,
                blob: Some(data),
            },
        }],
        None => vec![
            ToolContent::Text {
                text: format!("Generated content is available at {}", uri),
            },
            ToolContent::ResourceLink {
                name: artifact_name(&uri),
                uri,
                mime_type,
            },
        ],
    };

    CallToolResult::new(blocks).with_metadata(metadata)
}

fn artifact_name(uri: &str) -> String {
    url::Url::parse(uri)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "generated-content".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purchase_prompt_carries_plan() {
        let result = insufficient_credits("did:nv:plan");
        assert!(!result.is_error);
        let metadata = result.metadata.unwrap();
        assert_eq!(metadata["needsPurchase"], json!(true));
        assert_eq!(metadata["planDid"], json!("did:nv:plan"));
    }

    #[test]
    fn reference_envelope_links_artifact() {
        let result = delivered(MaterializedContent {
            uri: "https://cdn.example/out/clip.mp4".into(),
            inline: None,
            mime_type: "video/mp4".into(),
            size_bytes: Some(5_000_000),
        });
        assert!(matches!(
            &result.content[1],
            ToolContent::ResourceLink { name, mime_type, .. }
                if name == "clip.mp4" && mime_type == "video/mp4"
        ));
        assert_eq!(result.metadata.unwrap()["inline"], json!(false));
    }

    #[test]
    fn inline_video_is_embedded_resource() {
        let result = delivered(MaterializedContent {
            uri: "https://cdn.example/out/clip.mp4".into(),
            inline: Some("AAEC".into()),
            mime_type: "video/mp4".into(),
            size_bytes: Some(3),
        });
        assert!(matches!(
            &result.content[0],
            ToolContent::Resource { resource } if resource.blob.as_deref() == Some("AAEC")
        ));
    }

    #[test]
    fn artifact_name_falls_back() {
        assert_eq!(artifact_name("https://cdn.example/a/b.jpg"), "b.jpg");
        assert_eq!(artifact_name("https://cdn.example/"), "generated-content");
        assert_eq!(artifact_name("not a url"), "generated-content");
    }
}
