use super::args::{optional_positive_number, optional_urls, required_text, required_url};
use super::orchestrator::ToolOrchestrator;
use super::{Tool, ToolResult};
use crate::generation::GenerationRequest;
use crate::mcp::CallToolResult;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Text-to-image generation
pub struct Text2ImageTool {
    orchestrator: Arc<ToolOrchestrator>,
}

impl Text2ImageTool {
    pub fn new(orchestrator: Arc<ToolOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl Tool for Text2ImageTool {
    fn name(&self) -> String {
        "text2image".to_string()
    }

    fn description(&self) -> String {
        "Generate an image from a text prompt. Requires credits on the configured plan.".to_string()
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Description of the image to generate"
                }
            },
            "required": ["prompt"]
        })
    }

    async fn call(&self, arguments: Value) -> ToolResult<CallToolResult> {
        let prompt = required_text(&arguments, "prompt")?;
        debug!(target: "text2image_tool", "Dispatching text2image");

        self.orchestrator
            .run(GenerationRequest::Text2Image { prompt })
            .await
    }
}

/// Image-to-image transformation
pub struct Image2ImageTool {
    orchestrator: Arc<ToolOrchestrator>,
}

impl Image2ImageTool {
    pub fn new(orchestrator: Arc<ToolOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl Tool for Image2ImageTool {
    fn name(&self) -> String {
        "image2image".to_string()
    }

    fn description(&self) -> String {
        "Transform an existing image according to a text prompt. Requires credits on the configured plan."
            .to_string()
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "inputImageUrl": {
                    "type": "string",
                    "format": "uri",
                    "description": "URL of the source image"
                },
                "prompt": {
                    "type": "string",
                    "minLength": 1,
                    "description": "How the image should be transformed"
                }
            },
            "required": ["inputImageUrl", "prompt"]
        })
    }

    async fn call(&self, arguments: Value) -> ToolResult<CallToolResult> {
        let input_image_url = required_url(&arguments, "inputImageUrl")?;
        let prompt = required_text(&arguments, "prompt")?;

        self.orchestrator
            .run(GenerationRequest::Image2Image {
                input_image_url,
                prompt,
            })
            .await
    }
}

/// Text-to-video generation
pub struct Text2VideoTool {
    orchestrator: Arc<ToolOrchestrator>,
}

impl Text2VideoTool {
    pub fn new(orchestrator: Arc<ToolOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl Tool for Text2VideoTool {
    fn name(&self) -> String {
        "text2video".to_string()
    }

    fn description(&self) -> String {
        "Generate a short video from a text prompt, optionally guided by reference images. Requires credits on the configured plan."
            .to_string()
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Description of the video to generate"
                },
                "imageUrls": {
                    "type": "array",
                    "items": { "type": "string", "format": "uri" },
                    "description": "Optional reference image URLs"
                },
                "duration": {
                    "type": "number",
                    "exclusiveMinimum": 0,
                    "description": "Optional duration in seconds"
                }
            },
            "required": ["prompt"]
        })
    }

    async fn call(&self, arguments: Value) -> ToolResult<CallToolResult> {
        let prompt = required_text(&arguments, "prompt")?;
        let image_urls = optional_urls(&arguments, "imageUrls")?;
        let duration_seconds = optional_positive_number(&arguments, "duration")?;

        self.orchestrator
            .run(GenerationRequest::Text2Video {
                prompt,
                image_urls,
                duration_seconds,
            })
            .await
    }
}
