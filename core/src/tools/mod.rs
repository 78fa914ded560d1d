pub mod args;
pub mod error;
pub mod generation;
pub mod orchestrator;
pub mod purchase;
pub mod registry;
pub mod traits;

// Re-export common types
pub use error::{ToolError, ToolResult};
pub use generation::{Image2ImageTool, Text2ImageTool, Text2VideoTool};
pub use orchestrator::ToolOrchestrator;
pub use purchase::PurchasePlanTool;
pub use registry::ToolRegistry;
pub use traits::Tool;

use std::sync::Arc;

/// Register `purchase_plan`, `text2image`, `image2image` and `text2video`
pub async fn register_generation_tools(
    registry: &ToolRegistry,
    orchestrator: Arc<ToolOrchestrator>,
) {
    registry
        .register(Arc::new(PurchasePlanTool::new(Arc::clone(&orchestrator))))
        .await;
    registry
        .register(Arc::new(Text2ImageTool::new(Arc::clone(&orchestrator))))
        .await;
    registry
        .register(Arc::new(Image2ImageTool::new(Arc::clone(&orchestrator))))
        .await;
    registry
        .register(Arc::new(Text2VideoTool::new(orchestrator)))
        .await;
}
