use super::args::required_text;
use super::orchestrator::ToolOrchestrator;
use super::{Tool, ToolResult};
use crate::mcp::CallToolResult;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// Buys a credit plan through the payment service
pub struct PurchasePlanTool {
    orchestrator: Arc<ToolOrchestrator>,
}

impl PurchasePlanTool {
    pub fn new(orchestrator: Arc<ToolOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl Tool for PurchasePlanTool {
    fn name(&self) -> String {
        "purchase_plan".to_string()
    }

    fn description(&self) -> String {
        format!(
            "Purchase a credit plan so the generation tools can be used. The generation tools draw on plan {}.",
            self.orchestrator.plan_did()
        )
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "planDid": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Identifier of the plan to purchase"
                }
            },
            "required": ["planDid"]
        })
    }

    async fn call(&self, arguments: Value) -> ToolResult<CallToolResult> {
        let plan_did = required_text(&arguments, "planDid")?;
        Ok(self.orchestrator.purchase(&plan_did).await)
    }
}
