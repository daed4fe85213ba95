use async_trait::async_trait;
use serde_json::{json, Value};
use strum::IntoEnumIterator;

use super::{required_str, ToolContext, ToolHandler};
use crate::errors::AgentResult;
use crate::models::content::Content;
use crate::models::tool::Tool;
use crate::state::View;

pub struct Navigate;

#[async_trait]
impl ToolHandler for Navigate {
    fn tool(&self) -> Tool {
        let views: Vec<String> = View::iter().map(|v| v.to_string()).collect();
        Tool::new(
            "navigate",
            "Switch the studio to another view.",
            json!({
                "type": "object",
                "required": ["view"],
                "properties": {
                    "view": {
                        "type": "string",
                        "enum": views,
                        "description": "The view to show."
                    }
                }
            }),
        )
    }

    async fn call(&self, arguments: Value, ctx: &mut ToolContext) -> AgentResult<Vec<Content>> {
        let view = ctx.app.navigate(required_str(&arguments, "view")?)?;
        Ok(vec![Content::text(format!("Now showing the {} view", view))])
    }
}
