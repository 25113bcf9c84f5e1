use serde_json::{Value, json};

use crate::llm::provider::AssistantPart;
use crate::tools::{ToolContext, ToolError, ToolRegistry};

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCallSpec {
    pub id: Option<String>,
    pub name: String,
    pub args_json: Value,
}

/// Runs each call in order and returns one function response per call.
///
/// Unknown names become an `unknown_function` error envelope the model can
/// recover from. A failing tool aborts the whole batch.
pub fn dispatch_calls(
    registry: &ToolRegistry,
    ctx: &ToolContext<'_>,
    calls: &[FunctionCallSpec],
) -> Result<Vec<AssistantPart>, ToolError> {
    calls
        .iter()
        .map(|call| {
            let response_json = dispatch_one(registry, ctx, call)?;
            Ok(AssistantPart::FunctionResponse {
                id: call.id.clone(),
                name: call.name.clone(),
                response_json,
            })
        })
        .collect()
}

fn dispatch_one(
    registry: &ToolRegistry,
    ctx: &ToolContext<'_>,
    call: &FunctionCallSpec,
) -> Result<Value, ToolError> {
    let Some(tool) = registry.get(&call.name) else {
        tracing::warn!(name = %call.name, "model called an unknown function");
        return Ok(json!({
            "ok": false,
            "error": {
                "code": "unknown_function",
                "message": format!("unknown function: {}", call.name),
            }
        }));
    };

    // Every tool is zero-argument; whatever the model sent is ignored.
    if !is_empty_args(&call.args_json) {
        tracing::debug!(name = %call.name, args = %call.args_json, "ignoring tool arguments");
    }

    let result = tool.invoke(ctx)?;
    Ok(json!({
        "ok": true,
        "result": result,
    }))
}

fn is_empty_args(args: &Value) -> bool {
    args.is_null() || args.as_object().is_some_and(|obj| obj.is_empty())
}
