use std::collections::HashMap;

use serde_json::json;

use super::Tool;
use crate::llm::provider::FunctionDeclaration;

/// Immutable catalog of tools, looked up by the name the model calls.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    by_name: HashMap<&'static str, Tool>,
    order: Vec<Tool>,
}

impl ToolRegistry {
    pub fn standard() -> Self {
        let order: Vec<Tool> = Tool::all().collect();
        let by_name = order.iter().map(|tool| (tool.name(), *tool)).collect();
        Self { by_name, order }
    }

    pub fn get(&self, name: &str) -> Option<Tool> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Tool> + '_ {
        self.order.iter().copied()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(Tool::name).collect()
    }

    /// Every tool takes no arguments, so each schema is an empty object.
    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        self.iter()
            .map(|tool| FunctionDeclaration {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters_json_schema: json!({
                    "type": "object",
                    "properties": {}
                }),
            })
            .collect()
    }
}
