//! Tool registry backed by a remote tool service

use conduit_mcp::{ToolDescriptor, ToolService};
use conduit_provider::{empty_object_schema, Tool};
use tracing::{debug, info, warn};

use crate::{AgentError, Result};

/// Translate a server-declared tool into the endpoint's function schema
pub fn to_provider_tool(descriptor: &ToolDescriptor) -> Tool {
    Tool::new(
        &descriptor.name,
        descriptor.description.clone().unwrap_or_default(),
        descriptor
            .input_schema
            .clone()
            .unwrap_or_else(empty_object_schema),
    )
}

/// Tools discovered once per session, in server order
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the tool set from the service. No retry: failure is fatal to
    /// startup.
    pub async fn discover<S>(service: &S) -> Result<Self>
    where
        S: ToolService + ?Sized,
    {
        let tools = service
            .list_tools()
            .await
            .map_err(AgentError::RegistryUnavailable)?;

        let registry = Self::from_descriptors(tools);
        info!("◆ {} TOOLS DISCOVERED", registry.len());
        Ok(registry)
    }

    /// Build from descriptors, keeping the first of any duplicated name
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = ToolDescriptor>) -> Self {
        let mut registry = Self::new();
        for descriptor in descriptors {
            registry.register(descriptor);
        }
        registry
    }

    pub fn register(&mut self, descriptor: ToolDescriptor) {
        if self.has(&descriptor.name) {
            warn!("Duplicate tool '{}' ignored", descriptor.name);
            return;
        }
        debug!("Registered tool: {}", descriptor.name);
        self.tools.push(descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn definitions(&self) -> Vec<Tool> {
        self.tools.iter().map(to_provider_tool).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name.clone()).collect()
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_schema_becomes_empty_object() {
        let tool = to_provider_tool(&ToolDescriptor {
            name: "Ping".into(),
            description: None,
            input_schema: None,
        });

        assert_eq!(tool.tool_type, "function");
        assert_eq!(tool.function.description, "");
        assert_eq!(
            tool.function.parameters,
            json!({"type": "object", "properties": {}, "required": []})
        );
    }

    #[test]
    fn test_duplicates_keep_first() {
        let registry = ToolRegistry::from_descriptors(vec![
            ToolDescriptor::new("Echo", "first", json!({"type": "object"})),
            ToolDescriptor::new("Echo", "second", json!({"type": "object"})),
        ]);

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("Echo").and_then(|t| t.description.as_deref()),
            Some("first")
        );
    }
}
