use std::sync::Arc;

use futures::future::BoxFuture;

use crate::types::{RequestMeta, ToolAnnotations, ToolDefinition, ToolResponse};

/// A single externally callable operation.
///
/// Flow adapters implement this: one call in, one response out, no memory
/// between calls.
pub trait Tool: Send + Sync + 'static {
    /// Tool name (the flow id).
    fn name(&self) -> &str;

    /// Display title.
    fn title(&self) -> &str;

    /// Description shown to the agent, including the calling protocol.
    fn description(&self) -> &str;

    /// JSON Schema for tool input.
    fn input_schema(&self) -> serde_json::Value;

    fn annotations(&self) -> Option<&ToolAnnotations> {
        None
    }

    /// Handle one call. Failures come back as `error` responses, never as panics.
    fn execute(&self, input: serde_json::Value, meta: RequestMeta) -> BoxFuture<'_, ToolResponse>;

    /// Definition for publishing to a host.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            title: self.title().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
            annotations: self.annotations().cloned(),
        }
    }
}

/// Anything a compiled flow can be registered into.
pub trait ToolHost {
    fn register_tool(&mut self, tool: Arc<dyn Tool>);
}
