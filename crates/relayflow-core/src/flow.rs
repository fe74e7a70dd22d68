use std::sync::Arc;

use tracing::debug;

use crate::traits::{Tool, ToolHost};
use crate::types::{RequestMeta, ToolResponse};

/// A compiled flow, ready to be registered with a host.
#[derive(Clone)]
pub struct RegisteredFlow {
    pub id: String,
    pub title: String,
    pub description: String,
    tool: Arc<dyn Tool>,
}

impl RegisteredFlow {
    pub fn new(tool: Arc<dyn Tool>) -> Self {
        Self {
            id: tool.name().to_string(),
            title: tool.title().to_string(),
            description: tool.description().to_string(),
            tool,
        }
    }

    /// Wire this flow into the host's tool registry.
    pub fn register(&self, host: &mut dyn ToolHost) {
        debug!(flow_id = %self.id, "Registering flow tool");
        host.register_tool(self.tool.clone());
    }

    /// The underlying tool.
    pub fn tool(&self) -> Arc<dyn Tool> {
        self.tool.clone()
    }

    /// Invoke the flow directly, bypassing any host.
    pub async fn call(&self, input: serde_json::Value, meta: RequestMeta) -> ToolResponse {
        self.tool.execute(input, meta).await
    }
}

impl std::fmt::Debug for RegisteredFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredFlow")
            .field("id", &self.id)
            .field("title", &self.title)
            .finish()
    }
}

/// Register several flows at once.
pub fn register_flows(host: &mut dyn ToolHost, flows: &[RegisteredFlow]) {
    for flow in flows {
        flow.register(host);
    }
}
