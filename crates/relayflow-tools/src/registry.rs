use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use relayflow_core::config::HostConfig;
use relayflow_core::error::{RelayflowError, Result};
use relayflow_core::flow::RegisteredFlow;
use relayflow_core::traits::{Tool, ToolHost};
use relayflow_core::types::{RequestMeta, ToolDefinition, ToolResponse};

/// Registry of callable flow tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    timeout: Option<Duration>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            timeout: None,
        }
    }

    /// Registry with the host settings from configuration.
    pub fn from_config(config: &HostConfig) -> Self {
        let registry = Self::new();
        match config.tool_timeout_secs {
            Some(secs) => registry.with_timeout(Duration::from_secs(secs)),
            None => registry,
        }
    }

    /// Cap every call at `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Register a tool. A tool with the same name is replaced.
    pub fn register(&mut self, tool: impl Tool) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "Replaced existing tool");
        } else {
            debug!(tool = %name, "Registered tool");
        }
    }

    /// Register a compiled flow.
    pub fn register_flow(&mut self, flow: &RegisteredFlow) {
        flow.register(self);
    }

    /// Unregister a tool by name.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Registered tool names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Definitions for publishing to the host, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute a tool by name.
    pub async fn execute(
        &self,
        name: &str,
        input: serde_json::Value,
        meta: RequestMeta,
    ) -> Result<ToolResponse> {
        let tool = self
            .get(name)
            .ok_or_else(|| RelayflowError::ToolNotFound(name.to_string()))?;

        let Some(timeout) = self.timeout else {
            return Ok(tool.execute(input, meta).await);
        };

        match tokio::time::timeout(timeout, tool.execute(input, meta)).await {
            Ok(response) => Ok(response),
            Err(_) => {
                warn!(tool = %name, timeout_secs = timeout.as_secs(), "Tool call timed out");
                Err(RelayflowError::ToolTimeout {
                    tool: name.to_string(),
                    timeout_secs: timeout.as_secs(),
                })
            }
        }
    }
}

impl ToolHost for ToolRegistry {
    fn register_tool(&mut self, tool: Arc<dyn Tool>) {
        self.register_arc(tool);
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
