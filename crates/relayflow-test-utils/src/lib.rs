//! Shared fixtures for relayflow tests: state literals, request builders,
//! a recording host and a couple of canned tools.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::{json, Value};

use relayflow_core::traits::{Tool, ToolHost};
use relayflow_core::types::{FlowState, RequestMeta, ToolResponse};

/// Build a state map from a JSON object literal. Panics on anything else.
pub fn state_from(value: Value) -> FlowState {
    match value {
        Value::Object(map) => map,
        other => panic!("state_from expects a JSON object, got {}", other),
    }
}

/// `{"action": "start"}` with an optional seed state.
pub fn start_request(state: Value) -> Value {
    json!({"action": "start", "state": state})
}

/// Answer an interrupt, echoing the field it named.
pub fn continue_request(step: &str, field: &str, answer: Value, state: &Value) -> Value {
    json!({
        "action": "continue",
        "step": step,
        "field": field,
        "answer": answer,
        "state": state,
    })
}

/// Submit form data to a dynamic flow.
pub fn submit_request(data: Value, state: &Value) -> Value {
    json!({"action": "submit", "data": data, "state": state})
}

/// Report a widget's result for `step`.
pub fn widget_result_request(step: &str, result: Value, state: &Value) -> Value {
    json!({
        "action": "widget_result",
        "step": step,
        "widgetResult": result,
        "state": state,
    })
}

/// Parse a response's text channel, panicking with the raw text if it is not JSON.
pub fn response_json(response: &ToolResponse) -> Value {
    serde_json::from_str(&response.text)
        .unwrap_or_else(|e| panic!("response text is not JSON ({}): {}", e, response.text))
}

/// Host that just remembers what was registered.
#[derive(Default)]
pub struct RecordingHost {
    pub tools: Vec<Arc<dyn Tool>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }
}

impl ToolHost for RecordingHost {
    fn register_tool(&mut self, tool: Arc<dyn Tool>) {
        self.tools.push(tool);
    }
}

/// Tool that echoes its input back as a `complete` result.
pub struct EchoTool {
    pub name: String,
}

impl EchoTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Tool for EchoTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn title(&self) -> &str {
        "Echo"
    }

    fn description(&self) -> &str {
        "Echoes its input"
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object"})
    }

    fn execute(&self, input: Value, meta: RequestMeta) -> BoxFuture<'_, ToolResponse> {
        Box::pin(async move {
            let doc = json!({"status": "complete", "result": input});
            ToolResponse {
                text: doc.to_string(),
                structured_content: doc,
                meta,
            }
        })
    }
}

/// Tool that sleeps before answering. Pair with paused tokio time.
pub struct SlowTool {
    pub delay: Duration,
}

impl Tool for SlowTool {
    fn name(&self) -> &str {
        "slow"
    }

    fn title(&self) -> &str {
        "Slow"
    }

    fn description(&self) -> &str {
        "Takes its time"
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object"})
    }

    fn execute(&self, _input: Value, meta: RequestMeta) -> BoxFuture<'_, ToolResponse> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            let doc = json!({"status": "complete"});
            ToolResponse {
                text: doc.to_string(),
                structured_content: doc,
                meta,
            }
        })
    }
}
