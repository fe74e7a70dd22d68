use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::types::{FlowState, RequestMeta, UiResource};

/// Key under which the hand-off record rides inside widget data.
pub const FLOW_HANDOFF_KEY: &str = "__flow";

/// Lets a widget-originated call find its way back into the right flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowHandoff {
    pub flow_id: String,
    pub step: String,
    pub state: FlowState,
}

/// Response metadata telling the rendering layer which resource to mount.
pub fn widget_meta(resource: &UiResource) -> RequestMeta {
    let mut ui = serde_json::Map::new();
    ui.insert("resourceUri".into(), Value::String(resource.mcp_uri()));
    if resource.auto_height == Some(true) {
        ui.insert("autoHeight".into(), Value::Bool(true));
    }

    let mut meta = RequestMeta::new();
    meta.insert(
        "openai/outputTemplate".into(),
        Value::String(resource.openai_uri()),
    );
    meta.insert("openai/widgetAccessible".into(), json!(true));
    meta.insert("openai/resultCanProduceWidget".into(), json!(true));
    meta.insert("ui".into(), Value::Object(ui));
    meta
}

/// Widget data with the hand-off record attached.
pub fn widget_payload(data: &FlowState, handoff: &FlowHandoff) -> Value {
    let mut payload = data.clone();
    payload.insert(
        FLOW_HANDOFF_KEY.into(),
        serde_json::to_value(handoff).unwrap_or(Value::Null),
    );
    Value::Object(payload)
}
