use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Caller-owned data bag threaded through every call.
///
/// The engine only ever reads values out of it and shallow-merges handler
/// updates into it. Nothing stored here is interpreted as code or a path.
pub type FlowState = Map<String, Value>;

/// Request metadata supplied by the host transport (`_meta`).
pub type RequestMeta = Map<String, Value>;

/// Shallow merge: keys in `update` overwrite keys in `state`.
pub fn merge_state(state: &mut FlowState, update: FlowState) {
    for (k, v) in update {
        state.insert(k, v);
    }
}

/// Absent, `null` and `""` all count as "no value".
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Identity of a flow as exposed to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Unique identifier; becomes the tool name.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Tells the agent when to use this flow.
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<ToolAnnotations>,
}

impl FlowConfig {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            annotations: None,
        }
    }

    pub fn with_annotations(mut self, annotations: ToolAnnotations) -> Self {
        self.annotations = Some(annotations);
        self
    }
}

/// Behavioral hints published alongside a tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only_hint: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotent_hint: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_world_hint: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destructive_hint: Option<bool>,
}

/// Reference to an externally registered UI resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiResource {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_height: Option<bool>,
}

impl UiResource {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            auto_height: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_auto_height(mut self, auto_height: bool) -> Self {
        self.auto_height = Some(auto_height);
        self
    }

    /// Template URI for Apps-SDK style hosts.
    pub fn openai_uri(&self) -> String {
        format!("ui://widgets/apps-sdk/{}.html", self.id)
    }

    /// Template URI for MCP Apps hosts.
    pub fn mcp_uri(&self) -> String {
        format!("ui://widgets/ext-apps/{}.html", self.id)
    }
}

/// Tool definition for publishing to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub title: String,
    pub description: String,
    pub input_schema: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<ToolAnnotations>,
}

/// What a flow tool hands back to the host for one call.
#[derive(Debug, Clone)]
pub struct ToolResponse {
    /// JSON document for the agent.
    pub text: String,
    /// Structured payload; for widget pauses this is the widget's data.
    pub structured_content: Value,
    /// Hand-off metadata merged with the request metadata.
    pub meta: RequestMeta,
}

impl ToolResponse {
    /// Parse `text` back into JSON.
    pub fn json(&self) -> crate::error::Result<Value> {
        Ok(serde_json::from_str(&self.text)?)
    }

    /// The `status` field of the response document.
    pub fn status(&self) -> Option<String> {
        self.json()
            .ok()
            .and_then(|v| v.get("status").and_then(|s| s.as_str()).map(String::from))
    }
}

/// Kind of a declaratively gathered field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Select,
    Number,
    Boolean,
    Widget,
}

/// One allowed value of a select field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectOption {
    Plain(String),
    Labeled { label: String, value: String },
}

impl SelectOption {
    pub fn value(&self) -> &str {
        match self {
            Self::Plain(v) => v,
            Self::Labeled { value, .. } => value,
        }
    }
}

impl From<&str> for SelectOption {
    fn from(value: &str) -> Self {
        Self::Plain(value.to_string())
    }
}

impl From<String> for SelectOption {
    fn from(value: String) -> Self {
        Self::Plain(value)
    }
}

/// Field definition as shown to the agent: no validators, no predicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<SelectOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_state_later_keys_win() {
        let mut state = json!({"a": 1, "b": 2}).as_object().cloned().unwrap();
        let update = json!({"b": 3, "c": 4}).as_object().cloned().unwrap();
        merge_state(&mut state, update);
        assert_eq!(Value::Object(state), json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn test_is_empty_value() {
        assert!(is_empty_value(None));
        assert!(is_empty_value(Some(&Value::Null)));
        assert!(is_empty_value(Some(&json!(""))));
        assert!(!is_empty_value(Some(&json!(0))));
        assert!(!is_empty_value(Some(&json!(false))));
        assert!(!is_empty_value(Some(&json!("x"))));
    }

    #[test]
    fn test_resource_uris() {
        let res = UiResource::new("calendar", "Calendar");
        assert_eq!(res.openai_uri(), "ui://widgets/apps-sdk/calendar.html");
        assert_eq!(res.mcp_uri(), "ui://widgets/ext-apps/calendar.html");
    }

    #[test]
    fn test_field_schema_serialization_skips_absent() {
        let schema = FieldSchema {
            kind: FieldKind::Select,
            label: "Plan".into(),
            description: None,
            required: true,
            hint: None,
            depends_on: Some(vec!["email".into()]),
            options: Some(vec![
                SelectOption::from("a"),
                SelectOption::Labeled {
                    label: "Bee".into(),
                    value: "b".into(),
                },
            ]),
            min: None,
            max: None,
        };
        let v = serde_json::to_value(&schema).unwrap();
        assert_eq!(
            v,
            json!({
                "type": "select",
                "label": "Plan",
                "required": true,
                "dependsOn": ["email"],
                "options": ["a", {"label": "Bee", "value": "b"}]
            })
        );
    }

    #[test]
    fn test_annotations_camel_case() {
        let ann = ToolAnnotations {
            read_only_hint: Some(true),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&ann).unwrap(),
            json!({"readOnlyHint": true})
        );
    }
}
