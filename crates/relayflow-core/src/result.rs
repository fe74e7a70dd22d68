use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::RelayflowError;
use crate::types::{FieldSchema, FlowState, RequestMeta, ToolResponse, UiResource};
use crate::widget::{widget_meta, widget_payload, FlowHandoff};

/// Outcome of one flow invocation.
///
/// Serializes to the caller-facing JSON document, discriminated by `status`.
/// Every variant except a bare `error` carries the full state so the caller
/// can replay it on the next call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FlowResult {
    Interrupt {
        step: String,
        question: String,
        field: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        suggestions: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        context: Option<Value>,
        state: FlowState,
    },
    Widget {
        /// Set for static graph pauses.
        #[serde(skip_serializing_if = "Option::is_none")]
        step: Option<String>,
        /// Set for dynamic form pauses.
        #[serde(skip_serializing_if = "Option::is_none")]
        field: Option<String>,
        #[serde(rename = "widgetId")]
        widget_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        state: FlowState,
        #[serde(skip_serializing)]
        resource: UiResource,
        #[serde(skip_serializing)]
        data: FlowState,
    },
    Gathering {
        fields: BTreeMap<String, FieldSchema>,
        gathered: FlowState,
        missing: Vec<String>,
        errors: BTreeMap<String, String>,
        state: FlowState,
    },
    Complete {
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        state: FlowState,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        step: Option<String>,
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        state: Option<FlowState>,
    },
}

impl FlowResult {
    /// Error result with no step and no state.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            step: None,
            error: message.into(),
            state: None,
        }
    }

    /// Error result for an execution failure, with a best-effort state snapshot.
    pub fn from_error(err: &RelayflowError, state: Option<FlowState>) -> Self {
        let step = match err {
            RelayflowError::Handler { step, .. } | RelayflowError::Panicked { step, .. } => {
                Some(step.clone())
            }
            RelayflowError::UnknownStep(step) => Some(step.clone()),
            _ => None,
        };
        Self::Error {
            step,
            error: err.to_string(),
            state,
        }
    }

    /// Pause on a widget reached by a graph step.
    pub fn widget_at_step(
        step: impl Into<String>,
        resource: UiResource,
        data: FlowState,
        description: Option<String>,
        state: FlowState,
    ) -> Self {
        Self::Widget {
            step: Some(step.into()),
            field: None,
            widget_id: resource.id.clone(),
            description,
            state,
            resource,
            data,
        }
    }

    /// Pause on a widget owned by a form field.
    pub fn widget_for_field(
        field: impl Into<String>,
        resource: UiResource,
        data: FlowState,
        description: Option<String>,
        state: FlowState,
    ) -> Self {
        Self::Widget {
            step: None,
            field: Some(field.into()),
            widget_id: resource.id.clone(),
            description,
            state,
            resource,
            data,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Interrupt { .. } => "interrupt",
            Self::Widget { .. } => "widget",
            Self::Gathering { .. } => "gathering",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn state(&self) -> Option<&FlowState> {
        match self {
            Self::Interrupt { state, .. }
            | Self::Widget { state, .. }
            | Self::Gathering { state, .. }
            | Self::Complete { state, .. } => Some(state),
            Self::Error { state, .. } => state.as_ref(),
        }
    }

    /// Caller-facing JSON document.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({"status": "error", "error": format!("Failed to serialize result: {}", e)})
        })
    }

    /// Wrap this result for the host.
    ///
    /// Widget pauses carry the widget data plus a hand-off record as
    /// structured content, and resource metadata in `meta`. Request metadata
    /// is merged last so it wins on key conflicts.
    pub fn into_response(self, flow_id: &str, request_meta: &RequestMeta) -> ToolResponse {
        let document = self.to_json();
        let text = document.to_string();

        let (structured_content, mut meta) = match self {
            Self::Widget {
                step,
                field,
                state,
                resource,
                data,
                ..
            } => {
                let handoff = FlowHandoff {
                    flow_id: flow_id.to_string(),
                    step: step.or(field).unwrap_or_default(),
                    state,
                };
                (widget_payload(&data, &handoff), widget_meta(&resource))
            }
            _ => (document, RequestMeta::new()),
        };

        for (k, v) in request_meta {
            meta.insert(k.clone(), v.clone());
        }

        ToolResponse {
            text,
            structured_content,
            meta,
        }
    }
}
