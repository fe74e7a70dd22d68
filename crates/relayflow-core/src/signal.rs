//! Values a step handler may return.
//!
//! A handler either hands back a partial state update (execution continues
//! on its own) or one of two pause signals: an [`Interrupt`] asking the
//! caller a question, or a [`WidgetSignal`] handing off to a UI resource.

use serde_json::Value;

use crate::error::{RelayflowError, Result};
use crate::types::{FlowState, UiResource};

/// Pause and ask the caller a question.
#[derive(Debug, Clone, PartialEq)]
pub struct Interrupt {
    /// Question to put to the user.
    pub question: String,
    /// State key the answer is stored under.
    pub field: String,
    /// Optional answers to offer.
    pub suggestions: Option<Vec<String>>,
    /// Extra context for the agent.
    pub context: Option<Value>,
}

impl Interrupt {
    pub fn with_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions = Some(suggestions.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }
}

/// Pause and render a UI resource.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetSignal {
    pub resource: UiResource,
    /// Forwarded to the widget as structured content.
    pub data: FlowState,
    /// What the widget does, for the agent's benefit.
    pub description: Option<String>,
}

impl WidgetSignal {
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Everything a step handler can return.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutput {
    Update(FlowState),
    Interrupt(Interrupt),
    Widget(WidgetSignal),
}

impl StepOutput {
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupt(_))
    }

    pub fn is_widget(&self) -> bool {
        matches!(self, Self::Widget(_))
    }

    /// An update that changes nothing.
    pub fn empty() -> Self {
        Self::Update(FlowState::new())
    }
}

impl From<Interrupt> for StepOutput {
    fn from(value: Interrupt) -> Self {
        Self::Interrupt(value)
    }
}

impl From<WidgetSignal> for StepOutput {
    fn from(value: WidgetSignal) -> Self {
        Self::Widget(value)
    }
}

impl From<FlowState> for StepOutput {
    fn from(value: FlowState) -> Self {
        Self::Update(value)
    }
}

impl TryFrom<Value> for StepOutput {
    type Error = RelayflowError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::Update(map)),
            other => Err(RelayflowError::InvalidUpdate(json_kind(&other).to_string())),
        }
    }
}

/// Build an interrupt signal.
pub fn interrupt(question: impl Into<String>, field: impl Into<String>) -> Interrupt {
    Interrupt {
        question: question.into(),
        field: field.into(),
        suggestions: None,
        context: None,
    }
}

/// Build a widget signal. Non-object `data` is wrapped as `{"value": data}`.
pub fn show_widget(resource: UiResource, data: Value) -> WidgetSignal {
    let data = match data {
        Value::Object(map) => map,
        Value::Null => FlowState::new(),
        other => {
            let mut map = FlowState::new();
            map.insert("value".to_string(), other);
            map
        }
    };
    WidgetSignal {
        resource,
        data,
        description: None,
    }
}

/// Build a partial state update from a JSON object.
pub fn update(value: Value) -> Result<StepOutput> {
    StepOutput::try_from(value)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
