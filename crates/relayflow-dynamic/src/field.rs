//! Field definitions and their constructors.
//!
//! ```rust,no_run
//! use relayflow_dynamic::field;
//!
//! let name = field::text("Full name").hint("Ask casually");
//! let plan = field::select("Plan", ["starter", "pro", "enterprise"]);
//! let seats = field::number("Number of seats").min(1.0).depends_on(["plan"]);
//! let agreed = field::boolean("Agrees to terms").optional();
//! ```

use std::sync::Arc;

use relayflow_core::types::{FieldKind, FieldSchema, FlowState, SelectOption, UiResource};

/// Custom check for a text value. `Err` carries the message shown to the agent.
pub type TextValidator = Arc<dyn Fn(&str) -> Result<(), String> + Send + Sync>;

/// Visibility predicate over the current state.
pub type Condition = Arc<dyn Fn(&FlowState) -> bool + Send + Sync>;

/// Kind-specific part of a field.
#[derive(Clone)]
pub enum FieldType {
    Text { validator: Option<TextValidator> },
    Select { options: Vec<SelectOption> },
    Number { min: Option<f64>, max: Option<f64> },
    Boolean,
    /// Filled in by a UI resource rather than by the agent.
    Widget { resource: UiResource, data: FlowState },
}

impl FieldType {
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Text { .. } => FieldKind::Text,
            Self::Select { .. } => FieldKind::Select,
            Self::Number { .. } => FieldKind::Number,
            Self::Boolean => FieldKind::Boolean,
            Self::Widget { .. } => FieldKind::Widget,
        }
    }
}

/// One piece of data a dynamic flow gathers.
#[derive(Clone)]
pub struct FieldDefinition {
    pub field_type: FieldType,
    pub label: String,
    pub description: Option<String>,
    pub required: bool,
    /// How the agent should ask for it.
    pub hint: Option<String>,
    /// Fields that need a value before this one becomes active.
    pub depends_on: Vec<String>,
    pub when: Option<Condition>,
}

impl FieldDefinition {
    fn new(field_type: FieldType, label: impl Into<String>) -> Self {
        Self {
            field_type,
            label: label.into(),
            description: None,
            required: true,
            hint: None,
            depends_on: Vec::new(),
            when: None,
        }
    }

    pub fn kind(&self) -> FieldKind {
        self.field_type.kind()
    }

    pub fn is_widget(&self) -> bool {
        matches!(self.field_type, FieldType::Widget { .. })
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Shorthand for `required(false)`.
    pub fn optional(self) -> Self {
        self.required(false)
    }

    pub fn depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = names.into_iter().map(Into::into).collect();
        self
    }

    /// Only show the field while `condition` holds.
    pub fn when<F>(mut self, condition: F) -> Self
    where
        F: Fn(&FlowState) -> bool + Send + Sync + 'static,
    {
        self.when = Some(Arc::new(condition));
        self
    }

    /// Attach a validator. Ignored for anything but text fields.
    pub fn validate<F>(mut self, validator: F) -> Self
    where
        F: Fn(&str) -> Result<(), String> + Send + Sync + 'static,
    {
        if let FieldType::Text { validator: slot } = &mut self.field_type {
            *slot = Some(Arc::new(validator));
        }
        self
    }

    /// Lower bound for number fields.
    pub fn min(mut self, value: f64) -> Self {
        if let FieldType::Number { min, .. } = &mut self.field_type {
            *min = Some(value);
        }
        self
    }

    /// Upper bound for number fields.
    pub fn max(mut self, value: f64) -> Self {
        if let FieldType::Number { max, .. } = &mut self.field_type {
            *max = Some(value);
        }
        self
    }

    /// Static data handed to a widget field's resource.
    pub fn data(mut self, value: FlowState) -> Self {
        if let FieldType::Widget { data, .. } = &mut self.field_type {
            *data = value;
        }
        self
    }

    /// The agent-facing schema: functions stripped, absent parts omitted.
    pub fn schema(&self) -> FieldSchema {
        let mut schema = FieldSchema {
            kind: self.kind(),
            label: self.label.clone(),
            description: self.description.clone().filter(|d| !d.is_empty()),
            required: self.required,
            hint: self.hint.clone().filter(|h| !h.is_empty()),
            depends_on: None,
            options: None,
            min: None,
            max: None,
        };
        if !self.depends_on.is_empty() {
            schema.depends_on = Some(self.depends_on.clone());
        }
        match &self.field_type {
            FieldType::Select { options } => schema.options = Some(options.clone()),
            FieldType::Number { min, max } => {
                schema.min = *min;
                schema.max = *max;
            }
            _ => {}
        }
        schema
    }
}

impl std::fmt::Debug for FieldDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDefinition")
            .field("kind", &self.kind())
            .field("label", &self.label)
            .field("required", &self.required)
            .field("depends_on", &self.depends_on)
            .finish()
    }
}

pub fn text(label: impl Into<String>) -> FieldDefinition {
    FieldDefinition::new(FieldType::Text { validator: None }, label)
}

pub fn select<I, O>(label: impl Into<String>, options: I) -> FieldDefinition
where
    I: IntoIterator<Item = O>,
    O: Into<SelectOption>,
{
    FieldDefinition::new(
        FieldType::Select {
            options: options.into_iter().map(Into::into).collect(),
        },
        label,
    )
}

pub fn number(label: impl Into<String>) -> FieldDefinition {
    FieldDefinition::new(FieldType::Number { min: None, max: None }, label)
}

pub fn boolean(label: impl Into<String>) -> FieldDefinition {
    FieldDefinition::new(FieldType::Boolean, label)
}

pub fn widget(resource: UiResource, label: impl Into<String>) -> FieldDefinition {
    FieldDefinition::new(
        FieldType::Widget {
            resource,
            data: FlowState::new(),
        },
        label,
    )
}
