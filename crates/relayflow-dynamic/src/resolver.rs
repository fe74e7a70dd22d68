//! Field resolution: activation, coercion, validation and missing detection.
//!
//! Everything here is a pure function of the field list and the state, so
//! resubmitting the same state and data always resolves the same way.

use std::collections::BTreeMap;

use serde_json::{Number, Value};

use relayflow_core::result::FlowResult;
use relayflow_core::types::{is_empty_value, FlowState};

use crate::field::{FieldDefinition, FieldType};

/// A named field, in declaration order.
pub type Field = (String, FieldDefinition);

/// Fields whose `when` holds and whose dependencies all have values.
pub fn active_fields<'a>(fields: &'a [Field], state: &FlowState) -> Vec<&'a Field> {
    fields
        .iter()
        .filter(|(_, def)| def.when.as_ref().map_or(true, |when| when(state)))
        .filter(|(_, def)| {
            def.depends_on
                .iter()
                .all(|dep| !is_empty_value(state.get(dep)))
        })
        .collect()
}

/// Normalize a submitted value for its field's kind.
///
/// Values that cannot be converted are kept as submitted so validation can
/// report them.
pub fn coerce(value: Value, def: &FieldDefinition) -> Value {
    match (&def.field_type, value) {
        (_, Value::Null) => Value::Null,
        (FieldType::Widget { .. }, value) => value,
        (FieldType::Number { .. }, Value::String(s)) => match parse_number(&s) {
            Some(n) => Value::Number(n),
            None => Value::String(s),
        },
        (FieldType::Number { .. }, value) => value,
        (FieldType::Boolean, Value::String(s)) => match s.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(s),
        },
        (FieldType::Boolean, value) => value,
        (_, Value::String(s)) => Value::String(s),
        (_, other) => Value::String(as_text(&other)),
    }
}

/// Check a present value. `None` means valid; empty values are never checked.
pub fn validate(value: &Value, def: &FieldDefinition) -> Option<String> {
    if is_empty_value(Some(value)) {
        return None;
    }

    match &def.field_type {
        FieldType::Text { validator } => {
            let Value::String(text) = value else {
                return Some(format!("{} must be text", def.label));
            };
            validator.as_ref().and_then(|check| check(text).err())
        }
        FieldType::Select { options } => {
            let submitted = as_text(value);
            if options.iter().any(|o| o.value() == submitted) {
                None
            } else {
                let allowed: Vec<&str> = options.iter().map(|o| o.value()).collect();
                Some(format!("{} must be one of: {}", def.label, allowed.join(", ")))
            }
        }
        FieldType::Number { min, max } => {
            let Some(n) = as_number(value) else {
                return Some(format!("{} must be a number", def.label));
            };
            if let Some(min) = min.filter(|min| n < *min) {
                return Some(format!("{} must be at least {}", def.label, min));
            }
            if let Some(max) = max.filter(|max| n > *max) {
                return Some(format!("{} must be at most {}", def.label, max));
            }
            None
        }
        FieldType::Boolean => match value {
            Value::Bool(_) => None,
            Value::String(s) if s == "true" || s == "false" => None,
            _ => Some(format!("{} must be true or false", def.label)),
        },
        FieldType::Widget { .. } => None,
    }
}

/// Result of merging one submission onto the prior state.
#[derive(Debug)]
pub struct Submission<'a> {
    /// Merged state with invalid values removed.
    pub state: FlowState,
    pub active: Vec<&'a Field>,
    /// Required, non-widget, active fields still without a value, in declaration order.
    pub missing: Vec<String>,
    pub errors: BTreeMap<String, String>,
}

impl<'a> Submission<'a> {
    /// Coerce and merge `data`, then validate and look for gaps.
    ///
    /// Keys in `data` that name no declared field are ignored.
    pub fn process(fields: &'a [Field], current: FlowState, data: FlowState) -> Self {
        let mut state = current;
        for (key, value) in data {
            if let Some((_, def)) = fields.iter().find(|(name, _)| *name == key) {
                state.insert(key, coerce(value, def));
            }
        }

        let active = active_fields(fields, &state);

        let mut errors = BTreeMap::new();
        for (name, def) in &active {
            let message = state.get(name).and_then(|value| validate(value, def));
            if let Some(message) = message {
                state.remove(name);
                errors.insert(name.clone(), message);
            }
        }

        let missing = active
            .iter()
            .filter(|(_, def)| def.required && !def.is_widget())
            .filter(|(name, _)| is_empty_value(state.get(name)))
            .map(|(name, _)| name.clone())
            .collect();

        Self {
            state,
            active,
            missing,
            errors,
        }
    }

    /// Nothing missing and nothing invalid.
    pub fn is_settled(&self) -> bool {
        self.missing.is_empty() && self.errors.is_empty()
    }

    /// First active, required widget field that has no value yet.
    pub fn pending_widget(&self) -> Option<&'a Field> {
        self.active.iter().copied().find(|(name, def)| {
            def.is_widget()
                && def.required
                && matches!(self.state.get(name), None | Some(Value::Null))
        })
    }

    /// Active non-empty values.
    pub fn gathered(&self) -> FlowState {
        self.active
            .iter()
            .filter_map(|(name, _)| {
                self.state
                    .get(name)
                    .filter(|v| !is_empty_value(Some(v)))
                    .map(|v| (name.clone(), v.clone()))
            })
            .collect()
    }

    /// The `gathering` result for this submission.
    pub fn into_gathering(self) -> FlowResult {
        let fields = self
            .active
            .iter()
            .map(|(name, def)| (name.clone(), def.schema()))
            .collect();
        let gathered = self.gathered();
        FlowResult::Gathering {
            fields,
            gathered,
            missing: self.missing,
            errors: self.errors,
            state: self.state,
        }
    }
}

/// Parse a submitted numeric string. Integral values stay integers.
fn parse_number(s: &str) -> Option<Number> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Number::from(i));
    }
    trimmed.parse::<f64>().ok().and_then(Number::from_f64)
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s).and_then(|n| n.as_f64()),
        _ => None,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
