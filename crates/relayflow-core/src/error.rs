use std::any::Any;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayflowError {
    // Structural errors (graph / field set definition)
    #[error("\"{0}\" is a reserved name and cannot be used as a step or field name")]
    ReservedName(String),

    #[error("Step \"{0}\" already exists")]
    DuplicateStep(String),

    #[error("Step \"{0}\" already has an outgoing edge. Use add_conditional_edge for branching.")]
    DuplicateEdge(String),

    #[error("Flow must have an entry point. Add an edge from START: .add_edge(START, \"first_step\")")]
    MissingEntryEdge,

    #[error("Edge from non-existent step: \"{0}\"")]
    UnknownEdgeSource(String),

    #[error("Edge from \"{from}\" references non-existent step: \"{to}\"")]
    UnknownEdgeTarget { from: String, to: String },

    #[error("Step \"{0}\" has no outgoing edge. Add one with add_edge or add_conditional_edge")]
    MissingOutgoingEdge(String),

    #[error("Field \"{0}\" already exists")]
    DuplicateField(String),

    #[error("Field dependency cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("Dynamic flow \"{0}\" has no completion handler")]
    MissingCompletion(String),

    // Execution errors (converted to `error` results at the adapter boundary)
    #[error("Unknown step: \"{0}\"")]
    UnknownStep(String),

    #[error("Flow exceeded maximum iterations ({0}), possible infinite loop")]
    MaxIterationsExceeded(usize),

    #[error("{message}")]
    Handler { step: String, message: String },

    #[error("Step \"{step}\" panicked: {message}")]
    Panicked { step: String, message: String },

    #[error("State update must be a JSON object, got {0}")]
    InvalidUpdate(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown action: \"{0}\"")]
    UnknownAction(String),

    #[error("Missing \"{param}\" for {action} action")]
    MissingParameter { action: String, param: String },

    // Host errors
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool timeout after {timeout_secs}s: {tool}")]
    ToolTimeout { tool: String, timeout_secs: u64 },

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RelayflowError {
    /// Build a handler failure for `step`.
    pub fn handler(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Convert a caught panic payload into an error attributed to `step`.
    pub fn from_panic(step: impl Into<String>, payload: Box<dyn Any + Send>) -> Self {
        Self::Panicked {
            step: step.into(),
            message: panic_message(payload.as_ref()),
        }
    }

    /// Whether this error describes a malformed flow definition.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::ReservedName(_)
                | Self::DuplicateStep(_)
                | Self::DuplicateEdge(_)
                | Self::MissingEntryEdge
                | Self::UnknownEdgeSource(_)
                | Self::UnknownEdgeTarget { .. }
                | Self::MissingOutgoingEdge(_)
                | Self::DuplicateField(_)
                | Self::DependencyCycle(_)
                | Self::MissingCompletion(_)
        )
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub type Result<T> = std::result::Result<T, RelayflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_classification() {
        assert!(RelayflowError::MissingEntryEdge.is_structural());
        assert!(RelayflowError::DependencyCycle(vec!["a".into(), "b".into()]).is_structural());
        assert!(!RelayflowError::UnknownStep("x".into()).is_structural());
        assert!(!RelayflowError::MaxIterationsExceeded(50).is_structural());
    }

    #[test]
    fn test_handler_error_displays_message_only() {
        let err = RelayflowError::handler("ask_name", "database unavailable");
        assert_eq!(err.to_string(), "database unavailable");
    }

    #[test]
    fn test_panic_message_variants() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(panic_message(payload.as_ref()), "owned boom");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_cycle_display() {
        let err = RelayflowError::DependencyCycle(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "Field dependency cycle: a -> b -> a");
    }
}
