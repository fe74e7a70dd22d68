use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use relayflow_core::error::{RelayflowError, Result};
use relayflow_core::types::FlowState;

/// Entry marker. Exactly one edge must leave it.
pub const START: &str = "__start__";
/// Termination marker. Reaching it completes the flow.
pub const END: &str = "__end__";

/// Picks the next step from the current state.
pub type Selector = Arc<dyn Fn(&FlowState) -> String + Send + Sync>;

/// The single outgoing edge of a step.
#[derive(Clone)]
pub enum Edge {
    /// Always go to `to`.
    Direct { to: String },
    /// Ask the selector, after the step's update has been merged.
    Conditional { selector: Selector },
}

impl Edge {
    /// Create an unconditional edge.
    pub fn direct(to: impl Into<String>) -> Self {
        Self::Direct { to: to.into() }
    }

    /// Create a branching edge.
    pub fn conditional<F, S>(selector: F) -> Self
    where
        F: Fn(&FlowState) -> S + Send + Sync + 'static,
        S: Into<String>,
    {
        Self::Conditional {
            selector: Arc::new(move |state| selector(state).into()),
        }
    }

    /// Target known without running anything.
    pub fn static_target(&self) -> Option<&str> {
        match self {
            Self::Direct { to } => Some(to),
            Self::Conditional { .. } => None,
        }
    }

    /// Resolve the next step name. A panicking selector is reported against `from`.
    pub fn resolve(&self, from: &str, state: &FlowState) -> Result<String> {
        match self {
            Self::Direct { to } => Ok(to.clone()),
            Self::Conditional { selector } => catch_unwind(AssertUnwindSafe(|| selector(state)))
                .map_err(|payload| RelayflowError::from_panic(from, payload)),
        }
    }
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct { to } => f.debug_struct("Direct").field("to", to).finish(),
            Self::Conditional { .. } => f.write_str("Conditional"),
        }
    }
}
