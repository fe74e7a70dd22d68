use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, info, warn};

use relayflow_core::error::{RelayflowError, Result};
use relayflow_core::result::FlowResult;
use relayflow_core::signal::StepOutput;
use relayflow_core::types::{merge_state, FlowState, RequestMeta};

use super::edge::{Edge, END, START};
use super::node::StepHandler;

/// A validated, immutable step graph.
///
/// Produced by [`StateGraph::compile`](crate::StateGraph::compile). Holds no
/// per-call data, so one instance serves any number of concurrent calls.
pub struct CompiledGraph {
    flow_id: String,
    steps: HashMap<String, Arc<dyn StepHandler>>,
    edges: HashMap<String, Edge>,
    max_iterations: usize,
}

impl CompiledGraph {
    pub(crate) fn new(
        flow_id: String,
        steps: HashMap<String, Arc<dyn StepHandler>>,
        edges: HashMap<String, Edge>,
        max_iterations: usize,
    ) -> Self {
        Self {
            flow_id,
            steps,
            edges,
            max_iterations,
        }
    }

    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Whether `name` is an ordinary step of this graph.
    pub fn has_step(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    /// Step names, sorted.
    pub fn step_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.steps.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Resolve the edge leaving `START` against the initial state.
    pub fn entry_step(&self, state: &FlowState) -> Result<String> {
        self.next_step(START, state)
    }

    /// Resolve the edge leaving `from` against `state`.
    pub fn next_step(&self, from: &str, state: &FlowState) -> Result<String> {
        let edge = self
            .edges
            .get(from)
            .ok_or_else(|| RelayflowError::MissingOutgoingEdge(from.to_string()))?;
        edge.resolve(from, state)
    }

    /// Run one handler, turning errors and panics into errors attributed to `step`.
    pub async fn run_step(
        &self,
        step: &str,
        state: &FlowState,
        meta: &RequestMeta,
    ) -> Result<StepOutput> {
        let handler = self
            .steps
            .get(step)
            .ok_or_else(|| RelayflowError::UnknownStep(step.to_string()))?;

        let fut = catch_unwind(AssertUnwindSafe(|| handler.run(state.clone(), meta.clone())))
            .map_err(|payload| RelayflowError::from_panic(step, payload))?;

        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(attribute(step, e)),
            Err(payload) => Err(RelayflowError::from_panic(step, payload)),
        }
    }

    /// Walk the graph from `start` until a pause, `END`, an error, or the iteration cap.
    ///
    /// Pauses return the state as it was before the pausing step ran. Errors
    /// carry the state as it was before the failing call.
    pub async fn execute_from(
        &self,
        start: &str,
        initial_state: FlowState,
        meta: &RequestMeta,
    ) -> FlowResult {
        let mut current = start.to_string();
        let mut state = initial_state;

        for iteration in 0..self.max_iterations {
            if current == END {
                info!(flow_id = %self.flow_id, iterations = iteration, "Flow complete");
                return FlowResult::Complete {
                    result: None,
                    state,
                };
            }

            if !self.has_step(&current) {
                warn!(flow_id = %self.flow_id, step = %current, "Unknown step");
                return FlowResult::from_error(&RelayflowError::UnknownStep(current), Some(state));
            }

            debug!(flow_id = %self.flow_id, step = %current, iteration, "Running step");

            let output = match self.run_step(&current, &state, meta).await {
                Ok(output) => output,
                Err(e) => {
                    warn!(flow_id = %self.flow_id, step = %current, error = %e, "Step failed");
                    return FlowResult::from_error(&e, Some(state));
                }
            };

            match output {
                StepOutput::Interrupt(sig) => {
                    debug!(flow_id = %self.flow_id, step = %current, field = %sig.field, "Interrupt");
                    return FlowResult::Interrupt {
                        step: current,
                        question: sig.question,
                        field: sig.field,
                        suggestions: sig.suggestions,
                        context: sig.context,
                        state,
                    };
                }
                StepOutput::Widget(sig) => {
                    debug!(flow_id = %self.flow_id, step = %current, widget = %sig.resource.id, "Widget pause");
                    return FlowResult::widget_at_step(
                        current,
                        sig.resource,
                        sig.data,
                        sig.description,
                        state,
                    );
                }
                StepOutput::Update(partial) => {
                    debug!(flow_id = %self.flow_id, step = %current, keys = partial.len(), "Merging update");
                    merge_state(&mut state, partial);
                }
            }

            current = match self.next_step(&current, &state) {
                Ok(next) => next,
                Err(e) => {
                    warn!(flow_id = %self.flow_id, step = %current, error = %e, "Edge resolution failed");
                    return FlowResult::from_error(&e, Some(state));
                }
            };
        }

        warn!(
            flow_id = %self.flow_id,
            max_iterations = self.max_iterations,
            "Flow exceeded maximum iterations"
        );
        FlowResult::from_error(
            &RelayflowError::MaxIterationsExceeded(self.max_iterations),
            Some(state),
        )
    }
}

/// Pin a handler's own error to the step that produced it.
fn attribute(step: &str, err: RelayflowError) -> RelayflowError {
    match err {
        RelayflowError::Handler { message, .. } => RelayflowError::handler(step, message),
        RelayflowError::Panicked { message, .. } => RelayflowError::Panicked {
            step: step.to_string(),
            message,
        },
        other => RelayflowError::handler(step, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StateGraph;
    use relayflow_core::signal::{interrupt, show_widget, update};
    use relayflow_core::types::{FlowConfig, UiResource};
    use relayflow_test_utils::state_from;
    use serde_json::json;

    fn config() -> FlowConfig {
        FlowConfig::new("test_flow", "Test", "A test flow")
    }

    #[tokio::test]
    async fn test_runs_to_end_merging_updates() {
        let flow = StateGraph::new(config())
            .add_node("a", |_s, _m| async { update(json!({"a": 1, "shared": "a"})) })
            .add_node("b", |_s, _m| async { update(json!({"b": 2, "shared": "b"})) })
            .add_edge(START, "a")
            .add_edge("a", "b")
            .add_edge("b", END)
            .build()
            .unwrap();

        let graph = flow.graph();
        let result = graph
            .execute_from("a", state_from(json!({"seed": true})), &RequestMeta::new())
            .await;
        assert_eq!(
            result,
            FlowResult::Complete {
                result: None,
                state: state_from(json!({"seed": true, "a": 1, "b": 2, "shared": "b"})),
            }
        );
    }

    #[tokio::test]
    async fn test_interrupt_returns_unmodified_state() {
        let flow = StateGraph::new(config())
            .add_node("prep", |_s, _m| async { update(json!({"prepared": true})) })
            .add_node("ask", |_s, _m| async {
                Ok(StepOutput::Interrupt(
                    interrupt("Which plan?", "plan").with_suggestions(["free", "pro"]),
                ))
            })
            .add_edge(START, "prep")
            .add_edge("prep", "ask")
            .add_edge("ask", END)
            .build()
            .unwrap();

        let result = flow
            .graph()
            .execute_from("prep", FlowState::new(), &RequestMeta::new())
            .await;
        match result {
            FlowResult::Interrupt {
                step,
                field,
                suggestions,
                state,
                ..
            } => {
                assert_eq!(step, "ask");
                assert_eq!(field, "plan");
                assert_eq!(suggestions, Some(vec!["free".into(), "pro".into()]));
                assert_eq!(state, state_from(json!({"prepared": true})));
            }
            other => panic!("expected interrupt, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_widget_pause() {
        let flow = StateGraph::new(config())
            .add_node("show", |_s, _m| async {
                Ok(StepOutput::Widget(
                    show_widget(UiResource::new("plans", "Plans"), json!({"plans": ["a"]}))
                        .with_description("Pick one"),
                ))
            })
            .add_edge(START, "show")
            .add_edge("show", END)
            .build()
            .unwrap();

        let result = flow
            .graph()
            .execute_from("show", FlowState::new(), &RequestMeta::new())
            .await;
        let doc = result.to_json();
        assert_eq!(doc["status"], json!("widget"));
        assert_eq!(doc["step"], json!("show"));
        assert_eq!(doc["widgetId"], json!("plans"));
        assert_eq!(doc["description"], json!("Pick one"));
    }

    #[tokio::test]
    async fn test_cycle_hits_iteration_cap() {
        let flow = StateGraph::new(config())
            .add_node("ping", |_s, _m| async { Ok(StepOutput::empty()) })
            .add_node("pong", |_s, _m| async { Ok(StepOutput::empty()) })
            .add_edge(START, "ping")
            .add_edge("ping", "pong")
            .add_edge("pong", "ping")
            .build()
            .unwrap();

        let result = flow
            .graph()
            .execute_from("ping", FlowState::new(), &RequestMeta::new())
            .await;
        match result {
            FlowResult::Error { error, .. } => {
                assert!(error.contains("exceeded maximum iterations"), "{}", error)
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handler_error_keeps_prior_state() {
        let flow = StateGraph::new(config())
            .add_node("ok", |_s, _m| async { update(json!({"ok": true})) })
            .add_node("fail", |_s, _m| async {
                Err(RelayflowError::handler("ignored", "payment service down"))
            })
            .add_edge(START, "ok")
            .add_edge("ok", "fail")
            .add_edge("fail", END)
            .build()
            .unwrap();

        let result = flow
            .graph()
            .execute_from("ok", FlowState::new(), &RequestMeta::new())
            .await;
        assert_eq!(
            result.to_json(),
            json!({
                "status": "error",
                "step": "fail",
                "error": "payment service down",
                "state": {"ok": true}
            })
        );
    }

    #[tokio::test]
    async fn test_handler_panic_is_contained() {
        let flow = StateGraph::new(config())
            .add_node("boom", |_s, _m| async { panic!("handler blew up") })
            .add_edge(START, "boom")
            .add_edge("boom", END)
            .build()
            .unwrap();

        let result = flow
            .graph()
            .execute_from("boom", FlowState::new(), &RequestMeta::new())
            .await;
        match result {
            FlowResult::Error { step, error, .. } => {
                assert_eq!(step.as_deref(), Some("boom"));
                assert!(error.contains("handler blew up"));
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_selector_naming_unknown_step() {
        let flow = StateGraph::new(config())
            .add_node("route", |_s, _m| async { Ok(StepOutput::empty()) })
            .add_edge(START, "route")
            .add_conditional_edge("route", |_: &FlowState| "nowhere")
            .build()
            .unwrap();

        let result = flow
            .graph()
            .execute_from("route", FlowState::new(), &RequestMeta::new())
            .await;
        assert_eq!(
            result.to_json(),
            json!({"status": "error", "step": "nowhere", "error": "Unknown step: \"nowhere\"", "state": {}})
        );
    }

    #[tokio::test]
    async fn test_custom_iteration_cap() {
        let flow = StateGraph::new(config())
            .with_max_iterations(3)
            .add_node("a", |_s, _m| async { Ok(StepOutput::empty()) })
            .add_node("b", |_s, _m| async { Ok(StepOutput::empty()) })
            .add_node("c", |_s, _m| async { Ok(StepOutput::empty()) })
            .add_edge(START, "a")
            .add_edge("a", "b")
            .add_edge("b", "c")
            .add_edge("c", END)
            .build()
            .unwrap();

        // three steps plus the END check do not fit in three iterations
        let result = flow
            .graph()
            .execute_from("a", FlowState::new(), &RequestMeta::new())
            .await;
        assert!(result.is_error());
        assert_eq!(flow.graph().max_iterations(), 3);
    }
}
