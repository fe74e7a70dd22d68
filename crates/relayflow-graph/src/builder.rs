use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use relayflow_core::config::EngineConfig;
use relayflow_core::error::{RelayflowError, Result};
use relayflow_core::flow::RegisteredFlow;
use relayflow_core::signal::StepOutput;
use relayflow_core::types::{FlowConfig, FlowState, RequestMeta};

use super::adapter::GraphFlow;
use super::edge::{Edge, END, START};
use super::executor::CompiledGraph;
use super::node::StepHandler;

/// Fluent builder for a step graph.
///
/// Calls may come in any order; nothing is checked until [`compile`](Self::compile).
/// Registrations that are rejected outright (reserved or duplicate names, a
/// second edge from one step) are remembered and reported there.
///
/// ```rust,no_run
/// use relayflow_core::signal::{interrupt, StepOutput};
/// use relayflow_core::types::FlowConfig;
/// use relayflow_graph::{StateGraph, END, START};
///
/// let flow = StateGraph::new(FlowConfig::new(
///     "onboarding",
///     "User Onboarding",
///     "Guides users through onboarding.",
/// ))
/// .add_node("ask_name", |_state, _meta| async {
///     Ok(StepOutput::Interrupt(interrupt("What's your name?", "name")))
/// })
/// .add_edge(START, "ask_name")
/// .add_edge("ask_name", END)
/// .compile()
/// .expect("valid graph");
/// ```
pub struct StateGraph {
    config: FlowConfig,
    engine: EngineConfig,
    steps: HashMap<String, Arc<dyn StepHandler>>,
    edges: HashMap<String, Edge>,
    rejected: Vec<RelayflowError>,
}

impl StateGraph {
    pub fn new(config: FlowConfig) -> Self {
        Self {
            config,
            engine: EngineConfig::default(),
            steps: HashMap::new(),
            edges: HashMap::new(),
            rejected: Vec::new(),
        }
    }

    /// Use engine settings from configuration.
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Override the per-call iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.engine.max_iterations = max_iterations;
        self
    }

    /// Add a step backed by an async closure.
    pub fn add_node<F, Fut>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(FlowState, RequestMeta) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StepOutput>> + Send + 'static,
    {
        self.add_step(name, handler)
    }

    /// Add a step backed by any [`StepHandler`].
    pub fn add_step(mut self, name: impl Into<String>, handler: impl StepHandler) -> Self {
        let name = name.into();
        if name == START || name == END {
            self.rejected.push(RelayflowError::ReservedName(name));
        } else if self.steps.contains_key(&name) {
            self.rejected.push(RelayflowError::DuplicateStep(name));
        } else {
            self.steps.insert(name, Arc::new(handler));
        }
        self
    }

    /// Add a direct edge. Use `START` as `from` for the entry point and
    /// `END` as `to` for a terminal step.
    pub fn add_edge(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.insert_edge(from.into(), Edge::direct(to))
    }

    /// Add a branching edge. The selector sees the state after `from` ran
    /// and returns the next step's name.
    pub fn add_conditional_edge<F, S>(self, from: impl Into<String>, selector: F) -> Self
    where
        F: Fn(&FlowState) -> S + Send + Sync + 'static,
        S: Into<String>,
    {
        self.insert_edge(from.into(), Edge::conditional(selector))
    }

    fn insert_edge(mut self, from: String, edge: Edge) -> Self {
        if self.edges.contains_key(&from) {
            self.rejected.push(RelayflowError::DuplicateEdge(from));
        } else {
            self.edges.insert(from, edge);
        }
        self
    }

    /// Validate and freeze the graph into a host-registrable flow.
    pub fn compile(self) -> Result<RegisteredFlow> {
        Ok(RegisteredFlow::new(Arc::new(self.build()?)))
    }

    /// Validate and freeze the graph, keeping the typed adapter.
    pub fn build(mut self) -> Result<GraphFlow> {
        self.validate()?;

        debug!(
            flow_id = %self.config.id,
            steps = self.steps.len(),
            edges = self.edges.len(),
            "Compiled flow graph"
        );

        let graph = CompiledGraph::new(
            self.config.id.clone(),
            self.steps,
            self.edges,
            self.engine.max_iterations,
        );
        Ok(GraphFlow::new(self.config, graph))
    }

    fn validate(&mut self) -> Result<()> {
        // Checked first so a graph without an entry always fails the same way.
        if !self.edges.contains_key(START) {
            return Err(RelayflowError::MissingEntryEdge);
        }

        if !self.rejected.is_empty() {
            return Err(self.rejected.swap_remove(0));
        }

        let mut sources: Vec<&String> = self.edges.keys().collect();
        sources.sort();

        for from in sources {
            if from != START && !self.steps.contains_key(from) {
                return Err(RelayflowError::UnknownEdgeSource(from.clone()));
            }
            if let Some(to) = self.edges[from].static_target() {
                if to != END && !self.steps.contains_key(to) {
                    return Err(RelayflowError::UnknownEdgeTarget {
                        from: from.clone(),
                        to: to.to_string(),
                    });
                }
            }
        }

        let mut names: Vec<&String> = self.steps.keys().collect();
        names.sort();

        for name in names {
            if !self.edges.contains_key(name) {
                return Err(RelayflowError::MissingOutgoingEdge(name.clone()));
            }
        }

        if self.engine.max_iterations == 0 {
            return Err(RelayflowError::Config(
                "max_iterations must be at least 1".into(),
            ));
        }

        Ok(())
    }
}
