use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use relayflow_core::error::RelayflowError;
use relayflow_core::result::FlowResult;
use relayflow_core::signal::StepOutput;
use relayflow_core::traits::Tool;
use relayflow_core::widget::FLOW_HANDOFF_KEY;
use relayflow_core::types::{
    merge_state, FlowConfig, FlowState, RequestMeta, ToolAnnotations, ToolResponse,
};

use super::edge::{END, START};
use super::executor::CompiledGraph;
use super::protocol;

/// One call to a static flow tool.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticFlowRequest {
    /// `start`, `continue` or `widget_result`.
    pub action: String,
    #[serde(default)]
    pub step: Option<String>,
    /// Field named by the interrupt being answered.
    ///
    /// Taken as given, the same as `state`: a caller can bind the answer to
    /// any key it could also have written into the state directly. Blank or
    /// reserved names are ignored and the step is re-run instead.
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub state: Option<FlowState>,
    #[serde(default)]
    pub answer: Option<Value>,
    #[serde(default, rename = "widgetResult")]
    pub widget_result: Option<FlowState>,
}

impl StaticFlowRequest {
    pub fn start(state: FlowState) -> Self {
        Self {
            action: "start".into(),
            state: Some(state),
            ..Default::default()
        }
    }

    pub fn answer(step: impl Into<String>, answer: impl Into<Value>, state: FlowState) -> Self {
        Self {
            action: "continue".into(),
            step: Some(step.into()),
            answer: Some(answer.into()),
            state: Some(state),
            ..Default::default()
        }
    }

    pub fn widget_result(step: impl Into<String>, result: FlowState, state: FlowState) -> Self {
        Self {
            action: "widget_result".into(),
            step: Some(step.into()),
            widget_result: Some(result),
            state: Some(state),
            ..Default::default()
        }
    }

    /// Echo the interrupt's field so the step is not re-run.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

/// A compiled step graph exposed as a single tool.
pub struct GraphFlow {
    config: FlowConfig,
    description: String,
    graph: CompiledGraph,
}

impl GraphFlow {
    pub(crate) fn new(config: FlowConfig, graph: CompiledGraph) -> Self {
        let description = format!("{}\n{}", config.description, protocol::flow_protocol());
        Self {
            config,
            description,
            graph,
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }

    /// Parse raw tool input and handle it.
    pub async fn call(&self, input: Value, meta: &RequestMeta) -> FlowResult {
        match serde_json::from_value::<StaticFlowRequest>(input) {
            Ok(request) => self.handle(request, meta).await,
            Err(e) => {
                warn!(flow_id = %self.config.id, error = %e, "Rejected malformed input");
                FlowResult::from_error(&RelayflowError::InvalidInput(e.to_string()), None)
            }
        }
    }

    /// Handle one typed request.
    pub async fn handle(&self, request: StaticFlowRequest, meta: &RequestMeta) -> FlowResult {
        let state = request.state.clone().unwrap_or_default();
        info!(
            flow_id = %self.config.id,
            action = %request.action,
            step = request.step.as_deref().unwrap_or(""),
            "Flow call"
        );

        match request.action.as_str() {
            "start" => self.start(state, meta).await,
            "continue" => self.resume_after_answer(request, state, meta).await,
            "widget_result" => self.resume_after_widget(request, state, meta).await,
            other => FlowResult::from_error(
                &RelayflowError::UnknownAction(other.to_string()),
                Some(state),
            ),
        }
    }

    async fn start(&self, state: FlowState, meta: &RequestMeta) -> FlowResult {
        match self.graph.entry_step(&state) {
            Ok(first) => self.graph.execute_from(&first, state, meta).await,
            Err(e) => FlowResult::from_error(&e, Some(state)),
        }
    }

    async fn resume_after_answer(
        &self,
        request: StaticFlowRequest,
        mut state: FlowState,
        meta: &RequestMeta,
    ) -> FlowResult {
        let step = match self.require_step(&request, "continue", &state) {
            Ok(step) => step,
            Err(result) => return result,
        };
        let Some(answer) = request.answer else {
            return missing("continue", "answer", state);
        };

        let echoed = request.field.filter(|f| !f.trim().is_empty() && f.as_str() != FLOW_HANDOFF_KEY);
        let field = match echoed {
            Some(field) => Some(field),
            None => self.recover_field(&step, &state, meta).await,
        };

        match field {
            Some(field) => {
                debug!(flow_id = %self.config.id, step = %step, field = %field, "Applying answer");
                state.insert(field, answer);
            }
            None => warn!(
                flow_id = %self.config.id,
                step = %step,
                "Step did not interrupt on re-run, answer not applied"
            ),
        }

        self.advance(&step, state, meta).await
    }

    async fn resume_after_widget(
        &self,
        request: StaticFlowRequest,
        mut state: FlowState,
        meta: &RequestMeta,
    ) -> FlowResult {
        let step = match self.require_step(&request, "widget_result", &state) {
            Ok(step) => step,
            Err(result) => return result,
        };
        let Some(widget_result) = request.widget_result else {
            return missing("widget_result", "widgetResult", state);
        };

        merge_state(&mut state, widget_result);
        self.advance(&step, state, meta).await
    }

    /// Re-run a step to learn which field its interrupt binds.
    async fn recover_field(
        &self,
        step: &str,
        state: &FlowState,
        meta: &RequestMeta,
    ) -> Option<String> {
        match self.graph.run_step(step, state, meta).await {
            Ok(StepOutput::Interrupt(sig)) => Some(sig.field),
            Ok(_) => None,
            Err(e) => {
                warn!(flow_id = %self.config.id, step = %step, error = %e, "Re-run to recover field failed");
                None
            }
        }
    }

    async fn advance(&self, step: &str, state: FlowState, meta: &RequestMeta) -> FlowResult {
        match self.graph.next_step(step, &state) {
            Ok(next) => self.graph.execute_from(&next, state, meta).await,
            Err(e) => FlowResult::from_error(&e, Some(state)),
        }
    }

    fn require_step(
        &self,
        request: &StaticFlowRequest,
        action: &str,
        state: &FlowState,
    ) -> std::result::Result<String, FlowResult> {
        let Some(step) = request.step.clone() else {
            return Err(missing(action, "step", state.clone()));
        };
        if step == START || step == END || !self.graph.has_step(&step) {
            return Err(FlowResult::from_error(
                &RelayflowError::UnknownStep(step),
                Some(state.clone()),
            ));
        }
        Ok(step)
    }
}

fn missing(action: &str, param: &str, state: FlowState) -> FlowResult {
    FlowResult::from_error(
        &RelayflowError::MissingParameter {
            action: action.to_string(),
            param: param.to_string(),
        },
        Some(state),
    )
}

impl Tool for GraphFlow {
    fn name(&self) -> &str {
        &self.config.id
    }

    fn title(&self) -> &str {
        &self.config.title
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        protocol::input_schema()
    }

    fn annotations(&self) -> Option<&ToolAnnotations> {
        self.config.annotations.as_ref()
    }

    fn execute(&self, input: Value, meta: RequestMeta) -> BoxFuture<'_, ToolResponse> {
        Box::pin(async move {
            let result = self.call(input, &meta).await;
            result.into_response(&self.config.id, &meta)
        })
    }
}
