use std::collections::HashMap;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use relayflow_core::error::{RelayflowError, Result};
use relayflow_core::flow::RegisteredFlow;
use relayflow_core::result::FlowResult;
use relayflow_core::signal::WidgetSignal;
use relayflow_core::traits::Tool;
use relayflow_core::types::{FlowConfig, FlowState, RequestMeta, ToolAnnotations, ToolResponse};
use relayflow_core::widget::FLOW_HANDOFF_KEY;

use crate::field::{FieldDefinition, FieldType};
use crate::protocol;
use crate::resolver::{Field, Submission};
use crate::COMPLETE_STEP;

/// What the completion handler produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// Finish with this result value.
    Done(Value),
    /// Hand off to a widget before finishing.
    Widget(WidgetSignal),
}

impl From<Value> for Completion {
    fn from(value: Value) -> Self {
        Self::Done(value)
    }
}

impl From<WidgetSignal> for Completion {
    fn from(value: WidgetSignal) -> Self {
        Self::Widget(value)
    }
}

/// Runs once every required field is gathered and valid.
pub trait CompletionHandler: Send + Sync + 'static {
    fn complete(&self, state: FlowState, meta: RequestMeta) -> BoxFuture<'static, Result<Completion>>;
}

impl<F, Fut> CompletionHandler for F
where
    F: Fn(FlowState, RequestMeta) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Completion>> + Send + 'static,
{
    fn complete(&self, state: FlowState, meta: RequestMeta) -> BoxFuture<'static, Result<Completion>> {
        Box::pin((self)(state, meta))
    }
}

/// One call to a dynamic flow tool.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DynamicFlowRequest {
    /// `start`, `submit` or `widget_result`.
    pub action: String,
    #[serde(default)]
    pub data: Option<FlowState>,
    /// Widget field name, or `__complete`, for `widget_result`.
    #[serde(default)]
    pub step: Option<String>,
    #[serde(default)]
    pub state: Option<FlowState>,
    #[serde(default, rename = "widgetResult")]
    pub widget_result: Option<FlowState>,
}

impl DynamicFlowRequest {
    pub fn submit(data: FlowState, state: FlowState) -> Self {
        Self {
            action: "submit".into(),
            data: Some(data),
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
}

/// Collects field declarations; checked by [`build`](Self::build).
pub struct DynamicFlowBuilder {
    config: FlowConfig,
    fields: Vec<Field>,
    on_complete: Option<Arc<dyn CompletionHandler>>,
    rejected: Vec<RelayflowError>,
}

impl DynamicFlowBuilder {
    /// Declare a field. Declaration order is the order `missing` reports in.
    pub fn field(mut self, name: impl Into<String>, definition: FieldDefinition) -> Self {
        let name = name.into();
        if name == COMPLETE_STEP || name == FLOW_HANDOFF_KEY {
            self.rejected.push(RelayflowError::ReservedName(name));
        } else if self.fields.iter().any(|(existing, _)| *existing == name) {
            self.rejected.push(RelayflowError::DuplicateField(name));
        } else {
            self.fields.push((name, definition));
        }
        self
    }

    pub fn on_complete<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(FlowState, RequestMeta) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Completion>> + Send + 'static,
    {
        self.completion_handler(handler)
    }

    pub fn completion_handler(mut self, handler: impl CompletionHandler) -> Self {
        self.on_complete = Some(Arc::new(handler));
        self
    }

    pub fn compile(self) -> Result<RegisteredFlow> {
        Ok(RegisteredFlow::new(Arc::new(self.build()?)))
    }

    pub fn build(mut self) -> Result<DynamicFlow> {
        if !self.rejected.is_empty() {
            return Err(self.rejected.swap_remove(0));
        }
        let on_complete = self
            .on_complete
            .ok_or_else(|| RelayflowError::MissingCompletion(self.config.id.clone()))?;
        if let Some(cycle) = find_cycle(&self.fields) {
            return Err(RelayflowError::DependencyCycle(cycle));
        }

        debug!(flow_id = %self.config.id, fields = self.fields.len(), "Compiled dynamic flow");

        let description = format!("{}\n{}", self.config.description, protocol::form_protocol());
        Ok(DynamicFlow {
            config: self.config,
            description,
            fields: self.fields,
            on_complete,
        })
    }
}

/// First `dependsOn` cycle among declared fields, as a closed path.
fn find_cycle(fields: &[Field]) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        OnPath,
        Done,
    }

    fn visit(
        i: usize,
        fields: &[Field],
        index: &HashMap<&str, usize>,
        marks: &mut [Mark],
        path: &mut Vec<usize>,
    ) -> Option<Vec<String>> {
        match marks[i] {
            Mark::Done => return None,
            Mark::OnPath => {
                let pos = path.iter().position(|&p| p == i)?;
                let mut cycle: Vec<String> =
                    path[pos..].iter().map(|&p| fields[p].0.clone()).collect();
                cycle.push(fields[i].0.clone());
                return Some(cycle);
            }
            Mark::Unvisited => {}
        }

        marks[i] = Mark::OnPath;
        path.push(i);
        for dep in &fields[i].1.depends_on {
            if let Some(&j) = index.get(dep.as_str()) {
                if let Some(cycle) = visit(j, fields, index, marks, path) {
                    return Some(cycle);
                }
            }
        }
        path.pop();
        marks[i] = Mark::Done;
        None
    }

    let index: HashMap<&str, usize> = fields
        .iter()
        .enumerate()
        .map(|(i, (name, _))| (name.as_str(), i))
        .collect();
    let mut marks = vec![Mark::Unvisited; fields.len()];
    let mut path = Vec::new();

    (0..fields.len()).find_map(|i| visit(i, fields, &index, &mut marks, &mut path))
}

/// A declarative field set exposed as a single tool.
pub struct DynamicFlow {
    config: FlowConfig,
    description: String,
    fields: Vec<Field>,
    on_complete: Arc<dyn CompletionHandler>,
}

impl DynamicFlow {
    pub fn builder(config: FlowConfig) -> DynamicFlowBuilder {
        DynamicFlowBuilder {
            config,
            fields: Vec::new(),
            on_complete: None,
            rejected: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Parse raw tool input and handle it.
    pub async fn call(&self, input: Value, meta: &RequestMeta) -> FlowResult {
        match serde_json::from_value::<DynamicFlowRequest>(input) {
            Ok(request) => self.handle(request, meta).await,
            Err(e) => {
                warn!(flow_id = %self.config.id, error = %e, "Rejected malformed input");
                FlowResult::from_error(&RelayflowError::InvalidInput(e.to_string()), None)
            }
        }
    }

    pub async fn handle(&self, request: DynamicFlowRequest, meta: &RequestMeta) -> FlowResult {
        let state = request.state.unwrap_or_default();
        info!(flow_id = %self.config.id, action = %request.action, "Dynamic flow call");

        match request.action.as_str() {
            "start" | "submit" => {
                self.resolve(state, request.data.unwrap_or_default(), meta)
                    .await
            }
            "widget_result" => {
                let Some(step) = request.step else {
                    return FlowResult::from_error(
                        &RelayflowError::MissingParameter {
                            action: "widget_result".into(),
                            param: "step".into(),
                        },
                        Some(state),
                    );
                };
                let Some(result) = request.widget_result else {
                    return FlowResult::from_error(
                        &RelayflowError::MissingParameter {
                            action: "widget_result".into(),
                            param: "widgetResult".into(),
                        },
                        Some(state),
                    );
                };
                self.accept_widget_result(step, result, state, meta).await
            }
            other => FlowResult::from_error(
                &RelayflowError::UnknownAction(other.to_string()),
                Some(state),
            ),
        }
    }

    async fn accept_widget_result(
        &self,
        step: String,
        result: FlowState,
        state: FlowState,
        meta: &RequestMeta,
    ) -> FlowResult {
        if step == COMPLETE_STEP {
            // the completion widget only counts once the form itself is settled
            return match self.settle(state, FlowState::new()) {
                Ok(submission) => {
                    info!(flow_id = %self.config.id, "Completion widget returned");
                    FlowResult::Complete {
                        result: Some(Value::Object(result)),
                        state: submission.state,
                    }
                }
                Err(paused) => paused,
            };
        }

        let is_widget_field = self
            .fields
            .iter()
            .any(|(name, def)| *name == step && def.is_widget());
        if !is_widget_field {
            return FlowResult::from_error(&RelayflowError::UnknownStep(step), Some(state));
        }

        let data = if result.contains_key(&step) {
            result
        } else {
            let mut data = FlowState::new();
            data.insert(step, Value::Object(result));
            data
        };
        self.resolve(state, data, meta).await
    }

    async fn resolve(&self, state: FlowState, data: FlowState, meta: &RequestMeta) -> FlowResult {
        match self.settle(state, data) {
            Ok(submission) => self.complete(submission.state, meta).await,
            Err(result) => result,
        }
    }

    /// Process a submission. `Ok` means the form is ready to complete;
    /// anything else is the response to send back instead.
    fn settle(&self, state: FlowState, data: FlowState) -> std::result::Result<Submission<'_>, FlowResult> {
        // validators and `when` predicates are caller code
        let prior = state.clone();
        let submission = match catch_unwind(AssertUnwindSafe(|| Submission::process(&self.fields, state, data))) {
            Ok(submission) => submission,
            Err(payload) => return Err(self.failed(RelayflowError::from_panic(&self.config.id, payload), prior)),
        };
        debug!(
            flow_id = %self.config.id,
            active = submission.active.len(),
            missing = submission.missing.len(),
            errors = submission.errors.len(),
            "Resolved submission"
        );

        if !submission.is_settled() {
            return Err(submission.into_gathering());
        }

        if let Some((name, def)) = submission.pending_widget() {
            if let FieldType::Widget { resource, data } = &def.field_type {
                debug!(flow_id = %self.config.id, field = %name, widget = %resource.id, "Widget pause");
                return Err(FlowResult::widget_for_field(
                    name.clone(),
                    resource.clone(),
                    data.clone(),
                    def.description.clone(),
                    submission.state,
                ));
            }
        }

        Ok(submission)
    }

    async fn complete(&self, state: FlowState, meta: &RequestMeta) -> FlowResult {
        let handler = &self.on_complete;
        let fut = match catch_unwind(AssertUnwindSafe(|| handler.complete(state.clone(), meta.clone()))) {
            Ok(fut) => fut,
            Err(payload) => return self.failed(RelayflowError::from_panic(COMPLETE_STEP, payload), state),
        };

        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(Completion::Done(result))) => {
                info!(flow_id = %self.config.id, "Dynamic flow complete");
                FlowResult::Complete {
                    result: Some(result),
                    state,
                }
            }
            Ok(Ok(Completion::Widget(sig))) => {
                FlowResult::widget_for_field(COMPLETE_STEP, sig.resource, sig.data, sig.description, state)
            }
            Ok(Err(e)) => self.failed(e, state),
            Err(payload) => self.failed(RelayflowError::from_panic(COMPLETE_STEP, payload), state),
        }
    }

    fn failed(&self, err: RelayflowError, state: FlowState) -> FlowResult {
        warn!(flow_id = %self.config.id, error = %err, "Dynamic flow failed");
        FlowResult::Error {
            step: None,
            error: err.to_string(),
            state: Some(state),
        }
    }
}

impl Tool for DynamicFlow {
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
