use std::future::Future;

use futures::future::BoxFuture;

use relayflow_core::error::Result;
use relayflow_core::signal::StepOutput;
use relayflow_core::types::{FlowState, RequestMeta};

/// A step in the graph.
///
/// Receives its own copy of the current state and the request metadata.
/// Side effects and async I/O are allowed. A handler that pauses with an
/// interrupt may be run a second time when the caller answers without
/// echoing the interrupt's `field`, so such handlers should be idempotent.
pub trait StepHandler: Send + Sync + 'static {
    fn run(&self, state: FlowState, meta: RequestMeta) -> BoxFuture<'static, Result<StepOutput>>;
}

impl<F, Fut> StepHandler for F
where
    F: Fn(FlowState, RequestMeta) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<StepOutput>> + Send + 'static,
{
    fn run(&self, state: FlowState, meta: RequestMeta) -> BoxFuture<'static, Result<StepOutput>> {
        Box::pin((self)(state, meta))
    }
}
