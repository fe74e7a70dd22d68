//! Step-graph execution engine.
//!
//! A flow is a graph of named steps connected by edges. Each step is a
//! handler that returns a partial state update, an interrupt (ask the
//! caller something), or a widget hand-off. Edges are direct or chosen by
//! a selector over the current state.
//!
//! Nothing is kept between calls: [`GraphFlow`] takes the state back from
//! the caller on every invocation and resumes from the named step.

pub mod adapter;
pub mod builder;
pub mod edge;
pub mod executor;
pub mod node;
mod protocol;

pub use adapter::{GraphFlow, StaticFlowRequest};
pub use builder::StateGraph;
pub use edge::{Edge, END, START};
pub use executor::CompiledGraph;
pub use node::StepHandler;
