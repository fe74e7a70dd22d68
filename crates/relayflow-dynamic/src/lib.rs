//! Dynamic field gathering.
//!
//! Instead of a fixed step sequence, a dynamic flow declares the fields it
//! needs. Every call merges the submitted data onto the caller's state,
//! works out which fields are active, validates them and reports what is
//! still missing. Once everything required is in, the completion handler
//! runs.

pub mod adapter;
pub mod field;
mod protocol;
pub mod resolver;

pub use adapter::{Completion, CompletionHandler, DynamicFlow, DynamicFlowBuilder, DynamicFlowRequest};
pub use field::{FieldDefinition, FieldType};
pub use resolver::Submission;

/// Synthetic step name for a widget returned by the completion handler.
pub const COMPLETE_STEP: &str = "__complete";
