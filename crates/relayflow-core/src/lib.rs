pub mod config;
pub mod error;
pub mod flow;
pub mod result;
pub mod signal;
pub mod traits;
pub mod types;
pub mod widget;

pub use config::AppConfig;
pub use error::{Result, RelayflowError};
pub use flow::RegisteredFlow;
pub use result::FlowResult;
pub use signal::{interrupt, show_widget, update, Interrupt, StepOutput, WidgetSignal};
pub use types::*;
