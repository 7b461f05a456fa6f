//! Logging setup and scoped trace contexts.

mod logging;
mod span;

pub use logging::{init_logging, LogBuffer, LogConfig, TIME_FORMAT};
pub use span::{scoped, TraceScope};
