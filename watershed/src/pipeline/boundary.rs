//! Outermost error boundary of a run.

use crate::errors::{Result, WatershedError};
use futures::FutureExt;
use std::error::Error as StdError;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::{error, info};

/// Formats an error and every source under it, outermost first.
#[must_use]
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Runs `fut`, logging any error or panic it ends with.
///
/// A panic becomes [`WatershedError::Unexpected`]. The completion line is
/// logged on every path.
pub async fn run_guarded<T, F>(fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let outcome = match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(WatershedError::unexpected(format!(
            "panic: {}",
            panic_message(payload.as_ref())
        ))),
    };
    if let Err(err) = &outcome {
        error!(category = err.category(), chain = %error_chain(err), "Run failed");
    }
    info!("Script Execution Complete");
    outcome
}
