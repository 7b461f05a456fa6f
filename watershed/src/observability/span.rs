//! Scoped trace contexts.
//!
//! A [`TraceScope`] logs `<name> Start` when acquired and exactly one of
//! `<name> Complete` or `<name> Failed` when it ends. Dropping a scope that
//! was never completed counts as a failure, so early returns and panics are
//! logged too.

use crate::errors::{Result, WatershedError};
use std::future::Future;
use std::time::Instant;
use tracing::{error, info, info_span, Instrument, Span};

/// A named, timed region of work.
#[derive(Debug)]
pub struct TraceScope {
    name: String,
    span: Span,
    started: Instant,
    closed: bool,
}

impl TraceScope {
    /// Opens a scope and logs its start.
    #[must_use]
    pub fn enter(name: impl Into<String>) -> Self {
        Self::open(name.into(), None)
    }

    /// Opens a scope for one work unit.
    #[must_use]
    pub fn for_unit(name: impl Into<String>, unit: &str) -> Self {
        Self::open(name.into(), Some(unit))
    }

    fn open(name: String, unit: Option<&str>) -> Self {
        let span = match unit {
            Some(unit) => info_span!("scope", name = %name, unit = %unit),
            None => info_span!("scope", name = %name),
        };
        span.in_scope(|| info!("{} Start", name));
        Self {
            name,
            span,
            started: Instant::now(),
            closed: false,
        }
    }

    /// The span to instrument async work with.
    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Milliseconds since the scope opened.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    /// Closes the scope successfully and returns its duration.
    pub fn complete(mut self) -> f64 {
        let duration_ms = self.elapsed_ms();
        self.closed = true;
        self.span
            .in_scope(|| info!(duration_ms, "{} Complete", self.name));
        duration_ms
    }

    /// Closes the scope with an error.
    pub fn fail(mut self, err: &WatershedError) {
        self.closed = true;
        self.span.in_scope(|| {
            error!(
                error = %err,
                category = err.category(),
                duration_ms = self.elapsed_ms(),
                "{} Failed", self.name
            );
        });
    }
}

impl Drop for TraceScope {
    fn drop(&mut self) {
        if !self.closed {
            self.span
                .in_scope(|| error!(duration_ms = self.elapsed_ms(), "{} Failed", self.name));
        }
    }
}

/// Runs `fut` inside a scope named `name`.
pub async fn scoped<T, F>(name: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let scope = TraceScope::enter(name);
    match fut.instrument(scope.span().clone()).await {
        Ok(value) => {
            scope.complete();
            Ok(value)
        }
        Err(err) => {
            scope.fail(&err);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::LogBuffer;

    #[test]
    fn test_complete_logs_start_and_complete() {
        let buffer = LogBuffer::new();
        tracing::subscriber::with_default(buffer.subscriber(), || {
            let scope = TraceScope::for_unit("Fill", "dtm_split_1");
            assert!(scope.complete() >= 0.0);
        });
        let logs = buffer.contents();
        assert!(logs.contains("Fill Start"));
        assert!(logs.contains("Fill Complete"));
        assert!(logs.contains("dtm_split_1"));
        assert!(!logs.contains("Fill Failed"));
    }

    #[test]
    fn test_drop_without_complete_logs_failure() {
        let buffer = LogBuffer::new();
        tracing::subscriber::with_default(buffer.subscriber(), || {
            let _scope = TraceScope::enter("Direction");
        });
        let logs = buffer.contents();
        assert!(logs.contains("Direction Failed"));
        assert!(!logs.contains("Direction Complete"));
    }

    #[tokio::test]
    async fn test_scoped_propagates_error() {
        let err = scoped("Order", async { Err::<(), _>(WatershedError::unexpected("boom")) })
            .await
            .unwrap_err();
        assert_eq!(err.category(), "UnexpectedError");
        assert_eq!(scoped("Order", async { Ok(3) }).await.unwrap(), 3);
    }
}
