//! Error taxonomy for the orchestrator.
//!
//! Errors travel task -> layer -> engine, each level wrapping the first
//! failure it sees. `source()` lets a caller walk the whole chain back to
//! the runner's own error.

/// Boxed, thread-safe error used as the common "inner" type across the
/// taxonomy, since the wrapped causes (`TaskError`, `BackgroundTaskError`,
/// arbitrary runner errors) don't share a single concrete type. Runners
/// themselves still return `anyhow::Error` (see [`crate::Runner`]); it's
/// converted to this boxed form at the point a `Task` wraps a failure,
/// using anyhow's own `From<anyhow::Error> for Box<dyn Error + Send + Sync>`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which half of the task contract failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Init,
    Run,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Init => f.write_str("init"),
            Action::Run => f.write_str("run"),
        }
    }
}

/// A single task's runner returned an error from `init` or `run`.
#[derive(Debug, thiserror::Error)]
#[error("{action} task {}: {inner}", name.as_deref().unwrap_or("<unnamed>"))]
pub struct TaskError {
    pub name: Option<String>,
    pub action: Action,
    #[source]
    pub inner: BoxError,
}

/// A background task failed; kept distinct from [`TaskError`] so the
/// `fallible_background_tasks` flag can filter on the type.
#[derive(Debug, thiserror::Error)]
#[error("background task: {inner}")]
pub struct BackgroundTaskError {
    #[source]
    pub inner: BoxError,
}

/// A layer aggregated a failure from one of its tasks (primary or, when
/// intolerant, background). Only the first error per layer survives; later
/// ones are logged and dropped by the engine before this is constructed.
#[derive(Debug, thiserror::Error)]
#[error("layer {}: {inner}", name.as_deref().unwrap_or("<unnamed>"))]
pub struct LayerError {
    pub name: Option<String>,
    #[source]
    pub inner: BoxError,
}

/// Outermost error returned by [`crate::Config::run`]. Callers that only
/// care whether the orchestrator itself failed can match on this single
/// kind; anyone who wants the detail can walk `.source()` down to the
/// `LayerError` and past it.
#[derive(Debug, thiserror::Error)]
#[error("run layers: {inner}")]
pub struct RunError {
    #[source]
    pub inner: BoxError,
}

impl RunError {
    pub(crate) fn from_layer(err: LayerError) -> Self {
        Self {
            inner: Box::new(err),
        }
    }

    pub(crate) fn cancelled() -> Self {
        Self {
            inner: Box::new(CancelledError),
        }
    }
}

/// Returned when the caller's token was already cancelled before
/// initialization started.
#[derive(Debug, thiserror::Error)]
#[error("context cancelled before initialization")]
pub struct CancelledError;
