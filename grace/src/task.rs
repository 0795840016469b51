//! [`Runner`] is the single capability the engine consumes. [`Task`] binds a
//! runner to an optional name and gives every failure uniform wrapping.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{Action, TaskError};

/// A long-running unit of work. `run` must block until `cancel` fires (or
/// a fatal internal error occurs) and return `Ok(())` on clean cancellation.
///
/// `init` is an optional capability: types that have nothing to do before
/// `run` simply don't override it. This is the Rust analogue of a Go
/// interface type-assertion (`if i, ok := x.(Initer); ok`) done at compile
/// time instead of at runtime.
#[async_trait]
pub trait Runner: Send + Sync + 'static {
    /// Blocking setup. Called at most once, strictly before `run`. Must
    /// honor `cancel`. Defaults to a no-op success.
    async fn init(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        let _ = cancel;
        Ok(())
    }

    /// The long-running body. Must return `Ok(())` when `cancel` fires.
    async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()>;
}

/// Converts bare runners into [`Task`]s, leaving already-wrapped tasks
/// untouched. Lets `Layer`/`Config` builder methods accept either.
pub trait IntoTask {
    fn into_task(self) -> Task;
}

impl IntoTask for Task {
    fn into_task(self) -> Task {
        self
    }
}

impl<T> IntoTask for Arc<T>
where
    T: Runner,
{
    fn into_task(self) -> Task {
        Task::new(self)
    }
}

/// A runner plus an optional name, cheap to clone since it only carries an
/// `Arc` and an `Option<String>`.
#[derive(Clone)]
pub struct Task {
    name: Option<String>,
    runner: Arc<dyn Runner>,
}

impl Task {
    pub fn new(runner: Arc<dyn Runner>) -> Self {
        Self { name: None, runner }
    }

    pub fn with_name(runner: Arc<dyn Runner>, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            runner,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) async fn init(&self, cancel: CancellationToken) -> Result<(), TaskError> {
        self.runner
            .init(cancel)
            .await
            .map_err(|inner| TaskError {
                name: self.name.clone(),
                action: Action::Init,
                inner: inner.into(),
            })
    }

    pub(crate) async fn run(&self, cancel: CancellationToken) -> Result<(), TaskError> {
        self.runner.run(cancel).await.map_err(|inner| TaskError {
            name: self.name.clone(),
            action: Action::Run,
            inner: inner.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRunner {
        init_calls: AtomicUsize,
        run_calls: AtomicUsize,
        fail_init: bool,
        fail_run: bool,
    }

    #[async_trait]
    impl Runner for CountingRunner {
        async fn init(&self, _cancel: CancellationToken) -> anyhow::Result<()> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_init {
                anyhow::bail!("init boom");
            }
            Ok(())
        }

        async fn run(&self, _cancel: CancellationToken) -> anyhow::Result<()> {
            self.run_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_run {
                anyhow::bail!("run boom");
            }
            Ok(())
        }
    }

    struct NoInitRunner;

    #[async_trait]
    impl Runner for NoInitRunner {
        async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
            cancel.cancelled().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn init_is_a_no_op_when_not_overridden() {
        let task = Task::with_name(Arc::new(NoInitRunner), "noop");
        assert!(task.init(CancellationToken::new()).await.is_ok());
    }

    #[tokio::test]
    async fn init_failure_is_wrapped_with_name_and_action() {
        let runner = Arc::new(CountingRunner {
            init_calls: AtomicUsize::new(0),
            run_calls: AtomicUsize::new(0),
            fail_init: true,
            fail_run: false,
        });
        let task = Task::with_name(runner, "storage");
        let err = task.init(CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.name.as_deref(), Some("storage"));
        assert_eq!(err.action, Action::Init);
        assert!(err.to_string().contains("init boom"));
    }

    #[tokio::test]
    async fn run_failure_is_wrapped() {
        let runner = Arc::new(CountingRunner {
            init_calls: AtomicUsize::new(0),
            run_calls: AtomicUsize::new(0),
            fail_init: false,
            fail_run: true,
        });
        let task = Task::new(runner);
        let err = task.run(CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.action, Action::Run);
        assert!(err.to_string().contains("run boom"));
    }

    #[tokio::test]
    async fn init_then_run_is_called_at_most_once_each() {
        let runner = Arc::new(CountingRunner {
            init_calls: AtomicUsize::new(0),
            run_calls: AtomicUsize::new(0),
            fail_init: false,
            fail_run: false,
        });
        let task = Task::new(runner.clone());
        task.init(CancellationToken::new()).await.unwrap();
        task.run(CancellationToken::new()).await.unwrap();
        assert_eq!(runner.init_calls.load(Ordering::SeqCst), 1);
        assert_eq!(runner.run_calls.load(Ordering::SeqCst), 1);
    }
}
