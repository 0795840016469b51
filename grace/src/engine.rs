//! The engine: drives the three-phase protocol described in the crate
//! docs over a caller-supplied set of layers. Kept as a free function
//! (`run`) rather than a struct since it owns no state beyond the single
//! invocation -- all its coordination primitives are scoped to one call.

use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::Options;
use crate::error::{BackgroundTaskError, LayerError, RunError, TaskError};
use crate::layer::Layer;
use crate::signal;
use crate::task::Task;

pub(crate) async fn run(
    layers: Vec<Layer>,
    options: Options,
    cancel: CancellationToken,
) -> Result<(), RunError> {
    let signals = options.signals.unwrap_or_default();
    let fallible_background_tasks = options.fallible_background_tasks.unwrap_or(false);

    let (mut stop_rx, signal_handle) = signal::subscribe(signals);
    let result = run_with_stop_rx(layers, fallible_background_tasks, cancel, &mut stop_rx).await;
    signal_handle.abort();
    result
}

/// Same three-phase protocol as [`run`], but takes the "stop" channel as an
/// argument instead of subscribing to real OS signals. This is the seam
/// tests use to simulate a signal arriving mid-run without touching the
/// process's actual signal disposition.
pub(crate) async fn run_with_stop_rx(
    layers: Vec<Layer>,
    fallible_background_tasks: bool,
    cancel: CancellationToken,
    stop_rx: &mut tokio::sync::mpsc::Receiver<()>,
) -> Result<(), RunError> {
    run_init_phase(&layers, &cancel).await?;
    run_and_shutdown_phase(layers, fallible_background_tasks, stop_rx).await
}

/// Phase B: sequential layer init, parallel within a layer.
#[tracing::instrument(skip_all)]
pub(crate) async fn run_init_phase(
    layers: &[Layer],
    cancel: &CancellationToken,
) -> Result<(), RunError> {
    for layer in layers {
        if cancel.is_cancelled() {
            tracing::warn!(layer = layer.name(), "caller context cancelled before init");
            return Err(RunError::cancelled());
        }

        let layer_cancel = cancel.child_token();
        let mut set: JoinSet<Result<(), TaskError>> = JoinSet::new();
        for task in layer.primary().iter().chain(layer.background()) {
            let task = task.clone();
            let layer_cancel = layer_cancel.clone();
            set.spawn(async move { task.init(layer_cancel).await });
        }

        let mut first_err: Option<TaskError> = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    if first_err.is_none() {
                        tracing::warn!(layer = layer.name(), error = %err, "init task failed");
                        layer_cancel.cancel();
                        first_err = Some(err);
                    }
                }
                Err(join_err) => {
                    tracing::error!(layer = layer.name(), error = %join_err, "init task panicked");
                }
            }
        }

        if let Some(err) = first_err {
            return Err(RunError::from_layer(LayerError {
                name: layer.name().map(str::to_owned),
                inner: Box::new(err),
            }));
        }

        tracing::info!(layer = layer.name(), "layer initialized");
    }
    Ok(())
}

/// Phase C: concurrent run across all layers, with signal- or
/// failure-driven reverse-cascade shutdown. The caller's token plays no
/// further role from here on; a fresh, independent token governs the run.
#[tracing::instrument(skip_all)]
pub(crate) async fn run_and_shutdown_phase(
    layers: Vec<Layer>,
    fallible_background_tasks: bool,
    stop_rx: &mut tokio::sync::mpsc::Receiver<()>,
) -> Result<(), RunError> {
    let run_token = CancellationToken::new();
    let first_error: Arc<Mutex<Option<LayerError>>> = Arc::new(Mutex::new(None));

    let mut layer_tokens = Vec::with_capacity(layers.len());
    let mut stopped_rx = Vec::with_capacity(layers.len());
    let mut layer_set: JoinSet<()> = JoinSet::new();

    for layer in layers {
        let layer_token = run_token.child_token();
        layer_tokens.push(layer_token.clone());

        let (stopped_tx, rx) = oneshot::channel();
        stopped_rx.push(rx);

        let run_token = run_token.clone();
        let first_error = first_error.clone();
        layer_set.spawn(run_layer(
            layer,
            layer_token,
            run_token,
            fallible_background_tasks,
            first_error,
            stopped_tx,
        ));
    }

    let supervisor = supervise_shutdown(stop_rx, run_token.clone(), layer_tokens, stopped_rx);

    let ((), ()) = tokio::join!(supervisor, drain(layer_set));

    match first_error.lock().unwrap().take() {
        Some(err) => Err(RunError::from_layer(err)),
        None => Ok(()),
    }
}

async fn drain(mut set: JoinSet<()>) {
    while let Some(res) = set.join_next().await {
        if let Err(join_err) = res {
            tracing::error!(error = %join_err, "layer task panicked");
        }
    }
}

/// Runs one layer's primary and background tasks under `layer_token` until
/// they all finish, firing `stopped_tx` exactly once as soon as the layer
/// is "done" per the spec's liveness definition (all primary tasks
/// returned, or -- for a layer with none -- the layer token itself being
/// cancelled).
#[allow(clippy::too_many_arguments)]
async fn run_layer(
    layer: Layer,
    layer_token: CancellationToken,
    run_token: CancellationToken,
    fallible_background_tasks: bool,
    first_error: Arc<Mutex<Option<LayerError>>>,
    stopped_tx: oneshot::Sender<()>,
) {
    let name = layer.name().map(str::to_owned);

    let bg_handle = {
        let background: Vec<Task> = layer.background().to_vec();
        let layer_token = layer_token.clone();
        let run_token = run_token.clone();
        let first_error = first_error.clone();
        let name = name.clone();
        tokio::spawn(async move {
            run_background_tasks(
                background,
                layer_token,
                run_token,
                fallible_background_tasks,
                first_error,
                name,
            )
            .await
        })
    };

    if layer.primary().is_empty() {
        layer_token.cancelled().await;
        let _ = stopped_tx.send(());
    } else {
        let mut set: JoinSet<Result<(), TaskError>> = JoinSet::new();
        for task in layer.primary() {
            let task = task.clone();
            let cancel = layer_token.clone();
            set.spawn(async move { task.run(cancel).await });
        }

        let mut reported = false;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    record_first_error(&first_error, &name, err);
                    if !reported {
                        reported = true;
                        layer_token.cancel();
                        run_token.cancel();
                    }
                }
                Err(join_err) => {
                    tracing::error!(layer = name.as_deref(), error = %join_err, "run task panicked");
                }
            }
        }
        let _ = stopped_tx.send(());
        tracing::info!(layer = name.as_deref(), "layer stopped");
    }

    if let Err(join_err) = bg_handle.await {
        tracing::error!(layer = name.as_deref(), error = %join_err, "background supervisor panicked");
    }
}

async fn run_background_tasks(
    background: Vec<Task>,
    layer_token: CancellationToken,
    run_token: CancellationToken,
    fallible_background_tasks: bool,
    first_error: Arc<Mutex<Option<LayerError>>>,
    name: Option<String>,
) {
    if background.is_empty() {
        return;
    }
    let mut set: JoinSet<Result<(), TaskError>> = JoinSet::new();
    for task in background {
        let cancel = layer_token.clone();
        set.spawn(async move { task.run(cancel).await });
    }

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                if fallible_background_tasks {
                    tracing::warn!(layer = name.as_deref(), error = %err, "background task failed, tolerated");
                } else {
                    let wrapped = BackgroundTaskError {
                        inner: Box::new(err),
                    };
                    record_first_error(&first_error, &name, wrapped);
                    layer_token.cancel();
                    run_token.cancel();
                }
            }
            Err(join_err) => {
                tracing::error!(layer = name.as_deref(), error = %join_err, "background task panicked");
            }
        }
    }
}

fn record_first_error(
    first_error: &Mutex<Option<LayerError>>,
    name: &Option<String>,
    err: impl std::error::Error + Send + Sync + 'static,
) {
    let mut guard = first_error.lock().unwrap();
    if guard.is_none() {
        *guard = Some(LayerError {
            name: name.clone(),
            inner: Box::new(err),
        });
    } else {
        tracing::warn!(layer = name.as_deref(), error = %err, "additional layer error discarded; first error wins");
    }
}

/// Selects between a shutdown signal and `run_token` poisoning from an
/// internal failure, then drives the reverse-cascade: cancel the last
/// layer, wait for its completion signal, then the one before it, and so
/// on. If `run_token` is cancelled mid-cascade the remaining layers are
/// already being torn down via token inheritance, so the supervisor just
/// stops waiting instead of blocking on layers that may never stop cleanly.
async fn supervise_shutdown(
    stop_rx: &mut tokio::sync::mpsc::Receiver<()>,
    run_token: CancellationToken,
    layer_tokens: Vec<CancellationToken>,
    mut stopped_rx: Vec<oneshot::Receiver<()>>,
) {
    tokio::select! {
        _ = stop_rx.recv() => {
            tracing::info!("shutdown signal received, cascading layer shutdown in reverse order");
        }
        _ = run_token.cancelled() => {
            tracing::info!("run cancelled internally before any shutdown signal");
            return;
        }
    }

    for (token, stopped) in layer_tokens.into_iter().zip(stopped_rx.drain(..)).rev() {
        token.cancel();
        tokio::select! {
            _ = stopped => {}
            _ = run_token.cancelled() => {
                tracing::warn!("run poisoned mid-cascade; remaining layers torn down by token inheritance");
                return;
            }
        }
    }
}
