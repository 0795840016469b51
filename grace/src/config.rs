//! The builder: an immutable value type that accumulates layers and tuning
//! options, consumed exactly once by [`Config::run`].

use tokio_util::sync::CancellationToken;

use crate::engine;
use crate::error::RunError;
use crate::layer::Layer;
use crate::signal::SignalSet;
use crate::task::IntoTask;

/// Options that must distinguish "unset" from "explicitly set to the
/// default value" are modeled as `Option<T>`, never a sentinel -- otherwise
/// `with_fallible_background_tasks(false)` would be indistinguishable from
/// never having been called.
#[derive(Clone, Default)]
pub(crate) struct Options {
    pub(crate) signals: Option<SignalSet>,
    pub(crate) fallible_background_tasks: Option<bool>,
}

impl Options {
    fn with_defaults(mut self) -> Self {
        self.signals.get_or_insert_with(SignalSet::default_set);
        self.fallible_background_tasks.get_or_insert(false);
        self
    }
}

/// Accumulates layers and options via chained, consuming builder calls.
/// Every method takes `self` by value and returns a fresh `Config`; there is
/// no interior mutability, so a `Config` that's been cloned before a builder
/// call is left untouched by it.
#[derive(Clone, Default)]
pub struct Config {
    layers: Vec<Layer>,
    options: Options,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills any unset option with its default, preserving options already
    /// set. Safe to call more than once or at any point in the chain.
    pub fn with_default_values(mut self) -> Self {
        self.options = self.options.with_defaults();
        self
    }

    /// OS signals that trigger reverse-cascade shutdown.
    pub fn with_interrupt_signals(mut self, signals: SignalSet) -> Self {
        self.options.signals = Some(signals);
        self
    }

    /// If `true`, background-task errors are wrapped, logged, and swallowed
    /// instead of failing their layer.
    pub fn with_fallible_background_tasks(mut self, fallible: bool) -> Self {
        self.options.fallible_background_tasks = Some(fallible);
        self
    }

    /// Appends a new layer made of the given runners, run as parallel peers.
    /// Called with no runners, this is a no-op: it does not append an empty
    /// layer.
    pub fn register<R>(mut self, runners: impl IntoIterator<Item = R>) -> Self
    where
        R: IntoTask,
    {
        let layer = Layer::new(runners, Vec::new());
        if !layer.primary().is_empty() || !layer.background().is_empty() {
            self.layers.push(layer);
        }
        self
    }

    /// Appends a preconstructed layer (to carry a name / background tasks).
    pub fn register_layer(mut self, layer: Layer) -> Self {
        self.layers.push(layer);
        self
    }

    #[cfg(test)]
    pub(crate) fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Drives the three-phase protocol described in the crate docs: staged
    /// init, concurrent run, signal- or failure-driven reverse shutdown.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), RunError> {
        let config = self.with_default_values();
        engine::run(config.layers, config.options, cancel).await
    }
}
