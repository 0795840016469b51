//! A [`Layer`] is the unit of ordering: layers start and stop strictly
//! sequentially relative to each other, while the tasks within one layer
//! run fully in parallel.

use crate::task::{IntoTask, Task};

/// An ordered cohort of tasks. Primary tasks define the layer's liveness;
/// background tasks ride along but don't gate it (see
/// [`crate::Config::with_fallible_background_tasks`]).
#[derive(Clone, Default)]
pub struct Layer {
    name: Option<String>,
    primary: Vec<Task>,
    background: Vec<Task>,
}

/// Builder-style option applied by [`Layer::new`], mirroring the host
/// application's `WithLifecycle`/`Lifecycle` option-closure idiom.
pub struct LayerOption(Box<dyn FnOnce(&mut Layer)>);

impl Layer {
    /// Build a layer from its primary tasks plus zero or more options.
    pub fn new<R>(runners: impl IntoIterator<Item = R>, options: impl IntoIterator<Item = LayerOption>) -> Self
    where
        R: IntoTask,
    {
        let mut layer = Layer {
            name: None,
            primary: runners.into_iter().map(IntoTask::into_task).collect(),
            background: Vec::new(),
        };
        for opt in options {
            (opt.0)(&mut layer);
        }
        layer
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn primary(&self) -> &[Task] {
        &self.primary
    }

    pub fn background(&self) -> &[Task] {
        &self.background
    }

    /// Attaches a name used in error messages and log fields.
    pub fn with_layer_name(name: impl Into<String>) -> LayerOption {
        let name = name.into();
        LayerOption(Box::new(move |layer| layer.name = Some(name)))
    }

    /// Attaches background tasks, disjoint from the primary sequence.
    pub fn with_background_tasks<R>(runners: impl IntoIterator<Item = R>) -> LayerOption
    where
        R: IntoTask,
    {
        let tasks: Vec<Task> = runners.into_iter().map(IntoTask::into_task).collect();
        LayerOption(Box::new(move |layer| layer.background = tasks))
    }
}
