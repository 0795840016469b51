//! # grace - graceful lifecycle orchestration
//!
//! A small runtime that coordinates the startup and shutdown of many
//! independent subsystems (storage clients, caches, network servers,
//! background workers) that have ordering dependencies on each other.
//!
//! Components are grouped into [`Layer`]s. Layers start in declared order,
//! one at a time, while the tasks within a layer start concurrently. On an
//! OS signal (or an internal failure), layers stop in the *reverse* of
//! their start order, again concurrently within a layer.
//!
//! ## Example
//!
//! ```rust,ignore
//! use grace::{Config, Layer};
//! use tokio_util::sync::CancellationToken;
//!
//! let cfg = Config::new()
//!     .with_default_values()
//!     .register(vec![kv_storage.clone(), relational_storage.clone()])
//!     .register(vec![cache]) // depends on relational_storage
//!     .register(vec![service])
//!     .register(vec![http_server, grpc_server]); // independent, stop concurrently
//!
//! cfg.run(CancellationToken::new()).await?;
//! ```

mod config;
mod engine;
mod error;
mod layer;
mod signal;
mod task;


pub use config::Config;
pub use error::{Action, BackgroundTaskError, BoxError, LayerError, RunError, TaskError};
pub use layer::{Layer, LayerOption};
pub use signal::{Signal, SignalSet};
pub use task::{IntoTask, Runner, Task};
