//! Shared ambient stack for binaries built on top of `grace`: structured
//! logging setup and layered (YAML + env) configuration loading. Carried
//! over from the host application's own `runtime` crate so example binaries
//! configure themselves the same way a full server would.

pub mod config;
pub mod logging;
mod paths;

pub use config::{AppConfig, CliArgs, LoggingConfig, ServerConfig};
