//! ferroscreen-common: Shared errors, configuration and external-process plumbing
//! used across all ferroscreen crates.

pub mod error;
pub mod screen_config;
pub mod sandbox;
pub mod graph;

// Re-export commonly used types
pub use error::{Result, ScreenError};
pub use screen_config::{ScreenConfig, TargetSpec, PocketMode, EngineCommand};
pub use sandbox::{ProcessSandbox, EngineOutput};
pub use graph::{GraphQuery, GraphRow, StaticGraph};
