#[cfg(feature = "cli")]
pub mod cli;
pub mod collision;
pub mod config;
pub mod controller;
pub mod edge;
pub mod error;
pub mod format;
pub mod history;
pub mod host;
pub mod layout;
pub mod logging;
pub mod model;
pub mod render;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::Config;
pub use controller::{DiagramController, LayoutJob, LayoutOutcome};
pub use error::{EngineError, Result};
pub use layout::LayoutDirection;
pub use model::{Diagram, Edge, Metadata, Node};
