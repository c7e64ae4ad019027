//! Configuration for hotload
//!
//! Resolution order:
//! 1. Environment variables (`HOTLOAD_*`)
//! 2. Project config (`hotload.toml` in the project root)
//! 3. Built-in defaults

mod loader;
mod types;

pub use loader::{ConfigWarning, CONFIG_FILE_NAME};
pub use types::{Config, RuntimeMode, DECLARATION_PATTERN};
