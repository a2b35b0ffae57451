//! Configuration module.
//!
//! Engine settings come from a TOML config file; the rule set and the
//! agent-skill table are separate, externally maintained TOML files.

mod files;
mod loader;
mod types;

pub use files::*;
pub use loader::*;
pub use types::*;
