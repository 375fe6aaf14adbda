//! Configuration of the bridge: the optional TOML file and deployment-level overrides.
//!
//! Precedence, highest first: CLI flags and environment variables, the TOML
//! file, state persisted by the host.

mod loader;
mod types;

pub use loader::*;
pub use types::*;
