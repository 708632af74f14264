//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RouterConfig (validated, immutable)
//!     → builds the node accessor, admin client and ReconcileRequest
//! ```
//!
//! # Design Decisions
//! - Config is read once per invocation; the scheduler re-runs the binary
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError, DEFAULT_CONFIG_PATH};
pub use schema::{GaleraConfig, ObservabilityConfig, ProxySqlConfig, RouterConfig, TimeoutConfig};
