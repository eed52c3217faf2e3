//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) or RawClusterConfig built in code
//!     → loader.rs (parse & deserialize)
//!     → optional init hook supplied by the application (dynamic overlay)
//!     → validation.rs (semantic checks)
//!     → loader::resolve (defaults applied)
//!     → ClusterConfig (validated, immutable)
//!     → shared via Arc with signer, pool and dispatcher
//! ```
//!
//! # Design Decisions
//! - Config is immutable once resolved; a change means a new cluster
//! - Every field but `url` has a default so minimal configs work
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, resolve, ConfigError};
pub use schema::{
    AuthStrategy, ClusterConfig, ConnectionOptions, Endpoint, FileConfig, ObservabilityConfig,
    RawClusterConfig, DEFAULT_POOL_SIZE, MAX_POOL_SIZE,
};
pub use validation::ValidationError;
