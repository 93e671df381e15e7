//! Shared configuration library for Vitrine.
//!
//! Centralizes config loading (`vitrine.toml`, `VITRINE_*` environment
//! variables and an optional `.env` file), defaults and guard rails so the
//! pipeline and the CLI agree on one source of truth for endpoints and
//! gateway rewrite rules.

pub mod constants;
pub mod error;
pub mod loader;
pub mod models;
pub mod sources;
pub mod validation;

pub use error::ConfigLoadError;
pub use loader::{ConfigLoad, ConfigLoader, ConfigLoaderOptions};
pub use models::{
    CacheStoreConfig, Config, ConfigMetadata, GatewayConfig, HttpConfig,
    ViewportConfig,
};
pub use sources::{EnvConfig, FileConfig};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
