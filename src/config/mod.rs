//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → consumed once at app-build time
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AltairConfig, AppConfig, CodegenConfig, CorsConfig, GraphQLConfig, GraphiqlConfig, IdeConfig, ListenerConfig,
    LogFormat, ObservabilityConfig, SecurityConfig, SubscriptionMode, SubscriptionsConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
