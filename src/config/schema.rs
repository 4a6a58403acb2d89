//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the GraphQL bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// GraphQL HTTP endpoint settings.
    pub graphql: GraphQLConfig,

    /// Websocket subscription transport settings.
    pub subscriptions: SubscriptionsConfig,

    /// In-browser IDE surfaces.
    pub ide: IdeConfig,

    /// TypeScript codegen settings.
    pub codegen: CodegenConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Request hardening.
    pub security: SecurityConfig,
}

impl AppConfig {
    /// Path websocket upgrades are accepted on.
    pub fn subscription_path(&self) -> &str {
        self.subscriptions
            .path
            .as_deref()
            .unwrap_or(&self.graphql.path)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// GraphQL endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GraphQLConfig {
    /// Mount path for `GET|POST` GraphQL requests.
    pub path: String,
}

impl Default for GraphQLConfig {
    fn default() -> Self {
        Self {
            path: "/graphql".to_string(),
        }
    }
}

/// Which websocket sub-protocols are served.
///
/// In config files this is written as `false`, `true`, `"legacy"` or `"all"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(try_from = "SubscriptionFlag", into = "SubscriptionFlag")]
pub enum SubscriptionMode {
    /// No websocket handling is installed.
    #[default]
    Off,
    /// `graphql-transport-ws` only.
    Modern,
    /// `graphql-ws` (subscriptions-transport-ws) only.
    Legacy,
    /// Both protocols side by side, selected per upgrade.
    Both,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
enum SubscriptionFlag {
    Enabled(bool),
    Named(String),
}

impl TryFrom<SubscriptionFlag> for SubscriptionMode {
    type Error = String;

    fn try_from(flag: SubscriptionFlag) -> Result<Self, Self::Error> {
        match flag {
            SubscriptionFlag::Enabled(false) => Ok(Self::Off),
            SubscriptionFlag::Enabled(true) => Ok(Self::Modern),
            SubscriptionFlag::Named(name) => match name.as_str() {
                "legacy" => Ok(Self::Legacy),
                "all" => Ok(Self::Both),
                other => Err(format!(
                    "unknown subscription mode `{other}`, expected true, false, \"legacy\" or \"all\""
                )),
            },
        }
    }
}

impl From<SubscriptionMode> for SubscriptionFlag {
    fn from(mode: SubscriptionMode) -> Self {
        match mode {
            SubscriptionMode::Off => Self::Enabled(false),
            SubscriptionMode::Modern => Self::Enabled(true),
            SubscriptionMode::Legacy => Self::Named("legacy".to_string()),
            SubscriptionMode::Both => Self::Named("all".to_string()),
        }
    }
}

/// Websocket subscription configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SubscriptionsConfig {
    /// Enabled protocols.
    pub mode: SubscriptionMode,

    /// Upgrade path. Defaults to the GraphQL path.
    pub path: Option<String>,

    /// Close connections whose keep-alive ping is not answered in time.
    pub keepalive_timeout_secs: Option<u64>,
}

/// In-browser IDE configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IdeConfig {
    pub altair: AltairConfig,
    pub graphiql: GraphiqlConfig,
}

/// Altair IDE, served as static assets plus a rendered index.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AltairConfig {
    pub enabled: bool,

    /// Mount path, without trailing slash.
    pub path: String,

    /// Directory holding the Altair distribution files.
    pub assets_dir: Option<PathBuf>,

    /// Window title.
    pub title: String,

    /// Query pre-filled in the editor.
    pub initial_query: Option<String>,

    /// Headers pre-filled in the editor.
    pub initial_headers: BTreeMap<String, String>,
}

impl Default for AltairConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "/altair".to_string(),
            assets_dir: None,
            title: "Altair".to_string(),
            initial_query: None,
            initial_headers: BTreeMap::new(),
        }
    }
}

/// GraphiQL IDE, served as a single rendered page.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GraphiqlConfig {
    pub enabled: bool,
    pub path: String,
    pub title: String,
}

impl Default for GraphiqlConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "/graphiql".to_string(),
            title: "GraphiQL".to_string(),
        }
    }
}

/// TypeScript codegen configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CodegenConfig {
    /// Run codegen once the schema is built.
    pub enabled: bool,

    /// Generated TypeScript file.
    pub target_path: PathBuf,

    /// Inserted after the generated imports, before any type.
    pub pre_import_code: Option<String>,

    /// Module name used in the `declare module` block.
    pub declaration_module: String,

    /// Interface merged with the generated `Resolvers`.
    pub resolvers_interface: String,

    /// Context type exported by `declaration_module`.
    pub context_type: String,

    /// Custom scalar name to TypeScript type.
    pub scalars: BTreeMap<String, String>,

    /// Operation documents (`.graphql`/`.gql` files).
    pub documents: Vec<PathBuf>,

    /// Emit `TypedDocumentNode` constants for operations.
    pub typed_document_node: bool,

    /// Schema files to write (`.gql`, `.graphql` or `.json`).
    pub output_schema: Vec<PathBuf>,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            target_path: PathBuf::from("src/graphql.generated.ts"),
            pre_import_code: None,
            declaration_module: "graphql-bridge".to_string(),
            resolvers_interface: "BridgeResolvers".to_string(),
            context_type: "BridgeContext".to_string(),
            scalars: BTreeMap::new(),
            documents: Vec::new(),
            typed_document_node: true,
            output_schema: Vec::new(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed until response headers are produced, in seconds.
    /// Streaming bodies are not cut off by this.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,

    /// Cross-origin settings.
    pub cors: CorsConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
            cors: CorsConfig::default(),
        }
    }
}

/// CORS configuration. An empty origin list allows any origin.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allowed_origins: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.graphql.path, "/graphql");
        assert_eq!(config.subscriptions.mode, SubscriptionMode::Off);
        assert_eq!(config.subscription_path(), "/graphql");
        assert!(!config.codegen.enabled);
    }

    #[test]
    fn subscription_flag_values() {
        let parse = |raw: &str| {
            toml::from_str::<AppConfig>(&format!("[subscriptions]\nmode = {raw}\n"))
                .map(|c| c.subscriptions.mode)
        };

        assert_eq!(parse("false").unwrap(), SubscriptionMode::Off);
        assert_eq!(parse("true").unwrap(), SubscriptionMode::Modern);
        assert_eq!(parse("\"legacy\"").unwrap(), SubscriptionMode::Legacy);
        assert_eq!(parse("\"all\"").unwrap(), SubscriptionMode::Both);
        assert!(parse("\"sometimes\"").is_err());
    }

    #[test]
    fn subscription_path_override() {
        let config: AppConfig = toml::from_str(
            r#"
            [subscriptions]
            mode = "all"
            path = "/ws"
            "#,
        )
        .unwrap();
        assert_eq!(config.subscription_path(), "/ws");
    }
}
