//! TypeScript codegen trigger.
//!
//! # Data Flow
//! ```text
//! executor SDL
//!     → schema.rs (async-graphql-parser, extensions merged)
//!     → documents.rs (operation/fragment files)
//!     → plugins/ (typescript → resolvers → operations → typed document nodes)
//!     → imports + pre_import_code + bodies + `declare module` block
//!     → format.rs → writer.rs (write only on change)
//! executor SDL / introspection → schema_output.rs (.gql, .graphql, .json)
//! ```
//!
//! # Design Decisions
//! - Runs on its own Tokio task; startup and requests never wait for it
//! - Errors go to an `on_error` callback and never stop the server
//! - Output is deterministic so unchanged schemas leave files untouched

pub mod documents;
pub mod format;
pub mod plugins;
pub mod schema;
pub mod schema_output;
pub mod writer;

use std::path::PathBuf;
use std::sync::Arc;

use async_graphql::Executor;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::CodegenConfig;
use crate::graphql::PrintSchema;
use crate::observability::metrics;
use documents::Documents;
use format::format_typescript;
use plugins::PluginContext;
use schema::SchemaIndex;

pub use schema_output::INTROSPECTION_QUERY;
pub use writer::write_if_changed;

const HEADER: &str = "/* eslint-disable */\n// This file is generated by graphql-bridge. Do not edit it by hand.";

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("Failed to parse schema SDL: {0}")]
    SchemaParse(String),

    #[error("Failed to parse document {}: {message}", path.display())]
    DocumentParse { path: PathBuf, message: String },

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("anonymous operation in {}, operations need a name", path.display())]
    AnonymousOperation { path: PathBuf },

    #[error("unknown type `{0}`")]
    UnknownType(String),

    #[error("type `{type_name}` has no field `{field}`")]
    UnknownField { type_name: String, field: String },

    #[error("unknown fragment `{0}`")]
    UnknownFragment(String),

    #[error("fragment `{0}` spreads itself")]
    FragmentCycle(String),

    #[error("schema has no {0} root type")]
    MissingRootType(String),

    #[error("Introspection failed: {0}")]
    Introspection(String),

    #[error("Unsupported schema output {}: expected .gql, .graphql or .json", path.display())]
    UnsupportedSchemaExtension { path: PathBuf },
}

/// Receives every codegen failure.
pub type OnError = Arc<dyn Fn(&CodegenError) + Send + Sync>;

/// Logs the error; used when no callback is configured.
pub fn log_error() -> OnError {
    Arc::new(|error: &CodegenError| tracing::error!(error = %error, "Codegen failed"))
}

/// What one codegen run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CodegenReport {
    /// The TypeScript target changed on disk.
    pub typescript_written: bool,
    pub schemas_written: Vec<PathBuf>,
    pub errors: usize,
}

/// Render the full TypeScript file for `sdl` and `documents`.
pub fn generate_typescript(sdl: &str, documents: &Documents, config: &CodegenConfig) -> Result<String, CodegenError> {
    let schema = SchemaIndex::parse(sdl, &config.scalars)?;
    let ctx = PluginContext {
        schema: &schema,
        documents,
        config,
    };

    let mut imports: Vec<String> = Vec::new();
    let mut bodies = Vec::new();
    for plugin in plugins::plugins(config) {
        let output = plugin.generate(&ctx)?;
        tracing::debug!(plugin = plugin.name(), "Codegen plugin finished");
        for line in output.prepend {
            if !imports.contains(&line) {
                imports.push(line);
            }
        }
        if !output.content.is_empty() {
            bodies.push(output.content);
        }
    }

    let mut sections = vec![HEADER.to_string()];
    if !imports.is_empty() {
        sections.push(imports.join("\n"));
    }
    if let Some(code) = config.pre_import_code.as_deref().filter(|code| !code.trim().is_empty()) {
        sections.push(code.to_string());
    }
    sections.extend(bodies);
    sections.push(declaration_block(config));

    Ok(format_typescript(&sections.join("\n\n")))
}

/// Binds the generated `Resolvers` to the host module's context type.
fn declaration_block(config: &CodegenConfig) -> String {
    let module = &config.declaration_module;
    format!(
        "declare module \"{module}\" {{\n  interface {} extends Resolvers<import(\"{module}\").{}> {{ }}\n}}",
        config.resolvers_interface, config.context_type
    )
}

/// One full codegen pass. Failures are reported to `on_error` and counted.
pub async fn run_codegen<E>(executor: &E, config: &CodegenConfig, on_error: &OnError) -> CodegenReport
where
    E: Executor + PrintSchema,
{
    let mut report = CodegenReport::default();
    let sdl = executor.sdl();

    let typescript = async {
        let documents = Documents::load(&config.documents).await?;
        let contents = generate_typescript(&sdl, &documents, config)?;
        write_if_changed(&config.target_path, &contents)
            .await
            .map_err(|source| CodegenError::Write {
                path: config.target_path.clone(),
                source,
            })
    };
    match typescript.await {
        Ok(written) => report.typescript_written = written,
        Err(error) => {
            report.errors += 1;
            on_error(&error);
        }
    }

    for path in &config.output_schema {
        match schema_output::write_schema(executor, &sdl, path).await {
            Ok(true) => report.schemas_written.push(path.clone()),
            Ok(false) => tracing::debug!(path = %path.display(), "Schema file unchanged"),
            Err(error) => {
                report.errors += 1;
                on_error(&error);
            }
        }
    }

    metrics::record_codegen(if report.errors == 0 { "success" } else { "error" });
    tracing::info!(
        target_path = %config.target_path.display(),
        typescript_written = report.typescript_written,
        schemas_written = report.schemas_written.len(),
        errors = report.errors,
        "Codegen finished"
    );
    report
}

/// Fire-and-forget codegen.
pub struct CodegenTrigger;

impl CodegenTrigger {
    /// Run codegen on a background task. The handle resolves to the report.
    pub fn spawn<E>(executor: E, config: CodegenConfig, on_error: OnError) -> JoinHandle<CodegenReport>
    where
        E: Executor + PrintSchema,
    {
        tokio::spawn(async move { run_codegen(&executor, &config, &on_error).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn full_file_layout() {
        let config = CodegenConfig {
            pre_import_code: Some("import type { Ctx } from './ctx';".to_string()),
            ..CodegenConfig::default()
        };
        let mut documents = Documents::default();
        documents.add(Path::new("ops.graphql"), "query Hello { hello }").unwrap();

        let out = generate_typescript("type Query { hello: String! }", &documents, &config).unwrap();

        assert!(out.starts_with(HEADER));
        let graphql_import = out.find("from 'graphql';").unwrap();
        let pre_import = out.find("import type { Ctx }").unwrap();
        let maybe = out.find("export type Maybe<T>").unwrap();
        assert!(graphql_import < pre_import && pre_import < maybe);
        assert_eq!(out.matches("from 'graphql';").count(), 2);
        assert!(out.contains("export const HelloDocument = parse(`query Hello { hello }`)"));
        assert!(out.ends_with(
            "declare module \"graphql-bridge\" {\n  interface BridgeResolvers extends Resolvers<import(\"graphql-bridge\").BridgeContext> { }\n}\n"
        ));
    }

    #[test]
    fn generation_is_deterministic() {
        let config = CodegenConfig::default();
        let sdl = "type Query { b: Int a: String } enum Z { B A }";
        let first = generate_typescript(sdl, &Documents::default(), &config).unwrap();
        let second = generate_typescript(sdl, &Documents::default(), &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn schema_errors_surface() {
        let err = generate_typescript("type Query {", &Documents::default(), &CodegenConfig::default()).unwrap_err();
        assert!(matches!(err, CodegenError::SchemaParse(_)));
    }
}
