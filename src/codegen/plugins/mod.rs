//! Codegen plugins.
//!
//! Plugins run in a fixed order and each contributes imports (`prepend`) and
//! a body (`content`). Later plugins may reference names earlier ones emit:
//! resolver and operation types use the base types, document nodes use the
//! operation types.

mod operations;
mod resolvers;
mod typed_document_node;
mod typescript;

use async_graphql_parser::types as ast;
use heck::ToUpperCamelCase;

pub use operations::OperationTypes;
pub use resolvers::ResolverTypes;
pub use typed_document_node::TypedDocumentNode;
pub use typescript::TypeScriptTypes;

use super::documents::Documents;
use super::schema::SchemaIndex;
use super::CodegenError;
use crate::config::CodegenConfig;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PluginOutput {
    pub prepend: Vec<String>,
    pub content: String,
}

/// Inputs shared by every plugin.
pub struct PluginContext<'a> {
    pub schema: &'a SchemaIndex,
    pub documents: &'a Documents,
    pub config: &'a CodegenConfig,
}

pub trait CodegenPlugin: Send + Sync {
    fn name(&self) -> &'static str;

    fn generate(&self, ctx: &PluginContext<'_>) -> Result<PluginOutput, CodegenError>;
}

/// Plugins for `config`, in run order.
pub fn plugins(config: &CodegenConfig) -> Vec<Box<dyn CodegenPlugin>> {
    let mut plugins: Vec<Box<dyn CodegenPlugin>> =
        vec![Box::new(TypeScriptTypes), Box::new(ResolverTypes), Box::new(OperationTypes)];
    if config.typed_document_node {
        plugins.push(Box::new(TypedDocumentNode));
    }
    plugins
}

/// `HelloQuery`, `AddUserMutation`, `TicksSubscription`.
pub(crate) fn operation_type_name(name: &str, kind: ast::OperationType) -> String {
    let suffix = match kind {
        ast::OperationType::Query => "Query",
        ast::OperationType::Mutation => "Mutation",
        ast::OperationType::Subscription => "Subscription",
    };
    format!("{}{suffix}", name.to_upper_camel_case())
}

pub(crate) fn fragment_type_name(name: &str) -> String {
    format!("{}Fragment", name.to_upper_camel_case())
}

/// Doc comment block for an optional description.
pub(crate) fn doc_comment(description: Option<&str>, indent: &str) -> String {
    match description {
        Some(text) if !text.trim().is_empty() => {
            let text = text.trim().replace("*/", "*\\/");
            if text.contains('\n') {
                let mut out = format!("{indent}/**\n");
                for line in text.lines() {
                    out.push_str(&format!("{indent} * {line}\n"));
                }
                out.push_str(&format!("{indent} */\n"));
                out
            } else {
                format!("{indent}/** {text} */\n")
            }
        }
        _ => String::new(),
    }
}
