use super::{operation_type_name, CodegenPlugin, PluginContext, PluginOutput};
use crate::codegen::CodegenError;

const IMPORTS: [&str; 2] = [
    "import type { TypedDocumentNode as DocumentNode } from '@graphql-typed-document-node/core';",
    "import { parse } from 'graphql';",
];

/// `XDocument` constants typed with their result and variables.
///
/// Each constant carries the operation source plus every fragment it uses.
pub struct TypedDocumentNode;

impl CodegenPlugin for TypedDocumentNode {
    fn name(&self) -> &'static str {
        "typed-document-node"
    }

    fn generate(&self, ctx: &PluginContext<'_>) -> Result<PluginOutput, CodegenError> {
        if ctx.documents.operations.is_empty() {
            return Ok(PluginOutput::default());
        }

        let mut blocks = Vec::new();
        for operation in ctx.documents.operations.values() {
            let type_name = operation_type_name(&operation.name, operation.definition.ty);
            let fragments = ctx.documents.fragments_used_by(&operation.definition.selection_set.node)?;

            let mut source = operation.source.clone();
            for fragment in fragments {
                source.push_str("\n\n");
                source.push_str(&fragment.source);
            }

            blocks.push(format!(
                "export const {}Document = parse(`{}`) as unknown as DocumentNode<{type_name}, {type_name}Variables>;",
                document_const_name(&type_name),
                escape_template(&source)
            ));
        }

        Ok(PluginOutput {
            prepend: IMPORTS.iter().map(|line| line.to_string()).collect(),
            content: blocks.join("\n\n"),
        })
    }
}

/// `GetUserQuery` becomes `GetUser`, matching graphql-codegen's `GetUserDocument`.
fn document_const_name(type_name: &str) -> &str {
    ["Query", "Mutation", "Subscription"]
        .iter()
        .find_map(|suffix| type_name.strip_suffix(suffix))
        .unwrap_or(type_name)
}

fn escape_template(source: &str) -> String {
    source.replace('\\', "\\\\").replace('`', "\\`").replace("${", "\\${")
}
