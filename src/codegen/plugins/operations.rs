use async_graphql_parser::types as ast;

use super::typescript::type_ref;
use super::{fragment_type_name, operation_type_name, CodegenPlugin, PluginContext, PluginOutput};
use crate::codegen::documents::Documents;
use crate::codegen::schema::SchemaIndex;
use crate::codegen::CodegenError;

/// Result and variables types for every operation and fragment in the documents.
pub struct OperationTypes;

impl CodegenPlugin for OperationTypes {
    fn name(&self) -> &'static str {
        "typescript-operations"
    }

    fn generate(&self, ctx: &PluginContext<'_>) -> Result<PluginOutput, CodegenError> {
        let renderer = Renderer {
            schema: ctx.schema,
            documents: ctx.documents,
        };
        let mut blocks = Vec::new();

        for fragment in ctx.documents.fragments.values() {
            let on = fragment.definition.type_condition.node.on.node.as_str();
            if ctx.schema.get(on).is_none() {
                return Err(CodegenError::UnknownType(on.to_string()));
            }
            let shape = renderer.selection(on, &fragment.definition.selection_set.node)?;
            blocks.push(format!("export type {} = {shape};", fragment_type_name(&fragment.name)));
        }

        for operation in ctx.documents.operations.values() {
            let kind = operation.definition.ty;
            let root = ctx
                .schema
                .root_type(kind)
                .ok_or_else(|| CodegenError::MissingRootType(format!("{kind:?}")))?;
            let type_name = operation_type_name(&operation.name, kind);

            blocks.push(format!(
                "export type {type_name}Variables = Exact<{}>;",
                variables(ctx.schema, &operation.definition.variable_definitions)
            ));
            let shape = renderer.selection(root, &operation.definition.selection_set.node)?;
            blocks.push(format!("export type {type_name} = {shape};"));
        }

        Ok(PluginOutput {
            prepend: Vec::new(),
            content: blocks.join("\n\n"),
        })
    }
}

fn variables(
    schema: &SchemaIndex,
    definitions: &[async_graphql_parser::Positioned<ast::VariableDefinition>],
) -> String {
    if definitions.is_empty() {
        return "{ [key: string]: never; }".to_string();
    }

    let mut block = String::from("{\n");
    for definition in definitions {
        let definition = &definition.node;
        let ty = &definition.var_type.node;
        let optional = if ty.nullable || definition.default_value.is_some() { "?" } else { "" };
        block.push_str(&format!(
            "  {}{optional}: {};\n",
            definition.name.node,
            type_ref(schema, ty, "InputMaybe")
        ));
    }
    block.push('}');
    block
}

struct Selected {
    key: String,
    optional: bool,
    ty: String,
}

struct Renderer<'a> {
    schema: &'a SchemaIndex,
    documents: &'a Documents,
}

impl Renderer<'_> {
    /// Object type for `selection_set` applied to `parent`.
    fn selection(&self, parent: &str, selection_set: &ast::SelectionSet) -> Result<String, CodegenError> {
        self.shape(parent, selection_set, &mut Vec::new())
    }

    /// `visiting` holds the fragments being expanded, to catch cycles.
    fn shape(
        &self,
        parent: &str,
        selection_set: &ast::SelectionSet,
        visiting: &mut Vec<String>,
    ) -> Result<String, CodegenError> {
        let mut selected = Vec::new();
        self.collect(parent, selection_set, false, &mut selected, visiting)?;

        let mut parts = Vec::with_capacity(selected.len() + 1);
        if !selected.iter().any(|s| s.key == "__typename") {
            parts.push(format!("__typename?: {}", self.typename(parent)));
        }
        for s in selected {
            let optional = if s.optional { "?" } else { "" };
            parts.push(format!("{}{optional}: {}", s.key, s.ty));
        }
        Ok(format!("{{ {} }}", parts.join(", ")))
    }

    fn collect(
        &self,
        parent: &str,
        selection_set: &ast::SelectionSet,
        conditional: bool,
        out: &mut Vec<Selected>,
        visiting: &mut Vec<String>,
    ) -> Result<(), CodegenError> {
        for item in &selection_set.items {
            match &item.node {
                ast::Selection::Field(field) => {
                    let field = &field.node;
                    let key = field.response_key().node.to_string();
                    if out.iter().any(|s| s.key == key) {
                        continue;
                    }

                    let name = field.name.node.as_str();
                    let (ty, nullable) = if name == "__typename" {
                        (self.typename(parent), false)
                    } else {
                        let definition = self.schema.field(parent, name).ok_or_else(|| CodegenError::UnknownField {
                            type_name: parent.to_string(),
                            field: name.to_string(),
                        })?;
                        let ty = &definition.ty.node;
                        (self.output(ty, &field.selection_set.node, visiting)?, ty.nullable)
                    };
                    out.push(Selected {
                        key,
                        optional: nullable || conditional,
                        ty,
                    });
                }
                ast::Selection::FragmentSpread(spread) => {
                    let name = spread.node.fragment_name.node.to_string();
                    if visiting.contains(&name) {
                        return Err(CodegenError::FragmentCycle(name));
                    }
                    let fragment = self
                        .documents
                        .fragments
                        .get(&name)
                        .ok_or_else(|| CodegenError::UnknownFragment(name.clone()))?;
                    let on = fragment.definition.type_condition.node.on.node.as_str();

                    visiting.push(name);
                    self.collect(
                        on,
                        &fragment.definition.selection_set.node,
                        conditional || on != parent,
                        out,
                        visiting,
                    )?;
                    visiting.pop();
                }
                ast::Selection::InlineFragment(inline) => {
                    let inline = &inline.node;
                    let on = inline
                        .type_condition
                        .as_ref()
                        .map_or(parent, |condition| condition.node.on.node.as_str());
                    self.collect(on, &inline.selection_set.node, conditional || on != parent, out, visiting)?;
                }
            }
        }
        Ok(())
    }

    fn output(
        &self,
        ty: &ast::Type,
        selection_set: &ast::SelectionSet,
        visiting: &mut Vec<String>,
    ) -> Result<String, CodegenError> {
        let inner = match &ty.base {
            ast::BaseType::Named(name) if self.schema.is_scalar(name) => self.schema.scalar_ts(name),
            ast::BaseType::Named(name) if self.schema.is_enum(name) => name.to_string(),
            ast::BaseType::Named(name) => self.shape(name, selection_set, visiting)?,
            ast::BaseType::List(item) => format!("Array<{}>", self.output(item, selection_set, visiting)?),
        };
        Ok(if ty.nullable { format!("{inner} | null") } else { inner })
    }

    /// `'User'`, or a union of literals for abstract types.
    fn typename(&self, parent: &str) -> String {
        let possible = self.schema.possible_types(parent);
        if possible.is_empty() {
            return format!("'{parent}'");
        }
        possible.iter().map(|p| format!("'{p}'")).collect::<Vec<_>>().join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodegenConfig;
    use std::path::Path;

    const SDL: &str = r#"
        type Query { hello: String! user(id: ID!): User search: [Result!]! }
        type Mutation { rename(name: String!): User! }
        type User { id: ID! name: String role: Role! friends: [User] }
        type Post { title: String! }
        union Result = User | Post
        enum Role { ADMIN USER }
    "#;

    fn generate(document: &str) -> Result<String, CodegenError> {
        let config = CodegenConfig::default();
        let schema = SchemaIndex::parse(SDL, &config.scalars)?;
        let mut documents = Documents::default();
        documents.add(Path::new("ops.graphql"), document)?;
        OperationTypes
            .generate(&PluginContext {
                schema: &schema,
                documents: &documents,
                config: &config,
            })
            .map(|output| output.content)
    }

    #[test]
    fn query_with_variables_alias_and_fragment() {
        let out = generate(
            r#"
            query GetUser($id: ID!, $limit: Int) {
              greeting: hello
              user(id: $id) { ...UserFields friends { id } }
            }
            fragment UserFields on User { id name role }
            "#,
        )
        .unwrap();

        assert!(out.contains("export type GetUserQueryVariables = Exact<{\n  id: Scalars['ID'];\n  limit?: InputMaybe<Scalars['Int']>;\n}>;"));
        assert!(out.contains(
            "export type GetUserQuery = { __typename?: 'Query', greeting: string, user?: { __typename?: 'User', id: string, name?: string | null, role: Role, friends?: Array<{ __typename?: 'User', id: string } | null> | null } | null };"
        ));
        assert!(out.contains(
            "export type UserFieldsFragment = { __typename?: 'User', id: string, name?: string | null, role: Role };"
        ));
    }

    #[test]
    fn mutation_without_variables_and_abstract_selection() {
        let out = generate(
            r#"
            mutation Rename { rename(name: "x") { id } }
            query Search { search { __typename ... on Post { title } } }
            "#,
        )
        .unwrap();

        assert!(out.contains("export type RenameMutationVariables = Exact<{ [key: string]: never; }>;"));
        assert!(out.contains(
            "export type SearchQuery = { __typename?: 'Query', search: Array<{ __typename: 'Post' | 'User', title?: string }> };"
        ));
    }

    #[test]
    fn fragment_cycles_are_errors() {
        let err = generate(
            r#"
            query Q { user(id: "1") { ...A } }
            fragment A on User { friends { ...B } }
            fragment B on User { friends { ...A } }
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, CodegenError::FragmentCycle(_)));
    }

    #[test]
    fn unknown_fields_are_errors() {
        let err = generate("query Bad { nope }").unwrap_err();
        assert_eq!(err.to_string(), "type `Query` has no field `nope`");
    }
}
